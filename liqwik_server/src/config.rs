use std::{env, path::PathBuf};

use chrono::Duration;
use liqwik_common::{helpers::parse_boolean_flag, Secret};
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::errors::ServerError;

const DEFAULT_LQK_HOST: &str = "127.0.0.1";
const DEFAULT_LQK_PORT: u16 = 8360;
const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_SESSION_DURATION: Duration = Duration::hours(24);
const DEFAULT_PAYMENT_TRACKING_INTERVAL: Duration = Duration::hours(24);
const DEFAULT_EMAIL_FROM: &str = "Liqwik <no-reply@liqwik.com>";
const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The externally visible base URL. Links in emails are built from it.
    pub public_url: String,
    pub auth: AuthConfig,
    /// Asset documents are stored beneath this directory.
    pub upload_dir: PathBuf,
    /// How often the payment tracking sweep runs. `None` disables the background worker.
    pub payment_tracking_interval: Option<Duration>,
    pub email: EmailConfig,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_LQK_HOST.to_string(),
            port: DEFAULT_LQK_PORT,
            database_url: String::default(),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            auth: AuthConfig::default(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            payment_tracking_interval: Some(DEFAULT_PAYMENT_TRACKING_INTERVAL),
            email: EmailConfig::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("LQK_HOST").ok().unwrap_or_else(|| DEFAULT_LQK_HOST.into());
        let port = env::var("LQK_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for LQK_PORT. {e} Using the default, {DEFAULT_LQK_PORT}, instead."
                    );
                    DEFAULT_LQK_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_LQK_PORT);
        let database_url = env::var("LQK_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ LQK_DATABASE_URL is not set. Please set it to the URL for the Liqwik database.");
            String::default()
        });
        let public_url = env::var("LQK_PUBLIC_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .ok()
            .unwrap_or_else(|| {
                warn!("🪛️ LQK_PUBLIC_URL is not set. Links in emails will point to {DEFAULT_PUBLIC_URL}.");
                DEFAULT_PUBLIC_URL.to_string()
            });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let upload_dir = env::var("LQK_UPLOAD_DIR").map(PathBuf::from).unwrap_or_else(|_| {
            info!("🪛️ LQK_UPLOAD_DIR is not set. Documents will be stored in ./{DEFAULT_UPLOAD_DIR}");
            PathBuf::from(DEFAULT_UPLOAD_DIR)
        });
        let payment_tracking_interval = configure_payment_tracking_interval();
        let email = EmailConfig::from_env_or_default();
        let use_x_forwarded_for = parse_boolean_flag(env::var("LQK_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("LQK_USE_FORWARDED").ok(), false);
        Self {
            host,
            port,
            database_url,
            public_url,
            auth,
            upload_dir,
            payment_tracking_interval,
            email,
            use_x_forwarded_for,
            use_forwarded,
        }
    }
}

fn configure_payment_tracking_interval() -> Option<Duration> {
    let hours = env::var("LQK_PAYMENT_TRACKING_INTERVAL_HOURS")
        .map_err(|_| {
            info!(
                "🪛️ LQK_PAYMENT_TRACKING_INTERVAL_HOURS is not set. Using the default value of {} hrs.",
                DEFAULT_PAYMENT_TRACKING_INTERVAL.num_hours()
            )
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for LQK_PAYMENT_TRACKING_INTERVAL_HOURS. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_PAYMENT_TRACKING_INTERVAL.num_hours());
    if hours <= 0 {
        info!("🪛️ The payment tracking worker is disabled. Sweeps will only run when requested through the API.");
        None
    } else {
        Some(Duration::hours(hours))
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HMAC secret used to sign and verify session tokens.
    pub jwt_secret: Secret<String>,
    /// How long an issued session token stays valid.
    pub session_duration: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. DO NOT operate on \
             production like this, since every session is lost when the server restarts. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(64).map(char::from).collect::<String>();
        Self { jwt_secret: Secret::new(secret), session_duration: DEFAULT_SESSION_DURATION }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let jwt_secret =
            env::var("LQK_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [LQK_JWT_SECRET]")))?;
        if jwt_secret.len() < 32 {
            return Err(ServerError::ConfigurationError(
                "LQK_JWT_SECRET must be at least 32 characters long".to_string(),
            ));
        }
        let session_duration = env::var("LQK_SESSION_DURATION_HOURS")
            .ok()
            .and_then(|s| {
                s.parse::<i64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for LQK_SESSION_DURATION_HOURS. {e}"))
                    .ok()
            })
            .filter(|h| *h > 0)
            .map(Duration::hours)
            .unwrap_or(DEFAULT_SESSION_DURATION);
        Ok(Self { jwt_secret: Secret::new(jwt_secret), session_duration })
    }
}

//-------------------------------------------------  EmailConfig  ------------------------------------------------------
#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub service: EmailService,
    /// The sender address, e.g. `Liqwik <no-reply@liqwik.com>`.
    pub from: String,
}

#[derive(Clone, Debug)]
pub enum EmailService {
    /// Writes every email to the log instead of sending it.
    Log,
    Smtp(SmtpConfig),
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self { service: EmailService::Log, from: DEFAULT_EMAIL_FROM.to_string() }
    }
}

impl EmailConfig {
    pub fn from_env_or_default() -> Self {
        let from = env::var("LQK_EMAIL_FROM").ok().unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string());
        let service = match env::var("LQK_EMAIL_SERVICE").map(|s| s.to_lowercase()) {
            Ok(s) if s == "smtp" => match SmtpConfig::try_from_env() {
                Ok(smtp) => EmailService::Smtp(smtp),
                Err(e) => {
                    error!("🪛️ LQK_EMAIL_SERVICE is smtp, but the SMTP configuration is incomplete. {e}. Emails will be logged instead.");
                    EmailService::Log
                },
            },
            Ok(s) if s == "log" => EmailService::Log,
            Ok(s) => {
                warn!("🪛️ Unknown LQK_EMAIL_SERVICE '{s}'. Emails will be logged instead.");
                EmailService::Log
            },
            Err(_) => {
                info!("🪛️ LQK_EMAIL_SERVICE is not set. Emails will be logged instead of sent.");
                EmailService::Log
            },
        };
        Self { service, from }
    }
}

impl SmtpConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let host =
            env::var("LQK_SMTP_HOST").map_err(|e| ServerError::ConfigurationError(format!("{e} [LQK_SMTP_HOST]")))?;
        let port = env::var("LQK_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().map_err(|e| warn!("🪛️ Invalid value for LQK_SMTP_PORT. {e}")).ok())
            .unwrap_or(DEFAULT_SMTP_PORT);
        let user =
            env::var("LQK_SMTP_USER").map_err(|e| ServerError::ConfigurationError(format!("{e} [LQK_SMTP_USER]")))?;
        let password = env::var("LQK_SMTP_PASSWORD")
            .map_err(|e| ServerError::ConfigurationError(format!("{e} [LQK_SMTP_PASSWORD]")))?;
        Ok(Self { host, port, user, password: Secret::new(password) })
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::new("0.0.0.0", 9000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.payment_tracking_interval, Some(Duration::hours(24)));
        assert!(matches!(config.email.service, EmailService::Log));
        assert_eq!(config.auth.jwt_secret.reveal().len(), 64);
        assert_eq!(config.auth.session_duration, Duration::hours(24));
    }

    #[test]
    fn secrets_are_not_logged() {
        let smtp = SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            user: "mailer".into(),
            password: Secret::new("p4ssw0rd".into()),
        };
        let s = format!("{smtp:?}");
        assert!(!s.contains("p4ssw0rd"), "{s}");
        let auth = AuthConfig { jwt_secret: Secret::new("super-secret".into()), session_duration: Duration::hours(1) };
        assert!(!format!("{auth:?}").contains("super-secret"));
    }
}
