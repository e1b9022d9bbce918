//! Email transports.
//!
//! The engine composes every email and hands it to a [`Mailer`]. The server picks one of two transports at startup,
//! based on `LQK_EMAIL_SERVICE`:
//! * `log` writes each message to the log. This is the default, and is what you want during development.
//! * `smtp` delivers through an SMTP relay using STARTTLS.
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport,
    AsyncTransport,
    Message,
    Tokio1Executor,
};
use liqwik_engine::mailer::{EmailMessage, Mailer, MailerError};
use log::*;

use crate::config::{EmailConfig, EmailService, SmtpConfig};

#[derive(Clone)]
pub enum ServerMailer {
    Log(LogMailer),
    Smtp(SmtpMailer),
}

impl ServerMailer {
    pub fn from_config(config: &EmailConfig) -> Result<Self, MailerError> {
        match &config.service {
            EmailService::Log => {
                info!("📧️ Emails will be written to the log");
                Ok(Self::Log(LogMailer))
            },
            EmailService::Smtp(smtp) => {
                info!("📧️ Emails will be sent via {}:{}", smtp.host, smtp.port);
                Ok(Self::Smtp(SmtpMailer::new(smtp, &config.from)?))
            },
        }
    }
}

impl Mailer for ServerMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailerError> {
        match self {
            Self::Log(m) => m.send(message).await,
            Self::Smtp(m) => m.send(message).await,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailerError> {
        info!(
            "📧️ [{:?}] To: {} | Subject: {}\n{}",
            message.kind, message.to, message.subject, message.text
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, from: &str) -> Result<Self, MailerError> {
        let from = from.parse::<Mailbox>().map_err(|e| MailerError::InvalidAddress(format!("{from}: {e}")))?;
        let credentials = Credentials::new(config.user.clone(), config.password.reveal().clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailerError::DeliveryFailed(e.to_string()))?
            .port(config.port)
            .credentials(credentials)
            .build();
        Ok(Self { from, transport })
    }
}

impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailerError> {
        let email = build_message(&self.from, message)?;
        self.transport.send(email).await.map_err(|e| MailerError::DeliveryFailed(e.to_string()))?;
        Ok(())
    }
}

fn build_message(from: &Mailbox, message: EmailMessage) -> Result<Message, MailerError> {
    let to = message.to.parse::<Mailbox>().map_err(|e| MailerError::InvalidAddress(format!("{}: {e}", message.to)))?;
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(message.subject)
        .multipart(MultiPart::alternative_plain_html(message.text, message.html))
        .map_err(|e| MailerError::InvalidMessage(e.to_string()))
}

#[cfg(test)]
mod test {
    use liqwik_engine::{db_types::Role, mailer::EmailKind};

    use super::*;

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let msg = EmailMessage::verification("ada@example.com", "Ada", "123456", Role::Seller);
        assert!(ServerMailer::Log(LogMailer).send(msg).await.is_ok());
    }

    #[test]
    fn messages_become_multipart_emails() {
        let from: Mailbox = "Liqwik <no-reply@liqwik.com>".parse().unwrap();
        let msg = EmailMessage::login_otp("ada@example.com", "Ada", "654321");
        assert_eq!(msg.kind, EmailKind::LoginOtp);
        let email = build_message(&from, msg).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("To: ada@example.com"), "{raw}");
        assert!(raw.contains("multipart/alternative"), "{raw}");
    }

    #[test]
    fn bad_recipients_are_rejected() {
        let from: Mailbox = "no-reply@liqwik.com".parse().unwrap();
        let mut msg = EmailMessage::login_otp("ada@example.com", "Ada", "654321");
        msg.to = "not an address".into();
        assert!(matches!(build_message(&from, msg), Err(MailerError::InvalidAddress(_))));
    }
}
