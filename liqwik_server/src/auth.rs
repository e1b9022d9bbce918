//! Session tokens.
//!
//! A successful login OTP check (or a role switch) produces a [`SessionInfo`], which the [`TokenIssuer`] signs into an
//! HS256 JWT. Requests under the authenticated scope present the token as `Authorization: Bearer <jwt>`; the
//! [`crate::middleware::JwtMiddlewareFactory`] validates it and stores the [`JwtClaims`] in the request extensions,
//! from where handlers extract them.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use liqwik_engine::{auth_objects::SessionInfo, db_types::Role};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id
    pub sub: i64,
    pub email: String,
    /// Every verified role the user holds
    pub roles: Vec<Role>,
    pub selected_role: Option<Role>,
    pub selected_user_role_id: Option<i64>,
    pub exp: i64,
    pub iat: i64,
}

impl JwtClaims {
    pub fn user_id(&self) -> i64 {
        self.sub
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// The session as the workflow APIs see it.
    pub fn session(&self) -> SessionInfo {
        SessionInfo {
            user_id: self.sub,
            email: self.email.clone(),
            first_name: String::default(),
            roles: self.roles.clone(),
            selected_role: self.selected_role,
            selected_user_role_id: self.selected_user_role_id,
        }
    }
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned().ok_or_else(|| {
            debug!("🔐️ No session claims found for {}", req.path());
            ServerError::AuthenticationError(AuthError::MissingToken)
        });
        ready(claims)
    }
}

pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_duration: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.reveal().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            session_duration: config.session_duration,
        }
    }

    /// Issue a new session token for the given session.
    /// This method DOES NOT check that the session is legitimate. That is the job of the login flow, which must
    /// complete before calling `issue_token`.
    pub fn issue_token(&self, session: &SessionInfo) -> Result<(String, JwtClaims), AuthError> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: session.user_id,
            email: session.email.clone(),
            roles: session.roles.clone(),
            selected_role: session.selected_role,
            selected_user_role_id: session.selected_user_role_id,
            iat: now.timestamp(),
            exp: (now + self.session_duration).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::CouldNotIssueToken(e.to_string()))?;
        trace!("🔐️ Issued session token for user #{}", session.user_id);
        Ok((token, claims))
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<JwtClaims>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                AuthError::PoorlyFormattedToken(e.to_string())
            },
            _ => AuthError::ValidationError(e.to_string()),
        })?;
        Ok(data.claims)
    }
}

/// Checks that the session belongs to `user_id`. Routes scoped to a user id may only be used by that user.
pub fn ensure_self(claims: &JwtClaims, user_id: i64) -> Result<(), ServerError> {
    if claims.sub == user_id {
        Ok(())
    } else {
        debug!("🔐️ User #{} tried to act for user #{user_id}", claims.sub);
        Err(ServerError::InsufficientPermissions("You may only access your own data".to_string()))
    }
}

#[cfg(test)]
mod test {
    use liqwik_common::Secret;

    use super::*;

    fn issuer(hours: i64) -> TokenIssuer {
        let config = AuthConfig {
            jwt_secret: Secret::new("an-extremely-secret-test-key-0123456789".into()),
            session_duration: Duration::hours(hours),
        };
        TokenIssuer::new(&config)
    }

    fn session() -> SessionInfo {
        SessionInfo {
            user_id: 7,
            email: "sally@example.com".into(),
            first_name: "Sally".into(),
            roles: vec![Role::Seller, Role::Buyer],
            selected_role: Some(Role::Seller),
            selected_user_role_id: Some(11),
        }
    }

    #[test]
    fn issued_tokens_validate() {
        let issuer = issuer(24);
        let (token, claims) = issuer.issue_token(&session()).unwrap();
        let decoded = issuer.validate_token(&token).unwrap();
        assert_eq!(decoded, claims);
        assert_eq!(decoded.user_id(), 7);
        assert!(decoded.has_role(Role::Buyer));
        assert!(!decoded.has_role(Role::Admin));
        assert_eq!(decoded.exp - decoded.iat, 24 * 3600);
        assert_eq!(decoded.session().selected_user_role_id, Some(11));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let issuer = issuer(-2);
        let (token, _) = issuer.issue_token(&session()).unwrap();
        let err = issuer.validate_token(&token).unwrap_err();
        assert!(matches!(err, AuthError::ValidationError(_)), "{err:?}");
    }

    #[test]
    fn tokens_from_another_key_are_rejected() {
        let (token, _) = issuer(1).issue_token(&session()).unwrap();
        let other = TokenIssuer::new(&AuthConfig {
            jwt_secret: Secret::new("a-different-secret-key-for-testing-9876543210".into()),
            session_duration: Duration::hours(1),
        });
        assert!(matches!(other.validate_token(&token), Err(AuthError::ValidationError(_))));
        assert!(matches!(other.validate_token("made up nonsense"), Err(AuthError::PoorlyFormattedToken(_))));
    }

    #[test]
    fn only_the_owner_passes_the_self_check() {
        let (_, claims) = issuer(1).issue_token(&session()).unwrap();
        assert!(ensure_self(&claims, 7).is_ok());
        assert!(matches!(ensure_self(&claims, 8), Err(ServerError::InsufficientPermissions(_))));
    }
}
