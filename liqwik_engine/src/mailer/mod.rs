//! # Email contract
//!
//! The engine never talks to a mail server directly. Workflow APIs build an [`EmailMessage`] with one of its
//! constructors and hand it to a [`Mailer`]. Delivery is always best effort: a failed send is logged and the workflow
//! carries on, since every email is sent only after the state change it reports has been committed.
mod messages;

use log::*;
use thiserror::Error;

pub use messages::{EmailKind, EmailMessage, APP_NAME};

#[derive(Debug, Clone, Error)]
pub enum MailerError {
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
    #[error("Could not build email: {0}")]
    InvalidMessage(String),
    #[error("Email delivery failed: {0}")]
    DeliveryFailed(String),
}

#[allow(async_fn_in_trait)]
pub trait Mailer: Clone {
    async fn send(&self, message: EmailMessage) -> Result<(), MailerError>;
}

/// Sends `message`, logging (and swallowing) any failure. Returns whether the send succeeded.
pub async fn deliver<M: Mailer>(mailer: &M, message: EmailMessage) -> bool {
    let kind = message.kind;
    let to = message.to.clone();
    match mailer.send(message).await {
        Ok(()) => {
            debug!("📧️ {kind:?} email sent to {to}");
            true
        },
        Err(e) => {
            warn!("📧️ Could not send {kind:?} email to {to}. {e}");
            false
        },
    }
}
