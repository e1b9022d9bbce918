use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
    Mutex,
};

use crate::mailer::{EmailKind, EmailMessage, Mailer, MailerError};

/// A [`Mailer`] that keeps every message it is given. It can be switched into a failing mode to exercise the
/// best-effort paths of the workflows. Clones share their state.
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_of_kind(&self, kind: EmailKind) -> Vec<EmailMessage> {
        self.sent().into_iter().filter(|m| m.kind == kind).collect()
    }

    pub fn last_of_kind(&self, kind: EmailKind) -> Option<EmailMessage> {
        self.sent_of_kind(kind).pop()
    }

    pub fn clear(&self) {
        if let Ok(mut s) = self.sent.lock() {
            s.clear();
        }
    }
}

impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailerError::DeliveryFailed(format!("refusing to send to {}", message.to)));
        }
        if let Ok(mut s) = self.sent.lock() {
            s.push(message);
        }
        Ok(())
    }
}
