/// Outbound email collaborator contract
///
/// The auth core never renders templates or talks SMTP directly; it hands a
/// composed [`EmailMessage`] to an [`EmailSender`] and records the outcome.
/// A delivery failure never rolls back already-committed account/token
/// state — it is surfaced as a distinct, retryable condition.
///
/// Implementations: [`smtp::SmtpEmailSender`] for production,
/// [`MockEmailSender`] for tests.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

pub mod smtp;

pub use smtp::{SmtpConfig, SmtpEmailSender};

/// Error type for email dispatch
#[derive(Debug, Clone, thiserror::Error)]
#[error("email delivery failed: {0}")]
pub struct EmailError(pub String);

/// A rendered outbound email.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    /// Recipient address
    pub to_address: String,

    /// Optional recipient display name
    pub to_name: Option<String>,

    /// Subject line
    pub subject: String,

    /// HTML body
    pub html_body: String,

    /// Optional reply-to address
    pub reply_to: Option<String>,
}

/// The collaborator every auth flow dispatches mail through.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError>;
}

/// Recording sender for tests and local development.
///
/// Captures every message instead of delivering it; `set_fail(true)` makes
/// subsequent sends fail so delivery-failure paths can be exercised.
#[derive(Default)]
pub struct MockEmailSender {
    sent: Mutex<Vec<EmailMessage>>,
    fail: AtomicBool,
}

impl MockEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, oldest first.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().expect("mock sender mutex poisoned").clone()
    }

    /// The most recent message, if any.
    pub fn last(&self) -> Option<EmailMessage> {
        self.sent
            .lock()
            .expect("mock sender mutex poisoned")
            .last()
            .cloned()
    }

    /// Makes subsequent sends fail (or succeed again).
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmailSender for MockEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmailError("mock sender configured to fail".to_string()));
        }

        self.sent
            .lock()
            .expect("mock sender mutex poisoned")
            .push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(subject: &str) -> EmailMessage {
        EmailMessage {
            to_address: "customer@example.com".to_string(),
            to_name: Some("Customer".to_string()),
            subject: subject.to_string(),
            html_body: "<p>hello</p>".to_string(),
            reply_to: None,
        }
    }

    #[tokio::test]
    async fn test_mock_sender_records_messages() {
        let sender = MockEmailSender::new();

        sender.send(message("first")).await.unwrap();
        sender.send(message("second")).await.unwrap();

        let sent = sender.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, "first");
        assert_eq!(sender.last().unwrap().subject, "second");
    }

    #[tokio::test]
    async fn test_mock_sender_failure_mode() {
        let sender = MockEmailSender::new();
        sender.set_fail(true);

        assert!(sender.send(message("doomed")).await.is_err());
        assert!(sender.sent().is_empty());

        sender.set_fail(false);
        assert!(sender.send(message("recovered")).await.is_ok());
    }
}
