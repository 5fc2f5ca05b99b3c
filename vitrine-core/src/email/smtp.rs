/// SMTP implementation of [`EmailSender`] using lettre
///
/// STARTTLS relay with username/password credentials, the standard
/// configuration for transactional mail providers on port 587.
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::{EmailError, EmailMessage, EmailSender};

/// SMTP relay settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// Relay hostname (e.g. "smtp.example.com")
    pub host: String,

    /// Relay port (587 for STARTTLS)
    pub port: u16,

    /// Relay username
    pub username: String,

    /// Relay password
    pub password: String,

    /// From address for all outbound mail
    pub from_email: String,

    /// From display name
    pub from_name: String,
}

/// Production email sender over an async SMTP transport.
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    /// Builds the transport from config.
    ///
    /// # Errors
    ///
    /// Returns [`EmailError`] if the relay host or from address is invalid.
    pub fn new(config: &SmtpConfig) -> Result<Self, EmailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| EmailError(format!("invalid SMTP relay: {e}")))?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .port(config.port)
            .build();

        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|e| EmailError(format!("invalid from address: {e}")))?;

        Ok(Self { transport, from })
    }
}

fn mailbox(address: &str, name: Option<&str>) -> Result<Mailbox, EmailError> {
    let formatted = match name {
        Some(name) => format!("{name} <{address}>"),
        None => address.to_string(),
    };

    formatted
        .parse()
        .map_err(|e| EmailError(format!("invalid recipient address: {e}")))
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        let EmailMessage {
            to_address,
            to_name,
            subject,
            html_body,
            reply_to,
        } = message;

        let to = mailbox(&to_address, to_name.as_deref())?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML);

        if let Some(reply_to) = reply_to {
            builder = builder.reply_to(mailbox(&reply_to, None)?);
        }

        let email = builder
            .body(html_body)
            .map_err(|e| EmailError(format!("failed to build message: {e}")))?;

        match self.transport.send(email).await {
            Ok(_) => {
                tracing::info!(to = %to_address, "email dispatched via SMTP");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(to = %to_address, error = %e, "SMTP dispatch failed");
                Err(EmailError(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_with_and_without_name() {
        let plain = mailbox("buyer@example.com", None).unwrap();
        assert_eq!(plain.email.to_string(), "buyer@example.com");

        let named = mailbox("buyer@example.com", Some("Buyer")).unwrap();
        assert_eq!(named.name.as_deref(), Some("Buyer"));

        assert!(mailbox("not-an-address", None).is_err());
    }
}
