use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use log::info;

use crate::core::config::EmailConfig;

#[derive(Debug, Clone, thiserror::Error)]
pub enum EmailError {
    #[error("Invalid address {address}: {reason}")]
    Address { address: String, reason: String },
    #[error("Failed to build email: {0}")]
    Build(String),
    #[error("SMTP error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError>;
}

fn mailbox(address: &str) -> Result<Mailbox, EmailError> {
    address.parse().map_err(|e: lettre::address::AddressError| EmailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// SMTP delivery (SES SMTP endpoint in production).
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(server: &str, config: &EmailConfig) -> Result<Self, EmailError> {
        let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(server)
            .map_err(|e| EmailError::Transport(e.to_string()))?
            .port(config.smtp_port);

        let transport = if config.username.is_empty() {
            builder.build()
        } else {
            builder
                .credentials(Credentials::new(
                    config.username.clone(),
                    config.password.clone(),
                ))
                .build()
        };
        Ok(Self { transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(mailbox(&message.from)?)
            .to(mailbox(&message.to)?)
            .subject(&message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)
            .map_err(|e| EmailError::Build(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;
        info!("Email \"{}\" sent to {}", message.subject, message.to);
        Ok(())
    }
}

/// Logs messages instead of delivering them. Used when SMTP is not configured.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        mailbox(&message.to)?;
        info!(
            "[mail disabled] from={} to={} subject={:?}",
            message.from, message.to, message.subject
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            from: "Cally <no-reply@callygo.com>".to_string(),
            to: to.to_string(),
            subject: "Hi".to_string(),
            body: "Hello".to_string(),
        }
    }

    #[tokio::test]
    async fn test_log_mailer_validates_recipient() {
        assert!(LogMailer.send(message("visitor@example.com")).await.is_ok());
        assert!(matches!(
            LogMailer.send(message("not an address")).await,
            Err(EmailError::Address { .. })
        ));
    }

    #[test]
    fn test_named_mailbox_parses() {
        let parsed = mailbox("Sunrise Yoga <hello@sunrise.yoga>").unwrap();
        assert_eq!(parsed.email.to_string(), "hello@sunrise.yoga");
    }
}
