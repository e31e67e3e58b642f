//! Outgoing email: transport selection and the visitor-facing templates.

pub mod mailer;
pub mod templates;

pub use mailer::{EmailError, EmailMessage, LogMailer, Mailer, SmtpMailer};

use log::{info, warn};
use std::sync::Arc;

use crate::core::config::EmailConfig;

/// SMTP when a server is configured, otherwise a mailer that only logs.
pub fn mailer_from_config(config: &EmailConfig) -> Arc<dyn Mailer> {
    match &config.smtp_server {
        Some(server) => match SmtpMailer::new(server, config) {
            Ok(mailer) => {
                info!("Email delivery via SMTP {server}:{}", config.smtp_port);
                Arc::new(mailer)
            }
            Err(e) => {
                warn!("SMTP setup failed ({e}), falling back to log mailer");
                Arc::new(LogMailer)
            }
        },
        None => {
            info!("SMTP_SERVER not set, emails will be logged only");
            Arc::new(LogMailer)
        }
    }
}

/// Sends `message` if there is one. A failure is logged and appended to
/// `warnings` instead of failing the request.
pub async fn send_or_warn(
    mailer: &dyn Mailer,
    message: Option<EmailMessage>,
    warnings: &mut Vec<String>,
) -> bool {
    let Some(message) = message else {
        return false;
    };
    let to = message.to.clone();
    match mailer.send(message).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Email to {to} failed: {e}");
            warnings.push(format!("Email to {to} failed: {e}"));
            false
        }
    }
}
