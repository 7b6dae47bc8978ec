//! SMTP delivery of notification copies via lettre.

use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::error::NotifyError;

/// SMTP configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    /// Subject prefix on outgoing mail.
    pub subject_prefix: String,
}

impl EmailConfig {
    /// Build config from environment variables.
    /// Returns `None` if `MEMOFLOW_SMTP_HOST` is not set (email disabled).
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("MEMOFLOW_SMTP_HOST").ok()?;

        let smtp_port: u16 = std::env::var("MEMOFLOW_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("MEMOFLOW_SMTP_USERNAME").unwrap_or_default();
        let password = std::env::var("MEMOFLOW_SMTP_PASSWORD").unwrap_or_default();
        let from_address =
            std::env::var("MEMOFLOW_SMTP_FROM").unwrap_or_else(|_| username.clone());
        let subject_prefix = std::env::var("MEMOFLOW_SMTP_SUBJECT_PREFIX")
            .unwrap_or_else(|_| "[Memo Portal]".to_string());

        Some(Self {
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
            subject_prefix,
        })
    }
}

/// Send one notification message to `to` over SMTP (STARTTLS).
pub fn send_notification_email(
    config: &EmailConfig,
    to: &str,
    body: &str,
) -> Result<(), NotifyError> {
    let from = config
        .from_address
        .parse()
        .map_err(|e| NotifyError::InvalidAddress {
            address: config.from_address.clone(),
            reason: format!("{e}"),
        })?;
    let to_mailbox = to.parse().map_err(|e| NotifyError::InvalidAddress {
        address: to.to_string(),
        reason: format!("{e}"),
    })?;

    let message = Message::builder()
        .from(from)
        .to(to_mailbox)
        .subject(format!("{} Memo notification", config.subject_prefix))
        .body(body.to_string())
        .map_err(|e| NotifyError::Smtp(format!("build message: {e}")))?;

    let mailer = SmtpTransport::starttls_relay(&config.smtp_host)
        .map_err(|e| NotifyError::Smtp(format!("relay setup: {e}")))?
        .port(config.smtp_port)
        .credentials(Credentials::new(
            config.username.clone(),
            config.password.clone(),
        ))
        .build();

    mailer
        .send(&message)
        .map_err(|e| NotifyError::Smtp(format!("send: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_env_returns_none_when_no_host() {
        // SAFETY: no other thread reads MEMOFLOW_SMTP_HOST concurrently.
        unsafe { std::env::remove_var("MEMOFLOW_SMTP_HOST") };
        assert!(EmailConfig::from_env().is_none());
    }
}
