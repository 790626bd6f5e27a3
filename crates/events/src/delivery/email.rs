//! Email notification delivery via SMTP.
//!
//! [`EmailDelivery`] wraps the `lettre` async SMTP transport to send plain-text
//! alert emails. The worker builds an [`EmailConfig`] only when `SMTP_HOST`
//! is set; without one the email channel stays unavailable.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::channel::OutboundMessage;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
pub const DEFAULT_FROM_ADDRESS: &str = "alerts@tripwire.local";

/// Subject prefix for every alert email.
const SUBJECT_PREFIX: &str = "[Tripwire]";

/// Configuration for the SMTP email delivery service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
}

// ---------------------------------------------------------------------------
// EmailDelivery
// ---------------------------------------------------------------------------

/// Sends alert emails via SMTP.
pub struct EmailDelivery {
    from_address: String,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailDelivery {
    /// Build the SMTP transport once; connections are opened per send.
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            from_address: config.from_address,
            mailer: transport_builder.build(),
        })
    }

    /// Send the message to its target address.
    pub async fn deliver(&self, message: &OutboundMessage) -> Result<(), EmailError> {
        let email = build_message(&self.from_address, message)?;
        self.mailer.send(email).await?;

        tracing::info!(
            to = %message.target,
            notification_id = message.notification_id,
            "Alert email sent"
        );
        Ok(())
    }
}

fn build_message(from_address: &str, message: &OutboundMessage) -> Result<Message, EmailError> {
    Message::builder()
        .from(from_address.parse()?)
        .to(message.target.parse()?)
        .subject(format!("{SUBJECT_PREFIX} {}", message.subject))
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())
        .map_err(|e| EmailError::Build(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn message(target: &str) -> OutboundMessage {
        OutboundMessage {
            notification_id: 3,
            target: target.to_string(),
            subject: "Disk low".to_string(),
            body: "free_gb reported 2".to_string(),
            payload: serde_json::json!({}),
        }
    }

    #[test]
    fn email_error_display_build() {
        let err = EmailError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "Email build error: missing body");
    }

    #[test]
    fn email_error_display_address() {
        let addr_err: Result<lettre::Address, _> = "not-an-email".parse();
        let err = EmailError::Address(addr_err.unwrap_err());
        assert!(err.to_string().contains("Email address parse error"));
    }

    #[test]
    fn build_message_prefixes_subject() {
        let email = build_message(DEFAULT_FROM_ADDRESS, &message("ops@example.com")).unwrap();
        let formatted = String::from_utf8(email.formatted()).unwrap();
        assert!(formatted.contains("Subject: [Tripwire] Disk low"));
        assert!(formatted.contains("To: ops@example.com"));
    }

    #[test]
    fn build_message_rejects_invalid_recipient() {
        assert!(matches!(
            build_message(DEFAULT_FROM_ADDRESS, &message("nobody")),
            Err(EmailError::Address(_))
        ));
    }
}
