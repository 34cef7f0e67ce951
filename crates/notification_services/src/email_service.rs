use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::info;

use crate::types::{EmailConfig, NotificationError};

/// Trait for email service implementations
#[async_trait]
pub trait EmailService: Send + Sync {
    /// Send one HTML message to every address in `to`, returning a delivery id
    async fn send_email(
        &self,
        to: &[String],
        subject: &str,
        html_body: &str,
    ) -> Result<String, NotificationError>;
}

/// Email delivery over authenticated SMTP with STARTTLS
pub struct SmtpEmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpEmailService {
    /// Build an SMTP transport from the email channel settings
    pub fn new(config: &EmailConfig, timeout: Duration) -> Result<Self, NotificationError> {
        let sender: Mailbox = config.sender_email.parse().map_err(|e| {
            NotificationError::Email(format!(
                "Invalid sender address {}: {}",
                config.sender_email, e
            ))
        })?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)
            .map_err(|e| {
                NotificationError::Email(format!(
                    "Failed to configure SMTP relay {}: {}",
                    config.smtp_server, e
                ))
            })?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.sender_email.clone(),
                config.sender_password.clone(),
            ))
            .timeout(Some(timeout))
            .build();

        Ok(Self { transport, sender })
    }
}

#[async_trait]
impl EmailService for SmtpEmailService {
    async fn send_email(
        &self,
        to: &[String],
        subject: &str,
        html_body: &str,
    ) -> Result<String, NotificationError> {
        let mut builder = Message::builder()
            .from(self.sender.clone())
            .subject(subject)
            .header(ContentType::TEXT_HTML);

        for recipient in to {
            let mailbox: Mailbox = recipient.parse().map_err(|e| {
                NotificationError::Email(format!("Invalid recipient {}: {}", recipient, e))
            })?;
            builder = builder.to(mailbox);
        }

        let message = builder
            .body(html_body.to_string())
            .map_err(|e| NotificationError::Email(format!("Failed to build message: {}", e)))?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| NotificationError::Email(format!("SMTP submission failed: {}", e)))?;

        info!("Email notification sent: {}", subject);

        Ok(response.code().to_string())
    }
}

/// Email service that only logs, for dry runs
pub struct LogEmailService;

#[async_trait]
impl EmailService for LogEmailService {
    async fn send_email(
        &self,
        to: &[String],
        subject: &str,
        html_body: &str,
    ) -> Result<String, NotificationError> {
        info!("📧 [DRY RUN EMAIL] To: {}", to.join(", "));
        info!("📧 [DRY RUN EMAIL] Subject: {}", subject);
        info!("📧 [DRY RUN EMAIL] Body:\n{}", html_body);

        Ok(format!("dry-run-email-{}", uuid::Uuid::new_v4()))
    }
}
