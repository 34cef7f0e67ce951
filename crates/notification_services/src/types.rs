use std::borrow::Cow;

use rec_gov::AvailabilitySlot;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Errors raised while delivering a notification on one channel.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Building or submitting an email failed.
    #[error("Email error: {0}")]
    Email(String),

    /// Submitting a text message failed.
    #[error("SMS error: {0}")]
    Sms(String),

    /// Posting to the webhook failed before a response arrived.
    #[error("Webhook error: {0}")]
    Webhook(String),

    /// The remote end answered with a non-success status.
    #[error("{channel} endpoint rejected the notification with status {status}")]
    Rejected {
        /// Channel name
        channel: &'static str,
        /// HTTP status returned
        status: u16,
    },

    /// The external messaging provider is not installed or not configured.
    #[error("Messaging provider unavailable: {0}")]
    ProviderUnavailable(String),
}

/// Counts sent to structured channels instead of the full rich body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationSummary {
    /// Location display name
    pub park: String,
    /// Number of campsites with availability
    pub campsites: usize,
    /// Number of permits with availability
    pub permits: usize,
}

/// A fully formatted notification ready for dispatch.
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    /// Location the availability was found in
    pub location_name: String,
    /// Availability that triggered the notification
    pub slots: Vec<AvailabilitySlot>,
    /// Email subject line
    pub subject: String,
    /// HTML document with per-slot detail
    pub rich_body: String,
    /// One-line text summary
    pub plain_body: String,
    /// Structured counts
    pub summary: NotificationSummary,
}

/// All notification channels, in dispatch order.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct NotificationsConfig {
    /// SMTP email channel
    #[validate(nested)]
    pub email: EmailConfig,
    /// JSON webhook channel
    #[validate(nested)]
    pub webhook: WebhookConfig,
    /// Twilio text channel
    pub sms: SmsConfig,
}

/// SMTP email channel settings.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_email_config"))]
pub struct EmailConfig {
    /// Send email notifications
    pub enabled: bool,
    /// SMTP relay host, STARTTLS is required
    pub smtp_server: String,
    /// Submission port, 587 by default
    pub smtp_port: u16,
    /// From address, also the SMTP login
    pub sender_email: String,
    /// SMTP password or app password
    pub sender_password: String,
    /// Addresses every message is sent to
    pub recipient_emails: Vec<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_server: String::new(),
            smtp_port: 587,
            sender_email: String::new(),
            sender_password: String::new(),
            recipient_emails: Vec::new(),
        }
    }
}

/// Webhook channel settings (Slack, Discord or any JSON endpoint).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_webhook_config"))]
pub struct WebhookConfig {
    /// Post webhook notifications
    pub enabled: bool,
    /// Endpoint receiving the JSON envelope
    pub url: String,
}

/// Twilio text channel settings.
///
/// Credentials are optional here; a missing credential surfaces at dispatch time as
/// [`NotificationError::ProviderUnavailable`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    /// Send text notifications
    pub enabled: bool,
    /// Twilio account SID (`AC...`)
    pub twilio_account_sid: Option<String>,
    /// Twilio auth token
    pub twilio_auth_token: Option<String>,
    /// Sending number in E.164 form
    pub twilio_phone_number: Option<String>,
    /// Numbers every text is sent to
    pub recipient_phone_numbers: Vec<String>,
}

fn validate_email_config(config: &EmailConfig) -> Result<(), ValidationError> {
    if !config.enabled {
        return Ok(());
    }

    let missing: Vec<&str> = [
        ("smtp_server", config.smtp_server.is_empty()),
        ("sender_email", config.sender_email.is_empty()),
        ("sender_password", config.sender_password.is_empty()),
        ("recipient_emails", config.recipient_emails.is_empty()),
    ]
    .into_iter()
    .filter_map(|(field, is_missing)| is_missing.then_some(field))
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new("email_incomplete").with_message(Cow::Owned(format!(
            "Missing email configuration: {}",
            missing.join(", ")
        ))))
    }
}

fn validate_webhook_config(config: &WebhookConfig) -> Result<(), ValidationError> {
    if config.enabled && config.url.trim().is_empty() {
        return Err(ValidationError::new("webhook_url_missing")
            .with_message(Cow::Borrowed("Webhook URL not configured")));
    }
    Ok(())
}
