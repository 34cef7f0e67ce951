//! # Notification Services
//!
//! This crate turns availability results into notifications and delivers them.
//! It includes the message formatter, the email, webhook and SMS channels, and the
//! dispatcher that fans a message out to every enabled channel.

/// Channel configuration, payloads and errors.
pub mod types;
/// Rich and plain message bodies built from availability results.
pub mod formatter;
/// SMTP email delivery.
pub mod email_service;
/// Twilio text message delivery.
pub mod sms_service;
/// JSON webhook delivery.
pub mod webhook_service;
/// Per-channel isolated fan-out.
pub mod dispatcher;

pub use dispatcher::{EmailChannel, NotificationChannel, NotificationDispatcher, SmsChannel};
pub use email_service::{EmailService, LogEmailService, SmtpEmailService};
pub use formatter::{MAX_INLINE_DATES, NotificationFormatter};
pub use sms_service::{LogSmsService, SmsService, TwilioSmsService};
pub use types::*;
pub use webhook_service::WebhookChannel;
