use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::Client;

use crate::email_service::{EmailService, LogEmailService, SmtpEmailService};
use crate::sms_service::{LogSmsService, SmsService, TwilioSmsService};
use crate::types::{NotificationError, NotificationPayload, NotificationsConfig};
use crate::webhook_service::WebhookChannel;

/// An independently configured notification delivery mechanism
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Deliver one notification
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), NotificationError>;
}

/// Sends the rich body to every configured email recipient
pub struct EmailChannel {
    service: Arc<dyn EmailService>,
    recipients: Vec<String>,
}

impl EmailChannel {
    /// Channel sending through `service` to `recipients`
    pub fn new(service: Arc<dyn EmailService>, recipients: Vec<String>) -> Self {
        Self {
            service,
            recipients,
        }
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
        self.service
            .send_email(&self.recipients, &payload.subject, &payload.rich_body)
            .await
            .map(|_| ())
    }
}

/// Sends the plain body to every configured phone number.
///
/// Holds no service when the messaging provider is not configured; every delivery then
/// fails with [`NotificationError::ProviderUnavailable`].
pub struct SmsChannel {
    service: Option<Arc<dyn SmsService>>,
    recipients: Vec<String>,
}

impl SmsChannel {
    /// Channel texting `recipients`; `None` when the provider is not configured
    pub fn new(service: Option<Arc<dyn SmsService>>, recipients: Vec<String>) -> Self {
        Self {
            service,
            recipients,
        }
    }
}

#[async_trait]
impl NotificationChannel for SmsChannel {
    fn name(&self) -> &'static str {
        "sms"
    }

    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
        let Some(service) = &self.service else {
            return Err(NotificationError::ProviderUnavailable(
                "Twilio credentials are not configured (twilio_account_sid, twilio_auth_token, twilio_phone_number)"
                    .to_string(),
            ));
        };

        let mut failures = Vec::new();

        for recipient in &self.recipients {
            if let Err(e) = service.send_sms(recipient, &payload.plain_body).await {
                warn!("Failed to send SMS to {}: {}", recipient, e);
                failures.push(recipient.as_str());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(NotificationError::Sms(format!(
                "{} of {} messages failed ({})",
                failures.len(),
                self.recipients.len(),
                failures.join(", ")
            )))
        }
    }
}

/// Fans a notification out to an ordered list of channels.
///
/// Each channel is attempted regardless of how the previous ones fared; failures are
/// logged and never reach the caller.
pub struct NotificationDispatcher {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationDispatcher {
    /// Dispatcher over an explicit channel list
    pub fn new(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    /// Build the enabled channels, in email, webhook, SMS order.
    ///
    /// Disabled channels are left out. With `dry_run` set, every channel logs what it
    /// would send instead of sending it.
    pub fn from_config(
        config: &NotificationsConfig,
        timeout: Duration,
        dry_run: bool,
    ) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Webhook(format!("Failed to create HTTP client: {}", e)))?;

        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

        if config.email.enabled {
            let service: Arc<dyn EmailService> = if dry_run {
                Arc::new(LogEmailService)
            } else {
                Arc::new(SmtpEmailService::new(&config.email, timeout)?)
            };
            channels.push(Box::new(EmailChannel::new(
                service,
                config.email.recipient_emails.clone(),
            )));
        }

        if config.webhook.enabled {
            channels.push(Box::new(
                WebhookChannel::new(client.clone(), config.webhook.url.clone()).dry_run(dry_run),
            ));
        }

        if config.sms.enabled {
            let service: Option<Arc<dyn SmsService>> = if dry_run {
                Some(Arc::new(LogSmsService))
            } else {
                TwilioSmsService::from_config(&config.sms, client)
                    .map(|service| Arc::new(service) as Arc<dyn SmsService>)
            };
            if service.is_none() {
                warn!("SMS notifications are enabled but Twilio is not configured");
            }
            channels.push(Box::new(SmsChannel::new(
                service,
                config.sms.recipient_phone_numbers.clone(),
            )));
        }

        Ok(Self::new(channels))
    }

    /// Names of the active channels, in dispatch order
    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|channel| channel.name()).collect()
    }

    /// Deliver `payload` on every channel, isolating failures per channel
    pub async fn dispatch(&self, payload: &NotificationPayload) {
        if self.channels.is_empty() {
            info!(
                "No notification channels enabled, skipping notification for {}",
                payload.location_name
            );
            return;
        }

        for channel in &self.channels {
            match channel.deliver(payload).await {
                Ok(()) => info!(
                    "{} notification sent for {}",
                    channel.name(),
                    payload.location_name
                ),
                Err(e @ NotificationError::Rejected { .. }) => {
                    warn!("{} notification not accepted: {}", channel.name(), e)
                }
                Err(e @ NotificationError::ProviderUnavailable(_)) => {
                    error!("Skipping {} notification: {}", channel.name(), e)
                }
                Err(e) => error!("Failed to send {} notification: {}", channel.name(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::types::{EmailConfig, NotificationSummary, SmsConfig, WebhookConfig};

    struct RecordingChannel {
        name: &'static str,
        fail: bool,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn deliver(&self, _payload: &NotificationPayload) -> Result<(), NotificationError> {
            self.calls.lock().unwrap().push(self.name);
            if self.fail {
                Err(NotificationError::Email("smtp connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct RecordingSms {
        sent: Mutex<Vec<(String, String)>>,
        fail_for: Option<&'static str>,
    }

    #[async_trait]
    impl SmsService for RecordingSms {
        async fn send_sms(&self, to: &str, message: &str) -> Result<String, NotificationError> {
            if self.fail_for == Some(to) {
                return Err(NotificationError::Sms("invalid number".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), message.to_string()));
            Ok("SM123".to_string())
        }
    }

    fn payload() -> NotificationPayload {
        NotificationPayload {
            location_name: "Yosemite".to_string(),
            slots: Vec::new(),
            subject: "🏕️ Availability Found: Yosemite".to_string(),
            rich_body: "<html>rich</html>".to_string(),
            plain_body: "New availability in Yosemite".to_string(),
            summary: NotificationSummary {
                park: "Yosemite".to_string(),
                campsites: 1,
                permits: 0,
            },
        }
    }

    #[tokio::test]
    async fn test_dispatch_continues_after_channel_failure() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = NotificationDispatcher::new(vec![
            Box::new(RecordingChannel {
                name: "email",
                fail: true,
                calls: calls.clone(),
            }),
            Box::new(RecordingChannel {
                name: "webhook",
                fail: false,
                calls: calls.clone(),
            }),
            Box::new(RecordingChannel {
                name: "sms",
                fail: false,
                calls: calls.clone(),
            }),
        ]);

        dispatcher.dispatch(&payload()).await;

        assert_eq!(*calls.lock().unwrap(), vec!["email", "webhook", "sms"]);
    }

    #[tokio::test]
    async fn test_sms_channel_without_provider_is_unavailable() {
        let channel = SmsChannel::new(None, vec!["+15551111111".to_string()]);

        let result = channel.deliver(&payload()).await;
        assert!(matches!(
            result,
            Err(NotificationError::ProviderUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_sms_channel_attempts_every_recipient() {
        let sms = Arc::new(RecordingSms {
            sent: Mutex::new(Vec::new()),
            fail_for: Some("+15550000001"),
        });
        let channel = SmsChannel::new(
            Some(sms.clone()),
            vec!["+15550000001".to_string(), "+15550000002".to_string()],
        );

        let result = channel.deliver(&payload()).await;

        assert!(matches!(result, Err(NotificationError::Sms(_))));
        let sent = sms.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+15550000002");
        assert_eq!(sent[0].1, "New availability in Yosemite");
    }

    #[test]
    fn test_from_config_keeps_only_enabled_channels_in_order() {
        let config = NotificationsConfig {
            email: EmailConfig {
                enabled: false,
                ..Default::default()
            },
            webhook: WebhookConfig {
                enabled: true,
                url: "https://hooks.example.com/abc".to_string(),
            },
            sms: SmsConfig {
                enabled: true,
                ..Default::default()
            },
        };

        let dispatcher =
            NotificationDispatcher::from_config(&config, Duration::from_secs(5), false).unwrap();
        assert_eq!(dispatcher.channel_names(), vec!["webhook", "sms"]);
    }

    #[test]
    fn test_from_config_dry_run_builds_email_without_smtp() {
        let config = NotificationsConfig {
            email: EmailConfig {
                enabled: true,
                sender_email: "not validated in dry run".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        let dispatcher =
            NotificationDispatcher::from_config(&config, Duration::from_secs(5), true).unwrap();
        assert_eq!(dispatcher.channel_names(), vec!["email"]);
    }
}
