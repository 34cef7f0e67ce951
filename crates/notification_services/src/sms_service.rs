use async_trait::async_trait;
use log::info;
use reqwest::Client;
use serde::Deserialize;

use crate::types::{NotificationError, SmsConfig};

/// Base URL of the Twilio REST API
pub const TWILIO_API_URL: &str = "https://api.twilio.com/2010-04-01";

/// Trait for SMS service implementations
#[async_trait]
pub trait SmsService: Send + Sync {
    /// Send `message` to one phone number, returning the provider's message id
    async fn send_sms(&self, to: &str, message: &str) -> Result<String, NotificationError>;
}

/// Twilio Messages API implementation
pub struct TwilioSmsService {
    client: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

#[derive(Debug, Deserialize)]
struct TwilioMessageResponse {
    sid: String,
}

impl TwilioSmsService {
    /// Build a Twilio client from the SMS settings.
    ///
    /// Returns `None` when any credential is missing; the caller reports the provider
    /// as unavailable.
    pub fn from_config(config: &SmsConfig, client: Client) -> Option<Self> {
        let account_sid = non_empty(&config.twilio_account_sid)?;
        let auth_token = non_empty(&config.twilio_auth_token)?;
        let from_number = non_empty(&config.twilio_phone_number)?;

        Some(Self {
            client,
            base_url: TWILIO_API_URL.to_string(),
            account_sid,
            auth_token,
            from_number,
        })
    }

    /// Point the service at an alternate API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl SmsService for TwilioSmsService {
    async fn send_sms(&self, to: &str, message: &str) -> Result<String, NotificationError> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );
        let form = [
            ("To", to),
            ("From", self.from_number.as_str()),
            ("Body", message),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| NotificationError::Sms(format!("Twilio request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(NotificationError::Rejected {
                channel: "sms",
                status: response.status().as_u16(),
            });
        }

        let created: TwilioMessageResponse = response
            .json()
            .await
            .map_err(|e| NotificationError::Sms(format!("Failed to parse Twilio response: {}", e)))?;

        info!("SMS sent to {} ({})", to, created.sid);

        Ok(created.sid)
    }
}

/// SMS service that only logs, for dry runs
pub struct LogSmsService;

#[async_trait]
impl SmsService for LogSmsService {
    async fn send_sms(&self, to: &str, message: &str) -> Result<String, NotificationError> {
        info!("📱 [DRY RUN SMS] To: {}", to);
        info!("📱 [DRY RUN SMS] Message: {}", message);

        Ok(format!("dry-run-sms-{}", uuid::Uuid::new_v4()))
    }
}
