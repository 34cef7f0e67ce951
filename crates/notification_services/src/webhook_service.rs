use async_trait::async_trait;
use log::info;
use reqwest::Client;
use serde::Serialize;

use crate::dispatcher::NotificationChannel;
use crate::types::{NotificationError, NotificationPayload, NotificationSummary};

/// JSON body posted to the webhook.
///
/// `text` keeps Slack and Discord incoming webhooks happy; `summary` is for anything else.
#[derive(Debug, Serialize)]
pub struct WebhookEnvelope<'a> {
    /// Human readable message
    pub text: String,
    /// Structured counts
    pub summary: &'a NotificationSummary,
}

impl<'a> WebhookEnvelope<'a> {
    /// Wrap a summary in the webhook envelope
    pub fn new(summary: &'a NotificationSummary) -> Self {
        let pretty = serde_json::to_string_pretty(summary).unwrap_or_default();
        Self {
            text: format!("🏕️ New Availability Found!\n\n{}", pretty),
            summary,
        }
    }
}

/// Posts the structured summary of a notification to a configured URL
pub struct WebhookChannel {
    client: Client,
    url: String,
    dry_run: bool,
}

impl WebhookChannel {
    /// Create a channel posting to `url`
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            dry_run: false,
        }
    }

    /// Log the envelope instead of posting it
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
        let envelope = WebhookEnvelope::new(&payload.summary);

        if self.dry_run {
            info!("🔗 [DRY RUN WEBHOOK] {}", envelope.text);
            return Ok(());
        }

        let response = self
            .client
            .post(&self.url)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| NotificationError::Webhook(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotificationError::Rejected {
                channel: "webhook",
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }
}
