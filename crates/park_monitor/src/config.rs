use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use log::LevelFilter;
use notification_services::NotificationsConfig;
use rec_gov::{DateRange, Location};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};
use validator::{Validate, ValidationError};

use crate::dedup::DedupStrategy;
use crate::error::MonitorError;

/// Environment variable overriding `notifications.email.sender_password`
pub const SMTP_PASSWORD_ENV: &str = "PARK_MONITOR_SMTP_PASSWORD";
/// Environment variable overriding `notifications.sms.twilio_auth_token`
pub const TWILIO_AUTH_TOKEN_ENV: &str = "PARK_MONITOR_TWILIO_AUTH_TOKEN";
/// Environment variable overriding `notifications.webhook.url`
pub const WEBHOOK_URL_ENV: &str = "PARK_MONITOR_WEBHOOK_URL";

/// Root of the monitor configuration file
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MonitorConfig {
    /// Date range to look for availability in
    #[validate(nested)]
    pub target_dates: TargetDates,

    /// Parks to monitor, in scan order
    #[validate(length(min = 1, message = "At least one park must be configured"), nested)]
    pub parks: Vec<ParkConfig>,

    /// Polling cadence
    #[validate(nested)]
    pub monitoring: MonitoringConfig,

    /// Notification channels
    #[serde(default)]
    #[validate(nested)]
    pub notifications: NotificationsConfig,

    /// Log output
    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingConfig,
}

/// Inclusive target date range, as ISO-8601 dates
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_target_dates"))]
pub struct TargetDates {
    /// First night of interest
    pub start_date: NaiveDate,
    /// Last night of interest, inclusive
    pub end_date: NaiveDate,
}

/// A monitored park
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ParkConfig {
    /// Display name used in logs and notifications
    #[validate(length(min = 1, message = "Park name is required"))]
    pub name: String,

    /// Recreation.gov entity id; accepts a YAML string or number
    #[serde(deserialize_with = "deserialize_entity_id")]
    #[validate(length(min = 1, message = "Park id is required"))]
    pub park_id: String,

    /// Scan the park's campgrounds
    #[serde(default = "default_true")]
    pub check_camping: bool,

    /// Scan the park's permits
    #[serde(default)]
    pub check_permits: bool,
}

/// Polling cadence and upstream courtesy settings
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MonitoringConfig {
    /// Minutes between the end of one pass and the start of the next
    #[validate(range(min = 1, message = "check_interval_minutes must be at least 1"))]
    pub check_interval_minutes: u64,

    /// Pause between two locations within a pass
    #[serde(default = "default_request_delay_seconds")]
    pub request_delay_seconds: u64,

    /// Timeout applied to each individual HTTP request
    #[serde(default = "default_request_timeout_seconds")]
    #[validate(range(min = 1, message = "request_timeout_seconds must be at least 1"))]
    pub request_timeout_seconds: u64,

    /// How notifications are fingerprinted for duplicate suppression
    #[serde(default)]
    pub dedup_strategy: DedupStrategy,
}

/// Log output settings
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level filter (`error`, `warn`, `info`, `debug`, `trace`; case-insensitive)
    #[validate(custom(function = "validate_log_level"))]
    pub level: String,
    /// Append log lines to this file as well
    pub log_file: Option<PathBuf>,
    /// Write log lines to stderr
    pub console_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
            console_output: true,
        }
    }
}

impl LoggingConfig {
    /// Parsed level filter, `Info` when unparseable
    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.level).unwrap_or(LevelFilter::Info)
    }
}

impl MonitorConfig {
    /// Target dates as a validated range
    pub fn date_range(&self) -> Result<DateRange, MonitorError> {
        Ok(DateRange::new(
            self.target_dates.start_date,
            self.target_dates.end_date,
        )?)
    }

    /// Configured parks as monitor locations, in configured order
    pub fn locations(&self) -> Vec<Location> {
        self.parks
            .iter()
            .map(|park| Location {
                id: park.park_id.clone(),
                display_name: park.name.clone(),
                check_camping: park.check_camping,
                check_permits: park.check_permits,
            })
            .collect()
    }

    /// Wait between passes
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.monitoring.check_interval_minutes * 60)
    }

    /// Courtesy pause between locations
    pub fn request_delay(&self) -> Duration {
        Duration::from_secs(self.monitoring.request_delay_seconds)
    }

    /// Per-request timeout for upstream and notification calls
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.monitoring.request_timeout_seconds)
    }

    /// Replace secrets with values from the environment when present.
    ///
    /// `lookup` is `std::env::var` in production.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(password) = lookup(SMTP_PASSWORD_ENV) {
            debug!("Using SMTP password from {}", SMTP_PASSWORD_ENV);
            self.notifications.email.sender_password = password;
        }
        if let Some(token) = lookup(TWILIO_AUTH_TOKEN_ENV) {
            debug!("Using Twilio auth token from {}", TWILIO_AUTH_TOKEN_ENV);
            self.notifications.sms.twilio_auth_token = Some(token);
        }
        if let Some(url) = lookup(WEBHOOK_URL_ENV) {
            debug!("Using webhook URL from {}", WEBHOOK_URL_ENV);
            self.notifications.webhook.url = url;
        }
    }
}

/// Parse a configuration document without validating it
pub fn parse_config(raw: &str) -> Result<MonitorConfig, MonitorError> {
    Ok(serde_yaml::from_str(raw)?)
}

/// Load, override from the environment, and validate the configuration at `path`.
pub fn load_config(path: &Path) -> Result<MonitorConfig, MonitorError> {
    let raw = std::fs::read_to_string(path).map_err(|source| MonitorError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut config = parse_config(&raw)?;
    config.apply_env_overrides(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    config.validate()?;

    info!(
        "Loaded configuration from {} ({} parks, {} to {})",
        path.display(),
        config.parks.len(),
        config.target_dates.start_date,
        config.target_dates.end_date
    );

    Ok(config)
}

fn default_true() -> bool {
    true
}

fn default_request_delay_seconds() -> u64 {
    2
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn deserialize_entity_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum EntityId {
        Text(String),
        Number(u64),
    }

    Ok(match EntityId::deserialize(deserializer)? {
        EntityId::Text(id) => id,
        EntityId::Number(id) => id.to_string(),
    })
}

fn validate_target_dates(dates: &TargetDates) -> Result<(), ValidationError> {
    if dates.end_date < dates.start_date {
        return Err(ValidationError::new("invalid_date_range")
            .with_message(Cow::Borrowed("end_date must not be before start_date")));
    }
    Ok(())
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    LevelFilter::from_str(level)
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_log_level"))
}
