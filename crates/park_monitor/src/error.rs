use std::path::PathBuf;

use notification_services::NotificationError;
use rec_gov::RecGovError;

/// Errors that abort monitor startup.
///
/// Failures during a pass (upstream calls, channel deliveries) are logged where they
/// happen and never surface as a `MonitorError`.
#[derive(thiserror::Error, Debug)]
pub enum MonitorError {
    /// Configuration file could not be read
    #[error("Failed to read configuration {}: {source}", .path.display())]
    Io {
        /// Path that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid YAML or has the wrong shape
    #[error("Invalid configuration YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration values failed validation
    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Upstream client could not be created
    #[error("Recreation.gov client error: {0}")]
    Client(#[from] RecGovError),

    /// A notification channel could not be set up
    #[error("Notification setup error: {0}")]
    Notification(#[from] NotificationError),
}
