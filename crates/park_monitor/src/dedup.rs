use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, Utc};
use rec_gov::{AvailabilitySlot, Location, partition_slots};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

/// How an availability result is reduced to a fingerprint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupStrategy {
    /// Location plus the number of campsites and permits found.
    ///
    /// Different sites with the same total do not trigger a new notification.
    #[default]
    Count,
    /// Location plus a digest of every (campground, site, date) and permit found
    Content,
}

/// Identity of "this shape of result for this location". Never includes time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NotificationFingerprint {
    /// Count based fingerprint
    Counts {
        /// Location display name
        location: String,
        /// Campsites with availability
        campsites: usize,
        /// Permits with availability
        permits: usize,
    },
    /// Content based fingerprint
    Content {
        /// Location display name
        location: String,
        /// Hex SHA-256 of the sorted slot lines
        digest: String,
    },
}

impl NotificationFingerprint {
    /// Fingerprint `slots` found for `location`
    pub fn compute(strategy: DedupStrategy, location: &Location, slots: &[AvailabilitySlot]) -> Self {
        let (campsites, permits) = partition_slots(slots);

        match strategy {
            DedupStrategy::Count => NotificationFingerprint::Counts {
                location: location.display_name.clone(),
                campsites: campsites.len(),
                permits: permits.len(),
            },
            DedupStrategy::Content => {
                let mut entries: Vec<String> = campsites
                    .iter()
                    .copied()
                    .flat_map(|site| {
                        site.available_dates.iter().map(move |date| {
                            format!("site|{}|{}|{}", site.campground_id, site.site_id, date)
                        })
                    })
                    .chain(
                        permits
                            .iter()
                            .map(|permit| format!("permit|{}", permit.permit_id)),
                    )
                    .collect();
                entries.sort();

                let mut hasher = Sha256::new();
                for entry in &entries {
                    hasher.update(entry.as_bytes());
                    hasher.update(b"\n");
                }

                NotificationFingerprint::Content {
                    location: location.display_name.clone(),
                    digest: hex::encode(hasher.finalize()),
                }
            }
        }
    }
}

/// A fingerprint and when it was first notified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupRecord {
    /// Fingerprint that was notified
    pub fingerprint: NotificationFingerprint,
    /// When the notification was dispatched
    pub last_notified_at: DateTime<Utc>,
}

/// Remembers every fingerprint already notified during this process.
///
/// Records are never updated or evicted; a restart starts from an empty history.
#[derive(Debug)]
pub struct DedupTracker {
    strategy: DedupStrategy,
    notified: HashMap<NotificationFingerprint, DateTime<Utc>>,
}

impl DedupTracker {
    /// Empty tracker using `strategy`
    pub fn new(strategy: DedupStrategy) -> Self {
        Self {
            strategy,
            notified: HashMap::new(),
        }
    }

    /// Whether `slots` for `location` are new.
    ///
    /// The first call for a fingerprint records it and returns `true`; every later call
    /// with the same fingerprint returns `false`.
    pub fn should_notify(&mut self, location: &Location, slots: &[AvailabilitySlot]) -> bool {
        let fingerprint = NotificationFingerprint::compute(self.strategy, location, slots);

        match self.notified.entry(fingerprint) {
            Entry::Occupied(entry) => {
                debug!(
                    "Already notified {:?} at {}",
                    entry.key(),
                    entry.get()
                );
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(Utc::now());
                true
            }
        }
    }

    /// Snapshot of every record held
    pub fn records(&self) -> Vec<DedupRecord> {
        self.notified
            .iter()
            .map(|(fingerprint, at)| DedupRecord {
                fingerprint: fingerprint.clone(),
                last_notified_at: *at,
            })
            .collect()
    }

    /// Number of distinct fingerprints notified
    pub fn len(&self) -> usize {
        self.notified.len()
    }

    /// Whether nothing has been notified yet
    pub fn is_empty(&self) -> bool {
        self.notified.is_empty()
    }
}
