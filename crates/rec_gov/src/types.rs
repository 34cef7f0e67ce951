use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A park or recreation area being monitored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Recreation.gov entity id of the park
    pub id: String,
    /// Name used in logs and notifications
    pub display_name: String,
    /// Whether campground availability is scanned for this location
    pub check_camping: bool,
    /// Whether permit availability is scanned for this location
    pub check_permits: bool,
}

/// Inclusive calendar range the monitor is looking for availability in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First night of interest
    pub start_date: NaiveDate,
    /// Last night of interest (inclusive)
    pub end_date: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting an end date before the start date.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, RecGovError> {
        if end_date < start_date {
            return Err(RecGovError::InvalidDateRange);
        }

        Ok(Self {
            start_date,
            end_date,
        })
    }

    /// Whether `date` falls inside the range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start_date.format("%Y-%m-%d"),
            self.end_date.format("%Y-%m-%d")
        )
    }
}

/// A campsite with at least one bookable night in the target range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampsiteSlot {
    /// Upstream campground entity id
    pub campground_id: String,
    /// Campground display name
    pub campground_name: String,
    /// Upstream campsite id
    pub site_id: String,
    /// Site label, the id when upstream gives none
    pub site_name: String,
    /// Bookable nights, ascending
    pub available_dates: Vec<NaiveDate>,
}

/// A permit or ticket type reported as available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitSlot {
    /// Upstream permit or ticket id
    pub permit_id: String,
    /// Permit display name
    pub permit_name: String,
}

/// One unit of availability found for a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AvailabilitySlot {
    /// A campsite with open nights
    Campsite(CampsiteSlot),
    /// An open permit
    Permit(PermitSlot),
}

impl From<CampsiteSlot> for AvailabilitySlot {
    fn from(slot: CampsiteSlot) -> Self {
        AvailabilitySlot::Campsite(slot)
    }
}

impl From<PermitSlot> for AvailabilitySlot {
    fn from(slot: PermitSlot) -> Self {
        AvailabilitySlot::Permit(slot)
    }
}

/// Split a mixed slot list into its campsite and permit parts, preserving order.
pub fn partition_slots(slots: &[AvailabilitySlot]) -> (Vec<&CampsiteSlot>, Vec<&PermitSlot>) {
    let mut campsites = Vec::new();
    let mut permits = Vec::new();

    for slot in slots {
        match slot {
            AvailabilitySlot::Campsite(site) => campsites.push(site),
            AvailabilitySlot::Permit(permit) => permits.push(permit),
        }
    }

    (campsites, permits)
}

/// Errors raised while talking to Recreation.gov
#[derive(thiserror::Error, Debug)]
pub enum RecGovError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    /// Rate limited by the upstream API
    #[error("Rate limited by Recreation.gov")]
    RateLimited,

    /// Entity does not exist upstream
    #[error("Entity not found")]
    NotFound,

    /// Response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Range end before range start
    #[error("Invalid date range: end date must not be before start date")]
    InvalidDateRange,
}
