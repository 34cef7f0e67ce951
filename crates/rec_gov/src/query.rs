use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::client::{AvailabilityApi, CampgroundAvailabilityResponse};
use crate::types::{CampsiteSlot, DateRange, Location, PermitSlot};

/// Upstream status marking a bookable night. Every other status is treated as unavailable.
pub const AVAILABLE_STATUS: &str = "Available";

/// Search entity type of a campground
const CAMPGROUND_ENTITY_TYPE: &str = "campground";

/// Scans locations for open campsites and permits within a fixed date range.
///
/// Upstream failures never escape: a failed listing yields an empty result for that
/// location and a failed campground lookup is skipped without aborting the scan.
pub struct AvailabilityQuery {
    api: Arc<dyn AvailabilityApi>,
    range: DateRange,
}

impl AvailabilityQuery {
    /// Create a query over `range` backed by `api`
    pub fn new(api: Arc<dyn AvailabilityApi>, range: DateRange) -> Self {
        Self { api, range }
    }

    /// Collect every campsite of `location` with at least one available night.
    pub async fn query_campsites(&self, location: &Location) -> Vec<CampsiteSlot> {
        info!(
            "Checking campground availability for {}",
            location.display_name
        );

        let entities = match self.api.search_entities(&location.id).await {
            Ok(entities) => entities,
            Err(e) => {
                warn!(
                    "Failed to fetch campgrounds for {}: {}",
                    location.display_name, e
                );
                return Vec::new();
            }
        };

        let mut slots = Vec::new();

        for entity in entities
            .iter()
            .filter(|entity| entity.entity_type == CAMPGROUND_ENTITY_TYPE)
        {
            let campground_name = entity
                .name
                .clone()
                .unwrap_or_else(|| entity.entity_id.clone());

            match self
                .api
                .campground_availability(&entity.entity_id, &self.range)
                .await
            {
                Ok(response) => slots.extend(collect_campsite_slots(
                    &entity.entity_id,
                    &campground_name,
                    &response,
                    &self.range,
                )),
                Err(e) => warn!(
                    "Skipping campground {} ({}): {}",
                    campground_name, entity.entity_id, e
                ),
            }
        }

        debug!(
            "{} campsites with availability in {}",
            slots.len(),
            location.display_name
        );

        slots
    }

    /// Permit availability for `location`.
    ///
    /// Recreation.gov exposes a different availability protocol per permit type and none
    /// of them is implemented, so this always reports no permits.
    pub async fn query_permits(&self, location: &Location) -> Vec<PermitSlot> {
        info!("Checking permit availability for {}", location.display_name);
        debug!(
            "No permit availability protocol for {}, reporting none",
            location.id
        );
        Vec::new()
    }
}

/// Turn one campground's availability response into campsite slots.
///
/// Sites without any available night in `range` are dropped.
pub fn collect_campsite_slots(
    campground_id: &str,
    campground_name: &str,
    response: &CampgroundAvailabilityResponse,
    range: &DateRange,
) -> Vec<CampsiteSlot> {
    response
        .campsites
        .iter()
        .filter_map(|(site_id, data)| {
            let available_dates = available_dates(&data.availabilities, range);
            if available_dates.is_empty() {
                return None;
            }

            Some(CampsiteSlot {
                campground_id: campground_id.to_string(),
                campground_name: campground_name.to_string(),
                site_id: site_id.clone(),
                site_name: data.site.clone().unwrap_or_else(|| site_id.clone()),
                available_dates,
            })
        })
        .collect()
}

fn available_dates(availabilities: &BTreeMap<String, String>, range: &DateRange) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = availabilities
        .iter()
        .filter(|(_, status)| status.as_str() == AVAILABLE_STATUS)
        .filter_map(|(date, _)| parse_upstream_date(date))
        .filter(|date| range.contains(*date))
        .collect();

    dates.sort();
    dates.dedup();
    dates
}

/// Parse an upstream date key (`2026-06-01T00:00:00Z` or `2026-06-01`)
fn parse_upstream_date(raw: &str) -> Option<NaiveDate> {
    let parsed = raw
        .get(..10)
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok());

    if parsed.is_none() {
        warn!("Failed to parse date: {}", raw);
    }

    parsed
}
