use askama::Template;
use rec_gov::{AvailabilitySlot, CampsiteSlot, DateRange, PermitSlot, partition_slots};

use crate::types::{NotificationPayload, NotificationSummary};

/// Dates listed inline per campsite before the rest are collapsed into an overflow count
pub const MAX_INLINE_DATES: usize = 5;

/// HTML email body; names coming from upstream are auto-escaped.
#[derive(Template)]
#[template(path = "availability_email.html")]
struct AvailabilityEmailTemplate<'a> {
    location_name: &'a str,
    range: String,
    campsites: Vec<CampsiteView<'a>>,
    permits: Vec<PermitView<'a>>,
}

struct CampsiteView<'a> {
    campground_id: &'a str,
    campground_name: &'a str,
    site_name: &'a str,
    dates: String,
}

struct PermitView<'a> {
    permit_id: &'a str,
    permit_name: &'a str,
}

/// Builds notification bodies for a location's availability.
///
/// Formatting is pure: the same inputs always yield the same bodies.
#[derive(Debug, Clone)]
pub struct NotificationFormatter {
    range: DateRange,
}

impl NotificationFormatter {
    /// Create a formatter that labels messages with the monitored `range`
    pub fn new(range: DateRange) -> Self {
        Self { range }
    }

    /// Email subject for `location_name`
    pub fn subject(&self, location_name: &str) -> String {
        format!("🏕️ Availability Found: {} - {}", location_name, self.range)
    }

    /// Render `(rich_body, plain_body)` for the given slots.
    ///
    /// Empty campsite or permit sections are left out of the rich body entirely.
    pub fn format(&self, location_name: &str, slots: &[AvailabilitySlot]) -> (String, String) {
        let (campsites, permits) = partition_slots(slots);

        (
            self.rich_body(location_name, &campsites, &permits),
            self.plain_body(location_name, campsites.len(), permits.len()),
        )
    }

    /// Format `slots` and bundle everything a dispatcher needs
    pub fn build_payload(
        &self,
        location_name: &str,
        slots: Vec<AvailabilitySlot>,
    ) -> NotificationPayload {
        let (rich_body, plain_body) = self.format(location_name, &slots);
        let (campsites, permits) = partition_slots(&slots);
        let summary = NotificationSummary {
            park: location_name.to_string(),
            campsites: campsites.len(),
            permits: permits.len(),
        };

        NotificationPayload {
            location_name: location_name.to_string(),
            subject: self.subject(location_name),
            rich_body,
            plain_body,
            summary,
            slots,
        }
    }

    fn rich_body(
        &self,
        location_name: &str,
        campsites: &[&CampsiteSlot],
        permits: &[&PermitSlot],
    ) -> String {
        AvailabilityEmailTemplate {
            location_name,
            range: self.range.to_string(),
            campsites: campsites
                .iter()
                .map(|site| CampsiteView {
                    campground_id: &site.campground_id,
                    campground_name: &site.campground_name,
                    site_name: &site.site_name,
                    dates: inline_dates(site),
                })
                .collect(),
            permits: permits
                .iter()
                .map(|permit| PermitView {
                    permit_id: &permit.permit_id,
                    permit_name: &permit.permit_name,
                })
                .collect(),
        }
        // rendering into a String has no failing writer
        .to_string()
    }

    fn plain_body(&self, location_name: &str, campsites: usize, permits: usize) -> String {
        let mut text = format!(
            "New availability in {} for {}! ",
            location_name, self.range
        );
        if campsites > 0 {
            text.push_str(&format!("{} campsites available. ", campsites));
        }
        if permits > 0 {
            text.push_str(&format!("{} permits available. ", permits));
        }
        text.push_str("Check your email for details.");
        text
    }
}

/// First [`MAX_INLINE_DATES`] dates of a site, then `... (+N more)` for the remainder
fn inline_dates(site: &CampsiteSlot) -> String {
    let mut dates = site
        .available_dates
        .iter()
        .take(MAX_INLINE_DATES)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let overflow = site.available_dates.len().saturating_sub(MAX_INLINE_DATES);
    if overflow > 0 {
        dates.push_str(&format!(" ... (+{} more)", overflow));
    }

    dates
}
