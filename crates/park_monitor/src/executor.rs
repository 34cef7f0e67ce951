use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use notification_services::{NotificationDispatcher, NotificationFormatter};
use rec_gov::{AvailabilityApi, AvailabilityQuery, AvailabilitySlot, Location, RecGovClient};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::config::MonitorConfig;
use crate::dedup::DedupTracker;
use crate::error::MonitorError;

/// Timing of the poll loop
#[derive(Debug, Clone)]
pub struct PollLoopConfig {
    /// Wait after a pass before the next one starts
    pub check_interval: Duration,
    /// Pause between two locations within a pass
    pub location_delay: Duration,
}

/// What happened to one location during a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationOutcome {
    /// Nothing available
    NoAvailability,
    /// Availability found but already notified
    AlreadyNotified,
    /// Availability found and dispatched
    Notified,
    /// Processing panicked; the pass moved on
    Failed,
}

/// Totals for one pass over every location
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Locations visited, failed ones included
    pub locations_checked: usize,
    /// Locations whose availability was dispatched
    pub notifications_sent: usize,
    /// Locations whose processing panicked
    pub locations_failed: usize,
}

/// Drives availability checks over all configured locations.
///
/// Locations are scanned one after the other. Nothing that goes wrong for one
/// location stops the pass, and nothing that goes wrong in one pass stops the schedule.
pub struct PollLoop {
    locations: Vec<Location>,
    query: AvailabilityQuery,
    dedup: DedupTracker,
    formatter: NotificationFormatter,
    dispatcher: NotificationDispatcher,
    config: PollLoopConfig,
}

impl PollLoop {
    /// Assemble a poll loop from already built parts
    pub fn new(
        locations: Vec<Location>,
        query: AvailabilityQuery,
        dedup: DedupTracker,
        formatter: NotificationFormatter,
        dispatcher: NotificationDispatcher,
        config: PollLoopConfig,
    ) -> Self {
        Self {
            locations,
            query,
            dedup,
            formatter,
            dispatcher,
            config,
        }
    }

    /// Wire a poll loop from the monitor configuration
    pub fn from_config(
        config: &MonitorConfig,
        api: Arc<dyn AvailabilityApi>,
        dispatcher: NotificationDispatcher,
    ) -> Result<Self, MonitorError> {
        let range = config.date_range()?;

        Ok(Self::new(
            config.locations(),
            AvailabilityQuery::new(api, range),
            DedupTracker::new(config.monitoring.dedup_strategy),
            NotificationFormatter::new(range),
            dispatcher,
            PollLoopConfig {
                check_interval: config.check_interval(),
                location_delay: config.request_delay(),
            },
        ))
    }

    /// Build the Recreation.gov client and the enabled notification channels, then wire
    /// the loop.
    ///
    /// With `dry_run` set, notifications are logged instead of sent.
    pub fn connect(config: &MonitorConfig, dry_run: bool) -> Result<Self, MonitorError> {
        let client = RecGovClient::new(config.request_timeout())?;
        let dispatcher = NotificationDispatcher::from_config(
            &config.notifications,
            config.request_timeout(),
            dry_run,
        )?;

        if dry_run {
            info!("Dry run: notifications will be logged, not sent");
        }
        let channels = dispatcher.channel_names();
        info!(
            "Notification channels: {}",
            if channels.is_empty() {
                "none".to_string()
            } else {
                channels.join(", ")
            }
        );

        Self::from_config(config, Arc::new(client), dispatcher)
    }

    /// Dedup state accumulated so far
    pub fn dedup(&self) -> &DedupTracker {
        &self.dedup
    }

    /// Run a single pass, catching anything that escapes it.
    pub async fn run_once(&mut self) -> PassReport {
        match AssertUnwindSafe(self.check_all_locations())
            .catch_unwind()
            .await
        {
            Ok(report) => report,
            Err(_) => {
                error!("Availability check aborted unexpectedly, waiting for next cycle");
                PassReport::default()
            }
        }
    }

    /// Run a pass now, then again after every interval, until `shutdown` turns true.
    ///
    /// Shutdown is only observed between passes; a pass in progress always completes.
    pub async fn run_scheduled(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting scheduled monitoring (checking every {} minutes)",
            self.config.check_interval.as_secs() / 60
        );

        loop {
            self.run_once().await;

            tokio::select! {
                _ = sleep(self.config.check_interval) => {}
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }

        info!(
            "Monitoring stopped, {} distinct notifications sent",
            self.dedup.len()
        );
        for record in self.dedup.records() {
            debug!(
                "Notified {:?} at {}",
                record.fingerprint, record.last_notified_at
            );
        }
    }

    async fn check_all_locations(&mut self) -> PassReport {
        info!("Starting availability check for all parks");

        let mut report = PassReport::default();
        let locations = self.locations.clone();

        for (index, location) in locations.iter().enumerate() {
            if index > 0 && !self.config.location_delay.is_zero() {
                sleep(self.config.location_delay).await;
            }

            let outcome = match AssertUnwindSafe(self.check_location(location))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!("Checking {} failed unexpectedly", location.display_name);
                    LocationOutcome::Failed
                }
            };

            report.locations_checked += 1;
            match outcome {
                LocationOutcome::Notified => report.notifications_sent += 1,
                LocationOutcome::Failed => report.locations_failed += 1,
                LocationOutcome::NoAvailability | LocationOutcome::AlreadyNotified => {}
            }
        }

        info!(
            "Availability check completed: {} parks, {} notifications, {} failures",
            report.locations_checked, report.notifications_sent, report.locations_failed
        );

        report
    }

    async fn check_location(&mut self, location: &Location) -> LocationOutcome {
        info!("Checking {}...", location.display_name);

        let mut slots: Vec<AvailabilitySlot> = Vec::new();

        if location.check_camping {
            slots.extend(
                self.query
                    .query_campsites(location)
                    .await
                    .into_iter()
                    .map(AvailabilitySlot::from),
            );
        }

        if location.check_permits {
            slots.extend(
                self.query
                    .query_permits(location)
                    .await
                    .into_iter()
                    .map(AvailabilitySlot::from),
            );
        }

        if slots.is_empty() {
            info!("No availability found in {}", location.display_name);
            return LocationOutcome::NoAvailability;
        }

        if !self.dedup.should_notify(location, &slots) {
            debug!(
                "Availability in {} unchanged since last notification",
                location.display_name
            );
            return LocationOutcome::AlreadyNotified;
        }

        info!("Found availability in {}!", location.display_name);

        let payload = self.formatter.build_payload(&location.display_name, slots);
        self.dispatcher.dispatch(&payload).await;

        LocationOutcome::Notified
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            // sender gone, nobody can ask us to stop any more
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use notification_services::{
        NotificationChannel, NotificationError, NotificationPayload, NotificationSummary,
    };
    use rec_gov::{CampgroundAvailabilityResponse, DateRange, RecGovError, SearchEntity};
    use tokio::time::Instant;

    use super::*;
    use crate::config::parse_config;
    use crate::dedup::DedupStrategy;

    /// Upstream stand-in: one campground per park, availability editable between passes.
    #[derive(Default)]
    struct FakeRecGov {
        failing_parks: Vec<String>,
        panicking_parks: Vec<String>,
        open_sites: Mutex<HashMap<String, usize>>,
        listings: AtomicUsize,
        listed_at: Mutex<Vec<Instant>>,
    }

    impl FakeRecGov {
        fn set_open_sites(&self, park_id: &str, count: usize) {
            self.open_sites
                .lock()
                .unwrap()
                .insert(park_id.to_string(), count);
        }
    }

    #[async_trait]
    impl AvailabilityApi for FakeRecGov {
        async fn search_entities(&self, parent_id: &str) -> Result<Vec<SearchEntity>, RecGovError> {
            self.listings.fetch_add(1, Ordering::SeqCst);
            self.listed_at.lock().unwrap().push(Instant::now());
            if self.panicking_parks.iter().any(|p| p == parent_id) {
                panic!("malformed upstream state");
            }
            if self.failing_parks.iter().any(|p| p == parent_id) {
                return Err(RecGovError::Status(503));
            }
            Ok(vec![SearchEntity {
                entity_id: format!("cg-{}", parent_id),
                entity_type: "campground".to_string(),
                name: Some(format!("Campground {}", parent_id)),
            }])
        }

        async fn campground_availability(
            &self,
            campground_id: &str,
            _range: &DateRange,
        ) -> Result<CampgroundAvailabilityResponse, RecGovError> {
            let park_id = campground_id.trim_start_matches("cg-");
            let count = self
                .open_sites
                .lock()
                .unwrap()
                .get(park_id)
                .copied()
                .unwrap_or(0);

            let mut campsites = serde_json::Map::new();
            for site in 0..count {
                campsites.insert(
                    format!("{}", 100 + site),
                    serde_json::json!({
                        "site": format!("S{}", site),
                        "availabilities": {
                            "2026-06-01T00:00:00Z": "Available",
                            "2026-06-02T00:00:00Z": "Reserved"
                        }
                    }),
                );
            }

            serde_json::from_value(serde_json::json!({ "campsites": campsites }))
                .map_err(|e| RecGovError::Decode(e.to_string()))
        }
    }

    struct RecordingChannel {
        name: &'static str,
        fail: bool,
        delivered: Arc<Mutex<Vec<NotificationSummary>>>,
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn deliver(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
            if self.fail {
                return Err(NotificationError::Email("connection refused".to_string()));
            }
            self.delivered.lock().unwrap().push(payload.summary.clone());
            Ok(())
        }
    }

    fn park(id: &str, name: &str) -> Location {
        Location {
            id: id.to_string(),
            display_name: name.to_string(),
            check_camping: true,
            check_permits: false,
        }
    }

    fn build_loop(
        api: Arc<FakeRecGov>,
        locations: Vec<Location>,
        check_interval: Duration,
    ) -> (PollLoop, Arc<Mutex<Vec<NotificationSummary>>>) {
        build_loop_with_delay(api, locations, check_interval, Duration::ZERO)
    }

    fn build_loop_with_delay(
        api: Arc<FakeRecGov>,
        locations: Vec<Location>,
        check_interval: Duration,
        location_delay: Duration,
    ) -> (PollLoop, Arc<Mutex<Vec<NotificationSummary>>>) {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
        )
        .unwrap();
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = NotificationDispatcher::new(vec![
            Box::new(RecordingChannel {
                name: "email",
                fail: true,
                delivered: delivered.clone(),
            }),
            Box::new(RecordingChannel {
                name: "webhook",
                fail: false,
                delivered: delivered.clone(),
            }),
        ]);

        let poll_loop = PollLoop::new(
            locations,
            AvailabilityQuery::new(api, range),
            DedupTracker::new(DedupStrategy::Count),
            NotificationFormatter::new(range),
            dispatcher,
            PollLoopConfig {
                check_interval,
                location_delay,
            },
        );

        (poll_loop, delivered)
    }

    #[tokio::test]
    async fn test_identical_passes_notify_once() {
        let api = Arc::new(FakeRecGov::default());
        api.set_open_sites("2991", 2);
        let (mut poll_loop, delivered) = build_loop(
            api.clone(),
            vec![park("2991", "Yosemite")],
            Duration::from_secs(60),
        );

        let first = poll_loop.run_once().await;
        let second = poll_loop.run_once().await;

        assert_eq!(first.notifications_sent, 1);
        assert_eq!(second.notifications_sent, 0);
        assert_eq!(delivered.lock().unwrap().len(), 1);
        assert_eq!(poll_loop.dedup().len(), 1);
    }

    #[tokio::test]
    async fn test_changed_count_notifies_again() {
        let api = Arc::new(FakeRecGov::default());
        api.set_open_sites("2991", 1);
        let (mut poll_loop, delivered) = build_loop(
            api.clone(),
            vec![park("2991", "Yosemite")],
            Duration::from_secs(60),
        );

        poll_loop.run_once().await;
        api.set_open_sites("2991", 3);
        poll_loop.run_once().await;

        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].campsites, 1);
        assert_eq!(delivered[1].campsites, 3);
    }

    #[tokio::test]
    async fn test_failed_listing_does_not_stop_the_pass() {
        let api = Arc::new(FakeRecGov {
            failing_parks: vec!["1111".to_string()],
            ..Default::default()
        });
        api.set_open_sites("2991", 1);
        let (mut poll_loop, delivered) = build_loop(
            api.clone(),
            vec![park("1111", "Broken Park"), park("2991", "Yosemite")],
            Duration::from_secs(60),
        );

        let report = poll_loop.run_once().await;

        assert_eq!(report.locations_checked, 2);
        assert_eq!(report.notifications_sent, 1);
        assert_eq!(delivered.lock().unwrap()[0].park, "Yosemite");
    }

    #[tokio::test]
    async fn test_panicking_location_is_isolated() {
        let api = Arc::new(FakeRecGov {
            panicking_parks: vec!["6666".to_string()],
            ..Default::default()
        });
        api.set_open_sites("2991", 1);
        let (mut poll_loop, delivered) = build_loop(
            api.clone(),
            vec![park("6666", "Cursed Park"), park("2991", "Yosemite")],
            Duration::from_secs(60),
        );

        let report = poll_loop.run_once().await;

        assert_eq!(report.locations_failed, 1);
        assert_eq!(report.notifications_sent, 1);
        assert_eq!(delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_results_are_not_fingerprinted() {
        let api = Arc::new(FakeRecGov::default());
        let (mut poll_loop, delivered) = build_loop(
            api.clone(),
            vec![park("2991", "Yosemite")],
            Duration::from_secs(60),
        );

        let report = poll_loop.run_once().await;

        assert_eq!(report.notifications_sent, 0);
        assert!(poll_loop.dedup().is_empty());
        assert!(delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_camping_disabled_skips_campground_scan() {
        let api = Arc::new(FakeRecGov::default());
        api.set_open_sites("2733", 4);
        let mut pinnacles = park("2733", "Pinnacles");
        pinnacles.check_camping = false;
        pinnacles.check_permits = true;
        let (mut poll_loop, delivered) =
            build_loop(api.clone(), vec![pinnacles], Duration::from_secs(60));

        poll_loop.run_once().await;

        assert_eq!(api.listings.load(Ordering::SeqCst), 0);
        assert!(delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scheduled_stops_after_current_pass_when_already_signalled() {
        let api = Arc::new(FakeRecGov::default());
        let (mut poll_loop, _) = build_loop(
            api.clone(),
            vec![park("2991", "Yosemite")],
            Duration::from_secs(15 * 60),
        );
        let (_tx, rx) = watch::channel(true);

        poll_loop.run_scheduled(rx).await;

        assert_eq!(api.listings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_repeats_on_interval_until_shutdown() {
        let api = Arc::new(FakeRecGov::default());
        let (mut poll_loop, _) = build_loop(
            api.clone(),
            vec![park("2991", "Yosemite")],
            Duration::from_secs(15 * 60),
        );
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            sleep(Duration::from_secs(31 * 60)).await;
            tx.send(true).unwrap();
        });

        poll_loop.run_scheduled(rx).await;

        // passes at 0, 15 and 30 minutes
        assert_eq!(api.listings.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_only_between_locations() {
        let api = Arc::new(FakeRecGov::default());
        let (mut poll_loop, _) = build_loop_with_delay(
            api.clone(),
            vec![
                park("2991", "Yosemite"),
                park("2733", "Pinnacles"),
                park("2931", "Sequoia"),
            ],
            Duration::from_secs(15 * 60),
            Duration::from_secs(2),
        );
        let started = Instant::now();

        let report = poll_loop.run_once().await;

        assert_eq!(report.locations_checked, 3);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
        let offsets: Vec<Duration> = api
            .listed_at
            .lock()
            .unwrap()
            .iter()
            .map(|at| at.duration_since(started))
            .collect();
        assert_eq!(
            offsets,
            vec![
                Duration::ZERO,
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    const CONNECT_CONFIG: &str = r#"
target_dates: { start_date: "2026-06-01", end_date: "2026-06-30" }
parks:
  - name: Yosemite
    park_id: 2991
monitoring: { check_interval_minutes: 15 }
notifications:
  email:
    enabled: true
    smtp_server: smtp.example.com
    sender_email: not an address
    sender_password: secret
    recipient_emails: [ranger@example.com]
"#;

    #[tokio::test]
    async fn test_connect_reports_broken_channel_setup() {
        let config = parse_config(CONNECT_CONFIG).unwrap();

        let result = PollLoop::connect(&config, false);

        assert!(matches!(result, Err(MonitorError::Notification(_))));
    }

    #[tokio::test]
    async fn test_connect_dry_run_skips_channel_setup() {
        let config = parse_config(CONNECT_CONFIG).unwrap();

        let poll_loop = PollLoop::connect(&config, true).unwrap();

        assert!(poll_loop.dedup().is_empty());
    }
}
