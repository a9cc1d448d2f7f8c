//! Live position acquisition and upstream reporting for a responder unit.
//!
//! One `LocationReporter` exists per responder session. The device side
//! pushes fixes through the `PositionWatch` handle (a continuous watch
//! subscription, not a one-shot read); the reporter sends the latest known
//! fix upstream either on explicit operator action (`report_now`) or on a
//! fixed 30-second cadence while automatic mode is enabled.
//!
//! A report may use a fix slightly stale relative to the newest acquisition
//! callback; the acquisition stream and the report timer are independent
//! and only eventual consistency of the reported position is guaranteed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::geo::Coordinates;
use crate::models::unit::{ResponderService, UnitStatus};

/// Automatic reporting period.
pub const AUTO_REPORT_INTERVAL_SECS: u64 = 30;

/// A position delivered by the device's acquisition subscription.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    pub coordinates: Coordinates,
    pub at: DateTime<Utc>,
}

/// One upstream position report, in the normalized internal shape.
/// Per-service wire field naming (`ambulanceId` vs `truckId`) is an
/// adapter concern inside the API client.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationReport {
    pub unit_id: i64,
    pub coordinates: Coordinates,
    pub status: Option<UnitStatus>,
}

/// Upstream destination for position reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn report(
        &self,
        service: ResponderService,
        report: &LocationReport,
    ) -> Result<(), ApiError>;
}

#[async_trait]
impl ReportSink for ApiClient {
    async fn report(
        &self,
        service: ResponderService,
        report: &LocationReport,
    ) -> Result<(), ApiError> {
        self.report_location(service, report).await
    }
}

/// Outcome of one report attempt, surfaced to the operator.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    Sent {
        at: DateTime<Utc>,
        coordinates: Coordinates,
    },
    Failed {
        at: DateTime<Utc>,
        message: String,
    },
}

/// Device-side handle feeding fixes into the session's single acquisition
/// subscription.
pub struct PositionWatch {
    tx: watch::Sender<Option<PositionFix>>,
}

impl PositionWatch {
    /// Push a new fix; replaces the previous one.
    pub fn update(&self, coordinates: Coordinates) {
        let _ = self.tx.send(Some(PositionFix {
            coordinates,
            at: Utc::now(),
        }));
    }
}

async fn send_report(
    sink: &dyn ReportSink,
    service: ResponderService,
    report: &LocationReport,
    events: &mpsc::UnboundedSender<ReportEvent>,
) -> Result<(), ApiError> {
    match sink.report(service, report).await {
        Ok(()) => {
            debug!(unit_id = report.unit_id, position = %report.coordinates, "Location reported");
            let _ = events.send(ReportEvent::Sent {
                at: Utc::now(),
                coordinates: report.coordinates,
            });
            Ok(())
        }
        Err(e) => {
            warn!(unit_id = report.unit_id, error = %e, "Location report failed");
            let _ = events.send(ReportEvent::Failed {
                at: Utc::now(),
                message: e.to_string(),
            });
            Err(e)
        }
    }
}

/// Per-session position reporter for one responder unit.
///
/// Constructing the reporter creates the session's only acquisition
/// channel, so duplicate subscriptions cannot exist. Automatic mode owns at
/// most one timer task: enabling twice is a no-op, disabling aborts the
/// task and any pending report. Dropping the reporter tears the timer down.
pub struct LocationReporter {
    sink: Arc<dyn ReportSink>,
    service: ResponderService,
    unit_id: i64,
    status: Option<UnitStatus>,
    position_rx: watch::Receiver<Option<PositionFix>>,
    events_tx: mpsc::UnboundedSender<ReportEvent>,
    auto_task: Option<JoinHandle<()>>,
}

impl LocationReporter {
    /// Build a reporter for one unit; returns the device-side watch handle
    /// and the operator-facing event stream alongside it.
    pub fn new(
        sink: Arc<dyn ReportSink>,
        service: ResponderService,
        unit_id: i64,
    ) -> (
        Self,
        PositionWatch,
        mpsc::UnboundedReceiver<ReportEvent>,
    ) {
        let (position_tx, position_rx) = watch::channel(None);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        (
            Self {
                sink,
                service,
                unit_id,
                status: None,
                position_rx,
                events_tx,
                auto_task: None,
            },
            PositionWatch { tx: position_tx },
            events_rx,
        )
    }

    pub fn unit_id(&self) -> i64 {
        self.unit_id
    }

    /// Status attached to ambulance reports. Takes effect on the next
    /// manual report, or when automatic mode is (re-)enabled.
    pub fn set_status(&mut self, status: Option<UnitStatus>) {
        self.status = status;
    }

    /// Latest fix delivered by the acquisition subscription, if any.
    pub fn latest_fix(&self) -> Option<PositionFix> {
        *self.position_rx.borrow()
    }

    /// Immediately report the latest known position upstream.
    pub async fn report_now(&self) -> Result<()> {
        let fix = self.latest_fix().context("No position fix available yet")?;
        let report = LocationReport {
            unit_id: self.unit_id,
            coordinates: fix.coordinates,
            status: self.status,
        };
        send_report(self.sink.as_ref(), self.service, &report, &self.events_tx).await?;
        Ok(())
    }

    /// Turn on automatic reporting.
    ///
    /// Idempotent: if a timer is already running this does nothing, so two
    /// enables never produce two timers. Ticks with no fix yet are skipped;
    /// a failed report is surfaced and the next tick proceeds
    /// independently, with no backoff.
    pub fn enable_automatic(&mut self) {
        if self.auto_task.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!(unit_id = self.unit_id, "Automatic location reporting already enabled");
            return;
        }

        let sink = Arc::clone(&self.sink);
        let service = self.service;
        let unit_id = self.unit_id;
        let status = self.status;
        let position_rx = self.position_rx.clone();
        let events = self.events_tx.clone();

        self.auto_task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(AUTO_REPORT_INTERVAL_SECS)).await;
                let latest = *position_rx.borrow();
                let Some(fix) = latest else {
                    continue;
                };
                let report = LocationReport {
                    unit_id,
                    coordinates: fix.coordinates,
                    status,
                };
                let _ = send_report(sink.as_ref(), service, &report, &events).await;
            }
        }));
        info!(unit_id = self.unit_id, "Automatic location reporting enabled");
    }

    pub fn automatic_enabled(&self) -> bool {
        self.auto_task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Turn off automatic reporting, cancelling any pending report.
    pub fn disable_automatic(&mut self) {
        if let Some(task) = self.auto_task.take() {
            task.abort();
            info!(unit_id = self.unit_id, "Automatic location reporting disabled");
        }
    }

    /// Deterministic teardown at session end (logout/unmount).
    pub fn shutdown(&mut self) {
        self.disable_automatic();
    }
}

impl Drop for LocationReporter {
    fn drop(&mut self) {
        if let Some(task) = self.auto_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingSink {
        calls: AtomicUsize,
        last: Mutex<Option<LocationReport>>,
    }

    #[async_trait]
    impl ReportSink for CountingSink {
        async fn report(
            &self,
            _service: ResponderService,
            report: &LocationReport,
        ) -> Result<(), ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(report.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FailingSink {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReportSink for FailingSink {
        async fn report(
            &self,
            _service: ResponderService,
            _report: &LocationReport,
        ) -> Result<(), ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::ServerError("upstream boom".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_automatic_is_idempotent() {
        let sink = Arc::new(CountingSink::default());
        let (mut reporter, device, _events) =
            LocationReporter::new(sink.clone(), ResponderService::Ambulance, 3);
        device.update(Coordinates::new(18.52, 73.85));

        reporter.enable_automatic();
        reporter.enable_automatic(); // second enable must not add a timer

        // 95 simulated seconds cover ticks at 30, 60 and 90.
        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_cancels_timer() {
        let sink = Arc::new(CountingSink::default());
        let (mut reporter, device, _events) =
            LocationReporter::new(sink.clone(), ResponderService::Fire, 9);
        device.update(Coordinates::new(18.50, 73.80));

        reporter.enable_automatic();
        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);

        reporter.disable_automatic();
        assert!(!reporter.automatic_enabled());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reports_keep_timer_and_subscription_alive() {
        let sink = Arc::new(FailingSink::default());
        let (mut reporter, device, mut events) =
            LocationReporter::new(sink.clone(), ResponderService::Ambulance, 3);
        device.update(Coordinates::new(18.52, 73.85));

        reporter.enable_automatic();
        tokio::time::sleep(Duration::from_secs(65)).await;

        // Both ticks attempted despite failures; the timer is still on.
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
        assert!(reporter.automatic_enabled());

        // Fixes keep flowing on the acquisition side.
        device.update(Coordinates::new(18.53, 73.86));
        assert!(reporter.latest_fix().is_some());

        let event = events.try_recv().unwrap();
        assert!(matches!(event, ReportEvent::Failed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_without_fix_are_skipped() {
        let sink = Arc::new(CountingSink::default());
        let (mut reporter, device, _events) =
            LocationReporter::new(sink.clone(), ResponderService::Ambulance, 3);

        reporter.enable_automatic();
        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);

        // First fix arrives; the next tick picks it up.
        device.update(Coordinates::new(18.52, 73.85));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_report_now_uses_latest_fix() {
        let sink = Arc::new(CountingSink::default());
        let (mut reporter, device, mut events) =
            LocationReporter::new(sink.clone(), ResponderService::Ambulance, 3);
        reporter.set_status(Some(UnitStatus::EnRoute));

        device.update(Coordinates::new(18.52, 73.85));
        device.update(Coordinates::new(18.53, 73.86));

        reporter.report_now().await.unwrap();

        let last = sink.last.lock().unwrap().clone().unwrap();
        assert_eq!(last.unit_id, 3);
        assert_eq!(last.coordinates, Coordinates::new(18.53, 73.86));
        assert_eq!(last.status, Some(UnitStatus::EnRoute));

        let event = events.try_recv().unwrap();
        assert!(matches!(event, ReportEvent::Sent { .. }));
    }

    #[tokio::test]
    async fn test_report_now_without_fix_is_an_error() {
        let sink = Arc::new(CountingSink::default());
        let (reporter, _device, _events) =
            LocationReporter::new(sink.clone(), ResponderService::Fire, 9);

        assert!(reporter.report_now().await.is_err());
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    }
}
