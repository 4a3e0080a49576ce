use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use domain::{DriverOperation, LatestStatus, PollError, PrinterState, PrinterStatus};

use super::config::DriverTimeouts;
use super::gate::OperationGate;
use super::link::LinkStateMachine;
use super::stats::Counters;

/// Floor for the poll cadence; a zero interval would spin the loop
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Periodic status query; sole writer of the published [`LatestStatus`]
pub struct StatusPoller {
    link: Arc<LinkStateMachine>,
    gate: Arc<OperationGate>,
    timeouts: DriverTimeouts,
    interval: Duration,
    status_tx: watch::Sender<LatestStatus>,
    counters: Arc<Counters>,
}

impl StatusPoller {
    pub(crate) fn new(
        link: Arc<LinkStateMachine>,
        gate: Arc<OperationGate>,
        timeouts: DriverTimeouts,
        interval: Duration,
        counters: Arc<Counters>,
    ) -> Self {
        let (status_tx, _) = watch::channel(LatestStatus::Pending);
        if interval < MIN_POLL_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                min_ms = MIN_POLL_INTERVAL.as_millis() as u64,
                "Poll interval too short, using minimum"
            );
        }
        Self {
            link,
            gate,
            timeouts,
            interval: interval.max(MIN_POLL_INTERVAL),
            status_tx,
            counters,
        }
    }

    pub fn latest(&self) -> LatestStatus {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LatestStatus> {
        self.status_tx.subscribe()
    }

    /// Run one poll cycle and publish its outcome
    pub async fn poll_once(&self) -> Result<PrinterStatus, PollError> {
        self.gate
            .with_exclusive_access("status_poll", || async {
                let result = self.query().await;
                self.publish(&result);
                result
            })
            .await
    }

    async fn query(&self) -> Result<PrinterStatus, PollError> {
        let session = self.link.ensure_ready().await?;

        match self
            .timeouts
            .run(DriverOperation::Status, session.status())
            .await
        {
            Ok(device) => Ok(PrinterStatus::observed(device, Utc::now())),
            Err(e) => {
                self.link.fault(format!("status query failed: {}", e)).await;
                Err(PollError::Status(e))
            }
        }
    }

    fn publish(&self, result: &Result<PrinterStatus, PollError>) {
        match result {
            Ok(status) => {
                self.counters.record_poll(true);
                debug!(
                    state = PrinterState::from(status).as_str(),
                    has_data = status.has_data(),
                    "Printer status updated"
                );
                self.status_tx.send_replace(LatestStatus::Available(status.clone()));
            }
            Err(e) => {
                self.counters.record_poll(false);
                let reason = e.to_string();
                self.status_tx.send_modify(|latest| {
                    *latest = std::mem::take(latest).into_unavailable(reason, Utc::now());
                });
            }
        }
    }

    /// Poll on a fixed cadence until cancelled. The first tick fires one
    /// interval from now (startup already polled once). A cycle in progress
    /// is never interrupted by cancellation.
    pub async fn run(&self, cancel_token: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            address = %self.link.address(),
            interval_secs = self.interval.as_secs_f64(),
            "Starting status poll loop"
        );

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!(address = %self.link.address(), "Status poll loop stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        warn!(address = %self.link.address(), error = %e, "Error communicating with printer");
                    }
                }
            }
        }
    }
}
