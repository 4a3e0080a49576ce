use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use domain::{
    ConnectError, ImageRef, LatestStatus, LinkState, PollError, PrintError, PrintJob,
    PrinterDriver, PrinterState, PrinterStatus,
};

use super::config::CoordinatorConfig;
use super::gate::OperationGate;
use super::link::LinkStateMachine;
use super::poller::StatusPoller;
use super::stats::{CoordinatorStats, Counters};
use super::submitter::PrintJobSubmitter;

/// Coordinator lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    NotStarted,
    Starting,
    Running,
    Stopped,
}

impl CoordinatorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

/// The single object callers use to talk to one printer.
///
/// Owns the link, the gate, the status poller and the print submitter. Hosts
/// keep one coordinator per configured printer.
pub struct SessionCoordinator {
    config: CoordinatorConfig,
    link: Arc<LinkStateMachine>,
    gate: Arc<OperationGate>,
    poller: Arc<StatusPoller>,
    submitter: PrintJobSubmitter,
    stop_token: CancellationToken,
    state_tx: watch::Sender<CoordinatorState>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator").finish_non_exhaustive()
    }
}

impl SessionCoordinator {
    pub fn new(driver: Arc<dyn PrinterDriver>, config: CoordinatorConfig) -> Self {
        let counters = Arc::new(Counters::default());
        let gate = Arc::new(OperationGate::new());
        let stop_token = CancellationToken::new();

        let link = Arc::new(LinkStateMachine::with_counters(
            driver,
            config.address.clone(),
            config.timeouts,
            config.backoff,
            counters.clone(),
        ));
        let poller = Arc::new(StatusPoller::new(
            link.clone(),
            gate.clone(),
            config.timeouts,
            config.poll_interval,
            counters.clone(),
        ));
        let submitter = PrintJobSubmitter::new(
            link.clone(),
            gate.clone(),
            config.timeouts,
            stop_token.clone(),
            counters.clone(),
        );
        let (state_tx, _) = watch::channel(CoordinatorState::NotStarted);

        Self {
            config,
            link,
            gate,
            poller,
            submitter,
            stop_token,
            state_tx,
            poll_task: Mutex::new(None),
            counters,
        }
    }

    pub fn address(&self) -> &str {
        &self.config.address
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state_tx.borrow()
    }

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    pub fn subscribe_link(&self) -> watch::Receiver<LinkState> {
        self.link.subscribe()
    }

    /// Most recent published status. Never blocks.
    pub fn latest_status(&self) -> LatestStatus {
        self.poller.latest()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<LatestStatus> {
        self.poller.subscribe()
    }

    /// Query the printer now instead of waiting for the next tick.
    /// Refused with `NotReady(Shutdown)` unless the coordinator is running.
    pub async fn poll_now(&self) -> Result<PrinterStatus, PollError> {
        if self.state() != CoordinatorState::Running {
            return Err(PollError::NotReady(ConnectError::Shutdown));
        }
        self.poller.poll_once().await
    }

    /// Coarse state for display (idle / printing / error / offline)
    pub fn printer_state(&self) -> PrinterState {
        PrinterState::from(&self.latest_status())
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.counters.snapshot()
    }

    /// Connect, take the first status snapshot and schedule recurring polls.
    ///
    /// Fails if the first poll cannot complete; the coordinator is then
    /// stopped and a new one must be built to try again.
    pub async fn start(&self) -> Result<(), ConnectError> {
        let mut poll_task = self.poll_task.lock().await;
        if self.state() != CoordinatorState::NotStarted {
            return Err(ConnectError::AlreadyStarted);
        }

        self.set_state(CoordinatorState::Starting);
        info!(address = %self.config.address, "Starting printer session coordinator");

        match self.poller.poll_once().await {
            Ok(status) => {
                info!(
                    address = %self.config.address,
                    state = PrinterState::from(&status).as_str(),
                    "Initial printer status received"
                );
            }
            Err(e) => {
                error!(address = %self.config.address, error = %e, "Failed to connect to printer on startup");
                self.stop_token.cancel();
                self.gate
                    .with_exclusive_access("shutdown", || self.link.shutdown())
                    .await;
                self.set_state(CoordinatorState::Stopped);
                return Err(self.startup_error(e));
            }
        }

        let poller = self.poller.clone();
        let cancel_token = self.stop_token.clone();
        *poll_task = Some(tokio::spawn(async move {
            poller.run(cancel_token).await;
        }));

        self.set_state(CoordinatorState::Running);
        Ok(())
    }

    /// Submit a print job and wait for it to be committed on paper
    pub async fn print(&self, job: PrintJob) -> Result<(), PrintError> {
        match self.state() {
            CoordinatorState::NotStarted => Err(PrintError::NotStarted),
            CoordinatorState::Stopped => Err(PrintError::Stopped),
            CoordinatorState::Starting | CoordinatorState::Running => {
                self.submitter.submit(job).await
            }
        }
    }

    pub async fn print_text(&self, text: impl Into<String>, font_size: u16) -> Result<(), PrintError> {
        self.print(PrintJob::text(text, font_size)).await
    }

    pub async fn print_image(&self, image: impl Into<ImageRef>) -> Result<(), PrintError> {
        self.print(PrintJob::image(image)).await
    }

    /// Stop polling, refuse new jobs and close the session.
    ///
    /// An operation already holding the gate finishes first. Jobs still
    /// waiting for the gate are refused with [`PrintError::Stopped`].
    pub async fn stop(&self) {
        let mut poll_task = self.poll_task.lock().await;
        if self.state() == CoordinatorState::Stopped {
            return;
        }

        info!(address = %self.config.address, "Stopping printer session coordinator");
        self.stop_token.cancel();

        if let Some(handle) = poll_task.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Status poll task ended abnormally");
            }
        }

        self.gate
            .with_exclusive_access("shutdown", || self.link.shutdown())
            .await;
        self.set_state(CoordinatorState::Stopped);

        let stats = self.stats();
        info!(
            address = %self.config.address,
            connect_attempts = stats.connect_attempts,
            polls_ok = stats.polls_ok,
            polls_failed = stats.polls_failed,
            jobs_ok = stats.jobs_ok,
            jobs_failed = stats.jobs_failed,
            "Printer session coordinator stopped"
        );
    }

    fn startup_error(&self, error: PollError) -> ConnectError {
        match error {
            PollError::NotReady(e) => e,
            PollError::Status(source) => ConnectError::Driver {
                address: self.config.address.clone(),
                source,
            },
        }
    }

    fn set_state(&self, next: CoordinatorState) {
        let previous = self.state_tx.send_replace(next);
        if previous != next {
            info!(
                address = %self.config.address,
                from = previous.as_str(),
                to = next.as_str(),
                "Coordinator state changed"
            );
        }
    }
}
