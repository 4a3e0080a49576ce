use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use domain::{ConnectError, DriverOperation, LinkState, PrinterDriver, PrinterSession};

use super::config::{BackoffPolicy, DriverTimeouts};
use super::stats::Counters;

struct LinkInner {
    session: Option<Arc<dyn PrinterSession>>,
    connect_failures: u32,
    retry_at: Option<Instant>,
    shut_down: bool,
}

/// Owns the printer session and every transition of [`LinkState`].
///
/// Reconnection is lazy: nothing reconnects in the background, the next
/// operation calls [`ensure_ready`](Self::ensure_ready) and that single path
/// covers both "never connected" and "connection lost".
pub struct LinkStateMachine {
    driver: Arc<dyn PrinterDriver>,
    address: String,
    timeouts: DriverTimeouts,
    backoff: BackoffPolicy,
    inner: Mutex<LinkInner>,
    abandoned: AtomicBool,
    state_tx: watch::Sender<LinkState>,
    counters: Arc<Counters>,
}

impl LinkStateMachine {
    pub fn new(
        driver: Arc<dyn PrinterDriver>,
        address: impl Into<String>,
        timeouts: DriverTimeouts,
        backoff: BackoffPolicy,
    ) -> Self {
        Self::with_counters(
            driver,
            address.into(),
            timeouts,
            backoff,
            Arc::new(Counters::default()),
        )
    }

    pub(crate) fn with_counters(
        driver: Arc<dyn PrinterDriver>,
        address: String,
        timeouts: DriverTimeouts,
        backoff: BackoffPolicy,
        counters: Arc<Counters>,
    ) -> Self {
        let (state_tx, _) = watch::channel(LinkState::default());
        Self {
            driver,
            address,
            timeouts,
            backoff,
            inner: Mutex::new(LinkInner {
                session: None,
                connect_failures: 0,
                retry_at: None,
                shut_down: false,
            }),
            abandoned: AtomicBool::new(false),
            state_tx,
            counters,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn state(&self) -> LinkState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state_tx.subscribe()
    }

    pub fn connect_attempts(&self) -> u64 {
        self.counters.snapshot().connect_attempts
    }

    /// Return the open session, opening a new one if needed.
    ///
    /// A caller arriving while another attempt is in progress waits for that
    /// attempt and then reuses its session.
    pub async fn ensure_ready(&self) -> Result<Arc<dyn PrinterSession>, ConnectError> {
        let mut inner = self.inner.lock().await;

        if inner.shut_down {
            return Err(ConnectError::Shutdown);
        }

        if self.abandoned.swap(false, Ordering::AcqRel) {
            if let Some(session) = inner.session.take() {
                info!(address = %self.address, "Discarding session left with uncommitted data");
                self.close_session(session).await;
            }
        }

        if let Some(session) = &inner.session {
            return Ok(session.clone());
        }

        if let Some(retry_at) = inner.retry_at {
            let now = Instant::now();
            if retry_at > now {
                debug!(address = %self.address, "Reconnect suppressed by backoff");
                return Err(ConnectError::BackingOff {
                    address: self.address.clone(),
                    retry_in: retry_at - now,
                });
            }
        }

        if self.state().is_transitioning() {
            debug!(address = %self.address, "Previous connection attempt was interrupted");
        }
        let connecting = self
            .state()
            .to_connecting()
            .unwrap_or(LinkState::Connecting);
        self.transition(connecting);

        let attempt = self.counters.record_connect_attempt();
        info!(address = %self.address, attempt, "Connecting to printer");

        match self
            .timeouts
            .run(DriverOperation::Connect, self.driver.open(&self.address))
            .await
        {
            Ok(session) => {
                inner.session = Some(session.clone());
                inner.connect_failures = 0;
                inner.retry_at = None;
                let ready = LinkState::Connecting
                    .to_ready()
                    .unwrap_or(LinkState::Ready);
                self.transition(ready);
                info!(address = %self.address, "Connected to thermal printer");
                Ok(session)
            }
            Err(e) => {
                inner.connect_failures = inner.connect_failures.saturating_add(1);
                let delay = self.backoff.delay_for(inner.connect_failures);
                inner.retry_at = (!delay.is_zero()).then(|| Instant::now() + delay);

                error!(
                    address = %self.address,
                    failures = inner.connect_failures,
                    backoff_ms = delay.as_millis() as u64,
                    error = %e,
                    "Failed to connect to printer"
                );
                self.transition(self.state().to_faulted(e.to_string()));
                Err(ConnectError::Driver {
                    address: self.address.clone(),
                    source: e,
                })
            }
        }
    }

    /// Drop a session found broken mid-use. Idempotent: a repeated fault keeps
    /// the first reason.
    pub async fn fault(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let mut inner = self.inner.lock().await;

        if inner.shut_down {
            debug!(address = %self.address, reason = %reason, "Fault after shutdown ignored");
            return;
        }

        let session = inner.session.take();
        if session.is_none() && self.state().is_faulted() {
            debug!(address = %self.address, reason = %reason, "Link already faulted");
            return;
        }

        if let Some(session) = session {
            self.close_session(session).await;
        }

        warn!(address = %self.address, reason = %reason, "Printer link faulted");
        self.transition(self.state().to_faulted(reason));
    }

    /// Mark the session unusable without waiting for the link lock.
    ///
    /// For operations cut short mid-sequence (a dropped print future): the
    /// session may hold uncommitted data, so the next `ensure_ready` closes it
    /// and opens a fresh one.
    pub fn abandon(&self, reason: impl Into<String>) {
        self.abandoned.store(true, Ordering::Release);
        let reason = reason.into();
        warn!(address = %self.address, reason = %reason, "Printer session abandoned");
        self.transition(self.state().to_faulted(reason));
    }

    /// Close the session for good. Later `ensure_ready` calls are refused.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;

        if let Some(session) = inner.session.take() {
            self.close_session(session).await;
        }

        if !inner.shut_down {
            inner.shut_down = true;
            info!(address = %self.address, "Printer link shut down");
        }
        self.transition(self.state().to_disconnected());
    }

    async fn close_session(&self, session: Arc<dyn PrinterSession>) {
        if let Err(e) = self
            .timeouts
            .run(DriverOperation::Close, session.close())
            .await
        {
            warn!(address = %self.address, error = %e, "Error while closing printer session");
        }
    }

    fn transition(&self, next: LinkState) {
        let previous = self.state_tx.send_replace(next.clone());
        if previous != next {
            debug!(address = %self.address, from = %previous, to = %next, "Link state changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::{DeviceStatus, DriverError, ImageRef};
    use mockall::mock;
    use std::time::Duration;

    const ADDRESS: &str = "AA:BB:CC:DD:EE:FF";

    mock! {
        Driver {}
        #[async_trait]
        impl PrinterDriver for Driver {
            async fn open(&self, address: &str) -> Result<Arc<dyn PrinterSession>, DriverError>;
            fn driver_type(&self) -> &'static str;
        }
    }

    mock! {
        Session {}
        #[async_trait]
        impl PrinterSession for Session {
            async fn status(&self) -> Result<DeviceStatus, DriverError>;
            async fn print_text(&self, text: &str, font_size: u16) -> Result<(), DriverError>;
            async fn print_image(&self, image: &ImageRef) -> Result<(), DriverError>;
            async fn flush(&self) -> Result<(), DriverError>;
            async fn close(&self) -> Result<(), DriverError>;
        }
    }

    fn session_expecting_close(times: usize) -> Arc<dyn PrinterSession> {
        let mut session = MockSession::new();
        session.expect_close().times(times).returning(|| Ok(()));
        Arc::new(session)
    }

    fn machine(driver: MockDriver, backoff: BackoffPolicy) -> LinkStateMachine {
        LinkStateMachine::new(
            Arc::new(driver),
            ADDRESS,
            DriverTimeouts::default(),
            backoff,
        )
    }

    #[tokio::test]
    async fn test_connects_once_and_reuses_session() {
        let session = session_expecting_close(0);
        let mut driver = MockDriver::new();
        driver
            .expect_open()
            .withf(|address| address == ADDRESS)
            .times(1)
            .returning(move |_| Ok(session.clone()));

        let link = machine(driver, BackoffPolicy::disabled());
        assert_eq!(link.state(), LinkState::Disconnected);

        let first = link.ensure_ready().await.unwrap();
        let second = link.ensure_ready().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(link.state(), LinkState::Ready);
        assert_eq!(link.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_faults_link() {
        let mut driver = MockDriver::new();
        driver
            .expect_open()
            .times(1)
            .returning(|_| Err(DriverError::Transport("device not found".to_string())));

        let link = machine(driver, BackoffPolicy::disabled());
        let err = link.ensure_ready().await.err().unwrap();

        assert!(matches!(err, ConnectError::Driver { .. }));
        assert!(link.state().is_faulted());
        assert_eq!(
            link.state().reason(),
            Some("Transport error: device not found")
        );
    }

    #[tokio::test]
    async fn test_fault_closes_session_and_next_call_reconnects_once() {
        let first = session_expecting_close(1);
        let second = session_expecting_close(0);
        let mut sessions = vec![second, first];

        let mut driver = MockDriver::new();
        driver
            .expect_open()
            .times(2)
            .returning(move |_| Ok(sessions.pop().unwrap()));

        let link = machine(driver, BackoffPolicy::default());
        link.ensure_ready().await.unwrap();

        link.fault("notify characteristic lost").await;
        assert_eq!(
            link.state(),
            LinkState::Faulted("notify characteristic lost".to_string())
        );

        // Idempotent: no second close, first reason kept
        link.fault("another reason").await;
        assert_eq!(link.state().reason(), Some("notify characteristic lost"));

        // A mid-use fault does not open a backoff window
        link.ensure_ready().await.unwrap();
        assert_eq!(link.state(), LinkState::Ready);
        assert_eq!(link.connect_attempts(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_session_is_replaced_on_next_use() {
        let first = session_expecting_close(1);
        let second = session_expecting_close(0);
        let mut sessions = vec![second, first];

        let mut driver = MockDriver::new();
        driver
            .expect_open()
            .times(2)
            .returning(move |_| Ok(sessions.pop().unwrap()));

        let link = machine(driver, BackoffPolicy::default());
        let before = link.ensure_ready().await.unwrap();

        link.abandon("print interrupted before flush");
        assert_eq!(link.state().reason(), Some("print interrupted before flush"));

        let after = link.ensure_ready().await.unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(link.state(), LinkState::Ready);
        assert_eq!(link.connect_attempts(), 2);

        // Only one replacement per abandon
        let again = link.ensure_ready().await.unwrap();
        assert!(Arc::ptr_eq(&after, &again));
    }

    #[tokio::test]
    async fn test_shutdown_closes_session_and_refuses_reconnect() {
        let session = session_expecting_close(1);
        let mut driver = MockDriver::new();
        driver
            .expect_open()
            .times(1)
            .returning(move |_| Ok(session.clone()));

        let link = machine(driver, BackoffPolicy::disabled());
        link.ensure_ready().await.unwrap();

        link.shutdown().await;
        assert_eq!(link.state(), LinkState::Disconnected);
        assert_eq!(link.ensure_ready().await.err(), Some(ConnectError::Shutdown));

        // Safe to repeat, and faults after shutdown are ignored
        link.shutdown().await;
        link.fault("late").await;
        assert_eq!(link.state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn test_shutdown_when_never_connected() {
        let driver = MockDriver::new();
        let link = machine(driver, BackoffPolicy::disabled());

        link.shutdown().await;

        assert_eq!(link.state(), LinkState::Disconnected);
        assert_eq!(link.connect_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_after_connect_failures() {
        let mut driver = MockDriver::new();
        driver
            .expect_open()
            .times(2)
            .returning(|_| Err(DriverError::Transport("out of range".to_string())));

        let link = machine(
            driver,
            BackoffPolicy {
                initial: Duration::from_secs(1),
                max: Duration::from_secs(30),
            },
        );

        assert!(matches!(
            link.ensure_ready().await,
            Err(ConnectError::Driver { .. })
        ));

        // Inside the window: fail fast without touching the driver
        match link.ensure_ready().await {
            Err(ConnectError::BackingOff { retry_in, .. }) => {
                assert!(retry_in <= Duration::from_secs(1));
            }
            other => panic!("expected BackingOff, got {:?}", other.err()),
        }
        assert_eq!(link.connect_attempts(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(matches!(
            link.ensure_ready().await,
            Err(ConnectError::Driver { .. })
        ));
        assert_eq!(link.connect_attempts(), 2);

        // Second failure doubles the window
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(matches!(
            link.ensure_ready().await,
            Err(ConnectError::BackingOff { .. })
        ));
    }

    struct HangingDriver;

    #[async_trait]
    impl PrinterDriver for HangingDriver {
        async fn open(&self, _address: &str) -> Result<Arc<dyn PrinterSession>, DriverError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(DriverError::Transport("unreachable".to_string()))
        }

        fn driver_type(&self) -> &'static str {
            "Hanging"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_faults_link() {
        let timeouts = DriverTimeouts {
            connect: Duration::from_millis(200),
            ..DriverTimeouts::default()
        };
        let link = LinkStateMachine::new(
            Arc::new(HangingDriver),
            ADDRESS,
            timeouts,
            BackoffPolicy::disabled(),
        );

        match link.ensure_ready().await {
            Err(ConnectError::Driver { source, .. }) => assert_eq!(
                source,
                DriverError::Timeout {
                    operation: DriverOperation::Connect,
                    after: Duration::from_millis(200),
                }
            ),
            other => panic!("expected connect timeout, got {:?}", other.err()),
        }
        assert!(link.state().is_faulted());
    }
}
