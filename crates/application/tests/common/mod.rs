#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use application::{BackoffPolicy, CoordinatorConfig, DriverTimeouts, SessionCoordinator};
use async_trait::async_trait;
use domain::{DeviceStatus, DriverError, DriverOperation, ImageRef, PrinterDriver, PrinterSession};

pub const ADDRESS: &str = "AA:BB:CC:DD:EE:FF";

// --- Scripted driver with fault injection and concurrency detection ---

#[derive(Default)]
struct Script {
    calls: Vec<String>,
    latency: Duration,
    connect_failures: usize,
    failures: Vec<(DriverOperation, DriverError)>,
    hangs: Vec<DriverOperation>,
    buffered: bool,
    device_error: Option<String>,
}

#[derive(Default)]
struct Shared {
    script: Mutex<Script>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Shared {
    async fn call(&self, operation: DriverOperation, detail: Option<&str>) -> Result<(), DriverError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let (latency, hang, failure) = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(match detail {
                Some(detail) => format!("{}:{}", operation, detail),
                None => operation.to_string(),
            });
            let hang = match script.hangs.iter().position(|op| *op == operation) {
                Some(index) => {
                    script.hangs.remove(index);
                    true
                }
                None => false,
            };
            let failure = script
                .failures
                .iter()
                .position(|(op, _)| *op == operation)
                .map(|index| script.failures.remove(index).1);
            (script.latency, hang, failure)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if hang {
            std::future::pending::<()>().await;
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct ScriptedDriver {
    shared: Arc<Shared>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.shared.script.lock().unwrap().latency = latency;
        self
    }

    /// Next `count` connection attempts fail
    pub fn fail_connects(&self, count: usize) {
        self.shared.script.lock().unwrap().connect_failures = count;
    }

    /// Next call of `operation` fails with `error`
    pub fn fail_next(&self, operation: DriverOperation, error: DriverError) {
        self.shared
            .script
            .lock()
            .unwrap()
            .failures
            .push((operation, error));
    }

    /// Next call of `operation` never returns
    pub fn hang_next(&self, operation: DriverOperation) {
        self.shared.script.lock().unwrap().hangs.push(operation);
    }

    pub fn set_device_error(&self, detail: Option<&str>) {
        self.shared.script.lock().unwrap().device_error = detail.map(str::to_string);
    }

    pub fn calls(&self) -> Vec<String> {
        self.shared.script.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.shared.script.lock().unwrap().calls.clear();
    }

    pub fn count(&self, operation: DriverOperation) -> usize {
        let name = operation.as_str();
        self.calls()
            .iter()
            .filter(|call| call.split(':').next() == Some(name))
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.shared.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn coordinator(&self, config: CoordinatorConfig) -> Arc<SessionCoordinator> {
        Arc::new(SessionCoordinator::new(Arc::new(self.clone()), config))
    }
}

#[async_trait]
impl PrinterDriver for ScriptedDriver {
    async fn open(&self, _address: &str) -> Result<Arc<dyn PrinterSession>, DriverError> {
        self.shared.call(DriverOperation::Connect, None).await?;

        let mut script = self.shared.script.lock().unwrap();
        if script.connect_failures > 0 {
            script.connect_failures -= 1;
            return Err(DriverError::Transport("device not found".to_string()));
        }
        script.buffered = false;

        Ok(Arc::new(ScriptedSession {
            shared: self.shared.clone(),
        }))
    }

    fn driver_type(&self) -> &'static str {
        "Scripted"
    }
}

struct ScriptedSession {
    shared: Arc<Shared>,
}

#[async_trait]
impl PrinterSession for ScriptedSession {
    async fn status(&self) -> Result<DeviceStatus, DriverError> {
        self.shared.call(DriverOperation::Status, None).await?;

        let script = self.shared.script.lock().unwrap();
        Ok(DeviceStatus {
            is_idle: !script.buffered && script.device_error.is_none(),
            has_error: script.device_error.is_some(),
            has_data: script.buffered,
            error_detail: script.device_error.clone(),
        })
    }

    async fn print_text(&self, text: &str, _font_size: u16) -> Result<(), DriverError> {
        self.shared
            .call(DriverOperation::PrintText, Some(text))
            .await?;
        self.shared.script.lock().unwrap().buffered = true;
        Ok(())
    }

    async fn print_image(&self, image: &ImageRef) -> Result<(), DriverError> {
        self.shared
            .call(DriverOperation::PrintImage, Some(image.as_str()))
            .await?;
        self.shared.script.lock().unwrap().buffered = true;
        Ok(())
    }

    async fn flush(&self) -> Result<(), DriverError> {
        self.shared.call(DriverOperation::Flush, None).await?;
        self.shared.script.lock().unwrap().buffered = false;
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.shared.call(DriverOperation::Close, None).await
    }
}

// --- Config helpers ---

pub fn config() -> CoordinatorConfig {
    CoordinatorConfig::new(ADDRESS)
        .with_poll_interval(Duration::from_secs(30))
        .with_backoff(BackoffPolicy::disabled())
}

pub fn short_timeouts() -> DriverTimeouts {
    DriverTimeouts {
        connect: Duration::from_secs(1),
        status: Duration::from_secs(1),
        print: Duration::from_secs(1),
        flush: Duration::from_secs(1),
        close: Duration::from_secs(1),
    }
}

pub fn transport(reason: &str) -> DriverError {
    DriverError::Transport(reason.to_string())
}
