use std::future::Future;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Single-holder gate in front of the printer link.
///
/// Waiters are served in arrival order (tokio's mutex is fair). The gate is
/// released when the operation returns, fails, or its future is dropped.
/// Not reentrant: an operation must never ask for the gate again.
#[derive(Debug, Default)]
pub struct OperationGate {
    lock: Mutex<()>,
}

impl OperationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_exclusive_access<F, Fut, T>(&self, label: &'static str, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let requested_at = Instant::now();
        let _guard = self.lock.lock().await;
        debug!(
            operation = label,
            waited_ms = requested_at.elapsed().as_millis() as u64,
            "Gate acquired"
        );
        operation().await
    }

    /// True while some operation holds the gate
    pub fn is_held(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}
