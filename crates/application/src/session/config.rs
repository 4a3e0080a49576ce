use std::future::Future;
use std::time::Duration;

use domain::printer::DEFAULT_POLL_INTERVAL_SECS;
use domain::{DriverError, DriverOperation};
use infrastructure::config::PrinterConfig;

/// Upper bound for each kind of driver call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverTimeouts {
    pub connect: Duration,
    pub status: Duration,
    pub print: Duration,
    pub flush: Duration,
    pub close: Duration,
}

impl DriverTimeouts {
    pub fn for_operation(&self, operation: DriverOperation) -> Duration {
        match operation {
            DriverOperation::Connect => self.connect,
            DriverOperation::Status => self.status,
            DriverOperation::PrintText | DriverOperation::PrintImage => self.print,
            DriverOperation::Flush => self.flush,
            DriverOperation::Close => self.close,
        }
    }

    /// Run a driver call, treating an overrun as a driver failure
    pub async fn run<T, F>(&self, operation: DriverOperation, call: F) -> Result<T, DriverError>
    where
        F: Future<Output = Result<T, DriverError>>,
    {
        let limit = self.for_operation(operation);
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::Timeout {
                operation,
                after: limit,
            }),
        }
    }
}

impl Default for DriverTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            status: Duration::from_secs(5),
            print: Duration::from_secs(30),
            flush: Duration::from_secs(15),
            close: Duration::from_secs(5),
        }
    }
}

/// Delay before another connection attempt after consecutive connect failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    /// Every `ensure_ready` may attempt a connection
    pub fn disabled() -> Self {
        Self {
            initial: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Exponential: initial, 2x, 4x ... capped at `max`
    pub fn delay_for(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 || self.initial.is_zero() {
            return Duration::ZERO;
        }
        let exponent = (consecutive_failures - 1).min(16);
        self.initial
            .saturating_mul(2u32.pow(exponent))
            .min(self.max.max(self.initial))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

/// Settings for one coordinator instance (one printer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub address: String,
    pub poll_interval: Duration,
    pub timeouts: DriverTimeouts,
    pub backoff: BackoffPolicy,
}

impl CoordinatorConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            timeouts: DriverTimeouts::default(),
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_timeouts(mut self, timeouts: DriverTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn from_printer_config(printer: &PrinterConfig) -> Self {
        let timeouts = &printer.timeouts;
        Self {
            address: printer.address.clone(),
            poll_interval: Duration::from_secs(printer.poll_interval_secs),
            timeouts: DriverTimeouts {
                connect: Duration::from_millis(timeouts.connect_ms),
                status: Duration::from_millis(timeouts.status_ms),
                print: Duration::from_millis(timeouts.print_ms),
                flush: Duration::from_millis(timeouts.flush_ms),
                close: Duration::from_millis(timeouts.close_ms),
            },
            backoff: BackoffPolicy {
                initial: Duration::from_millis(printer.backoff.initial_ms),
                max: Duration::from_millis(printer.backoff.max_ms),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = BackoffPolicy {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
        };
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for(5), Duration::from_secs(10));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_disabled_backoff_never_delays() {
        assert_eq!(BackoffPolicy::disabled().delay_for(7), Duration::ZERO);
    }

    #[test]
    fn test_timeouts_per_operation() {
        let timeouts = DriverTimeouts::default();
        assert_eq!(
            timeouts.for_operation(DriverOperation::PrintImage),
            timeouts.print
        );
        assert_eq!(
            timeouts.for_operation(DriverOperation::Connect),
            timeouts.connect
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_becomes_timeout_error() {
        let timeouts = DriverTimeouts {
            status: Duration::from_millis(50),
            ..DriverTimeouts::default()
        };

        let result: Result<(), DriverError> = timeouts
            .run(DriverOperation::Status, async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .await;

        assert_eq!(
            result,
            Err(DriverError::Timeout {
                operation: DriverOperation::Status,
                after: Duration::from_millis(50),
            })
        );
    }

    #[test]
    fn test_from_printer_config() {
        let printer: PrinterConfig = serde_json::from_value(serde_json::json!({
            "address": "AA:BB:CC:DD:EE:FF",
            "poll_interval_secs": 12,
            "timeouts": { "flush_ms": 2500 },
            "backoff": { "initial_ms": 0 }
        }))
        .unwrap();

        let config = CoordinatorConfig::from_printer_config(&printer);
        assert_eq!(config.address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(config.poll_interval, Duration::from_secs(12));
        assert_eq!(config.timeouts.flush, Duration::from_millis(2500));
        assert_eq!(config.timeouts.connect, Duration::from_secs(10));
        assert_eq!(config.backoff.delay_for(3), Duration::ZERO);
    }
}
