use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use application::SessionCoordinator;
use infrastructure::config::StartupConfig;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Start a coordinator, building a fresh one for every attempt.
///
/// A coordinator whose `start` failed is stopped for good, so each retry
/// gets a new instance from `build`.
pub async fn start_with_retries<F>(
    build: F,
    startup: &StartupConfig,
    cancel_token: &CancellationToken,
) -> Result<Arc<SessionCoordinator>>
where
    F: Fn() -> Arc<SessionCoordinator>,
{
    let attempts = startup.attempts.max(1);
    let retry_delay = Duration::from_secs(startup.retry_delay_secs);

    for attempt in 1..=attempts {
        let coordinator = build();
        match coordinator.start().await {
            Ok(()) => {
                info!(address = %coordinator.address(), attempt, "Printer session started");
                return Ok(coordinator);
            }
            Err(e) => {
                warn!(
                    address = %coordinator.address(),
                    attempt,
                    attempts,
                    error = %e,
                    "Printer not ready"
                );
            }
        }

        if attempt == attempts {
            break;
        }

        tokio::select! {
            _ = cancel_token.cancelled() => {
                return Err(anyhow!("Startup cancelled"));
            }
            _ = tokio::time::sleep(retry_delay) => {}
        }
    }

    Err(anyhow!(
        "Printer did not become ready after {} attempt(s)",
        attempts
    ))
}
