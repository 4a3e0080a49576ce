use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use domain::{DriverOperation, PrintError, PrintJob, PrintJobKind};

use super::config::DriverTimeouts;
use super::gate::OperationGate;
use super::link::LinkStateMachine;
use super::stats::Counters;

/// Runs caller-issued print jobs behind the gate. Never retries: a blind
/// retry on a thermal printer can duplicate physical output.
pub struct PrintJobSubmitter {
    link: Arc<LinkStateMachine>,
    gate: Arc<OperationGate>,
    timeouts: DriverTimeouts,
    stop_token: CancellationToken,
    counters: Arc<Counters>,
}

impl PrintJobSubmitter {
    pub(crate) fn new(
        link: Arc<LinkStateMachine>,
        gate: Arc<OperationGate>,
        timeouts: DriverTimeouts,
        stop_token: CancellationToken,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            link,
            gate,
            timeouts,
            stop_token,
            counters,
        }
    }

    pub async fn submit(&self, job: PrintJob) -> Result<(), PrintError> {
        if self.stop_token.is_cancelled() {
            return Err(PrintError::Stopped);
        }

        let started = Instant::now();
        info!(job_id = %job.id(), kind = job.kind().as_str(), "Print job submitted");

        let result = self
            .gate
            .with_exclusive_access("print_job", || self.execute(&job))
            .await;

        match &result {
            Ok(()) => {
                self.counters.record_job(true);
                info!(
                    job_id = %job.id(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Print job completed"
                );
            }
            Err(PrintError::Stopped) => {
                info!(job_id = %job.id(), "Print job refused, coordinator stopping");
            }
            Err(e) => {
                self.counters.record_job(false);
                error!(job_id = %job.id(), error = %e, "Failed to print");
            }
        }

        result
    }

    async fn execute(&self, job: &PrintJob) -> Result<(), PrintError> {
        // Stop may have begun while this job waited for the gate
        if self.stop_token.is_cancelled() {
            return Err(PrintError::Stopped);
        }

        let session = self.link.ensure_ready().await?;
        let mut pending = UncommittedJob::new(&self.link);

        let printed = match job.kind() {
            PrintJobKind::Text { text, font_size } => {
                self.timeouts
                    .run(
                        DriverOperation::PrintText,
                        session.print_text(text, *font_size),
                    )
                    .await
            }
            PrintJobKind::Image { image } => {
                self.timeouts
                    .run(DriverOperation::PrintImage, session.print_image(image))
                    .await
            }
        };

        if let Err(e) = printed {
            pending.disarm();
            self.link.fault(format!("print failed: {}", e)).await;
            return Err(PrintError::Print(e));
        }

        // Data may sit in the printer buffer uncommitted; the job only
        // counts once flush has advanced and cut the paper
        if let Err(e) = self
            .timeouts
            .run(DriverOperation::Flush, session.flush())
            .await
        {
            pending.disarm();
            self.link.fault(format!("flush failed: {}", e)).await;
            return Err(PrintError::Flush(e));
        }

        pending.disarm();
        Ok(())
    }
}

/// Abandons the session if a job is dropped between its first print call
/// and a completed flush. Whatever it buffered must not reach the next
/// job's paper.
struct UncommittedJob<'a> {
    link: &'a LinkStateMachine,
    armed: bool,
}

impl<'a> UncommittedJob<'a> {
    fn new(link: &'a LinkStateMachine) -> Self {
        Self { link, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for UncommittedJob<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.link.abandon("print job interrupted before flush");
        }
    }
}
