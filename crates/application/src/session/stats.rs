use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the coordinator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub connect_attempts: u64,
    pub polls_ok: u64,
    pub polls_failed: u64,
    pub jobs_ok: u64,
    pub jobs_failed: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    connect_attempts: AtomicU64,
    polls_ok: AtomicU64,
    polls_failed: AtomicU64,
    jobs_ok: AtomicU64,
    jobs_failed: AtomicU64,
}

impl Counters {
    /// Returns the attempt number (1-based)
    pub(crate) fn record_connect_attempt(&self) -> u64 {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_poll(&self, ok: bool) {
        let counter = if ok { &self.polls_ok } else { &self.polls_failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_job(&self, ok: bool) {
        let counter = if ok { &self.jobs_ok } else { &self.jobs_failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CoordinatorStats {
        CoordinatorStats {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            polls_ok: self.polls_ok.load(Ordering::Relaxed),
            polls_failed: self.polls_failed.load(Ordering::Relaxed),
            jobs_ok: self.jobs_ok.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
        }
    }
}
