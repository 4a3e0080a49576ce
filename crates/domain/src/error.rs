use std::time::Duration;

use thiserror::Error;

use crate::driver::DriverOperation;

/// A call against an open session (or an attempt to open one) failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: DriverOperation,
        after: Duration,
    },

    #[error("Printer rejected request: {0}")]
    Rejected(String),
}

/// A session could not be established (or the link refuses to try)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectError {
    #[error("Failed to connect to {address}: {source}")]
    Driver { address: String, source: DriverError },

    #[error("Reconnect to {address} is backing off, next attempt in {retry_in:?}")]
    BackingOff { address: String, retry_in: Duration },

    #[error("Link has been shut down")]
    Shutdown,

    #[error("Coordinator has already been started")]
    AlreadyStarted,
}

/// Caller-facing failure of a print job
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrintError {
    #[error("Printer not ready: {0}")]
    NotReady(#[from] ConnectError),

    #[error("Print failed: {0}")]
    Print(DriverError),

    #[error("Flush failed, job was not committed: {0}")]
    Flush(DriverError),

    #[error("Coordinator is stopped")]
    Stopped,

    #[error("Coordinator has not been started")]
    NotStarted,
}

impl PrintError {
    /// Driver failures that compromised the link
    pub fn is_driver_failure(&self) -> bool {
        matches!(self, Self::Print(_) | Self::Flush(_))
    }
}

/// Failure of a single status poll
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PollError {
    #[error("Printer not ready: {0}")]
    NotReady(#[from] ConnectError),

    #[error("Status query failed: {0}")]
    Status(#[from] DriverError),
}
