//! Printer session coordination: one link, one gate, one poller, one submitter

mod config;
mod coordinator;
mod gate;
mod link;
mod poller;
mod stats;
mod submitter;

pub use config::{BackoffPolicy, CoordinatorConfig, DriverTimeouts};
pub use coordinator::{CoordinatorState, SessionCoordinator};
pub use gate::OperationGate;
pub use link::LinkStateMachine;
pub use poller::{MIN_POLL_INTERVAL, StatusPoller};
pub use stats::CoordinatorStats;
pub use submitter::PrintJobSubmitter;
