//! Domain layer - printer session types with no infrastructure dependencies
//!
//! This crate contains:
//! - Link state (Disconnected / Connecting / Ready / Faulted)
//! - Printer status snapshots and print jobs
//! - Driver and session interfaces (traits)
//! - Error taxonomy
//!
//! Principles:
//! - No dependencies on infrastructure
//! - Invariants enforced by the types (immutable snapshots, tagged job kinds)
//! - Testable in isolation

pub mod driver;
pub mod error;
pub mod link;
pub mod printer;

// Re-export commonly used types
pub use driver::{DriverKind, DriverOperation, PrinterDriver, PrinterSession};
pub use error::{ConnectError, DriverError, PollError, PrintError};
pub use link::LinkState;
pub use printer::{
    DeviceStatus, ImageRef, LatestStatus, PrintJob, PrintJobKind, PrinterState, PrinterStatus,
};
