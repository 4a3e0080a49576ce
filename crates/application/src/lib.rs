//! Application layer - printer session coordination and command handling

pub mod messaging;
pub mod session;

pub use messaging::{CommandHandler, CommandListener, CommandResult, PrinterCommand};
pub use session::{
    BackoffPolicy, CoordinatorConfig, CoordinatorState, CoordinatorStats, DriverTimeouts,
    SessionCoordinator,
};
