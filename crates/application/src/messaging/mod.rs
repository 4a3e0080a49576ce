pub mod command;
pub mod command_listener;

pub use command::{CommandHandler, CommandResult, PrinterCommand};
pub use command_listener::CommandListener;
