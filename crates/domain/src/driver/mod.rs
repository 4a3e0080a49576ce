mod driver_kind;
mod printer_driver;

pub use driver_kind::DriverKind;
pub use printer_driver::{DriverOperation, PrinterDriver, PrinterSession};
