use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DriverError;
use crate::printer::{DeviceStatus, ImageRef};

/// Opens sessions to a printer at a transport address.
///
/// Implementations live in the infrastructure layer (BLE, simulator, file).
/// The coordinator bounds every call with its own timeout, so implementations
/// may block for as long as the transport needs.
#[async_trait]
pub trait PrinterDriver: Send + Sync {
    /// Open a new session to the printer
    async fn open(&self, address: &str) -> Result<Arc<dyn PrinterSession>, DriverError>;

    /// Get driver type identifier
    fn driver_type(&self) -> &'static str;
}

/// A live session over an open link.
///
/// Calls must never be issued concurrently on one session; the coordinator
/// guarantees this, so implementations need no locking of their own beyond
/// what `&self` access requires.
#[async_trait]
pub trait PrinterSession: Send + Sync {
    /// Query current printer status
    async fn status(&self) -> Result<DeviceStatus, DriverError>;

    /// Send text to the printer buffer
    async fn print_text(&self, text: &str, font_size: u16) -> Result<(), DriverError>;

    /// Send an image to the printer buffer
    async fn print_image(&self, image: &ImageRef) -> Result<(), DriverError>;

    /// Commit buffered data: advance and cut the paper
    async fn flush(&self) -> Result<(), DriverError>;

    /// Close the session
    async fn close(&self) -> Result<(), DriverError>;
}

/// Driver call kinds, used to label timeouts and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOperation {
    Connect,
    Status,
    PrintText,
    PrintImage,
    Flush,
    Close,
}

impl DriverOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Status => "status",
            Self::PrintText => "print_text",
            Self::PrintImage => "print_image",
            Self::Flush => "flush",
            Self::Close => "close",
        }
    }
}

impl std::fmt::Display for DriverOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
