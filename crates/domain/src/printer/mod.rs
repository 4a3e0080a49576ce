mod job;
mod status;

pub use job::{ImageRef, PrintJob, PrintJobKind};
pub use status::{DeviceStatus, LatestStatus, PrinterState, PrinterStatus};

use serde::{Deserialize, Serialize};

pub const DEFAULT_FONT_SIZE: u16 = 24;
pub const DEFAULT_DENSITY: u8 = 15;
pub const MAX_DENSITY: u8 = 15;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Paper stock loaded in the printer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperType {
    Continuous,
    Gap,
    Mark,
}

impl PaperType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::Gap => "gap",
            Self::Mark => "mark",
        }
    }
}

impl Default for PaperType {
    fn default() -> Self {
        Self::Continuous
    }
}
