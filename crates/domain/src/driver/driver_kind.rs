use serde::{Deserialize, Serialize};

/// Kind of printer driver to instantiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// In-memory printer with scripted latency and failures
    Simulator,
    /// Renders receipts to a file
    File,
}

impl DriverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simulator => "Simulator",
            Self::File => "File",
        }
    }
}

impl Default for DriverKind {
    fn default() -> Self {
        Self::Simulator
    }
}
