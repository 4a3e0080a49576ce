use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw status flags as reported by a driver
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub is_idle: bool,
    pub has_error: bool,
    pub has_data: bool,
    #[serde(default)]
    pub error_detail: Option<String>,
}

impl DeviceStatus {
    /// Idle printer with an empty buffer
    pub fn idle() -> Self {
        Self {
            is_idle: true,
            ..Self::default()
        }
    }

    pub fn with_error(detail: impl Into<String>) -> Self {
        Self {
            has_error: true,
            error_detail: Some(detail.into()),
            ..Self::default()
        }
    }
}

/// Immutable snapshot produced by a successful status poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterStatus {
    is_idle: bool,
    has_error: bool,
    has_data: bool,
    error_detail: Option<String>,
    observed_at: DateTime<Utc>,
}

impl PrinterStatus {
    pub fn observed(status: DeviceStatus, observed_at: DateTime<Utc>) -> Self {
        Self {
            is_idle: status.is_idle,
            has_error: status.has_error,
            has_data: status.has_data,
            error_detail: status.error_detail,
            observed_at,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.is_idle
    }

    pub fn has_error(&self) -> bool {
        self.has_error
    }

    pub fn has_data(&self) -> bool {
        self.has_data
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    /// Error text for display, "No Error" when the printer is healthy
    pub fn error_summary(&self) -> String {
        if !self.has_error {
            return "No Error".to_string();
        }
        self.error_detail
            .clone()
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

/// The published "latest status" slot.
///
/// `Unavailable` never reuses a previous snapshot as current; the last
/// successful one is carried separately in `last_known`.
#[derive(Debug, Clone, PartialEq)]
pub enum LatestStatus {
    /// No poll has completed yet
    Pending,
    /// Most recent poll succeeded
    Available(PrinterStatus),
    /// Most recent poll failed
    Unavailable {
        reason: String,
        since: DateTime<Utc>,
        consecutive_failures: u32,
        last_known: Option<PrinterStatus>,
    },
}

impl LatestStatus {
    /// Current status, if the last poll succeeded
    pub fn current(&self) -> Option<&PrinterStatus> {
        match self {
            Self::Available(status) => Some(status),
            _ => None,
        }
    }

    /// True when the last poll succeeded
    pub fn available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Most recent successful snapshot, current or not
    pub fn last_known(&self) -> Option<&PrinterStatus> {
        match self {
            Self::Pending => None,
            Self::Available(status) => Some(status),
            Self::Unavailable { last_known, .. } => last_known.as_ref(),
        }
    }

    /// Record a failed poll on top of the current slot
    pub fn into_unavailable(self, reason: impl Into<String>, now: DateTime<Utc>) -> Self {
        match self {
            Self::Pending => Self::Unavailable {
                reason: reason.into(),
                since: now,
                consecutive_failures: 1,
                last_known: None,
            },
            Self::Available(status) => Self::Unavailable {
                reason: reason.into(),
                since: now,
                consecutive_failures: 1,
                last_known: Some(status),
            },
            Self::Unavailable {
                since,
                consecutive_failures,
                last_known,
                ..
            } => Self::Unavailable {
                reason: reason.into(),
                since,
                consecutive_failures: consecutive_failures.saturating_add(1),
                last_known,
            },
        }
    }
}

impl Default for LatestStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Coarse printer state for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterState {
    Idle,
    Printing,
    Error,
    Offline,
}

impl PrinterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Printing => "printing",
            Self::Error => "error",
            Self::Offline => "offline",
        }
    }
}

impl From<&PrinterStatus> for PrinterState {
    fn from(status: &PrinterStatus) -> Self {
        if status.has_error() {
            Self::Error
        } else if status.is_idle() {
            Self::Idle
        } else if status.has_data() {
            Self::Printing
        } else {
            Self::Idle
        }
    }
}

impl From<&LatestStatus> for PrinterState {
    fn from(latest: &LatestStatus) -> Self {
        latest.current().map(Self::from).unwrap_or(Self::Offline)
    }
}
