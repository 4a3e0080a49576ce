/// State of the link between the coordinator and the printer session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// No session and no connection attempt in progress
    Disconnected,
    /// A session is being opened
    Connecting,
    /// A session is open and usable
    Ready,
    /// The last connection attempt or driver call failed; a new session is required
    Faulted(String),
}

impl LinkState {
    /// Check if state allows a connection attempt
    pub fn can_connect(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Faulted(_))
    }

    /// Check if a session is open
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Check if a connection attempt is in progress
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self, Self::Faulted(_))
    }

    /// Fault reason, if faulted
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Faulted(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Faulted(_) => "faulted",
        }
    }

    /// Transition to connecting state
    pub fn to_connecting(&self) -> Result<Self, &'static str> {
        match self {
            Self::Disconnected | Self::Faulted(_) => Ok(Self::Connecting),
            _ => Err("Can only connect from Disconnected or Faulted state"),
        }
    }

    /// Transition to ready state
    pub fn to_ready(&self) -> Result<Self, &'static str> {
        match self {
            Self::Connecting => Ok(Self::Ready),
            _ => Err("Can only become Ready from Connecting state"),
        }
    }

    /// Transition to faulted state
    pub fn to_faulted(&self, reason: impl Into<String>) -> Self {
        Self::Faulted(reason.into())
    }

    /// Transition to disconnected state
    pub fn to_disconnected(&self) -> Self {
        Self::Disconnected
    }
}

impl Default for LinkState {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Faulted(reason) => write!(f, "faulted ({})", reason),
            other => f.write_str(other.as_str()),
        }
    }
}
