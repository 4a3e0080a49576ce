use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reference to an image the driver should print (usually a file path)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl From<&str> for ImageRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ImageRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a print job renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PrintJobKind {
    Text { text: String, font_size: u16 },
    Image { image: ImageRef },
}

impl PrintJobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
        }
    }
}

/// A caller-submitted print request. Executed at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintJob {
    id: Uuid,
    kind: PrintJobKind,
    submitted_at: DateTime<Utc>,
}

impl PrintJob {
    pub fn new(kind: PrintJobKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            submitted_at: Utc::now(),
        }
    }

    pub fn text(text: impl Into<String>, font_size: u16) -> Self {
        Self::new(PrintJobKind::Text {
            text: text.into(),
            font_size,
        })
    }

    pub fn image(image: impl Into<ImageRef>) -> Self {
        Self::new(PrintJobKind::Image {
            image: image.into(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> &PrintJobKind {
        &self.kind
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}
