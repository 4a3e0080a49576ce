use std::sync::Arc;

use chrono::{DateTime, Utc};
use domain::PrintJob;
use domain::printer::DEFAULT_FONT_SIZE;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::session::SessionCoordinator;

/// Print verbs accepted from the host platform
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PrinterCommand {
    PrintText {
        #[serde(default)]
        text: String,
        /// Falls back to the handler's configured size when omitted
        #[serde(default, skip_serializing_if = "Option::is_none")]
        font_size: Option<u16>,
    },
    PrintImage {
        image_path: String,
    },
}

impl PrinterCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PrintText { .. } => "print_text",
            Self::PrintImage { .. } => "print_image",
        }
    }

    pub fn into_job(self, default_font_size: u16) -> PrintJob {
        match self {
            Self::PrintText { text, font_size } => {
                PrintJob::text(text, font_size.unwrap_or(default_font_size))
            }
            Self::PrintImage { image_path } => PrintJob::image(image_path),
        }
    }
}

/// Outcome reported back for every received command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub command: Option<String>,
    pub job_id: Option<Uuid>,
    pub success: bool,
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl CommandResult {
    fn completed(command: &str, job_id: Uuid) -> Self {
        Self {
            command: Some(command.to_string()),
            job_id: Some(job_id),
            success: true,
            error: None,
            completed_at: Utc::now(),
        }
    }

    fn failed(command: Option<&str>, job_id: Option<Uuid>, error: String) -> Self {
        Self {
            command: command.map(str::to_string),
            job_id,
            success: false,
            error: Some(error),
            completed_at: Utc::now(),
        }
    }
}

/// Decodes command payloads and forwards them to the coordinator
#[derive(Clone)]
pub struct CommandHandler {
    coordinator: Arc<SessionCoordinator>,
    default_font_size: u16,
}

impl CommandHandler {
    pub fn new(coordinator: Arc<SessionCoordinator>) -> Self {
        Self {
            coordinator,
            default_font_size: DEFAULT_FONT_SIZE,
        }
    }

    /// Font size for `print_text` commands that do not name one
    pub fn with_default_font_size(mut self, font_size: u16) -> Self {
        self.default_font_size = font_size;
        self
    }

    pub async fn handle(&self, payload: &[u8]) -> CommandResult {
        let command = match serde_json::from_slice::<PrinterCommand>(payload) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Invalid printer command payload");
                return CommandResult::failed(None, None, format!("invalid command: {}", e));
            }
        };

        self.execute(command).await
    }

    pub async fn execute(&self, command: PrinterCommand) -> CommandResult {
        let name = command.name();
        let job = command.into_job(self.default_font_size);
        let job_id = job.id();
        info!(command = name, job_id = %job_id, "Executing printer command");

        match self.coordinator.print(job).await {
            Ok(()) => CommandResult::completed(name, job_id),
            Err(e) => CommandResult::failed(Some(name), Some(job_id), e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{ImageRef, PrintJobKind};

    #[test]
    fn test_print_text_defaults() {
        let command: PrinterCommand = serde_json::from_str(r#"{"type":"print_text"}"#).unwrap();
        assert_eq!(
            command,
            PrinterCommand::PrintText {
                text: String::new(),
                font_size: None
            }
        );
        assert_eq!(
            command.into_job(DEFAULT_FONT_SIZE).kind(),
            &PrintJobKind::Text {
                text: String::new(),
                font_size: 24
            }
        );
    }

    #[test]
    fn test_missing_font_size_uses_handler_default() {
        let command: PrinterCommand =
            serde_json::from_str(r#"{"type":"print_text","text":"Hi"}"#).unwrap();
        assert_eq!(
            command.into_job(48).kind(),
            &PrintJobKind::Text {
                text: "Hi".to_string(),
                font_size: 48
            }
        );
    }

    #[test]
    fn test_print_text_into_job() {
        let command: PrinterCommand =
            serde_json::from_str(r#"{"type":"print_text","text":"Hello","font_size":32}"#)
                .unwrap();
        let job = command.into_job(48);
        assert_eq!(
            job.kind(),
            &PrintJobKind::Text {
                text: "Hello".to_string(),
                font_size: 32
            }
        );
    }

    #[test]
    fn test_print_image_requires_path() {
        assert!(serde_json::from_str::<PrinterCommand>(r#"{"type":"print_image"}"#).is_err());

        let command: PrinterCommand =
            serde_json::from_str(r#"{"type":"print_image","image_path":"/tmp/logo.png"}"#)
                .unwrap();
        assert_eq!(command.name(), "print_image");
        assert_eq!(
            command.into_job(DEFAULT_FONT_SIZE).kind(),
            &PrintJobKind::Image {
                image: ImageRef::new("/tmp/logo.png")
            }
        );
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(serde_json::from_str::<PrinterCommand>(r#"{"type":"reboot"}"#).is_err());
    }
}
