use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{DeviceStatus, DriverError, DriverKind, ImageRef, PrinterDriver, PrinterSession};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::PrintSettings;
use crate::printer::ReceiptBuilder;

/// Renders jobs as ESC/POS and appends them to a file or network share.
///
/// The file is opened per flush so a share is never held locked.
pub struct FileDriver {
    path: PathBuf,
    settings: PrintSettings,
}

impl FileDriver {
    pub fn new(path: &str, settings: PrintSettings) -> Self {
        Self {
            path: PathBuf::from(path),
            settings,
        }
    }
}

#[async_trait]
impl PrinterDriver for FileDriver {
    async fn open(&self, address: &str) -> Result<Arc<dyn PrinterSession>, DriverError> {
        info!(address = %address, path = ?self.path, "Preparing to print to file/share");

        // Verify we can append before reporting the link ready
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                error!(path = ?self.path, error = %e, "Failed to open printer file");
                DriverError::Transport(e.to_string())
            })?;

        Ok(Arc::new(FileSession {
            path: self.path.clone(),
            settings: self.settings,
            pending: Mutex::new(Vec::new()),
        }))
    }

    fn driver_type(&self) -> &'static str {
        DriverKind::File.as_str()
    }
}

struct FileSession {
    path: PathBuf,
    settings: PrintSettings,
    pending: Mutex<Vec<u8>>,
}

impl FileSession {
    fn job_header(&self, font_size: u16) -> ReceiptBuilder {
        ReceiptBuilder::new()
            .initialize()
            .density(self.settings.density)
            .text_size(font_size)
    }

    async fn append(&self, bytes: &[u8]) -> Result<(), DriverError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| DriverError::Transport(e.to_string()))?;
        file.write_all(bytes)
            .await
            .map_err(|e| DriverError::Transport(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| DriverError::Transport(e.to_string()))
    }
}

#[async_trait]
impl PrinterSession for FileSession {
    async fn status(&self) -> Result<DeviceStatus, DriverError> {
        let has_data = !self.pending.lock().await.is_empty();
        Ok(DeviceStatus {
            is_idle: !has_data,
            has_error: false,
            has_data,
            error_detail: None,
        })
    }

    async fn print_text(&self, text: &str, font_size: u16) -> Result<(), DriverError> {
        let bytes = self.job_header(font_size).align_left().text_line(text).build();
        self.pending.lock().await.extend_from_slice(&bytes);
        Ok(())
    }

    async fn print_image(&self, image: &ImageRef) -> Result<(), DriverError> {
        if tokio::fs::metadata(image.as_path()).await.is_err() {
            return Err(DriverError::Rejected(format!("image not found: {}", image)));
        }

        // Raster conversion is left to the hardware driver; files get a marker line
        let name = image
            .as_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| image.to_string());
        let bytes = self
            .job_header(domain::printer::DEFAULT_FONT_SIZE)
            .align_center()
            .text_line(&format!("[image: {}]", name))
            .build();
        self.pending.lock().await.extend_from_slice(&bytes);
        Ok(())
    }

    async fn flush(&self) -> Result<(), DriverError> {
        let mut pending = self.pending.lock().await;
        if pending.is_empty() {
            return Ok(());
        }

        let mut bytes = std::mem::take(&mut *pending);
        bytes.extend(ReceiptBuilder::new().finish(self.settings.paper_type).build());

        if let Err(e) = self.append(&bytes).await {
            error!(path = ?self.path, error = %e, "Failed to write to printer file");
            return Err(e);
        }

        debug!(path = ?self.path, bytes = bytes.len(), "Flushed print data to file");
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        let mut pending = self.pending.lock().await;
        if !pending.is_empty() {
            debug!(bytes = pending.len(), "Discarding unflushed print data");
            pending.clear();
        }
        Ok(())
    }
}
