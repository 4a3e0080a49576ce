use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{DeviceStatus, DriverError, DriverKind, ImageRef, PrinterDriver, PrinterSession};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info};

use super::PrintSettings;
use crate::config::SimulatorConfig;

#[derive(Debug, Default)]
struct SimulatorState {
    connect_attempts: u32,
    print_calls: u32,
    buffered: Vec<String>,
    printed: Vec<String>,
}

/// In-memory printer. Output is buffered until flush, like a real head.
pub struct SimulatorDriver {
    config: SimulatorConfig,
    settings: PrintSettings,
    state: Arc<Mutex<SimulatorState>>,
}

impl SimulatorDriver {
    pub fn new(config: SimulatorConfig, settings: PrintSettings) -> Self {
        Self {
            config,
            settings,
            state: Arc::new(Mutex::new(SimulatorState::default())),
        }
    }

    /// Lines committed by flush so far
    pub async fn printed(&self) -> Vec<String> {
        self.state.lock().await.printed.clone()
    }

    pub async fn connect_attempts(&self) -> u32 {
        self.state.lock().await.connect_attempts
    }
}

#[async_trait]
impl PrinterDriver for SimulatorDriver {
    async fn open(&self, address: &str) -> Result<Arc<dyn PrinterSession>, DriverError> {
        simulate_latency(self.config.latency_ms).await;

        let mut state = self.state.lock().await;
        state.connect_attempts += 1;
        if state.connect_attempts <= self.config.connect_failures {
            return Err(DriverError::Transport(format!(
                "simulated connection failure ({}/{})",
                state.connect_attempts, self.config.connect_failures
            )));
        }

        // Unflushed data does not survive a reconnect
        state.buffered.clear();
        info!(
            address = %address,
            density = self.settings.density,
            paper_type = self.settings.paper_type.as_str(),
            "Simulator printer connected"
        );

        Ok(Arc::new(SimulatorSession {
            config: self.config.clone(),
            state: self.state.clone(),
            closed: Mutex::new(false),
        }))
    }

    fn driver_type(&self) -> &'static str {
        DriverKind::Simulator.as_str()
    }
}

struct SimulatorSession {
    config: SimulatorConfig,
    state: Arc<Mutex<SimulatorState>>,
    closed: Mutex<bool>,
}

impl SimulatorSession {
    async fn check_open(&self) -> Result<(), DriverError> {
        if *self.closed.lock().await {
            return Err(DriverError::Transport("session closed".to_string()));
        }
        simulate_latency(self.config.latency_ms).await;
        Ok(())
    }

    async fn buffer(&self, line: String) -> Result<(), DriverError> {
        self.check_open().await?;

        let mut state = self.state.lock().await;
        state.print_calls += 1;
        let every = self.config.fail_print_every;
        if every > 0 && state.print_calls % every == 0 {
            return Err(DriverError::Transport(
                "simulated link drop during print".to_string(),
            ));
        }

        debug!(line = %line, "Simulator buffered print data");
        state.buffered.push(line);
        Ok(())
    }
}

#[async_trait]
impl PrinterSession for SimulatorSession {
    async fn status(&self) -> Result<DeviceStatus, DriverError> {
        self.check_open().await?;

        let state = self.state.lock().await;
        let has_data = !state.buffered.is_empty();
        Ok(DeviceStatus {
            is_idle: !has_data,
            has_error: false,
            has_data,
            error_detail: None,
        })
    }

    async fn print_text(&self, text: &str, font_size: u16) -> Result<(), DriverError> {
        self.buffer(format!("[{}pt] {}", font_size, text)).await
    }

    async fn print_image(&self, image: &ImageRef) -> Result<(), DriverError> {
        self.buffer(format!("[image] {}", image)).await
    }

    async fn flush(&self) -> Result<(), DriverError> {
        self.check_open().await?;

        let mut state = self.state.lock().await;
        let lines = std::mem::take(&mut state.buffered);
        info!(lines = lines.len(), "Simulator printed and cut");
        state.printed.extend(lines);
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        *self.closed.lock().await = true;
        info!("Simulator printer disconnected");
        Ok(())
    }
}

async fn simulate_latency(latency_ms: u64) {
    if latency_ms > 0 {
        sleep(Duration::from_millis(latency_ms)).await;
    }
}
