mod file;
mod simulator;

pub use file::FileDriver;
pub use simulator::SimulatorDriver;

use std::sync::Arc;

use anyhow::{Result, anyhow};
use domain::printer::PaperType;
use domain::{DriverKind, PrinterDriver};

use crate::config::PrinterConfig;

/// Hardware settings applied by drivers when rendering jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintSettings {
    pub density: u8,
    pub paper_type: PaperType,
}

impl PrintSettings {
    pub fn from_config(config: &PrinterConfig) -> Self {
        Self {
            density: config.density,
            paper_type: config.paper_type,
        }
    }
}

impl Default for PrintSettings {
    fn default() -> Self {
        Self {
            density: domain::printer::DEFAULT_DENSITY,
            paper_type: PaperType::default(),
        }
    }
}

/// Factory for printer drivers
pub struct DriverFactory;

impl DriverFactory {
    /// Create the driver selected by `config.driver`
    pub fn create_driver(config: &PrinterConfig) -> Result<Arc<dyn PrinterDriver>> {
        let settings = PrintSettings::from_config(config);
        match config.driver {
            DriverKind::Simulator => Ok(Arc::new(SimulatorDriver::new(
                config.simulator.clone(),
                settings,
            ))),
            DriverKind::File => {
                let path = config
                    .output_path
                    .as_deref()
                    .ok_or_else(|| anyhow!("File driver requires printer.output_path"))?;
                Ok(Arc::new(FileDriver::new(path, settings)))
            }
        }
    }
}
