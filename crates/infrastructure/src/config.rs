use config::{Config, ConfigError, Environment, File};
use domain::DriverKind;
use domain::printer::{
    DEFAULT_DENSITY, DEFAULT_FONT_SIZE, DEFAULT_POLL_INTERVAL_SECS, MAX_DENSITY, PaperType,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            topic_prefix: default_topic_prefix(),
        }
    }
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_topic_prefix() -> String {
    "thermal".to_string()
}

/// Per-call driver timeouts, in milliseconds
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    #[serde(default = "default_connect_ms")]
    pub connect_ms: u64,
    #[serde(default = "default_status_ms")]
    pub status_ms: u64,
    #[serde(default = "default_print_ms")]
    pub print_ms: u64,
    #[serde(default = "default_flush_ms")]
    pub flush_ms: u64,
    #[serde(default = "default_close_ms")]
    pub close_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_ms(),
            status_ms: default_status_ms(),
            print_ms: default_print_ms(),
            flush_ms: default_flush_ms(),
            close_ms: default_close_ms(),
        }
    }
}

fn default_connect_ms() -> u64 {
    10_000
}
fn default_status_ms() -> u64 {
    5_000
}
fn default_print_ms() -> u64 {
    30_000
}
fn default_flush_ms() -> u64 {
    15_000
}
fn default_close_ms() -> u64 {
    5_000
}

/// Reconnect backoff after failed connection attempts. `initial_ms = 0`
/// disables it.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    #[serde(default = "default_backoff_initial_ms")]
    pub initial_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: default_backoff_initial_ms(),
            max_ms: default_backoff_max_ms(),
        }
    }
}

fn default_backoff_initial_ms() -> u64 {
    1_000
}
fn default_backoff_max_ms() -> u64 {
    60_000
}

/// Behaviour knobs for the in-memory simulator driver
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct SimulatorConfig {
    /// Delay added to every simulated call
    #[serde(default)]
    pub latency_ms: u64,
    /// Number of initial connection attempts that fail
    #[serde(default)]
    pub connect_failures: u32,
    /// Every Nth print call drops the link (0 = never)
    #[serde(default)]
    pub fail_print_every: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PrinterConfig {
    /// Transport address of the printer (BLE MAC for real hardware)
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub driver: DriverKind,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_font_size")]
    pub font_size: u16,
    #[serde(default = "default_density")]
    pub density: u8,
    #[serde(default)]
    pub paper_type: PaperType,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub backoff: BackoffConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    /// Required when driver is "file"
    pub output_path: Option<String>,
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}
fn default_font_size() -> u16 {
    DEFAULT_FONT_SIZE
}
fn default_density() -> u8 {
    DEFAULT_DENSITY
}

impl PrinterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::Message(
                "printer.address must not be empty".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Message(
                "printer.poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.density > MAX_DENSITY {
            return Err(ConfigError::Message(format!(
                "printer.density must be between 0 and {}, got {}",
                MAX_DENSITY, self.density
            )));
        }
        if self.font_size == 0 {
            return Err(ConfigError::Message(
                "printer.font_size must be greater than zero".to_string(),
            ));
        }
        if self.driver == DriverKind::File && self.output_path.is_none() {
            return Err(ConfigError::Message(
                "printer.output_path is required for the file driver".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct StartupConfig {
    #[serde(default = "default_startup_attempts")]
    pub attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            attempts: default_startup_attempts(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

fn default_startup_attempts() -> u32 {
    5
}
fn default_retry_delay() -> u64 {
    10
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentConfig {
    #[serde(default)]
    pub printer_id: String,
    pub printer: PrinterConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub startup: StartupConfig,
}

impl AgentConfig {
    /// Merge the config files and environment. Not validated: apply any
    /// command line overrides first, then call [`validate`](Self::validate).
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            // Required base file, e.g. config/default.toml
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(true))
            // Optional per-environment overrides
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Environment variables (e.g. THERMAL__PRINTER__ADDRESS=AA:BB:CC:DD:EE:FF)
            .add_source(Environment::with_prefix("THERMAL").separator("__"))
            .build()?;

        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.printer_id.trim().is_empty() {
            return Err(ConfigError::Message(
                "printer_id must not be empty".to_string(),
            ));
        }
        self.printer.validate()
    }

    pub fn command_topic(&self) -> String {
        format!("{}/{}/command", self.mqtt.topic_prefix, self.printer_id)
    }

    pub fn result_topic(&self) -> String {
        format!("{}/{}/result", self.mqtt.topic_prefix, self.printer_id)
    }

    pub fn status_topic(&self) -> String {
        format!("{}/{}/status", self.mqtt.topic_prefix, self.printer_id)
    }
}
