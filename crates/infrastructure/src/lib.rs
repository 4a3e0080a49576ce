//! Infrastructure layer - configuration, printer drivers and MQTT integration

pub mod config;
pub mod drivers;
pub mod messaging;
pub mod printer;

pub use config::AgentConfig;
pub use drivers::{DriverFactory, FileDriver, PrintSettings, SimulatorDriver};
pub use messaging::mqtt_client::{MqttClient, MqttMessage};
pub use messaging::status_publisher::StatusPublisher;
pub use printer::ReceiptBuilder;
