pub mod mqtt_client;
pub mod status_publisher;

pub use mqtt_client::{MqttClient, MqttMessage, MqttPublisherClient};
pub use status_publisher::{StatusPublisher, offline_payload, status_payload};
