use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use domain::{LatestStatus, PrinterState};
use rumqttc::QoS;
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::mqtt_client::MqttPublisherClient;

/// JSON snapshot of the latest printer status, as published on the status topic
pub fn status_payload(printer_id: &str, status: &LatestStatus) -> Value {
    let state = PrinterState::from(status);
    match status {
        LatestStatus::Available(current) => json!({
            "printer_id": printer_id,
            "state": state.as_str(),
            "available": true,
            "is_idle": current.is_idle(),
            "has_error": current.has_error(),
            "has_data": current.has_data(),
            "error": current.error_summary(),
            "observed_at": current.observed_at().to_rfc3339(),
        }),
        LatestStatus::Pending => json!({
            "printer_id": printer_id,
            "state": state.as_str(),
            "available": false,
            "reason": "no status yet",
        }),
        LatestStatus::Unavailable {
            reason,
            since,
            consecutive_failures,
            last_known,
        } => json!({
            "printer_id": printer_id,
            "state": state.as_str(),
            "available": false,
            "reason": reason,
            "since": since.to_rfc3339(),
            "consecutive_failures": consecutive_failures,
            "last_observed_at": last_known.as_ref().map(|s| s.observed_at().to_rfc3339()),
        }),
    }
}

/// Mirrors the coordinator's status channel onto a retained MQTT topic
pub struct StatusPublisher {
    client: Arc<dyn MqttPublisherClient>,
    printer_id: String,
    topic: String,
}

impl StatusPublisher {
    pub fn new(client: Arc<dyn MqttPublisherClient>, printer_id: String, topic: String) -> Self {
        Self {
            client,
            printer_id,
            topic,
        }
    }

    pub async fn publish(&self, status: &LatestStatus) -> Result<()> {
        let payload = status_payload(&self.printer_id, status);
        self.client
            .publish_bytes(
                &self.topic,
                payload.to_string().as_bytes(),
                QoS::AtLeastOnce,
                true,
            )
            .await
            .with_context(|| format!("Failed to publish status to {}", self.topic))
    }

    /// Retained marker left behind when the agent goes away
    pub async fn publish_offline(&self) -> Result<()> {
        let payload = offline_payload(&self.printer_id);
        self.client
            .publish_bytes(
                &self.topic,
                payload.to_string().as_bytes(),
                QoS::AtLeastOnce,
                true,
            )
            .await
            .with_context(|| format!("Failed to publish offline marker to {}", self.topic))
    }

    /// Publish the current value, then every change, until cancelled or the
    /// coordinator drops its sender
    pub async fn run(&self, mut status_rx: watch::Receiver<LatestStatus>, cancel_token: CancellationToken) {
        info!(topic = %self.topic, "Starting status publisher");

        loop {
            let status = status_rx.borrow_and_update().clone();
            if let Err(e) = self.publish(&status).await {
                warn!(topic = %self.topic, error = %e, "Status publish failed");
            } else {
                debug!(topic = %self.topic, state = PrinterState::from(&status).as_str(), "Status published");
            }

            tokio::select! {
                _ = cancel_token.cancelled() => break,
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(topic = %self.topic, "Status publisher stopped");
    }
}

/// Payload also used as the MQTT last will
pub fn offline_payload(printer_id: &str) -> Value {
    json!({
        "printer_id": printer_id,
        "state": PrinterState::Offline.as_str(),
        "available": false,
        "reason": "agent offline",
        "since": Utc::now().to_rfc3339(),
    })
}
