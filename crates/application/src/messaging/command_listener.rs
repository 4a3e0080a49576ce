use infrastructure::MqttClient;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::command::CommandHandler;

/// Receives print commands over MQTT and publishes one result per command
pub struct CommandListener {
    mqtt_client: MqttClient,
    printer_id: String,
    command_topic: String,
    result_topic: String,
    handler: CommandHandler,
}

impl CommandListener {
    pub fn new(
        mqtt_client: MqttClient,
        printer_id: String,
        command_topic: String,
        result_topic: String,
        handler: CommandHandler,
    ) -> Self {
        Self {
            mqtt_client,
            printer_id,
            command_topic,
            result_topic,
            handler,
        }
    }

    pub async fn run(&self, cancel_token: CancellationToken) {
        // Subscribe to the broadcast before the broker subscription so no
        // retained or queued command slips past
        let mut rx = self.mqtt_client.subscribe_messages();

        if let Err(e) = self.mqtt_client.subscribe(&self.command_topic).await {
            error!(printer_id = %self.printer_id, error = %e, "Failed to subscribe to commands");
            return;
        }

        info!(printer_id = %self.printer_id, topic = %self.command_topic, "Listening for commands");

        loop {
            let msg = tokio::select! {
                _ = cancel_token.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        warn!(printer_id = %self.printer_id, skipped = count, "Command listener lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!(printer_id = %self.printer_id, "Command channel closed");
                        break;
                    }
                },
            };

            if msg.topic != self.command_topic {
                continue;
            }

            info!(
                printer_id = %self.printer_id,
                command = %String::from_utf8_lossy(&msg.payload),
                "Received command"
            );

            // Commands run one at a time; the coordinator serializes them anyway
            let result = self.handler.handle(&msg.payload).await;

            match serde_json::to_string(&result) {
                Ok(payload) => {
                    if let Err(e) = self.mqtt_client.publish(&self.result_topic, &payload, false).await {
                        warn!(printer_id = %self.printer_id, error = %e, "Failed to publish command result");
                    }
                }
                Err(e) => error!(error = %e, "Failed to serialize command result"),
            }

            if let Err(e) = self.mqtt_client.ack(&msg.topic, msg.pkid).await {
                warn!(printer_id = %self.printer_id, error = %e, "Failed to ack command");
            }
        }

        info!(printer_id = %self.printer_id, "Command listener stopped");
    }
}
