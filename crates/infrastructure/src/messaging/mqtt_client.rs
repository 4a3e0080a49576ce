use anyhow::{Result, anyhow};
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};
use std::sync::{
    Arc, RwLock,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task;
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub pkid: u16,
}

/// Publishing half of the broker client, mockable in tests
#[async_trait::async_trait]
pub trait MqttPublisherClient: Send + Sync {
    async fn publish_bytes(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<()>;
    fn is_connected(&self) -> bool;
}

#[derive(Clone)]
pub struct MqttClient {
    client: AsyncClient,
    tx: broadcast::Sender<MqttMessage>,
    connected: Arc<AtomicBool>,
    subscriptions: Arc<RwLock<Vec<String>>>,
}

impl MqttClient {
    pub async fn new(
        host: &str,
        port: u16,
        client_id: &str,
        last_will: Option<LastWill>,
    ) -> Result<Self> {
        let mut mqttoptions = MqttOptions::new(client_id, host, port);
        mqttoptions.set_keep_alive(Duration::from_secs(20));
        // Commands queued while offline are delivered on reconnect
        mqttoptions.set_clean_session(false);
        mqttoptions.set_manual_acks(true);

        if let Some(will) = last_will {
            mqttoptions.set_last_will(will);
        }

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 100);
        let (tx, _) = broadcast::channel(250);
        let connected = Arc::new(AtomicBool::new(false));
        let subscriptions = Arc::new(RwLock::new(Vec::<String>::new()));

        let event_tx = tx.clone();
        let event_connected = connected.clone();
        let event_subscriptions = subscriptions.clone();
        let event_client = client.clone();

        task::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let msg = MqttMessage {
                            topic: publish.topic,
                            payload: publish.payload.to_vec(),
                            pkid: publish.pkid,
                        };
                        if let Err(broadcast::error::SendError(dropped)) = event_tx.send(msg) {
                            debug!(topic = %dropped.topic, "Dropped MQTT message, no listeners yet");
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("MQTT Connected");
                        event_connected.store(true, Ordering::Relaxed);

                        let topics = event_subscriptions
                            .read()
                            .map(|subs| subs.clone())
                            .unwrap_or_else(|poisoned| poisoned.into_inner().clone());
                        if !topics.is_empty() {
                            info!(count = topics.len(), "Re-subscribing to MQTT topics");
                        }
                        for topic in topics {
                            if let Err(e) = event_client.subscribe(&topic, QoS::AtLeastOnce).await {
                                error!(topic = %topic, error = %e, "Failed to re-subscribe");
                            }
                        }
                    }
                    Ok(Event::Outgoing(rumqttc::Outgoing::Disconnect)) => {
                        event_connected.store(false, Ordering::Relaxed);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = ?e, "MQTT connection error");
                        event_connected.store(false, Ordering::Relaxed);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Ok(Self {
            client,
            tx,
            connected,
            subscriptions,
        })
    }

    pub fn subscribe_messages(&self) -> broadcast::Receiver<MqttMessage> {
        self.tx.subscribe()
    }

    pub async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        self.publish_bytes(topic, payload.as_bytes(), QoS::AtLeastOnce, retain)
            .await
    }

    pub async fn subscribe(&self, topic: &str) -> Result<()> {
        {
            let mut subs = self
                .subscriptions
                .write()
                .map_err(|_| anyhow!("MQTT subscription list poisoned"))?;
            if !subs.iter().any(|t| t == topic) {
                subs.push(topic.to_string());
            }
        }

        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| anyhow!("Failed to subscribe to topic {}: {}", topic, e))
    }

    pub async fn ack(&self, topic: &str, pkid: u16) -> Result<()> {
        let publish = rumqttc::Publish {
            pkid,
            topic: topic.to_string(),
            qos: QoS::AtLeastOnce,
            payload: bytes::Bytes::new(),
            retain: false,
            dup: false,
        };

        self.client
            .ack(&publish)
            .await
            .map_err(|e| anyhow!("Failed to ack packet {}: {}", pkid, e))
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .map_err(|e| anyhow!("Failed to disconnect from broker: {}", e))
    }
}

#[async_trait::async_trait]
impl MqttPublisherClient for MqttClient {
    async fn publish_bytes(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<()> {
        self.client
            .publish(topic, qos, retain, payload)
            .await
            .map_err(|e| anyhow!("Failed to publish MQTT message: {}", e))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
