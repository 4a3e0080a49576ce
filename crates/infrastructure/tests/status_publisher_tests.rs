use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use domain::{DeviceStatus, LatestStatus, PrinterStatus};
use infrastructure::messaging::mqtt_client::MqttPublisherClient;
use infrastructure::messaging::status_publisher::StatusPublisher;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct MockMqttClient {
    published: Arc<Mutex<Vec<(String, serde_json::Value, bool)>>>,
    should_fail_publish: Arc<AtomicBool>,
}

impl MockMqttClient {
    fn new() -> Self {
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            should_fail_publish: Arc::new(AtomicBool::new(false)),
        }
    }

    fn messages(&self) -> Vec<(String, serde_json::Value, bool)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl MqttPublisherClient for MockMqttClient {
    async fn publish_bytes(
        &self,
        topic: &str,
        payload: &[u8],
        _qos: rumqttc::QoS,
        retain: bool,
    ) -> Result<()> {
        if self.should_fail_publish.load(Ordering::Relaxed) {
            return Err(anyhow!("Simulated Publish Failure"));
        }
        let value: serde_json::Value = serde_json::from_slice(payload)?;
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), value, retain));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }
}

fn publisher(client: &MockMqttClient) -> StatusPublisher {
    let client_arc: Arc<dyn MqttPublisherClient> = Arc::new(client.clone());
    StatusPublisher::new(
        client_arc,
        "front-desk".to_string(),
        "thermal/front-desk/status".to_string(),
    )
}

#[tokio::test]
async fn test_publishes_initial_value_and_each_change() {
    let client = MockMqttClient::new();
    let publisher = publisher(&client);
    let (status_tx, status_rx) = watch::channel(LatestStatus::Pending);
    let cancel_token = CancellationToken::new();

    let task = {
        let token = cancel_token.clone();
        tokio::spawn(async move { publisher.run(status_rx, token).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    status_tx.send_replace(LatestStatus::Available(PrinterStatus::observed(
        DeviceStatus::idle(),
        Utc::now(),
    )));
    tokio::time::sleep(Duration::from_millis(50)).await;

    cancel_token.cancel();
    task.await.unwrap();

    let messages = client.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|(topic, _, retain)| topic == "thermal/front-desk/status" && *retain));
    assert_eq!(messages[0].1["state"], "offline");
    assert_eq!(messages[1].1["state"], "idle");
    assert_eq!(messages[1].1["printer_id"], "front-desk");
}

#[tokio::test]
async fn test_stops_when_sender_dropped() {
    let client = MockMqttClient::new();
    let publisher = publisher(&client);
    let (status_tx, status_rx) = watch::channel(LatestStatus::Pending);

    drop(status_tx);
    tokio::time::timeout(
        Duration::from_secs(1),
        publisher.run(status_rx, CancellationToken::new()),
    )
    .await
    .expect("publisher should stop once the channel closes");

    assert_eq!(client.messages().len(), 1);
}

#[tokio::test]
async fn test_publish_failure_is_reported() {
    let client = MockMqttClient::new();
    client.should_fail_publish.store(true, Ordering::Relaxed);
    let publisher = publisher(&client);

    assert!(publisher.publish(&LatestStatus::Pending).await.is_err());
    assert!(publisher.publish_offline().await.is_err());

    client.should_fail_publish.store(false, Ordering::Relaxed);
    publisher.publish_offline().await.unwrap();
    let messages = client.messages();
    assert_eq!(messages[0].1["reason"], "agent offline");
}
