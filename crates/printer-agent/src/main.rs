use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application::{CommandHandler, CommandListener, CoordinatorConfig, SessionCoordinator};
use infrastructure::config::AgentConfig;
use infrastructure::messaging::mqtt_client::MqttPublisherClient;
use infrastructure::messaging::status_publisher::offline_payload;
use infrastructure::{DriverFactory, MqttClient, StatusPublisher};
use printer_agent::startup::start_with_retries;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config directory
    #[arg(long, default_value = "config")]
    config_dir: String,

    /// Override printer ID
    #[arg(long)]
    printer_id: Option<String>,

    /// Override printer address
    #[arg(long)]
    address: Option<String>,

    /// Override MQTT Host
    #[arg(long)]
    mqtt_host: Option<String>,

    /// Override MQTT Port
    #[arg(long)]
    mqtt_port: Option<u16>,
}

async fn run() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,printer_agent=debug,application=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Thermal printer agent starting");
    info!(pid = std::process::id(), "Process started");

    let args = Args::parse();

    // Development runs start from the workspace root
    let dev_base = "crates/printer-agent";
    let config_dir = if std::path::Path::new(dev_base).join(&args.config_dir).exists() {
        format!("{}/{}", dev_base, args.config_dir)
    } else {
        args.config_dir.clone()
    };
    info!(config_dir = %config_dir, "Loading configuration");

    let mut config = AgentConfig::load(&config_dir)
        .with_context(|| format!("Failed to load configuration from {}", config_dir))?;

    if let Some(id) = args.printer_id {
        config.printer_id = id;
    }
    if let Some(address) = args.address {
        config.printer.address = address;
    }
    if let Some(host) = args.mqtt_host {
        config.mqtt.host = host;
    }
    if let Some(port) = args.mqtt_port {
        config.mqtt.port = port;
    }
    config.validate().context("Invalid configuration")?;

    let printer_id = config.printer_id.clone();
    info!(
        printer_id = %printer_id,
        address = %config.printer.address,
        driver = config.printer.driver.as_str(),
        "Loaded configuration"
    );

    // 1. MQTT, with the offline marker as last will
    let status_topic = config.status_topic();
    let last_will = rumqttc::LastWill::new(
        &status_topic,
        offline_payload(&printer_id).to_string(),
        rumqttc::QoS::AtLeastOnce,
        true,
    );
    info!(host = %config.mqtt.host, port = config.mqtt.port, "Connecting to MQTT broker");
    let mqtt_client = MqttClient::new(
        &config.mqtt.host,
        config.mqtt.port,
        &format!("printer-{}", printer_id),
        Some(last_will),
    )
    .await
    .context("Failed to create MQTT client")?;

    let client_arc: Arc<dyn MqttPublisherClient> = Arc::new(mqtt_client.clone());
    let status_publisher = Arc::new(StatusPublisher::new(
        client_arc,
        printer_id.clone(),
        status_topic,
    ));

    // 2. Shutdown signal
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown requested"),
                Err(err) => warn!(error = %err, "Unable to listen for shutdown signal"),
            }
            shutdown.cancel();
        });
    }

    // 3. Printer session
    let driver = DriverFactory::create_driver(&config.printer)?;
    info!(driver = driver.driver_type(), "Printer driver ready");
    let coordinator_config = CoordinatorConfig::from_printer_config(&config.printer);

    let coordinator = start_with_retries(
        || Arc::new(SessionCoordinator::new(driver.clone(), coordinator_config.clone())),
        &config.startup,
        &shutdown,
    )
    .await;

    let coordinator = match coordinator {
        Ok(coordinator) => coordinator,
        Err(e) => {
            if let Err(publish_err) = status_publisher.publish_offline().await {
                warn!(error = %publish_err, "Failed to publish offline marker");
            }
            return Err(e);
        }
    };

    // 4. Status mirroring and command handling
    let publisher_handle = {
        let publisher = status_publisher.clone();
        let status_rx = coordinator.subscribe_status();
        let token = shutdown.clone();
        tokio::spawn(async move { publisher.run(status_rx, token).await })
    };

    let listener = CommandListener::new(
        mqtt_client.clone(),
        printer_id.clone(),
        config.command_topic(),
        config.result_topic(),
        CommandHandler::new(coordinator.clone())
            .with_default_font_size(config.printer.font_size),
    );
    let listener_handle = {
        let token = shutdown.clone();
        tokio::spawn(async move { listener.run(token).await })
    };

    info!(printer_id = %printer_id, "Printer agent running");
    shutdown.cancelled().await;

    // 5. Shutdown
    coordinator.stop().await;
    let _ = publisher_handle.await;
    let _ = listener_handle.await;

    if let Err(e) = status_publisher.publish_offline().await {
        warn!(error = %e, "Failed to publish offline marker");
    }
    if let Err(e) = mqtt_client.disconnect().await {
        warn!(error = %e, "Failed to disconnect from MQTT broker");
    }

    info!("Good bye!");
    Ok(())
}

fn main() {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(run()) {
        eprintln!("\nCRITICAL ERROR: {:?}", e);
        std::process::exit(1);
    }
}
