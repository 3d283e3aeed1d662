//! acnode - room-edge control node for the Smart AC system
//!
//! Reads a temperature sensor, relays IR commands to the air conditioner,
//! and infers occupancy changes from the doorway's ultrasonic sensor pair,
//! reporting everything to the coordinator over MQTT.
//!
//! Module structure:
//! - `domain/` - Core types (sensor symbols, occupancy deltas, IR signals)
//! - `io/` - External interfaces (MQTT, notices, hardware ports, metrics endpoint)
//! - `services/` - Business logic (OccupancyEngine, Dispatcher, NodeController)
//! - `infra/` - Infrastructure (Config, Metrics, Broker)

use acnode::infra::{Config, Metrics};
use acnode::io::hardware::{SimDistanceSensor, SimIrTransmitter, SimTemperatureSensor};
use acnode::io::{create_notice_channel, NoticeJournal, NoticePublisher};
use acnode::services::NodeController;
use clap::Parser;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// acnode - occupancy sensing and AC control for one room
#[derive(Parser, Debug)]
#[command(name = "acnode", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for full tick visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!("acnode starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    // Start embedded MQTT broker if configured (development only)
    acnode::infra::broker::start_embedded_broker(&config);

    info!(
        config_file = %config.config_file(),
        node_id = %config.node_id(),
        mqtt_host = %config.mqtt_host(),
        mqtt_port = %config.mqtt_port(),
        command_prefix = %config.command_prefix(),
        notice_prefix = %config.notice_prefix(),
        baseline_cm = %config.baseline_cm(),
        margin_cm = %config.margin_cm(),
        poll_interval_ms = %config.poll_interval_ms(),
        prometheus_port = %config.prometheus_port(),
        "config_loaded"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics = Arc::new(Metrics::new());

    // Notice channel and local journal
    let journal = if config.journal_enabled() {
        Some(Arc::new(Mutex::new(NoticeJournal::new(config.journal_dir()))))
    } else {
        None
    };
    let (notice_sender, notice_rx) = create_notice_channel(256, metrics.clone());

    // Start notice publisher
    let publisher = NoticePublisher::new(&config, notice_rx, journal, metrics.clone());
    let publisher_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        publisher.run(publisher_shutdown).await;
    });

    // Inbound message channel (bounded for backpressure)
    let (inbound_tx, inbound_rx) = mpsc::channel(64);

    // Start MQTT ingress client
    let mqtt_config = config.clone();
    let mqtt_metrics = metrics.clone();
    let mqtt_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        if let Err(e) =
            acnode::io::mqtt::start_mqtt_client(&mqtt_config, inbound_tx, mqtt_metrics, mqtt_shutdown)
                .await
        {
            tracing::error!(error = %e, "MQTT client error");
        }
    });

    // Start Prometheus metrics HTTP server (if port > 0)
    let prometheus_port = config.prometheus_port();
    if prometheus_port > 0 {
        let prom_metrics = metrics.clone();
        let prom_node = config.node_id().to_string();
        let prom_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = acnode::io::prometheus::start_metrics_server(
                prometheus_port,
                prom_metrics,
                prom_node,
                prom_shutdown,
            )
            .await
            {
                tracing::error!(error = %e, "Prometheus metrics server error");
            }
        });
    }

    // Start metrics summary reporter
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    // Hardware ports. GPIO-backed implementations live with the deployment
    // target; the default wiring is the simulated set.
    let inner_sensor = Box::new(SimDistanceSensor::new(config.sim_distance_cm()));
    let outer_sensor = Box::new(SimDistanceSensor::new(config.sim_distance_cm()));
    let temperature = Box::new(SimTemperatureSensor::new(config.sim_temperature_c()));
    let ir = Box::new(SimIrTransmitter);

    let mut controller = NodeController::new(
        config,
        inner_sensor,
        outer_sensor,
        temperature,
        ir,
        notice_sender,
        metrics,
    );
    info!("controller_started");

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx;
    let controller_shutdown = shutdown_rx;
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    // Run the control loop until shutdown
    controller.run(inbound_rx, controller_shutdown).await;

    info!("acnode shutdown complete");
    Ok(())
}
