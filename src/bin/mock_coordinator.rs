//! Mock coordinator
//!
//! Stands in for the Smart AC coordinator during local testing: publishes
//! commands and requests on the coordinator's topics and watches the node's
//! notices.
//!
//! Usage:
//!   cargo run --bin mock-coordinator -- watch
//!   cargo run --bin mock-coordinator -- power on
//!   cargo run --bin mock-coordinator -- mode quiet
//!   cargo run --bin mock-coordinator -- temp 21
//!   cargo run --bin mock-coordinator -- request-temp

use clap::{Parser, Subcommand};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mock-coordinator")]
#[command(about = "Mock Smart AC coordinator for exercising a room node")]
struct Args {
    /// MQTT broker host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// MQTT broker port
    #[arg(long, default_value = "1883")]
    port: u16,

    /// Prefix the node expects commands under
    #[arg(long, default_value = "RPiServer")]
    command_prefix: String,

    /// Prefix the node publishes notices under
    #[arg(long, default_value = "arduino")]
    notice_prefix: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish a power command
    Power { state: String },
    /// Publish a mode command
    Mode { mode: String },
    /// Publish a target temperature command
    Temp { temp: String },
    /// Request a temperature reading and wait for the notice
    RequestTemp,
    /// Subscribe to all node notices and print them
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();

    let client_id = format!("mock-coordinator-{}", std::process::id());
    let mut mqttoptions = MqttOptions::new(client_id, &args.host, args.port);
    mqttoptions.set_keep_alive(Duration::from_secs(30));
    let (client, mut eventloop) = AsyncClient::new(mqttoptions, 16);

    let notice_filter = format!("{}/notice/#", args.notice_prefix);

    match &args.command {
        Command::Power { state } => {
            publish_and_drain(
                &client,
                &mut eventloop,
                &format!("{}/command/power", args.command_prefix),
                state,
            )
            .await?;
        }
        Command::Mode { mode } => {
            publish_and_drain(
                &client,
                &mut eventloop,
                &format!("{}/command/mode", args.command_prefix),
                mode,
            )
            .await?;
        }
        Command::Temp { temp } => {
            publish_and_drain(
                &client,
                &mut eventloop,
                &format!("{}/command/temp", args.command_prefix),
                temp,
            )
            .await?;
        }
        Command::RequestTemp => {
            let temp_topic = format!("{}/notice/temp", args.notice_prefix);
            client.subscribe(&temp_topic, QoS::AtMostOnce).await?;
            client
                .publish(
                    format!("{}/request/temp", args.command_prefix),
                    QoS::AtMostOnce,
                    false,
                    // Payload is irrelevant for a temp request but can't be blank
                    "0",
                )
                .await?;
            info!("temperature requested; waiting for notice");

            let wait = tokio::time::timeout(Duration::from_secs(10), async {
                loop {
                    if let Ok(Event::Incoming(Packet::Publish(publish))) = eventloop.poll().await {
                        if publish.topic == temp_topic {
                            let payload = String::from_utf8_lossy(&publish.payload).to_string();
                            return payload;
                        }
                    }
                }
            })
            .await;

            match wait {
                Ok(temp) => info!(temp = %temp, "temperature_notice_received"),
                Err(_) => warn!("no temperature notice within 10s"),
            }
        }
        Command::Watch => {
            client.subscribe(&notice_filter, QoS::AtMostOnce).await?;
            info!(filter = %notice_filter, "watching node notices; Ctrl-C to stop");
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let payload = String::from_utf8_lossy(&publish.payload);
                        info!(topic = %publish.topic, payload = %payload, "notice");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "mqtt error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Publish one message, then poll the eventloop long enough to flush it.
async fn publish_and_drain(
    client: &AsyncClient,
    eventloop: &mut rumqttc::EventLoop,
    topic: &str,
    payload: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    client.publish(topic, QoS::AtLeastOnce, false, payload).await?;
    info!(topic = %topic, payload = %payload, "published");

    // Wait for the PubAck so the message actually leaves before exiting
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        match tokio::time::timeout_at(deadline, eventloop.poll()).await {
            Ok(Ok(Event::Incoming(Packet::PubAck(_)))) => return Ok(()),
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                warn!("no PubAck within 5s");
                return Ok(());
            }
        }
    }
}
