//! MQTT client for receiving coordinator commands and requests
//!
//! Subscribes to `{command_prefix}/command/+` and `{command_prefix}/request/+`
//! and forwards each publish to the control loop as an `InboundMessage`.
//! Messages are forwarded with try_send so a slow control loop can never
//! stall the MQTT eventloop; drops are counted and logged (rate-limited).

use crate::domain::types::InboundMessage;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

/// Start the MQTT client and forward inbound messages to the channel.
pub async fn start_mqtt_client(
    config: &Config,
    inbound_tx: mpsc::Sender<InboundMessage>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let client_id = format!("{}-{}", config.node_id(), std::process::id());
    let mut mqttoptions = MqttOptions::new(client_id, config.mqtt_host(), config.mqtt_port());
    mqttoptions.set_keep_alive(Duration::from_secs(30));

    if let (Some(username), Some(password)) = (config.mqtt_username(), config.mqtt_password()) {
        mqttoptions.set_credentials(username, password);
    }

    let (client, mut eventloop) = AsyncClient::new(mqttoptions, 64);
    for filter in config.subscription_filters() {
        client.subscribe(filter, QoS::AtMostOnce).await?;
    }

    info!(
        host = %config.mqtt_host(),
        port = %config.mqtt_port(),
        command_prefix = %config.command_prefix(),
        "MQTT client subscribed"
    );

    // Rate-limit drop warnings to 1 per second
    let mut last_drop_warn = Instant::now() - Duration::from_secs(2);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("mqtt_shutdown");
                    return Ok(());
                }
            }
            result = eventloop.poll() => {
                match result {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let topic = publish.topic.clone();
                        match std::str::from_utf8(&publish.payload) {
                            Ok(payload) => {
                                metrics.record_message_received();
                                let message = InboundMessage {
                                    topic,
                                    payload: payload.to_string(),
                                };
                                if let Err(e) = inbound_tx.try_send(message) {
                                    match e {
                                        TrySendError::Full(_) => {
                                            metrics.record_message_dropped();
                                            if last_drop_warn.elapsed() > Duration::from_secs(1) {
                                                warn!("inbound_message_dropped: channel full");
                                                last_drop_warn = Instant::now();
                                            }
                                        }
                                        TrySendError::Closed(_) => {
                                            warn!("inbound channel closed");
                                            return Ok(());
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, topic = %topic, "Invalid UTF-8 in MQTT payload");
                            }
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("MQTT connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "MQTT error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }
}
