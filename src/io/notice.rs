//! Typed channel and MQTT publisher for outbound notices
//!
//! The controller and dispatcher hand notices to a `NoticeSender`; a
//! publisher actor owns the MQTT connection and maps each notice to its
//! topic. Channel sends never block the control loop; overflow is counted
//! and logged.
//!
//! Topics (prefix configurable):
//! - `{prefix}/notice/occ_change` - signed occupancy delta, QoS 1
//! - `{prefix}/notice/temp` - decimal temperature string, QoS 0
//! - `{prefix}/notice/log` - free-text log notice, QoS 0
//! - `{prefix}/notice/status` - retained JSON birth message, QoS 1

use crate::domain::types::OccupancyDelta;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::notice_log::NoticeJournal;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Messages that can be sent to the notice publisher
#[derive(Debug)]
pub enum Notice {
    /// Signed occupancy delta from one classified doorway event
    OccupancyChange(i32),
    /// Temperature reading in Celsius
    Temperature(f64),
    /// Free-text log notice
    Log(String),
    /// Retained node status (birth message)
    Status(StatusPayload),
}

/// Payload for the retained status notice
#[derive(Debug, Clone, Serialize)]
pub struct StatusPayload {
    /// Node identifier
    pub node: String,
    /// Crate version plus git hash
    pub version: String,
    /// Unique id for this process run
    pub session: String,
    /// Boot timestamp (RFC 3339)
    pub started_at: String,
}

/// Cloneable sending half used by the controller and dispatcher.
#[derive(Clone)]
pub struct NoticeSender {
    tx: mpsc::Sender<Notice>,
    metrics: Arc<Metrics>,
}

impl NoticeSender {
    pub fn send_occupancy_change(&self, delta: OccupancyDelta) {
        self.send(Notice::OccupancyChange(delta.as_i32()));
    }

    pub fn send_temperature(&self, celsius: f64) {
        self.send(Notice::Temperature(celsius));
    }

    pub fn send_log(&self, message: impl Into<String>) {
        self.send(Notice::Log(message.into()));
    }

    pub fn send_status(&self, payload: StatusPayload) {
        self.send(Notice::Status(payload));
    }

    fn send(&self, notice: Notice) {
        if let Err(e) = self.tx.try_send(notice) {
            match e {
                TrySendError::Full(n) => {
                    self.metrics.record_notice_dropped();
                    warn!(notice = ?n, "notice_dropped: channel full");
                }
                TrySendError::Closed(_) => {
                    debug!("notice channel closed");
                }
            }
        }
    }
}

/// Create the bounded notice channel.
pub fn create_notice_channel(
    capacity: usize,
    metrics: Arc<Metrics>,
) -> (NoticeSender, mpsc::Receiver<Notice>) {
    let (tx, rx) = mpsc::channel(capacity);
    (NoticeSender { tx, metrics }, rx)
}

/// MQTT publisher actor
///
/// Receives notices from the channel, publishes each to its topic, and
/// mirrors every published notice into the local journal.
pub struct NoticePublisher {
    client: AsyncClient,
    rx: mpsc::Receiver<Notice>,
    occ_change_topic: String,
    temp_topic: String,
    log_topic: String,
    status_topic: String,
    journal: Option<Arc<Mutex<NoticeJournal>>>,
    metrics: Arc<Metrics>,
}

impl NoticePublisher {
    /// Create a new publisher connected to the configured broker.
    pub fn new(
        config: &Config,
        rx: mpsc::Receiver<Notice>,
        journal: Option<Arc<Mutex<NoticeJournal>>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let client_id = format!("{}-notice-{}", config.node_id(), std::process::id());
        let mut mqttoptions = MqttOptions::new(client_id, config.mqtt_host(), config.mqtt_port());
        mqttoptions.set_keep_alive(Duration::from_secs(30));
        mqttoptions.set_clean_session(true);

        if let (Some(username), Some(password)) = (config.mqtt_username(), config.mqtt_password())
        {
            mqttoptions.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(mqttoptions, 64);

        // Spawn the eventloop handler
        tokio::spawn(async move {
            let mut eventloop = eventloop;
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("notice_publisher_connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "notice_publisher_error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Self {
            client,
            rx,
            occ_change_topic: config.occ_change_topic(),
            temp_topic: config.temp_notice_topic(),
            log_topic: config.log_notice_topic(),
            status_topic: config.status_notice_topic(),
            journal,
            metrics,
        }
    }

    /// Run the publisher loop until shutdown, draining the channel on exit.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            occ_change = %self.occ_change_topic,
            temp = %self.temp_topic,
            log = %self.log_topic,
            status = %self.status_topic,
            "notice_publisher_started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("notice_publisher_shutdown");
                        while let Ok(notice) = self.rx.try_recv() {
                            self.publish_notice(notice).await;
                        }
                        return;
                    }
                }
                Some(notice) = self.rx.recv() => {
                    self.publish_notice(notice).await;
                }
            }
        }
    }

    async fn publish_notice(&mut self, notice: Notice) {
        let (topic, payload, qos, retain) = match notice {
            // QoS 1: a lost delta corrupts the coordinator's running count
            Notice::OccupancyChange(delta) => {
                (&self.occ_change_topic, delta.to_string(), QoS::AtLeastOnce, false)
            }
            Notice::Temperature(celsius) => {
                (&self.temp_topic, format!("{celsius:.1}"), QoS::AtMostOnce, false)
            }
            Notice::Log(message) => (&self.log_topic, message, QoS::AtMostOnce, false),
            Notice::Status(payload) => {
                let json = match serde_json::to_string(&payload) {
                    Ok(json) => json,
                    Err(e) => {
                        error!(error = %e, "status_serialize_failed");
                        return;
                    }
                };
                (&self.status_topic, json, QoS::AtLeastOnce, true)
            }
        };

        if let Some(ref journal) = self.journal {
            journal.lock().append(topic, &payload);
        }

        match self.client.publish(topic, qos, retain, payload.into_bytes()).await {
            Ok(()) => self.metrics.record_notice_published(),
            Err(e) => error!(error = %e, topic = %topic, "notice_publish_failed"),
        }
    }
}
