//! Per-tick control loop for the room node
//!
//! The NodeController owns the occupancy engine, the dispatcher, and the
//! room occupancy count. Each tick drains at most one inbound message into
//! the dispatcher, takes one pair of doorway measurements for the engine,
//! and reports both outcomes outward. Engine state is only ever touched
//! from this task.

use crate::domain::types::{DistanceSample, InboundMessage, OccupancyCount, OccupancyDelta};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::hardware::{DistanceSensor, IrTransmitter, TemperatureSensor};
use crate::io::notice::{NoticeSender, StatusPayload};
use crate::services::dispatcher::Dispatcher;
use crate::services::occupancy::OccupancyEngine;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration};
use tracing::{debug, info};
use uuid::Uuid;

/// Central control loop: sensing, inference, dispatch, reporting.
pub struct NodeController {
    engine: OccupancyEngine,
    dispatcher: Dispatcher,
    /// Room occupancy, updated here in response to engine deltas
    occupancy: OccupancyCount,
    inner_sensor: Box<dyn DistanceSensor>,
    outer_sensor: Box<dyn DistanceSensor>,
    notices: NoticeSender,
    metrics: Arc<Metrics>,
    config: Config,
}

impl NodeController {
    /// Create a controller wired to the given hardware ports.
    pub fn new(
        config: Config,
        inner_sensor: Box<dyn DistanceSensor>,
        outer_sensor: Box<dyn DistanceSensor>,
        temperature: Box<dyn TemperatureSensor>,
        ir: Box<dyn IrTransmitter>,
        notices: NoticeSender,
        metrics: Arc<Metrics>,
    ) -> Self {
        let engine = OccupancyEngine::new(config.baseline_cm(), config.margin_cm());
        let dispatcher = Dispatcher::new(temperature, ir, notices.clone(), metrics.clone());
        Self {
            engine,
            dispatcher,
            occupancy: OccupancyCount::new(),
            inner_sensor,
            outer_sensor,
            notices,
            metrics,
            config,
        }
    }

    /// Run the control loop until shutdown.
    pub async fn run(
        &mut self,
        mut inbound_rx: mpsc::Receiver<InboundMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        self.announce();

        let mut tick_interval = interval(Duration::from_millis(self.config.poll_interval_ms()));

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("controller_shutdown");
                        return;
                    }
                }
                _ = tick_interval.tick() => {
                    self.tick(&mut inbound_rx).await;
                }
            }
        }
    }

    /// Publish the retained status notice announcing this node is up.
    fn announce(&self) {
        let payload = StatusPayload {
            node: self.config.node_id().to_string(),
            version: format!("{} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH")),
            session: Uuid::now_v7().to_string(),
            started_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        };
        info!(node = %payload.node, version = %payload.version, "node_announced");
        self.notices.send_status(payload);
    }

    /// One control loop tick: at most one dispatched message, one sensor
    /// pair, one possible occupancy delta.
    pub(crate) async fn tick(&mut self, inbound_rx: &mut mpsc::Receiver<InboundMessage>) {
        self.metrics.record_tick();

        if let Ok(message) = inbound_rx.try_recv() {
            let result = self.dispatcher.dispatch(&message).await;
            self.metrics.record_dispatch(result);
            debug!(topic = %message.topic, result = %result.as_str(), "dispatch_complete");
        }

        let inner = self.inner_sensor.measure().await;
        let outer = self.outer_sensor.measure().await;
        if inner == DistanceSample::NoEcho {
            self.metrics.record_sensor_timeout();
        }
        if outer == DistanceSample::NoEcho {
            self.metrics.record_sensor_timeout();
        }

        let delta = self.engine.observe(inner, outer);
        if delta != OccupancyDelta::None {
            self.report_delta(delta);
        }
    }

    fn report_delta(&mut self, delta: OccupancyDelta) {
        self.occupancy.apply(delta);
        self.metrics.record_delta(delta);

        info!(
            delta = %delta.as_i32(),
            previous = %self.occupancy.previous(),
            current = %self.occupancy.current(),
            "occupancy_changed"
        );

        self.notices.send_occupancy_change(delta);
        self.notices.send_log(format!(
            "Occupancy change of {}; room count updated from {} to {}.",
            delta.as_i32(),
            self.occupancy.previous(),
            self.occupancy.current()
        ));
    }

    /// Current room occupancy as tracked by this loop.
    pub fn occupancy(&self) -> OccupancyCount {
        self.occupancy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::hardware::mock::{
        FixedTemperatureSensor, RecordingIrTransmitter, ScriptedDistanceSensor,
    };
    use crate::io::notice::{create_notice_channel, Notice};

    const FAR: DistanceSample = DistanceSample::Range(150.0);
    const NEAR: DistanceSample = DistanceSample::Range(60.0);

    struct Fixture {
        controller: NodeController,
        inbound_tx: mpsc::Sender<InboundMessage>,
        inbound_rx: mpsc::Receiver<InboundMessage>,
        notice_rx: mpsc::Receiver<Notice>,
        ir: RecordingIrTransmitter,
        metrics: Arc<Metrics>,
    }

    /// Build a controller whose doorway sensors replay the given scripts.
    fn fixture(inner: Vec<DistanceSample>, outer: Vec<DistanceSample>) -> Fixture {
        let config = Config::default().with_sensor_geometry(150.0, 30.0);
        let metrics = Arc::new(Metrics::new());
        let (notices, notice_rx) = create_notice_channel(64, metrics.clone());
        let (inbound_tx, inbound_rx) = mpsc::channel(16);
        let ir = RecordingIrTransmitter::new();

        let controller = NodeController::new(
            config,
            Box::new(ScriptedDistanceSensor::new(inner, FAR)),
            Box::new(ScriptedDistanceSensor::new(outer, FAR)),
            Box::new(FixedTemperatureSensor::new(21.0)),
            Box::new(ir.clone()),
            notices,
            metrics.clone(),
        );

        Fixture { controller, inbound_tx, inbound_rx, notice_rx, ir, metrics }
    }

    async fn run_ticks(fixture: &mut Fixture, ticks: usize) {
        for _ in 0..ticks {
            let rx = &mut fixture.inbound_rx;
            fixture.controller.tick(rx).await;
        }
    }

    fn drain_notices(rx: &mut mpsc::Receiver<Notice>) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(notice) = rx.try_recv() {
            notices.push(notice);
        }
        notices
    }

    #[tokio::test]
    async fn test_entry_updates_count_and_publishes_delta() {
        // Inner sensor triggers first, then outer, then both clear: an entry
        let mut fixture = fixture(
            vec![NEAR, NEAR, FAR, FAR],
            vec![FAR, NEAR, NEAR, FAR],
        );

        run_ticks(&mut fixture, 4).await;

        assert_eq!(fixture.controller.occupancy().current(), 1);
        assert_eq!(fixture.controller.occupancy().previous(), 0);

        let notices = drain_notices(&mut fixture.notice_rx);
        assert!(notices.iter().any(|n| matches!(n, Notice::OccupancyChange(1))));
        assert_eq!(fixture.metrics.report().occupancy_entries, 1);
    }

    #[tokio::test]
    async fn test_exit_clamps_at_zero() {
        // Outer first: an exit while the tracked count is already zero
        let mut fixture = fixture(
            vec![FAR, NEAR, NEAR, FAR],
            vec![NEAR, NEAR, FAR, FAR],
        );

        run_ticks(&mut fixture, 4).await;

        assert_eq!(fixture.controller.occupancy().current(), 0);

        let notices = drain_notices(&mut fixture.notice_rx);
        // The delta is still reported; clamping is local bookkeeping
        assert!(notices.iter().any(|n| matches!(n, Notice::OccupancyChange(-1))));
        assert_eq!(fixture.metrics.report().occupancy_exits, 1);
    }

    #[tokio::test]
    async fn test_idle_ticks_publish_nothing() {
        let mut fixture = fixture(vec![], vec![]);

        run_ticks(&mut fixture, 20).await;

        assert_eq!(fixture.metrics.report().ticks, 20);
        assert!(drain_notices(&mut fixture.notice_rx).is_empty());
        assert_eq!(fixture.controller.occupancy().current(), 0);
    }

    #[tokio::test]
    async fn test_tick_drains_one_message_and_dispatches() {
        let mut fixture = fixture(vec![], vec![]);

        fixture
            .inbound_tx
            .send(InboundMessage {
                topic: "RPiServer/command/power".to_string(),
                payload: "on".to_string(),
            })
            .await
            .unwrap();
        fixture
            .inbound_tx
            .send(InboundMessage {
                topic: "RPiServer/command/power".to_string(),
                payload: "off".to_string(),
            })
            .await
            .unwrap();

        // One message per tick: after the first tick only one transmission
        run_ticks(&mut fixture, 1).await;
        assert_eq!(fixture.ir.transmission_count(), 1);

        run_ticks(&mut fixture, 1).await;
        assert_eq!(fixture.ir.transmission_count(), 2);
        assert_eq!(fixture.metrics.report().dispatch_success, 2);
    }

    #[tokio::test]
    async fn test_dispatch_and_sensing_within_one_tick() {
        // A request arrives while a traversal completes on the same ticks
        let mut fixture = fixture(
            vec![NEAR, FAR, FAR],
            vec![FAR, NEAR, FAR],
        );

        fixture
            .inbound_tx
            .send(InboundMessage {
                topic: "RPiServer/request/temp".to_string(),
                payload: "0".to_string(),
            })
            .await
            .unwrap();

        run_ticks(&mut fixture, 3).await;

        let notices = drain_notices(&mut fixture.notice_rx);
        assert!(notices.iter().any(|n| matches!(n, Notice::Temperature(t) if *t == 21.0)));
        assert!(notices.iter().any(|n| matches!(n, Notice::OccupancyChange(1))));
    }

    #[tokio::test]
    async fn test_sensor_timeouts_counted_and_treated_as_far() {
        let mut fixture = fixture(
            vec![DistanceSample::NoEcho, DistanceSample::NoEcho],
            vec![FAR, DistanceSample::NoEcho],
        );

        run_ticks(&mut fixture, 2).await;

        assert_eq!(fixture.metrics.report().sensor_timeouts, 3);
        // No window ever opened
        assert!(drain_notices(&mut fixture.notice_rx).is_empty());
    }
}
