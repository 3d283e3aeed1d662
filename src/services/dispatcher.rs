//! Inbound command dispatch
//!
//! Routes each coordinator message to a device action: a temperature read
//! for requests, an IR transmission for commands. Validation fails closed;
//! every outcome is reported back through a log notice and none aborts the
//! control loop.

use crate::domain::ir::{AcSignal, SignalBank};
use crate::domain::types::{
    AcMode, ActionResult, InboundMessage, PowerState, TopicCategory, TopicRoute,
};
use crate::infra::metrics::Metrics;
use crate::io::hardware::{IrTransmitter, TemperatureSensor};
use crate::io::notice::NoticeSender;
use std::sync::Arc;
use tracing::{debug, warn};

/// Maps validated coordinator messages onto the temperature sensor and the
/// IR emitter. Owns the pulse-table bank; one dispatch selects at most one
/// table.
pub struct Dispatcher {
    signals: SignalBank,
    temperature: Box<dyn TemperatureSensor>,
    ir: Box<dyn IrTransmitter>,
    notices: NoticeSender,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(
        temperature: Box<dyn TemperatureSensor>,
        ir: Box<dyn IrTransmitter>,
        notices: NoticeSender,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { signals: SignalBank::new(), temperature, ir, notices, metrics }
    }

    /// Dispatch one inbound message. Never panics, never escalates; the
    /// returned result is also reported via a log notice.
    pub async fn dispatch(&mut self, message: &InboundMessage) -> ActionResult {
        let Some(route) = TopicRoute::parse(&message.topic) else {
            self.notices
                .send_log(format!("Ignored message on malformed topic '{}'.", message.topic));
            return ActionResult::InvalidAction;
        };

        debug!(
            category = ?route.category,
            action = %route.action,
            payload = %message.payload,
            "dispatching"
        );

        match route.category {
            TopicCategory::Request => self.handle_request(&route.action).await,
            TopicCategory::Command => self.handle_command(&route.action, &message.payload),
            TopicCategory::Other(category) => {
                self.notices.send_log(format!(
                    "Ignored message with unknown category '{}' on topic '{}'.",
                    category, message.topic
                ));
                ActionResult::InvalidAction
            }
        }
    }

    /// Requests ask the node to report a reading back to the coordinator.
    /// Only the temperature request exists.
    async fn handle_request(&mut self, action: &str) -> ActionResult {
        match action {
            "temp" => {
                match self.temperature.read().await {
                    Ok(celsius) => {
                        self.metrics.record_temperature_read();
                        self.notices.send_temperature(celsius);
                        self.notices
                            .send_log(format!("Temperature of {celsius:.1} read and reported."));
                    }
                    Err(e) => {
                        // The request was valid; the failure is reported, not escalated
                        warn!(error = %e, "temperature_read_failed");
                        self.notices.send_log(format!("Temperature read failed: {e}."));
                    }
                }
                ActionResult::Success
            }
            other => {
                self.notices.send_log(format!("Invalid request action '{other}' received."));
                ActionResult::InvalidAction
            }
        }
    }

    /// Commands select exactly one IR signal; anything outside the
    /// enumerated action/argument sets transmits nothing.
    fn handle_command(&mut self, action: &str, payload: &str) -> ActionResult {
        let signal = match action {
            "power" => match payload.parse::<PowerState>() {
                Ok(state) => AcSignal::Power(state),
                Err(()) => {
                    self.notices.send_log(format!(
                        "Invalid payload of '{payload}' received for power command."
                    ));
                    return ActionResult::InvalidArgument;
                }
            },
            "mode" => match payload.parse::<AcMode>() {
                Ok(mode) => AcSignal::Mode(mode),
                Err(()) => {
                    self.notices
                        .send_log(format!("Invalid mode '{payload}' received."));
                    return ActionResult::InvalidArgument;
                }
            },
            "temp" => {
                // The ten presets are keyed by the argument's second
                // character: "17" and "t7" both select 17 degrees.
                match payload.chars().nth(1).and_then(AcSignal::temp_from_code_digit) {
                    Some(signal) => signal,
                    None => {
                        self.notices.send_log(format!(
                            "Invalid payload of '{payload}' received for target temperature command."
                        ));
                        return ActionResult::InvalidArgument;
                    }
                }
            }
            other => {
                self.notices.send_log(format!("Invalid command action '{other}' received."));
                return ActionResult::InvalidAction;
            }
        };

        self.transmit(signal);
        ActionResult::Success
    }

    fn transmit(&mut self, signal: AcSignal) {
        let table = self.signals.table(signal);
        match self.ir.transmit(&table) {
            Ok(()) => {
                self.metrics.record_ir_transmission();
                self.notices.send_log(format!("Transmitted {} signal.", signal.name()));
            }
            Err(e) => {
                self.metrics.record_ir_failure();
                warn!(error = %e, signal = %signal.name(), "ir_transmit_failed");
                self.notices
                    .send_log(format!("IR transmission of {} failed: {e}.", signal.name()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::hardware::mock::{FixedTemperatureSensor, RecordingIrTransmitter};
    use crate::io::notice::{create_notice_channel, Notice};
    use tokio::sync::mpsc;

    fn dispatcher_with_ir(
        ir: RecordingIrTransmitter,
    ) -> (Dispatcher, mpsc::Receiver<Notice>, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::new());
        let (notices, rx) = create_notice_channel(32, metrics.clone());
        let dispatcher = Dispatcher::new(
            Box::new(FixedTemperatureSensor::new(22.5)),
            Box::new(ir),
            notices,
            metrics.clone(),
        );
        (dispatcher, rx, metrics)
    }

    fn msg(topic: &str, payload: &str) -> InboundMessage {
        InboundMessage { topic: topic.to_string(), payload: payload.to_string() }
    }

    #[tokio::test]
    async fn test_power_on_transmits() {
        let ir = RecordingIrTransmitter::new();
        let (mut dispatcher, _rx, metrics) = dispatcher_with_ir(ir.clone());

        let result = dispatcher.dispatch(&msg("RPiServer/command/power", "on")).await;

        assert_eq!(result, ActionResult::Success);
        assert_eq!(ir.transmission_count(), 1);
        assert_eq!(metrics.report().ir_transmissions, 1);
    }

    #[tokio::test]
    async fn test_power_bad_argument_transmits_nothing() {
        let ir = RecordingIrTransmitter::new();
        let (mut dispatcher, _rx, _metrics) = dispatcher_with_ir(ir.clone());

        let result = dispatcher.dispatch(&msg("RPiServer/command/power", "bad")).await;

        assert_eq!(result, ActionResult::InvalidArgument);
        assert_eq!(ir.transmission_count(), 0);
    }

    #[tokio::test]
    async fn test_power_on_and_off_are_distinct_tables() {
        let ir = RecordingIrTransmitter::new();
        let (mut dispatcher, _rx, _metrics) = dispatcher_with_ir(ir.clone());

        dispatcher.dispatch(&msg("RPiServer/command/power", "on")).await;
        dispatcher.dispatch(&msg("RPiServer/command/power", "off")).await;

        let sent = ir.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_ne!(sent[0], sent[1]);
    }

    #[tokio::test]
    async fn test_mode_arguments() {
        let ir = RecordingIrTransmitter::new();
        let (mut dispatcher, _rx, _metrics) = dispatcher_with_ir(ir.clone());

        for mode in ["cooling", "super", "quiet"] {
            let result = dispatcher.dispatch(&msg("RPiServer/command/mode", mode)).await;
            assert_eq!(result, ActionResult::Success, "mode {mode}");
        }
        assert_eq!(ir.transmission_count(), 3);

        let result = dispatcher.dispatch(&msg("RPiServer/command/mode", "heat")).await;
        assert_eq!(result, ActionResult::InvalidArgument);
        assert_eq!(ir.transmission_count(), 3);
    }

    #[tokio::test]
    async fn test_temp_second_character_selects_preset() {
        let ir = RecordingIrTransmitter::new();
        let (mut dispatcher, _rx, _metrics) = dispatcher_with_ir(ir.clone());

        // "t7" and "17" select the same 17-degree table
        assert_eq!(
            dispatcher.dispatch(&msg("x/command/temp", "t7")).await,
            ActionResult::Success
        );
        assert_eq!(
            dispatcher.dispatch(&msg("x/command/temp", "17")).await,
            ActionResult::Success
        );

        let sent = ir.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], sent[1]);
    }

    #[tokio::test]
    async fn test_temp_non_digit_second_character_rejected() {
        let ir = RecordingIrTransmitter::new();
        let (mut dispatcher, _rx, _metrics) = dispatcher_with_ir(ir.clone());

        for payload in ["tx", "1", "", "2x5"] {
            let result = dispatcher.dispatch(&msg("RPiServer/command/temp", payload)).await;
            assert_eq!(result, ActionResult::InvalidArgument, "payload '{payload}'");
        }
        assert_eq!(ir.transmission_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_command_action() {
        let ir = RecordingIrTransmitter::new();
        let (mut dispatcher, _rx, _metrics) = dispatcher_with_ir(ir.clone());

        let result = dispatcher.dispatch(&msg("RPiServer/command/swing", "on")).await;
        assert_eq!(result, ActionResult::InvalidAction);
        assert_eq!(ir.transmission_count(), 0);
    }

    #[tokio::test]
    async fn test_request_temp_reports_reading() {
        let ir = RecordingIrTransmitter::new();
        let (mut dispatcher, mut rx, metrics) = dispatcher_with_ir(ir.clone());

        let result = dispatcher.dispatch(&msg("RPiServer/request/temp", "0")).await;

        assert_eq!(result, ActionResult::Success);
        assert_eq!(metrics.report().temperature_reads, 1);
        assert!(matches!(rx.recv().await, Some(Notice::Temperature(t)) if t == 22.5));
        // No IR involvement in requests
        assert_eq!(ir.transmission_count(), 0);
    }

    #[tokio::test]
    async fn test_request_temp_read_failure_is_reported_not_escalated() {
        let metrics = Arc::new(Metrics::new());
        let (notices, mut rx) = create_notice_channel(32, metrics.clone());
        let mut dispatcher = Dispatcher::new(
            Box::new(FixedTemperatureSensor::failing()),
            Box::new(RecordingIrTransmitter::new()),
            notices,
            metrics.clone(),
        );

        let result = dispatcher.dispatch(&msg("RPiServer/request/temp", "0")).await;

        assert_eq!(result, ActionResult::Success);
        assert_eq!(metrics.report().temperature_reads, 0);
        // Only a log notice goes out, no temperature notice
        assert!(matches!(rx.recv().await, Some(Notice::Log(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_request_action_fails_closed() {
        let ir = RecordingIrTransmitter::new();
        let (mut dispatcher, _rx, _metrics) = dispatcher_with_ir(ir);

        let result = dispatcher.dispatch(&msg("RPiServer/request/humidity", "0")).await;
        assert_eq!(result, ActionResult::InvalidAction);
    }

    #[tokio::test]
    async fn test_unknown_category_fails_closed() {
        let ir = RecordingIrTransmitter::new();
        let (mut dispatcher, _rx, _metrics) = dispatcher_with_ir(ir.clone());

        let result = dispatcher.dispatch(&msg("RPiServer/notice/temp", "21.0")).await;
        assert_eq!(result, ActionResult::InvalidAction);
        assert_eq!(ir.transmission_count(), 0);
    }

    #[tokio::test]
    async fn test_topic_without_separator_does_not_crash() {
        let ir = RecordingIrTransmitter::new();
        let (mut dispatcher, _rx, _metrics) = dispatcher_with_ir(ir.clone());

        let result = dispatcher.dispatch(&msg("power", "on")).await;
        assert_eq!(result, ActionResult::InvalidAction);
        assert_eq!(ir.transmission_count(), 0);
    }
}
