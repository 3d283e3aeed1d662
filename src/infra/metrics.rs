//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention. All
//! counters use Relaxed ordering intentionally: they are statistical only
//! and never coordinate logic.

use crate::domain::types::{ActionResult, OccupancyDelta};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Counters for one node process lifetime.
pub struct Metrics {
    started: Instant,
    ticks: AtomicU64,
    messages_received: AtomicU64,
    messages_dropped: AtomicU64,
    dispatch_success: AtomicU64,
    dispatch_invalid_action: AtomicU64,
    dispatch_invalid_argument: AtomicU64,
    occupancy_entries: AtomicU64,
    occupancy_exits: AtomicU64,
    sensor_timeouts: AtomicU64,
    temperature_reads: AtomicU64,
    ir_transmissions: AtomicU64,
    ir_failures: AtomicU64,
    notices_published: AtomicU64,
    notices_dropped: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            ticks: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            dispatch_success: AtomicU64::new(0),
            dispatch_invalid_action: AtomicU64::new(0),
            dispatch_invalid_argument: AtomicU64::new(0),
            occupancy_entries: AtomicU64::new(0),
            occupancy_exits: AtomicU64::new(0),
            sensor_timeouts: AtomicU64::new(0),
            temperature_reads: AtomicU64::new(0),
            ir_transmissions: AtomicU64::new(0),
            ir_failures: AtomicU64::new(0),
            notices_published: AtomicU64::new(0),
            notices_dropped: AtomicU64::new(0),
        }
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self, result: ActionResult) {
        let counter = match result {
            ActionResult::Success => &self.dispatch_success,
            ActionResult::InvalidAction => &self.dispatch_invalid_action,
            ActionResult::InvalidArgument => &self.dispatch_invalid_argument,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delta(&self, delta: OccupancyDelta) {
        match delta {
            OccupancyDelta::Entered => {
                self.occupancy_entries.fetch_add(1, Ordering::Relaxed);
            }
            OccupancyDelta::Exited => {
                self.occupancy_exits.fetch_add(1, Ordering::Relaxed);
            }
            OccupancyDelta::None => {}
        }
    }

    pub fn record_sensor_timeout(&self) {
        self.sensor_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_temperature_read(&self) {
        self.temperature_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ir_transmission(&self) {
        self.ir_transmissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ir_failure(&self) {
        self.ir_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notice_published(&self) {
        self.notices_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notice_dropped(&self) {
        self.notices_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters for reporting. Counters are cumulative, not
    /// reset on read.
    pub fn report(&self) -> MetricsSummary {
        let uptime_secs = self.started.elapsed().as_secs();
        let ticks = self.ticks.load(Ordering::Relaxed);
        MetricsSummary {
            uptime_secs,
            ticks,
            ticks_per_sec: if uptime_secs > 0 { ticks as f64 / uptime_secs as f64 } else { 0.0 },
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            dispatch_success: self.dispatch_success.load(Ordering::Relaxed),
            dispatch_invalid_action: self.dispatch_invalid_action.load(Ordering::Relaxed),
            dispatch_invalid_argument: self.dispatch_invalid_argument.load(Ordering::Relaxed),
            occupancy_entries: self.occupancy_entries.load(Ordering::Relaxed),
            occupancy_exits: self.occupancy_exits.load(Ordering::Relaxed),
            sensor_timeouts: self.sensor_timeouts.load(Ordering::Relaxed),
            temperature_reads: self.temperature_reads.load(Ordering::Relaxed),
            ir_transmissions: self.ir_transmissions.load(Ordering::Relaxed),
            ir_failures: self.ir_failures.load(Ordering::Relaxed),
            notices_published: self.notices_published.load(Ordering::Relaxed),
            notices_dropped: self.notices_dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of all counters.
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub uptime_secs: u64,
    pub ticks: u64,
    pub ticks_per_sec: f64,
    pub messages_received: u64,
    pub messages_dropped: u64,
    pub dispatch_success: u64,
    pub dispatch_invalid_action: u64,
    pub dispatch_invalid_argument: u64,
    pub occupancy_entries: u64,
    pub occupancy_exits: u64,
    pub sensor_timeouts: u64,
    pub temperature_reads: u64,
    pub ir_transmissions: u64,
    pub ir_failures: u64,
    pub notices_published: u64,
    pub notices_dropped: u64,
}

impl MetricsSummary {
    /// Emit the summary as one structured log line.
    pub fn log(&self) {
        info!(
            uptime_secs = %self.uptime_secs,
            ticks = %self.ticks,
            ticks_per_sec = self.ticks_per_sec,
            messages_received = %self.messages_received,
            messages_dropped = %self.messages_dropped,
            dispatch_success = %self.dispatch_success,
            dispatch_invalid_action = %self.dispatch_invalid_action,
            dispatch_invalid_argument = %self.dispatch_invalid_argument,
            occupancy_entries = %self.occupancy_entries,
            occupancy_exits = %self.occupancy_exits,
            sensor_timeouts = %self.sensor_timeouts,
            ir_transmissions = %self.ir_transmissions,
            ir_failures = %self.ir_failures,
            notices_published = %self.notices_published,
            notices_dropped = %self.notices_dropped,
            "metrics_summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_counters() {
        let metrics = Metrics::new();
        metrics.record_dispatch(ActionResult::Success);
        metrics.record_dispatch(ActionResult::Success);
        metrics.record_dispatch(ActionResult::InvalidAction);
        metrics.record_dispatch(ActionResult::InvalidArgument);

        let summary = metrics.report();
        assert_eq!(summary.dispatch_success, 2);
        assert_eq!(summary.dispatch_invalid_action, 1);
        assert_eq!(summary.dispatch_invalid_argument, 1);
    }

    #[test]
    fn test_delta_counters() {
        let metrics = Metrics::new();
        metrics.record_delta(OccupancyDelta::Entered);
        metrics.record_delta(OccupancyDelta::None);
        metrics.record_delta(OccupancyDelta::Exited);
        metrics.record_delta(OccupancyDelta::Entered);

        let summary = metrics.report();
        assert_eq!(summary.occupancy_entries, 2);
        assert_eq!(summary.occupancy_exits, 1);
    }
}
