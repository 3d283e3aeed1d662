//! Doorway occupancy-direction inference
//!
//! Converts the two ultrasonic distance streams into signed occupancy deltas.
//! Each tick is thresholded into one of {Neither, Inner, Outer, Both}; the
//! engine accumulates symbols for one event window and classifies the window
//! when the doorway returns to Neither.
//!
//! Key behaviors:
//! - A window opens on the first non-Neither symbol and closes on the next
//!   Neither; idle ticks never grow state
//! - Direction is decided by first-occurrence order of Inner vs Outer, which
//!   is stable against arbitrarily long oscillation between adjacent symbols
//! - Windows that never trigger both sensors are discarded as noise
//! - The engine always resets to its initial state after a classification,
//!   whatever the outcome

use crate::domain::types::{DistanceSample, OccupancyDelta, SensorState};
use smallvec::SmallVec;
use tracing::{debug, trace};

/// State sequence for one event window. Traversals are short; oscillating
/// windows spill to the heap without penalty to the common case.
type StateSequence = SmallVec<[SensorState; 16]>;

/// Engine lifecycle: idle between events, accumulating within one.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EngineState {
    Idle,
    InProgress(StateSequence),
}

/// Stateful occupancy-direction engine.
///
/// `observe` is the sole mutator; one call per tick with both fresh distance
/// samples. The engine never tracks a running total, only per-event deltas,
/// so it is restartable at any point.
pub struct OccupancyEngine {
    threshold_cm: f64,
    state: EngineState,
}

impl OccupancyEngine {
    /// Create an engine triggering below `baseline_cm - margin_cm`.
    pub fn new(baseline_cm: f64, margin_cm: f64) -> Self {
        Self { threshold_cm: baseline_cm - margin_cm, state: EngineState::Idle }
    }

    /// Feed one tick of sensor readings; returns the occupancy delta if this
    /// tick completed a classifiable event window.
    pub fn observe(&mut self, inner: DistanceSample, outer: DistanceSample) -> OccupancyDelta {
        let symbol = SensorState::classify(inner, outer, self.threshold_cm);

        match &mut self.state {
            EngineState::Idle => {
                if symbol == SensorState::Neither {
                    // Idle doorway; nothing to record.
                    return OccupancyDelta::None;
                }
                let mut sequence = StateSequence::new();
                sequence.push(symbol);
                trace!(symbol = %symbol.glyph(), "window_opened");
                self.state = EngineState::InProgress(sequence);
                OccupancyDelta::None
            }
            EngineState::InProgress(sequence) => {
                sequence.push(symbol);
                if symbol != SensorState::Neither {
                    return OccupancyDelta::None;
                }
                // Returned to Neither: the window is complete.
                let delta = classify_window(sequence);
                debug!(
                    sequence = %render_sequence(sequence),
                    delta = %delta.as_i32(),
                    "window_classified"
                );
                self.state = EngineState::Idle;
                delta
            }
        }
    }

    /// True when no event window is in progress.
    pub fn is_idle(&self) -> bool {
        self.state == EngineState::Idle
    }
}

/// Classify a completed window by first-occurrence order of Inner and Outer.
///
/// `Both` counts as an occurrence of neither: a window that oscillates
/// through Both without ever showing one sensor alone cannot be directed.
fn classify_window(sequence: &StateSequence) -> OccupancyDelta {
    let first_inner = sequence.iter().position(|s| *s == SensorState::Inner);
    let first_outer = sequence.iter().position(|s| *s == SensorState::Outer);

    match (first_inner, first_outer) {
        (Some(inner), Some(outer)) => {
            if inner < outer {
                OccupancyDelta::Entered
            } else {
                OccupancyDelta::Exited
            }
        }
        // Only one side (or neither) ever triggered alone: noise.
        _ => OccupancyDelta::None,
    }
}

fn render_sequence(sequence: &StateSequence) -> String {
    sequence.iter().map(SensorState::glyph).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASELINE: f64 = 150.0;
    const MARGIN: f64 = 30.0;

    fn engine() -> OccupancyEngine {
        OccupancyEngine::new(BASELINE, MARGIN)
    }

    /// Feed a symbol stream as raw distances; inner/outer triggered readings
    /// are well below the threshold, untriggered well above.
    fn feed(engine: &mut OccupancyEngine, symbols: &[SensorState]) -> Vec<OccupancyDelta> {
        let near = DistanceSample::Range(60.0);
        let far = DistanceSample::Range(BASELINE);
        symbols
            .iter()
            .map(|s| {
                let (inner, outer) = match s {
                    SensorState::Neither => (far, far),
                    SensorState::Inner => (near, far),
                    SensorState::Outer => (far, near),
                    SensorState::Both => (near, near),
                };
                engine.observe(inner, outer)
            })
            .collect()
    }

    use SensorState::{Both as B, Inner as I, Neither as N, Outer as O};

    #[test]
    fn test_idle_ticks_produce_nothing() {
        let mut engine = engine();
        for _ in 0..100 {
            let delta =
                engine.observe(DistanceSample::Range(200.0), DistanceSample::Range(145.0));
            assert_eq!(delta, OccupancyDelta::None);
        }
        assert!(engine.is_idle());
    }

    #[test]
    fn test_threshold_is_baseline_minus_margin() {
        let mut engine = engine();
        // 121 cm is above the 120 cm threshold: still idle
        engine.observe(DistanceSample::Range(121.0), DistanceSample::Range(200.0));
        assert!(engine.is_idle());
        // 119 cm is below: a window opens
        engine.observe(DistanceSample::Range(119.0), DistanceSample::Range(200.0));
        assert!(!engine.is_idle());
    }

    #[test]
    fn test_exit_outer_first() {
        let mut engine = engine();
        let deltas = feed(&mut engine, &[N, O, B, O, B, I, B, I, N]);
        let (last, prior) = deltas.split_last().unwrap();
        assert!(prior.iter().all(|d| *d == OccupancyDelta::None));
        assert_eq!(*last, OccupancyDelta::Exited);
        assert!(engine.is_idle());
    }

    #[test]
    fn test_entry_inner_first() {
        let mut engine = engine();
        let deltas = feed(&mut engine, &[N, I, B, I, B, O, B, O, N]);
        let (last, prior) = deltas.split_last().unwrap();
        assert!(prior.iter().all(|d| *d == OccupancyDelta::None));
        assert_eq!(*last, OccupancyDelta::Entered);
        assert!(engine.is_idle());
    }

    #[test]
    fn test_one_sided_window_is_noise() {
        let mut engine = engine();
        let deltas = feed(&mut engine, &[N, I, B, I, N]);
        assert!(deltas.iter().all(|d| *d == OccupancyDelta::None));
        assert!(engine.is_idle());
    }

    #[test]
    fn test_both_only_window_is_noise() {
        let mut engine = engine();
        let deltas = feed(&mut engine, &[B, B, N]);
        assert!(deltas.iter().all(|d| *d == OccupancyDelta::None));
        assert!(engine.is_idle());
    }

    #[test]
    fn test_long_oscillation_keeps_first_occurrence_order() {
        let mut engine = engine();
        // Outer triggers first, then a long noisy oscillation before settling
        let mut symbols = vec![O];
        for _ in 0..200 {
            symbols.extend_from_slice(&[B, I, B, O]);
        }
        symbols.push(N);
        let deltas = feed(&mut engine, &symbols);
        assert_eq!(*deltas.last().unwrap(), OccupancyDelta::Exited);
        assert_eq!(
            deltas.iter().filter(|d| **d != OccupancyDelta::None).count(),
            1,
            "exactly one delta per window"
        );
    }

    #[test]
    fn test_engine_resets_after_every_classification() {
        let mut engine = engine();

        feed(&mut engine, &[I, O, N]);
        assert!(engine.is_idle());

        feed(&mut engine, &[I, I, N]); // discarded as noise
        assert!(engine.is_idle());

        // A fresh event right after a discard classifies normally
        let deltas = feed(&mut engine, &[O, I, N]);
        assert_eq!(*deltas.last().unwrap(), OccupancyDelta::Exited);
        assert!(engine.is_idle());
    }

    #[test]
    fn test_back_to_back_events() {
        let mut engine = engine();
        let first = feed(&mut engine, &[I, B, O, N]);
        assert_eq!(*first.last().unwrap(), OccupancyDelta::Entered);
        let second = feed(&mut engine, &[O, B, I, N]);
        assert_eq!(*second.last().unwrap(), OccupancyDelta::Exited);
    }

    #[test]
    fn test_no_echo_never_opens_a_window() {
        let mut engine = engine();
        for _ in 0..10 {
            let delta = engine.observe(DistanceSample::NoEcho, DistanceSample::NoEcho);
            assert_eq!(delta, OccupancyDelta::None);
        }
        assert!(engine.is_idle());
    }

    #[test]
    fn test_no_echo_mid_window_reads_as_neither() {
        let mut engine = engine();
        let near = DistanceSample::Range(60.0);
        let far = DistanceSample::Range(BASELINE);

        // Inner then outer, then both sensors time out: window closes
        assert_eq!(engine.observe(near, far), OccupancyDelta::None);
        assert_eq!(engine.observe(far, near), OccupancyDelta::None);
        let delta = engine.observe(DistanceSample::NoEcho, DistanceSample::NoEcho);
        assert_eq!(delta, OccupancyDelta::Entered);
        assert!(engine.is_idle());
    }
}
