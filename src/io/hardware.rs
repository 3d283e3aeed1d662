//! Hardware ports: doorway range sensors, temperature sensor, IR emitter
//!
//! The control loop talks to hardware exclusively through these traits so
//! the occupancy engine and dispatcher are testable with synthetic inputs.
//! GPIO-backed implementations live with the deployment target; this crate
//! ships simulated implementations used for development and by the default
//! wiring in `main`.

use crate::domain::ir::PulseTable;
use crate::domain::types::DistanceSample;
use async_trait::async_trait;
use tracing::debug;

/// One ultrasonic range sensor at the doorway.
///
/// Implementations trigger a pulse and time the echo, converting round-trip
/// time to centimeters. The echo wait must be bounded; an expired wait
/// returns `DistanceSample::NoEcho`, never blocks the tick.
#[async_trait]
pub trait DistanceSensor: Send {
    async fn measure(&mut self) -> DistanceSample;
}

/// Ambient temperature sensor.
#[async_trait]
pub trait TemperatureSensor: Send {
    async fn read(&mut self) -> anyhow::Result<f64>;
}

/// IR emitter: transmits a precomputed pulse table at the fixed carrier.
/// Fire-and-forget from the caller's perspective.
pub trait IrTransmitter: Send {
    fn transmit(&mut self, table: &PulseTable) -> anyhow::Result<()>;
}

/// Simulated doorway sensor reporting a fixed idle distance.
pub struct SimDistanceSensor {
    distance_cm: f64,
}

impl SimDistanceSensor {
    pub fn new(distance_cm: f64) -> Self {
        Self { distance_cm }
    }
}

#[async_trait]
impl DistanceSensor for SimDistanceSensor {
    async fn measure(&mut self) -> DistanceSample {
        DistanceSample::Range(self.distance_cm)
    }
}

/// Simulated temperature sensor reporting a fixed reading.
pub struct SimTemperatureSensor {
    temperature_c: f64,
}

impl SimTemperatureSensor {
    pub fn new(temperature_c: f64) -> Self {
        Self { temperature_c }
    }
}

#[async_trait]
impl TemperatureSensor for SimTemperatureSensor {
    async fn read(&mut self) -> anyhow::Result<f64> {
        Ok(self.temperature_c)
    }
}

/// Simulated IR emitter; logs what would have been transmitted.
pub struct SimIrTransmitter;

impl IrTransmitter for SimIrTransmitter {
    fn transmit(&mut self, table: &PulseTable) -> anyhow::Result<()> {
        debug!(pulses = %table.len(), "sim_ir_transmit");
        Ok(())
    }
}

#[cfg(test)]
pub mod mock {
    //! Scriptable hardware for dispatcher and controller tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Distance sensor replaying a scripted sequence of samples, then the
    /// fallback reading forever.
    pub struct ScriptedDistanceSensor {
        samples: VecDeque<DistanceSample>,
        fallback: DistanceSample,
    }

    impl ScriptedDistanceSensor {
        pub fn new(samples: Vec<DistanceSample>, fallback: DistanceSample) -> Self {
            Self { samples: samples.into(), fallback }
        }
    }

    #[async_trait]
    impl DistanceSensor for ScriptedDistanceSensor {
        async fn measure(&mut self) -> DistanceSample {
            self.samples.pop_front().unwrap_or(self.fallback)
        }
    }

    /// Temperature sensor returning a fixed value or a scripted failure.
    pub struct FixedTemperatureSensor {
        reading: Option<f64>,
    }

    impl FixedTemperatureSensor {
        pub fn new(reading: f64) -> Self {
            Self { reading: Some(reading) }
        }

        pub fn failing() -> Self {
            Self { reading: None }
        }
    }

    #[async_trait]
    impl TemperatureSensor for FixedTemperatureSensor {
        async fn read(&mut self) -> anyhow::Result<f64> {
            self.reading.ok_or_else(|| anyhow::anyhow!("sensor read timed out"))
        }
    }

    /// IR transmitter recording every table handed to it.
    #[derive(Clone, Default)]
    pub struct RecordingIrTransmitter {
        pub sent: Arc<Mutex<Vec<PulseTable>>>,
    }

    impl RecordingIrTransmitter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn transmission_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl IrTransmitter for RecordingIrTransmitter {
        fn transmit(&mut self, table: &PulseTable) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(table.clone());
            Ok(())
        }
    }
}
