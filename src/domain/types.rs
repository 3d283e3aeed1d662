//! Shared types for the AC room node

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One ultrasonic range measurement, in centimeters.
///
/// `NoEcho` means the echo wait exceeded the sensor timeout; the doorway is
/// treated as clear (far) in that case rather than triggered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceSample {
    Range(f64),
    NoEcho,
}

impl DistanceSample {
    /// Whether this reading counts as a trigger against the given threshold.
    ///
    /// A sensor is triggered when something sits closer than the baseline
    /// minus the configured margin. A missing echo never triggers.
    pub fn triggered(&self, threshold_cm: f64) -> bool {
        match self {
            DistanceSample::Range(cm) => *cm < threshold_cm,
            DistanceSample::NoEcho => false,
        }
    }
}

/// Doorway sensor-pair state for one tick.
///
/// Exactly one symbol per tick, derived purely from the two distance samples
/// and the trigger threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    Neither,
    Inner,
    Outer,
    Both,
}

impl SensorState {
    /// Classify a tick from the inner/outer samples.
    pub fn classify(inner: DistanceSample, outer: DistanceSample, threshold_cm: f64) -> Self {
        match (inner.triggered(threshold_cm), outer.triggered(threshold_cm)) {
            (false, false) => SensorState::Neither,
            (true, false) => SensorState::Inner,
            (false, true) => SensorState::Outer,
            (true, true) => SensorState::Both,
        }
    }

    /// Single-character form used when logging a state sequence.
    pub fn glyph(&self) -> char {
        match self {
            SensorState::Neither => 'N',
            SensorState::Inner => 'I',
            SensorState::Outer => 'O',
            SensorState::Both => 'B',
        }
    }
}

/// Signed occupancy change inferred from one completed doorway event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyDelta {
    /// No completed event, or the window was discarded as noise.
    None,
    /// Someone entered the room (+1).
    Entered,
    /// Someone left the room (-1).
    Exited,
}

impl OccupancyDelta {
    pub fn as_i32(&self) -> i32 {
        match self {
            OccupancyDelta::None => 0,
            OccupancyDelta::Entered => 1,
            OccupancyDelta::Exited => -1,
        }
    }
}

/// Room occupancy count pair, owned by the control loop.
///
/// The occupancy engine only ever reports deltas; this is where they are
/// applied. Applying a delta clamps at zero so a missed entry can never
/// drive the count negative.
#[derive(Debug, Clone, Copy, Default)]
pub struct OccupancyCount {
    current: u32,
    previous: u32,
}

impl OccupancyCount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a delta, remembering the prior count. Clamps at zero.
    pub fn apply(&mut self, delta: OccupancyDelta) {
        self.previous = self.current;
        self.current = self.current.saturating_add_signed(delta.as_i32());
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn previous(&self) -> u32 {
        self.previous
    }
}

/// One inbound MQTT message as handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: String,
}

/// Outcome of dispatching one inbound message.
///
/// Never escalated; every outcome is reported outward via a log notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionResult {
    Success,
    InvalidAction,
    InvalidArgument,
}

impl ActionResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionResult::Success => "success",
            ActionResult::InvalidAction => "invalid_action",
            ActionResult::InvalidArgument => "invalid_argument",
        }
    }
}

/// Topic category: the second-to-last `/`-segment of an inbound topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicCategory {
    Command,
    Request,
    Other(String),
}

/// Parsed inbound topic: `{..}/{category}/{action}`.
///
/// Parsing fails closed: a topic with fewer than two segments yields `None`
/// and the dispatcher reports InvalidAction. No substring indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRoute {
    pub category: TopicCategory,
    pub action: String,
}

impl TopicRoute {
    pub fn parse(topic: &str) -> Option<Self> {
        let mut segments = topic.split('/').rev();
        let action = segments.next()?;
        let category = segments.next()?;
        if action.is_empty() || category.is_empty() {
            return None;
        }
        let category = match category {
            "command" => TopicCategory::Command,
            "request" => TopicCategory::Request,
            other => TopicCategory::Other(other.to_string()),
        };
        Some(Self { category, action: action.to_string() })
    }
}

/// AC power state argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerState::On => "on",
            PowerState::Off => "off",
        }
    }
}

impl FromStr for PowerState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(PowerState::On),
            "off" => Ok(PowerState::Off),
            _ => Err(()),
        }
    }
}

/// AC operating mode argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcMode {
    Cooling,
    Super,
    Quiet,
}

impl AcMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcMode::Cooling => "cooling",
            AcMode::Super => "super",
            AcMode::Quiet => "quiet",
        }
    }
}

impl FromStr for AcMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cooling" => Ok(AcMode::Cooling),
            "super" => Ok(AcMode::Super),
            "quiet" => Ok(AcMode::Quiet),
            _ => Err(()),
        }
    }
}
