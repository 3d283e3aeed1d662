//! Domain models - core types of the room node
//!
//! This module contains the canonical data types used throughout the system:
//! - `DistanceSample` / `SensorState` - per-tick doorway sensor readings
//! - `OccupancyDelta` / `OccupancyCount` - inferred occupancy changes
//! - `InboundMessage` / `TopicRoute` / `ActionResult` - command dispatch types
//! - `ir` - IR remote signal set and pulse-timing tables

pub mod ir;
pub mod types;

// Re-export commonly used types at module level
pub use types::{ActionResult, DistanceSample, InboundMessage, OccupancyDelta, SensorState};
