//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `occupancy` - Doorway occupancy-direction inference engine
//! - `dispatcher` - Inbound command dispatch and validation
//! - `controller` - Per-tick control loop tying sensing and dispatch together

pub mod controller;
pub mod dispatcher;
pub mod occupancy;

// Re-export commonly used types
pub use controller::NodeController;
pub use dispatcher::Dispatcher;
pub use occupancy::OccupancyEngine;
