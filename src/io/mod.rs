//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `mqtt` - MQTT client for receiving coordinator commands and requests
//! - `notice` - Typed channel and MQTT publisher for outbound notices
//! - `notice_log` - Local journal of published notices
//! - `hardware` - Port traits for the doorway sensors, temperature sensor,
//!   and IR emitter, plus simulated implementations
//! - `prometheus` - Prometheus metrics HTTP endpoint

pub mod hardware;
pub mod mqtt;
pub mod notice;
pub mod notice_log;
pub mod prometheus;

// Re-export commonly used types
pub use hardware::{DistanceSensor, IrTransmitter, TemperatureSensor};
pub use notice::{create_notice_channel, Notice, NoticePublisher, NoticeSender, StatusPayload};
pub use notice_log::NoticeJournal;
