//! Alert delivery
//!
//! - `AlertSink` capability injected into agents and runners
//! - `AlertManager` for logging, local broadcast and rate-limited webhooks

pub mod alert_manager;
pub mod sink;

pub use alert_manager::{format_message, AlertManager, AlertManagerConfig};
pub use sink::{AlertEvent, AlertSink, MemorySink};
