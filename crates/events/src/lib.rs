//! Event system for Scribe Studio
//!
//! Per-project event channels, replay history and the execution record
//! folded from published events.

mod bus;
mod record;
mod types;

pub use bus::{BusConfig, EventBus};
pub use record::{ExecutionRecord, RunState, DEFAULT_LOG_LIMIT};
pub use types::*;
