use serde::{Deserialize, Serialize};

use events::{EventEnvelope, ExecutionRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    /// Ask for a fresh snapshot, e.g. after `lagged`
    Snapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Folded state of the latest run; `None` before the first run
    Snapshot { record: Option<ExecutionRecord> },
    Event { envelope: EventEnvelope },
    Heartbeat,
    Pong,
    /// The connection fell behind and `missed` events were dropped
    Lagged { missed: u64 },
    Error { message: String },
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
