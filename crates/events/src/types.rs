//! Event types for the Scribe Studio event system

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use scribe_core::{LogEntry, ProjectStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// Project the event belongs to
    pub project_id: Uuid,
    /// Per-project publish order. Heartbeats carry 0.
    pub sequence: u64,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: Event,
}

impl EventEnvelope {
    pub fn new(project_id: Uuid, sequence: u64, event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            sequence,
            timestamp: Utc::now(),
            event,
        }
    }

    /// Transport-level keepalive; never recorded.
    pub fn heartbeat(project_id: Uuid) -> Self {
        Self::new(project_id, 0, Event::Heartbeat)
    }
}

/// All possible events in the system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // Execution lifecycle
    /// A pipeline run was registered and spawned
    #[serde(rename = "execution.started")]
    ExecutionStarted { run_id: Uuid },

    /// The last stage finished and the draft is ready for review
    #[serde(rename = "execution.completed")]
    ExecutionCompleted { run_id: Uuid },

    /// A stage exhausted its attempts
    #[serde(rename = "execution.failed")]
    ExecutionFailed { run_id: Uuid, error: String },

    /// The run was cancelled before finishing
    #[serde(rename = "execution.cancelled")]
    ExecutionCancelled { run_id: Uuid },

    // Project state
    /// Project status changed through the state machine
    #[serde(rename = "status.changed")]
    StatusChanged {
        from: ProjectStatus,
        to: ProjectStatus,
    },

    // Stage activity
    /// An autonomous stage began an attempt
    #[serde(rename = "stage.started")]
    StageStarted { stage: String, attempt: u32 },

    /// A log line from a stage or the system
    #[serde(rename = "agent.log")]
    AgentLog { entry: LogEntry },

    /// Overall progress of a run, 0..=100
    #[serde(rename = "progress")]
    Progress {
        run_id: Uuid,
        percent: u8,
        stage: Option<String>,
    },

    /// The research stage stored a source
    #[serde(rename = "source.discovered")]
    SourceDiscovered {
        url: String,
        title: String,
        domain: String,
        credibility_score: f64,
    },

    /// A new draft version became current
    #[serde(rename = "draft.updated")]
    DraftUpdated {
        draft_id: Uuid,
        version: u32,
        word_count: u32,
    },

    /// Quality scores reported for the current draft
    #[serde(rename = "scores.updated")]
    ScoresUpdated {
        scores: BTreeMap<String, f64>,
        overall_score: f64,
    },

    /// Keepalive for idle connections
    #[serde(rename = "heartbeat")]
    Heartbeat,
}

impl Event {
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Self::Heartbeat)
    }

    /// Name used as the SSE `event:` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ExecutionStarted { .. } => "execution.started",
            Self::ExecutionCompleted { .. } => "execution.completed",
            Self::ExecutionFailed { .. } => "execution.failed",
            Self::ExecutionCancelled { .. } => "execution.cancelled",
            Self::StatusChanged { .. } => "status.changed",
            Self::StageStarted { .. } => "stage.started",
            Self::AgentLog { .. } => "agent.log",
            Self::Progress { .. } => "progress",
            Self::SourceDiscovered { .. } => "source.discovered",
            Self::DraftUpdated { .. } => "draft.updated",
            Self::ScoresUpdated { .. } => "scores.updated",
            Self::Heartbeat => "heartbeat",
        }
    }

    pub fn run_id(&self) -> Option<Uuid> {
        match self {
            Self::ExecutionStarted { run_id }
            | Self::ExecutionCompleted { run_id }
            | Self::ExecutionFailed { run_id, .. }
            | Self::ExecutionCancelled { run_id }
            | Self::Progress { run_id, .. } => Some(*run_id),
            _ => None,
        }
    }
}
