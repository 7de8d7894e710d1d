//! Execution record folded from a project's published events

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use scribe_core::{LogEntry, ProjectStatus};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::types::{Event, EventEnvelope};

/// Log entries kept in memory per run
pub const DEFAULT_LOG_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// In-memory state of the latest pipeline run of a project.
///
/// It is only ever changed by [`ExecutionRecord::apply`], so a snapshot is
/// always the fold of the events subscribers have seen.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ExecutionRecord {
    pub project_id: Uuid,
    pub run_id: Uuid,
    pub run_state: RunState,
    pub status: ProjectStatus,
    pub current_agent: Option<String>,
    pub progress_percent: u8,
    pub logs: Vec<LogEntry>,
    pub sources_discovered: u32,
    pub draft_version: Option<u32>,
    pub confidence_scores: BTreeMap<String, f64>,
    pub overall_score: Option<f64>,
    pub error: Option<String>,
    pub is_complete: bool,
    pub last_sequence: u64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn new(project_id: Uuid, run_id: Uuid, status: ProjectStatus) -> Self {
        let now = Utc::now();
        Self {
            project_id,
            run_id,
            run_state: RunState::Running,
            status,
            current_agent: None,
            progress_percent: 0,
            logs: Vec::new(),
            sources_discovered: 0,
            draft_version: None,
            confidence_scores: BTreeMap::new(),
            overall_score: None,
            error: None,
            is_complete: false,
            last_sequence: 0,
            started_at: now,
            updated_at: now,
        }
    }

    /// Fold one event. Events that name another run are ignored, so a late
    /// report from a cancelled run cannot leak into its successor.
    pub fn apply(&mut self, envelope: &EventEnvelope, log_limit: usize) {
        if envelope.event.run_id().is_some_and(|run_id| run_id != self.run_id) {
            return;
        }
        match &envelope.event {
            Event::Heartbeat => return,
            Event::ExecutionStarted { .. } => {
                self.run_state = RunState::Running;
            }
            Event::StatusChanged { to, .. } => {
                self.status = *to;
            }
            Event::StageStarted { stage, .. } => {
                self.current_agent = Some(stage.clone());
            }
            Event::AgentLog { entry } => {
                self.logs.push(entry.clone());
                if self.logs.len() > log_limit {
                    let excess = self.logs.len() - log_limit;
                    self.logs.drain(..excess);
                }
            }
            Event::Progress { percent, .. } => {
                // never moves backwards within a run
                self.progress_percent = self.progress_percent.max((*percent).min(100));
            }
            Event::SourceDiscovered { .. } => {
                self.sources_discovered += 1;
            }
            Event::DraftUpdated { version, .. } => {
                self.draft_version = Some(*version);
            }
            Event::ScoresUpdated {
                scores,
                overall_score,
            } => {
                self.confidence_scores = scores.clone();
                self.overall_score = Some(*overall_score);
            }
            Event::ExecutionCompleted { .. } => {
                self.run_state = RunState::Completed;
                self.progress_percent = 100;
                self.current_agent = None;
                self.is_complete = true;
            }
            Event::ExecutionFailed { error, .. } => {
                self.run_state = RunState::Failed;
                self.error = Some(error.clone());
                self.is_complete = true;
            }
            Event::ExecutionCancelled { .. } => {
                self.run_state = RunState::Cancelled;
                self.is_complete = true;
            }
        }
        self.last_sequence = envelope.sequence;
        self.updated_at = envelope.timestamp;
    }
}
