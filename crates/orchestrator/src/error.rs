use scribe_core::{CoreError, ProjectStatus};
use thiserror::Error;
use uuid::Uuid;

use crate::state_machine::Command;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Cannot {command} while project is {from}")]
    InvalidTransition { command: Command, from: ProjectStatus },

    #[error("Project {0} already has a running execution")]
    AlreadyRunning(Uuid),

    #[error("Project not found: {0}")]
    ProjectNotFound(Uuid),

    #[error("Title not found: {0}")]
    TitleNotFound(Uuid),

    #[error("Plan not found for project: {0}")]
    PlanNotFound(Uuid),

    #[error("Draft not found for project: {0}")]
    DraftNotFound(Uuid),

    #[error("{stage} attempt {attempt} failed: {reason}")]
    StageFailure {
        stage: String,
        attempt: u32,
        reason: String,
    },

    #[error("{stage} failed after {attempts} attempts")]
    PipelineExhausted { stage: String, attempts: u32 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(db::DbError),
}

impl OrchestratorError {
    pub fn invalid(command: Command, from: ProjectStatus) -> Self {
        Self::InvalidTransition { command, from }
    }

    /// Create a stage failure error.
    pub fn stage_failed(stage: impl Into<String>, attempt: u32, reason: impl Into<String>) -> Self {
        Self::StageFailure {
            stage: stage.into(),
            attempt,
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<db::DbError> for OrchestratorError {
    fn from(err: db::DbError) -> Self {
        match err {
            db::DbError::ProjectNotFound(id) => Self::ProjectNotFound(id),
            db::DbError::TitleNotFound(id) => Self::TitleNotFound(id),
            db::DbError::PlanNotFound(id) => Self::PlanNotFound(id),
            db::DbError::DraftNotFound(id) => Self::DraftNotFound(id),
            other => Self::Database(other),
        }
    }
}

impl From<CoreError> for OrchestratorError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProjectNotFound(id) => Self::ProjectNotFound(id),
            CoreError::UnknownStatus(s) => Self::Validation(format!("unknown status: {}", s)),
            CoreError::Validation(msg) => Self::Validation(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
