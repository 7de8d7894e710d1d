use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator::OrchestratorError;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
    Orchestrator(OrchestratorError),
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
            AppError::Orchestrator(err) => match err {
                OrchestratorError::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, "invalid_transition", err.to_string())
                }
                OrchestratorError::AlreadyRunning(_) => {
                    (StatusCode::CONFLICT, "already_running", err.to_string())
                }
                OrchestratorError::ProjectNotFound(_)
                | OrchestratorError::TitleNotFound(_)
                | OrchestratorError::PlanNotFound(_)
                | OrchestratorError::DraftNotFound(_) => {
                    (StatusCode::NOT_FOUND, "not_found", err.to_string())
                }
                OrchestratorError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "validation_error", msg)
                }
                OrchestratorError::Database(ref db_err) => {
                    tracing::error!(error = ?db_err, "Database error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "database_error",
                        "Database error occurred".to_string(),
                    )
                }
                OrchestratorError::StageFailure { .. }
                | OrchestratorError::PipelineExhausted { .. } => {
                    tracing::error!(error = %err, "Stage error");
                    (StatusCode::INTERNAL_SERVER_ERROR, "stage_failure", err.to_string())
                }
            },
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        AppError::Orchestrator(err)
    }
}

impl From<db::DbError> for AppError {
    fn from(err: db::DbError) -> Self {
        AppError::Orchestrator(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator::Command;
    use scribe_core::ProjectStatus;
    use uuid::Uuid;

    fn status_of(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_orchestrator_error_status_codes() {
        assert_eq!(
            status_of(OrchestratorError::invalid(Command::Run, ProjectStatus::Created)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(OrchestratorError::AlreadyRunning(Uuid::new_v4())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(OrchestratorError::ProjectNotFound(Uuid::new_v4())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(OrchestratorError::validation("bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(OrchestratorError::stage_failed("Research", 1, "boom")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_db_not_found_maps_to_404() {
        assert_eq!(
            status_of(db::DbError::DraftNotFound(Uuid::new_v4())),
            StatusCode::NOT_FOUND
        );
    }
}
