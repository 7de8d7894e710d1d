use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use db::ProjectLog;
use orchestrator::ExecutionStatus;
use scribe_core::{LogEntry, ResearchSource};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

const DEFAULT_LOG_LIMIT: u32 = 100;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct RunResponse {
    pub run_id: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LogsQuery {
    /// Newest entries to return, oldest first (max 1000)
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct LogResponse {
    pub id: i64,
    /// `None` for checkpoint entries written outside a run
    pub run_id: Option<Uuid>,
    pub entry: LogEntry,
}

impl From<ProjectLog> for LogResponse {
    fn from(log: ProjectLog) -> Self {
        Self {
            id: log.id,
            run_id: log.run_id,
            entry: log.entry,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/projects/{id}/run",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 202, description = "Pipeline started", body = RunResponse),
        (status = 404, description = "Project not found", body = ErrorResponse),
        (status = 409, description = "Already running or not accepted in the current status", body = ErrorResponse)
    ),
    tag = "execution"
)]
pub async fn run_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<RunResponse>), AppError> {
    let run_id = state.service.run(id).await?;
    Ok((StatusCode::ACCEPTED, Json(RunResponse { run_id })))
}

#[utoipa::path(
    post,
    path = "/api/projects/{id}/restart",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 202, description = "Pipeline restarted from research", body = RunResponse),
        (status = 404, description = "Project not found", body = ErrorResponse),
        (status = 409, description = "Not accepted in the current status", body = ErrorResponse)
    ),
    tag = "execution"
)]
pub async fn restart_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<RunResponse>), AppError> {
    let run_id = state.service.restart(id).await?;
    Ok((StatusCode::ACCEPTED, Json(RunResponse { run_id })))
}

#[utoipa::path(
    get,
    path = "/api/projects/{id}/status",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Execution status", body = ExecutionStatus),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "execution"
)]
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExecutionStatus>, AppError> {
    Ok(Json(state.service.status(id).await?))
}

#[utoipa::path(
    get,
    path = "/api/projects/{id}/logs",
    params(("id" = Uuid, Path, description = "Project ID"), LogsQuery),
    responses(
        (status = 200, description = "Durable execution log", body = Vec<LogResponse>),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "execution"
)]
pub async fn get_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<LogResponse>>, AppError> {
    let logs = state
        .service
        .logs(id, query.limit.unwrap_or(DEFAULT_LOG_LIMIT))
        .await?;
    Ok(Json(logs.into_iter().map(LogResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/projects/{id}/sources",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Research sources of the current run", body = Vec<ResearchSource>),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "execution"
)]
pub async fn list_sources(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ResearchSource>>, AppError> {
    Ok(Json(state.service.sources(id).await?))
}
