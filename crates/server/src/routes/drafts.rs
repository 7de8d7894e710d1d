use axum::extract::{Path, State};
use axum::Json;
use scribe_core::{Draft, ExportRequest, ExportResponse, UpdateDraftRequest};
use uuid::Uuid;

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/projects/{id}/draft",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Current draft", body = Draft),
        (status = 404, description = "Project or draft not found", body = ErrorResponse)
    ),
    tag = "drafts"
)]
pub async fn get_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Draft>, AppError> {
    Ok(Json(state.service.current_draft(id).await?))
}

#[utoipa::path(
    put,
    path = "/api/projects/{id}/draft",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = UpdateDraftRequest,
    responses(
        (status = 200, description = "Edited draft", body = Draft),
        (status = 400, description = "Empty update or draft not editable", body = ErrorResponse),
        (status = 404, description = "Project or draft not found", body = ErrorResponse)
    ),
    tag = "drafts"
)]
pub async fn update_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDraftRequest>,
) -> Result<Json<Draft>, AppError> {
    Ok(Json(state.service.update_draft(id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/projects/{id}/approve-draft",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Draft approved and project published", body = Draft),
        (status = 404, description = "Project or draft not found", body = ErrorResponse),
        (status = 409, description = "Not accepted in the current status", body = ErrorResponse)
    ),
    tag = "drafts"
)]
pub async fn approve_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Draft>, AppError> {
    Ok(Json(state.service.approve_draft(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/projects/{id}/export",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = ExportRequest,
    responses(
        (status = 200, description = "Rendered draft", body = ExportResponse),
        (status = 404, description = "Project or draft not found", body = ErrorResponse),
        (status = 409, description = "Not accepted in the current status", body = ErrorResponse)
    ),
    tag = "drafts"
)]
pub async fn export_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ExportRequest>,
) -> Result<Json<ExportResponse>, AppError> {
    Ok(Json(state.service.export(id, payload).await?))
}
