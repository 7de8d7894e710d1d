use axum::extract::{Path, State};
use axum::Json;
use orchestrator::SelectTitleOutcome;
use scribe_core::{SelectTitleRequest, Title};
use uuid::Uuid;

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/projects/{id}/titles",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Title candidates", body = Vec<Title>),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "titles"
)]
pub async fn list_titles(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Title>>, AppError> {
    Ok(Json(state.service.list_titles(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/projects/{id}/generate-titles",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Freshly generated candidates", body = Vec<Title>),
        (status = 404, description = "Project not found", body = ErrorResponse),
        (status = 409, description = "Not accepted in the current status", body = ErrorResponse)
    ),
    tag = "titles"
)]
pub async fn generate_titles(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Title>>, AppError> {
    Ok(Json(state.service.generate_titles(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/projects/{id}/select-title",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = SelectTitleRequest,
    responses(
        (status = 200, description = "Title selected", body = SelectTitleOutcome),
        (status = 404, description = "Project or title not found", body = ErrorResponse),
        (status = 409, description = "Not accepted in the current status", body = ErrorResponse)
    ),
    tag = "titles"
)]
pub async fn select_title(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SelectTitleRequest>,
) -> Result<Json<SelectTitleOutcome>, AppError> {
    Ok(Json(state.service.select_title(id, payload).await?))
}
