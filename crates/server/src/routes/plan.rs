use axum::extract::{Path, State};
use axum::Json;
use orchestrator::ApprovePlanOutcome;
use scribe_core::{Plan, UpdatePlanRequest};
use uuid::Uuid;

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/projects/{id}/plan",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Content plan", body = Plan),
        (status = 404, description = "Project or plan not found", body = ErrorResponse)
    ),
    tag = "plan"
)]
pub async fn get_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Plan>, AppError> {
    Ok(Json(state.service.get_plan(id).await?))
}

#[utoipa::path(
    put,
    path = "/api/projects/{id}/plan",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = UpdatePlanRequest,
    responses(
        (status = 200, description = "Updated plan", body = Plan),
        (status = 400, description = "Invalid sections or plan not editable", body = ErrorResponse),
        (status = 404, description = "Project or plan not found", body = ErrorResponse)
    ),
    tag = "plan"
)]
pub async fn update_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePlanRequest>,
) -> Result<Json<Plan>, AppError> {
    Ok(Json(state.service.update_plan(id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/projects/{id}/generate-plan",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Generated plan", body = Plan),
        (status = 404, description = "Project not found", body = ErrorResponse),
        (status = 409, description = "Not accepted in the current status", body = ErrorResponse)
    ),
    tag = "plan"
)]
pub async fn generate_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Plan>, AppError> {
    Ok(Json(state.service.generate_plan(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/projects/{id}/approve-plan",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Plan approved, pipeline possibly started", body = ApprovePlanOutcome),
        (status = 404, description = "Project or plan not found", body = ErrorResponse),
        (status = 409, description = "Not accepted in the current status", body = ErrorResponse)
    ),
    tag = "plan"
)]
pub async fn approve_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApprovePlanOutcome>, AppError> {
    Ok(Json(state.service.approve_plan(id).await?))
}
