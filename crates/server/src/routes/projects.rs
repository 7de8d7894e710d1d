use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use orchestrator::ProjectPage;
use scribe_core::{CreateProjectRequest, Project};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

const DEFAULT_PER_PAGE: u32 = 20;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListProjectsQuery {
    /// Page number, starting at 1
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[utoipa::path(
    post,
    path = "/api/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "projects"
)]
pub async fn create_project(
    State(state): State<AppState>,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let project = state.service.create_project(payload).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/api/projects",
    params(ListProjectsQuery),
    responses(
        (status = 200, description = "Projects, newest first", body = ProjectPage)
    ),
    tag = "projects"
)]
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ListProjectsQuery>,
) -> Result<Json<ProjectPage>, AppError> {
    let page = state
        .service
        .list_projects(
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(DEFAULT_PER_PAGE),
        )
        .await?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/api/projects/{id}",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project", body = Project),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "projects"
)]
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    Ok(Json(state.service.get_project(id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/projects/{id}",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    tag = "projects"
)]
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.service.delete_project(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
