pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Scribe Studio API",
        version = "0.1.0",
        description = "Content workflow orchestration: titles, plan, research, writing, editing and approval"
    ),
    paths(
        routes::health_check,
        routes::projects::create_project,
        routes::projects::list_projects,
        routes::projects::get_project,
        routes::projects::delete_project,
        routes::titles::list_titles,
        routes::titles::generate_titles,
        routes::titles::select_title,
        routes::plan::get_plan,
        routes::plan::update_plan,
        routes::plan::generate_plan,
        routes::plan::approve_plan,
        routes::execution::run_project,
        routes::execution::restart_project,
        routes::execution::get_status,
        routes::execution::get_logs,
        routes::execution::list_sources,
        routes::drafts::get_draft,
        routes::drafts::update_draft,
        routes::drafts::approve_draft,
        routes::drafts::export_draft,
        routes::sse::project_events,
    ),
    components(schemas(
        routes::HealthResponse,
        routes::execution::RunResponse,
        routes::execution::LogResponse,
        error::ErrorResponse,
        scribe_core::Project,
        scribe_core::ProjectStatus,
        scribe_core::ProjectGoal,
        scribe_core::ContentTone,
        scribe_core::ExpertiseLevel,
        scribe_core::CreateProjectRequest,
        scribe_core::Title,
        scribe_core::SearchIntent,
        scribe_core::SelectTitleRequest,
        scribe_core::Plan,
        scribe_core::PlanSection,
        scribe_core::PlanSectionInput,
        scribe_core::UpdatePlanRequest,
        scribe_core::ResearchSource,
        scribe_core::Draft,
        scribe_core::FaqEntry,
        scribe_core::QualityAssessment,
        scribe_core::UpdateDraftRequest,
        scribe_core::ExportFormat,
        scribe_core::ExportRequest,
        scribe_core::ExportMetadata,
        scribe_core::ExportResponse,
        scribe_core::LogEntry,
        scribe_core::LogLevel,
        orchestrator::ExecutionStatus,
        orchestrator::ProjectPage,
        orchestrator::ApprovePlanOutcome,
        orchestrator::SelectTitleOutcome,
        events::RunState,
        events::ExecutionRecord,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "projects", description = "Project management endpoints"),
        (name = "titles", description = "Title generation and selection"),
        (name = "plan", description = "Content plan endpoints"),
        (name = "execution", description = "Pipeline execution and status"),
        (name = "drafts", description = "Draft review, approval and export"),
        (name = "events", description = "Real-time event streaming (SSE)"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .route("/health", get(routes::health_check))
        .route(
            "/api/projects",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/api/projects/{id}",
            get(routes::projects::get_project).delete(routes::projects::delete_project),
        )
        .route("/api/projects/{id}/titles", get(routes::titles::list_titles))
        .route(
            "/api/projects/{id}/generate-titles",
            post(routes::titles::generate_titles),
        )
        .route(
            "/api/projects/{id}/select-title",
            post(routes::titles::select_title),
        )
        .route(
            "/api/projects/{id}/plan",
            get(routes::plan::get_plan).put(routes::plan::update_plan),
        )
        .route(
            "/api/projects/{id}/generate-plan",
            post(routes::plan::generate_plan),
        )
        .route(
            "/api/projects/{id}/approve-plan",
            post(routes::plan::approve_plan),
        )
        .route("/api/projects/{id}/run", post(routes::execution::run_project))
        .route(
            "/api/projects/{id}/restart",
            post(routes::execution::restart_project),
        )
        .route("/api/projects/{id}/status", get(routes::execution::get_status))
        .route("/api/projects/{id}/logs", get(routes::execution::get_logs))
        .route(
            "/api/projects/{id}/sources",
            get(routes::execution::list_sources),
        )
        .route(
            "/api/projects/{id}/draft",
            get(routes::drafts::get_draft).put(routes::drafts::update_draft),
        )
        .route(
            "/api/projects/{id}/approve-draft",
            post(routes::drafts::approve_draft),
        )
        .route("/api/projects/{id}/export", post(routes::drafts::export_draft))
        .route("/api/projects/{id}/events", get(routes::sse::project_events))
        .route("/ws/{id}", get(routes::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
