use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Project not found: {0}")]
    ProjectNotFound(Uuid),

    #[error("Title not found: {0}")]
    TitleNotFound(Uuid),

    #[error("Plan not found for project: {0}")]
    PlanNotFound(Uuid),

    #[error("Draft not found: {0}")]
    DraftNotFound(Uuid),
}
