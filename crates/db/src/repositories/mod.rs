mod draft_repository;
mod plan_repository;
mod project_log_repository;
mod project_repository;
mod research_source_repository;
mod title_repository;

pub use draft_repository::*;
pub use plan_repository::*;
pub use project_log_repository::*;
pub use project_repository::*;
pub use research_source_repository::*;
pub use title_repository::*;

use sqlx::SqlitePool;

/// Every repository over one pool.
#[derive(Clone)]
pub struct Repositories {
    pub projects: ProjectRepository,
    pub titles: TitleRepository,
    pub plans: PlanRepository,
    pub drafts: DraftRepository,
    pub sources: ResearchSourceRepository,
    pub logs: ProjectLogRepository,
}

impl Repositories {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            projects: ProjectRepository::new(pool.clone()),
            titles: TitleRepository::new(pool.clone()),
            plans: PlanRepository::new(pool.clone()),
            drafts: DraftRepository::new(pool.clone()),
            sources: ResearchSourceRepository::new(pool.clone()),
            logs: ProjectLogRepository::new(pool),
        }
    }
}
