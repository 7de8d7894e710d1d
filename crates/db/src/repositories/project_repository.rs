use crate::error::DbError;
use crate::models::ProjectRow;
use chrono::Utc;
use scribe_core::{Project, ProjectStatus};
use sqlx::SqlitePool;
use uuid::Uuid;

const PROJECT_COLUMNS: &str = "id, topic, target_audience, goal, tone, expertise_level, \
     word_count_min, word_count_max, constraints, status, selected_title_id, created_at, updated_at";

#[derive(Clone)]
pub struct ProjectRepository {
    pool: SqlitePool,
}

impl ProjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, project: &Project) -> Result<Project, DbError> {
        let row = ProjectRow::from(project);

        sqlx::query(
            r#"
            INSERT INTO projects (id, topic, target_audience, goal, tone, expertise_level,
                word_count_min, word_count_max, constraints, status, selected_title_id,
                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.topic)
        .bind(&row.target_audience)
        .bind(&row.goal)
        .bind(&row.tone)
        .bind(&row.expertise_level)
        .bind(row.word_count_min)
        .bind(row.word_count_max)
        .bind(&row.constraints)
        .bind(&row.status)
        .bind(&row.selected_title_id)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(project.clone())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Project>, DbError> {
        let row: Option<ProjectRow> = sqlx::query_as(&format!(
            "SELECT {} FROM projects WHERE id = ?",
            PROJECT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_domain()))
    }

    /// Like `find_by_id`, but a missing project is an error.
    pub async fn get(&self, id: Uuid) -> Result<Project, DbError> {
        self.find_by_id(id)
            .await?
            .ok_or(DbError::ProjectNotFound(id))
    }

    pub async fn find_page(&self, limit: u32, offset: u64) -> Result<Vec<Project>, DbError> {
        let rows: Vec<ProjectRow> = sqlx::query_as(&format!(
            "SELECT {} FROM projects ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            PROJECT_COLUMNS
        ))
        .bind(limit as i64)
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    pub async fn count(&self) -> Result<i64, DbError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Writes `next` only if the stored status is still `expected`.
    ///
    /// Returns `false` when another writer got there first.
    pub async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: ProjectStatus,
        next: ProjectStatus,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE projects
            SET status = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(next.as_str())
        .bind(Utc::now().timestamp())
        .bind(id.to_string())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    async fn setup_test_db() -> SqlitePool {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_create_and_find_project() {
        let pool = setup_test_db().await;
        let repo = ProjectRepository::new(pool);

        let project = Project::new("Zero-copy parsing", "Systems programmers");
        repo.create(&project).await.unwrap();

        let found = repo.find_by_id(project.id).await.unwrap().unwrap();
        assert_eq!(found.topic, "Zero-copy parsing");
        assert_eq!(found.status, ProjectStatus::Created);
        assert_eq!(found.word_count_max, 3000);
    }

    #[tokio::test]
    async fn test_get_missing_project() {
        let pool = setup_test_db().await;
        let repo = ProjectRepository::new(pool);

        let result = repo.get(Uuid::new_v4()).await;
        assert!(matches!(result, Err(DbError::ProjectNotFound(_))));
    }

    #[tokio::test]
    async fn test_pagination() {
        let pool = setup_test_db().await;
        let repo = ProjectRepository::new(pool);

        for i in 0..5 {
            repo.create(&Project::new(format!("Topic number {}", i), "Readers"))
                .await
                .unwrap();
        }

        assert_eq!(repo.count().await.unwrap(), 5);
        assert_eq!(repo.find_page(2, 0).await.unwrap().len(), 2);
        assert_eq!(repo.find_page(2, 4).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_compare_and_set_status() {
        let pool = setup_test_db().await;
        let repo = ProjectRepository::new(pool);

        let project = Project::new("Compare and swap", "Readers");
        repo.create(&project).await.unwrap();

        let swapped = repo
            .compare_and_set_status(
                project.id,
                ProjectStatus::Created,
                ProjectStatus::TitlesGenerated,
            )
            .await
            .unwrap();
        assert!(swapped);

        let stale = repo
            .compare_and_set_status(
                project.id,
                ProjectStatus::Created,
                ProjectStatus::TitlesGenerated,
            )
            .await
            .unwrap();
        assert!(!stale);

        let found = repo.get(project.id).await.unwrap();
        assert_eq!(found.status, ProjectStatus::TitlesGenerated);
    }

    #[tokio::test]
    async fn test_delete_project() {
        let pool = setup_test_db().await;
        let repo = ProjectRepository::new(pool);

        let project = Project::new("To delete", "Readers");
        repo.create(&project).await.unwrap();

        assert!(repo.delete(project.id).await.unwrap());
        assert!(repo.find_by_id(project.id).await.unwrap().is_none());
        assert!(!repo.delete(project.id).await.unwrap());
    }
}
