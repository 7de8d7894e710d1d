use crate::error::DbError;
use crate::models::{ProjectLog, ProjectLogRow};
use scribe_core::LogEntry;
use sqlx::SqlitePool;
use uuid::Uuid;

#[derive(Clone)]
pub struct ProjectLogRepository {
    pool: SqlitePool,
}

impl ProjectLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn append(
        &self,
        project_id: Uuid,
        run_id: Option<Uuid>,
        entry: &LogEntry,
    ) -> Result<i64, DbError> {
        let result = sqlx::query(
            r#"
            INSERT INTO project_logs (project_id, run_id, agent, message, level, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(project_id.to_string())
        .bind(run_id.map(|id| id.to_string()))
        .bind(&entry.agent)
        .bind(&entry.message)
        .bind(entry.level.as_str())
        .bind(entry.timestamp.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// The newest `limit` entries, oldest first.
    pub async fn find_recent(&self, project_id: Uuid, limit: u32) -> Result<Vec<ProjectLog>, DbError> {
        let rows: Vec<ProjectLogRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, run_id, agent, message, level, created_at
            FROM (
                SELECT id, project_id, run_id, agent, message, level, created_at
                FROM project_logs
                WHERE project_id = ?
                ORDER BY id DESC
                LIMIT ?
            )
            ORDER BY id ASC
            "#,
        )
        .bind(project_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations, ProjectRepository};
    use scribe_core::{LogLevel, Project};

    #[tokio::test]
    async fn test_append_and_find_recent() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let project = Project::new("Log tests", "Readers");
        ProjectRepository::new(pool.clone())
            .create(&project)
            .await
            .unwrap();
        let repo = ProjectLogRepository::new(pool);
        let run_id = Uuid::new_v4();

        for i in 0..5 {
            repo.append(project.id, Some(run_id), &LogEntry::info("Research", format!("step {}", i)))
                .await
                .unwrap();
        }
        repo.append(project.id, Some(run_id), &LogEntry::error("Write", "failed"))
            .await
            .unwrap();

        let recent = repo.find_recent(project.id, 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].entry.message, "step 3");
        assert_eq!(recent[2].entry.level, LogLevel::Error);
        assert_eq!(recent[2].run_id, Some(run_id));
    }
}
