use crate::error::DbError;
use crate::models::ResearchSourceRow;
use scribe_core::ResearchSource;
use sqlx::SqlitePool;
use uuid::Uuid;

#[derive(Clone)]
pub struct ResearchSourceRepository {
    pool: SqlitePool,
}

impl ResearchSourceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_many(&self, sources: &[ResearchSource]) -> Result<usize, DbError> {
        let mut tx = self.pool.begin().await?;

        for source in sources {
            let row = ResearchSourceRow::from(source);
            sqlx::query(
                r#"
                INSERT INTO research_sources (id, project_id, url, title, domain, credibility_score,
                    extracted_facts, section_id, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.id)
            .bind(&row.project_id)
            .bind(&row.url)
            .bind(&row.title)
            .bind(&row.domain)
            .bind(row.credibility_score)
            .bind(&row.extracted_facts)
            .bind(&row.section_id)
            .bind(row.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(sources.len())
    }

    pub async fn find_by_project(&self, project_id: Uuid) -> Result<Vec<ResearchSource>, DbError> {
        let rows: Vec<ResearchSourceRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, url, title, domain, credibility_score, extracted_facts,
                   section_id, created_at
            FROM research_sources
            WHERE project_id = ?
            ORDER BY credibility_score DESC, rowid ASC
            "#,
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    pub async fn delete_by_project(&self, project_id: Uuid) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM research_sources WHERE project_id = ?")
            .bind(project_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
