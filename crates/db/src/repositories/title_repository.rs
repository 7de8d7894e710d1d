use crate::error::DbError;
use crate::models::TitleRow;
use chrono::Utc;
use scribe_core::Title;
use sqlx::SqlitePool;
use uuid::Uuid;

#[derive(Clone)]
pub struct TitleRepository {
    pool: SqlitePool,
}

impl TitleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Swaps the project's candidates for `titles` and clears any selection.
    pub async fn replace_for_project(
        &self,
        project_id: Uuid,
        titles: &[Title],
    ) -> Result<Vec<Title>, DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM titles WHERE project_id = ?")
            .bind(project_id.to_string())
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE projects SET selected_title_id = NULL, updated_at = ? WHERE id = ?")
            .bind(Utc::now().timestamp())
            .bind(project_id.to_string())
            .execute(&mut *tx)
            .await?;

        for title in titles {
            let row = TitleRow::from(title);
            sqlx::query(
                r#"
                INSERT INTO titles (id, project_id, title, description, search_intent, difficulty, is_selected, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.id)
            .bind(&row.project_id)
            .bind(&row.title)
            .bind(&row.description)
            .bind(&row.search_intent)
            .bind(row.difficulty)
            .bind(row.is_selected)
            .bind(row.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(titles.to_vec())
    }

    pub async fn find_by_project(&self, project_id: Uuid) -> Result<Vec<Title>, DbError> {
        let rows: Vec<TitleRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, title, description, search_intent, difficulty, is_selected, created_at
            FROM titles
            WHERE project_id = ?
            ORDER BY rowid ASC
            "#,
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    pub async fn find_selected(&self, project_id: Uuid) -> Result<Option<Title>, DbError> {
        let row: Option<TitleRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, title, description, search_intent, difficulty, is_selected, created_at
            FROM titles
            WHERE project_id = ? AND is_selected = 1
            "#,
        )
        .bind(project_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_domain()))
    }

    /// Marks `title_id` as the only selected title of the project.
    pub async fn select(&self, project_id: Uuid, title_id: Uuid) -> Result<Title, DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE titles SET is_selected = 0 WHERE project_id = ? AND is_selected = 1")
            .bind(project_id.to_string())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("UPDATE titles SET is_selected = 1 WHERE id = ? AND project_id = ?")
            .bind(title_id.to_string())
            .bind(project_id.to_string())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DbError::TitleNotFound(title_id));
        }

        sqlx::query("UPDATE projects SET selected_title_id = ?, updated_at = ? WHERE id = ?")
            .bind(title_id.to_string())
            .bind(Utc::now().timestamp())
            .bind(project_id.to_string())
            .execute(&mut *tx)
            .await?;

        let row: TitleRow = sqlx::query_as(
            r#"
            SELECT id, project_id, title, description, search_intent, difficulty, is_selected, created_at
            FROM titles
            WHERE id = ?
            "#,
        )
        .bind(title_id.to_string())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into_domain())
    }
}
