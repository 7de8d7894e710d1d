use crate::error::DbError;
use crate::models::{DraftRow, QualityAssessmentRow};
use chrono::Utc;
use scribe_core::{count_words, Draft, QualityAssessment, UpdateDraftRequest};
use sqlx::SqlitePool;
use uuid::Uuid;

const DRAFT_COLUMNS: &str = "id, project_id, content_markdown, content_html, word_count, version, \
     is_current, is_approved, seo_title, meta_description, faq_schema, created_at, updated_at";

#[derive(Clone)]
pub struct DraftRepository {
    pool: SqlitePool,
}

impl DraftRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Stores `draft` as the project's next version and makes it current.
    ///
    /// The version is one above the highest ever stored for the project, so
    /// superseded versions are never reused. The previous current draft loses
    /// `is_current` in the same transaction.
    pub async fn create_current(&self, draft: &Draft) -> Result<Draft, DbError> {
        let mut tx = self.pool.begin().await?;
        let project_id = draft.project_id.to_string();

        let (max_version,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM drafts WHERE project_id = ?")
                .bind(&project_id)
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query("UPDATE drafts SET is_current = 0 WHERE project_id = ? AND is_current = 1")
            .bind(&project_id)
            .execute(&mut *tx)
            .await?;

        let mut stored = draft.clone();
        stored.version = (max_version + 1) as u32;
        stored.is_current = true;
        let row = DraftRow::from(&stored);

        sqlx::query(&format!(
            "INSERT INTO drafts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            DRAFT_COLUMNS
        ))
        .bind(&row.id)
        .bind(&row.project_id)
        .bind(&row.content_markdown)
        .bind(&row.content_html)
        .bind(row.word_count)
        .bind(row.version)
        .bind(row.is_current)
        .bind(row.is_approved)
        .bind(&row.seo_title)
        .bind(&row.meta_description)
        .bind(&row.faq_schema)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *tx)
        .await?;

        if let Some(assessment) = &stored.assessment {
            let scored = QualityAssessmentRow::from_assessment(&row.id, assessment, row.updated_at);
            sqlx::query(
                r#"
                INSERT INTO quality_assessments (draft_id, scores, overall_score, primary_insight,
                    feedback, suggestions, evaluated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&scored.draft_id)
            .bind(&scored.scores)
            .bind(scored.overall_score)
            .bind(&scored.primary_insight)
            .bind(&scored.feedback)
            .bind(&scored.suggestions)
            .bind(scored.evaluated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(stored)
    }

    pub async fn find_current(&self, project_id: Uuid) -> Result<Option<Draft>, DbError> {
        let row: Option<DraftRow> = sqlx::query_as(&format!(
            "SELECT {} FROM drafts WHERE project_id = ? AND is_current = 1",
            DRAFT_COLUMNS
        ))
        .bind(project_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let assessment = self.find_assessment(&row.id).await?;
                Ok(Some(row.into_domain(assessment)))
            }
            None => Ok(None),
        }
    }

    /// Every stored version, newest first.
    pub async fn find_by_project(&self, project_id: Uuid) -> Result<Vec<Draft>, DbError> {
        let rows: Vec<DraftRow> = sqlx::query_as(&format!(
            "SELECT {} FROM drafts WHERE project_id = ? ORDER BY version DESC",
            DRAFT_COLUMNS
        ))
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut drafts = Vec::with_capacity(rows.len());
        for row in rows {
            let assessment = self.find_assessment(&row.id).await?;
            drafts.push(row.into_domain(assessment));
        }
        Ok(drafts)
    }

    async fn find_assessment(&self, draft_id: &str) -> Result<Option<QualityAssessment>, DbError> {
        let row: Option<QualityAssessmentRow> = sqlx::query_as(
            r#"
            SELECT draft_id, scores, overall_score, primary_insight, feedback, suggestions, evaluated_at
            FROM quality_assessments
            WHERE draft_id = ?
            "#,
        )
        .bind(draft_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_domain()))
    }

    /// Clears `is_current` on an unapproved current draft. Version rows are kept.
    pub async fn supersede_unapproved(&self, project_id: Uuid) -> Result<u64, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE drafts
            SET is_current = 0, updated_at = ?
            WHERE project_id = ? AND is_current = 1 AND is_approved = 0
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(project_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Edits the current draft in place. Approved drafts are left untouched.
    pub async fn update_current(
        &self,
        project_id: Uuid,
        update: &UpdateDraftRequest,
    ) -> Result<Option<Draft>, DbError> {
        let Some(mut draft) = self.find_current(project_id).await? else {
            return Ok(None);
        };
        if draft.is_approved {
            return Ok(None);
        }

        if let Some(markdown) = &update.content_markdown {
            draft.content_markdown = markdown.clone();
            draft.word_count = count_words(markdown);
        }
        if let Some(html) = &update.content_html {
            draft.content_html = Some(html.clone());
        }
        if let Some(seo_title) = &update.seo_title {
            draft.seo_title = Some(seo_title.clone());
        }
        if let Some(meta) = &update.meta_description {
            draft.meta_description = Some(meta.clone());
        }
        if let Some(faq) = &update.faq_schema {
            draft.faq_schema = Some(faq.clone());
        }
        draft.updated_at = Utc::now();
        let row = DraftRow::from(&draft);

        let result = sqlx::query(
            r#"
            UPDATE drafts
            SET content_markdown = ?, content_html = ?, word_count = ?, seo_title = ?,
                meta_description = ?, faq_schema = ?, updated_at = ?
            WHERE id = ? AND is_current = 1 AND is_approved = 0
            "#,
        )
        .bind(&row.content_markdown)
        .bind(&row.content_html)
        .bind(row.word_count)
        .bind(&row.seo_title)
        .bind(&row.meta_description)
        .bind(&row.faq_schema)
        .bind(row.updated_at)
        .bind(&row.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(draft))
    }

    pub async fn approve(&self, draft_id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE drafts
            SET is_approved = 1, updated_at = ?
            WHERE id = ? AND is_current = 1 AND is_approved = 0
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(draft_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
