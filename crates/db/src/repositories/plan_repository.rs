use crate::error::DbError;
use crate::models::{datetime_to_timestamp, PlanRow, PlanSectionRow};
use chrono::Utc;
use scribe_core::{Plan, PlanSection};
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

#[derive(Clone)]
pub struct PlanRepository {
    pool: SqlitePool,
}

impl PlanRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Stores `plan` as the project's only plan, dropping any previous one.
    pub async fn replace_for_project(&self, plan: &Plan) -> Result<Plan, DbError> {
        let row = PlanRow::from(plan);
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM plans WHERE project_id = ?")
            .bind(&row.project_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO plans (id, project_id, is_approved, total_estimated_words, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.project_id)
        .bind(row.is_approved)
        .bind(row.total_estimated_words)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *tx)
        .await?;

        insert_sections(&mut tx, &row.id, &plan.sections).await?;

        tx.commit().await?;
        Ok(plan.clone())
    }

    pub async fn find_by_project(&self, project_id: Uuid) -> Result<Option<Plan>, DbError> {
        let row: Option<PlanRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, is_approved, total_estimated_words, created_at, updated_at
            FROM plans
            WHERE project_id = ?
            "#,
        )
        .bind(project_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let sections: Vec<PlanSectionRow> = sqlx::query_as(
            r#"
            SELECT id, plan_id, heading, heading_level, key_points, suggested_sources,
                   estimated_words, sort_order, is_locked, parent_id
            FROM plan_sections
            WHERE plan_id = ?
            ORDER BY sort_order ASC
            "#,
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        let sections = sections.into_iter().map(|s| s.into_domain()).collect();
        Ok(Some(row.into_domain(sections)))
    }

    /// Rewrites the sections of an unapproved plan.
    ///
    /// Returns `false` without touching anything if the plan is already approved.
    pub async fn update_sections(&self, plan: &Plan) -> Result<bool, DbError> {
        let plan_id = plan.id.to_string();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE plans
            SET total_estimated_words = ?, updated_at = ?
            WHERE id = ? AND is_approved = 0
            "#,
        )
        .bind(plan.total_estimated_words as i64)
        .bind(datetime_to_timestamp(plan.updated_at))
        .bind(&plan_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM plan_sections WHERE plan_id = ?")
            .bind(&plan_id)
            .execute(&mut *tx)
            .await?;

        insert_sections(&mut tx, &plan_id, &plan.sections).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Approves the plan and locks every section. Only the first call has an effect.
    pub async fn approve(&self, plan_id: Uuid) -> Result<bool, DbError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE plans SET is_approved = 1, updated_at = ? WHERE id = ? AND is_approved = 0",
        )
        .bind(Utc::now().timestamp())
        .bind(plan_id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE plan_sections SET is_locked = 1 WHERE plan_id = ?")
            .bind(plan_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}

async fn insert_sections(
    tx: &mut Transaction<'_, Sqlite>,
    plan_id: &str,
    sections: &[PlanSection],
) -> Result<(), DbError> {
    for section in sections {
        let row = PlanSectionRow::from_section(plan_id, section);
        sqlx::query(
            r#"
            INSERT INTO plan_sections (id, plan_id, heading, heading_level, key_points,
                suggested_sources, estimated_words, sort_order, is_locked, parent_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.plan_id)
        .bind(&row.heading)
        .bind(row.heading_level)
        .bind(&row.key_points)
        .bind(&row.suggested_sources)
        .bind(row.estimated_words)
        .bind(row.sort_order)
        .bind(row.is_locked)
        .bind(&row.parent_id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
