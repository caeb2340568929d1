//! All-or-nothing plan writes spanning several semesters.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use super::semesters::{SemesterUpsert, write_semester};

/// Every remote change from one batch of plan edits.
#[derive(Debug, Clone, Default)]
pub struct PlanBatch {
    /// Semesters to delete, with their courses.
    pub removed_semesters: Vec<Uuid>,
    /// Semesters to create or replace.
    pub upserts: Vec<SemesterUpsert>,
    /// Individual course rows to delete.
    pub removed_courses: Vec<Uuid>,
}

impl PlanBatch {
    pub fn is_empty(&self) -> bool {
        self.removed_semesters.is_empty() && self.upserts.is_empty() && self.removed_courses.is_empty()
    }
}

/// Apply `batch` for `user_id` in a single transaction.
///
/// Semester deletes run first, so a term removed and re-added in the same
/// batch does not collide with its old row on `(user_id, year, season)`.
/// Any failure rolls the whole batch back.
pub async fn apply_batch(pool: &PgPool, user_id: &str, batch: &PlanBatch) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    for id in &batch.removed_semesters {
        sqlx::query("DELETE FROM semesters WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to delete semester {id}"))?;
    }

    for semester in &batch.upserts {
        write_semester(&mut *tx, user_id, semester).await?;
    }

    if !batch.removed_courses.is_empty() {
        sqlx::query("DELETE FROM planned_courses WHERE user_id = $1 AND id = ANY($2)")
            .bind(user_id)
            .bind(&batch.removed_courses)
            .execute(&mut *tx)
            .await
            .context("failed to delete planned courses")?;
    }

    tx.commit().await.context("failed to commit transaction")?;

    tracing::debug!(
        user_id,
        upserts = batch.upserts.len(),
        removed_semesters = batch.removed_semesters.len(),
        removed_courses = batch.removed_courses.len(),
        "plan batch applied"
    );
    Ok(())
}
