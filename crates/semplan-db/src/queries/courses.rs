//! Database query functions for the `planned_courses` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::PlannedCourseRow;

/// List every course a user has planned, grouped by semester in position
/// order.
pub async fn list_courses_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<PlannedCourseRow>> {
    let rows = sqlx::query_as::<_, PlannedCourseRow>(
        "SELECT * FROM planned_courses WHERE user_id = $1 \
         ORDER BY semester_id, position ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to list planned courses")?;

    Ok(rows)
}

/// List the courses of one semester in position order.
pub async fn list_courses_for_semester(
    pool: &PgPool,
    user_id: &str,
    semester_id: Uuid,
) -> Result<Vec<PlannedCourseRow>> {
    let rows = sqlx::query_as::<_, PlannedCourseRow>(
        "SELECT * FROM planned_courses WHERE user_id = $1 AND semester_id = $2 \
         ORDER BY position ASC",
    )
    .bind(user_id)
    .bind(semester_id)
    .fetch_all(pool)
    .await
    .context("failed to list semester courses")?;

    Ok(rows)
}

/// Delete courses by id. Ids owned by another user are left untouched.
///
/// Returns the number of rows removed.
pub async fn delete_courses(pool: &PgPool, user_id: &str, ids: &[Uuid]) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query("DELETE FROM planned_courses WHERE user_id = $1 AND id = ANY($2)")
        .bind(user_id)
        .bind(ids)
        .execute(pool)
        .await
        .context("failed to delete planned courses")?;

    Ok(result.rows_affected())
}
