//! Database query functions for the `semesters` table.
//!
//! Every query is scoped by `user_id`; a row owned by one user is never
//! visible to, or writable by, another.

use anyhow::{Context, Result, bail};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{CourseStatus, Grade, Season, SemesterRow};

/// Full replacement payload for one semester and its ordered course list.
#[derive(Debug, Clone)]
pub struct SemesterUpsert {
    pub id: Uuid,
    pub year: i32,
    pub season: Season,
    pub courses: Vec<CourseUpsert>,
}

/// One course inside a [`SemesterUpsert`]. Its position is its index.
#[derive(Debug, Clone)]
pub struct CourseUpsert {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub credits: i32,
    pub status: CourseStatus,
    pub grade: Option<Grade>,
}

/// Create or replace a semester and its course list in one transaction.
///
/// Courses attached to the semester but absent from the payload are
/// deleted. Courses present in the payload but currently attached to a
/// different semester of the same user are re-parented. Fails (and rolls
/// back) if the semester or any course id is owned by another user.
pub async fn upsert_semester(
    pool: &PgPool,
    user_id: &str,
    semester: &SemesterUpsert,
) -> Result<SemesterRow> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let row = write_semester(&mut *tx, user_id, semester).await?;
    tx.commit().await.context("failed to commit transaction")?;

    Ok(row)
}

/// The body of [`upsert_semester`], run on a caller-owned connection so
/// several semesters can share one transaction. The caller commits.
pub(crate) async fn write_semester(
    conn: &mut PgConnection,
    user_id: &str,
    semester: &SemesterUpsert,
) -> Result<SemesterRow> {
    let row = sqlx::query_as::<_, SemesterRow>(
        "INSERT INTO semesters (id, user_id, year, season) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (id) DO UPDATE \
         SET year = EXCLUDED.year, season = EXCLUDED.season, updated_at = now() \
         WHERE semesters.user_id = EXCLUDED.user_id \
         RETURNING *",
    )
    .bind(semester.id)
    .bind(user_id)
    .bind(semester.year)
    .bind(semester.season)
    .fetch_optional(&mut *conn)
    .await
    .with_context(|| format!("failed to upsert semester {}", semester.id))?;

    let Some(row) = row else {
        bail!("semester {} belongs to another user", semester.id);
    };

    let keep: Vec<Uuid> = semester.courses.iter().map(|c| c.id).collect();
    sqlx::query(
        "DELETE FROM planned_courses \
         WHERE semester_id = $1 AND user_id = $2 AND NOT (id = ANY($3))",
    )
    .bind(semester.id)
    .bind(user_id)
    .bind(&keep)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("failed to prune courses of semester {}", semester.id))?;

    for (index, course) in semester.courses.iter().enumerate() {
        let position = i32::try_from(index).unwrap_or(i32::MAX);
        let result = sqlx::query(
            "INSERT INTO planned_courses \
             (id, semester_id, user_id, code, title, credits, status, grade, position) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE \
             SET semester_id = EXCLUDED.semester_id, code = EXCLUDED.code, \
                 title = EXCLUDED.title, credits = EXCLUDED.credits, \
                 status = EXCLUDED.status, grade = EXCLUDED.grade, \
                 position = EXCLUDED.position, updated_at = now() \
             WHERE planned_courses.user_id = EXCLUDED.user_id",
        )
        .bind(course.id)
        .bind(semester.id)
        .bind(user_id)
        .bind(&course.code)
        .bind(&course.title)
        .bind(course.credits)
        .bind(course.status)
        .bind(course.grade)
        .bind(position)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to upsert course {:?}", course.code))?;

        if result.rows_affected() == 0 {
            // Transaction rolls back on drop (no commit).
            bail!("course {} belongs to another user", course.id);
        }
    }

    Ok(row)
}

/// Fetch one semester owned by `user_id`.
pub async fn get_semester(pool: &PgPool, user_id: &str, id: Uuid) -> Result<Option<SemesterRow>> {
    let row = sqlx::query_as::<_, SemesterRow>(
        "SELECT * FROM semesters WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch semester")?;

    Ok(row)
}

/// List a user's semesters in chronological order.
pub async fn list_semesters(pool: &PgPool, user_id: &str) -> Result<Vec<SemesterRow>> {
    let rows = sqlx::query_as::<_, SemesterRow>(
        "SELECT * FROM semesters WHERE user_id = $1 \
         ORDER BY year ASC, \
                  CASE season WHEN 'spring' THEN 0 WHEN 'summer' THEN 1 ELSE 2 END ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to list semesters")?;

    Ok(rows)
}

/// Delete a semester (its courses cascade). Returns the number of semester
/// rows removed, which is zero when the id is unknown or owned by another
/// user.
pub async fn delete_semester(pool: &PgPool, user_id: &str, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM semesters WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await
        .with_context(|| format!("failed to delete semester {id}"))?;

    Ok(result.rows_affected())
}
