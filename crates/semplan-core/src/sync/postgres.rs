//! [`RemoteStore`] backed by PostgreSQL through `semplan-db`.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use semplan_db::models::PlannedCourseRow;
use semplan_db::queries::batches::{self, PlanBatch};
use semplan_db::queries::{courses, semesters};
use semplan_db::queries::semesters::{CourseUpsert, SemesterUpsert};

use crate::plan::{PlannedCourse, Semester};
use crate::session::UserId;
use crate::term::Term;

use super::remote::{BatchWrite, RemoteStore, SemesterPayload};

/// Remote store over a Postgres pool. Every query is scoped by `user_id`.
#[derive(Debug, Clone)]
pub struct PgRemoteStore {
    pool: PgPool,
}

impl PgRemoteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn to_upsert(payload: &SemesterPayload) -> Result<SemesterUpsert> {
    let courses = payload
        .courses
        .iter()
        .map(|c| {
            Ok(CourseUpsert {
                id: c.id,
                code: c.code.clone(),
                title: c.title.clone(),
                credits: i32::try_from(c.credits)
                    .with_context(|| format!("credit value {} out of range", c.credits))?,
                status: c.status,
                grade: c.grade,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SemesterUpsert {
        id: payload.id,
        year: payload.term.year,
        season: payload.term.season,
        courses,
    })
}

fn from_row(row: PlannedCourseRow) -> Result<PlannedCourse> {
    let credits = u32::try_from(row.credits)
        .with_context(|| format!("course {} has negative credits", row.id))?;
    Ok(PlannedCourse {
        id: row.id,
        code: row.code,
        title: row.title,
        credits,
        status: row.status,
        grade: row.grade,
        semester_id: row.semester_id,
    })
}

#[async_trait]
impl RemoteStore for PgRemoteStore {
    async fn create_or_update_semester(
        &self,
        owner: &UserId,
        payload: &SemesterPayload,
    ) -> Result<()> {
        let upsert = to_upsert(payload)?;
        semesters::upsert_semester(&self.pool, owner.as_str(), &upsert).await?;
        tracing::debug!(
            user = %owner,
            semester_id = %payload.id,
            courses = payload.courses.len(),
            "semester persisted"
        );
        Ok(())
    }

    async fn delete_courses(&self, owner: &UserId, course_ids: &[Uuid]) -> Result<()> {
        let removed = courses::delete_courses(&self.pool, owner.as_str(), course_ids).await?;
        tracing::debug!(user = %owner, requested = course_ids.len(), removed, "courses deleted");
        Ok(())
    }

    async fn delete_semester(&self, owner: &UserId, semester_id: Uuid) -> Result<()> {
        let removed = semesters::delete_semester(&self.pool, owner.as_str(), semester_id).await?;
        tracing::debug!(user = %owner, %semester_id, removed, "semester deleted");
        Ok(())
    }

    async fn apply_batch(&self, owner: &UserId, batch: &BatchWrite) -> Result<()> {
        let plan_batch = PlanBatch {
            removed_semesters: batch.removed_semesters.clone(),
            upserts: batch.upserts.iter().map(to_upsert).collect::<Result<_>>()?,
            removed_courses: batch.removed_courses.clone(),
        };
        batches::apply_batch(&self.pool, owner.as_str(), &plan_batch).await
    }

    async fn load_plan(&self, owner: &UserId) -> Result<Vec<Semester>> {
        let semester_rows = semesters::list_semesters(&self.pool, owner.as_str()).await?;
        let course_rows = courses::list_courses_for_user(&self.pool, owner.as_str()).await?;

        let mut by_semester: HashMap<Uuid, Vec<PlannedCourse>> = HashMap::new();
        for row in course_rows {
            let semester_id = row.semester_id;
            by_semester.entry(semester_id).or_default().push(from_row(row)?);
        }

        let plan = semester_rows
            .into_iter()
            .map(|row| {
                let courses = by_semester.remove(&row.id).unwrap_or_default();
                Semester::from_parts(row.id, Term::new(row.year, row.season), courses)
            })
            .collect();
        Ok(plan)
    }
}
