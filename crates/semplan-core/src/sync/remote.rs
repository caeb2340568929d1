//! The remote persistence contract.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plan::{PlannedCourse, Semester};
use crate::session::UserId;
use crate::term::Term;

/// Remote write unit: one semester with its full ordered course list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemesterPayload {
    pub id: Uuid,
    pub term: Term,
    pub courses: Vec<PlannedCourse>,
}

impl From<&Semester> for SemesterPayload {
    fn from(semester: &Semester) -> Self {
        Self {
            id: semester.id,
            term: semester.term,
            courses: semester.courses().to_vec(),
        }
    }
}

impl From<SemesterPayload> for Semester {
    fn from(payload: SemesterPayload) -> Self {
        Semester::from_parts(payload.id, payload.term, payload.courses)
    }
}

/// Every remote change produced by one batch of optimistic mutations.
///
/// A `RemoteStore` applies it all or not at all: semester deletes first,
/// then the upserts, then course deletes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWrite {
    pub removed_semesters: Vec<Uuid>,
    pub upserts: Vec<SemesterPayload>,
    pub removed_courses: Vec<Uuid>,
}

impl BatchWrite {
    pub fn is_empty(&self) -> bool {
        self.removed_semesters.is_empty() && self.upserts.is_empty() && self.removed_courses.is_empty()
    }
}

/// Remote persistence service for plans.
///
/// Every call is scoped to `owner`; an implementation must never read or
/// write another user's rows.
///
/// # Object Safety
///
/// The trait is object-safe so the coordinator can hold it as
/// `Arc<dyn RemoteStore>`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create the semester or replace its course list with `payload`.
    async fn create_or_update_semester(&self, owner: &UserId, payload: &SemesterPayload)
    -> Result<()>;

    /// Delete course entries by id. Unknown ids are ignored.
    async fn delete_courses(&self, owner: &UserId, course_ids: &[Uuid]) -> Result<()>;

    /// Delete a semester and its entries. An unknown id is ignored.
    async fn delete_semester(&self, owner: &UserId, semester_id: Uuid) -> Result<()>;

    /// Apply a whole batch atomically. On error nothing from `batch` may
    /// remain applied.
    async fn apply_batch(&self, owner: &UserId, batch: &BatchWrite) -> Result<()>;

    /// The owner's full plan.
    async fn load_plan(&self, owner: &UserId) -> Result<Vec<Semester>>;
}

// Compile-time assertion: RemoteStore must be usable as `dyn RemoteStore`.
const _: () = {
    fn _assert_object_safe(_: &dyn RemoteStore) {}
};
