//! The user-scoped plan store: semesters, their courses, and derived
//! credit and GPA aggregates.

pub mod mutation;
pub mod store;
pub mod types;

use thiserror::Error;
use uuid::Uuid;

use crate::CourseCode;
use crate::term::Term;

pub use mutation::{MutationEffect, PlanMutation};
pub use store::PlanStore;
pub use types::{
    CreditLoad, LIGHT_CREDITS, OVERLOAD_CREDITS, PlanState, PlannedCourse, Semester,
};

/// Recoverable errors from plan mutations. The state is left unchanged
/// whenever one is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("course {code} is already planned in semester {semester_id}")]
    DuplicateCourse {
        code: CourseCode,
        /// Semester that already holds the code.
        semester_id: Uuid,
    },

    #[error("unknown semester {0}")]
    UnknownSemester(Uuid),

    #[error("course {course_id} not found in semester {semester_id}")]
    CourseNotFound { course_id: Uuid, semester_id: Uuid },

    #[error("a semester for {0} already exists")]
    DuplicateSemester(Term),
}
