//! Plan mutations as data, so they can be queued, replayed and traced.

use std::collections::BTreeSet;
use std::fmt;

use uuid::Uuid;

use crate::CourseStatus;
use crate::grade::Grade;
use crate::term::Term;

use super::types::{PlannedCourse, Semester};
use super::{PlanError, PlanStore};

/// One user-issued change to a plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanMutation {
    AddSemester {
        id: Uuid,
        term: Term,
    },
    RemoveSemester {
        semester_id: Uuid,
    },
    AddCourse {
        semester_id: Uuid,
        course: PlannedCourse,
    },
    RemoveCourse {
        semester_id: Uuid,
        course_id: Uuid,
    },
    MoveCourse {
        course_id: Uuid,
        from: Uuid,
        to: Uuid,
    },
    UpdateCourseStatus {
        semester_id: Uuid,
        course_id: Uuid,
        status: CourseStatus,
        grade: Option<Grade>,
    },
}

impl PlanMutation {
    /// Add a semester under a freshly generated id.
    pub fn add_semester(term: Term) -> Self {
        Self::AddSemester {
            id: Uuid::new_v4(),
            term,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddSemester { .. } => "add_semester",
            Self::RemoveSemester { .. } => "remove_semester",
            Self::AddCourse { .. } => "add_course",
            Self::RemoveCourse { .. } => "remove_course",
            Self::MoveCourse { .. } => "move_course",
            Self::UpdateCourseStatus { .. } => "update_course_status",
        }
    }
}

impl fmt::Display for PlanMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddSemester { term, .. } => write!(f, "add semester {term}"),
            Self::RemoveSemester { semester_id } => write!(f, "remove semester {semester_id}"),
            Self::AddCourse { course, .. } => write!(f, "add course {}", course.code),
            Self::RemoveCourse { course_id, .. } => write!(f, "remove course {course_id}"),
            Self::MoveCourse { course_id, to, .. } => {
                write!(f, "move course {course_id} to {to}")
            }
            Self::UpdateCourseStatus {
                course_id, status, ..
            } => write!(f, "set course {course_id} to {status}"),
        }
    }
}

/// What a successfully applied mutation changed, in remote-write terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationEffect {
    /// Semesters whose course list or aggregates changed.
    pub touched: BTreeSet<Uuid>,
    /// Course entries destroyed by the mutation.
    pub removed_courses: Vec<Uuid>,
    /// Semesters destroyed by the mutation.
    pub removed_semesters: Vec<Uuid>,
}

impl MutationEffect {
    fn touching(ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            touched: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.touched.is_empty() && self.removed_courses.is_empty() && self.removed_semesters.is_empty()
    }
}

impl PlanStore {
    /// Apply a mutation and report its effect.
    pub fn apply(&mut self, mutation: &PlanMutation) -> Result<MutationEffect, PlanError> {
        match mutation {
            PlanMutation::AddSemester { id, term } => {
                self.insert_semester(Semester::with_id(*id, *term))?;
                Ok(MutationEffect::touching([*id]))
            }
            PlanMutation::RemoveSemester { semester_id } => {
                self.remove_semester(*semester_id)?;
                Ok(MutationEffect {
                    removed_semesters: vec![*semester_id],
                    ..MutationEffect::default()
                })
            }
            PlanMutation::AddCourse {
                semester_id,
                course,
            } => {
                self.add_course(*semester_id, course.clone())?;
                Ok(MutationEffect::touching([*semester_id]))
            }
            PlanMutation::RemoveCourse {
                semester_id,
                course_id,
            } => match self.remove_course(*semester_id, *course_id)? {
                Some(_) => Ok(MutationEffect {
                    touched: BTreeSet::from([*semester_id]),
                    removed_courses: vec![*course_id],
                    removed_semesters: Vec::new(),
                }),
                None => Ok(MutationEffect::default()),
            },
            PlanMutation::MoveCourse {
                course_id,
                from,
                to,
            } => {
                self.move_course(*course_id, *from, *to)?;
                if from == to {
                    Ok(MutationEffect::default())
                } else {
                    Ok(MutationEffect::touching([*from, *to]))
                }
            }
            PlanMutation::UpdateCourseStatus {
                semester_id,
                course_id,
                status,
                grade,
            } => {
                self.update_course_status(*semester_id, *course_id, *status, *grade)?;
                Ok(MutationEffect::touching([*semester_id]))
            }
        }
    }
}
