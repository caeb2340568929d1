//! Plan data types: course entries, semesters, and the whole-plan state.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::grade::{Grade, weighted_gpa};
use crate::term::Term;
use crate::{CourseCode, CourseStatus};

use super::PlanError;

/// Credit load above which a semester is flagged as overloaded.
pub const OVERLOAD_CREDITS: u32 = 18;

/// Credit load below which a semester is flagged as light.
pub const LIGHT_CREDITS: u32 = 12;

// ---------------------------------------------------------------------------
// PlannedCourse
// ---------------------------------------------------------------------------

/// One course placed in one semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedCourse {
    pub id: Uuid,
    pub code: CourseCode,
    pub title: String,
    pub credits: u32,
    pub status: CourseStatus,
    #[serde(default)]
    pub grade: Option<Grade>,
    /// Owning semester. Assigned by the store when the entry is added or
    /// moved.
    #[serde(default)]
    pub semester_id: Uuid,
}

impl PlannedCourse {
    /// A new `planned` entry with a fresh id and no grade.
    pub fn new(code: impl Into<CourseCode>, title: impl Into<String>, credits: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            title: title.into(),
            credits,
            status: CourseStatus::Planned,
            grade: None,
            semester_id: Uuid::nil(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_status(mut self, status: CourseStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_grade(mut self, grade: Grade) -> Self {
        self.grade = Some(grade);
        self
    }

    /// `(grade, credits)` when this entry counts toward GPA.
    pub(crate) fn gpa_input(&self) -> Option<(Grade, u32)> {
        match (self.status, self.grade) {
            (CourseStatus::Completed, Some(grade)) => Some((grade, self.credits)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Semester
// ---------------------------------------------------------------------------

/// Advisory classification of a semester's credit total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditLoad {
    Light,
    Normal,
    Overloaded,
}

impl CreditLoad {
    pub fn classify(total_credits: u32) -> Self {
        if total_credits > OVERLOAD_CREDITS {
            Self::Overloaded
        } else if total_credits < LIGHT_CREDITS {
            Self::Light
        } else {
            Self::Normal
        }
    }
}

/// A semester with its ordered course list and derived aggregates.
///
/// `total_credits` and `gpa` are cached and recomputed by the store after
/// every mutation that touches the semester; they are never set directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SemesterRecord")]
pub struct Semester {
    pub id: Uuid,
    pub term: Term,
    courses: Vec<PlannedCourse>,
    total_credits: u32,
    gpa: f64,
}

/// Wire shape of a semester. Derived fields are ignored on input and
/// recomputed.
#[derive(Deserialize)]
struct SemesterRecord {
    id: Uuid,
    term: Term,
    #[serde(default)]
    courses: Vec<PlannedCourse>,
}

impl From<SemesterRecord> for Semester {
    fn from(record: SemesterRecord) -> Self {
        Semester::from_parts(record.id, record.term, record.courses)
    }
}

impl Semester {
    pub fn new(term: Term) -> Self {
        Self::with_id(Uuid::new_v4(), term)
    }

    pub fn with_id(id: Uuid, term: Term) -> Self {
        Self {
            id,
            term,
            courses: Vec::new(),
            total_credits: 0,
            gpa: 0.0,
        }
    }

    /// A semester holding `courses` in the given order. Each entry's
    /// `semester_id` is overwritten with `id`.
    pub fn from_parts(id: Uuid, term: Term, courses: Vec<PlannedCourse>) -> Self {
        let mut semester = Self::with_id(id, term);
        semester.courses = courses
            .into_iter()
            .map(|mut course| {
                course.semester_id = id;
                course
            })
            .collect();
        semester.recompute();
        semester
    }

    /// Courses in display order.
    pub fn courses(&self) -> &[PlannedCourse] {
        &self.courses
    }

    pub fn total_credits(&self) -> u32 {
        self.total_credits
    }

    /// Credit-weighted GPA over this semester's graded completed entries.
    pub fn gpa(&self) -> f64 {
        self.gpa
    }

    pub fn credit_load(&self) -> CreditLoad {
        CreditLoad::classify(self.total_credits)
    }

    pub fn course(&self, course_id: Uuid) -> Option<&PlannedCourse> {
        self.courses.iter().find(|c| c.id == course_id)
    }

    pub fn course_by_code(&self, code: &str) -> Option<&PlannedCourse> {
        self.courses.iter().find(|c| c.code == code)
    }

    pub(crate) fn push(&mut self, mut course: PlannedCourse) {
        course.semester_id = self.id;
        self.courses.push(course);
        self.recompute();
    }

    pub(crate) fn take(&mut self, course_id: Uuid) -> Option<PlannedCourse> {
        let idx = self.courses.iter().position(|c| c.id == course_id)?;
        let course = self.courses.remove(idx);
        self.recompute();
        Some(course)
    }

    pub(crate) fn course_mut(&mut self, course_id: Uuid) -> Option<&mut PlannedCourse> {
        self.courses.iter_mut().find(|c| c.id == course_id)
    }

    pub(crate) fn recompute(&mut self) {
        self.total_credits = self.courses.iter().map(|c| c.credits).sum();
        self.gpa = weighted_gpa(self.courses.iter().filter_map(PlannedCourse::gpa_input));
    }
}

// ---------------------------------------------------------------------------
// PlanState
// ---------------------------------------------------------------------------

/// Every semester of one user's plan, keyed by id.
///
/// Cloning a `PlanState` is how snapshots are taken; it shares nothing with
/// the original.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanState {
    pub(super) semesters: HashMap<Uuid, Semester>,
}

impl PlanState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a state from loaded semesters, checking that terms and
    /// course codes are unique across the plan.
    pub fn from_semesters(semesters: Vec<Semester>) -> Result<Self, PlanError> {
        let mut terms = HashSet::new();
        let mut codes: HashMap<&str, Uuid> = HashMap::new();

        for semester in &semesters {
            if !terms.insert(semester.term) {
                return Err(PlanError::DuplicateSemester(semester.term));
            }
            for course in semester.courses() {
                if let Some(holder) = codes.insert(course.code.as_str(), semester.id) {
                    return Err(PlanError::DuplicateCourse {
                        code: course.code.clone(),
                        semester_id: holder,
                    });
                }
            }
        }

        Ok(Self {
            semesters: semesters.into_iter().map(|s| (s.id, s)).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.semesters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.semesters.is_empty()
    }

    /// Semesters sorted chronologically.
    pub fn sorted(&self) -> Vec<&Semester> {
        let mut out: Vec<&Semester> = self.semesters.values().collect();
        out.sort_by_key(|s| s.term);
        out
    }

    /// Owned copies of the semesters, chronologically.
    pub fn into_sorted(self) -> Vec<Semester> {
        let mut out: Vec<Semester> = self.semesters.into_values().collect();
        out.sort_by_key(|s| s.term);
        out
    }
}
