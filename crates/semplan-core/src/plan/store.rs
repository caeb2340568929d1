//! [`PlanStore`]: the single owner of one user's [`PlanState`].

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::grade::{Grade, weighted_gpa};
use crate::session::UserId;
use crate::term::{Term, generate_terms};
use crate::{CourseCode, CourseStatus};

use super::types::{PlanState, PlannedCourse, Semester};
use super::PlanError;

/// In-memory source of truth for one user's plan.
///
/// Every mutation either succeeds and leaves all derived aggregates current,
/// or fails with a [`PlanError`] and leaves the state untouched. A course
/// code appears at most once across the whole plan.
#[derive(Debug, Clone)]
pub struct PlanStore {
    owner: UserId,
    state: PlanState,
}

impl PlanStore {
    /// An empty plan for `owner`.
    pub fn new(owner: UserId) -> Self {
        Self::with_state(owner, PlanState::new())
    }

    pub fn with_state(owner: UserId, state: PlanState) -> Self {
        Self { owner, state }
    }

    /// A plan with one empty semester per term from `start` through
    /// `graduation`.
    pub fn generate(owner: UserId, start: Term, graduation: Term, include_summer: bool) -> Self {
        let mut store = Self::new(owner);
        for term in generate_terms(start, graduation, include_summer) {
            let semester = Semester::new(term);
            store.state.semesters.insert(semester.id, semester);
        }
        store
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    /// Independent copy of the current state.
    pub fn snapshot(&self) -> PlanState {
        self.state.clone()
    }

    pub(crate) fn restore(&mut self, state: PlanState) {
        self.state = state;
    }

    pub fn state(&self) -> &PlanState {
        &self.state
    }

    // -- reads --------------------------------------------------------------

    /// Semesters in chronological order.
    pub fn semesters(&self) -> Vec<&Semester> {
        self.state.sorted()
    }

    pub fn semester(&self, id: Uuid) -> Option<&Semester> {
        self.state.semesters.get(&id)
    }

    pub fn semester_for_term(&self, term: Term) -> Option<&Semester> {
        self.state.semesters.values().find(|s| s.term == term)
    }

    /// Every entry, semesters in chronological order.
    pub fn all_courses(&self) -> Vec<&PlannedCourse> {
        self.semesters()
            .into_iter()
            .flat_map(|s| s.courses().iter())
            .collect()
    }

    pub fn courses_by_status(&self, status: CourseStatus) -> Vec<&PlannedCourse> {
        self.all_courses()
            .into_iter()
            .filter(|c| c.status == status)
            .collect()
    }

    pub fn find_course(&self, code: &str) -> Option<&PlannedCourse> {
        self.state
            .semesters
            .values()
            .find_map(|s| s.course_by_code(code))
    }

    /// Overall GPA over every completed, graded entry in the plan.
    ///
    /// Computed from the entries themselves, not averaged from semester
    /// GPAs.
    pub fn calculate_gpa(&self) -> f64 {
        weighted_gpa(
            self.state
                .semesters
                .values()
                .flat_map(|s| s.courses())
                .filter_map(PlannedCourse::gpa_input),
        )
    }

    pub fn total_credits(&self) -> u32 {
        self.state.semesters.values().map(Semester::total_credits).sum()
    }

    /// Completed codes with their recorded grade, for grade-aware
    /// prerequisite evaluation.
    pub fn completed_grades(&self) -> HashMap<CourseCode, Option<Grade>> {
        self.state
            .semesters
            .values()
            .flat_map(|s| s.courses())
            .filter(|c| c.status == CourseStatus::Completed)
            .map(|c| (c.code.clone(), c.grade))
            .collect()
    }

    /// Codes that are planned or in progress.
    pub fn pending_codes(&self) -> HashSet<CourseCode> {
        self.state
            .semesters
            .values()
            .flat_map(|s| s.courses())
            .filter(|c| c.status != CourseStatus::Completed)
            .map(|c| c.code.clone())
            .collect()
    }

    // -- semester mutations -------------------------------------------------

    /// Add an empty semester for `term` and return its id.
    pub fn add_semester(&mut self, term: Term) -> Result<Uuid, PlanError> {
        let semester = Semester::new(term);
        let id = semester.id;
        self.insert_semester(semester)?;
        Ok(id)
    }

    /// Insert a prepared semester. Fails when its term is already present.
    pub fn insert_semester(&mut self, semester: Semester) -> Result<(), PlanError> {
        if self.semester_for_term(semester.term).is_some() {
            return Err(PlanError::DuplicateSemester(semester.term));
        }
        for course in semester.courses() {
            if let Some(existing) = self.find_course(&course.code) {
                return Err(PlanError::DuplicateCourse {
                    code: course.code.clone(),
                    semester_id: existing.semester_id,
                });
            }
        }
        tracing::debug!(semester_id = %semester.id, term = %semester.term, "semester added");
        self.state.semesters.insert(semester.id, semester);
        Ok(())
    }

    /// Remove a semester and every entry it holds.
    pub fn remove_semester(&mut self, semester_id: Uuid) -> Result<Semester, PlanError> {
        let removed = self
            .state
            .semesters
            .remove(&semester_id)
            .ok_or(PlanError::UnknownSemester(semester_id))?;
        tracing::debug!(
            %semester_id,
            courses = removed.courses().len(),
            "semester removed"
        );
        Ok(removed)
    }

    // -- course mutations ---------------------------------------------------

    /// Append `course` to a semester.
    ///
    /// Fails with [`PlanError::UnknownSemester`] when the semester is absent
    /// and with [`PlanError::DuplicateCourse`] when the code is already in
    /// this or any other semester.
    pub fn add_course(&mut self, semester_id: Uuid, course: PlannedCourse) -> Result<Uuid, PlanError> {
        if !self.state.semesters.contains_key(&semester_id) {
            return Err(PlanError::UnknownSemester(semester_id));
        }
        if let Some(existing) = self.find_course(&course.code) {
            return Err(PlanError::DuplicateCourse {
                code: course.code.clone(),
                semester_id: existing.semester_id,
            });
        }

        let course_id = course.id;
        let semester = self.semester_mut(semester_id)?;
        tracing::debug!(%semester_id, code = %course.code, "course added");
        semester.push(course);
        Ok(course_id)
    }

    /// Remove a course. Returns `Ok(None)` when the course is not in the
    /// semester.
    pub fn remove_course(
        &mut self,
        semester_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<PlannedCourse>, PlanError> {
        let semester = self.semester_mut(semester_id)?;
        let removed = semester.take(course_id);
        if let Some(course) = &removed {
            tracing::debug!(%semester_id, code = %course.code, "course removed");
        }
        Ok(removed)
    }

    /// Move a course between semesters, recomputing both. Moving within one
    /// semester is a no-op.
    pub fn move_course(&mut self, course_id: Uuid, from: Uuid, to: Uuid) -> Result<(), PlanError> {
        if !self.state.semesters.contains_key(&to) {
            return Err(PlanError::UnknownSemester(to));
        }
        let source = self.semester_mut(from)?;
        if source.course(course_id).is_none() {
            return Err(PlanError::CourseNotFound {
                course_id,
                semester_id: from,
            });
        }
        if from == to {
            return Ok(());
        }

        let course = source.take(course_id).ok_or(PlanError::CourseNotFound {
            course_id,
            semester_id: from,
        })?;
        tracing::debug!(code = %course.code, %from, %to, "course moved");
        self.semester_mut(to)?.push(course);
        Ok(())
    }

    /// Set a course's status and grade. `grade` replaces any previous grade,
    /// so passing `None` clears it.
    pub fn update_course_status(
        &mut self,
        semester_id: Uuid,
        course_id: Uuid,
        status: CourseStatus,
        grade: Option<Grade>,
    ) -> Result<(), PlanError> {
        let semester = self.semester_mut(semester_id)?;
        let course = semester
            .course_mut(course_id)
            .ok_or(PlanError::CourseNotFound {
                course_id,
                semester_id,
            })?;
        course.status = status;
        course.grade = grade;
        tracing::debug!(%semester_id, code = %course.code, %status, "course status updated");
        semester.recompute();
        Ok(())
    }

    fn semester_mut(&mut self, semester_id: Uuid) -> Result<&mut Semester, PlanError> {
        self.state
            .semesters
            .get_mut(&semester_id)
            .ok_or(PlanError::UnknownSemester(semester_id))
    }
}
