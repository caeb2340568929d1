//! Pure evaluation of a requirement tree against a student's course sets.
//!
//! A leaf is **hard-satisfied** by a completed course (with a sufficient
//! grade when the leaf names one) and **soft-satisfied** by a course that is
//! only planned or in progress. Soft satisfaction does not block, but it is
//! reported so callers can show the requirement as pending.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::BuildHasher;

use crate::CourseCode;
use crate::grade::{Grade, meets_minimum};

use super::RequirementNode;

// ---------------------------------------------------------------------------
// Completed-course lookup
// ---------------------------------------------------------------------------

/// How a course appears in the completed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    NotCompleted,
    /// Completed; the grade is `None` when the set carries no grades, in
    /// which case minimum-grade checks pass.
    Completed(Option<Grade>),
}

/// A completed-course set, either bare codes or codes with grades.
///
/// A bare set is the permissive variant: it cannot fail a minimum-grade
/// leaf. A grade map enforces minimum grades.
pub trait CompletedCourses {
    fn completion(&self, code: &str) -> Completion;
}

impl<S: BuildHasher> CompletedCourses for HashSet<CourseCode, S> {
    fn completion(&self, code: &str) -> Completion {
        if self.contains(code) {
            Completion::Completed(None)
        } else {
            Completion::NotCompleted
        }
    }
}

impl CompletedCourses for BTreeSet<CourseCode> {
    fn completion(&self, code: &str) -> Completion {
        if self.contains(code) {
            Completion::Completed(None)
        } else {
            Completion::NotCompleted
        }
    }
}

impl<S: BuildHasher> CompletedCourses for HashMap<CourseCode, Grade, S> {
    fn completion(&self, code: &str) -> Completion {
        match self.get(code) {
            Some(grade) => Completion::Completed(Some(*grade)),
            None => Completion::NotCompleted,
        }
    }
}

impl<S: BuildHasher> CompletedCourses for HashMap<CourseCode, Option<Grade>, S> {
    fn completion(&self, code: &str) -> Completion {
        match self.get(code) {
            Some(grade) => Completion::Completed(*grade),
            None => Completion::NotCompleted,
        }
    }
}

impl CompletedCourses for BTreeMap<CourseCode, Grade> {
    fn completion(&self, code: &str) -> Completion {
        match self.get(code) {
            Some(grade) => Completion::Completed(Some(*grade)),
            None => Completion::NotCompleted,
        }
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Coarse classification of an [`EvaluationResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Every requirement is met by completed courses.
    Satisfied,
    /// Nothing is missing, but some requirements rest on planned courses.
    Pending,
    /// At least one course is missing.
    Blocked,
}

/// Outcome of evaluating a requirement tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationResult {
    /// Met by completed or planned courses (nothing missing).
    pub satisfied: bool,
    /// Met by completed courses alone ("can register now").
    pub hard_satisfied: bool,
    /// Courses still needed, shortest path first for `any` nodes.
    pub missing: Vec<CourseCode>,
    /// Planned or in-progress courses the verdict currently relies on.
    pub soft_satisfied_via: Vec<CourseCode>,
}

impl EvaluationResult {
    fn trivially_satisfied() -> Self {
        Self {
            satisfied: true,
            hard_satisfied: true,
            missing: Vec::new(),
            soft_satisfied_via: Vec::new(),
        }
    }

    pub fn verdict(&self) -> Verdict {
        if !self.missing.is_empty() {
            Verdict::Blocked
        } else if self.hard_satisfied {
            Verdict::Satisfied
        } else {
            Verdict::Pending
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.verdict() == Verdict::Blocked
    }

    pub fn is_pending(&self) -> bool {
        self.verdict() == Verdict::Pending
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate a prerequisite tree.
///
/// `None` means no prerequisites and is always satisfied. A tree that fails
/// [`RequirementNode::validate`] is logged and treated the same way, so a
/// bad catalog record never stops a student from planning.
pub fn evaluate<C>(
    tree: Option<&RequirementNode>,
    completed: &C,
    planned: &HashSet<CourseCode>,
) -> EvaluationResult
where
    C: CompletedCourses + ?Sized,
{
    let Some(root) = tree else {
        return EvaluationResult::trivially_satisfied();
    };

    if let Err(err) = root.validate() {
        tracing::warn!(error = %err, "ignoring malformed prerequisite tree");
        return EvaluationResult::trivially_satisfied();
    }

    let outcome = eval_node(root, completed, planned);
    EvaluationResult {
        satisfied: outcome.met,
        hard_satisfied: outcome.hard,
        missing: outcome.missing,
        soft_satisfied_via: outcome.soft,
    }
}

/// Per-node result. `met` is hard-or-soft satisfaction.
struct Outcome {
    hard: bool,
    met: bool,
    missing: Vec<CourseCode>,
    soft: Vec<CourseCode>,
}

fn eval_node<C>(node: &RequirementNode, completed: &C, planned: &HashSet<CourseCode>) -> Outcome
where
    C: CompletedCourses + ?Sized,
{
    match node {
        RequirementNode::Leaf { course, min_grade } => {
            eval_leaf(course, *min_grade, completed, planned)
        }
        RequirementNode::And { children } => {
            let mut out = Outcome {
                hard: true,
                met: true,
                missing: Vec::new(),
                soft: Vec::new(),
            };
            for child in children {
                let child = eval_node(child, completed, planned);
                out.hard &= child.hard;
                out.met &= child.met;
                extend_unique(&mut out.missing, child.missing);
                extend_unique(&mut out.soft, child.soft);
            }
            out
        }
        RequirementNode::Or { children } => {
            let outcomes: Vec<Outcome> = children
                .iter()
                .map(|child| eval_node(child, completed, planned))
                .collect();

            if outcomes.iter().any(|o| o.hard) {
                return Outcome {
                    hard: true,
                    met: true,
                    missing: Vec::new(),
                    soft: Vec::new(),
                };
            }

            if outcomes.iter().any(|o| o.met) {
                let soft = outcomes
                    .into_iter()
                    .find(|o| o.met)
                    .map(|o| o.soft)
                    .unwrap_or_default();
                return Outcome {
                    hard: false,
                    met: true,
                    missing: Vec::new(),
                    soft,
                };
            }

            // Shortest actionable path; `min_by_key` keeps the first minimum,
            // which is the leftmost child.
            let best = outcomes.into_iter().min_by_key(|o| o.missing.len());
            match best {
                Some(best) => Outcome {
                    hard: false,
                    met: false,
                    missing: best.missing,
                    soft: best.soft,
                },
                None => Outcome {
                    hard: true,
                    met: true,
                    missing: Vec::new(),
                    soft: Vec::new(),
                },
            }
        }
    }
}

fn eval_leaf<C>(
    course: &str,
    min_grade: Option<Grade>,
    completed: &C,
    planned: &HashSet<CourseCode>,
) -> Outcome
where
    C: CompletedCourses + ?Sized,
{
    let hard = match completed.completion(course) {
        Completion::NotCompleted => false,
        Completion::Completed(None) => true,
        Completion::Completed(Some(grade)) => match min_grade {
            Some(min) => meets_minimum(grade, min),
            None => true,
        },
    };

    if hard {
        return Outcome {
            hard: true,
            met: true,
            missing: Vec::new(),
            soft: Vec::new(),
        };
    }

    if planned.contains(course) {
        Outcome {
            hard: false,
            met: true,
            missing: Vec::new(),
            soft: vec![course.to_owned()],
        }
    } else {
        Outcome {
            hard: false,
            met: false,
            missing: vec![course.to_owned()],
            soft: Vec::new(),
        }
    }
}

fn extend_unique(into: &mut Vec<CourseCode>, from: Vec<CourseCode>) {
    for code in from {
        if !into.contains(&code) {
            into.push(code);
        }
    }
}
