//! Evaluate a catalog course against a plan.

use crate::catalog::Catalog;
use crate::plan::PlanStore;

use super::evaluator::{EvaluationResult, evaluate};

/// Check `code`'s prerequisites against the completed and pending entries
/// of `store`. Completed entries are grade-aware; planned and in-progress
/// entries count as soft satisfaction.
///
/// Returns `None` when the catalog does not know `code`.
pub fn check_course(store: &PlanStore, catalog: &Catalog, code: &str) -> Option<EvaluationResult> {
    let entry = catalog.get(code)?;
    let completed = store.completed_grades();
    let mut planned = store.pending_codes();
    // A course never counts toward its own prerequisites.
    planned.remove(code);
    Some(evaluate(entry.prerequisites.as_ref(), &completed, &planned))
}
