//! `semplan check`: prerequisite verdicts for planned courses.

use std::path::Path;

use anyhow::Result;

use semplan_core::catalog::Catalog;
use semplan_core::plan::PlanStore;
use semplan_core::requirement::{EvaluationResult, Verdict, check_course};
use semplan_core::CourseStatus;

use crate::session::PlanSession;

struct CheckRow {
    code: String,
    outcome: Option<EvaluationResult>,
    warning: Option<String>,
}

pub fn run_check(session: &PlanSession, catalog_path: &Path, codes: &[String]) -> Result<()> {
    let catalog = Catalog::load(catalog_path)?;
    let rows = session
        .coordinator()
        .with_store(|store| check_rows(store, &catalog, codes))?;

    if rows.is_empty() {
        println!("Nothing to check: no unfinished courses in the plan.");
        return Ok(());
    }

    let code_w = rows.iter().map(|r| r.code.len()).max().unwrap_or(4).max(4);
    let mut blocked = 0;
    for row in &rows {
        let line = match &row.outcome {
            Some(result) => {
                if result.is_blocked() {
                    blocked += 1;
                }
                describe(result)
            }
            None => "not in catalog".to_owned(),
        };
        println!("{:<code_w$}  {line}", row.code);
        if let Some(warning) = &row.warning {
            println!("{:<code_w$}  warning: {warning}", "");
        }
    }

    if blocked > 0 {
        println!();
        println!("{blocked} course(s) blocked.");
    }
    Ok(())
}

/// Evaluate `codes`, or every course not yet completed when `codes` is empty.
fn check_rows(store: &PlanStore, catalog: &Catalog, codes: &[String]) -> Vec<CheckRow> {
    let codes: Vec<String> = if codes.is_empty() {
        store
            .all_courses()
            .iter()
            .filter(|c| c.status != CourseStatus::Completed)
            .map(|c| c.code.clone())
            .collect()
    } else {
        codes.to_vec()
    };

    codes
        .into_iter()
        .map(|code| CheckRow {
            outcome: check_course(store, catalog, &code),
            warning: offering_warning(store, catalog, &code),
            code,
        })
        .collect()
}

/// One-line summary of an evaluation.
pub fn describe(result: &EvaluationResult) -> String {
    match result.verdict() {
        Verdict::Satisfied => "ready".to_owned(),
        Verdict::Pending => format!(
            "pending (relies on {})",
            result.soft_satisfied_via.join(", ")
        ),
        Verdict::Blocked => format!("blocked (missing {})", result.missing.join(", ")),
    }
}

/// Warn when a planned course sits in a season the catalog does not offer
/// it in.
fn offering_warning(store: &PlanStore, catalog: &Catalog, code: &str) -> Option<String> {
    let course = store.find_course(code)?;
    let semester = store.semester(course.semester_id)?;
    let entry = catalog.get(code)?;
    if entry.is_offered_in(semester.term.season) {
        return None;
    }
    Some(format!(
        "not offered in {} (planned for {})",
        semester.term.season.label(),
        semester.term
    ))
}
