//! CLI handlers for `semplan plan` subcommands.
//!
//! Implements:
//! - `semplan plan generate <start> <graduation> [--summer]` -- add empty semesters
//! - `semplan plan show`                                     -- print the plan

use anyhow::{Context, Result};

use semplan_core::plan::{CreditLoad, PlanMutation, PlanStore, Semester};
use semplan_core::term::{Term, generate_terms};

use crate::PlanCommands;
use crate::session::PlanSession;

/// Dispatch a `PlanCommands` variant to the appropriate handler.
pub fn run_plan_command(command: PlanCommands, session: &PlanSession) -> Result<()> {
    match command {
        PlanCommands::Generate {
            start,
            graduation,
            summer,
        } => cmd_generate(session, &start, &graduation, summer),
        PlanCommands::Show => session
            .coordinator()
            .with_store(|store| print!("{}", render_plan(store)))
            .map_err(Into::into),
    }
}

// -----------------------------------------------------------------------
// semplan plan generate
// -----------------------------------------------------------------------

fn cmd_generate(session: &PlanSession, start: &str, graduation: &str, summer: bool) -> Result<()> {
    let start: Term = start
        .parse()
        .with_context(|| format!("invalid start term: {start:?}"))?;
    let graduation: Term = graduation
        .parse()
        .with_context(|| format!("invalid graduation term: {graduation:?}"))?;

    let terms = generate_terms(start, graduation, summer);
    if terms.is_empty() {
        anyhow::bail!("graduation term {graduation} precedes start term {start}");
    }

    let existing = session
        .coordinator()
        .with_store(|store| store.semesters().iter().map(|s| s.term).collect::<Vec<_>>())?;

    let mut added = 0;
    for term in terms.iter().filter(|t| !existing.contains(t)) {
        session.apply(PlanMutation::add_semester(*term))?;
        added += 1;
    }

    println!(
        "{added} semester(s) added ({} already planned) from {start} through {graduation}.",
        terms.len() - added
    );
    Ok(())
}

// -----------------------------------------------------------------------
// semplan plan show
// -----------------------------------------------------------------------

fn load_label(load: CreditLoad) -> &'static str {
    match load {
        CreditLoad::Light => "  [light]",
        CreditLoad::Normal => "",
        CreditLoad::Overloaded => "  [overloaded]",
    }
}

fn render_semester(out: &mut String, semester: &Semester) {
    out.push_str(&format!(
        "{}  ({} credits, GPA {:.2}){}\n",
        semester.term,
        semester.total_credits(),
        semester.gpa(),
        load_label(semester.credit_load()),
    ));

    if semester.courses().is_empty() {
        out.push_str("  (no courses)\n");
        return;
    }

    let code_w = semester
        .courses()
        .iter()
        .map(|c| c.code.len())
        .max()
        .unwrap_or(4)
        .max(4);
    for course in semester.courses() {
        let grade = course.grade.map_or_else(|| "-".to_owned(), |g| g.to_string());
        out.push_str(&format!(
            "  {:<code_w$}  {:>2} cr  {:<11}  {:<2}  {}\n",
            course.code,
            course.credits,
            course.status.to_string(),
            grade,
            course.title,
        ));
    }
}

/// Human-readable plan listing, semesters in chronological order.
pub fn render_plan(store: &PlanStore) -> String {
    let semesters = store.semesters();
    if semesters.is_empty() {
        return "No semesters planned. Use `semplan plan generate` to create some.\n".to_owned();
    }

    let mut out = String::new();
    for semester in semesters {
        render_semester(&mut out, semester);
        out.push('\n');
    }
    out.push_str(&format!(
        "Overall: {} credits, GPA {:.2}\n",
        store.total_credits(),
        store.calculate_gpa()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use semplan_core::plan::PlannedCourse;
    use semplan_core::session::UserId;
    use semplan_core::{CourseStatus, Grade, Season};

    #[test]
    fn empty_plan_suggests_generate() {
        let store = PlanStore::new(UserId::new("alice"));
        assert!(render_plan(&store).contains("semplan plan generate"));
    }

    #[test]
    fn render_lists_semesters_in_order_with_flags() {
        let mut store = PlanStore::new(UserId::new("alice"));
        store.add_semester(Term::new(2025, Season::Spring)).unwrap();
        let fall = store.add_semester(Term::new(2024, Season::Fall)).unwrap();
        store
            .add_course(
                fall,
                PlannedCourse::new("CS 1301", "Intro to Computing", 3)
                    .with_status(CourseStatus::Completed)
                    .with_grade(Grade::A),
            )
            .unwrap();

        let text = render_plan(&store);
        let fall_at = text.find("Fall 2024").unwrap();
        let spring_at = text.find("Spring 2025").unwrap();
        assert!(fall_at < spring_at);
        assert!(text.contains("[light]"));
        assert!(text.contains("CS 1301"));
        assert!(text.contains("GPA 4.00"));
        assert!(text.contains("(no courses)"));
    }
}
