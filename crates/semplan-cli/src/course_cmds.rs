//! CLI handlers for `semplan course` subcommands.
//!
//! Implements:
//! - `semplan course add <term> <code>`         -- add a course to a semester
//! - `semplan course remove <code>`             -- remove a course
//! - `semplan course move <code> <term>`        -- move a course between semesters
//! - `semplan course status <code> <status>`    -- record status and grade

use std::path::PathBuf;

use anyhow::{Context, Result};
use uuid::Uuid;

use semplan_core::catalog::Catalog;
use semplan_core::plan::{PlanMutation, PlannedCourse};
use semplan_core::requirement::check_course;
use semplan_core::term::Term;
use semplan_core::{CourseStatus, Grade};

use crate::CourseCommands;
use crate::check_cmd;
use crate::session::PlanSession;

/// Dispatch a `CourseCommands` variant to the appropriate handler.
pub fn run_course_command(command: CourseCommands, session: &PlanSession) -> Result<()> {
    match command {
        CourseCommands::Add {
            term,
            code,
            title,
            credits,
            catalog,
        } => cmd_add(session, &term, &code, title, credits, catalog),
        CourseCommands::Remove { code } => cmd_remove(session, &code),
        CourseCommands::Move { code, to } => cmd_move(session, &code, &to),
        CourseCommands::Status {
            code,
            status,
            grade,
        } => cmd_status(session, &code, &status, grade.as_deref()),
    }
}

// -----------------------------------------------------------------------
// Lookups
// -----------------------------------------------------------------------

fn parse_term(term: &str) -> Result<Term> {
    term.parse()
        .with_context(|| format!("invalid term: {term:?}"))
}

/// The semester planned for `term`.
fn semester_for(session: &PlanSession, term: Term) -> Result<Uuid> {
    session
        .coordinator()
        .with_store(|store| store.semester_for_term(term).map(|s| s.id))?
        .with_context(|| {
            format!("no semester planned for {term}; use `semplan plan generate` first")
        })
}

/// `(course_id, semester_id)` of the plan entry for `code`.
fn locate(session: &PlanSession, code: &str) -> Result<(Uuid, Uuid)> {
    session
        .coordinator()
        .with_store(|store| store.find_course(code).map(|c| (c.id, c.semester_id)))?
        .with_context(|| format!("{code} is not in the plan"))
}

// -----------------------------------------------------------------------
// semplan course add
// -----------------------------------------------------------------------

fn cmd_add(
    session: &PlanSession,
    term: &str,
    code: &str,
    title: Option<String>,
    credits: Option<u32>,
    catalog_path: Option<PathBuf>,
) -> Result<()> {
    let term = parse_term(term)?;
    let catalog = catalog_path.as_deref().map(Catalog::load).transpose()?;
    let entry = catalog.as_ref().and_then(|c| c.get(code));
    if catalog.is_some() && entry.is_none() {
        eprintln!("warning: {code} is not in the catalog");
    }

    let credits = credits
        .or(entry.map(|e| e.credits))
        .with_context(|| format!("--credits is required for {code}"))?;
    let title = title
        .or_else(|| entry.map(|e| e.title.clone()))
        .unwrap_or_else(|| code.to_owned());
    if let Some(entry) = entry {
        if !entry.is_offered_in(term.season) {
            eprintln!(
                "warning: {code} is not offered in {}",
                term.season.label()
            );
        }
    }

    let semester_id = semester_for(session, term)?;
    session.apply(PlanMutation::AddCourse {
        semester_id,
        course: PlannedCourse::new(code, title, credits),
    })?;
    println!("Added {code} to {term}.");

    if let Some(catalog) = &catalog {
        let outcome = session
            .coordinator()
            .with_store(|store| check_course(store, catalog, code))?;
        if let Some(result) = outcome {
            println!("  prerequisites: {}", check_cmd::describe(&result));
        }
    }
    Ok(())
}

// -----------------------------------------------------------------------
// semplan course remove / move / status
// -----------------------------------------------------------------------

fn cmd_remove(session: &PlanSession, code: &str) -> Result<()> {
    let (course_id, semester_id) = locate(session, code)?;
    session.apply(PlanMutation::RemoveCourse {
        semester_id,
        course_id,
    })?;
    println!("Removed {code}.");
    Ok(())
}

fn cmd_move(session: &PlanSession, code: &str, to: &str) -> Result<()> {
    let term = parse_term(to)?;
    let (course_id, from) = locate(session, code)?;
    let to = semester_for(session, term)?;
    if from == to {
        println!("{code} is already in {term}.");
        return Ok(());
    }
    session.apply(PlanMutation::MoveCourse {
        course_id,
        from,
        to,
    })?;
    println!("Moved {code} to {term}.");
    Ok(())
}

fn cmd_status(session: &PlanSession, code: &str, status: &str, grade: Option<&str>) -> Result<()> {
    let status: CourseStatus = status
        .parse()
        .with_context(|| format!("invalid status {status:?}"))?;
    let grade: Option<Grade> = grade
        .map(|g| g.parse().with_context(|| format!("invalid grade {g:?}")))
        .transpose()?;

    let (course_id, semester_id) = locate(session, code)?;
    session.apply(PlanMutation::UpdateCourseStatus {
        semester_id,
        course_id,
        status,
        grade,
    })?;
    match grade {
        Some(grade) => println!("{code}: {status} ({grade})."),
        None => println!("{code}: {status}."),
    }
    Ok(())
}
