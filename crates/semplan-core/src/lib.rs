//! Core of semplan: the prerequisite evaluator, the user-scoped plan store,
//! and the optimistic sync coordinator that keeps the store in step with a
//! remote persistence service.

pub mod catalog;
pub mod grade;
pub mod plan;
pub mod requirement;
pub mod session;
pub mod sync;
pub mod term;

pub use semplan_db::models::{CourseStatus, Grade, Season};

/// Course identifier in canonical `"DEPT NUMBER"` form. Compared by exact
/// string equality.
pub type CourseCode = String;
