//! Grade scale: letter grade to grade points, and weighted GPA.
//!
//! Administrative grades (`W`, `I`, `IP`, `S`, `U`) carry no grade points.
//! They are excluded from both the quality-point numerator and the
//! credit-hour denominator of every GPA, so a withdrawal never drags an
//! average down.

pub use semplan_db::models::Grade;

/// Grade points for a letter grade, or `None` for administrative grades.
pub fn grade_points(grade: Grade) -> Option<f64> {
    match grade {
        Grade::A => Some(4.0),
        Grade::B => Some(3.0),
        Grade::C => Some(2.0),
        Grade::D => Some(1.0),
        Grade::F => Some(0.0),
        Grade::W | Grade::I | Grade::Ip | Grade::S | Grade::U => None,
    }
}

/// Whether `grade` satisfies a minimum-grade requirement of `minimum`.
///
/// Point-bearing minimums compare on the grade scale and are never met by an
/// administrative grade. An administrative minimum (e.g. `S` for a
/// pass/fail prerequisite) is met only by that exact grade.
pub fn meets_minimum(grade: Grade, minimum: Grade) -> bool {
    match (grade_points(grade), grade_points(minimum)) {
        (Some(have), Some(need)) => have >= need,
        (_, None) => grade == minimum,
        (None, Some(_)) => false,
    }
}

/// Credit-weighted GPA over `(grade, credits)` pairs.
///
/// Pairs with an administrative grade are skipped entirely. Returns `0.0`
/// when no point-bearing credits remain.
pub fn weighted_gpa<I>(graded: I) -> f64
where
    I: IntoIterator<Item = (Grade, u32)>,
{
    let mut quality_points = 0.0;
    let mut credit_hours = 0u64;

    for (grade, credits) in graded {
        if let Some(points) = grade_points(grade) {
            quality_points += points * f64::from(credits);
            credit_hours += u64::from(credits);
        }
    }

    if credit_hours == 0 {
        0.0
    } else {
        quality_points / credit_hours as f64
    }
}
