use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Academic season of a semester.
///
/// Variant order is chronological within a calendar year, so the derived
/// `Ord` sorts `Spring < Summer < Fall`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Fall,
}

impl Season {
    /// All seasons in chronological order.
    pub const ALL: [Season; 3] = [Season::Spring, Season::Summer, Season::Fall];

    /// Capitalized label used in human-facing term names ("Fall 2024").
    pub fn label(self) -> &'static str {
        match self {
            Self::Spring => "Spring",
            Self::Summer => "Summer",
            Self::Fall => "Fall",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Fall => "fall",
        };
        f.write_str(s)
    }
}

impl FromStr for Season {
    type Err = SeasonParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spring" => Ok(Self::Spring),
            "summer" => Ok(Self::Summer),
            "fall" => Ok(Self::Fall),
            _ => Err(SeasonParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Season`] string.
#[derive(Debug, Clone)]
pub struct SeasonParseError(pub String);

impl fmt::Display for SeasonParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid season: {:?}", self.0)
    }
}

impl std::error::Error for SeasonParseError {}

// ---------------------------------------------------------------------------

/// Status of a course entry within a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    Completed,
    #[serde(alias = "in-progress")]
    InProgress,
    Planned,
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::InProgress => "in_progress",
            Self::Planned => "planned",
        };
        f.write_str(s)
    }
}

impl FromStr for CourseStatus {
    type Err = CourseStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "in_progress" | "in-progress" => Ok(Self::InProgress),
            "planned" => Ok(Self::Planned),
            other => Err(CourseStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`CourseStatus`] string.
#[derive(Debug, Clone)]
pub struct CourseStatusParseError(pub String);

impl fmt::Display for CourseStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid course status: {:?}", self.0)
    }
}

impl std::error::Error for CourseStatusParseError {}

// ---------------------------------------------------------------------------

/// A letter grade recorded against a course.
///
/// `W` (withdrawal), `I` (incomplete), `IP` (in progress), `S`
/// (satisfactory) and `U` (unsatisfactory) are administrative grades that
/// carry no grade points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
    W,
    I,
    Ip,
    S,
    U,
}

impl Grade {
    /// Whether the grade is an administrative mark with no grade points.
    pub fn is_administrative(self) -> bool {
        matches!(self, Self::W | Self::I | Self::Ip | Self::S | Self::U)
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
            Self::W => "W",
            Self::I => "I",
            Self::Ip => "IP",
            Self::S => "S",
            Self::U => "U",
        };
        f.write_str(s)
    }
}

impl FromStr for Grade {
    type Err = GradeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            "F" => Ok(Self::F),
            "W" => Ok(Self::W),
            "I" => Ok(Self::I),
            "IP" => Ok(Self::Ip),
            "S" => Ok(Self::S),
            "U" => Ok(Self::U),
            _ => Err(GradeParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Grade`] string.
#[derive(Debug, Clone)]
pub struct GradeParseError(pub String);

impl fmt::Display for GradeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid grade: {:?}", self.0)
    }
}

impl std::error::Error for GradeParseError {}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A semester owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SemesterRow {
    pub id: Uuid,
    pub user_id: String,
    pub year: i32,
    pub season: Season,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A course assigned to a semester.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlannedCourseRow {
    pub id: Uuid,
    pub semester_id: Uuid,
    pub user_id: String,
    pub code: String,
    pub title: String,
    pub credits: i32,
    pub status: CourseStatus,
    pub grade: Option<Grade>,
    pub position: i32,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
