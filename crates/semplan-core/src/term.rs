//! Academic terms and start/graduation expansion.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Season;

/// A (season, year) pair such as "Fall 2024".
///
/// Field order makes the derived `Ord` chronological: year first, then
/// `Spring < Summer < Fall`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Term {
    pub year: i32,
    pub season: Season,
}

/// Errors from parsing a term string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TermParseError {
    #[error("expected \"<season> <year>\", got {0:?}")]
    Shape(String),

    #[error("invalid season {0:?} (expected spring, summer, or fall)")]
    Season(String),

    #[error("invalid year {0:?}")]
    Year(String),
}

impl Term {
    pub fn new(year: i32, season: Season) -> Self {
        Self { year, season }
    }

    /// The term that follows this one. Summer is skipped unless
    /// `include_summer` is set. `None` past the last representable year.
    pub fn next(self, include_summer: bool) -> Option<Self> {
        match self.season {
            Season::Spring if include_summer => Some(Self::new(self.year, Season::Summer)),
            Season::Spring | Season::Summer => Some(Self::new(self.year, Season::Fall)),
            Season::Fall => self
                .year
                .checked_add(1)
                .map(|year| Self::new(year, Season::Spring)),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.season.label(), self.year)
    }
}

impl FromStr for Term {
    type Err = TermParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(season), Some(year), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(TermParseError::Shape(s.to_owned()));
        };

        let season: Season = season
            .parse()
            .map_err(|_| TermParseError::Season(season.to_owned()))?;
        let year: i32 = year
            .parse()
            .map_err(|_| TermParseError::Year(year.to_owned()))?;

        Ok(Self { year, season })
    }
}

/// Expand a start/graduation pair into every term from `start` through
/// `graduation`, inclusive, in chronological order.
///
/// Summer terms are included only when `include_summer` is set, except that
/// an explicit summer `start` or `graduation` is always kept. Returns an
/// empty list when `graduation` precedes `start`.
pub fn generate_terms(start: Term, graduation: Term, include_summer: bool) -> Vec<Term> {
    let mut terms = Vec::new();
    let mut current = start;

    while current <= graduation {
        terms.push(current);
        match current.next(include_summer) {
            Some(next) => current = next,
            None => break,
        }
    }

    if !include_summer
        && graduation.season == Season::Summer
        && start <= graduation
        && terms.last() != Some(&graduation)
    {
        terms.push(graduation);
    }

    terms
}
