//! Catalog TOML parser with validation.
//!
//! ```toml
//! [[courses]]
//! code = "CS 1331"
//! title = "Intro to Object-Oriented Programming"
//! credits = 3
//! offerings = ["fall", "spring"]
//! prerequisites = { all = [{ course = "CS 1301", min_grade = "C" }] }
//! ```
//!
//! Duplicate codes are an error, as is a prerequisite node with unknown
//! keys or more than one of `course`, `all`, `any`. An empty `all` or `any`
//! is logged and the course is treated as having no prerequisites.

use serde::Deserialize;
use thiserror::Error;

use super::{Catalog, CatalogEntry};

/// Errors that can occur during catalog parsing.
#[derive(Debug, Error)]
pub enum CatalogParseError {
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("duplicate course code: {0:?}")]
    DuplicateCode(String),

    #[error("catalog must contain at least one course")]
    NoCourses,
}

#[derive(Deserialize)]
struct CatalogToml {
    #[serde(default)]
    courses: Vec<CatalogEntry>,
}

/// Parse and validate a catalog TOML string.
pub fn parse_catalog_toml(content: &str) -> Result<Catalog, CatalogParseError> {
    let parsed: CatalogToml = toml::from_str(content)?;
    if parsed.courses.is_empty() {
        return Err(CatalogParseError::NoCourses);
    }

    let mut catalog = Catalog::default();
    for mut entry in parsed.courses {
        let malformed = entry.prerequisites.as_ref().and_then(|tree| tree.validate().err());
        if let Some(e) = malformed {
            tracing::warn!(
                code = %entry.code,
                error = %e,
                "malformed prerequisite tree; treating course as having none"
            );
            entry.prerequisites = None;
        }

        let code = entry.code.clone();
        if catalog.insert(entry).is_some() {
            return Err(CatalogParseError::DuplicateCode(code));
        }
    }
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirement::RequirementNode;
    use crate::{Grade, Season};

    const SAMPLE: &str = r#"
[[courses]]
code = "CS 1301"
title = "Intro to Computing"
credits = 3

[[courses]]
code = "CS 1331"
title = "Intro to Object-Oriented Programming"
credits = 3
offerings = ["fall", "spring"]
prerequisites = { all = [{ course = "CS 1301", min_grade = "C" }] }
"#;

    #[test]
    fn parse_valid_catalog() {
        let catalog = parse_catalog_toml(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 2);

        let oop = catalog.get("CS 1331").unwrap();
        assert_eq!(oop.offerings, vec![Season::Fall, Season::Spring]);
        assert_eq!(
            oop.prerequisites,
            Some(
                RequirementNode::all(vec![RequirementNode::course_with_min("CS 1301", Grade::C)])
                    .unwrap()
            )
        );
        assert!(catalog.get("CS 1301").unwrap().prerequisites.is_none());
    }

    #[test]
    fn duplicate_code_is_rejected() {
        let toml = r#"
[[courses]]
code = "CS 1301"
title = "A"
credits = 3

[[courses]]
code = "CS 1301"
title = "B"
credits = 3
"#;
        let err = parse_catalog_toml(toml).unwrap_err();
        assert!(matches!(err, CatalogParseError::DuplicateCode(ref c) if c == "CS 1301"));
    }

    #[test]
    fn empty_catalog_is_rejected() {
        let err = parse_catalog_toml("").unwrap_err();
        assert!(matches!(err, CatalogParseError::NoCourses));
    }

    #[test]
    fn malformed_tree_is_normalized_away() {
        let toml = r#"
[[courses]]
code = "CS 2110"
title = "Computer Organization"
credits = 4
prerequisites = { any = [] }
"#;
        let catalog = parse_catalog_toml(toml).unwrap();
        assert!(catalog.get("CS 2110").unwrap().prerequisites.is_none());
    }

    #[test]
    fn node_mixing_course_and_branches_is_rejected() {
        let toml = r#"
[[courses]]
code = "CS 2200"
title = "Computer Systems"
credits = 4
prerequisites = { course = "CS 2110", any = [{ course = "CS 2340" }] }
"#;
        let err = parse_catalog_toml(toml).unwrap_err();
        assert!(matches!(err, CatalogParseError::TomlError(_)));
    }

    #[test]
    fn invalid_toml_is_reported() {
        let err = parse_catalog_toml("[[courses]\ncode = ").unwrap_err();
        assert!(matches!(err, CatalogParseError::TomlError(_)));
    }
}
