//! Prerequisite requirement trees and their evaluation.
//!
//! A tree is a boolean expression over course codes:
//!
//! ```text
//! all
//!  ├── course "CS 1331" (min C)
//!  └── any
//!       ├── course "MATH 1551"
//!       └── course "MATH 1712"
//! ```
//!
//! An absent tree (`None`) means "no prerequisites". `all`/`any` nodes must
//! have at least one child; [`RequirementNode::all`] and
//! [`RequirementNode::any`] refuse to build empty ones, and trees that
//! arrive through deserialization are checked with
//! [`RequirementNode::validate`].

pub mod check;
pub mod evaluator;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::CourseCode;
use crate::grade::Grade;

pub use check::check_course;
pub use evaluator::{Completion, CompletedCourses, EvaluationResult, Verdict, evaluate};

/// One node of a prerequisite tree.
///
/// Serialized shapes: `{ course = "CS 1301", min_grade = "C" }`,
/// `{ all = [...] }`, `{ any = [...] }`. A table with unknown keys or with
/// more than one of `course`, `all`, `any` does not deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequirementNode {
    /// A single required course, optionally with a minimum grade.
    Leaf {
        course: CourseCode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_grade: Option<Grade>,
    },
    /// Every child must be met.
    And {
        #[serde(rename = "all")]
        children: Vec<RequirementNode>,
    },
    /// At least one child must be met.
    Or {
        #[serde(rename = "any")]
        children: Vec<RequirementNode>,
    },
}

/// Wire form of a node: every key optional, unknown keys refused.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNode {
    course: Option<CourseCode>,
    min_grade: Option<Grade>,
    all: Option<Vec<RequirementNode>>,
    any: Option<Vec<RequirementNode>>,
}

impl RawNode {
    fn into_node(self) -> Result<RequirementNode, &'static str> {
        match (self.course, self.min_grade, self.all, self.any) {
            (Some(course), min_grade, None, None) => Ok(RequirementNode::Leaf { course, min_grade }),
            (None, None, Some(children), None) => Ok(RequirementNode::And { children }),
            (None, None, None, Some(children)) => Ok(RequirementNode::Or { children }),
            (None, Some(_), None, None) => Err("`min_grade` requires `course`"),
            (None, None, None, None) => Err("expected one of `course`, `all`, `any`"),
            _ => Err("a requirement node takes exactly one of `course`, `all`, `any`"),
        }
    }
}

impl<'de> Deserialize<'de> for RequirementNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        RawNode::deserialize(deserializer)?
            .into_node()
            .map_err(serde::de::Error::custom)
    }
}

/// A node violates the "at least one child" rule.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed requirement tree: empty {kind} node at {path}")]
pub struct MalformedRequirement {
    /// `"all"` or `"any"`.
    pub kind: &'static str,
    /// Child-index path from the root, e.g. `root/1/0`.
    pub path: String,
}

impl RequirementNode {
    /// A leaf with no grade requirement.
    pub fn course(code: impl Into<CourseCode>) -> Self {
        Self::Leaf {
            course: code.into(),
            min_grade: None,
        }
    }

    /// A leaf that must be completed with at least `min_grade`.
    pub fn course_with_min(code: impl Into<CourseCode>, min_grade: Grade) -> Self {
        Self::Leaf {
            course: code.into(),
            min_grade: Some(min_grade),
        }
    }

    /// An `all` node. Fails on an empty child list.
    pub fn all(children: Vec<RequirementNode>) -> Result<Self, MalformedRequirement> {
        if children.is_empty() {
            return Err(MalformedRequirement {
                kind: "all",
                path: "root".to_owned(),
            });
        }
        Ok(Self::And { children })
    }

    /// An `any` node. Fails on an empty child list.
    pub fn any(children: Vec<RequirementNode>) -> Result<Self, MalformedRequirement> {
        if children.is_empty() {
            return Err(MalformedRequirement {
                kind: "any",
                path: "root".to_owned(),
            });
        }
        Ok(Self::Or { children })
    }

    /// Check the child-count invariant over the whole tree.
    pub fn validate(&self) -> Result<(), MalformedRequirement> {
        self.validate_at("root")
    }

    fn validate_at(&self, path: &str) -> Result<(), MalformedRequirement> {
        let (kind, children) = match self {
            Self::Leaf { .. } => return Ok(()),
            Self::And { children } => ("all", children),
            Self::Or { children } => ("any", children),
        };

        if children.is_empty() {
            return Err(MalformedRequirement {
                kind,
                path: path.to_owned(),
            });
        }

        for (i, child) in children.iter().enumerate() {
            child.validate_at(&format!("{path}/{i}"))?;
        }
        Ok(())
    }

    /// Every course code referenced anywhere in the tree, in source order,
    /// without duplicates.
    pub fn referenced_courses(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        self.collect_courses(&mut out);
        out
    }

    fn collect_courses<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Leaf { course, .. } => {
                if !out.contains(&course.as_str()) {
                    out.push(course);
                }
            }
            Self::And { children } | Self::Or { children } => {
                for child in children {
                    child.collect_courses(out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_all_and_any_are_rejected() {
        let err = RequirementNode::all(vec![]).unwrap_err();
        assert_eq!(err.kind, "all");
        let err = RequirementNode::any(vec![]).unwrap_err();
        assert_eq!(err.kind, "any");
    }

    #[test]
    fn validate_reports_nested_path() {
        let tree = RequirementNode::And {
            children: vec![
                RequirementNode::course("CS 1301"),
                RequirementNode::Or { children: vec![] },
            ],
        };
        let err = tree.validate().unwrap_err();
        assert_eq!(err.kind, "any");
        assert_eq!(err.path, "root/1");
    }

    #[test]
    fn deserialize_toml_shapes() {
        #[derive(Deserialize)]
        struct Wrapper {
            prerequisites: RequirementNode,
        }

        let toml_str = r#"
prerequisites = { all = [
    { course = "CS 1331", min_grade = "C" },
    { any = [{ course = "MATH 1551" }, { course = "MATH 1712" }] },
] }
"#;
        let w: Wrapper = toml::from_str(toml_str).expect("should parse");
        let expected = RequirementNode::all(vec![
            RequirementNode::course_with_min("CS 1331", Grade::C),
            RequirementNode::any(vec![
                RequirementNode::course("MATH 1551"),
                RequirementNode::course("MATH 1712"),
            ])
            .unwrap(),
        ])
        .unwrap();
        assert_eq!(w.prerequisites, expected);
        assert!(w.prerequisites.validate().is_ok());
    }

    #[test]
    fn mixed_or_unknown_keys_are_rejected() {
        #[derive(Debug, Deserialize)]
        struct Wrapper {
            #[allow(dead_code)]
            prerequisites: RequirementNode,
        }

        for bad in [
            r#"prerequisites = { course = "A", any = [{ course = "B" }] }"#,
            r#"prerequisites = { all = [{ course = "A" }], min_grade = "C" }"#,
            r#"prerequisites = { course = "A", min_grde = "C" }"#,
            r#"prerequisites = { min_grade = "C" }"#,
            r#"prerequisites = {}"#,
        ] {
            assert!(toml::from_str::<Wrapper>(bad).is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn serialized_tree_reads_back() {
        let tree = RequirementNode::any(vec![
            RequirementNode::course_with_min("CS 1331", Grade::C),
            RequirementNode::all(vec![RequirementNode::course("MATH 1551")]).unwrap(),
        ])
        .unwrap();
        let json = serde_json::to_string(&tree).unwrap();
        assert_eq!(serde_json::from_str::<RequirementNode>(&json).unwrap(), tree);
    }

    #[test]
    fn serialize_omits_absent_min_grade() {
        let json = serde_json::to_string(&RequirementNode::course("CS 1301")).unwrap();
        assert_eq!(json, r#"{"course":"CS 1301"}"#);
    }

    #[test]
    fn referenced_courses_dedups_in_order() {
        let tree = RequirementNode::any(vec![
            RequirementNode::course("A"),
            RequirementNode::all(vec![RequirementNode::course("B"), RequirementNode::course("A")])
                .unwrap(),
        ])
        .unwrap();
        assert_eq!(tree.referenced_courses(), vec!["A", "B"]);
    }
}
