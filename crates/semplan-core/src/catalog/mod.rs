//! Course catalog: titles, credits, offerings and prerequisite trees.

pub mod parser;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::requirement::RequirementNode;
use crate::{CourseCode, Season};

pub use parser::{CatalogParseError, parse_catalog_toml};

/// One course as described by the catalog feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub code: CourseCode,
    pub title: String,
    pub credits: u32,
    /// `None` means no prerequisites.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerequisites: Option<RequirementNode>,
    /// Seasons the course is taught in. Empty means every season.
    #[serde(default)]
    pub offerings: Vec<Season>,
}

impl CatalogEntry {
    pub fn is_offered_in(&self, season: Season) -> bool {
        self.offerings.is_empty() || self.offerings.contains(&season)
    }
}

/// Catalog entries keyed by course code.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: BTreeMap<CourseCode, CatalogEntry>,
}

impl Catalog {
    /// Read and parse a catalog TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let catalog = parse_catalog_toml(&content)
            .with_context(|| format!("invalid catalog {}", path.display()))?;
        tracing::debug!(path = %path.display(), courses = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    pub fn get(&self, code: &str) -> Option<&CatalogEntry> {
        self.entries.get(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in code order.
    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub(crate) fn insert(&mut self, entry: CatalogEntry) -> Option<CatalogEntry> {
        self.entries.insert(entry.code.clone(), entry)
    }
}
