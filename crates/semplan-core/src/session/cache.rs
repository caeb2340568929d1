//! Local plan cache, one file per user.
//!
//! The cache holds the last committed plan so a session can start while the
//! remote service is unreachable. Files are keyed by user, and every load
//! re-checks the owner recorded inside the file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::plan::{PlanState, Semester};

use super::UserId;

/// Format version written into every cache file.
pub const CACHE_VERSION: u32 = 1;

const FILE_PREFIX: &str = "plan-";
const FILE_SUFFIX: &str = ".json";

/// Persistent per-user cache of committed plan state.
pub trait LocalCache: Send + Sync {
    /// The cached semesters for `user`, or `None` when nothing usable is
    /// cached.
    fn load(&self, user: &UserId) -> Result<Option<Vec<Semester>>>;

    fn save(&self, user: &UserId, state: &PlanState) -> Result<()>;

    /// Remove `user`'s cache entry, if any.
    fn purge(&self, user: &UserId) -> Result<()>;

    /// Remove every entry that does not belong to `keep`. Returns the
    /// number of entries removed.
    fn purge_all_except(&self, keep: &UserId) -> Result<usize>;
}

#[derive(Serialize)]
struct CacheFileOut<'a> {
    version: u32,
    owner: &'a UserId,
    semesters: Vec<&'a Semester>,
}

#[derive(Deserialize)]
struct CacheFileIn {
    version: u32,
    owner: UserId,
    semesters: Vec<Semester>,
}

/// [`LocalCache`] storing `plan-<user>.json` files in one directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of `user`'s cache file.
    pub fn path_for(&self, user: &UserId) -> PathBuf {
        self.dir
            .join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", escape_user(user)))
    }
}

/// File-name-safe, injective encoding of a user id: ASCII alphanumerics
/// and `-` pass through, every other byte becomes `_XX`.
fn escape_user(user: &UserId) -> String {
    let mut out = String::with_capacity(user.as_str().len());
    for b in user.as_str().bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("_{b:02X}"));
        }
    }
    out
}

impl LocalCache for FileCache {
    fn load(&self, user: &UserId) -> Result<Option<Vec<Semester>>> {
        let path = self.path_for(user);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)
            .with_context(|| format!("failed to read cache file {}", path.display()))?;
        let file: CacheFileIn = match serde_json::from_slice(&bytes) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "discarding unreadable cache file");
                return Ok(None);
            }
        };

        if file.version != CACHE_VERSION {
            tracing::warn!(
                path = %path.display(),
                version = file.version,
                "discarding cache file with unsupported version"
            );
            return Ok(None);
        }
        if &file.owner != user {
            tracing::warn!(
                path = %path.display(),
                owner = %file.owner,
                user = %user,
                "cache file belongs to another user; ignoring"
            );
            return Ok(None);
        }

        Ok(Some(file.semesters))
    }

    fn save(&self, user: &UserId, state: &PlanState) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create cache directory {}", self.dir.display()))?;

        let file = CacheFileOut {
            version: CACHE_VERSION,
            owner: user,
            semesters: state.sorted(),
        };
        let json = serde_json::to_vec_pretty(&file).context("failed to serialize plan cache")?;

        let path = self.path_for(user);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .with_context(|| format!("failed to write cache file {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("failed to replace cache file {}", path.display()))?;

        tracing::debug!(user = %user, path = %path.display(), "plan cache saved");
        Ok(())
    }

    fn purge(&self, user: &UserId) -> Result<()> {
        let path = self.path_for(user);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(user = %user, "purged local plan cache");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("failed to remove cache file {}", path.display())),
        }
    }

    fn purge_all_except(&self, keep: &UserId) -> Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to list cache directory {}", self.dir.display())
                });
            }
        };

        let keep_path = self.path_for(keep);
        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with(FILE_PREFIX) || !name.ends_with(FILE_SUFFIX) || path == keep_path
            {
                continue;
            }
            fs::remove_file(&path)
                .with_context(|| format!("failed to remove cache file {}", path.display()))?;
            removed += 1;
        }

        if removed > 0 {
            tracing::info!(keep = %keep, removed, "purged cache files of other users");
        }
        Ok(removed)
    }
}
