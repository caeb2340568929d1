//! Configuration file management for semplan.
//!
//! Provides a TOML-based config file at `~/.config/semplan/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use semplan_core::sync::{DEFAULT_DEBOUNCE, SyncConfig};
use semplan_db::config::DbConfig;

/// Env var overriding the local cache directory.
pub const CACHE_DIR_ENV: &str = "SEMPLAN_CACHE_DIR";

/// Env var overriding the sync quiet period, in milliseconds.
pub const DEBOUNCE_ENV: &str = "SEMPLAN_SYNC_DEBOUNCE_MS";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub cache: CacheSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncSection {
    pub debounce_ms: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            debounce_ms: u64::try_from(DEFAULT_DEBOUNCE.as_millis()).unwrap_or(750),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CacheSection {
    /// Directory for per-user plan cache files. Unset means the platform
    /// cache directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the semplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/semplan` or `~/.config/semplan`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("semplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("semplan")
}

/// Return the path to the semplan config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default location of the plan cache: the platform cache dir, or a
/// `cache` folder under the config dir when there is none.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("semplan"))
        .unwrap_or_else(|| config_dir().join("cache"))
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file at `path`.
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    load_config_from(&config_path())
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct SemplanConfig {
    pub db_config: DbConfig,
    pub sync_config: SyncConfig,
    pub cache_dir: PathBuf,
}

impl SemplanConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `SEMPLAN_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - Cache dir: `cli_cache_dir` > `SEMPLAN_CACHE_DIR` > `cache.dir` > [`default_cache_dir`]
    /// - Debounce: `SEMPLAN_SYNC_DEBOUNCE_MS` > `sync.debounce_ms` > 750 ms
    pub fn resolve(cli_db_url: Option<&str>, cli_cache_dir: Option<&Path>) -> Result<Self> {
        let file_config = load_config().ok();

        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Ok(url) = std::env::var(DbConfig::ENV_VAR) {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };

        let cache_dir = if let Some(dir) = cli_cache_dir {
            dir.to_path_buf()
        } else if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
            PathBuf::from(dir)
        } else if let Some(dir) = file_config.as_ref().and_then(|cfg| cfg.cache.dir.clone()) {
            dir
        } else {
            default_cache_dir()
        };

        let debounce = if let Ok(ms) = std::env::var(DEBOUNCE_ENV) {
            let ms: u64 = ms
                .parse()
                .with_context(|| format!("{DEBOUNCE_ENV} must be a whole number of milliseconds"))?;
            Duration::from_millis(ms)
        } else if let Some(ref cfg) = file_config {
            Duration::from_millis(cfg.sync.debounce_ms)
        } else {
            DEFAULT_DEBOUNCE
        };

        Ok(Self {
            db_config: DbConfig::new(db_url),
            sync_config: SyncConfig { debounce },
            cache_dir,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    /// Point config lookup at an empty temp dir for the duration of `f`.
    fn with_empty_config_home<R>(f: impl FnOnce(&Path) -> R) -> R {
        let tmp = tempfile::TempDir::new().unwrap();
        let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let result = f(tmp.path());

        match orig_xdg {
            Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }
        result
    }

    #[test]
    fn config_file_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        let original = ConfigFile {
            database: DatabaseSection {
                url: "postgresql://testhost:5432/testdb".to_string(),
            },
            sync: SyncSection { debounce_ms: 200 },
            cache: CacheSection {
                dir: Some(PathBuf::from("/var/cache/semplan")),
            },
        };
        std::fs::write(&path, toml::to_string_pretty(&original).unwrap()).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.database.url, original.database.url);
        assert_eq!(loaded.sync.debounce_ms, 200);
        assert_eq!(loaded.cache.dir, original.cache.dir);
    }

    #[test]
    fn missing_sections_take_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[database]\nurl = \"postgresql://h:1/db\"\n").unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.sync.debounce_ms, 750);
        assert!(loaded.cache.dir.is_none());
    }

    #[test]
    fn resolve_with_cli_flags_overrides_all() {
        let _lock = lock_env();
        unsafe { std::env::set_var("SEMPLAN_DATABASE_URL", "postgresql://env:5432/envdb") };
        unsafe { std::env::set_var(CACHE_DIR_ENV, "/env/cache") };

        let config = SemplanConfig::resolve(
            Some("postgresql://cli:5432/clidb"),
            Some(Path::new("/cli/cache")),
        )
        .unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://cli:5432/clidb");
        assert_eq!(config.cache_dir, PathBuf::from("/cli/cache"));

        unsafe { std::env::remove_var("SEMPLAN_DATABASE_URL") };
        unsafe { std::env::remove_var(CACHE_DIR_ENV) };
    }

    #[test]
    fn resolve_with_env_overrides_config_file() {
        let _lock = lock_env();
        with_empty_config_home(|home| {
            let dir = home.join("semplan");
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(
                dir.join("config.toml"),
                "[database]\nurl = \"postgresql://file:5432/filedb\"\n\n[sync]\ndebounce_ms = 100\n",
            )
            .unwrap();

            unsafe { std::env::set_var("SEMPLAN_DATABASE_URL", "postgresql://env:5432/envdb") };
            unsafe { std::env::remove_var(DEBOUNCE_ENV) };
            let config = SemplanConfig::resolve(None, None).unwrap();
            unsafe { std::env::remove_var("SEMPLAN_DATABASE_URL") };

            assert_eq!(config.db_config.database_url, "postgresql://env:5432/envdb");
            assert_eq!(config.sync_config.debounce, Duration::from_millis(100));
        });
    }

    #[test]
    fn resolve_defaults_when_nothing_set() {
        let _lock = lock_env();
        with_empty_config_home(|_| {
            unsafe { std::env::remove_var("SEMPLAN_DATABASE_URL") };
            unsafe { std::env::remove_var(CACHE_DIR_ENV) };
            unsafe { std::env::remove_var(DEBOUNCE_ENV) };

            let config = SemplanConfig::resolve(None, None).unwrap();
            assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);
            assert_eq!(config.sync_config.debounce, DEFAULT_DEBOUNCE);
            assert_eq!(config.cache_dir, default_cache_dir());
        });
    }

    #[test]
    fn resolve_rejects_bad_debounce() {
        let _lock = lock_env();
        unsafe { std::env::set_var(DEBOUNCE_ENV, "soon") };
        let result = SemplanConfig::resolve(Some("postgresql://h:1/db"), None);
        unsafe { std::env::remove_var(DEBOUNCE_ENV) };

        let msg = result.unwrap_err().to_string();
        assert!(msg.contains(DEBOUNCE_ENV), "unexpected error: {msg}");
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let _lock = lock_env();
        let path = config_path();
        assert!(
            path.ends_with("semplan/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
