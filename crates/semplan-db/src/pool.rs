use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::info;

use crate::config::DbConfig;

/// Migrations embedded at compile time from `crates/semplan-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Tables reported by [`table_counts`], parents first.
pub const PLAN_TABLES: [&str; 2] = ["semesters", "planned_courses"];

/// Pool settings shared by every semplan connection.
fn pool_options(max_connections: u32, acquire_timeout: Duration) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
}

/// Create a connection pool and connect eagerly.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    pool_options(5, Duration::from_secs(10))
        .connect(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to database at {}", config.redacted_url()))
}

/// Create a pool that connects on first use.
///
/// Only the URL is validated here, so a session can start while the server
/// is down and fall back to the local plan cache; connection errors surface
/// on the first query.
pub fn create_lazy_pool(config: &DbConfig) -> Result<PgPool> {
    pool_options(5, Duration::from_secs(5))
        .connect_lazy(&config.database_url)
        .with_context(|| format!("invalid database URL {}", config.redacted_url()))
}

/// Run all pending embedded migrations against the pool.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;

    info!("migrations applied successfully");
    Ok(())
}

/// Whether `name` can be spliced into DDL unquoted.
fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Ensure the target database exists, creating it if necessary.
///
/// Connects to the `postgres` maintenance database and issues
/// `CREATE DATABASE <name>` when the target database is absent.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<()> {
    let db_name = config
        .database_name()
        .context("could not determine database name from URL")?;
    // CREATE DATABASE takes no bind parameters, so only plain identifiers
    // are let through to the formatted statement below.
    if !is_plain_identifier(db_name) {
        anyhow::bail!("database name {db_name:?} contains invalid characters");
    }

    let maintenance = DbConfig::new(config.maintenance_url());
    let maint_pool = pool_options(1, Duration::from_secs(10))
        .connect(&maintenance.database_url)
        .await
        .with_context(|| {
            format!(
                "failed to connect to maintenance database at {}",
                maintenance.redacted_url()
            )
        })?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(&maint_pool)
            .await
            .context("failed to query pg_database")?;

    if exists {
        info!(db = db_name, "database already exists");
    } else {
        let stmt = format!("CREATE DATABASE {db_name}");
        maint_pool
            .execute(stmt.as_str())
            .await
            .with_context(|| format!("failed to create database {db_name}"))?;
        info!(db = db_name, "database created");
    }

    maint_pool.close().await;
    Ok(())
}

/// Row counts for the plan tables, in [`PLAN_TABLES`] order.
///
/// Used for the `semplan db-init` success message.
pub async fn table_counts(pool: &PgPool) -> Result<Vec<(String, i64)>> {
    let mut counts = Vec::with_capacity(PLAN_TABLES.len());
    for table_name in PLAN_TABLES {
        // Names come from the constant above, never from input.
        let query = format!("SELECT COUNT(*) FROM {table_name}");
        let count: (i64,) = sqlx::query_as(&query)
            .fetch_one(pool)
            .await
            .with_context(|| format!("failed to count rows in {table_name}"))?;
        counts.push((table_name.to_owned(), count.0));
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifiers() {
        assert!(is_plain_identifier("semplan_test_0a1b"));
        assert!(!is_plain_identifier("plans; DROP TABLE semesters"));
        assert!(!is_plain_identifier("plans-dev"));
        assert!(!is_plain_identifier(""));
    }

    #[tokio::test]
    async fn lazy_pool_does_not_connect() {
        // Nothing listens on port 1; a lazy pool must still build.
        let config = DbConfig::new("postgresql://semplan:pw@127.0.0.1:1/semplan");
        let pool = create_lazy_pool(&config).unwrap();
        assert_eq!(pool.size(), 0);
    }

    #[tokio::test]
    async fn lazy_pool_rejects_malformed_url() {
        let err = create_lazy_pool(&DbConfig::new("not a url")).unwrap_err();
        assert!(format!("{err:#}").contains("invalid database URL"));
    }
}
