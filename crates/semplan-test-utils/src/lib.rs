//! PostgreSQL fixtures for semplan integration tests.
//!
//! One server is shared by every test in a binary, and each test gets its
//! own freshly migrated database on it:
//!
//! - **`SEMPLAN_TEST_PG_URL`** set: use that server (a URL without a
//!   database name). No container is started.
//! - **No env var** (`cargo test`): start a container via testcontainers,
//!   shared per binary through a `OnceCell`.
//!
//! ```ignore
//! let db = TestDb::create().await;
//! let fall = db.seed_semester("alice", 2024, Season::Fall, &["CS 1301"]).await;
//! // ... exercise db.pool ...
//! db.teardown().await;
//! ```

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use semplan_db::config::DbConfig;
use semplan_db::models::{CourseStatus, Season, SemesterRow};
use semplan_db::pool;
use semplan_db::queries::semesters::{self, CourseUpsert, SemesterUpsert};

/// Prefix of every per-test database name.
pub const DB_PREFIX: &str = "semplan_test_";

/// The shared server and, when we started it, the container keeping it up.
struct SharedPg {
    server: DbConfig,
    _container: Option<ContainerAsync<Postgres>>,
}

static SHARED_PG: OnceCell<SharedPg> = OnceCell::const_new();

async fn init_shared_pg() -> SharedPg {
    if let Ok(url) = std::env::var("SEMPLAN_TEST_PG_URL") {
        return SharedPg {
            server: DbConfig::new(url),
            _container: None,
        };
    }

    let container = Postgres::default()
        .with_tag("17")
        .start()
        .await
        .expect("failed to start PostgreSQL container");
    let host = container.get_host().await.expect("failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get mapped port");

    SharedPg {
        server: DbConfig::new(format!("postgresql://postgres:postgres@{host}:{port}")),
        _container: Some(container),
    }
}

async fn server() -> &'static DbConfig {
    &SHARED_PG.get_or_init(init_shared_pg).await.server
}

async fn connect(config: &DbConfig, max_connections: u32) -> PgPool {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await
        .unwrap_or_else(|e| panic!("failed to connect to {}: {e}", config.redacted_url()))
}

/// A migrated database owned by one test.
pub struct TestDb {
    pub pool: PgPool,
    name: String,
}

impl TestDb {
    /// Create a uniquely named database on the shared server and run the
    /// semplan migrations in it.
    pub async fn create() -> Self {
        let name = format!("{DB_PREFIX}{}", Uuid::new_v4().simple());

        let maint = connect(&server().await.with_database("postgres"), 1).await;
        maint
            .execute(format!("CREATE DATABASE {name}").as_str())
            .await
            .unwrap_or_else(|e| panic!("failed to create temp database {name}: {e}"));
        maint.close().await;

        let pool = connect(&server().await.with_database(&name), 5).await;
        pool::run_migrations(&pool)
            .await
            .expect("migrations should succeed");

        Self { pool, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a semester for `user` holding planned 3-credit courses with
    /// the given codes, in order.
    pub async fn seed_semester(
        &self,
        user: &str,
        year: i32,
        season: Season,
        codes: &[&str],
    ) -> SemesterRow {
        let courses = codes
            .iter()
            .map(|code| CourseUpsert {
                id: Uuid::new_v4(),
                code: (*code).to_owned(),
                title: format!("{code} title"),
                credits: 3,
                status: CourseStatus::Planned,
                grade: None,
            })
            .collect();
        let upsert = SemesterUpsert {
            id: Uuid::new_v4(),
            year,
            season,
            courses,
        };
        semesters::upsert_semester(&self.pool, user, &upsert)
            .await
            .expect("seeding a semester should succeed")
    }

    /// Close the pool and drop the database. Other sessions still connected
    /// to it are terminated first.
    pub async fn teardown(self) {
        self.pool.close().await;

        let maint = connect(&server().await.with_database("postgres"), 1).await;
        let terminate = format!(
            "SELECT pg_terminate_backend(pid) \
             FROM pg_stat_activity \
             WHERE datname = '{}' AND pid <> pg_backend_pid()",
            self.name
        );
        let _ = maint.execute(terminate.as_str()).await;
        let _ = maint
            .execute(format!("DROP DATABASE IF EXISTS {}", self.name).as_str())
            .await;
        maint.close().await;
    }
}
