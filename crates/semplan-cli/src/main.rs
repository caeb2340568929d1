mod check_cmd;
mod config;
mod course_cmds;
mod plan_cmds;
mod session;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use semplan_db::pool;

use config::SemplanConfig;
use session::PlanSession;

#[derive(Parser)]
#[command(name = "semplan", about = "Semester planner with prerequisite checking")]
struct Cli {
    /// Database URL (overrides SEMPLAN_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Plan cache directory (overrides SEMPLAN_CACHE_DIR env var)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// User whose plan to operate on
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a semplan config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/semplan")]
        db_url: String,
        /// Quiet period before changes are written, in milliseconds
        #[arg(long, default_value_t = 750)]
        debounce_ms: u64,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the semplan database (requires config file or env vars)
    DbInit,
    /// Plan management
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Course management within a plan
    Course {
        #[command(subcommand)]
        command: CourseCommands,
    },
    /// Check prerequisites against the plan
    Check {
        /// Catalog TOML file
        #[arg(long)]
        catalog: PathBuf,
        /// Course codes to check (omit to check every unfinished course in the plan)
        codes: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Add one empty semester per term from start through graduation
    Generate {
        /// First term, e.g. "Fall 2024"
        start: String,
        /// Last term, e.g. "Spring 2028"
        graduation: String,
        /// Include summer terms
        #[arg(long)]
        summer: bool,
    },
    /// Show every semester with its courses, credits, and GPA
    Show,
}

#[derive(Subcommand)]
pub enum CourseCommands {
    /// Add a course to a semester
    Add {
        /// Term of the target semester, e.g. "Fall 2024"
        term: String,
        /// Course code, e.g. "CS 1331"
        code: String,
        /// Course title (defaults to the catalog title, or the code)
        #[arg(long)]
        title: Option<String>,
        /// Credit hours (defaults to the catalog value)
        #[arg(long)]
        credits: Option<u32>,
        /// Catalog TOML file for defaults and a prerequisite check
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Remove a course from the plan
    Remove {
        /// Course code
        code: String,
    },
    /// Move a course to another semester
    Move {
        /// Course code
        code: String,
        /// Destination term, e.g. "Spring 2025"
        to: String,
    },
    /// Update a course's status and grade
    Status {
        /// Course code
        code: String,
        /// completed, in_progress, or planned
        status: String,
        /// Letter grade (A, B, C, D, F, W, I, IP, S, U)
        #[arg(long)]
        grade: Option<String>,
    },
}

/// Execute the `semplan init` command: write config file.
fn cmd_init(db_url: &str, debounce_ms: u64, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        sync: config::SyncSection { debounce_ms },
        cache: config::CacheSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  sync.debounce_ms = {debounce_ms}");
    println!();
    println!("Next: run `semplan db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `semplan db-init` command: create database and run migrations.
async fn cmd_db_init(resolved: &SemplanConfig) -> anyhow::Result<()> {
    println!("Initializing semplan database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("semplan db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Init {
        db_url,
        debounce_ms,
        force,
    } = &cli.command
    {
        return cmd_init(db_url, *debounce_ms, *force);
    }

    let resolved = SemplanConfig::resolve(cli.database_url.as_deref(), cli.cache_dir.as_deref())?;

    if let Commands::DbInit = cli.command {
        return cmd_db_init(&resolved).await;
    }

    let user = cli
        .user
        .as_deref()
        .context("--user is required for plan, course, and check commands")?;
    let session = PlanSession::open(&resolved, user).await?;

    let result = match cli.command {
        Commands::Plan { command } => plan_cmds::run_plan_command(command, &session),
        Commands::Course { command } => course_cmds::run_course_command(command, &session),
        Commands::Check { catalog, codes } => check_cmd::run_check(&session, &catalog, &codes),
        Commands::Init { .. } | Commands::DbInit => Ok(()),
    };

    // Let pending writes settle even when the command failed part-way.
    let finished = session.finish().await;
    result?;
    finished
}
