//! One signed-in planning session for the duration of a command.

use std::sync::Arc;

use anyhow::{Context, Result};
use semplan_core::plan::PlanMutation;
use semplan_core::session::{FileCache, IdentityEvent, UserId};
use semplan_core::sync::{PgRemoteStore, PlanSource, SyncCoordinator, SyncEvent, SyncFailed};
use semplan_db::pool;
use sqlx::PgPool;
use tokio::sync::broadcast;

use crate::config::SemplanConfig;

/// A coordinator signed in as one user with that user's plan loaded.
pub struct PlanSession {
    coordinator: SyncCoordinator,
    events: broadcast::Receiver<SyncEvent>,
    pool: PgPool,
}

impl PlanSession {
    /// Sign in as `user` and load their plan. The pool connects lazily, so
    /// an unreachable database falls back to the local cache (with a
    /// warning) instead of failing.
    pub async fn open(config: &SemplanConfig, user: &str) -> Result<Self> {
        let pool = pool::create_lazy_pool(&config.db_config)?;
        let coordinator = SyncCoordinator::new(
            Arc::new(PgRemoteStore::new(pool.clone())),
            Some(Arc::new(FileCache::new(config.cache_dir.clone()))),
            config.sync_config.clone(),
        );
        let events = coordinator.subscribe();

        coordinator.handle_identity_event(&IdentityEvent::signed_in(UserId::new(user)));
        let source = coordinator
            .load_plan()
            .await
            .with_context(|| format!("failed to load plan for {user}"))?;
        if source == PlanSource::Cache {
            eprintln!("warning: remote plan unavailable; using cached copy");
        }

        Ok(Self {
            coordinator,
            events,
            pool,
        })
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    /// Apply a mutation locally and schedule its write.
    pub fn apply(&self, mutation: PlanMutation) -> Result<()> {
        self.coordinator.apply_optimistic(mutation)?;
        Ok(())
    }

    /// Wait for pending writes, then close the pool. Returns an error if
    /// any batch was rolled back.
    pub async fn finish(mut self) -> Result<()> {
        self.coordinator.wait_idle().await;

        let mut failure: Option<SyncFailed> = None;
        while let Ok(event) = self.events.try_recv() {
            match event {
                SyncEvent::Committed { semesters } => {
                    tracing::debug!(semesters = semesters.len(), "changes saved");
                }
                SyncEvent::Failed(failed) => failure = Some(failed),
            }
        }

        self.coordinator.shutdown();
        self.pool.close().await;

        match failure {
            Some(failed) => Err(anyhow::Error::new(failed).context("changes were rolled back")),
            None => Ok(()),
        }
    }
}
