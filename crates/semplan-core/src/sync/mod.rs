//! Optimistic sync between the local [`PlanStore`] and a [`RemoteStore`].
//!
//! Mutations are applied to the store immediately and grouped into a
//! *batch*: the first mutation after a quiet spell opens one and captures a
//! snapshot, and every further mutation extends it and restarts the quiet
//! timer. When the timer expires the batch is written as one atomic
//! [`BatchWrite`] holding an upsert per dirty semester, so a failure leaves
//! nothing behind remotely. A failed write restores the snapshot and emits
//! [`SyncEvent::Failed`]. If a newer batch opened while the failed one was
//! in flight, the failure is folded into the newer batch instead, so the
//! newer batch carries both the older snapshot and the older dirty set.
//!
//! At most one write is in flight at a time. Identity changes bump an epoch
//! counter; results that resolve under an old epoch are dropped.

pub mod phase;
pub mod postgres;
pub mod remote;

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::plan::{MutationEffect, PlanError, PlanMutation, PlanState, PlanStore, Semester};
use crate::session::{IdentityEvent, IdentityGuard, IdentityTransition, LocalCache, UserId};

pub use phase::SyncPhase;
pub use postgres::PgRemoteStore;
pub use remote::{BatchWrite, RemoteStore, SemesterPayload};

/// Default quiet period before a batch is written.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(750);

const EVENT_CAPACITY: usize = 64;

/// Tuning for the coordinator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiet period after the last mutation before the batch is written.
    pub debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// A remote write failed and local state was rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sync failed for {} semester(s): {message}", semesters.len())]
pub struct SyncFailed {
    /// Semesters the failed batch was writing.
    pub semesters: Vec<Uuid>,
    pub message: String,
}

/// Notifications published to [`SyncCoordinator::subscribe`] receivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Committed { semesters: Vec<Uuid> },
    Failed(SyncFailed),
}

/// Where [`SyncCoordinator::load_plan`] got its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSource {
    Remote,
    Cache,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("no user is signed in")]
    NoSession,

    #[error("identity changed while the plan was loading")]
    IdentityChanged,

    #[error("a sync is in progress")]
    SyncInProgress,

    #[error("there is no failed sync to retry")]
    NothingToRetry,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

/// One coalescing window of optimistic mutations sharing one snapshot.
struct Batch {
    id: u64,
    snapshot: PlanState,
    dirty: BTreeSet<Uuid>,
    removed_courses: Vec<Uuid>,
    removed_semesters: BTreeSet<Uuid>,
    mutations: Vec<PlanMutation>,
    /// When the last mutation was absorbed. The quiet period runs from here.
    last_change: Instant,
    phase: SyncPhase,
}

impl Batch {
    fn open(id: u64, snapshot: PlanState) -> Self {
        let mut batch = Self {
            id,
            snapshot,
            dirty: BTreeSet::new(),
            removed_courses: Vec::new(),
            removed_semesters: BTreeSet::new(),
            mutations: Vec::new(),
            last_change: Instant::now(),
            phase: SyncPhase::Idle,
        };
        batch.advance(SyncPhase::Applying);
        batch
    }

    fn advance(&mut self, to: SyncPhase) {
        if !SyncPhase::is_valid_transition(self.phase, to) {
            tracing::warn!(batch = self.id, from = %self.phase, %to, "unexpected sync phase transition");
        }
        tracing::trace!(batch = self.id, from = %self.phase, %to, "sync phase");
        self.phase = to;
    }

    fn absorb(&mut self, mutation: PlanMutation, effect: MutationEffect) {
        self.dirty.extend(effect.touched);
        self.removed_semesters.extend(effect.removed_semesters);
        for id in effect.removed_courses {
            if !self.removed_courses.contains(&id) {
                self.removed_courses.push(id);
            }
        }
        self.mutations.push(mutation);
        self.last_change = Instant::now();
    }

    /// Take over a failed older batch: its snapshot is the state to fall
    /// back to, and its semesters must be written again.
    fn fold_failed(&mut self, failed: Batch) {
        self.snapshot = failed.snapshot;
        self.dirty.extend(failed.dirty);
        self.removed_semesters.extend(failed.removed_semesters);
        for id in failed.removed_courses {
            if !self.removed_courses.contains(&id) {
                self.removed_courses.push(id);
            }
        }
        let mut mutations = failed.mutations;
        mutations.append(&mut self.mutations);
        self.mutations = mutations;
    }

    fn affected(&self) -> Vec<Uuid> {
        self.dirty
            .iter()
            .chain(self.removed_semesters.iter())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Remote changes for one batch, captured under the lock.
struct PendingWrite {
    owner: UserId,
    changes: BatchWrite,
}

impl PendingWrite {
    fn prepare(store: &PlanStore, batch: &Batch) -> Self {
        let upserts = batch
            .dirty
            .iter()
            .filter(|id| !batch.removed_semesters.contains(id))
            .filter_map(|id| store.semester(*id))
            .map(SemesterPayload::from)
            .collect();
        // An entry removed and then restored within the batch is live again;
        // deleting it after the upsert would drop it remotely.
        let live: HashSet<Uuid> = store.all_courses().iter().map(|c| c.id).collect();
        let removed_courses = batch
            .removed_courses
            .iter()
            .copied()
            .filter(|id| !live.contains(id))
            .collect();
        Self {
            owner: store.owner().clone(),
            changes: BatchWrite {
                removed_semesters: batch.removed_semesters.iter().copied().collect(),
                upserts,
                removed_courses,
            },
        }
    }

    async fn execute(&self, remote: &dyn RemoteStore) -> anyhow::Result<()> {
        remote.apply_batch(&self.owner, &self.changes).await
    }
}

struct Session {
    store: PlanStore,
    cancel: CancellationToken,
}

struct Inner {
    guard: IdentityGuard,
    session: Option<Session>,
    epoch: u64,
    next_batch: u64,
    open: Option<Batch>,
    in_flight: Option<Batch>,
    last_failed: Option<Vec<PlanMutation>>,
}

impl Inner {
    fn is_idle(&self) -> bool {
        self.open.is_none() && self.in_flight.is_none()
    }
}

struct Shared {
    inner: Mutex<Inner>,
    remote: Arc<dyn RemoteStore>,
    cache: Option<Arc<dyn LocalCache>>,
    config: SyncConfig,
    events: broadcast::Sender<SyncEvent>,
    idle: watch::Sender<bool>,
    shutdown: CancellationToken,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_idle(&self, inner: &Inner) {
        let idle = inner.is_idle();
        self.idle.send_if_modified(|current| {
            if *current == idle {
                false
            } else {
                *current = idle;
                true
            }
        });
    }

    fn emit(&self, event: SyncEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    /// Write `state` as `owner`'s committed cache entry. Called with the
    /// lock held so an identity change cannot interleave with the write.
    fn save_cache(&self, owner: &UserId, state: &PlanState) {
        let Some(cache) = &self.cache else {
            return;
        };
        if let Err(e) = cache.save(owner, state) {
            tracing::warn!(user = %owner, error = %e, "failed to update local plan cache");
        }
    }
}

// ---------------------------------------------------------------------------
// SyncCoordinator
// ---------------------------------------------------------------------------

/// Owns the active user's [`PlanStore`] and keeps it in step with the
/// remote service.
///
/// Cheap to clone; clones share the same session. Methods that schedule
/// remote writes must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct SyncCoordinator {
    shared: Arc<Shared>,
}

impl SyncCoordinator {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        cache: Option<Arc<dyn LocalCache>>,
        config: SyncConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (idle, _) = watch::channel(true);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    guard: IdentityGuard::new(),
                    session: None,
                    epoch: 0,
                    next_batch: 0,
                    open: None,
                    in_flight: None,
                    last_failed: None,
                }),
                remote,
                cache,
                config,
                events,
                idle,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Receive commit and failure notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.events.subscribe()
    }

    /// The signed-in user, if any.
    pub fn owner(&self) -> Option<UserId> {
        self.shared.lock().guard.current().cloned()
    }

    /// Aggregate phase: `Pending` while a write is in flight, `Applying`
    /// while a batch is collecting mutations, otherwise `Idle`.
    pub fn phase(&self) -> SyncPhase {
        let inner = self.shared.lock();
        if inner.in_flight.is_some() {
            SyncPhase::Pending
        } else if inner.open.is_some() {
            SyncPhase::Applying
        } else {
            SyncPhase::Idle
        }
    }

    /// Run `f` against the active store.
    pub fn with_store<R>(&self, f: impl FnOnce(&PlanStore) -> R) -> Result<R, SyncError> {
        let inner = self.shared.lock();
        let session = inner.session.as_ref().ok_or(SyncError::NoSession)?;
        Ok(f(&session.store))
    }

    /// Process an identity event.
    ///
    /// When the user changes or signs out, the old user's store, pending
    /// batches and cache file are discarded before this returns. Writes
    /// still in flight for the old user are left to finish, and their
    /// results are ignored.
    pub fn handle_identity_event(&self, event: &IdentityEvent) -> IdentityTransition {
        let mut inner = self.shared.lock();
        let transition = inner.guard.observe(event);

        match &transition {
            IdentityTransition::Unchanged => {}
            IdentityTransition::Established(user) => {
                self.start_session(&mut inner, user.clone());
            }
            IdentityTransition::Switched { from, to } => {
                self.end_session(&mut inner, from);
                self.start_session(&mut inner, to.clone());
            }
            IdentityTransition::Cleared { from } => {
                self.end_session(&mut inner, from);
            }
        }

        self.shared.publish_idle(&inner);
        transition
    }

    fn start_session(&self, inner: &mut Inner, user: UserId) {
        if let Some(cache) = &self.shared.cache {
            if let Err(e) = cache.purge_all_except(&user) {
                tracing::error!(user = %user, error = %e, "failed to purge foreign cache files");
            }
        }
        tracing::info!(user = %user, epoch = inner.epoch, "session started");
        inner.session = Some(Session {
            store: PlanStore::new(user),
            cancel: self.shared.shutdown.child_token(),
        });
    }

    fn end_session(&self, inner: &mut Inner, user: &UserId) {
        inner.epoch += 1;
        if let Some(session) = inner.session.take() {
            session.cancel.cancel();
        }
        let dropped = inner.open.take().map_or(0, |b| b.mutations.len())
            + inner.in_flight.take().map_or(0, |b| b.mutations.len());
        inner.last_failed = None;

        if let Some(cache) = &self.shared.cache {
            if let Err(e) = cache.purge(user) {
                tracing::error!(user = %user, error = %e, "failed to purge local plan cache");
            }
        }
        tracing::info!(user = %user, epoch = inner.epoch, dropped, "session cleared");
    }

    /// Apply `mutation` locally and schedule its remote write.
    ///
    /// Returns once the local state reflects the mutation. A [`PlanError`]
    /// means nothing changed and nothing will be written.
    pub fn apply_optimistic(&self, mutation: PlanMutation) -> Result<(), SyncError> {
        let mut guard = self.shared.lock();
        let inner = &mut *guard;
        let session = inner.session.as_mut().ok_or(SyncError::NoSession)?;

        let opening = inner.open.is_none();
        if opening {
            inner.next_batch += 1;
            inner.open = Some(Batch::open(inner.next_batch, session.store.snapshot()));
        }
        let Some(batch) = inner.open.as_mut() else {
            return Err(SyncError::NoSession);
        };

        let effect = match session.store.apply(&mutation) {
            Ok(effect) => effect,
            Err(e) => {
                tracing::debug!(mutation = %mutation, error = %e, "mutation rejected");
                if opening {
                    batch.advance(SyncPhase::Idle);
                    inner.open = None;
                }
                return Err(e.into());
            }
        };

        if opening && effect.is_empty() {
            batch.advance(SyncPhase::Idle);
            inner.open = None;
            return Ok(());
        }

        tracing::debug!(batch = batch.id, kind = mutation.kind(), "mutation applied");
        batch.absorb(mutation, effect);

        if opening {
            let task = FlushTask {
                shared: Arc::clone(&self.shared),
                epoch: inner.epoch,
                batch_id: batch.id,
                cancel: session.cancel.clone(),
            };
            tokio::spawn(task.run());
        }

        self.shared.publish_idle(inner);
        Ok(())
    }

    /// Replace the store contents with the owner's plan from the remote
    /// service, falling back to the local cache when the remote fails.
    pub async fn load_plan(&self) -> Result<PlanSource, SyncError> {
        let (owner, epoch) = {
            let inner = self.shared.lock();
            let session = inner.session.as_ref().ok_or(SyncError::NoSession)?;
            if !inner.is_idle() {
                return Err(SyncError::SyncInProgress);
            }
            (session.store.owner().clone(), inner.epoch)
        };

        let (semesters, source) = match self.shared.remote.load_plan(&owner).await {
            Ok(semesters) => (semesters, PlanSource::Remote),
            Err(remote_err) => {
                tracing::warn!(user = %owner, error = %remote_err, "remote load failed; trying local cache");
                match self.load_cached(&owner) {
                    Some(semesters) => (semesters, PlanSource::Cache),
                    None => return Err(remote_err.into()),
                }
            }
        };
        let state = PlanState::from_semesters(semesters)?;

        let mut inner = self.shared.lock();
        if inner.epoch != epoch {
            tracing::info!(user = %owner, "discarding plan loaded for a superseded identity");
            return Err(SyncError::IdentityChanged);
        }
        if !inner.is_idle() {
            return Err(SyncError::SyncInProgress);
        }
        let session = inner.session.as_mut().ok_or(SyncError::NoSession)?;
        tracing::info!(user = %owner, semesters = state.len(), ?source, "plan loaded");
        if source == PlanSource::Remote {
            self.shared.save_cache(&owner, &state);
        }
        session.store.restore(state);
        Ok(source)
    }

    fn load_cached(&self, owner: &UserId) -> Option<Vec<Semester>> {
        let cache = self.shared.cache.as_ref()?;
        match cache.load(owner) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(user = %owner, error = %e, "failed to read local plan cache");
                None
            }
        }
    }

    /// Re-apply the mutations of the last rolled-back batch against the
    /// current state. Mutations that no longer apply are skipped. Returns
    /// how many were re-applied.
    pub fn retry(&self) -> Result<usize, SyncError> {
        let mutations = {
            let mut inner = self.shared.lock();
            if inner.session.is_none() {
                return Err(SyncError::NoSession);
            }
            inner.last_failed.take().ok_or(SyncError::NothingToRetry)?
        };

        let mut applied = 0;
        for mutation in mutations {
            match self.apply_optimistic(mutation) {
                Ok(()) => applied += 1,
                Err(SyncError::Plan(e)) => {
                    tracing::warn!(error = %e, "skipping mutation that no longer applies");
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!(applied, "retried failed sync");
        Ok(applied)
    }

    /// Wait until no batch is open or in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.idle.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|idle| *idle).await;
    }

    /// Cancel every pending quiet timer. Batches not yet written are
    /// abandoned; writes already in flight finish.
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
    }
}

// ---------------------------------------------------------------------------
// Flush task
// ---------------------------------------------------------------------------

struct FlushTask {
    shared: Arc<Shared>,
    epoch: u64,
    batch_id: u64,
    cancel: CancellationToken,
}

enum Step {
    Wait(Instant),
    Stop,
    Write(PendingWrite),
}

impl FlushTask {
    async fn run(self) {
        let mut deadline = Instant::now() + self.shared.config.debounce;
        let write = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!(batch = self.batch_id, "flush cancelled");
                    return;
                }
                _ = tokio::time::sleep_until(deadline) => {}
            }

            match self.try_start() {
                Step::Wait(next) => deadline = next,
                Step::Stop => return,
                Step::Write(write) => break write,
            }
        };

        tracing::debug!(
            batch = self.batch_id,
            upserts = write.changes.upserts.len(),
            removed_semesters = write.changes.removed_semesters.len(),
            removed_courses = write.changes.removed_courses.len(),
            "writing batch"
        );
        let result = write.execute(self.shared.remote.as_ref()).await;
        self.finish(&write, result);
    }

    /// After a quiet period: decide whether the batch is ready and, if so,
    /// move it in flight.
    fn try_start(&self) -> Step {
        let debounce = self.shared.config.debounce;
        let mut guard = self.shared.lock();
        let inner = &mut *guard;
        if inner.epoch != self.epoch {
            return Step::Stop;
        }
        let Some(batch) = inner.open.as_ref() else {
            return Step::Stop;
        };
        if batch.id != self.batch_id {
            return Step::Stop;
        }
        let quiet_until = batch.last_change + debounce;
        if quiet_until > Instant::now() {
            return Step::Wait(quiet_until);
        }
        if inner.in_flight.is_some() {
            // Writes are serialized; check again after another quiet period.
            return Step::Wait(Instant::now() + debounce);
        }
        if inner.session.is_none() {
            return Step::Stop;
        }
        let Some(mut batch) = inner.open.take() else {
            return Step::Stop;
        };
        let Some(session) = inner.session.as_ref() else {
            return Step::Stop;
        };

        batch.advance(SyncPhase::Pending);
        let write = PendingWrite::prepare(&session.store, &batch);
        inner.in_flight = Some(batch);
        Step::Write(write)
    }

    fn finish(&self, write: &PendingWrite, result: anyhow::Result<()>) {
        let mut guard = self.shared.lock();
        let inner = &mut *guard;
        if inner.epoch != self.epoch {
            tracing::debug!(batch = self.batch_id, "ignoring result for a superseded session");
            return;
        }
        let Some(mut batch) = inner.in_flight.take() else {
            return;
        };

        match result {
            Ok(()) => {
                batch.advance(SyncPhase::Committed);
                let semesters = batch.affected();
                tracing::info!(batch = batch.id, semesters = semesters.len(), "sync committed");

                if let Some(session) = inner.session.as_ref() {
                    // Uncommitted mutations of a newer batch must not reach
                    // the cache; its snapshot is the committed state.
                    let committed = match inner.open.as_ref() {
                        Some(open) => open.snapshot.clone(),
                        None => session.store.snapshot(),
                    };
                    self.shared.save_cache(&write.owner, &committed);
                }
                batch.advance(SyncPhase::Idle);
                self.shared.emit(SyncEvent::Committed { semesters });
            }
            Err(err) => {
                let message = format!("{err:#}");
                if let Some(open) = inner.open.as_mut() {
                    tracing::warn!(
                        batch = batch.id,
                        newer = open.id,
                        error = %message,
                        "sync failed; folding into newer batch"
                    );
                    batch.advance(SyncPhase::Idle);
                    open.fold_failed(batch);
                } else {
                    batch.advance(SyncPhase::RolledBack);
                    let semesters = batch.affected();
                    tracing::warn!(
                        batch = batch.id,
                        semesters = semesters.len(),
                        error = %message,
                        "sync failed; rolled back"
                    );
                    if let Some(session) = inner.session.as_mut() {
                        session.store.restore(std::mem::take(&mut batch.snapshot));
                    }
                    batch.advance(SyncPhase::Idle);
                    inner.last_failed = Some(batch.mutations);
                    self.shared
                        .emit(SyncEvent::Failed(SyncFailed { semesters, message }));
                }
            }
        }

        self.shared.publish_idle(inner);
    }
}
