//! Per-batch sync state machine.

use std::fmt;

/// Lifecycle of one coalesced batch of optimistic mutations.
///
/// ```text
/// idle       -> applying   (first mutation opens the batch)
/// applying   -> pending    (quiet period elapsed, remote write started)
/// applying   -> idle       (local mutation failed, nothing to write)
/// pending    -> committed  (remote write succeeded)
/// pending    -> rolled_back(remote write failed, snapshot restored)
/// pending    -> idle       (superseded: result ignored or folded forward)
/// committed  -> idle
/// rolled_back-> idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    Idle,
    Applying,
    Pending,
    Committed,
    RolledBack,
}

impl SyncPhase {
    /// Whether `from -> to` is an edge of the state graph.
    pub fn is_valid_transition(from: SyncPhase, to: SyncPhase) -> bool {
        matches!(
            (from, to),
            (SyncPhase::Idle, SyncPhase::Applying)
                | (SyncPhase::Applying, SyncPhase::Pending)
                | (SyncPhase::Applying, SyncPhase::Idle)
                | (SyncPhase::Pending, SyncPhase::Committed)
                | (SyncPhase::Pending, SyncPhase::RolledBack)
                | (SyncPhase::Pending, SyncPhase::Idle)
                | (SyncPhase::Committed, SyncPhase::Idle)
                | (SyncPhase::RolledBack, SyncPhase::Idle)
        )
    }

    /// Whether a batch in this phase still has work outstanding.
    pub fn is_busy(self) -> bool {
        matches!(self, SyncPhase::Applying | SyncPhase::Pending)
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Applying => "applying",
            Self::Pending => "pending",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        };
        f.write_str(s)
    }
}
