//! Identity tracking and the per-user local cache.
//!
//! Authentication happens elsewhere; this module only consumes identity
//! events and decides whether the active user changed.

pub mod cache;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use cache::{FileCache, LocalCache};

/// Opaque identity string supplied by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// What happened at the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// An identity notification. `user_id` is `None` for sign-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityEvent {
    pub user_id: Option<UserId>,
    pub kind: IdentityEventKind,
}

impl IdentityEvent {
    pub fn signed_in(user: UserId) -> Self {
        Self {
            user_id: Some(user),
            kind: IdentityEventKind::SignedIn,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            user_id: None,
            kind: IdentityEventKind::SignedOut,
        }
    }

    pub fn token_refreshed(user: UserId) -> Self {
        Self {
            user_id: Some(user),
            kind: IdentityEventKind::TokenRefreshed,
        }
    }

    /// The identity this event leaves active. A sign-in or refresh that
    /// carries no user counts as a sign-out.
    fn resulting_user(&self) -> Option<&UserId> {
        match self.kind {
            IdentityEventKind::SignedOut => None,
            IdentityEventKind::SignedIn | IdentityEventKind::TokenRefreshed => {
                self.user_id.as_ref()
            }
        }
    }
}

/// Classification of an identity event relative to the current user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityTransition {
    /// Same user as before (including token refreshes), or still nobody.
    Unchanged,
    /// A user signed in where there was none.
    Established(UserId),
    /// A different user replaced the current one.
    Switched { from: UserId, to: UserId },
    /// The current user signed out.
    Cleared { from: UserId },
}

impl IdentityTransition {
    /// Whether the previous user's data must be discarded.
    pub fn discards_previous(&self) -> bool {
        matches!(self, Self::Switched { .. } | Self::Cleared { .. })
    }
}

/// Remembers the active user and classifies incoming identity events.
#[derive(Debug, Default)]
pub struct IdentityGuard {
    current: Option<UserId>,
}

impl IdentityGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&UserId> {
        self.current.as_ref()
    }

    /// Record `event` and report how the active identity changed.
    pub fn observe(&mut self, event: &IdentityEvent) -> IdentityTransition {
        let next = event.resulting_user().cloned();
        let transition = match (self.current.take(), next.clone()) {
            (None, None) => IdentityTransition::Unchanged,
            (None, Some(to)) => IdentityTransition::Established(to),
            (Some(from), Some(to)) if from == to => IdentityTransition::Unchanged,
            (Some(from), Some(to)) => IdentityTransition::Switched { from, to },
            (Some(from), None) => IdentityTransition::Cleared { from },
        };
        self.current = next;
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sign_in_establishes() {
        let mut guard = IdentityGuard::new();
        let t = guard.observe(&IdentityEvent::signed_in(UserId::new("alice")));
        assert_eq!(t, IdentityTransition::Established(UserId::new("alice")));
        assert_eq!(guard.current(), Some(&UserId::new("alice")));
    }

    #[test]
    fn token_refresh_for_same_user_is_unchanged() {
        let mut guard = IdentityGuard::new();
        guard.observe(&IdentityEvent::signed_in(UserId::new("alice")));
        let t = guard.observe(&IdentityEvent::token_refreshed(UserId::new("alice")));
        assert_eq!(t, IdentityTransition::Unchanged);
        assert!(!t.discards_previous());
    }

    #[test]
    fn different_user_switches() {
        let mut guard = IdentityGuard::new();
        guard.observe(&IdentityEvent::signed_in(UserId::new("alice")));
        let t = guard.observe(&IdentityEvent::signed_in(UserId::new("bob")));
        assert_eq!(
            t,
            IdentityTransition::Switched {
                from: UserId::new("alice"),
                to: UserId::new("bob"),
            }
        );
        assert!(t.discards_previous());
    }

    #[test]
    fn refresh_carrying_another_user_switches() {
        let mut guard = IdentityGuard::new();
        guard.observe(&IdentityEvent::signed_in(UserId::new("alice")));
        let t = guard.observe(&IdentityEvent::token_refreshed(UserId::new("bob")));
        assert!(matches!(t, IdentityTransition::Switched { .. }));
    }

    #[test]
    fn sign_out_clears() {
        let mut guard = IdentityGuard::new();
        guard.observe(&IdentityEvent::signed_in(UserId::new("alice")));
        let t = guard.observe(&IdentityEvent::signed_out());
        assert_eq!(
            t,
            IdentityTransition::Cleared {
                from: UserId::new("alice")
            }
        );
        assert_eq!(guard.current(), None);

        assert_eq!(
            guard.observe(&IdentityEvent::signed_out()),
            IdentityTransition::Unchanged
        );
    }

    #[test]
    fn sign_in_without_user_counts_as_sign_out() {
        let mut guard = IdentityGuard::new();
        guard.observe(&IdentityEvent::signed_in(UserId::new("alice")));
        let event = IdentityEvent {
            user_id: None,
            kind: IdentityEventKind::SignedIn,
        };
        assert!(matches!(guard.observe(&event), IdentityTransition::Cleared { .. }));
    }
}
