use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::cache::Fingerprint;

/// Lifecycle of one planning run.
///
/// `Idle → KeyResolved → {CacheHit | Locking} → Fanout → Merging → {Cached | Failed}`.
/// A caller that joins an in-flight build stops at `Locking` and adopts the
/// leader's terminal state. A leader whose re-check finds an entry stored by
/// a build that just finished goes from `Locking` to `CacheHit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationState {
    Idle,
    /// Fingerprint computed
    KeyResolved,
    /// Served from cache
    CacheHit,
    /// Acquiring or joining the per-fingerprint build
    Locking,
    /// Sources and tier-1 agents running
    Fanout,
    /// Budget agent and assembly
    Merging,
    /// Itinerary built and stored
    Cached,
    Failed,
}

impl OrchestrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestrationState::Idle => "idle",
            OrchestrationState::KeyResolved => "key_resolved",
            OrchestrationState::CacheHit => "cache_hit",
            OrchestrationState::Locking => "locking",
            OrchestrationState::Fanout => "fanout",
            OrchestrationState::Merging => "merging",
            OrchestrationState::Cached => "cached",
            OrchestrationState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestrationState::CacheHit | OrchestrationState::Cached | OrchestrationState::Failed
        )
    }

    /// Whether `next` may follow `self`.
    pub fn can_advance_to(&self, next: OrchestrationState) -> bool {
        use OrchestrationState::*;
        match (self, next) {
            (Idle, KeyResolved) => true,
            (KeyResolved, CacheHit | Locking) => true,
            (Locking, Fanout | CacheHit) => true,
            (Fanout, Merging) => true,
            (Merging, Cached) => true,
            (state, Failed) => !state.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks and logs the state of a single run.
#[derive(Debug)]
pub(crate) struct StateTracker {
    state: OrchestrationState,
    key: Option<Fingerprint>,
}

impl StateTracker {
    pub(crate) fn new() -> Self {
        Self {
            state: OrchestrationState::Idle,
            key: None,
        }
    }

    /// Tracker for the build task, which starts once the key is held.
    pub(crate) fn locked(key: Fingerprint) -> Self {
        Self {
            state: OrchestrationState::Locking,
            key: Some(key),
        }
    }

    pub(crate) fn resolve(&mut self, key: Fingerprint) {
        self.key = Some(key);
        self.advance(OrchestrationState::KeyResolved);
    }

    pub(crate) fn advance(&mut self, next: OrchestrationState) {
        let key = self.key.as_ref().map(Fingerprint::as_str).unwrap_or("-");
        if self.state.can_advance_to(next) {
            debug!(
                target: "travel_buddy::orchestrator",
                fingerprint = key,
                from = self.state.as_str(),
                to = next.as_str(),
                "state transition"
            );
        } else {
            // Joiners jump from Locking straight to the leader's outcome.
            debug!(
                target: "travel_buddy::orchestrator",
                fingerprint = key,
                from = self.state.as_str(),
                to = next.as_str(),
                "state adopted from in-flight build"
            );
        }
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrchestrationState::*;

    #[test]
    fn test_happy_path_transitions_are_allowed() {
        let path = [Idle, KeyResolved, Locking, Fanout, Merging, Cached];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(KeyResolved.can_advance_to(CacheHit));
        assert!(Locking.can_advance_to(CacheHit));
    }

    #[test]
    fn test_terminal_states_do_not_advance() {
        for state in [CacheHit, Cached, Failed] {
            assert!(state.is_terminal());
            assert!(!state.can_advance_to(Failed));
            assert!(!state.can_advance_to(Fanout));
        }
        assert!(Fanout.can_advance_to(Failed));
        assert!(!Idle.can_advance_to(Fanout));
    }

    #[test]
    fn test_tracker_follows_transitions() {
        let mut tracker = StateTracker::new();
        assert_eq!(tracker.state, Idle);
        tracker.advance(KeyResolved);
        tracker.advance(CacheHit);
        assert!(tracker.state.is_terminal());
    }
}
