//! Single-flight lock around ledger-affecting submissions.
//!
//! One guard is constructed per process and shared (by reference or `Arc`)
//! with every caller that may post to a party ledger. At most one submission
//! is in flight system-wide, not per party. Acquisition never queues: a held
//! lock is reported straight back as [`DomainError::SubmissionLocked`], which
//! callers treat as "disable the trigger and retry", not as a user-facing
//! failure.
//!
//! This only serializes submissions inside one process. Across server
//! instances the storage layer must provide atomic read-modify-write on the
//! party balance.

use std::sync::{Mutex, MutexGuard};

use stockbook_core::{DomainError, DomainResult};

#[derive(Debug, Default)]
struct GuardState {
    locked: bool,
    active_key: Option<String>,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct SubmissionGuard {
    state: Mutex<GuardState>,
}

impl SubmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    // The state is three plain fields; a panic mid-update cannot leave it
    // inconsistent, so a poisoned lock is still usable.
    fn state(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take the lock for `key`, or fail fast if any submission is in flight.
    ///
    /// The returned permit releases the lock when dropped, so a failed or
    /// panicking submission never leaves the system locked.
    pub fn acquire(&self, key: impl Into<String>) -> DomainResult<SubmissionPermit<'_>> {
        let key = key.into();
        let mut state = self.state();

        if state.locked {
            tracing::warn!(
                requested = %key,
                active = ?state.active_key,
                "submission rejected: another submission is in flight"
            );
            return Err(DomainError::SubmissionLocked {
                active_key: state.active_key.clone(),
            });
        }

        state.locked = true;
        state.active_key = Some(key.clone());
        state.generation += 1;
        tracing::debug!(key = %key, "submission lock acquired");

        Ok(SubmissionPermit {
            guard: self,
            key,
            generation: state.generation,
        })
    }

    /// Clear the lock unconditionally.
    pub fn release(&self) {
        let mut state = self.state();
        if state.locked {
            tracing::debug!(key = ?state.active_key, "submission lock released");
        }
        state.locked = false;
        state.active_key = None;
    }

    pub fn is_locked(&self) -> bool {
        self.state().locked
    }

    pub fn active_key(&self) -> Option<String> {
        self.state().active_key.clone()
    }

    fn release_generation(&self, generation: u64) {
        let mut state = self.state();
        // A newer holder took over after an explicit release(); leave it be.
        if state.locked && state.generation == generation {
            state.locked = false;
            state.active_key = None;
            tracing::debug!("submission lock released on permit drop");
        }
    }
}

/// Proof that the caller holds the submission lock.
#[derive(Debug)]
#[must_use = "dropping the permit releases the submission lock"]
pub struct SubmissionPermit<'a> {
    guard: &'a SubmissionGuard,
    key: String,
    generation: u64,
}

impl SubmissionPermit<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for SubmissionPermit<'_> {
    fn drop(&mut self) {
        self.guard.release_generation(self.generation);
    }
}
