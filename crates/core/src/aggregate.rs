//! Event-sourced aggregates and their optimistic concurrency guard.
//!
//! A party is the only aggregate in the books today: its balance is whatever
//! its event stream folds to, and a stale copy must never overwrite a newer one.

use crate::error::{DomainError, DomainResult};

pub trait AggregateRoot {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Events folded into this aggregate so far; zero before the first one.
    fn version(&self) -> u64;

    /// Expectation a store save should hold this copy to.
    fn expected_version(&self) -> ExpectedVersion {
        ExpectedVersion::Exact(self.version())
    }
}

/// What a store must find before it accepts a save.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Accept whatever is stored.
    Any,
    /// The stored copy must be at exactly this version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    /// `Conflict` when the stored copy moved underneath the caller.
    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "stale aggregate (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// Decide-then-evolve split for event-sourced state.
///
/// `handle` only reads; `apply` only folds. Timestamps and ids travel inside
/// commands, so neither side touches a clock or an id generator.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Fold one event; every event bumps the version by one.
    fn apply(&mut self, event: &Self::Event);

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Handle `command` and fold what it emits. A rejected command leaves
    /// `self` as it was.
    fn execute(&mut self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let events = self.handle(command)?;
        for event in &events {
            self.apply(event);
        }
        Ok(events)
    }
}
