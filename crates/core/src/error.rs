//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::id::ItemId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Commit-sink and storage failures belong to the
/// infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Bad quantity/rate/discount (or similar) input, rejected before computation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Requested quantity exceeds stock for a kind that may not oversell.
    #[error("insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: ItemId,
        requested: i64,
        available: i64,
    },

    /// The party ledger would reach a state that must never exist.
    ///
    /// Always a logic bug; never silently corrected.
    #[error("ledger invariant violated: {0}")]
    LedgerInvariantViolation(String),

    /// Another ledger-affecting submission is in flight.
    #[error("submission locked (in flight: {active_key:?})")]
    SubmissionLocked { active_key: Option<String> },

    /// A return needs a cash payout and the user has not confirmed it.
    #[error("confirmation required before paying out {cash_payment_required} in cash")]
    ConfirmationRequired { cash_payment_required: Decimal },

    /// A conflict occurred (stale preview, optimistic version mismatch).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested record was not found.
    #[error("not found")]
    NotFound,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn ledger_invariant(msg: impl Into<String>) -> Self {
        Self::LedgerInvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Whether the caller can recover locally (re-edit input, retry later).
    ///
    /// Only ledger invariant violations must be surfaced as failures requiring
    /// attention.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::LedgerInvariantViolation(_))
    }
}
