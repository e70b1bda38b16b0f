//! `stockbook-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the billing engine
//! (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod kind;
pub mod money;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{ItemId, LedgerEntryId, PartyId, TransactionId};
pub use kind::{CartKind, InvoiceKind, TransactionType};
pub use money::{checked_add, checked_sum, round_currency, round_whole};
pub use value_object::ValueObject;
