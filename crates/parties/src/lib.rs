//! Parties domain module (customer/supplier accounts, event-sourced).
//!
//! A party's outstanding balance changes only through [`PartyLedger::apply`],
//! which appends one immutable [`LedgerEntry`] per balance-affecting event.
//! Pure domain logic only (no IO, no storage).

pub mod ledger;
pub mod party;

pub use ledger::{LedgerEntry, LedgerPosting, PartyLedger, Posting, replay_balance};
pub use party::{
    ArchiveParty, OnboardParty, Party, PartyArchived, PartyCommand, PartyEvent, PartyOnboarded,
    PartyRole, PartyStatus,
};
