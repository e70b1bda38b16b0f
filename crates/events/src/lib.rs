//! Domain events.
//!
//! Ledger-affecting facts (party onboarding, posted ledger entries) are
//! modelled as events so a party's balance can always be rebuilt by replay.

pub mod event;
pub mod replay;

pub use event::{Event, Sequenced};
pub use replay::{in_replay_order, is_in_replay_order, replay_key};
