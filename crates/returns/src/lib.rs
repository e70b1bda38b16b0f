//! Returns domain module.
//!
//! Decides how the value of a return is settled against a party's
//! outstanding balance, and gates cash payouts behind user confirmation.

pub mod settlement;

pub use settlement::{
    ConfirmedSettlement, ReturnSettlement, ReturnSettlementResolver, ReturnType,
    SettlementDecision,
};
