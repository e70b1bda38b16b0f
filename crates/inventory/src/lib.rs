//! Inventory domain module.
//!
//! Stock lookup records, the per-kind rate selection rule, and the stock
//! availability policy. Pure logic only (no IO, no storage).

pub mod guard;
pub mod item;

pub use guard::{StockAvailabilityGuard, StockRequest};
pub use item::{StockItem, rate_selector};
