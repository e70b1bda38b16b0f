//! Invoicing domain module.
//!
//! Per-line discount/GST math, cart screening, and invoice aggregation.
//! Everything here is a pure function of its inputs: recomputing from scratch
//! on every edit is the intended usage, nothing is cached or patched.

pub mod cart;
pub mod invoice;
pub mod line;

pub use cart::{CartScreen, LineRejection, PricedLine, screen_cart};
pub use invoice::{Invoice, InvoiceDraft, PaymentStatus, compute_invoice};
pub use line::{DiscountType, GST_SLABS, LineItem, LineItemResult, compute_line_item};
