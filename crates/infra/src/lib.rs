//! Infrastructure layer: submission serialization, collaborator adapters,
//! configuration, and the checkout pipeline that ties the domain crates
//! together.

pub mod checkout;
pub mod collaborators;
pub mod config;
pub mod in_memory;
pub mod submission_guard;

#[cfg(test)]
mod integration_tests;

pub use checkout::{
    CartLine, CheckoutError, CheckoutService, CommitReceipt, InvoicePreview, InvoiceRequest,
    ReturnPreview, ReturnRequest,
};
pub use collaborators::{
    CommitRequest, CommitSink, CommitSinkError, ItemCatalog, PartyDirectory, ReturnCommit,
};
pub use config::{CheckoutConfig, StockPolicy};
pub use in_memory::{
    InMemoryCommitSink, InMemoryItemCatalog, InMemoryPartyDirectory, StoredTransaction,
};
pub use submission_guard::{SubmissionGuard, SubmissionPermit};
