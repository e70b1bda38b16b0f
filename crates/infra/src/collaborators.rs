//! Seams to the systems around checkout.
//!
//! Item lookup, party storage, and the final commit are owned elsewhere
//! (a catalog service, a party store, a transactional backend). Checkout
//! depends only on these traits so any of them can be swapped for the
//! in-memory versions in tests.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockbook_core::{
    DomainResult, ExpectedVersion, ItemId, PartyId, TransactionId, TransactionType,
};
use stockbook_inventory::StockItem;
use stockbook_invoicing::{LineItem, PaymentStatus};
use stockbook_parties::{LedgerEntry, Party};
use stockbook_returns::{ReturnSettlement, ReturnType};

/// Read access to stock item records.
pub trait ItemCatalog: Send + Sync {
    fn item(&self, item_id: ItemId) -> Option<StockItem>;
}

/// Party storage with optimistic concurrency on save.
pub trait PartyDirectory: Send + Sync {
    fn party(&self, party_id: PartyId) -> Option<Party>;

    /// Persist `party`, provided the stored version still matches `expected`.
    fn save(&self, party: Party, expected: ExpectedVersion) -> DomainResult<()>;
}

/// Settlement details attached to a return commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnCommit {
    pub return_type: ReturnType,
    pub settlement: ReturnSettlement,
}

/// Everything the backend needs to record one transaction atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub party_id: PartyId,
    pub transaction_type: TransactionType,
    pub line_items: Vec<LineItem>,
    pub with_gst: bool,
    pub payment_status: Option<PaymentStatus>,
    pub paid_amount: Decimal,
    pub ledger_entry: LedgerEntry,
    pub settlement: Option<ReturnCommit>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitSinkError {
    /// The backend could not be reached; nothing was recorded.
    #[error("commit sink unavailable: {0}")]
    Unavailable(String),
    /// The backend refused the transaction.
    #[error("commit rejected: {0}")]
    Rejected(String),
}

/// Durable, atomic persistence of a transaction and its ledger entry.
#[async_trait::async_trait]
pub trait CommitSink: Send + Sync {
    async fn commit(&self, request: CommitRequest) -> Result<TransactionId, CommitSinkError>;
}
