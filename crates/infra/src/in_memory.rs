//! In-memory collaborators.
//!
//! Intended for tests/dev. Not optimized for performance. Poisoned locks are
//! recovered rather than propagated: every write replaces whole values, so a
//! panic mid-write cannot leave a half-updated record behind.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use stockbook_core::{
    AggregateRoot, DomainError, DomainResult, ExpectedVersion, ItemId, PartyId, TransactionId,
    TransactionType,
};
use stockbook_events::in_replay_order;
use stockbook_inventory::StockItem;
use stockbook_parties::{LedgerEntry, Party};

use crate::collaborators::{CommitRequest, CommitSink, CommitSinkError, ItemCatalog, PartyDirectory};

#[derive(Debug, Default)]
pub struct InMemoryItemCatalog {
    items: RwLock<HashMap<ItemId, StockItem>>,
}

impl InMemoryItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, item: StockItem) -> DomainResult<()> {
        item.validate()?;
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(item.id, item);
        Ok(())
    }

    /// Overwrite the stock count of an existing item.
    pub fn set_available(&self, item_id: ItemId, available_quantity: i64) -> DomainResult<()> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let item = items.get_mut(&item_id).ok_or(DomainError::NotFound)?;
        item.available_quantity = available_quantity;
        Ok(())
    }
}

impl ItemCatalog for InMemoryItemCatalog {
    fn item(&self, item_id: ItemId) -> Option<StockItem> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&item_id)
            .cloned()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPartyDirectory {
    parties: RwLock<HashMap<PartyId, Party>>,
}

impl InMemoryPartyDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PartyDirectory for InMemoryPartyDirectory {
    fn party(&self, party_id: PartyId) -> Option<Party> {
        self.parties
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&party_id)
            .cloned()
    }

    fn save(&self, party: Party, expected: ExpectedVersion) -> DomainResult<()> {
        let mut parties = self.parties.write().unwrap_or_else(PoisonError::into_inner);

        let current = parties.get(party.id()).map(|p| p.version()).unwrap_or(0);
        expected.check(current)?;

        parties.insert(party.id_typed(), party);
        Ok(())
    }
}

/// A committed transaction as the sink recorded it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredTransaction {
    pub id: TransactionId,
    pub party_id: PartyId,
    pub transaction_type: TransactionType,
    pub ledger_entry: LedgerEntry,
    /// The full commit request, as it would go over the wire.
    pub payload: JsonValue,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InMemoryCommitSink {
    transactions: RwLock<Vec<StoredTransaction>>,
    fail_next: Mutex<Option<CommitSinkError>>,
}

impl InMemoryCommitSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit` fail with `error` without recording anything.
    pub fn fail_next(&self, error: CommitSinkError) {
        *self.fail_next.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub fn transactions(&self) -> Vec<StoredTransaction> {
        self.transactions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Ledger entries for one party, in replay order.
    pub fn statement(&self, party_id: PartyId) -> Vec<LedgerEntry> {
        let mut entries: Vec<LedgerEntry> = self
            .transactions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|tx| tx.party_id == party_id)
            .map(|tx| tx.ledger_entry.clone())
            .collect();
        in_replay_order(&mut entries);
        entries
    }
}

#[async_trait::async_trait]
impl CommitSink for InMemoryCommitSink {
    async fn commit(&self, request: CommitRequest) -> Result<TransactionId, CommitSinkError> {
        let injected = self
            .fail_next
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(error) = injected {
            return Err(error);
        }

        if request.ledger_entry.party_id != request.party_id {
            return Err(CommitSinkError::Rejected(
                "ledger entry belongs to a different party".to_string(),
            ));
        }

        let payload = serde_json::to_value(&request)
            .map_err(|e| CommitSinkError::Rejected(format!("payload not serializable: {e}")))?;

        let id = TransactionId::new();
        self.transactions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StoredTransaction {
                id,
                party_id: request.party_id,
                transaction_type: request.transaction_type,
                ledger_entry: request.ledger_entry,
                payload,
                committed_at: Utc::now(),
            });

        Ok(id)
    }
}
