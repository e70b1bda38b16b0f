//! Transaction kinds.
//!
//! Three views of "what kind of transaction is this" exist in the engine:
//! - [`CartKind`] drives stock policy and rate selection for a cart of lines;
//! - [`InvoiceKind`] is the kind of a computed invoice;
//! - [`TransactionType`] is recorded on every ledger entry.

use serde::{Deserialize, Serialize};

/// Kind of cart being priced.
///
/// Party roles follow the shop's bookkeeping: a *buyer* is a party the shop
/// purchases stock through, a *seller* is a party the shop sells stock to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartKind {
    /// Stock enters inventory from a buyer-role party.
    Purchase,
    /// Stock leaves inventory to a seller-role party.
    Sale,
    /// Goods come back from a seller-role party (stock re-entry).
    ReturnFromSeller,
    /// Goods go back to a buyer-role party (stock leaves).
    ReturnToBuyer,
}

impl CartKind {
    pub fn invoice_kind(self) -> InvoiceKind {
        match self {
            CartKind::Purchase => InvoiceKind::Purchase,
            CartKind::Sale => InvoiceKind::Sale,
            CartKind::ReturnFromSeller | CartKind::ReturnToBuyer => InvoiceKind::Return,
        }
    }

    pub fn is_return(self) -> bool {
        matches!(self, CartKind::ReturnFromSeller | CartKind::ReturnToBuyer)
    }
}

/// Kind of computed invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    Purchase,
    Sale,
    Return,
}

/// Transaction type recorded on a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Sale,
    Purchase,
    Return,
    Payment,
}

impl From<InvoiceKind> for TransactionType {
    fn from(value: InvoiceKind) -> Self {
        match value {
            InvoiceKind::Purchase => TransactionType::Purchase,
            InvoiceKind::Sale => TransactionType::Sale,
            InvoiceKind::Return => TransactionType::Return,
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            TransactionType::Sale => "sale",
            TransactionType::Purchase => "purchase",
            TransactionType::Return => "return",
            TransactionType::Payment => "payment",
        };
        f.write_str(s)
    }
}
