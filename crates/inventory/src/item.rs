use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{CartKind, DomainError, DomainResult, ItemId};

/// Stock record as returned by the item lookup collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    pub id: ItemId,
    pub name: String,
    /// Price charged to seller-role parties.
    pub sale_rate: Decimal,
    /// Price paid to buyer-role parties.
    pub purchase_rate: Decimal,
    /// GST slab in percent.
    pub tax_rate: Decimal,
    /// May be zero or negative after returns re-enter unbooked stock.
    pub available_quantity: i64,
}

impl StockItem {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        if self.sale_rate < Decimal::ZERO || self.purchase_rate < Decimal::ZERO {
            return Err(DomainError::validation("item rates cannot be negative"));
        }
        Ok(())
    }
}

/// Pick the rate a cart of the given kind prices this item at.
///
/// Flows with buyer-role parties (purchases and returns to them) use the
/// purchase rate; flows with seller-role parties use the sale rate.
pub fn rate_selector(kind: CartKind, item: &StockItem) -> Decimal {
    match kind {
        CartKind::Purchase | CartKind::ReturnToBuyer => item.purchase_rate,
        CartKind::Sale | CartKind::ReturnFromSeller => item.sale_rate,
    }
}
