//! Line item calculator.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{CartKind, DomainError, DomainResult, ItemId, ValueObject};
use stockbook_inventory::{StockItem, StockRequest, rate_selector};

/// GST slabs (percent) a line may carry.
pub const GST_SLABS: [Decimal; 4] = [
    Decimal::ZERO,
    Decimal::from_parts(5, 0, 0, false, 0),
    Decimal::from_parts(18, 0, 0, false, 0),
    Decimal::from_parts(28, 0, 0, false, 0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    #[default]
    Amount,
    Percentage,
}

/// One line of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub item_id: ItemId,
    pub quantity: i64,
    pub rate: Decimal,
    pub discount_type: DiscountType,
    /// `None` means no discount.
    pub discount_value: Option<Decimal>,
    pub tax_rate: Decimal,
    pub available_quantity: i64,
}

impl LineItem {
    /// Build an undiscounted line priced for `kind`.
    pub fn from_stock(item: &StockItem, kind: CartKind, quantity: i64) -> Self {
        Self {
            item_id: item.id,
            quantity,
            rate: rate_selector(kind, item),
            discount_type: DiscountType::Amount,
            discount_value: None,
            tax_rate: item.tax_rate,
            available_quantity: item.available_quantity,
        }
    }

    pub fn with_discount(mut self, discount_type: DiscountType, value: Decimal) -> Self {
        self.discount_type = discount_type;
        self.discount_value = Some(value);
        self
    }

    pub fn stock_request(&self) -> StockRequest {
        StockRequest {
            item_id: self.item_id,
            requested: self.quantity,
            available: self.available_quantity,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("line quantity must be positive"));
        }
        if self.rate < Decimal::ZERO {
            return Err(DomainError::validation("line rate cannot be negative"));
        }
        if let Some(value) = self.discount_value {
            if value < Decimal::ZERO {
                return Err(DomainError::validation("discount cannot be negative"));
            }
        }
        if !GST_SLABS.contains(&self.tax_rate) {
            return Err(DomainError::validation(format!(
                "unsupported tax rate {}%",
                self.tax_rate
            )));
        }
        Ok(())
    }
}

/// Derived amounts for one line (never persisted on its own).
///
/// Invariants: `discount_amount <= item_total`; with GST,
/// `taxable_value + tax_amount == total_after_discount`; without GST,
/// `taxable_value == total_after_discount` and `tax_amount == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemResult {
    pub item_total: Decimal,
    pub discount_amount: Decimal,
    pub total_after_discount: Decimal,
    pub taxable_value: Decimal,
    pub tax_amount: Decimal,
}

impl ValueObject for LineItemResult {}

/// Compute one line's amounts.
///
/// The discounted total is treated as GST-inclusive: tax is extracted from it
/// (`taxable = total / (1 + rate/100)`), never added on top.
pub fn compute_line_item(item: &LineItem, with_gst: bool) -> DomainResult<LineItemResult> {
    item.validate()?;

    let item_total = item
        .rate
        .checked_mul(Decimal::from(item.quantity))
        .ok_or_else(|| DomainError::validation("line amount overflow"))?;

    let discount_value = item.discount_value.unwrap_or(Decimal::ZERO);
    let requested_discount = match item.discount_type {
        // Anything past 100% clamps to the whole line anyway.
        DiscountType::Percentage => {
            let fraction = discount_value.min(Decimal::ONE_HUNDRED) / Decimal::ONE_HUNDRED;
            item_total
                .checked_mul(fraction)
                .ok_or_else(|| DomainError::validation("discount amount overflow"))?
        }
        DiscountType::Amount => discount_value,
    };
    let discount_amount = requested_discount.min(item_total);
    let total_after_discount = item_total - discount_amount;

    let (taxable_value, tax_amount) = if with_gst && item.tax_rate > Decimal::ZERO {
        let divisor = Decimal::ONE + item.tax_rate / Decimal::ONE_HUNDRED;
        let taxable = total_after_discount / divisor;
        (taxable, total_after_discount - taxable)
    } else {
        (total_after_discount, Decimal::ZERO)
    };

    Ok(LineItemResult {
        item_total,
        discount_amount,
        total_after_discount,
        taxable_value,
        tax_amount,
    })
}
