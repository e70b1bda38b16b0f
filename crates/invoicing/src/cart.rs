//! Line-level cart screening.
//!
//! A cart is never validated all-or-nothing: each line is checked on its own
//! and one bad line does not hold back the others.

use serde::{Deserialize, Serialize};

use stockbook_core::{CartKind, DomainError, ItemId};
use stockbook_inventory::StockAvailabilityGuard;

use crate::line::{LineItem, LineItemResult, compute_line_item};

/// A line that passed validation and the stock policy, with its amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub line: LineItem,
    pub result: LineItemResult,
}

/// A line that was held back, by position in the submitted cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRejection {
    pub index: usize,
    pub item_id: ItemId,
    pub error: DomainError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartScreen {
    pub accepted: Vec<PricedLine>,
    pub rejected: Vec<LineRejection>,
}

impl CartScreen {
    pub fn results(&self) -> Vec<LineItemResult> {
        self.accepted.iter().map(|p| p.result.clone()).collect()
    }

    pub fn lines(&self) -> Vec<LineItem> {
        self.accepted.iter().map(|p| p.line.clone()).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    pub fn has_stock_rejections(&self) -> bool {
        self.rejected
            .iter()
            .any(|r| matches!(r.error, DomainError::InsufficientStock { .. }))
    }
}

/// Validate and price every line of a cart.
pub fn screen_cart(lines: &[LineItem], kind: CartKind, with_gst: bool) -> CartScreen {
    let guard = StockAvailabilityGuard::new();
    let mut screen = CartScreen::default();

    for (index, line) in lines.iter().enumerate() {
        let outcome = compute_line_item(line, with_gst)
            .and_then(|result| guard.check(line.stock_request(), kind).map(|_| result));

        match outcome {
            Ok(result) => screen.accepted.push(PricedLine {
                line: line.clone(),
                result,
            }),
            Err(error) => screen.rejected.push(LineRejection {
                index,
                item_id: line.item_id,
                error,
            }),
        }
    }

    screen
}
