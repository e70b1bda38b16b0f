//! Stock availability policy per cart kind.

use serde::{Deserialize, Serialize};

use stockbook_core::{CartKind, DomainError, DomainResult, ItemId};

/// Quantity requested for one item against what is on hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRequest {
    pub item_id: ItemId,
    pub requested: i64,
    pub available: i64,
}

/// Validates requested quantities against the oversell policy.
///
/// | kind               | oversell allowed |
/// |--------------------|------------------|
/// | purchase           | yes              |
/// | sale               | no               |
/// | return from seller | yes              |
/// | return to buyer    | no               |
///
/// Pure: whether a rejection blocks submission or only warns is up to the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct StockAvailabilityGuard;

impl StockAvailabilityGuard {
    pub fn new() -> Self {
        Self
    }

    /// Whether carts of this kind may request more than is available.
    pub fn allows_oversell(kind: CartKind) -> bool {
        match kind {
            CartKind::Purchase | CartKind::ReturnFromSeller => true,
            CartKind::Sale | CartKind::ReturnToBuyer => false,
        }
    }

    pub fn check(&self, request: StockRequest, kind: CartKind) -> DomainResult<()> {
        if Self::allows_oversell(kind) || request.requested <= request.available {
            return Ok(());
        }

        tracing::debug!(
            item_id = %request.item_id,
            requested = request.requested,
            available = request.available,
            ?kind,
            "stock request exceeds availability"
        );

        Err(DomainError::InsufficientStock {
            item_id: request.item_id,
            requested: request.requested,
            available: request.available,
        })
    }
}
