use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{DomainError, DomainResult, ValueObject};

/// How the user chose to settle a return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    /// Reduce the party's outstanding balance; pay out any excess in cash.
    Adjust,
    /// Pay the whole return out in cash; the balance is untouched.
    Cash,
}

/// Split of a return between balance adjustment and cash.
///
/// Invariant: `adjustment_amount + cash_payment_required == return_total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnSettlement {
    pub return_total: Decimal,
    pub current_balance: Decimal,
    pub adjustment_amount: Decimal,
    pub cash_payment_required: Decimal,
}

impl ValueObject for ReturnSettlement {}

impl ReturnSettlement {
    pub fn is_balanced(&self) -> bool {
        self.adjustment_amount + self.cash_payment_required == self.return_total
            && self.adjustment_amount >= Decimal::ZERO
            && self.cash_payment_required >= Decimal::ZERO
    }
}

/// Resolver output, not yet cleared for commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementDecision {
    pub settlement: ReturnSettlement,
    pub return_type: ReturnType,
    /// Cash changes hands beyond the balance; the user must confirm.
    pub requires_confirmation: bool,
}

impl SettlementDecision {
    /// Record the user's explicit confirmation.
    pub fn confirm(self) -> ConfirmedSettlement {
        ConfirmedSettlement {
            settlement: self.settlement,
            return_type: self.return_type,
        }
    }

    /// Clear a decision that needs no confirmation.
    pub fn into_confirmed(self) -> DomainResult<ConfirmedSettlement> {
        if self.requires_confirmation {
            return Err(DomainError::ConfirmationRequired {
                cash_payment_required: self.settlement.cash_payment_required,
            });
        }
        Ok(self.confirm())
    }

    /// Clear the decision against the cash payout the user agreed to.
    ///
    /// A payout that needs confirmation only clears when `accepted` matches
    /// it exactly; a figure recomputed since the user saw it is asked again.
    pub fn confirm_cash(self, accepted: Option<Decimal>) -> DomainResult<ConfirmedSettlement> {
        match accepted {
            Some(cash) if self.requires_confirmation => {
                if cash != self.settlement.cash_payment_required {
                    return Err(DomainError::ConfirmationRequired {
                        cash_payment_required: self.settlement.cash_payment_required,
                    });
                }
                Ok(self.confirm())
            }
            _ => self.into_confirmed(),
        }
    }
}

/// A settlement cleared for commit.
///
/// Only obtainable through [`SettlementDecision`], so a cash payout beyond the
/// balance cannot reach the ledger unconfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmedSettlement {
    settlement: ReturnSettlement,
    return_type: ReturnType,
}

impl ConfirmedSettlement {
    pub fn settlement(&self) -> &ReturnSettlement {
        &self.settlement
    }

    pub fn return_type(&self) -> ReturnType {
        self.return_type
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReturnSettlementResolver;

impl ReturnSettlementResolver {
    pub fn new() -> Self {
        Self
    }

    /// Split `return_total` against `current_balance`.
    ///
    /// For `Adjust`: `adjustment = min(return_total, current_balance)` and the
    /// remainder is cash. A credit (negative) balance absorbs nothing. For
    /// `Cash`: everything is cash and no confirmation is asked for.
    pub fn resolve(
        &self,
        return_total: Decimal,
        current_balance: Decimal,
        return_type: ReturnType,
    ) -> DomainResult<SettlementDecision> {
        if return_total < Decimal::ZERO {
            return Err(DomainError::validation("return total cannot be negative"));
        }

        let (adjustment_amount, cash_payment_required) = match return_type {
            ReturnType::Adjust => {
                let adjustment = return_total.min(current_balance.max(Decimal::ZERO));
                (adjustment, return_total - adjustment)
            }
            ReturnType::Cash => (Decimal::ZERO, return_total),
        };

        let requires_confirmation =
            return_type == ReturnType::Adjust && cash_payment_required > Decimal::ZERO;

        if requires_confirmation {
            tracing::info!(
                %return_total,
                %current_balance,
                %cash_payment_required,
                "return exceeds balance; cash payout needs confirmation"
            );
        }

        Ok(SettlementDecision {
            settlement: ReturnSettlement {
                return_total,
                current_balance,
                adjustment_amount,
                cash_payment_required,
            },
            return_type,
            requires_confirmation,
        })
    }
}
