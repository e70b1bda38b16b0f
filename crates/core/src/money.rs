//! Currency rounding.
//!
//! Amounts are exact decimals. Rounding happens only at invoice level and
//! always rounds half away from zero (1234.50 -> 1235, 0.005 -> 0.01).

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{DomainError, DomainResult};

/// Decimal places kept for sale/return amounts.
pub const CURRENCY_DP: u32 = 2;

/// Round to currency precision (2 decimal places).
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Round to whole currency units (purchase amounts).
pub fn round_whole(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Add two amounts, rejecting results outside the representable range.
pub fn checked_add(a: Decimal, b: Decimal) -> DomainResult<Decimal> {
    a.checked_add(b).ok_or_else(|| DomainError::validation("amount overflow"))
}

/// Sum amounts without panicking on overflow.
pub fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> DomainResult<Decimal> {
    amounts.into_iter().try_fold(Decimal::ZERO, checked_add)
}
