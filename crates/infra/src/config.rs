//! Checkout configuration read from the process environment.

use serde::{Deserialize, Serialize};

pub const STOCK_POLICY_VAR: &str = "STOCKBOOK_STOCK_POLICY";
pub const ALLOW_EMPTY_CART_VAR: &str = "STOCKBOOK_ALLOW_EMPTY_CART";

/// What a submission does with lines that exceed available stock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockPolicy {
    /// Abort the whole submission.
    #[default]
    Block,
    /// Drop the offending lines, log a warning, and submit the rest.
    Warn,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutConfig {
    pub stock_policy: StockPolicy,
    /// Allow an invoice with no accepted lines to reach the ledger.
    pub allow_empty_cart: bool,
}

impl CheckoutConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys take their defaults;
    /// unparsable values fall back to the default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let stock_policy = match lookup(STOCK_POLICY_VAR).as_deref().map(str::trim) {
            None => StockPolicy::default(),
            Some(v) if v.eq_ignore_ascii_case("block") => StockPolicy::Block,
            Some(v) if v.eq_ignore_ascii_case("warn") => StockPolicy::Warn,
            Some(other) => {
                tracing::warn!(
                    value = other,
                    "{STOCK_POLICY_VAR} not recognised, falling back to block"
                );
                StockPolicy::Block
            }
        };

        let allow_empty_cart = match lookup(ALLOW_EMPTY_CART_VAR) {
            None => false,
            Some(raw) => raw.trim().parse::<bool>().unwrap_or_else(|_| {
                tracing::warn!(
                    value = %raw,
                    "{ALLOW_EMPTY_CART_VAR} is not a bool, falling back to false"
                );
                false
            }),
        };

        Self {
            stock_policy,
            allow_empty_cart,
        }
    }
}
