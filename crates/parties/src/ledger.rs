//! Party ledger: the only path by which a party's balance changes.
//!
//! Every balance-affecting commit becomes exactly one immutable
//! [`LedgerEntry`]. Entries are append-only; replaying them from the opening
//! balance reproduces the party's current balance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, InvoiceKind, LedgerEntryId, PartyId,
    TransactionType, checked_add,
};
use stockbook_events::{Event, Sequenced, replay_key};
use stockbook_invoicing::Invoice;
use stockbook_returns::{ConfirmedSettlement, ReturnSettlement, ReturnType};

use crate::party::{Party, PartyEvent};

/// What is being posted to the party's account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Posting {
    /// A sale or purchase invoice.
    Invoice {
        transaction_type: TransactionType,
        invoice_total: Decimal,
        paid_amount: Decimal,
        /// Balance the invoice was computed against.
        previous_balance_snapshot: Decimal,
    },
    /// Money received against the outstanding balance, no goods.
    Payment { paid_amount: Decimal },
    /// A return, settled by adjustment and/or cash.
    Return {
        settlement: ReturnSettlement,
        return_type: ReturnType,
    },
}

impl Posting {
    pub fn from_invoice(invoice: &Invoice) -> DomainResult<Self> {
        if invoice.kind == InvoiceKind::Return {
            return Err(DomainError::validation(
                "return invoices are posted through their settlement",
            ));
        }
        Ok(Posting::Invoice {
            transaction_type: invoice.kind.into(),
            invoice_total: invoice.invoice_total,
            paid_amount: invoice.paid_amount,
            previous_balance_snapshot: invoice.previous_balance_snapshot,
        })
    }

    pub fn payment(paid_amount: Decimal) -> Self {
        Posting::Payment { paid_amount }
    }

    pub fn from_settlement(settlement: &ConfirmedSettlement) -> Self {
        Posting::Return {
            settlement: settlement.settlement().clone(),
            return_type: settlement.return_type(),
        }
    }

    pub fn transaction_type(&self) -> TransactionType {
        match self {
            Posting::Invoice {
                transaction_type, ..
            } => *transaction_type,
            Posting::Payment { .. } => TransactionType::Payment,
            Posting::Return { .. } => TransactionType::Return,
        }
    }
}

/// Command payload: post one entry to a party's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPosting {
    pub party_id: PartyId,
    pub entry_id: LedgerEntryId,
    pub posting: Posting,
    pub occurred_at: DateTime<Utc>,
}

/// One immutable, append-only record of a balance-affecting event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub party_id: PartyId,
    /// Position in the party's event stream; breaks timestamp ties on replay.
    pub sequence: u64,
    pub transaction_type: TransactionType,
    pub previous_balance: Decimal,
    pub this_transaction_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_after: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Event for LedgerEntry {
    fn event_type(&self) -> &'static str {
        "parties.ledger.entry_posted"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Sequenced for LedgerEntry {
    fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// The only component authorized to change `Party::balance_amount`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PartyLedger;

impl PartyLedger {
    pub fn new() -> Self {
        Self
    }

    /// Post one entry and advance the party's balance.
    ///
    /// On error the party is left untouched.
    pub fn apply(&self, party: &mut Party, posting: LedgerPosting) -> DomainResult<LedgerEntry> {
        let entry = compute_entry(party, &posting).inspect_err(|err| {
            if let DomainError::LedgerInvariantViolation(msg) = err {
                tracing::error!(party_id = %posting.party_id, %msg, "ledger invariant violated");
            }
        })?;

        party.apply(&PartyEvent::LedgerEntryPosted(entry.clone()));

        tracing::info!(
            party_id = %entry.party_id,
            entry_id = %entry.id,
            transaction_type = %entry.transaction_type,
            previous_balance = %entry.previous_balance,
            balance_after = %entry.balance_after,
            "ledger entry posted"
        );

        Ok(entry)
    }
}

/// Decide the entry a posting produces against the party's current state.
pub(crate) fn compute_entry(party: &Party, posting: &LedgerPosting) -> DomainResult<LedgerEntry> {
    if !party.is_onboarded() {
        return Err(DomainError::not_found());
    }
    party.ensure_party_id(posting.party_id)?;
    if !party.can_transact() {
        return Err(DomainError::validation("archived parties cannot transact"));
    }

    let previous_balance = party.balance_amount();

    let (this_transaction_amount, paid_amount, balance_after) = match &posting.posting {
        Posting::Invoice {
            transaction_type,
            invoice_total,
            paid_amount,
            previous_balance_snapshot,
        } => {
            if !matches!(transaction_type, TransactionType::Sale | TransactionType::Purchase) {
                return Err(DomainError::validation(format!(
                    "{transaction_type} cannot be posted as an invoice"
                )));
            }
            if *invoice_total < Decimal::ZERO || *paid_amount < Decimal::ZERO {
                return Err(DomainError::validation("invoice amounts cannot be negative"));
            }
            ensure_fresh(*previous_balance_snapshot, previous_balance)?;

            // The folded-in prior debt is already inside paid_amount; only the
            // unpaid remainder of this invoice moves the balance.
            let balance_after = checked_add(previous_balance, *invoice_total)?
                .checked_sub(*paid_amount)
                .ok_or_else(|| DomainError::validation("balance overflow"))?;
            if balance_after < Decimal::ZERO {
                return Err(DomainError::ledger_invariant(format!(
                    "{transaction_type} would leave a negative balance ({balance_after})"
                )));
            }
            (*invoice_total, *paid_amount, balance_after)
        }
        Posting::Payment { paid_amount } => {
            if *paid_amount <= Decimal::ZERO {
                return Err(DomainError::validation("payment amount must be positive"));
            }
            let balance_after = (previous_balance - paid_amount).max(Decimal::ZERO);
            (Decimal::ZERO, *paid_amount, balance_after)
        }
        Posting::Return {
            settlement,
            return_type,
        } => {
            if !settlement.is_balanced() {
                return Err(DomainError::ledger_invariant(format!(
                    "settlement does not add up: {} + {} != {}",
                    settlement.adjustment_amount,
                    settlement.cash_payment_required,
                    settlement.return_total
                )));
            }
            match return_type {
                ReturnType::Adjust => {
                    ensure_fresh(settlement.current_balance, previous_balance)?;
                    let balance_after =
                        (previous_balance - settlement.adjustment_amount).max(Decimal::ZERO);
                    (
                        settlement.return_total,
                        settlement.cash_payment_required,
                        balance_after,
                    )
                }
                ReturnType::Cash => {
                    if settlement.adjustment_amount != Decimal::ZERO {
                        return Err(DomainError::ledger_invariant(
                            "cash return cannot adjust the balance",
                        ));
                    }
                    (settlement.return_total, settlement.return_total, previous_balance)
                }
            }
        }
    };

    Ok(LedgerEntry {
        id: posting.entry_id,
        party_id: posting.party_id,
        sequence: party.version() + 1,
        transaction_type: posting.posting.transaction_type(),
        previous_balance,
        this_transaction_amount,
        paid_amount,
        balance_after,
        timestamp: posting.occurred_at,
    })
}

fn ensure_fresh(snapshot: Decimal, current: Decimal) -> DomainResult<()> {
    if snapshot != current {
        return Err(DomainError::conflict(format!(
            "party balance moved from {snapshot} to {current} since preview; recompute"
        )));
    }
    Ok(())
}

/// Fold ledger entries from the opening balance and return the final balance.
///
/// Entries are ordered by `(timestamp, sequence)`. Each entry must start from
/// the balance the previous one left; a gap means history was altered.
pub fn replay_balance(opening_balance: Decimal, entries: &[LedgerEntry]) -> DomainResult<Decimal> {
    let mut ordered: Vec<&LedgerEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| replay_key(*e));

    let mut balance = opening_balance;
    for entry in ordered {
        if entry.previous_balance != balance {
            return Err(DomainError::ledger_invariant(format!(
                "entry {} starts from {} but the running balance is {}",
                entry.id, entry.previous_balance, balance
            )));
        }
        balance = entry.balance_after;
    }
    Ok(balance)
}
