//! Invoice aggregation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{
    DomainError, DomainResult, InvoiceKind, PartyId, checked_add, checked_sum, round_currency,
    round_whole,
};

use crate::line::LineItemResult;

/// How the user settled the invoice at the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    FullyPaid,
    PartiallyPaid,
}

/// Inputs to [`compute_invoice`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    pub kind: InvoiceKind,
    pub party_id: PartyId,
    pub with_gst: bool,
    pub line_results: Vec<LineItemResult>,
    /// Party balance at preview time.
    pub previous_balance: Decimal,
    pub payment_status: PaymentStatus,
    /// User-entered amount; only read when partially paid.
    pub paid_amount: Option<Decimal>,
}

/// Computed invoice (transient, one per transaction attempt).
///
/// Invariants: `grand_total == invoice_total + previous_balance_paid`,
/// `balance_due == grand_total - paid_amount >= 0`, and a fully paid invoice
/// has `paid_amount == grand_total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub kind: InvoiceKind,
    pub party_id: PartyId,
    pub with_gst: bool,
    pub line_results: Vec<LineItemResult>,
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub invoice_total: Decimal,
    pub previous_balance_snapshot: Decimal,
    pub previous_balance_paid: Decimal,
    pub grand_total: Decimal,
    pub payment_status: PaymentStatus,
    pub paid_amount: Decimal,
    pub balance_due: Decimal,
}

impl Invoice {
    pub fn is_fully_paid(&self) -> bool {
        self.payment_status == PaymentStatus::FullyPaid
    }
}

/// Sum line results into invoice totals and resolve the payment split.
///
/// Any positive outstanding balance is folded into the grand total in full.
/// Purchase invoices settle in whole currency units: their `invoice_total`
/// and user-entered `paid_amount` are rounded to 0 dp; everything else keeps
/// 2 dp.
pub fn compute_invoice(draft: InvoiceDraft) -> DomainResult<Invoice> {
    let InvoiceDraft {
        kind,
        party_id,
        with_gst,
        line_results,
        previous_balance,
        payment_status,
        paid_amount,
    } = draft;

    for (index, r) in line_results.iter().enumerate() {
        if r.discount_amount > r.item_total
            || r.taxable_value.checked_add(r.tax_amount) != Some(r.total_after_discount)
        {
            return Err(DomainError::validation(format!(
                "line result {index} is inconsistent; recompute it from its line item"
            )));
        }
    }

    let whole_units = kind == InvoiceKind::Purchase;

    let subtotal = round_currency(checked_sum(line_results.iter().map(|r| r.taxable_value))?);
    let tax_total = round_currency(checked_sum(line_results.iter().map(|r| r.tax_amount))?);

    let mut invoice_total = if with_gst {
        checked_add(subtotal, tax_total)?
    } else {
        subtotal
    };
    if whole_units {
        invoice_total = round_whole(invoice_total);
    }

    // Returns interact with the balance through the settlement, not the invoice.
    let previous_balance_paid =
        if kind != InvoiceKind::Return && previous_balance > Decimal::ZERO {
            previous_balance
        } else {
            Decimal::ZERO
        };

    let grand_total = checked_add(invoice_total, previous_balance_paid)?;

    let paid_amount = match payment_status {
        PaymentStatus::FullyPaid => grand_total,
        PaymentStatus::PartiallyPaid => {
            let entered = paid_amount.unwrap_or(Decimal::ZERO);
            let entered = if whole_units { round_whole(entered) } else { entered };
            entered.max(Decimal::ZERO).min(grand_total)
        }
    };

    let balance_due = grand_total - paid_amount;

    tracing::trace!(
        ?kind,
        %invoice_total,
        %grand_total,
        %paid_amount,
        %balance_due,
        "invoice recomputed"
    );

    Ok(Invoice {
        kind,
        party_id,
        with_gst,
        line_results,
        subtotal,
        tax_total,
        invoice_total,
        previous_balance_snapshot: previous_balance,
        previous_balance_paid,
        grand_total,
        payment_status,
        paid_amount,
        balance_due,
    })
}
