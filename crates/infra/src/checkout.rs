//! Checkout orchestration.
//!
//! `CheckoutService` composes the domain crates with the collaborator traits.
//! Previews are pure reads and can run on every keystroke. Submissions follow
//! one fixed pipeline:
//!
//! ```text
//! acquire submission permit (fail fast if anything is in flight)
//!   ↓
//! re-read the party; refuse if its balance moved since the preview
//!   ↓
//! recompute the cart from scratch
//!   ↓
//! admit lines per the stock policy; match any confirmed cash payout
//!   ↓
//! post to a copy of the party through PartyLedger
//!   ↓
//! commit sink (transaction + ledger entry, atomically)
//!   ↓
//! save the party (optimistic version check)
//!   ↓
//! permit dropped: lock released on every path
//! ```
//!
//! Nothing a preview returned is trusted at submit time: a submission
//! recomputes against the balance it reads while holding the permit, and
//! only goes ahead when that is the balance the user was shown.
//!
//! If the sink fails, the party copy is discarded and the stored balance is
//! untouched. If the sink succeeds but the party save fails, the transaction
//! is already durable; the error is logged and surfaced so the directory can
//! be reconciled from the sink's statement.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockbook_core::{
    Aggregate, AggregateRoot, CartKind, DomainError, DomainResult, ExpectedVersion, ItemId,
    LedgerEntryId, PartyId, TransactionId,
};
use stockbook_invoicing::{
    CartScreen, DiscountType, Invoice, InvoiceDraft, LineItem, LineRejection, PaymentStatus,
    compute_invoice, screen_cart,
};
use stockbook_inventory::StockItem;
use stockbook_parties::{
    ArchiveParty, LedgerEntry, LedgerPosting, OnboardParty, Party, PartyCommand, PartyLedger,
    PartyRole, Posting,
};
use stockbook_returns::{
    ConfirmedSettlement, ReturnSettlementResolver, ReturnType, SettlementDecision,
};

use crate::collaborators::{
    CommitRequest, CommitSink, CommitSinkError, ItemCatalog, PartyDirectory, ReturnCommit,
};
use crate::config::{CheckoutConfig, StockPolicy};
use crate::submission_guard::SubmissionGuard;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Lines were held back and the submission cannot proceed without them.
    #[error("{} cart line(s) rejected", .0.len())]
    LinesRejected(Vec<LineRejection>),

    #[error("cart has no accepted lines")]
    EmptyCart,

    #[error(transparent)]
    Commit(#[from] CommitSinkError),
}

impl CheckoutError {
    /// Whether the user can fix or retry this without outside help.
    pub fn is_recoverable(&self) -> bool {
        match self {
            CheckoutError::Domain(e) => e.is_recoverable(),
            CheckoutError::LinesRejected(_) | CheckoutError::EmptyCart => true,
            CheckoutError::Commit(CommitSinkError::Unavailable(_)) => true,
            CheckoutError::Commit(CommitSinkError::Rejected(_)) => false,
        }
    }
}

/// One line as the user entered it; rate and tax come from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: ItemId,
    pub quantity: i64,
    #[serde(default)]
    pub discount_type: DiscountType,
    #[serde(default)]
    pub discount_value: Option<Decimal>,
}

impl CartLine {
    pub fn new(item_id: ItemId, quantity: i64) -> Self {
        Self {
            item_id,
            quantity,
            discount_type: DiscountType::Amount,
            discount_value: None,
        }
    }

    pub fn with_discount(mut self, discount_type: DiscountType, value: Decimal) -> Self {
        self.discount_type = discount_type;
        self.discount_value = Some(value);
        self
    }

    fn price(&self, item: &StockItem, kind: CartKind) -> LineItem {
        LineItem {
            discount_type: self.discount_type,
            discount_value: self.discount_value,
            ..LineItem::from_stock(item, kind, self.quantity)
        }
    }
}

/// A purchase or sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub kind: CartKind,
    pub party_id: PartyId,
    pub with_gst: bool,
    pub lines: Vec<CartLine>,
    pub payment_status: PaymentStatus,
    /// Only read when `payment_status` is partial.
    pub paid_amount: Option<Decimal>,
    /// The party balance the preview was priced against. Submission is
    /// refused with a conflict once the balance has moved.
    pub balance_snapshot: Decimal,
}

/// A return in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub kind: CartKind,
    pub party_id: PartyId,
    pub with_gst: bool,
    pub lines: Vec<CartLine>,
    pub return_type: ReturnType,
    /// The party balance the preview was settled against.
    pub balance_snapshot: Decimal,
    /// The cash payout the user accepted, as shown in the preview.
    #[serde(default)]
    pub confirmed_cash: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoicePreview {
    pub invoice: Invoice,
    pub screen: CartScreen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnPreview {
    pub invoice: Invoice,
    pub screen: CartScreen,
    pub decision: SettlementDecision,
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub transaction_id: TransactionId,
    pub ledger_entry: LedgerEntry,
    pub invoice: Option<Invoice>,
    pub settlement: Option<ConfirmedSettlement>,
    /// Out-of-stock lines left out under [`StockPolicy::Warn`].
    pub dropped_lines: Vec<LineRejection>,
}

/// Which party role a cart kind transacts with.
fn expected_role(kind: CartKind) -> PartyRole {
    match kind {
        CartKind::Purchase | CartKind::ReturnToBuyer => PartyRole::Buyer,
        CartKind::Sale | CartKind::ReturnFromSeller => PartyRole::Seller,
    }
}

pub struct CheckoutService<C, D, S> {
    catalog: C,
    directory: D,
    sink: S,
    guard: Arc<SubmissionGuard>,
    config: CheckoutConfig,
    ledger: PartyLedger,
    resolver: ReturnSettlementResolver,
}

impl<C, D, S> CheckoutService<C, D, S> {
    /// `guard` is the process-wide submission lock; share one instance
    /// between every service that can post to a ledger.
    pub fn new(
        catalog: C,
        directory: D,
        sink: S,
        guard: Arc<SubmissionGuard>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            catalog,
            directory,
            sink,
            guard,
            config,
            ledger: PartyLedger::new(),
            resolver: ReturnSettlementResolver::new(),
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn guard(&self) -> &SubmissionGuard {
        &self.guard
    }

    pub fn config(&self) -> CheckoutConfig {
        self.config
    }
}

impl<C, D, S> CheckoutService<C, D, S>
where
    C: ItemCatalog,
    D: PartyDirectory,
    S: CommitSink,
{
    pub fn onboard_party(&self, command: OnboardParty) -> DomainResult<Party> {
        let party = Party::empty(command.party_id);
        self.execute(party, PartyCommand::OnboardParty(command))
    }

    pub fn archive_party(&self, command: ArchiveParty) -> DomainResult<Party> {
        let party = self.load_party(command.party_id)?;
        self.execute(party, PartyCommand::ArchiveParty(command))
    }

    /// Run `command` against `party` and save it over the copy it was loaded as.
    fn execute(&self, mut party: Party, command: PartyCommand) -> DomainResult<Party> {
        let expected = party.expected_version();
        party.execute(&command)?;
        self.directory.save(party.clone(), expected)?;
        Ok(party)
    }

    fn load_party(&self, party_id: PartyId) -> DomainResult<Party> {
        self.directory.party(party_id).ok_or(DomainError::NotFound)
    }

    fn ensure_role(party: &Party, kind: CartKind) -> DomainResult<()> {
        let expected = expected_role(kind);
        if party.is_onboarded() && party.role() != expected {
            return Err(DomainError::validation(format!(
                "{kind:?} carts need a {expected:?} party, got {:?}",
                party.role()
            )));
        }
        Ok(())
    }

    /// Look up and screen every line. Unknown items are rejected with
    /// `NotFound` at their original position.
    fn screen(&self, kind: CartKind, with_gst: bool, lines: &[CartLine]) -> CartScreen {
        let mut priced = Vec::with_capacity(lines.len());
        let mut positions = Vec::with_capacity(lines.len());
        let mut unknown = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            match self.catalog.item(line.item_id) {
                Some(item) => {
                    positions.push(index);
                    priced.push(line.price(&item, kind));
                }
                None => unknown.push(LineRejection {
                    index,
                    item_id: line.item_id,
                    error: DomainError::NotFound,
                }),
            }
        }

        let mut screen = screen_cart(&priced, kind, with_gst);
        for rejection in &mut screen.rejected {
            rejection.index = positions[rejection.index];
        }
        screen.rejected.extend(unknown);
        screen.rejected.sort_by_key(|r| r.index);
        screen
    }

    /// Apply the stock policy and empty-cart rule; returns the lines dropped.
    fn admit(&self, screen: &CartScreen) -> Result<Vec<LineRejection>, CheckoutError> {
        let (stock, other): (Vec<_>, Vec<_>) = screen
            .rejected
            .iter()
            .cloned()
            .partition(|r| matches!(r.error, DomainError::InsufficientStock { .. }));

        let blocked = !stock.is_empty() && self.config.stock_policy == StockPolicy::Block;
        if !other.is_empty() || blocked {
            return Err(CheckoutError::LinesRejected(screen.rejected.clone()));
        }

        for rejection in &stock {
            tracing::warn!(
                index = rejection.index,
                item_id = %rejection.item_id,
                error = %rejection.error,
                "dropping out-of-stock line"
            );
        }

        if screen.accepted.is_empty() && !self.config.allow_empty_cart {
            return Err(CheckoutError::EmptyCart);
        }

        Ok(stock)
    }

    fn build_invoice(
        &self,
        party: &Party,
        request: &InvoiceRequest,
    ) -> DomainResult<InvoicePreview> {
        if request.kind.is_return() {
            return Err(DomainError::validation("return carts go through the return flow"));
        }
        Self::ensure_role(party, request.kind)?;

        let screen = self.screen(request.kind, request.with_gst, &request.lines);
        let invoice = compute_invoice(InvoiceDraft {
            kind: request.kind.invoice_kind(),
            party_id: request.party_id,
            with_gst: request.with_gst,
            line_results: screen.results(),
            previous_balance: party.balance_amount(),
            payment_status: request.payment_status,
            paid_amount: request.paid_amount,
        })?;

        Ok(InvoicePreview { invoice, screen })
    }

    fn build_return(
        &self,
        party: &Party,
        request: &ReturnRequest,
    ) -> DomainResult<ReturnPreview> {
        if !request.kind.is_return() {
            return Err(DomainError::validation("only return carts can be settled as returns"));
        }
        Self::ensure_role(party, request.kind)?;

        let screen = self.screen(request.kind, request.with_gst, &request.lines);
        let invoice = compute_invoice(InvoiceDraft {
            kind: request.kind.invoice_kind(),
            party_id: request.party_id,
            with_gst: request.with_gst,
            line_results: screen.results(),
            previous_balance: party.balance_amount(),
            payment_status: PaymentStatus::FullyPaid,
            paid_amount: None,
        })?;
        let decision = self.resolver.resolve(
            invoice.invoice_total,
            party.balance_amount(),
            request.return_type,
        )?;

        Ok(ReturnPreview {
            invoice,
            screen,
            decision,
        })
    }

    pub fn preview_invoice(&self, request: &InvoiceRequest) -> DomainResult<InvoicePreview> {
        let party = self.load_party(request.party_id)?;
        self.build_invoice(&party, request)
    }

    pub fn preview_return(&self, request: &ReturnRequest) -> DomainResult<ReturnPreview> {
        let party = self.load_party(request.party_id)?;
        self.build_return(&party, request)
    }

    pub async fn submit_invoice(
        &self,
        request: &InvoiceRequest,
        key: &str,
    ) -> Result<CommitReceipt, CheckoutError> {
        let _permit = self.guard.acquire(key)?;

        let mut party = self.load_party(request.party_id)?;
        Self::ensure_balance_unchanged(&party, request.balance_snapshot)?;
        let expected = party.expected_version();
        let InvoicePreview { invoice, screen } = self.build_invoice(&party, request)?;
        let dropped_lines = self.admit(&screen)?;

        let entry = self.post(&mut party, Posting::from_invoice(&invoice)?)?;
        let transaction_id = self
            .commit(CommitRequest {
                party_id: request.party_id,
                transaction_type: entry.transaction_type,
                line_items: screen.lines(),
                with_gst: request.with_gst,
                payment_status: Some(invoice.payment_status),
                paid_amount: invoice.paid_amount,
                ledger_entry: entry.clone(),
                settlement: None,
            })
            .await?;
        self.persist(party, expected)?;

        Ok(CommitReceipt {
            transaction_id,
            ledger_entry: entry,
            invoice: Some(invoice),
            settlement: None,
            dropped_lines,
        })
    }

    pub async fn submit_return(
        &self,
        request: &ReturnRequest,
        key: &str,
    ) -> Result<CommitReceipt, CheckoutError> {
        let _permit = self.guard.acquire(key)?;

        let mut party = self.load_party(request.party_id)?;
        Self::ensure_balance_unchanged(&party, request.balance_snapshot)?;
        let expected = party.expected_version();
        let ReturnPreview {
            invoice,
            screen,
            decision,
        } = self.build_return(&party, request)?;
        let dropped_lines = self.admit(&screen)?;
        let settlement = decision.confirm_cash(request.confirmed_cash)?;

        let entry = self.post(&mut party, Posting::from_settlement(&settlement))?;
        let transaction_id = self
            .commit(CommitRequest {
                party_id: request.party_id,
                transaction_type: entry.transaction_type,
                line_items: screen.lines(),
                with_gst: request.with_gst,
                payment_status: None,
                paid_amount: entry.paid_amount,
                ledger_entry: entry.clone(),
                settlement: Some(ReturnCommit {
                    return_type: settlement.return_type(),
                    settlement: settlement.settlement().clone(),
                }),
            })
            .await?;
        self.persist(party, expected)?;

        Ok(CommitReceipt {
            transaction_id,
            ledger_entry: entry,
            invoice: Some(invoice),
            settlement: Some(settlement),
            dropped_lines,
        })
    }

    /// Record money received from (or paid to) a party outside any invoice.
    pub async fn submit_payment(
        &self,
        party_id: PartyId,
        amount: Decimal,
        key: &str,
    ) -> Result<CommitReceipt, CheckoutError> {
        let _permit = self.guard.acquire(key)?;

        let mut party = self.load_party(party_id)?;
        let expected = party.expected_version();

        let entry = self.post(&mut party, Posting::payment(amount))?;
        let transaction_id = self
            .commit(CommitRequest {
                party_id,
                transaction_type: entry.transaction_type,
                line_items: Vec::new(),
                with_gst: false,
                payment_status: None,
                paid_amount: entry.paid_amount,
                ledger_entry: entry.clone(),
                settlement: None,
            })
            .await?;
        self.persist(party, expected)?;

        Ok(CommitReceipt {
            transaction_id,
            ledger_entry: entry,
            invoice: None,
            settlement: None,
            dropped_lines: Vec::new(),
        })
    }

    /// A submission must settle against the balance its preview showed.
    fn ensure_balance_unchanged(party: &Party, snapshot: Decimal) -> DomainResult<()> {
        if party.balance_amount() != snapshot {
            tracing::warn!(
                party_id = %party.id_typed(),
                %snapshot,
                current = %party.balance_amount(),
                "balance moved since preview"
            );
            return Err(DomainError::conflict(format!(
                "party balance moved from {snapshot} to {} since the preview",
                party.balance_amount()
            )));
        }
        Ok(())
    }

    fn post(&self, party: &mut Party, posting: Posting) -> DomainResult<LedgerEntry> {
        let posting = LedgerPosting {
            party_id: party.id_typed(),
            entry_id: LedgerEntryId::new(),
            posting,
            occurred_at: Utc::now(),
        };
        self.ledger.apply(party, posting)
    }

    async fn commit(&self, request: CommitRequest) -> Result<TransactionId, CheckoutError> {
        let party_id = request.party_id;
        let transaction_type = request.transaction_type;

        let transaction_id = self.sink.commit(request).await.map_err(|err| {
            tracing::error!(
                %party_id,
                %transaction_type,
                error = %err,
                "commit failed; balance unchanged"
            );
            CheckoutError::from(err)
        })?;

        tracing::info!(%party_id, %transaction_type, %transaction_id, "transaction committed");
        Ok(transaction_id)
    }

    fn persist(&self, party: Party, expected: ExpectedVersion) -> DomainResult<()> {
        let party_id = party.id_typed();
        self.directory.save(party, expected).inspect_err(|err| {
            tracing::error!(
                %party_id,
                error = %err,
                "transaction committed but party save failed; reconcile from statement"
            );
        })
    }
}
