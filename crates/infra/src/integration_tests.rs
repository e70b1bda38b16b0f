//! Integration tests for the full checkout pipeline.
//!
//! Tests: preview → submission guard → PartyLedger → CommitSink → PartyDirectory
//!
//! Verifies:
//! - Balances move exactly as the ledger formulas say, and replay agrees
//! - The submission lock is held for the whole submit and released on failure
//! - Sink failures leave the stored party untouched
//! - Stock policy and return confirmation gate what reaches the ledger

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tokio::sync::Notify;

    use stockbook_core::{
        AggregateRoot, CartKind, DomainError, ItemId, PartyId, TransactionId, TransactionType,
    };
    use stockbook_inventory::StockItem;
    use stockbook_invoicing::{DiscountType, PaymentStatus};
    use stockbook_parties::{ArchiveParty, OnboardParty, PartyRole, replay_balance};
    use stockbook_returns::ReturnType;

    use crate::checkout::{CartLine, CheckoutError, CheckoutService, InvoiceRequest, ReturnRequest};
    use crate::collaborators::{CommitRequest, CommitSink, CommitSinkError, PartyDirectory};
    use crate::config::{CheckoutConfig, StockPolicy};
    use crate::in_memory::{InMemoryCommitSink, InMemoryItemCatalog, InMemoryPartyDirectory};
    use crate::submission_guard::SubmissionGuard;

    type Service<S = InMemoryCommitSink> =
        CheckoutService<InMemoryItemCatalog, InMemoryPartyDirectory, S>;

    struct Fixture<S> {
        service: Service<S>,
        bolt: ItemId,
        nut: ItemId,
        /// Customer the shop sells to; opens at zero.
        customer: PartyId,
        /// Supplier the shop buys through; opens owing 1000.
        supplier: PartyId,
    }

    fn item(
        name: &str,
        sale_rate: Decimal,
        purchase_rate: Decimal,
        tax_rate: Decimal,
        qty: i64,
    ) -> StockItem {
        StockItem {
            id: ItemId::new(),
            name: name.to_string(),
            sale_rate,
            purchase_rate,
            tax_rate,
            available_quantity: qty,
        }
    }

    fn onboard(role: PartyRole, name: &str, opening_balance: Decimal) -> OnboardParty {
        OnboardParty {
            party_id: PartyId::new(),
            name: name.to_string(),
            role,
            opening_balance,
            occurred_at: Utc::now(),
        }
    }

    fn setup_with<S: CommitSink>(sink: S, config: CheckoutConfig) -> Fixture<S> {
        stockbook_observability::init();

        let catalog = InMemoryItemCatalog::new();
        let bolt = item("Hex bolt M8", dec!(100), dec!(80), dec!(18), 10);
        let nut = item("Hex nut M8", dec!(50), dec!(40), dec!(5), 2);
        let (bolt_id, nut_id) = (bolt.id, nut.id);
        catalog.insert(bolt).unwrap();
        catalog.insert(nut).unwrap();

        let service = CheckoutService::new(
            catalog,
            InMemoryPartyDirectory::new(),
            sink,
            Arc::new(SubmissionGuard::new()),
            config,
        );

        let customer = service
            .onboard_party(onboard(PartyRole::Seller, "Ravi Kirana", dec!(0)))
            .unwrap()
            .id_typed();
        let supplier = service
            .onboard_party(onboard(PartyRole::Buyer, "Mehta Hardware", dec!(1000)))
            .unwrap()
            .id_typed();

        Fixture {
            service,
            bolt: bolt_id,
            nut: nut_id,
            customer,
            supplier,
        }
    }

    fn setup() -> Fixture<InMemoryCommitSink> {
        setup_with(InMemoryCommitSink::new(), CheckoutConfig::default())
    }

    /// A sale priced against the party's current balance.
    fn sale<S>(
        fx: &Fixture<S>,
        party_id: PartyId,
        lines: Vec<CartLine>,
        paid: Option<Decimal>,
    ) -> InvoiceRequest {
        InvoiceRequest {
            kind: CartKind::Sale,
            party_id,
            with_gst: false,
            lines,
            payment_status: if paid.is_some() {
                PaymentStatus::PartiallyPaid
            } else {
                PaymentStatus::FullyPaid
            },
            paid_amount: paid,
            balance_snapshot: balance(fx, party_id),
        }
    }

    fn balance<S>(fx: &Fixture<S>, party_id: PartyId) -> Decimal {
        fx.service.directory().party(party_id).unwrap().balance_amount()
    }

    #[tokio::test]
    async fn fully_paid_sale_leaves_nothing_outstanding() {
        let fx = setup();
        let request = sale(&fx, fx.customer, vec![CartLine::new(fx.bolt, 2)], None);

        let receipt = fx.service.submit_invoice(&request, "sale:1").await.unwrap();

        let invoice = receipt.invoice.unwrap();
        assert_eq!(invoice.invoice_total, dec!(200));
        assert_eq!(invoice.paid_amount, dec!(200));
        assert_eq!(receipt.ledger_entry.balance_after, dec!(0));
        assert_eq!(receipt.ledger_entry.transaction_type, TransactionType::Sale);
        assert_eq!(balance(&fx, fx.customer), dec!(0));
        assert_eq!(fx.service.sink().statement(fx.customer).len(), 1);
        assert!(!fx.service.guard().is_locked());
    }

    #[tokio::test]
    async fn balance_is_conserved_across_sales_and_payments() {
        let fx = setup();

        let first = sale(&fx, fx.customer, vec![CartLine::new(fx.bolt, 3)], Some(dec!(100)));
        let r1 = fx.service.submit_invoice(&first, "sale:1").await.unwrap();
        assert_eq!(r1.ledger_entry.balance_after, dec!(200));

        let r2 = fx.service.submit_payment(fx.customer, dec!(50), "payment:1").await.unwrap();
        assert_eq!(r2.ledger_entry.balance_after, dec!(150));
        assert_eq!(r2.ledger_entry.this_transaction_amount, dec!(0));

        // The whole outstanding balance is folded into the next invoice.
        let second = sale(&fx, fx.customer, vec![CartLine::new(fx.bolt, 1)], Some(dec!(0)));
        let r3 = fx.service.submit_invoice(&second, "sale:2").await.unwrap();
        let invoice = r3.invoice.unwrap();
        assert_eq!(invoice.previous_balance_paid, dec!(150));
        assert_eq!(invoice.grand_total, dec!(250));
        assert_eq!(r3.ledger_entry.balance_after, dec!(250));

        let statement = fx.service.sink().statement(fx.customer);
        assert_eq!(statement.len(), 3);
        assert_eq!(replay_balance(dec!(0), &statement).unwrap(), dec!(250));
        assert_eq!(balance(&fx, fx.customer), dec!(250));
    }

    #[tokio::test]
    async fn gst_inclusive_sale_extracts_tax_from_the_rate() {
        let fx = setup();
        let mut request = sale(&fx, fx.customer, vec![CartLine::new(fx.bolt, 1)], None);
        request.with_gst = true;

        let preview = fx.service.preview_invoice(&request).unwrap();
        assert_eq!(preview.invoice.subtotal, dec!(84.75));
        assert_eq!(preview.invoice.tax_total, dec!(15.25));
        assert_eq!(preview.invoice.invoice_total, dec!(100));
    }

    #[tokio::test]
    async fn purchases_settle_in_whole_units() {
        let fx = setup();
        let request = InvoiceRequest {
            kind: CartKind::Purchase,
            party_id: fx.supplier,
            with_gst: false,
            lines: vec![CartLine::new(fx.bolt, 1).with_discount(DiscountType::Amount, dec!(0.4))],
            payment_status: PaymentStatus::PartiallyPaid,
            paid_amount: Some(dec!(500.4)),
            balance_snapshot: dec!(1000),
        };

        let receipt = fx.service.submit_invoice(&request, "purchase:1").await.unwrap();

        let invoice = receipt.invoice.unwrap();
        assert_eq!(invoice.invoice_total, dec!(80));
        assert_eq!(invoice.grand_total, dec!(1080));
        assert_eq!(invoice.paid_amount, dec!(500));
        assert_eq!(receipt.ledger_entry.transaction_type, TransactionType::Purchase);
        assert_eq!(receipt.ledger_entry.balance_after, dec!(580));
        assert_eq!(balance(&fx, fx.supplier), dec!(580));
    }

    #[tokio::test]
    async fn previews_do_not_lock_or_post() {
        let fx = setup();
        let request = sale(&fx, fx.customer, vec![CartLine::new(fx.bolt, 2)], None);

        let preview = fx.service.preview_invoice(&request).unwrap();

        assert_eq!(preview.invoice.invoice_total, dec!(200));
        assert!(preview.screen.is_clean());
        assert!(!fx.service.guard().is_locked());
        assert!(fx.service.sink().transactions().is_empty());
    }

    struct GatedSink {
        inner: InMemoryCommitSink,
        gate: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl CommitSink for GatedSink {
        async fn commit(&self, request: CommitRequest) -> Result<TransactionId, CommitSinkError> {
            self.gate.notified().await;
            self.inner.commit(request).await
        }
    }

    #[tokio::test]
    async fn second_submission_fails_fast_while_one_is_in_flight() {
        let gate = Arc::new(Notify::new());
        let sink = GatedSink {
            inner: InMemoryCommitSink::new(),
            gate: gate.clone(),
        };
        let fx = setup_with(sink, CheckoutConfig::default());

        let first = fx.service.submit_payment(fx.supplier, dec!(100), "payment:first");
        let second = async {
            let result = fx.service.submit_payment(fx.supplier, dec!(5), "payment:second").await;
            assert!(fx.service.guard().is_locked());
            assert_eq!(fx.service.guard().active_key().as_deref(), Some("payment:first"));
            gate.notify_one();
            result
        };

        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap().ledger_entry.balance_after, dec!(900));
        match second.unwrap_err() {
            CheckoutError::Domain(DomainError::SubmissionLocked { active_key }) => {
                assert_eq!(active_key.as_deref(), Some("payment:first"));
            }
            other => panic!("expected SubmissionLocked, got {other:?}"),
        }
        assert!(!fx.service.guard().is_locked());
        assert_eq!(fx.service.sink().inner.statement(fx.supplier).len(), 1);
    }

    #[tokio::test]
    async fn sink_failure_releases_lock_and_keeps_balance() {
        let fx = setup();
        let version_before = fx.service.directory().party(fx.supplier).unwrap().version();
        fx.service
            .sink()
            .fail_next(CommitSinkError::Unavailable("connection reset".to_string()));

        let err = fx
            .service
            .submit_payment(fx.supplier, dec!(300), "payment:1")
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Commit(CommitSinkError::Unavailable(_))));
        assert!(err.is_recoverable());
        assert!(!fx.service.guard().is_locked());
        let party = fx.service.directory().party(fx.supplier).unwrap();
        assert_eq!(party.balance_amount(), dec!(1000));
        assert_eq!(party.version(), version_before);
        assert!(fx.service.sink().statement(fx.supplier).is_empty());

        let retry = fx.service.submit_payment(fx.supplier, dec!(300), "payment:1").await.unwrap();
        assert_eq!(retry.ledger_entry.balance_after, dec!(700));
    }

    #[tokio::test]
    async fn out_of_stock_line_blocks_by_default() {
        let fx = setup();
        let request = sale(
            &fx,
            fx.customer,
            vec![CartLine::new(fx.bolt, 2), CartLine::new(fx.nut, 5)],
            None,
        );

        let preview = fx.service.preview_invoice(&request).unwrap();
        assert_eq!(preview.invoice.invoice_total, dec!(200));
        assert!(preview.screen.has_stock_rejections());

        match fx.service.submit_invoice(&request, "sale:1").await.unwrap_err() {
            CheckoutError::LinesRejected(rejected) => {
                assert_eq!(rejected.len(), 1);
                assert_eq!(rejected[0].index, 1);
                assert_eq!(rejected[0].item_id, fx.nut);
            }
            other => panic!("expected LinesRejected, got {other:?}"),
        }
        assert!(fx.service.sink().transactions().is_empty());
        assert!(!fx.service.guard().is_locked());
    }

    #[tokio::test]
    async fn warn_policy_drops_out_of_stock_lines() {
        let config = CheckoutConfig {
            stock_policy: StockPolicy::Warn,
            ..CheckoutConfig::default()
        };
        let fx = setup_with(InMemoryCommitSink::new(), config);
        let request = sale(
            &fx,
            fx.customer,
            vec![CartLine::new(fx.nut, 5), CartLine::new(fx.bolt, 2)],
            None,
        );

        let receipt = fx.service.submit_invoice(&request, "sale:1").await.unwrap();

        assert_eq!(receipt.dropped_lines.len(), 1);
        assert_eq!(receipt.dropped_lines[0].index, 0);
        assert_eq!(receipt.invoice.unwrap().invoice_total, dec!(200));
        let tx = &fx.service.sink().transactions()[0];
        assert_eq!(tx.payload["line_items"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn invalid_and_unknown_lines_block_under_any_policy() {
        let config = CheckoutConfig {
            stock_policy: StockPolicy::Warn,
            ..CheckoutConfig::default()
        };
        let fx = setup_with(InMemoryCommitSink::new(), config);
        let unknown = ItemId::new();
        let request = sale(
            &fx,
            fx.customer,
            vec![
                CartLine::new(unknown, 1),
                CartLine::new(fx.bolt, 0),
                CartLine::new(fx.bolt, 1),
            ],
            None,
        );

        let preview = fx.service.preview_invoice(&request).unwrap();
        assert_eq!(preview.screen.accepted.len(), 1);
        assert_eq!(preview.invoice.invoice_total, dec!(100));

        match fx.service.submit_invoice(&request, "sale:1").await.unwrap_err() {
            CheckoutError::LinesRejected(rejected) => {
                let indexes: Vec<usize> = rejected.iter().map(|r| r.index).collect();
                assert_eq!(indexes, vec![0, 1]);
                assert_eq!(rejected[0].error, DomainError::NotFound);
                assert!(matches!(rejected[1].error, DomainError::Validation(_)));
            }
            other => panic!("expected LinesRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_cart_is_refused() {
        let fx = setup();
        let request = sale(&fx, fx.customer, vec![], None);

        let err = fx.service.submit_invoice(&request, "sale:1").await.unwrap_err();

        assert!(matches!(err, CheckoutError::EmptyCart));
        assert!(!fx.service.guard().is_locked());
    }

    #[tokio::test]
    async fn adjust_return_beyond_balance_needs_confirmation() {
        let fx = setup();
        let credit_sale = sale(&fx, fx.customer, vec![CartLine::new(fx.bolt, 3)], Some(dec!(100)));
        fx.service.submit_invoice(&credit_sale, "sale:1").await.unwrap();
        assert_eq!(balance(&fx, fx.customer), dec!(200));

        let mut request = ReturnRequest {
            kind: CartKind::ReturnFromSeller,
            party_id: fx.customer,
            with_gst: false,
            lines: vec![CartLine::new(fx.bolt, 3)],
            return_type: ReturnType::Adjust,
            balance_snapshot: dec!(200),
            confirmed_cash: None,
        };

        let preview = fx.service.preview_return(&request).unwrap();
        assert!(preview.decision.requires_confirmation);
        assert_eq!(preview.decision.settlement.adjustment_amount, dec!(200));
        assert_eq!(preview.decision.settlement.cash_payment_required, dec!(100));

        let err = fx.service.submit_return(&request, "return:1").await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Domain(DomainError::ConfirmationRequired { cash_payment_required })
                if cash_payment_required == dec!(100)
        ));
        assert!(!fx.service.guard().is_locked());
        assert_eq!(balance(&fx, fx.customer), dec!(200));

        request.confirmed_cash = Some(preview.decision.settlement.cash_payment_required);
        let receipt = fx.service.submit_return(&request, "return:1").await.unwrap();

        assert_eq!(receipt.ledger_entry.transaction_type, TransactionType::Return);
        assert_eq!(receipt.ledger_entry.balance_after, dec!(0));
        assert_eq!(receipt.ledger_entry.paid_amount, dec!(100));
        assert_eq!(balance(&fx, fx.customer), dec!(0));

        let tx = fx.service.sink().transactions().pop().unwrap();
        assert_eq!(tx.payload["settlement"]["return_type"], "adjust");

        let statement = fx.service.sink().statement(fx.customer);
        assert_eq!(replay_balance(dec!(0), &statement).unwrap(), dec!(0));
    }

    #[tokio::test]
    async fn invoice_priced_on_a_stale_balance_conflicts() {
        let fx = setup();
        let request = InvoiceRequest {
            kind: CartKind::Purchase,
            party_id: fx.supplier,
            with_gst: false,
            lines: vec![CartLine::new(fx.bolt, 1)],
            payment_status: PaymentStatus::FullyPaid,
            paid_amount: None,
            balance_snapshot: dec!(1000),
        };
        let preview = fx.service.preview_invoice(&request).unwrap();
        assert_eq!(preview.invoice.grand_total, dec!(1080));

        fx.service.submit_payment(fx.supplier, dec!(200), "payment:1").await.unwrap();

        let err = fx.service.submit_invoice(&request, "purchase:1").await.unwrap_err();
        assert!(matches!(err, CheckoutError::Domain(DomainError::Conflict(_))));
        assert!(err.is_recoverable());
        assert!(!fx.service.guard().is_locked());
        assert_eq!(balance(&fx, fx.supplier), dec!(800));
        assert_eq!(fx.service.sink().statement(fx.supplier).len(), 1);
    }

    #[tokio::test]
    async fn confirmed_payout_is_not_stretched_by_a_later_payment() {
        let fx = setup();
        let credit_sale = sale(&fx, fx.customer, vec![CartLine::new(fx.bolt, 3)], Some(dec!(100)));
        fx.service.submit_invoice(&credit_sale, "sale:1").await.unwrap();

        let mut request = ReturnRequest {
            kind: CartKind::ReturnFromSeller,
            party_id: fx.customer,
            with_gst: false,
            lines: vec![CartLine::new(fx.bolt, 3)],
            return_type: ReturnType::Adjust,
            balance_snapshot: balance(&fx, fx.customer),
            confirmed_cash: None,
        };
        let preview = fx.service.preview_return(&request).unwrap();
        assert_eq!(preview.decision.settlement.cash_payment_required, dec!(100));
        request.confirmed_cash = Some(dec!(100));

        fx.service.submit_payment(fx.customer, dec!(200), "payment:1").await.unwrap();

        let err = fx.service.submit_return(&request, "return:1").await.unwrap_err();
        assert!(matches!(err, CheckoutError::Domain(DomainError::Conflict(_))));
        assert!(!fx.service.guard().is_locked());
        assert_eq!(balance(&fx, fx.customer), dec!(0));
        assert_eq!(fx.service.sink().statement(fx.customer).len(), 2);

        // Re-priced on the fresh balance, the old confirmation no longer covers it.
        request.balance_snapshot = balance(&fx, fx.customer);
        let err = fx.service.submit_return(&request, "return:1").await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Domain(DomainError::ConfirmationRequired { cash_payment_required })
                if cash_payment_required == dec!(300)
        ));
        assert_eq!(fx.service.sink().statement(fx.customer).len(), 2);

        request.confirmed_cash = Some(dec!(300));
        let receipt = fx.service.submit_return(&request, "return:1").await.unwrap();
        assert_eq!(receipt.ledger_entry.paid_amount, dec!(300));
        assert_eq!(receipt.ledger_entry.balance_after, dec!(0));
    }

    #[tokio::test]
    async fn cash_return_leaves_balance_alone() {
        let fx = setup();
        let request = ReturnRequest {
            kind: CartKind::ReturnToBuyer,
            party_id: fx.supplier,
            with_gst: false,
            lines: vec![CartLine::new(fx.nut, 1)],
            return_type: ReturnType::Cash,
            balance_snapshot: dec!(1000),
            confirmed_cash: None,
        };

        let receipt = fx.service.submit_return(&request, "return:1").await.unwrap();

        let settlement = receipt.settlement.unwrap();
        assert_eq!(settlement.return_type(), ReturnType::Cash);
        assert_eq!(settlement.settlement().cash_payment_required, dec!(40));
        assert_eq!(receipt.ledger_entry.balance_after, dec!(1000));
        assert_eq!(receipt.ledger_entry.paid_amount, dec!(40));
        assert_eq!(balance(&fx, fx.supplier), dec!(1000));
    }

    #[tokio::test]
    async fn return_to_buyer_respects_stock() {
        let fx = setup();
        let request = ReturnRequest {
            kind: CartKind::ReturnToBuyer,
            party_id: fx.supplier,
            with_gst: false,
            lines: vec![CartLine::new(fx.nut, 3)],
            return_type: ReturnType::Adjust,
            balance_snapshot: dec!(1000),
            confirmed_cash: None,
        };

        let err = fx.service.submit_return(&request, "return:1").await.unwrap_err();

        assert!(matches!(err, CheckoutError::LinesRejected(_)));
        assert_eq!(balance(&fx, fx.supplier), dec!(1000));
    }

    #[tokio::test]
    async fn cart_kind_must_match_party_role() {
        let fx = setup();
        let request = sale(&fx, fx.supplier, vec![CartLine::new(fx.bolt, 1)], None);

        let err = fx.service.submit_invoice(&request, "sale:1").await.unwrap_err();

        assert!(matches!(err, CheckoutError::Domain(DomainError::Validation(_))));
        assert!(fx.service.sink().transactions().is_empty());
    }

    #[tokio::test]
    async fn archived_party_cannot_transact() {
        let fx = setup();
        fx.service
            .archive_party(ArchiveParty {
                party_id: fx.supplier,
                reason: Some("closed down".to_string()),
                occurred_at: Utc::now(),
            })
            .unwrap();

        let err = fx
            .service
            .submit_payment(fx.supplier, dec!(10), "payment:1")
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Domain(DomainError::Validation(_))));
        assert_eq!(balance(&fx, fx.supplier), dec!(1000));
    }

    #[tokio::test]
    async fn unknown_party_is_not_found() {
        let fx = setup();

        let err = fx
            .service
            .submit_payment(PartyId::new(), dec!(10), "payment:1")
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Domain(DomainError::NotFound)));
        assert!(!fx.service.guard().is_locked());
    }

    #[test]
    fn onboarding_the_same_party_twice_conflicts() {
        let fx = setup();
        let mut again = onboard(PartyRole::Seller, "Ravi Kirana", dec!(0));
        again.party_id = fx.customer;

        let err = fx.service.onboard_party(again).unwrap_err();

        assert!(matches!(err, DomainError::Conflict(_)));
    }
}
