use super::*;

use std::thread;

use chrono::{Duration, TimeZone};
use hourglass_rs::{SafeTimeProvider, TimeSource};

use crate::decimal::Rate;
use crate::errors::ErrorKind;
use crate::types::{ContractStatus, EntryStatus, PaymentComponent};

struct Fixture {
    engine: LedgerEngine,
    time: Arc<SafeTimeProvider>,
}

impl Fixture {
    /// clock at 2024-01-16 09:00, fifteen days into a loan started 2024-01-01
    fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    fn with_config(config: LedgerConfig) -> Self {
        let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 1, 16, 9, 0, 0).unwrap(),
        )));
        let engine = LedgerEngine::in_memory(config, time.clone()).unwrap();
        Self { engine, time }
    }

    fn advance_days(&self, days: i64) {
        self.time.test_control().unwrap().advance(Duration::days(days));
    }

    fn now(&self) -> DateTime<Utc> {
        Clock::now(&*self.time)
    }

    fn today(&self) -> NaiveDate {
        Clock::today(&*self.time)
    }

    fn loan(&self) -> LoanId {
        self.engine.register_loan(new_loan(), "teller-01").unwrap().id
    }

    fn pay(&self, loan_id: LoanId, amount: i64) -> Result<Payment> {
        self.engine
            .apply_payment(loan_id, Money::from_minor(amount), self.now(), "teller-01")
    }

    fn due_today(&self, loan_id: LoanId) -> AmountDue {
        self.engine.get_amount_due(loan_id, self.today()).unwrap()
    }

    /// advance past due, record a decision and list
    fn listed(&self) -> (LoanId, Auction) {
        let loan_id = self.loan();
        self.advance_days(25);
        self.engine
            .record_auction_decision(loan_id, "unredeemed after notice", "manager-01")
            .unwrap();
        let auction = self.engine.create_auction(loan_id).unwrap();
        (loan_id, auction)
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn new_loan() -> NewLoan {
    NewLoan {
        loan_number: "LN-0001".to_string(),
        branch_id: "JKT01".to_string(),
        customer_id: "C-0042".to_string(),
        collateral_ids: vec!["gold-bracelet-12g".to_string()],
        principal: Money::from_minor(1_000_000),
        rate: Rate::from_bps(300),
        admin_fee: Money::ZERO,
        start_date: date(2024, 1, 1),
        due_date: date(2024, 1, 31),
    }
}

// ---------------------------------------------------------------------------
// interest & payments
// ---------------------------------------------------------------------------

#[test]
fn test_interest_only_payment_keeps_loan_active() {
    let fx = Fixture::new();
    let loan_id = fx.loan();

    let due = fx.due_today(loan_id);
    assert_eq!(due.elapsed_days, 15);
    assert_eq!(due.interest_accrued, Money::from_minor(15_000));
    assert_eq!(due.total_due, Money::from_minor(1_015_000));

    let payment = fx.pay(loan_id, 15_000).unwrap();
    assert_eq!(payment.breakdown.interest_portion, Money::from_minor(15_000));
    assert_eq!(payment.breakdown.principal_portion, Money::ZERO);

    let due = fx.due_today(loan_id);
    assert_eq!(due.principal_remaining, Money::from_minor(1_000_000));
    assert_eq!(due.interest_accrued, Money::ZERO);
    assert_eq!(fx.engine.get_loan_status(loan_id).unwrap(), LoanStatus::Active);
}

#[test]
fn test_exact_principal_payment_repays_loan() {
    let fx = Fixture::new();
    let loan_id = fx.loan();

    fx.pay(loan_id, 15_000).unwrap();
    let payment = fx.pay(loan_id, 1_000_000).unwrap();
    assert_eq!(payment.breakdown.principal_portion, Money::from_minor(1_000_000));

    assert_eq!(fx.engine.get_loan_status(loan_id).unwrap(), LoanStatus::Lunas);
    // persisted in the same commit as the payment
    assert_eq!(fx.engine.loan(loan_id).unwrap().status, LoanStatus::Lunas);
    assert!(fx.engine.events().unwrap().iter().any(|e| matches!(
        e,
        LedgerEvent::StatusChanged {
            old_status: LoanStatus::Active,
            new_status: LoanStatus::Lunas,
            ..
        }
    )));

    let err = fx.pay(loan_id, 1).unwrap_err();
    assert!(matches!(err, LedgerError::TerminalState { status: LoanStatus::Lunas }));
    assert_eq!(err.kind(), ErrorKind::StateConflict);
}

#[test]
fn test_payment_allocates_interest_fee_principal() {
    let fx = Fixture::new();
    let loan_id = fx
        .engine
        .register_loan(
            NewLoan {
                admin_fee: Money::from_minor(10_000),
                ..new_loan()
            },
            "teller-01",
        )
        .unwrap()
        .id;

    let payment = fx.pay(loan_id, 100_000).unwrap();
    assert_eq!(payment.breakdown.interest_portion, Money::from_minor(15_000));
    assert_eq!(payment.breakdown.fee_portion, Money::from_minor(10_000));
    assert_eq!(payment.breakdown.principal_portion, Money::from_minor(75_000));

    let entry = fx.engine.cash_entry(payment.cash_entry_id).unwrap();
    assert_eq!(
        entry.source,
        CashSource::Payment {
            components: vec![
                PaymentComponent::Interest,
                PaymentComponent::AdminFee,
                PaymentComponent::Principal
            ]
        }
    );
}

#[test]
fn test_invalid_payment_amounts() {
    let fx = Fixture::new();
    let loan_id = fx.loan();

    assert!(matches!(fx.pay(loan_id, 0), Err(LedgerError::InvalidAmount { .. })));
    assert!(matches!(fx.pay(loan_id, -5), Err(LedgerError::InvalidAmount { .. })));

    let tomorrow = fx.now() + Duration::days(1);
    let err = fx
        .engine
        .apply_payment(loan_id, Money::from_minor(1_000), tomorrow, "teller-01")
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidDate { .. }));

    let err = fx.pay(Uuid::new_v4(), 1_000).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_overpayment_rejected_without_side_effects() {
    let fx = Fixture::new();
    let loan_id = fx.loan();
    let entries_before = fx.engine.cash_entries().unwrap();
    let events_before = fx.engine.events().unwrap();

    let err = fx.pay(loan_id, 1_015_001).unwrap_err();
    assert!(matches!(err, LedgerError::Overpayment { .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(fx.engine.cash_entries().unwrap(), entries_before);
    assert_eq!(fx.engine.events().unwrap(), events_before);
    assert!(fx.engine.payments(loan_id).unwrap().is_empty());
}

#[test]
fn test_overpayment_within_tolerance_books_only_due() {
    let fx = Fixture::with_config(LedgerConfig {
        overpayment_tolerance: Money::from_minor(1_000),
        ..LedgerConfig::default()
    });
    let loan_id = fx.loan();

    let payment = fx.pay(loan_id, 1_015_500).unwrap();
    assert_eq!(payment.amount, Money::from_minor(1_015_000));
    assert_eq!(
        fx.engine.cash_entry(payment.cash_entry_id).unwrap().amount,
        Money::from_minor(1_015_000)
    );
    assert_eq!(fx.engine.get_loan_status(loan_id).unwrap(), LoanStatus::Lunas);
}

#[test]
fn test_one_posted_entry_per_payment() {
    let fx = Fixture::new();
    let loan_id = fx.loan();

    for amount in [15_000, 200_000, 300_000] {
        fx.pay(loan_id, amount).unwrap();
    }
    let reversed = fx.engine.payments(loan_id).unwrap()[1].id;
    fx.engine
        .reverse_payment(reversed, "keyed against wrong loan", "supervisor-01")
        .unwrap();

    let entries = fx.engine.cash_entries().unwrap();
    let ledger = CashLedger::new(&entries);
    for payment in fx.engine.payments(loan_id).unwrap() {
        let posted = ledger.posted_for(EntryLink::Payment(payment.id));
        if payment.is_reversed() {
            assert!(posted.is_empty());
        } else {
            assert_eq!(posted.len(), 1);
            assert_eq!(posted[0].amount, payment.amount);
            assert_eq!(posted[0].id, payment.cash_entry_id);
        }
    }
    assert!(ledger.is_reconciled());

    let book = fx.engine.loan_book(loan_id).unwrap();
    assert!(book.paid_totals().principal <= book.loan.principal);
}

#[test]
fn test_amount_due_monotonic_and_capped_at_today() {
    let fx = Fixture::new();
    let loan_id = fx.loan();
    fx.advance_days(45);

    let mut previous = Money::ZERO;
    let mut day = date(2024, 1, 1);
    while day <= fx.today() {
        let due = fx.engine.get_amount_due(loan_id, day).unwrap();
        assert!(due.total_due >= previous);
        previous = due.total_due;
        day = day.succ_opt().unwrap();
    }

    let far = fx.engine.get_amount_due(loan_id, date(2030, 1, 1)).unwrap();
    assert_eq!(far, fx.due_today(loan_id));

    let err = fx.engine.get_amount_due(loan_id, date(2023, 12, 31)).unwrap_err();
    assert!(matches!(err, LedgerError::AsOfBeforeStart { .. }));
}

// ---------------------------------------------------------------------------
// reversals
// ---------------------------------------------------------------------------

#[test]
fn test_reversal_restores_amount_due() {
    let fx = Fixture::new();
    let loan_id = fx.loan();
    let before = fx.due_today(loan_id);

    let payment = fx.pay(loan_id, 500_000).unwrap();
    assert_ne!(fx.due_today(loan_id), before);

    fx.engine
        .reverse_payment(payment.id, "cheque bounced at clearing", "supervisor-01")
        .unwrap();
    assert_eq!(fx.due_today(loan_id), before);

    let stored = fx.engine.payment(payment.id).unwrap();
    let reversal = stored.reversal.unwrap();
    assert_eq!(reversal.reason, "cheque bounced at clearing");

    let original = fx.engine.cash_entry(payment.cash_entry_id).unwrap();
    assert_eq!(original.status, EntryStatus::Reversed);
    assert_eq!(original.amount, payment.amount);
    let compensating = fx.engine.cash_entry(reversal.cash_entry_id).unwrap();
    assert_eq!(compensating.entry_type, EntryType::Out);
    assert_eq!(compensating.reverses, Some(original.id));

    // disbursement only, once the reversed pair drops out
    let effective = fx.engine.cash_summary(LedgerView::Effective).unwrap();
    assert_eq!(effective.entries, 1);
    assert_eq!(effective.net, Money::from_minor(-1_000_000));
    let all = fx.engine.cash_summary(LedgerView::All).unwrap();
    assert_eq!(all.entries, 3);
    assert_eq!(all.net, effective.net);
}

#[test]
fn test_double_reversal_rejected() {
    let fx = Fixture::new();
    let loan_id = fx.loan();
    let payment = fx.pay(loan_id, 15_000).unwrap();

    fx.engine
        .reverse_payment(payment.id, "duplicate teller entry", "supervisor-01")
        .unwrap();
    let entries = fx.engine.cash_entries().unwrap().len();

    let err = fx
        .engine
        .reverse_payment(payment.id, "duplicate teller entry", "supervisor-01")
        .unwrap_err();
    assert!(matches!(err, LedgerError::PaymentAlreadyReversed { .. }));
    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert_eq!(fx.engine.cash_entries().unwrap().len(), entries);
}

#[test]
fn test_reversal_reason_required() {
    let fx = Fixture::new();
    let loan_id = fx.loan();
    let payment = fx.pay(loan_id, 15_000).unwrap();

    for reason in ["", "   ", "oops"] {
        let err = fx
            .engine
            .reverse_payment(payment.id, reason, "supervisor-01")
            .unwrap_err();
        assert!(matches!(err, LedgerError::TextTooShort { .. }));
    }
    assert!(!fx.engine.payment(payment.id).unwrap().is_reversed());
}

#[test]
fn test_reversing_repayment_reopens_by_due_date() {
    let fx = Fixture::new();
    let loan_id = fx.loan();
    fx.pay(loan_id, 15_000).unwrap();
    let repayment = fx.pay(loan_id, 1_000_000).unwrap();
    assert_eq!(fx.engine.loan(loan_id).unwrap().status, LoanStatus::Lunas);

    // 2024-02-05, past the due date
    fx.advance_days(20);
    fx.engine
        .reverse_payment(repayment.id, "transfer recalled by bank", "supervisor-01")
        .unwrap();

    assert_eq!(fx.engine.get_loan_status(loan_id).unwrap(), LoanStatus::Overdue);
    assert_eq!(fx.engine.loan(loan_id).unwrap().status, LoanStatus::Overdue);

    let due = fx.due_today(loan_id);
    assert_eq!(due.principal_remaining, Money::from_minor(1_000_000));
    assert_eq!(due.interest_accrued, Money::from_minor(20_000));
}

#[test]
fn test_reversing_repayment_before_due_reopens_active() {
    let fx = Fixture::new();
    let loan_id = fx.loan();
    let repayment = fx.pay(loan_id, 1_015_000).unwrap();

    fx.engine
        .reverse_payment(repayment.id, "paid on the wrong account", "supervisor-01")
        .unwrap();
    assert_eq!(fx.engine.loan(loan_id).unwrap().status, LoanStatus::Active);
}

// ---------------------------------------------------------------------------
// auctions & settlement
// ---------------------------------------------------------------------------

#[test]
fn test_auction_on_active_loan_rejected() {
    let fx = Fixture::new();
    let loan_id = fx.loan();

    let err = fx.engine.create_auction(loan_id).unwrap_err();
    assert!(matches!(err, LedgerError::LoanNotOverdue { status: LoanStatus::Active }));
    assert_eq!(err.kind(), ErrorKind::StateConflict);

    let err = fx
        .engine
        .record_auction_decision(loan_id, "premature", "manager-01")
        .unwrap_err();
    assert!(matches!(err, LedgerError::LoanNotOverdue { .. }));
}

#[test]
fn test_auction_requires_decision() {
    let fx = Fixture::new();
    let loan_id = fx.loan();
    fx.advance_days(25);

    assert!(matches!(
        fx.engine.create_auction(loan_id),
        Err(LedgerError::NoAuctionDecision { .. })
    ));
}

#[test]
fn test_auction_snapshot_frozen() {
    let fx = Fixture::new();
    let (loan_id, auction) = fx.listed();

    // 2024-02-10: 40 days accrued, 10 days overdue
    assert_eq!(auction.remaining_debt, Money::from_minor(1_040_000));
    assert_eq!(auction.days_overdue, 10);
    assert_eq!(fx.engine.get_loan_status(loan_id).unwrap(), LoanStatus::ListedForAuction);

    fx.advance_days(7);
    let stored = fx.engine.auction(auction.id).unwrap();
    assert_eq!(stored.remaining_debt, auction.remaining_debt);
    assert_eq!(stored.days_overdue, 10);

    assert!(matches!(
        fx.engine.create_auction(loan_id),
        Err(LedgerError::AuctionAlreadyListed { .. })
    ));
    assert!(matches!(
        fx.pay(loan_id, 1_000),
        Err(LedgerError::PaymentsNotAccepted { .. })
    ));
}

#[test]
fn test_sold_auction_settles_and_closes() {
    let fx = Fixture::new();
    let (loan_id, auction) = fx.listed();

    fx.engine.close_auction(auction.id, AuctionOutcome::Sold, None).unwrap();
    assert_eq!(fx.engine.get_loan_status(loan_id).unwrap(), LoanStatus::Sold);

    // sold alone moves no cash and does not close the loan
    assert_eq!(fx.engine.cash_entries().unwrap().len(), 1);
    assert!(matches!(
        fx.engine.close_loan(loan_id, "manager-01"),
        Err(LedgerError::NotClosable { .. })
    ));

    let settlement = fx
        .engine
        .record_settlement(
            auction.id,
            Money::from_minor(1_200_000),
            Money::from_minor(60_000),
            fx.today(),
            Some("lot 7, buyer B-19"),
        )
        .unwrap();
    assert_eq!(settlement.net_amount, Money::from_minor(1_140_000));
    assert_eq!(settlement.balance_vs_debt, Money::from_minor(100_000));

    let entry = fx.engine.cash_entry(settlement.cash_entry_id).unwrap();
    assert_eq!(entry.entry_type, EntryType::In);
    assert_eq!(entry.source, CashSource::AuctionProceeds);
    assert_eq!(entry.amount, settlement.net_amount);
    assert_eq!(entry.link, Some(EntryLink::Settlement(settlement.id)));

    assert!(matches!(
        fx.engine.record_settlement(
            auction.id,
            Money::from_minor(1_200_000),
            Money::ZERO,
            fx.today(),
            None
        ),
        Err(LedgerError::AlreadySettled { .. })
    ));

    fx.engine.close_loan(loan_id, "manager-01").unwrap();
    assert_eq!(fx.engine.get_loan_status(loan_id).unwrap(), LoanStatus::Closed);
    assert!(matches!(
        fx.pay(loan_id, 1_000),
        Err(LedgerError::TerminalState { status: LoanStatus::Closed })
    ));
    assert!(matches!(
        fx.engine.close_loan(loan_id, "manager-01"),
        Err(LedgerError::TerminalState { .. })
    ));
}

#[test]
fn test_settlement_fees_exceeding_gross_posts_nothing() {
    let fx = Fixture::new();
    let (_, auction) = fx.listed();
    fx.engine.close_auction(auction.id, AuctionOutcome::Sold, None).unwrap();
    let entries = fx.engine.cash_entries().unwrap();

    for (gross, fees) in [(500_000, 500_000), (500_000, 600_000)] {
        let err = fx
            .engine
            .record_settlement(
                auction.id,
                Money::from_minor(gross),
                Money::from_minor(fees),
                fx.today(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidSettlement { .. }));
    }
    assert_eq!(fx.engine.cash_entries().unwrap(), entries);
}

#[test]
fn test_settlement_requires_sold_auction() {
    let fx = Fixture::new();
    let (_, auction) = fx.listed();

    let err = fx
        .engine
        .record_settlement(auction.id, Money::from_minor(900_000), Money::ZERO, fx.today(), None)
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::AuctionStatusConflict {
            status: AuctionStatus::Listed,
            ..
        }
    ));
}

#[test]
fn test_cancelled_auction_needs_fresh_decision() {
    let fx = Fixture::new();
    let (loan_id, auction) = fx.listed();

    assert!(matches!(
        fx.engine.close_auction(auction.id, AuctionOutcome::Cancelled, Some("redeemed")),
        Err(LedgerError::TextTooShort { .. })
    ));
    fx.engine
        .close_auction(
            auction.id,
            AuctionOutcome::Cancelled,
            Some("customer negotiated extension"),
        )
        .unwrap();
    assert_eq!(fx.engine.get_loan_status(loan_id).unwrap(), LoanStatus::Overdue);

    // payments are accepted again
    fx.pay(loan_id, 10_000).unwrap();

    assert!(matches!(
        fx.engine.create_auction(loan_id),
        Err(LedgerError::NoAuctionDecision { .. })
    ));
    fx.engine
        .record_auction_decision(loan_id, "extension lapsed", "manager-01")
        .unwrap();
    let relisted = fx.engine.create_auction(loan_id).unwrap();
    assert_ne!(relisted.id, auction.id);
    assert_eq!(fx.engine.auctions(loan_id).unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// contracts
// ---------------------------------------------------------------------------

#[test]
fn test_finalize_twice_keeps_first_snapshot() {
    let fx = Fixture::new();
    let loan_id = fx.loan();

    let first = fx.engine.finalize_contract(loan_id, "manager-01").unwrap();
    assert_eq!(first.status, ContractStatus::Final);
    assert_eq!(first.terms.unwrap().total_due, Money::from_minor(1_015_000));
    assert_eq!(fx.engine.loan(loan_id).unwrap().locked_by, Some(first.id));

    fx.advance_days(3);
    let err = fx.engine.finalize_contract(loan_id, "manager-01").unwrap_err();
    assert!(matches!(err, LedgerError::ContractAlreadyFinal { .. }));
    assert_eq!(fx.engine.contract(first.id).unwrap(), first);
}

#[test]
fn test_final_contract_locks_amount_due() {
    let fx = Fixture::new();
    let loan_id = fx.loan();
    let contract = fx.engine.finalize_contract(loan_id, "manager-01").unwrap();

    fx.advance_days(10);
    let due = fx.due_today(loan_id);
    assert!(due.locked);
    assert_eq!(due.elapsed_days, 15);
    assert_eq!(due.total_due, Money::from_minor(1_015_000));

    // payments still reduce a locked balance
    fx.pay(loan_id, 15_000).unwrap();
    assert_eq!(fx.due_today(loan_id).total_due, Money::from_minor(1_000_000));

    assert!(matches!(
        fx.engine.void_contract(contract.id, "typo", "manager-01"),
        Err(LedgerError::TextTooShort { .. })
    ));
    fx.engine
        .void_contract(contract.id, "collateral description wrong", "manager-01")
        .unwrap();
    assert_eq!(fx.engine.loan(loan_id).unwrap().locked_by, None);

    // live again: 25 days accrued, 15,000 already paid
    let due = fx.due_today(loan_id);
    assert!(!due.locked);
    assert_eq!(due.total_due, Money::from_minor(1_010_000));

    let second = fx.engine.finalize_contract(loan_id, "manager-01").unwrap();
    assert_eq!(second.contract_number, "PGD/JKT01/LN-0001/02");
    assert!(matches!(
        fx.engine.void_contract(contract.id, "voiding twice on purpose", "manager-01"),
        Err(LedgerError::ContractStatusConflict { .. })
    ));
}

#[test]
fn test_draft_then_finalize_same_contract() {
    let fx = Fixture::new();
    let loan_id = fx.loan();

    let draft = fx.engine.draft_contract(loan_id, "clerk-01").unwrap();
    assert_eq!(draft.status, ContractStatus::Draft);
    assert_eq!(draft.contract_number, "PGD/JKT01/LN-0001/01");
    assert_eq!(fx.engine.draft_contract(loan_id, "clerk-01").unwrap().id, draft.id);

    let finalized = fx.engine.finalize_contract(loan_id, "manager-01").unwrap();
    assert_eq!(finalized.id, draft.id);
    assert!(matches!(
        fx.engine.draft_contract(loan_id, "clerk-01"),
        Err(LedgerError::ContractAlreadyFinal { .. })
    ));
}

// ---------------------------------------------------------------------------
// cash ledger
// ---------------------------------------------------------------------------

#[test]
fn test_register_loan_posts_disbursement() {
    let fx = Fixture::new();
    let loan = fx.engine.register_loan(new_loan(), "teller-01").unwrap();

    let entries = fx.engine.cash_entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry_type, EntryType::Out);
    assert_eq!(entries[0].source, CashSource::LoanDisbursement);
    assert_eq!(entries[0].amount, loan.principal);
    assert_eq!(entries[0].link, Some(EntryLink::Loan(loan.id)));

    let err = fx
        .engine
        .register_loan(
            NewLoan {
                due_date: date(2023, 12, 1),
                ..new_loan()
            },
            "teller-01",
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTerms { .. }));
    assert_eq!(fx.engine.cash_entries().unwrap().len(), 1);
}

#[test]
fn test_manual_entry_reversal() {
    let fx = Fixture::new();
    let entry = fx
        .engine
        .post_manual_entry(
            EntryType::In,
            Money::from_minor(50_000),
            fx.today(),
            "opening float",
            "cashier-01",
        )
        .unwrap();

    let compensating = fx
        .engine
        .reverse_manual_entry(entry.id, "float counted twice", "supervisor-01")
        .unwrap();
    assert_eq!(compensating.entry_type, EntryType::Out);
    assert_eq!(compensating.amount, entry.amount);
    assert_eq!(fx.engine.cash_entry(entry.id).unwrap().status, EntryStatus::Reversed);

    assert!(matches!(
        fx.engine.reverse_manual_entry(entry.id, "float counted twice", "supervisor-01"),
        Err(LedgerError::EntryNotReversible { .. })
    ));
    assert_eq!(fx.engine.cash_summary(LedgerView::Effective).unwrap().entries, 0);
}

#[test]
fn test_oversized_amounts_refused_up_front() {
    let fx = Fixture::new();
    let mut terms = new_loan();
    terms.principal = Money::from_minor(i64::MAX - 10);
    terms.admin_fee = Money::from_minor(100);
    let err = fx.engine.register_loan(terms, "teller-01").unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTerms { .. }));
    assert!(fx.engine.cash_entries().unwrap().is_empty());

    let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 16, 9, 0, 0).unwrap(),
    )));
    let config = LedgerConfig {
        overpayment_tolerance: Money::from_minor(i64::MAX),
        ..LedgerConfig::default()
    };
    match LedgerEngine::in_memory(config, time) {
        Err(err) => assert_eq!(err.kind(), ErrorKind::Configuration),
        Ok(_) => panic!("engine accepted an unbounded tolerance"),
    }
}

#[test]
fn test_concurrent_manual_reversals_one_wins() {
    let fx = Fixture::with_config(LedgerConfig {
        lock_retry: crate::config::LockRetryPolicy {
            max_attempts: 200,
            backoff_ms: 1,
        },
        ..LedgerConfig::default()
    });
    let entry = fx
        .engine
        .post_manual_entry(
            EntryType::In,
            Money::from_minor(50_000),
            fx.today(),
            "opening float",
            "cashier-01",
        )
        .unwrap();

    let results: Vec<Result<CashLedgerEntry>> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    fx.engine
                        .reverse_manual_entry(entry.id, "float counted twice", "supervisor-01")
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(err, LedgerError::EntryNotReversible { .. }), "unexpected {:?}", err);
        assert_eq!(err.kind(), ErrorKind::StateConflict);
    }
    assert_eq!(fx.engine.cash_entries().unwrap().len(), 2);
    assert_eq!(fx.engine.cash_summary(LedgerView::Effective).unwrap().entries, 0);
}

#[test]
fn test_payment_entry_not_directly_reversible() {
    let fx = Fixture::new();
    let loan_id = fx.loan();
    let payment = fx.pay(loan_id, 15_000).unwrap();

    let err = fx
        .engine
        .reverse_manual_entry(payment.cash_entry_id, "trying a shortcut", "supervisor-01")
        .unwrap_err();
    assert!(matches!(err, LedgerError::EntryNotReversible { .. }));
    assert!(!fx.engine.payment(payment.id).unwrap().is_reversed());
}

// ---------------------------------------------------------------------------
// lifecycle, storage & concurrency
// ---------------------------------------------------------------------------

#[test]
fn test_close_requires_repaid_or_settled() {
    let fx = Fixture::new();
    let loan_id = fx.loan();

    assert!(matches!(
        fx.engine.close_loan(loan_id, "manager-01"),
        Err(LedgerError::NotClosable { .. })
    ));

    fx.pay(loan_id, 1_015_000).unwrap();
    fx.engine.close_loan(loan_id, "manager-01").unwrap();

    let loan = fx.engine.loan(loan_id).unwrap();
    assert_eq!(loan.status, LoanStatus::Closed);
    assert_eq!(loan.closed_by.as_deref(), Some("manager-01"));

    let repayment = fx.engine.payments(loan_id).unwrap()[0].id;
    assert!(matches!(
        fx.engine.reverse_payment(repayment, "too late to reverse this", "supervisor-01"),
        Err(LedgerError::TerminalState { .. })
    ));
}

struct NonAtomicStore(MemoryStore);

impl LedgerStore for NonAtomicStore {
    fn supports_atomic_commit(&self) -> bool {
        false
    }

    fn loan_book(&self, loan_id: LoanId) -> Result<Option<LoanBook>> {
        self.0.loan_book(loan_id)
    }

    fn payment(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
        self.0.payment(payment_id)
    }

    fn auction(&self, auction_id: AuctionId) -> Result<Option<Auction>> {
        self.0.auction(auction_id)
    }

    fn contract(&self, contract_id: ContractId) -> Result<Option<Contract>> {
        self.0.contract(contract_id)
    }

    fn cash_entry(&self, entry_id: CashEntryId) -> Result<Option<CashLedgerEntry>> {
        self.0.cash_entry(entry_id)
    }

    fn cash_entries(&self) -> Result<Vec<CashLedgerEntry>> {
        self.0.cash_entries()
    }

    fn events(&self) -> Result<Vec<LedgerEvent>> {
        self.0.events()
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.0.commit(batch)
    }
}

#[test]
fn test_non_atomic_store_refused() {
    let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 16, 9, 0, 0).unwrap(),
    )));
    let result = LedgerEngine::new(
        LedgerConfig::default(),
        Arc::new(NonAtomicStore(MemoryStore::new())),
        time,
    );
    match result {
        Err(err) => assert_eq!(err.kind(), ErrorKind::Configuration),
        Ok(_) => panic!("engine accepted a non-atomic store"),
    }
}

#[test]
fn test_concurrent_payments_on_one_loan() {
    let fx = Fixture::with_config(LedgerConfig {
        lock_retry: crate::config::LockRetryPolicy {
            max_attempts: 200,
            backoff_ms: 1,
        },
        ..LedgerConfig::default()
    });
    let loan_id = fx.loan();

    let results: Vec<Result<Payment>> = thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|| fx.pay(loan_id, 200_000))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for result in &results {
        if let Err(err) = result {
            assert!(
                matches!(err, LedgerError::Overpayment { .. } | LedgerError::LockContention { .. }),
                "unexpected {:?}",
                err
            );
        }
    }

    let applied = results.iter().filter(|r| r.is_ok()).count();
    let book = fx.engine.loan_book(loan_id).unwrap();
    assert_eq!(book.payments.len(), applied);
    assert!(book.paid_totals().principal <= book.loan.principal);

    let entries = fx.engine.cash_entries().unwrap();
    assert_eq!(entries.len(), applied + 1);
    assert!(CashLedger::new(&entries).is_reconciled());
}

#[test]
fn test_events_journal_operations() {
    let fx = Fixture::new();
    let loan_id = fx.loan();
    let payment = fx.pay(loan_id, 15_000).unwrap();

    let events = fx.engine.events().unwrap();
    assert!(matches!(events[0], LedgerEvent::LoanRegistered { .. }));
    assert!(events.iter().any(|e| matches!(
        e,
        LedgerEvent::PaymentApplied { payment_id, .. } if *payment_id == payment.id
    )));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, LedgerEvent::CashEntryPosted { .. }))
            .count(),
        2
    );
}
