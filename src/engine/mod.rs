//! The ledger engine: the operations callers drive a loan through.
//!
//! Every mutating operation takes the loan's lock, re-reads the loan book
//! under it, builds one `WriteBatch` holding every record it touches plus the
//! journal events, and commits that batch once. A rejected operation never
//! reaches `commit`, so the store is left exactly as it was.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::auction::{net_proceeds, Auction, AuctionDecision, Settlement};
use crate::cash::{CashLedger, CashLedgerEntry, CashSummary, EntryDraft, LedgerView};
use crate::clock::Clock;
use crate::config::LedgerConfig;
use crate::contract::{contract_number, Contract, ContractTerms};
use crate::decimal::Money;
use crate::errors::{require_text, LedgerError, Result};
use crate::events::{EventStore, LedgerEvent};
use crate::interest::{AccrualEngine, AmountDue};
use crate::loan::{Loan, LoanBook, NewLoan};
use crate::locks::LoanLocks;
use crate::payments::{allocate, Payment, PaymentReversal};
use crate::state::{check_transition, days_overdue, TransitionCause};
use crate::store::{LedgerStore, MemoryStore, Write, WriteBatch};
use crate::types::{
    AuctionId, AuctionOutcome, AuctionStatus, CashEntryId, CashSource, ContractId, EntryLink,
    EntryType, LoanId, LoanStatus, PaymentId,
};

pub struct LedgerEngine {
    config: LedgerConfig,
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    locks: LoanLocks,
    accrual: AccrualEngine,
}

impl LedgerEngine {
    /// fails if the config is invalid or the store cannot commit atomically
    pub fn new(
        config: LedgerConfig,
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        if !store.supports_atomic_commit() {
            error!("ledger store does not support atomic commits; refusing to start");
            return Err(LedgerError::Configuration {
                message: "ledger store must support atomic multi-record commits".to_string(),
            });
        }
        let accrual = AccrualEngine::new(config.days_per_period);
        Ok(Self {
            config,
            store,
            clock,
            locks: LoanLocks::new(),
            accrual,
        })
    }

    /// engine over a fresh `MemoryStore`
    pub fn in_memory(config: LedgerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::new(config, Arc::new(MemoryStore::new()), clock)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // queries
    // ---------------------------------------------------------------------

    pub fn loan(&self, loan_id: LoanId) -> Result<Loan> {
        Ok(self.book(loan_id)?.loan)
    }

    pub fn loan_book(&self, loan_id: LoanId) -> Result<LoanBook> {
        self.book(loan_id)
    }

    /// amount due as of `as_of` (capped at today), or the frozen contract terms once finalized
    #[instrument(name = "ledger.get_amount_due", skip(self), err)]
    pub fn get_amount_due(&self, loan_id: LoanId, as_of: NaiveDate) -> Result<AmountDue> {
        let book = self.book(loan_id)?;
        self.amount_due_for(&book, as_of, self.clock.today())
    }

    /// freshly derived status
    pub fn get_loan_status(&self, loan_id: LoanId) -> Result<LoanStatus> {
        Ok(self.book(loan_id)?.status(self.clock.today()))
    }

    pub fn payment(&self, payment_id: PaymentId) -> Result<Payment> {
        self.store
            .payment(payment_id)?
            .ok_or(LedgerError::PaymentNotFound { id: payment_id })
    }

    pub fn payments(&self, loan_id: LoanId) -> Result<Vec<Payment>> {
        Ok(self.book(loan_id)?.payments)
    }

    pub fn auction(&self, auction_id: AuctionId) -> Result<Auction> {
        self.store
            .auction(auction_id)?
            .ok_or(LedgerError::AuctionNotFound { id: auction_id })
    }

    pub fn auctions(&self, loan_id: LoanId) -> Result<Vec<Auction>> {
        Ok(self.book(loan_id)?.auctions)
    }

    pub fn contract(&self, contract_id: ContractId) -> Result<Contract> {
        self.store
            .contract(contract_id)?
            .ok_or(LedgerError::ContractNotFound { id: contract_id })
    }

    pub fn cash_entry(&self, entry_id: CashEntryId) -> Result<CashLedgerEntry> {
        self.store
            .cash_entry(entry_id)?
            .ok_or(LedgerError::CashEntryNotFound { id: entry_id })
    }

    pub fn cash_entries(&self) -> Result<Vec<CashLedgerEntry>> {
        self.store.cash_entries()
    }

    pub fn cash_summary(&self, view: LedgerView) -> Result<CashSummary> {
        let entries = self.store.cash_entries()?;
        Ok(CashLedger::new(&entries).summary(view))
    }

    pub fn events(&self) -> Result<Vec<LedgerEvent>> {
        self.store.events()
    }

    // ---------------------------------------------------------------------
    // loans
    // ---------------------------------------------------------------------

    /// store a disbursed loan and post its cash-out
    #[instrument(name = "ledger.register_loan", skip(self), err)]
    pub fn register_loan(&self, new: NewLoan, actor: &str) -> Result<Loan> {
        new.validate()?;
        let now = self.clock.now();
        let loan = Loan::from_new(new, actor, now);

        let disbursement = CashLedgerEntry::post(
            EntryDraft {
                entry_type: EntryType::Out,
                source: CashSource::LoanDisbursement,
                amount: loan.principal,
                transaction_date: loan.start_date,
                loan_id: Some(loan.id),
                link: Some(EntryLink::Loan(loan.id)),
                note: Some(format!("disbursement {}", loan.loan_number)),
            },
            actor,
            now,
        )?;

        let mut events = EventStore::new();
        events.emit(LedgerEvent::LoanRegistered {
            loan_id: loan.id,
            principal: loan.principal,
            due_date: loan.due_date,
            actor: actor.to_string(),
            timestamp: now,
        });
        events.emit(LedgerEvent::CashEntryPosted {
            entry_id: disbursement.id,
            entry_type: EntryType::Out,
            amount: disbursement.amount,
            timestamp: now,
        });

        let mut batch = WriteBatch::new();
        batch.push(Write::InsertLoan(loan.clone()));
        batch.push(Write::InsertCashEntry(disbursement));
        self.commit(batch, events)?;

        info!(loan_id = %loan.id, principal = %loan.principal, "loan registered");
        Ok(loan)
    }

    /// administrative close of a repaid or settled loan
    #[instrument(name = "ledger.close_loan", skip(self), err)]
    pub fn close_loan(&self, loan_id: LoanId, actor: &str) -> Result<()> {
        let _guard = self.locks.acquire(loan_id, &self.config.lock_retry)?;
        let (today, now) = (self.clock.today(), self.clock.now());
        let mut book = self.book(loan_id)?;
        let before = book.status(today);

        match before {
            LoanStatus::Lunas => {}
            LoanStatus::Sold => {
                let settled = book
                    .latest_auction()
                    .and_then(|a| book.settlement_for(a.id))
                    .is_some();
                if !settled {
                    return Err(LedgerError::NotClosable {
                        reason: "auction sold but no settlement recorded".to_string(),
                    });
                }
            }
            LoanStatus::Closed => return Err(LedgerError::TerminalState { status: before }),
            other => {
                return Err(LedgerError::NotClosable {
                    reason: format!("loan is {:?}", other),
                })
            }
        }

        book.loan.closed_at = Some(now);
        book.loan.closed_by = Some(actor.to_string());

        let mut events = EventStore::new();
        self.refresh_status(&mut book, before, today, now, TransitionCause::Close, &mut events)?;
        events.emit(LedgerEvent::LoanClosed {
            loan_id,
            actor: actor.to_string(),
            timestamp: now,
        });

        let mut batch = WriteBatch::new();
        batch.push(Write::UpdateLoan(book.loan));
        self.commit(batch, events)?;

        info!(%loan_id, "loan closed");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // payments
    // ---------------------------------------------------------------------

    /// split a payment interest -> fees -> principal and post its cash-in
    #[instrument(name = "ledger.apply_payment", skip(self), err)]
    pub fn apply_payment(
        &self,
        loan_id: LoanId,
        amount: Money,
        paid_at: DateTime<Utc>,
        actor: &str,
    ) -> Result<Payment> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount { amount });
        }

        let _guard = self.locks.acquire(loan_id, &self.config.lock_retry)?;
        let (today, now) = (self.clock.today(), self.clock.now());
        let mut book = self.book(loan_id)?;
        let before = book.status(today);

        match before {
            LoanStatus::Lunas | LoanStatus::Closed => {
                return Err(LedgerError::TerminalState { status: before })
            }
            LoanStatus::ListedForAuction | LoanStatus::Sold => {
                return Err(LedgerError::PaymentsNotAccepted { status: before })
            }
            LoanStatus::Active | LoanStatus::Overdue => {}
        }

        let paid_on = paid_at.date_naive();
        if paid_on > today {
            return Err(LedgerError::InvalidDate {
                message: format!("payment dated {} is in the future", paid_on),
            });
        }

        let due = self.amount_due_for(&book, paid_on, today)?;
        let application = allocate(amount, &due, self.config.overpayment_tolerance)?;
        let applied = application.applied();

        let payment_id = Uuid::new_v4();
        let entry = CashLedgerEntry::post(
            EntryDraft {
                entry_type: EntryType::In,
                source: CashSource::Payment {
                    components: application.breakdown.components(),
                },
                amount: applied,
                transaction_date: paid_on,
                loan_id: Some(loan_id),
                link: Some(EntryLink::Payment(payment_id)),
                note: None,
            },
            actor,
            now,
        )?;

        let payment = Payment {
            id: payment_id,
            loan_id,
            amount: applied,
            breakdown: application.breakdown,
            paid_at,
            recorded_by: actor.to_string(),
            recorded_at: now,
            cash_entry_id: entry.id,
            reversal: None,
        };

        book.payments.push(payment.clone());
        if book.paid_totals().principal > book.loan.principal {
            return Err(LedgerError::Calculation {
                message: format!("payment {} would repay more than principal", payment_id),
            });
        }

        let mut events = EventStore::new();
        events.emit(LedgerEvent::PaymentApplied {
            loan_id,
            payment_id,
            amount: applied,
            breakdown: application.breakdown,
            actor: actor.to_string(),
            timestamp: now,
        });
        events.emit(LedgerEvent::CashEntryPosted {
            entry_id: entry.id,
            entry_type: EntryType::In,
            amount: applied,
            timestamp: now,
        });
        let changed =
            self.refresh_status(&mut book, before, today, now, TransitionCause::Payment, &mut events)?;

        let mut batch = WriteBatch::new();
        batch.push(Write::InsertPayment(payment.clone()));
        batch.push(Write::InsertCashEntry(entry));
        if changed {
            batch.push(Write::UpdateLoan(book.loan.clone()));
        }
        self.commit(batch, events)?;

        info!(
            %loan_id,
            %payment_id,
            amount = %applied,
            interest = %application.breakdown.interest_portion,
            fee = %application.breakdown.fee_portion,
            principal = %application.breakdown.principal_portion,
            change = %application.change,
            status = ?book.loan.status,
            "payment applied"
        );
        Ok(payment)
    }

    /// mark a payment reversed and post the compensating cash-out
    #[instrument(name = "ledger.reverse_payment", skip(self), err)]
    pub fn reverse_payment(&self, payment_id: PaymentId, reason: &str, actor: &str) -> Result<()> {
        require_text("reversal reason", reason, self.config.min_reversal_reason_len)?;
        let loan_id = self.payment(payment_id)?.loan_id;

        let _guard = self.locks.acquire(loan_id, &self.config.lock_retry)?;
        let (today, now) = (self.clock.today(), self.clock.now());
        let mut book = self.book(loan_id)?;
        let before = book.status(today);

        let index = book
            .payments
            .iter()
            .position(|p| p.id == payment_id)
            .ok_or(LedgerError::PaymentNotFound { id: payment_id })?;
        if book.payments[index].is_reversed() {
            return Err(LedgerError::PaymentAlreadyReversed { id: payment_id });
        }
        if before == LoanStatus::Closed {
            return Err(LedgerError::TerminalState { status: before });
        }

        let original = self.cash_entry(book.payments[index].cash_entry_id)?;
        let compensating = original.reversal(reason.trim(), actor, now)?;

        let payment = &mut book.payments[index];
        payment.reversal = Some(PaymentReversal {
            reason: reason.trim().to_string(),
            reversed_by: actor.to_string(),
            reversed_at: now,
            cash_entry_id: compensating.id,
        });
        let payment = payment.clone();

        let mut events = EventStore::new();
        events.emit(LedgerEvent::PaymentReversed {
            loan_id,
            payment_id,
            amount: payment.amount,
            reason: reason.trim().to_string(),
            actor: actor.to_string(),
            timestamp: now,
        });
        events.emit(LedgerEvent::CashEntryReversed {
            entry_id: original.id,
            reversal_id: compensating.id,
            amount: original.amount,
            timestamp: now,
        });
        let changed =
            self.refresh_status(&mut book, before, today, now, TransitionCause::Reversal, &mut events)?;

        let mut batch = WriteBatch::new();
        batch.push(Write::UpdatePayment(payment.clone()));
        let compensating_id = compensating.id;
        batch.push(Write::InsertCashEntry(compensating));
        batch.push(Write::MarkCashEntryReversed {
            entry_id: original.id,
            reversed_by: compensating_id,
        });
        if changed {
            batch.push(Write::UpdateLoan(book.loan.clone()));
        }
        self.commit(batch, events)?;

        info!(%loan_id, %payment_id, amount = %payment.amount, status = ?book.loan.status, "payment reversed");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // auctions
    // ---------------------------------------------------------------------

    #[instrument(name = "ledger.record_auction_decision", skip(self), err)]
    pub fn record_auction_decision(
        &self,
        loan_id: LoanId,
        note: &str,
        actor: &str,
    ) -> Result<AuctionDecision> {
        require_text("decision note", note, 1)?;

        let _guard = self.locks.acquire(loan_id, &self.config.lock_retry)?;
        let (today, now) = (self.clock.today(), self.clock.now());
        let mut book = self.book(loan_id)?;
        let status = book.status(today);

        if status.is_terminal() {
            return Err(LedgerError::TerminalState { status });
        }
        if status != LoanStatus::Overdue {
            return Err(LedgerError::LoanNotOverdue { status });
        }

        let decision = AuctionDecision {
            id: Uuid::new_v4(),
            loan_id,
            note: note.trim().to_string(),
            decided_by: actor.to_string(),
            decided_at: now,
        };

        let mut events = EventStore::new();
        events.emit(LedgerEvent::AuctionDecisionRecorded {
            loan_id,
            decision_id: decision.id,
            actor: actor.to_string(),
            timestamp: now,
        });
        let changed =
            self.refresh_status(&mut book, status, today, now, TransitionCause::Decision, &mut events)?;

        let mut batch = WriteBatch::new();
        batch.push(Write::InsertDecision(decision.clone()));
        if changed {
            batch.push(Write::UpdateLoan(book.loan));
        }
        self.commit(batch, events)?;

        info!(%loan_id, decision_id = %decision.id, "auction decision recorded");
        Ok(decision)
    }

    /// list an overdue loan's collateral, freezing debt and days overdue
    #[instrument(name = "ledger.create_auction", skip(self), err)]
    pub fn create_auction(&self, loan_id: LoanId) -> Result<Auction> {
        let _guard = self.locks.acquire(loan_id, &self.config.lock_retry)?;
        let (today, now) = (self.clock.today(), self.clock.now());
        let mut book = self.book(loan_id)?;
        let before = book.status(today);

        if before.is_terminal() {
            return Err(LedgerError::TerminalState { status: before });
        }
        if let Some(open) = book.open_auction() {
            return Err(LedgerError::AuctionAlreadyListed {
                loan_id,
                auction_id: open.id,
            });
        }
        if before != LoanStatus::Overdue {
            return Err(LedgerError::LoanNotOverdue { status: before });
        }
        let decision_id = book
            .operative_decision()
            .map(|d| d.id)
            .ok_or(LedgerError::NoAuctionDecision { loan_id })?;

        let due = self.amount_due_for(&book, today, today)?;
        let auction = Auction::list(
            loan_id,
            decision_id,
            due.total_due,
            days_overdue(book.loan.due_date, today),
            now,
        );
        book.auctions.push(auction.clone());

        let mut events = EventStore::new();
        events.emit(LedgerEvent::AuctionListed {
            loan_id,
            auction_id: auction.id,
            remaining_debt: auction.remaining_debt,
            days_overdue: auction.days_overdue,
            timestamp: now,
        });
        let changed =
            self.refresh_status(&mut book, before, today, now, TransitionCause::AuctionListed, &mut events)?;

        let mut batch = WriteBatch::new();
        batch.push(Write::InsertAuction(auction.clone()));
        if changed {
            batch.push(Write::UpdateLoan(book.loan));
        }
        self.commit(batch, events)?;

        info!(
            %loan_id,
            auction_id = %auction.id,
            remaining_debt = %auction.remaining_debt,
            days_overdue = auction.days_overdue,
            "auction listed"
        );
        Ok(auction)
    }

    /// close an open auction; moves no cash
    #[instrument(name = "ledger.close_auction", skip(self), err)]
    pub fn close_auction(
        &self,
        auction_id: AuctionId,
        outcome: AuctionOutcome,
        note: Option<&str>,
    ) -> Result<()> {
        let loan_id = self.auction(auction_id)?.loan_id;

        let _guard = self.locks.acquire(loan_id, &self.config.lock_retry)?;
        let (today, now) = (self.clock.today(), self.clock.now());
        let mut book = self.book(loan_id)?;
        let before = book.status(today);

        let index = book
            .auctions
            .iter()
            .position(|a| a.id == auction_id)
            .ok_or(LedgerError::AuctionNotFound { id: auction_id })?;
        let closed = book.auctions[index].close(outcome, note, self.config.min_cancel_note_len, now)?;
        book.auctions[index] = closed.clone();

        let mut events = EventStore::new();
        events.emit(LedgerEvent::AuctionClosed {
            loan_id,
            auction_id,
            outcome,
            timestamp: now,
        });
        let changed =
            self.refresh_status(&mut book, before, today, now, TransitionCause::AuctionClosed, &mut events)?;

        let mut batch = WriteBatch::new();
        batch.push(Write::UpdateAuction(closed));
        if changed {
            batch.push(Write::UpdateLoan(book.loan.clone()));
        }
        self.commit(batch, events)?;

        info!(%loan_id, %auction_id, ?outcome, status = ?book.loan.status, "auction closed");
        Ok(())
    }

    /// book a sold auction's net proceeds as cash-in
    #[instrument(name = "ledger.record_settlement", skip(self), err)]
    pub fn record_settlement(
        &self,
        auction_id: AuctionId,
        gross_amount: Money,
        fees: Money,
        settled_at: NaiveDate,
        note: Option<&str>,
    ) -> Result<Settlement> {
        let net = net_proceeds(gross_amount, fees)?;
        let loan_id = self.auction(auction_id)?.loan_id;

        let _guard = self.locks.acquire(loan_id, &self.config.lock_retry)?;
        let (today, now) = (self.clock.today(), self.clock.now());
        let book = self.book(loan_id)?;

        let auction = book
            .auctions
            .iter()
            .find(|a| a.id == auction_id)
            .ok_or(LedgerError::AuctionNotFound { id: auction_id })?;
        if auction.status != AuctionStatus::Sold {
            return Err(LedgerError::AuctionStatusConflict {
                id: auction_id,
                status: auction.status,
                expected: AuctionStatus::Sold,
            });
        }
        if book.settlement_for(auction_id).is_some() {
            return Err(LedgerError::AlreadySettled { id: auction_id });
        }
        if settled_at > today {
            return Err(LedgerError::InvalidDate {
                message: format!("settlement dated {} is in the future", settled_at),
            });
        }

        let note = note.map(str::trim).filter(|n| !n.is_empty()).map(String::from);
        let settlement_id = Uuid::new_v4();
        let entry = CashLedgerEntry::post(
            EntryDraft {
                entry_type: EntryType::In,
                source: CashSource::AuctionProceeds,
                amount: net,
                transaction_date: settled_at,
                loan_id: Some(loan_id),
                link: Some(EntryLink::Settlement(settlement_id)),
                note: note.clone(),
            },
            "system",
            now,
        )?;

        let settlement = Settlement {
            id: settlement_id,
            auction_id,
            loan_id,
            gross_amount,
            fees,
            net_amount: net,
            balance_vs_debt: net - auction.remaining_debt,
            settled_at,
            note,
            cash_entry_id: entry.id,
            recorded_at: now,
        };

        let mut events = EventStore::new();
        events.emit(LedgerEvent::SettlementRecorded {
            loan_id,
            auction_id,
            settlement_id,
            net_amount: net,
            timestamp: now,
        });
        events.emit(LedgerEvent::CashEntryPosted {
            entry_id: entry.id,
            entry_type: EntryType::In,
            amount: net,
            timestamp: now,
        });

        let mut batch = WriteBatch::new();
        batch.push(Write::InsertSettlement(settlement.clone()));
        batch.push(Write::InsertCashEntry(entry));
        self.commit(batch, events)?;

        info!(
            %loan_id,
            %auction_id,
            net = %net,
            balance_vs_debt = %settlement.balance_vs_debt,
            "settlement recorded"
        );
        Ok(settlement)
    }

    // ---------------------------------------------------------------------
    // contracts
    // ---------------------------------------------------------------------

    /// open a draft contract, or return the one already open
    #[instrument(name = "ledger.draft_contract", skip(self), err)]
    pub fn draft_contract(&self, loan_id: LoanId, actor: &str) -> Result<Contract> {
        let _guard = self.locks.acquire(loan_id, &self.config.lock_retry)?;
        let now = self.clock.now();
        let book = self.book(loan_id)?;

        if let Some(final_contract) = book.final_contract() {
            return Err(LedgerError::ContractAlreadyFinal {
                loan_id,
                contract_id: final_contract.id,
            });
        }
        if let Some(draft) = book.draft_contract() {
            return Ok(draft.clone());
        }

        let contract = self.new_draft(&book, actor, now);
        let mut events = EventStore::new();
        events.emit(LedgerEvent::ContractDrafted {
            loan_id,
            contract_id: contract.id,
            contract_number: contract.contract_number.clone(),
            actor: actor.to_string(),
            timestamp: now,
        });

        let mut batch = WriteBatch::new();
        batch.push(Write::InsertContract(contract.clone()));
        self.commit(batch, events)?;

        info!(%loan_id, contract_id = %contract.id, number = %contract.contract_number, "contract drafted");
        Ok(contract)
    }

    /// snapshot the current amount due into a final contract and lock the loan to it
    #[instrument(name = "ledger.finalize_contract", skip(self), err)]
    pub fn finalize_contract(&self, loan_id: LoanId, actor: &str) -> Result<Contract> {
        let _guard = self.locks.acquire(loan_id, &self.config.lock_retry)?;
        let (today, now) = (self.clock.today(), self.clock.now());
        let mut book = self.book(loan_id)?;

        if let Some(final_contract) = book.final_contract() {
            return Err(LedgerError::ContractAlreadyFinal {
                loan_id,
                contract_id: final_contract.id,
            });
        }

        let due = self.amount_due_for(&book, today, today)?;
        let terms = ContractTerms::capture(&book.loan, &due)?;

        let mut events = EventStore::new();
        let mut batch = WriteBatch::new();
        let finalized = match book.draft_contract() {
            Some(draft) => {
                let finalized = draft.finalize(terms, actor, now)?;
                batch.push(Write::UpdateContract(finalized.clone()));
                finalized
            }
            None => {
                let draft = self.new_draft(&book, actor, now);
                events.emit(LedgerEvent::ContractDrafted {
                    loan_id,
                    contract_id: draft.id,
                    contract_number: draft.contract_number.clone(),
                    actor: actor.to_string(),
                    timestamp: now,
                });
                let finalized = draft.finalize(terms, actor, now)?;
                batch.push(Write::InsertContract(finalized.clone()));
                finalized
            }
        };
        events.emit(LedgerEvent::ContractFinalized {
            loan_id,
            contract_id: finalized.id,
            total_due: terms.total_due,
            actor: actor.to_string(),
            timestamp: now,
        });

        book.loan.locked_by = Some(finalized.id);
        batch.push(Write::UpdateLoan(book.loan));
        self.commit(batch, events)?;

        info!(
            %loan_id,
            contract_id = %finalized.id,
            number = %finalized.contract_number,
            total_due = %terms.total_due,
            "contract finalized"
        );
        Ok(finalized)
    }

    /// FINAL -> VOID; the loan goes back to live accrual
    #[instrument(name = "ledger.void_contract", skip(self), err)]
    pub fn void_contract(&self, contract_id: ContractId, reason: &str, actor: &str) -> Result<()> {
        let loan_id = self.contract(contract_id)?.loan_id;

        let _guard = self.locks.acquire(loan_id, &self.config.lock_retry)?;
        let now = self.clock.now();
        let mut book = self.book(loan_id)?;

        let contract = book
            .contracts
            .iter()
            .find(|c| c.id == contract_id)
            .ok_or(LedgerError::ContractNotFound { id: contract_id })?;
        let voided = contract.void(reason, self.config.min_void_reason_len, actor, now)?;

        let mut events = EventStore::new();
        events.emit(LedgerEvent::ContractVoided {
            loan_id,
            contract_id,
            reason: reason.trim().to_string(),
            actor: actor.to_string(),
            timestamp: now,
        });

        let mut batch = WriteBatch::new();
        batch.push(Write::UpdateContract(voided));
        if book.loan.locked_by == Some(contract_id) {
            book.loan.locked_by = None;
            batch.push(Write::UpdateLoan(book.loan));
        }
        self.commit(batch, events)?;

        info!(%loan_id, %contract_id, "contract voided");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // manual cash
    // ---------------------------------------------------------------------

    #[instrument(name = "ledger.post_manual_entry", skip(self), err)]
    pub fn post_manual_entry(
        &self,
        entry_type: EntryType,
        amount: Money,
        transaction_date: NaiveDate,
        note: &str,
        actor: &str,
    ) -> Result<CashLedgerEntry> {
        require_text("manual entry note", note, 1)?;
        let (today, now) = (self.clock.today(), self.clock.now());
        if transaction_date > today {
            return Err(LedgerError::InvalidDate {
                message: format!("entry dated {} is in the future", transaction_date),
            });
        }

        let entry = CashLedgerEntry::post(
            EntryDraft {
                entry_type,
                source: CashSource::Manual,
                amount,
                transaction_date,
                loan_id: None,
                link: None,
                note: Some(note.trim().to_string()),
            },
            actor,
            now,
        )?;

        let mut events = EventStore::new();
        events.emit(LedgerEvent::CashEntryPosted {
            entry_id: entry.id,
            entry_type,
            amount,
            timestamp: now,
        });
        let mut batch = WriteBatch::new();
        batch.push(Write::InsertCashEntry(entry.clone()));
        self.commit(batch, events)?;

        info!(entry_id = %entry.id, ?entry_type, %amount, "manual entry posted");
        Ok(entry)
    }

    /// reverse a manual entry; entries owned by payments or settlements are refused
    #[instrument(name = "ledger.reverse_manual_entry", skip(self), err)]
    pub fn reverse_manual_entry(
        &self,
        entry_id: CashEntryId,
        reason: &str,
        actor: &str,
    ) -> Result<CashLedgerEntry> {
        require_text("reversal reason", reason, self.config.min_reversal_reason_len)?;
        // manual entries have no owning loan; serialize on the entry id instead
        let _guard = self.locks.acquire(entry_id, &self.config.lock_retry)?;
        let original = self.cash_entry(entry_id)?;
        if original.source != CashSource::Manual {
            return Err(LedgerError::EntryNotReversible {
                id: entry_id,
                reason: format!("{:?} entries move only with their owning record", original.source),
            });
        }

        let now = self.clock.now();
        let compensating = original.reversal(reason.trim(), actor, now)?;

        let mut events = EventStore::new();
        events.emit(LedgerEvent::CashEntryReversed {
            entry_id,
            reversal_id: compensating.id,
            amount: original.amount,
            timestamp: now,
        });
        let mut batch = WriteBatch::new();
        batch.push(Write::InsertCashEntry(compensating.clone()));
        batch.push(Write::MarkCashEntryReversed {
            entry_id,
            reversed_by: compensating.id,
        });
        self.commit(batch, events)?;

        info!(%entry_id, reversal_id = %compensating.id, "manual entry reversed");
        Ok(compensating)
    }

    // ---------------------------------------------------------------------
    // internals
    // ---------------------------------------------------------------------

    fn book(&self, loan_id: LoanId) -> Result<LoanBook> {
        self.store
            .loan_book(loan_id)?
            .ok_or(LedgerError::LoanNotFound { id: loan_id })
    }

    fn amount_due_for(&self, book: &LoanBook, as_of: NaiveDate, today: NaiveDate) -> Result<AmountDue> {
        let locked = book.final_contract().and_then(|c| c.terms.as_ref());
        self.accrual
            .amount_due(&book.loan.accrual_basis(), &book.paid_totals(), locked, as_of, today)
    }

    fn new_draft(&self, book: &LoanBook, actor: &str, now: DateTime<Utc>) -> Contract {
        let number = contract_number(
            &self.config.contract_prefix,
            &book.loan.branch_id,
            &book.loan.loan_number,
            book.contracts.len() + 1,
        );
        Contract::draft(book.loan.id, number, actor, now)
    }

    /// re-derive status after an in-memory change to `book`, check the move and
    /// stamp it on the loan. returns whether the loan record changed.
    fn refresh_status(
        &self,
        book: &mut LoanBook,
        before: LoanStatus,
        today: NaiveDate,
        now: DateTime<Utc>,
        cause: TransitionCause,
        events: &mut EventStore,
    ) -> Result<bool> {
        let after = book.status(today);
        check_transition(before, after, cause)?;

        let persisted = book.loan.status;
        if persisted == after {
            return Ok(false);
        }
        book.loan.status = after;
        book.loan.status_changed_at = now;
        events.emit(LedgerEvent::StatusChanged {
            loan_id: book.loan.id,
            old_status: persisted,
            new_status: after,
            reason: format!("{:?}", cause),
            timestamp: now,
        });
        info!(loan_id = %book.loan.id, from = ?persisted, to = ?after, "loan status changed");
        Ok(true)
    }

    fn commit(&self, mut batch: WriteBatch, mut events: EventStore) -> Result<()> {
        batch.extend_events(events.take_events());
        self.store.commit(batch)
    }
}

#[cfg(test)]
mod tests;
