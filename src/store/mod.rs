pub mod memory;

use crate::auction::{Auction, AuctionDecision, Settlement};
use crate::cash::CashLedgerEntry;
use crate::contract::Contract;
use crate::errors::Result;
use crate::events::LedgerEvent;
use crate::loan::{Loan, LoanBook};
use crate::payments::Payment;
use crate::types::{AuctionId, CashEntryId, ContractId, LoanId, PaymentId};

pub use memory::MemoryStore;

/// one write inside a batch
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    InsertLoan(Loan),
    UpdateLoan(Loan),
    InsertPayment(Payment),
    /// only the reversal fields may change
    UpdatePayment(Payment),
    InsertCashEntry(CashLedgerEntry),
    MarkCashEntryReversed {
        entry_id: CashEntryId,
        reversed_by: CashEntryId,
    },
    InsertDecision(AuctionDecision),
    InsertAuction(Auction),
    /// status and close fields only; listing snapshot is immutable
    UpdateAuction(Auction),
    InsertSettlement(Settlement),
    InsertContract(Contract),
    UpdateContract(Contract),
    Event(LedgerEvent),
}

/// writes committed together or not at all
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: Write) {
        self.writes.push(write);
    }

    pub fn extend_events(&mut self, events: Vec<LedgerEvent>) {
        self.writes.extend(events.into_iter().map(Write::Event));
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// persistence seam for the engine
pub trait LedgerStore: Send + Sync {
    /// whether `commit` applies a batch all-or-nothing; the engine refuses to start otherwise
    fn supports_atomic_commit(&self) -> bool;

    fn loan_book(&self, loan_id: LoanId) -> Result<Option<LoanBook>>;

    fn payment(&self, payment_id: PaymentId) -> Result<Option<Payment>>;

    fn auction(&self, auction_id: AuctionId) -> Result<Option<Auction>>;

    fn contract(&self, contract_id: ContractId) -> Result<Option<Contract>>;

    fn cash_entry(&self, entry_id: CashEntryId) -> Result<Option<CashLedgerEntry>>;

    /// all entries in posting order
    fn cash_entries(&self) -> Result<Vec<CashLedgerEntry>>;

    fn events(&self) -> Result<Vec<LedgerEvent>>;

    fn commit(&self, batch: WriteBatch) -> Result<()>;
}
