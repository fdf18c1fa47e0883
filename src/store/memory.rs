use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::auction::{Auction, AuctionDecision, Settlement};
use crate::cash::CashLedgerEntry;
use crate::contract::Contract;
use crate::errors::{LedgerError, Result};
use crate::events::LedgerEvent;
use crate::loan::{Loan, LoanBook};
use crate::payments::Payment;
use crate::types::{
    AuctionId, CashEntryId, ContractId, ContractStatus, DecisionId, EntryStatus, LoanId, PaymentId,
    SettlementId,
};

use super::{LedgerStore, Write, WriteBatch};

/// in-process store; a batch is fully validated before any of it is applied
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    loans: HashMap<LoanId, Loan>,
    by_loan: HashMap<LoanId, LoanIndex>,
    payments: HashMap<PaymentId, Payment>,
    decisions: HashMap<DecisionId, AuctionDecision>,
    auctions: HashMap<AuctionId, Auction>,
    settlements: HashMap<SettlementId, Settlement>,
    contracts: HashMap<ContractId, Contract>,
    cash: Vec<CashLedgerEntry>,
    cash_index: HashMap<CashEntryId, usize>,
    events: Vec<LedgerEvent>,
}

/// per-loan insertion order
#[derive(Debug, Default)]
struct LoanIndex {
    payments: Vec<PaymentId>,
    decisions: Vec<DecisionId>,
    auctions: Vec<AuctionId>,
    settlements: Vec<SettlementId>,
    contracts: Vec<ContractId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| LedgerError::Storage {
            message: "store lock poisoned".to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| LedgerError::Storage {
            message: "store lock poisoned".to_string(),
        })
    }
}

fn reject(message: String) -> LedgerError {
    LedgerError::Storage { message }
}

impl Tables {
    fn has_id(&self, id: &Uuid) -> bool {
        self.loans.contains_key(id)
            || self.payments.contains_key(id)
            || self.decisions.contains_key(id)
            || self.auctions.contains_key(id)
            || self.settlements.contains_key(id)
            || self.contracts.contains_key(id)
            || self.cash_index.contains_key(id)
    }

    fn cash_entry(&self, id: &CashEntryId) -> Option<&CashLedgerEntry> {
        self.cash_index.get(id).and_then(|i| self.cash.get(*i))
    }

    fn insert_once(&self, inserted: &mut HashSet<Uuid>, id: Uuid, what: &str) -> Result<()> {
        if self.has_id(&id) || !inserted.insert(id) {
            return Err(reject(format!("duplicate {} {}", what, id)));
        }
        Ok(())
    }

    /// check every write against current tables plus earlier writes in the batch
    fn validate(&self, writes: &[Write]) -> Result<()> {
        let mut inserted: HashSet<Uuid> = HashSet::new();
        let mut marked: HashSet<CashEntryId> = HashSet::new();

        // loans inserted earlier in the batch count as existing for child rows
        let mut new_loans: HashSet<LoanId> = HashSet::new();
        let loan_exists =
            |id: &LoanId, new_loans: &HashSet<LoanId>| self.loans.contains_key(id) || new_loans.contains(id);

        for write in writes {
            match write {
                Write::InsertLoan(loan) => {
                    self.insert_once(&mut inserted, loan.id, "loan")?;
                    new_loans.insert(loan.id);
                }
                Write::UpdateLoan(loan) => match self.loans.get(&loan.id) {
                    Some(stored) if stored.principal != loan.principal => {
                        return Err(reject(format!("principal of loan {} is immutable", loan.id)));
                    }
                    Some(_) => {}
                    None if new_loans.contains(&loan.id) => {}
                    None => return Err(reject(format!("update of unknown loan {}", loan.id))),
                },
                Write::InsertPayment(payment) => {
                    if !loan_exists(&payment.loan_id, &new_loans) {
                        return Err(reject(format!("payment for unknown loan {}", payment.loan_id)));
                    }
                    if payment.breakdown.total() != payment.amount {
                        return Err(reject(format!("payment {} breakdown does not sum to amount", payment.id)));
                    }
                    self.insert_once(&mut inserted, payment.id, "payment")?;
                }
                Write::UpdatePayment(payment) => {
                    let stored = self
                        .payments
                        .get(&payment.id)
                        .ok_or_else(|| reject(format!("update of unknown payment {}", payment.id)))?;
                    if stored.is_reversed() {
                        return Err(reject(format!("payment {} already reversed", payment.id)));
                    }
                    if stored.amount != payment.amount
                        || stored.breakdown != payment.breakdown
                        || stored.cash_entry_id != payment.cash_entry_id
                    {
                        return Err(reject(format!("payment {} is append-only", payment.id)));
                    }
                }
                Write::InsertCashEntry(entry) => {
                    if !entry.amount.is_positive() {
                        return Err(reject(format!("cash entry {} has non-positive amount", entry.id)));
                    }
                    self.insert_once(&mut inserted, entry.id, "cash entry")?;
                }
                Write::MarkCashEntryReversed {
                    entry_id,
                    reversed_by,
                } => {
                    let stored = self
                        .cash_entry(entry_id)
                        .ok_or_else(|| reject(format!("reversal of unknown cash entry {}", entry_id)))?;
                    if stored.status != EntryStatus::Posted || !marked.insert(*entry_id) {
                        return Err(reject(format!("cash entry {} already reversed", entry_id)));
                    }
                    if !inserted.contains(reversed_by) && self.cash_entry(reversed_by).is_none() {
                        return Err(reject(format!("reversing entry {} not found", reversed_by)));
                    }
                }
                Write::InsertDecision(decision) => {
                    if !loan_exists(&decision.loan_id, &new_loans) {
                        return Err(reject(format!("decision for unknown loan {}", decision.loan_id)));
                    }
                    self.insert_once(&mut inserted, decision.id, "decision")?;
                }
                Write::InsertAuction(auction) => {
                    if !loan_exists(&auction.loan_id, &new_loans) {
                        return Err(reject(format!("auction for unknown loan {}", auction.loan_id)));
                    }
                    self.insert_once(&mut inserted, auction.id, "auction")?;
                }
                Write::UpdateAuction(auction) => {
                    let stored = self
                        .auctions
                        .get(&auction.id)
                        .ok_or_else(|| reject(format!("update of unknown auction {}", auction.id)))?;
                    if stored.remaining_debt != auction.remaining_debt
                        || stored.days_overdue != auction.days_overdue
                        || stored.listed_at != auction.listed_at
                        || stored.loan_id != auction.loan_id
                    {
                        return Err(reject(format!("auction {} listing snapshot is frozen", auction.id)));
                    }
                }
                Write::InsertSettlement(settlement) => {
                    if !self.auctions.contains_key(&settlement.auction_id) {
                        return Err(reject(format!("settlement for unknown auction {}", settlement.auction_id)));
                    }
                    self.insert_once(&mut inserted, settlement.id, "settlement")?;
                }
                Write::InsertContract(contract) => {
                    if !loan_exists(&contract.loan_id, &new_loans) {
                        return Err(reject(format!("contract for unknown loan {}", contract.loan_id)));
                    }
                    self.insert_once(&mut inserted, contract.id, "contract")?;
                }
                Write::UpdateContract(contract) => {
                    let stored = self
                        .contracts
                        .get(&contract.id)
                        .ok_or_else(|| reject(format!("update of unknown contract {}", contract.id)))?;
                    let allowed = match (stored.status, contract.status) {
                        (ContractStatus::Draft, ContractStatus::Final) => true,
                        (ContractStatus::Final, ContractStatus::Void) => stored.terms == contract.terms,
                        _ => false,
                    };
                    if !allowed {
                        return Err(reject(format!(
                            "contract {} cannot move {:?} -> {:?}",
                            contract.id, stored.status, contract.status
                        )));
                    }
                }
                Write::Event(_) => {}
            }
        }
        Ok(())
    }

    /// infallible once validated
    fn apply(&mut self, writes: Vec<Write>) {
        for write in writes {
            match write {
                Write::InsertLoan(loan) => {
                    self.by_loan.entry(loan.id).or_default();
                    self.loans.insert(loan.id, loan);
                }
                Write::UpdateLoan(loan) => {
                    self.loans.insert(loan.id, loan);
                }
                Write::InsertPayment(payment) => {
                    self.by_loan.entry(payment.loan_id).or_default().payments.push(payment.id);
                    self.payments.insert(payment.id, payment);
                }
                Write::UpdatePayment(payment) => {
                    self.payments.insert(payment.id, payment);
                }
                Write::InsertCashEntry(entry) => {
                    self.cash_index.insert(entry.id, self.cash.len());
                    self.cash.push(entry);
                }
                Write::MarkCashEntryReversed {
                    entry_id,
                    reversed_by,
                } => {
                    if let Some(entry) = self.cash_index.get(&entry_id).and_then(|i| self.cash.get_mut(*i)) {
                        entry.status = EntryStatus::Reversed;
                        entry.reversed_by = Some(reversed_by);
                    }
                }
                Write::InsertDecision(decision) => {
                    self.by_loan.entry(decision.loan_id).or_default().decisions.push(decision.id);
                    self.decisions.insert(decision.id, decision);
                }
                Write::InsertAuction(auction) => {
                    self.by_loan.entry(auction.loan_id).or_default().auctions.push(auction.id);
                    self.auctions.insert(auction.id, auction);
                }
                Write::UpdateAuction(auction) => {
                    self.auctions.insert(auction.id, auction);
                }
                Write::InsertSettlement(settlement) => {
                    self.by_loan.entry(settlement.loan_id).or_default().settlements.push(settlement.id);
                    self.settlements.insert(settlement.id, settlement);
                }
                Write::InsertContract(contract) => {
                    self.by_loan.entry(contract.loan_id).or_default().contracts.push(contract.id);
                    self.contracts.insert(contract.id, contract);
                }
                Write::UpdateContract(contract) => {
                    self.contracts.insert(contract.id, contract);
                }
                Write::Event(event) => self.events.push(event),
            }
        }
    }
}

fn collect<K, V>(ids: &[K], table: &HashMap<K, V>) -> Vec<V>
where
    K: std::hash::Hash + Eq,
    V: Clone,
{
    ids.iter().filter_map(|id| table.get(id).cloned()).collect()
}

impl LedgerStore for MemoryStore {
    fn supports_atomic_commit(&self) -> bool {
        true
    }

    fn loan_book(&self, loan_id: LoanId) -> Result<Option<LoanBook>> {
        let tables = self.read()?;
        let Some(loan) = tables.loans.get(&loan_id) else {
            return Ok(None);
        };
        let mut book = LoanBook::new(loan.clone());
        if let Some(index) = tables.by_loan.get(&loan_id) {
            book.payments = collect(&index.payments, &tables.payments);
            book.decisions = collect(&index.decisions, &tables.decisions);
            book.auctions = collect(&index.auctions, &tables.auctions);
            book.settlements = collect(&index.settlements, &tables.settlements);
            book.contracts = collect(&index.contracts, &tables.contracts);
        }
        Ok(Some(book))
    }

    fn payment(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.read()?.payments.get(&payment_id).cloned())
    }

    fn auction(&self, auction_id: AuctionId) -> Result<Option<Auction>> {
        Ok(self.read()?.auctions.get(&auction_id).cloned())
    }

    fn contract(&self, contract_id: ContractId) -> Result<Option<Contract>> {
        Ok(self.read()?.contracts.get(&contract_id).cloned())
    }

    fn cash_entry(&self, entry_id: CashEntryId) -> Result<Option<CashLedgerEntry>> {
        Ok(self.read()?.cash_entry(&entry_id).cloned())
    }

    fn cash_entries(&self) -> Result<Vec<CashLedgerEntry>> {
        Ok(self.read()?.cash.clone())
    }

    fn events(&self) -> Result<Vec<LedgerEvent>> {
        Ok(self.read()?.events.clone())
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut tables = self.write()?;
        if let Err(err) = tables.validate(batch.writes()) {
            warn!(writes = batch.len(), error = %err, "batch rejected");
            return Err(err);
        }
        let writes = batch.len();
        tables.apply(batch.into_writes());
        debug!(writes, "batch committed");
        Ok(())
    }
}
