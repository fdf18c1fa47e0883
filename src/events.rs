use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::payments::PaymentBreakdown;
use crate::types::{
    ActorId, AuctionId, AuctionOutcome, CashEntryId, ContractId, DecisionId, EntryType, LoanId,
    LoanStatus, PaymentId, SettlementId,
};

/// audit journal entries, committed in the same batch as the change they describe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEvent {
    // loan lifecycle
    LoanRegistered {
        loan_id: LoanId,
        principal: Money,
        due_date: NaiveDate,
        actor: ActorId,
        timestamp: DateTime<Utc>,
    },
    LoanClosed {
        loan_id: LoanId,
        actor: ActorId,
        timestamp: DateTime<Utc>,
    },
    StatusChanged {
        loan_id: LoanId,
        old_status: LoanStatus,
        new_status: LoanStatus,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // payments
    PaymentApplied {
        loan_id: LoanId,
        payment_id: PaymentId,
        amount: Money,
        breakdown: PaymentBreakdown,
        actor: ActorId,
        timestamp: DateTime<Utc>,
    },
    PaymentReversed {
        loan_id: LoanId,
        payment_id: PaymentId,
        amount: Money,
        reason: String,
        actor: ActorId,
        timestamp: DateTime<Utc>,
    },

    // cash
    CashEntryPosted {
        entry_id: CashEntryId,
        entry_type: EntryType,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    CashEntryReversed {
        entry_id: CashEntryId,
        reversal_id: CashEntryId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },

    // auctions
    AuctionDecisionRecorded {
        loan_id: LoanId,
        decision_id: DecisionId,
        actor: ActorId,
        timestamp: DateTime<Utc>,
    },
    AuctionListed {
        loan_id: LoanId,
        auction_id: AuctionId,
        remaining_debt: Money,
        days_overdue: u32,
        timestamp: DateTime<Utc>,
    },
    AuctionClosed {
        loan_id: LoanId,
        auction_id: AuctionId,
        outcome: AuctionOutcome,
        timestamp: DateTime<Utc>,
    },
    SettlementRecorded {
        loan_id: LoanId,
        auction_id: AuctionId,
        settlement_id: SettlementId,
        net_amount: Money,
        timestamp: DateTime<Utc>,
    },

    // contracts
    ContractDrafted {
        loan_id: LoanId,
        contract_id: ContractId,
        contract_number: String,
        actor: ActorId,
        timestamp: DateTime<Utc>,
    },
    ContractFinalized {
        loan_id: LoanId,
        contract_id: ContractId,
        total_due: Money,
        actor: ActorId,
        timestamp: DateTime<Utc>,
    },
    ContractVoided {
        loan_id: LoanId,
        contract_id: ContractId,
        reason: String,
        actor: ActorId,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during one operation
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<LedgerEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
