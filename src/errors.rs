use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{AuctionStatus, ContractStatus, LoanStatus};

/// coarse error classes callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    NotFound,
    StateConflict,
    TransientConflict,
    Configuration,
    Storage,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    // validation
    #[error("invalid amount: {amount}")]
    InvalidAmount {
        amount: Money,
    },

    #[error("invalid date: {message}")]
    InvalidDate {
        message: String,
    },

    #[error("as-of date {as_of} is before loan start {start_date}")]
    AsOfBeforeStart {
        as_of: NaiveDate,
        start_date: NaiveDate,
    },

    #[error("{field} too short: minimum {minimum} characters, got {provided}")]
    TextTooShort {
        field: &'static str,
        minimum: usize,
        provided: usize,
    },

    #[error("overpayment: total due {total_due}, tolerance {tolerance}, tendered {tendered}")]
    Overpayment {
        total_due: Money,
        tolerance: Money,
        tendered: Money,
    },

    #[error("invalid settlement: gross {gross}, fees {fees}")]
    InvalidSettlement {
        gross: Money,
        fees: Money,
    },

    #[error("invalid loan terms: {message}")]
    InvalidTerms {
        message: String,
    },

    // not found
    #[error("loan not found: {id}")]
    LoanNotFound {
        id: Uuid,
    },

    #[error("payment not found: {id}")]
    PaymentNotFound {
        id: Uuid,
    },

    #[error("auction not found: {id}")]
    AuctionNotFound {
        id: Uuid,
    },

    #[error("contract not found: {id}")]
    ContractNotFound {
        id: Uuid,
    },

    #[error("cash entry not found: {id}")]
    CashEntryNotFound {
        id: Uuid,
    },

    // state conflicts
    #[error("loan is in terminal state {status:?}")]
    TerminalState {
        status: LoanStatus,
    },

    #[error("loan does not accept payments while {status:?}")]
    PaymentsNotAccepted {
        status: LoanStatus,
    },

    #[error("loan must be overdue: current status is {status:?}")]
    LoanNotOverdue {
        status: LoanStatus,
    },

    #[error("payment already reversed: {id}")]
    PaymentAlreadyReversed {
        id: Uuid,
    },

    #[error("no operative auction decision for loan {loan_id}")]
    NoAuctionDecision {
        loan_id: Uuid,
    },

    #[error("loan {loan_id} already has an open auction {auction_id}")]
    AuctionAlreadyListed {
        loan_id: Uuid,
        auction_id: Uuid,
    },

    #[error("auction {id} is {status:?}, expected {expected:?}")]
    AuctionStatusConflict {
        id: Uuid,
        status: AuctionStatus,
        expected: AuctionStatus,
    },

    #[error("auction {id} already settled")]
    AlreadySettled {
        id: Uuid,
    },

    #[error("loan {loan_id} already has a final contract {contract_id}")]
    ContractAlreadyFinal {
        loan_id: Uuid,
        contract_id: Uuid,
    },

    #[error("contract {id} is {status:?}, expected {expected:?}")]
    ContractStatusConflict {
        id: Uuid,
        status: ContractStatus,
        expected: ContractStatus,
    },

    #[error("illegal status transition: {from:?} -> {to:?}")]
    IllegalTransition {
        from: LoanStatus,
        to: LoanStatus,
    },

    #[error("loan cannot be closed: {reason}")]
    NotClosable {
        reason: String,
    },

    #[error("cash entry {id} cannot be changed directly: {reason}")]
    EntryNotReversible {
        id: Uuid,
        reason: String,
    },

    // transient
    #[error("loan {loan_id} busy after {attempts} lock attempts")]
    LockContention {
        loan_id: Uuid,
        attempts: u32,
    },

    // fatal / infrastructure
    #[error("invalid configuration: {message}")]
    Configuration {
        message: String,
    },

    #[error("storage error: {message}")]
    Storage {
        message: String,
    },

    #[error("calculation error: {message}")]
    Calculation {
        message: String,
    },
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        use LedgerError::*;
        match self {
            InvalidAmount { .. }
            | InvalidDate { .. }
            | AsOfBeforeStart { .. }
            | TextTooShort { .. }
            | Overpayment { .. }
            | InvalidSettlement { .. }
            | InvalidTerms { .. } => ErrorKind::Validation,

            LoanNotFound { .. }
            | PaymentNotFound { .. }
            | AuctionNotFound { .. }
            | ContractNotFound { .. }
            | CashEntryNotFound { .. } => ErrorKind::NotFound,

            TerminalState { .. }
            | PaymentsNotAccepted { .. }
            | LoanNotOverdue { .. }
            | PaymentAlreadyReversed { .. }
            | NoAuctionDecision { .. }
            | AuctionAlreadyListed { .. }
            | AuctionStatusConflict { .. }
            | AlreadySettled { .. }
            | ContractAlreadyFinal { .. }
            | ContractStatusConflict { .. }
            | IllegalTransition { .. }
            | NotClosable { .. }
            | EntryNotReversible { .. } => ErrorKind::StateConflict,

            LockContention { .. } => ErrorKind::TransientConflict,

            Configuration { .. } => ErrorKind::Configuration,

            Storage { .. } | Calculation { .. } => ErrorKind::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// reject free text shorter than `minimum` characters (after trimming)
pub(crate) fn require_text(field: &'static str, text: &str, minimum: usize) -> Result<()> {
    let provided = text.trim().chars().count();
    if provided < minimum {
        return Err(LedgerError::TextTooShort {
            field,
            minimum,
            provided,
        });
    }
    Ok(())
}
