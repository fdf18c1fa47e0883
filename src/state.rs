//! Loan lifecycle state machine.
//!
//! Status is derived, never trusted from storage: every read recomputes it
//! from the principal balance, due date, today, the latest auction and the
//! close marker. The persisted `Loan::status` is a record of the last
//! committed evaluation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{AuctionStatus, LoanStatus};

/// inputs status is computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFacts {
    pub principal_remaining: Money,
    pub due_date: NaiveDate,
    pub today: NaiveDate,
    /// status of the most recent auction, if any
    pub latest_auction: Option<AuctionStatus>,
    pub closed: bool,
}

pub fn derive_status(facts: &StatusFacts) -> LoanStatus {
    if facts.closed {
        return LoanStatus::Closed;
    }
    match facts.latest_auction {
        Some(AuctionStatus::Sold) => return LoanStatus::Sold,
        Some(AuctionStatus::Listed) => return LoanStatus::ListedForAuction,
        Some(AuctionStatus::Cancelled) | None => {}
    }
    if facts.principal_remaining.is_zero() {
        return LoanStatus::Lunas;
    }
    if facts.today > facts.due_date {
        LoanStatus::Overdue
    } else {
        LoanStatus::Active
    }
}

/// whole days past due, zero when not yet due
pub fn days_overdue(due_date: NaiveDate, today: NaiveDate) -> u32 {
    u32::try_from((today - due_date).num_days().max(0)).unwrap_or(u32::MAX)
}

/// what moved the loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionCause {
    Payment,
    Reversal,
    AuctionListed,
    AuctionClosed,
    Decision,
    Close,
}

/// legal moves; same-status is always allowed
pub fn check_transition(from: LoanStatus, to: LoanStatus, cause: TransitionCause) -> Result<()> {
    use LoanStatus::*;
    use TransitionCause as C;

    if from == to {
        return Ok(());
    }
    let legal = match (from, to) {
        (Active, Overdue) => true,
        (Active | Overdue, Lunas) => cause == C::Payment,
        (Overdue, ListedForAuction) => cause == C::AuctionListed,
        (ListedForAuction, Sold | Overdue) => cause == C::AuctionClosed,
        (Lunas | Sold, Closed) => cause == C::Close,
        // the one non-monotonic move: undoing the payment that repaid the loan
        (Lunas, Active | Overdue) => cause == C::Reversal,
        _ => false,
    };
    if legal {
        Ok(())
    } else {
        Err(LedgerError::IllegalTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    fn facts(principal: i64, today: u32) -> StatusFacts {
        StatusFacts {
            principal_remaining: Money::from_minor(principal),
            due_date: date(10),
            today: date(today),
            latest_auction: None,
            closed: false,
        }
    }

    #[test]
    fn test_overdue_is_computed() {
        assert_eq!(derive_status(&facts(100, 10)), LoanStatus::Active);
        assert_eq!(derive_status(&facts(100, 11)), LoanStatus::Overdue);
        assert_eq!(derive_status(&facts(0, 11)), LoanStatus::Lunas);
    }

    #[test]
    fn test_auction_dominates() {
        let mut f = facts(100, 20);
        f.latest_auction = Some(AuctionStatus::Listed);
        assert_eq!(derive_status(&f), LoanStatus::ListedForAuction);
        f.latest_auction = Some(AuctionStatus::Cancelled);
        assert_eq!(derive_status(&f), LoanStatus::Overdue);
        f.latest_auction = Some(AuctionStatus::Sold);
        assert_eq!(derive_status(&f), LoanStatus::Sold);
        f.closed = true;
        assert_eq!(derive_status(&f), LoanStatus::Closed);
    }

    #[test]
    fn test_days_overdue() {
        assert_eq!(days_overdue(date(10), date(9)), 0);
        assert_eq!(days_overdue(date(10), date(10)), 0);
        assert_eq!(days_overdue(date(10), date(22)), 12);
    }

    #[test]
    fn test_transitions() {
        use LoanStatus::*;
        assert!(check_transition(Active, Lunas, TransitionCause::Payment).is_ok());
        assert!(check_transition(Lunas, Overdue, TransitionCause::Reversal).is_ok());
        assert!(check_transition(Lunas, Active, TransitionCause::Payment).is_err());
        assert!(check_transition(Active, ListedForAuction, TransitionCause::AuctionListed).is_err());
        assert!(check_transition(Closed, Active, TransitionCause::Reversal).is_err());
        assert!(check_transition(Sold, Closed, TransitionCause::Close).is_ok());
        assert!(check_transition(Overdue, Overdue, TransitionCause::Decision).is_ok());
    }
}
