use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{require_text, LedgerError, Result};
use crate::types::{
    ActorId, AuctionId, AuctionOutcome, AuctionStatus, CashEntryId, DecisionId, LoanId,
    SettlementId,
};

/// append-only record that a loan should go to auction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionDecision {
    pub id: DecisionId,
    pub loan_id: LoanId,
    pub note: String,
    pub decided_by: ActorId,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub loan_id: LoanId,
    /// the decision this listing consumed
    pub decision_id: DecisionId,
    pub status: AuctionStatus,
    pub listed_at: DateTime<Utc>,
    /// frozen at listing
    pub remaining_debt: Money,
    /// frozen at listing
    pub days_overdue: u32,
    pub closed_at: Option<DateTime<Utc>>,
    pub close_note: Option<String>,
}

impl Auction {
    pub fn list(
        loan_id: LoanId,
        decision_id: DecisionId,
        remaining_debt: Money,
        days_overdue: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_id,
            decision_id,
            status: AuctionStatus::Listed,
            listed_at: now,
            remaining_debt,
            days_overdue,
            closed_at: None,
            close_note: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == AuctionStatus::Listed
    }

    /// closed copy of this auction; snapshots are carried over untouched
    pub fn close(
        &self,
        outcome: AuctionOutcome,
        note: Option<&str>,
        min_cancel_note_len: usize,
        now: DateTime<Utc>,
    ) -> Result<Auction> {
        if !self.is_open() {
            return Err(LedgerError::AuctionStatusConflict {
                id: self.id,
                status: self.status,
                expected: AuctionStatus::Listed,
            });
        }
        if outcome == AuctionOutcome::Cancelled {
            require_text("cancel note", note.unwrap_or(""), min_cancel_note_len)?;
        }

        let mut closed = self.clone();
        closed.status = outcome.into();
        closed.closed_at = Some(now);
        closed.close_note = note.map(str::trim).filter(|n| !n.is_empty()).map(String::from);
        Ok(closed)
    }
}

/// proceeds of a sold auction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: SettlementId,
    pub auction_id: AuctionId,
    pub loan_id: LoanId,
    pub gross_amount: Money,
    pub fees: Money,
    pub net_amount: Money,
    /// net minus the debt frozen at listing; negative is a shortfall
    pub balance_vs_debt: Money,
    pub settled_at: NaiveDate,
    pub note: Option<String>,
    pub cash_entry_id: CashEntryId,
    pub recorded_at: DateTime<Utc>,
}

/// gross > 0, fees >= 0, net = gross - fees > 0
pub fn net_proceeds(gross: Money, fees: Money) -> Result<Money> {
    if !gross.is_positive() {
        return Err(LedgerError::InvalidAmount { amount: gross });
    }
    if fees.is_negative() {
        return Err(LedgerError::InvalidAmount { amount: fees });
    }
    let net = gross - fees;
    if !net.is_positive() {
        return Err(LedgerError::InvalidSettlement { gross, fees });
    }
    Ok(net)
}
