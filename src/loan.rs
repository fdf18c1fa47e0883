use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auction::{Auction, AuctionDecision, Settlement};
use crate::contract::Contract;
use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::interest::AccrualBasis;
use crate::payments::{PaidTotals, Payment};
use crate::state::{derive_status, StatusFacts};
use crate::types::{ActorId, AuctionId, ContractId, ContractStatus, LoanId, LoanStatus};

/// origination data supplied by the caller at disbursement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLoan {
    pub loan_number: String,
    pub branch_id: String,
    pub customer_id: String,
    pub collateral_ids: Vec<String>,
    pub principal: Money,
    pub rate: Rate,
    pub admin_fee: Money,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
}

impl NewLoan {
    pub fn validate(&self) -> Result<()> {
        if !self.principal.is_positive() {
            return Err(LedgerError::InvalidTerms {
                message: format!("principal must be positive, got {}", self.principal),
            });
        }
        if self.rate.is_zero() {
            return Err(LedgerError::InvalidTerms {
                message: "interest rate must be positive".to_string(),
            });
        }
        if self.admin_fee.is_negative() {
            return Err(LedgerError::InvalidTerms {
                message: format!("admin fee cannot be negative, got {}", self.admin_fee),
            });
        }
        if !self.principal.is_within_bounds() || !self.admin_fee.is_within_bounds() {
            return Err(LedgerError::InvalidTerms {
                message: format!(
                    "principal {} and admin fee {} must not exceed {}",
                    self.principal,
                    self.admin_fee,
                    Money::MAX_AMOUNT
                ),
            });
        }
        if self.due_date < self.start_date {
            return Err(LedgerError::InvalidTerms {
                message: format!("due date {} before start date {}", self.due_date, self.start_date),
            });
        }
        if self.branch_id.trim().is_empty() || self.customer_id.trim().is_empty() {
            return Err(LedgerError::InvalidTerms {
                message: "branch and customer are required".to_string(),
            });
        }
        Ok(())
    }
}

/// a pawn loan; terms are fixed at disbursement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub loan_number: String,
    pub branch_id: String,
    pub customer_id: String,
    pub collateral_ids: Vec<String>,
    pub principal: Money,
    pub rate: Rate,
    pub admin_fee: Money,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,

    /// last committed status evaluation
    pub status: LoanStatus,
    pub status_changed_at: DateTime<Utc>,

    /// final contract whose snapshot currently locks the amount due
    pub locked_by: Option<ContractId>,

    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub closed_by: Option<ActorId>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn from_new(new: NewLoan, actor: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_number: new.loan_number,
            branch_id: new.branch_id,
            customer_id: new.customer_id,
            collateral_ids: new.collateral_ids,
            principal: new.principal,
            rate: new.rate,
            admin_fee: new.admin_fee,
            start_date: new.start_date,
            due_date: new.due_date,
            status: LoanStatus::Active,
            status_changed_at: now,
            locked_by: None,
            created_by: actor.to_string(),
            created_at: now,
            closed_by: None,
            closed_at: None,
        }
    }

    pub fn accrual_basis(&self) -> AccrualBasis {
        AccrualBasis {
            principal: self.principal,
            rate: self.rate,
            admin_fee: self.admin_fee,
            start_date: self.start_date,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}

/// a loan with every record hanging off it, in insertion order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanBook {
    pub loan: Loan,
    pub payments: Vec<Payment>,
    pub decisions: Vec<AuctionDecision>,
    pub auctions: Vec<Auction>,
    pub settlements: Vec<Settlement>,
    pub contracts: Vec<Contract>,
}

impl LoanBook {
    pub fn new(loan: Loan) -> Self {
        Self {
            loan,
            payments: Vec::new(),
            decisions: Vec::new(),
            auctions: Vec::new(),
            settlements: Vec::new(),
            contracts: Vec::new(),
        }
    }

    pub fn paid_totals(&self) -> PaidTotals {
        PaidTotals::from_payments(&self.payments)
    }

    pub fn principal_remaining(&self) -> Money {
        self.loan.principal.saturating_sub(self.paid_totals().principal)
    }

    pub fn latest_auction(&self) -> Option<&Auction> {
        self.auctions.last()
    }

    pub fn open_auction(&self) -> Option<&Auction> {
        self.auctions.iter().find(|a| a.is_open())
    }

    /// the latest decision, unless an auction has already consumed it
    pub fn operative_decision(&self) -> Option<&AuctionDecision> {
        let latest = self.decisions.last()?;
        let consumed = self.auctions.iter().any(|a| a.decision_id == latest.id);
        (!consumed).then_some(latest)
    }

    pub fn final_contract(&self) -> Option<&Contract> {
        self.contracts.iter().find(|c| c.status == ContractStatus::Final)
    }

    pub fn draft_contract(&self) -> Option<&Contract> {
        self.contracts.iter().find(|c| c.status == ContractStatus::Draft)
    }

    pub fn settlement_for(&self, auction_id: AuctionId) -> Option<&Settlement> {
        self.settlements.iter().find(|s| s.auction_id == auction_id)
    }

    pub fn status_facts(&self, today: NaiveDate) -> StatusFacts {
        StatusFacts {
            principal_remaining: self.principal_remaining(),
            due_date: self.loan.due_date,
            today,
            latest_auction: self.latest_auction().map(|a| a.status),
            closed: self.loan.is_closed(),
        }
    }

    /// freshly derived status
    pub fn status(&self, today: NaiveDate) -> LoanStatus {
        derive_status(&self.status_facts(today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_loan() -> NewLoan {
        NewLoan {
            loan_number: "LN-0001".to_string(),
            branch_id: "JKT01".to_string(),
            customer_id: "C-77".to_string(),
            collateral_ids: vec!["gold-ring-5g".to_string()],
            principal: Money::from_minor(1_000_000),
            rate: Rate::from_bps(300),
            admin_fee: Money::from_minor(10_000),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        }
    }

    #[test]
    fn test_validate_terms() {
        assert!(new_loan().validate().is_ok());

        let mut bad = new_loan();
        bad.due_date = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        assert!(matches!(bad.validate(), Err(LedgerError::InvalidTerms { .. })));

        let mut bad = new_loan();
        bad.principal = Money::ZERO;
        assert!(bad.validate().is_err());

        let mut bad = new_loan();
        bad.branch_id = " ".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_amounts_capped() {
        let mut bad = new_loan();
        bad.principal = Money::from_minor(i64::MAX - 10);
        bad.admin_fee = Money::from_minor(100);
        assert!(matches!(bad.validate(), Err(LedgerError::InvalidTerms { .. })));

        let mut bad = new_loan();
        bad.admin_fee = Money::from_minor(Money::MAX_AMOUNT.minor() + 1);
        assert!(bad.validate().is_err());

        let mut ok = new_loan();
        ok.principal = Money::MAX_AMOUNT;
        ok.admin_fee = Money::MAX_AMOUNT;
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_decision_consumed_by_auction() {
        let now = Utc::now();
        let mut book = LoanBook::new(Loan::from_new(new_loan(), "teller", now));
        assert!(book.operative_decision().is_none());

        let decision = AuctionDecision {
            id: Uuid::new_v4(),
            loan_id: book.loan.id,
            note: "unredeemed".to_string(),
            decided_by: "manager".to_string(),
            decided_at: now,
        };
        book.decisions.push(decision.clone());
        assert_eq!(book.operative_decision().map(|d| d.id), Some(decision.id));

        book.auctions
            .push(Auction::list(book.loan.id, decision.id, Money::from_minor(1), 1, now));
        assert!(book.operative_decision().is_none());
        assert!(book.open_auction().is_some());
    }
}
