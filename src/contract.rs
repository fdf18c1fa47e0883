use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::errors::{require_text, LedgerError, Result};
use crate::interest::{calendar_days, AmountDue};
use crate::loan::Loan;
use crate::types::{ActorId, ContractId, ContractStatus, LoanId};

/// financial terms frozen at finalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTerms {
    pub principal: Money,
    pub rate: Rate,
    pub admin_fee: Money,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub tenor_days: u32,
    pub as_of: NaiveDate,
    pub elapsed_days: u32,
    pub gross_interest: Money,
    pub principal_remaining: Money,
    pub interest_due: Money,
    pub fees_due: Money,
    pub total_due: Money,
}

impl ContractTerms {
    pub fn capture(loan: &Loan, due: &AmountDue) -> Result<Self> {
        Ok(Self {
            principal: loan.principal,
            rate: loan.rate,
            admin_fee: loan.admin_fee,
            start_date: loan.start_date,
            due_date: loan.due_date,
            tenor_days: calendar_days(loan.start_date, loan.due_date)?,
            as_of: due.as_of,
            elapsed_days: due.elapsed_days,
            gross_interest: due.gross_interest,
            principal_remaining: due.principal_remaining,
            interest_due: due.interest_accrued,
            fees_due: due.fees_due,
            total_due: due.total_due,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub loan_id: LoanId,
    pub contract_number: String,
    pub status: ContractStatus,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    /// present once finalized, never modified afterwards
    pub terms: Option<ContractTerms>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub finalized_by: Option<ActorId>,
    pub void_reason: Option<String>,
    pub voided_at: Option<DateTime<Utc>>,
    pub voided_by: Option<ActorId>,
}

impl Contract {
    pub fn draft(loan_id: LoanId, contract_number: String, actor: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_id,
            contract_number,
            status: ContractStatus::Draft,
            created_by: actor.to_string(),
            created_at: now,
            terms: None,
            finalized_at: None,
            finalized_by: None,
            void_reason: None,
            voided_at: None,
            voided_by: None,
        }
    }

    /// DRAFT -> FINAL with the given snapshot
    pub fn finalize(&self, terms: ContractTerms, actor: &str, now: DateTime<Utc>) -> Result<Contract> {
        if self.status != ContractStatus::Draft {
            return Err(LedgerError::ContractStatusConflict {
                id: self.id,
                status: self.status,
                expected: ContractStatus::Draft,
            });
        }
        let mut finalized = self.clone();
        finalized.status = ContractStatus::Final;
        finalized.terms = Some(terms);
        finalized.finalized_at = Some(now);
        finalized.finalized_by = Some(actor.to_string());
        Ok(finalized)
    }

    /// FINAL -> VOID; terms are kept for the record
    pub fn void(&self, reason: &str, min_reason_len: usize, actor: &str, now: DateTime<Utc>) -> Result<Contract> {
        if self.status != ContractStatus::Final {
            return Err(LedgerError::ContractStatusConflict {
                id: self.id,
                status: self.status,
                expected: ContractStatus::Final,
            });
        }
        require_text("void reason", reason, min_reason_len)?;

        let mut voided = self.clone();
        voided.status = ContractStatus::Void;
        voided.void_reason = Some(reason.trim().to_string());
        voided.voided_at = Some(now);
        voided.voided_by = Some(actor.to_string());
        Ok(voided)
    }
}

/// e.g. `PGD/JKT01/LN-0042/02`; sequence counts contracts on the loan
pub fn contract_number(prefix: &str, branch_id: &str, loan_number: &str, sequence: usize) -> String {
    format!("{}/{}/{}/{:02}", prefix, branch_id, loan_number, sequence)
}
