pub mod allocation;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{ActorId, CashEntryId, LoanId, PaymentId};

pub use allocation::{allocate, PaymentApplication, PaymentBreakdown, ALLOCATION_ORDER};

/// a payment recorded against a loan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub loan_id: LoanId,
    /// booked amount; equals `breakdown.total()`
    pub amount: Money,
    pub breakdown: PaymentBreakdown,
    pub paid_at: DateTime<Utc>,
    pub recorded_by: ActorId,
    pub recorded_at: DateTime<Utc>,
    /// cash-in entry posted with this payment
    pub cash_entry_id: CashEntryId,
    pub reversal: Option<PaymentReversal>,
}

impl Payment {
    pub fn is_reversed(&self) -> bool {
        self.reversal.is_some()
    }
}

/// audit fields of a reversed payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReversal {
    pub reason: String,
    pub reversed_by: ActorId,
    pub reversed_at: DateTime<Utc>,
    /// compensating cash-out entry
    pub cash_entry_id: CashEntryId,
}

/// totals of all non-reversed payments on a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaidTotals {
    pub principal: Money,
    pub interest: Money,
    pub fee: Money,
}

impl PaidTotals {
    pub fn from_payments<'a, I>(payments: I) -> Self
    where
        I: IntoIterator<Item = &'a Payment>,
    {
        payments
            .into_iter()
            .filter(|p| !p.is_reversed())
            .fold(PaidTotals::default(), |mut acc, p| {
                acc.principal += p.breakdown.principal_portion;
                acc.interest += p.breakdown.interest_portion;
                acc.fee += p.breakdown.fee_portion;
                acc
            })
    }

    pub fn total(&self) -> Money {
        self.principal + self.interest + self.fee
    }
}
