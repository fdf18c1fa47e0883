pub mod accrual;
pub mod daycount;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};

pub use accrual::AccrualEngine;
pub use daycount::calendar_days;

/// the fixed terms interest is computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualBasis {
    pub principal: Money,
    pub rate: Rate,
    pub admin_fee: Money,
    pub start_date: NaiveDate,
}

/// amount due on a loan at a given date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountDue {
    pub as_of: NaiveDate,
    pub elapsed_days: u32,
    pub principal_remaining: Money,
    /// accrued interest not yet paid
    pub interest_accrued: Money,
    /// admin fee not yet paid
    pub fees_due: Money,
    pub total_due: Money,
    /// gross interest accrued since start, before interest payments
    pub gross_interest: Money,
    /// true when read from a finalized contract instead of live accrual
    pub locked: bool,
}
