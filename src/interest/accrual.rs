use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::contract::ContractTerms;
use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::interest::{calendar_days, AccrualBasis, AmountDue};
use crate::payments::PaidTotals;

/// simple (non-compounding) interest over fixed-length billing periods
#[derive(Debug, Clone, Copy)]
pub struct AccrualEngine {
    pub days_per_period: u32,
}

impl AccrualEngine {
    pub fn new(days_per_period: u32) -> Self {
        Self { days_per_period }
    }

    /// floor(principal * rate / days_per_period * days), computed exactly
    pub fn simple_interest(&self, principal: Money, rate: Rate, days: u32) -> Result<Money> {
        if days == 0 || principal.is_zero() || rate.is_zero() {
            return Ok(Money::ZERO);
        }
        if self.days_per_period == 0 {
            return Err(LedgerError::Calculation {
                message: "days_per_period is zero".to_string(),
            });
        }

        let numerator = principal
            .as_decimal()
            .checked_mul(Decimal::from(rate.bps()))
            .and_then(|n| n.checked_mul(Decimal::from(days)))
            .ok_or_else(|| LedgerError::Calculation {
                message: format!("interest overflow for principal {}", principal),
            })?;
        let denominator = Decimal::from(10_000u32) * Decimal::from(self.days_per_period);

        Money::from_decimal_floor(numerator / denominator).ok_or_else(|| {
            LedgerError::Calculation {
                message: format!("interest for principal {} out of range", principal),
            }
        })
    }

    /// amount due as of `as_of`, never accruing past `today`.
    ///
    /// With a finalized contract the gross interest and elapsed days come from
    /// the frozen terms; payments recorded afterwards still reduce the balance.
    pub fn amount_due(
        &self,
        basis: &AccrualBasis,
        paid: &PaidTotals,
        locked: Option<&ContractTerms>,
        as_of: NaiveDate,
        today: NaiveDate,
    ) -> Result<AmountDue> {
        if as_of < basis.start_date {
            return Err(LedgerError::AsOfBeforeStart {
                as_of,
                start_date: basis.start_date,
            });
        }

        let principal_remaining = basis.principal.saturating_sub(paid.principal);
        let fees_due = basis.admin_fee.saturating_sub(paid.fee);

        let (effective, elapsed_days, gross_interest) = match locked {
            Some(terms) => (terms.as_of, terms.elapsed_days, terms.gross_interest),
            None => {
                let effective = as_of.min(today).max(basis.start_date);
                let days = calendar_days(basis.start_date, effective)?;
                let gross = self.simple_interest(principal_remaining, basis.rate, days)?;
                (effective, days, gross)
            }
        };

        let interest_accrued = gross_interest.saturating_sub(paid.interest);
        let total_due = principal_remaining
            .checked_add(interest_accrued)
            .and_then(|t| t.checked_add(fees_due))
            .ok_or_else(|| LedgerError::Calculation {
                message: format!("total due overflow for principal {}", principal_remaining),
            })?;

        Ok(AmountDue {
            as_of: effective,
            elapsed_days,
            principal_remaining,
            interest_accrued,
            fees_due,
            total_due,
            gross_interest,
            locked: locked.is_some(),
        })
    }
}
