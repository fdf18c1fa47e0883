use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::interest::AmountDue;
use crate::types::PaymentComponent;

/// how one payment was split across the balance components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PaymentBreakdown {
    pub interest_portion: Money,
    pub fee_portion: Money,
    pub principal_portion: Money,
}

impl PaymentBreakdown {
    pub fn total(&self) -> Money {
        self.interest_portion + self.fee_portion + self.principal_portion
    }

    /// non-zero components, in allocation order
    pub fn components(&self) -> Vec<PaymentComponent> {
        ALLOCATION_ORDER
            .iter()
            .copied()
            .filter(|c| self.portion(*c).is_positive())
            .collect()
    }

    pub fn portion(&self, component: PaymentComponent) -> Money {
        match component {
            PaymentComponent::Interest => self.interest_portion,
            PaymentComponent::AdminFee => self.fee_portion,
            PaymentComponent::Principal => self.principal_portion,
        }
    }

    fn portion_mut(&mut self, component: PaymentComponent) -> &mut Money {
        match component {
            PaymentComponent::Interest => &mut self.interest_portion,
            PaymentComponent::AdminFee => &mut self.fee_portion,
            PaymentComponent::Principal => &mut self.principal_portion,
        }
    }
}

/// interest first, then fees, then principal. not configurable.
pub const ALLOCATION_ORDER: [PaymentComponent; 3] = [
    PaymentComponent::Interest,
    PaymentComponent::AdminFee,
    PaymentComponent::Principal,
];

/// payment split result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentApplication {
    pub breakdown: PaymentBreakdown,
    /// tendered amount above total due, within tolerance; handed back, never booked
    pub change: Money,
}

impl PaymentApplication {
    pub fn applied(&self) -> Money {
        self.breakdown.total()
    }
}

/// split a tendered amount over what is due
pub fn allocate(tendered: Money, due: &AmountDue, tolerance: Money) -> Result<PaymentApplication> {
    if !tendered.is_positive() {
        return Err(LedgerError::InvalidAmount { amount: tendered });
    }
    let ceiling = due
        .total_due
        .checked_add(tolerance)
        .ok_or_else(|| LedgerError::Calculation {
            message: format!("tolerance {} overflows total due {}", tolerance, due.total_due),
        })?;
    if tendered > ceiling {
        return Err(LedgerError::Overpayment {
            total_due: due.total_due,
            tolerance,
            tendered,
        });
    }

    let mut balances = PaymentBreakdown {
        interest_portion: due.interest_accrued,
        fee_portion: due.fees_due,
        principal_portion: due.principal_remaining,
    };
    let mut breakdown = PaymentBreakdown::default();
    let mut remaining = tendered;

    for component in ALLOCATION_ORDER {
        if remaining.is_zero() {
            break;
        }
        let balance = balances.portion_mut(component);
        let applied = remaining.min(*balance);
        *balance -= applied;
        *breakdown.portion_mut(component) = applied;
        remaining -= applied;
    }

    Ok(PaymentApplication {
        breakdown,
        change: remaining,
    })
}
