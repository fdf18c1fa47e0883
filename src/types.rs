use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type LoanId = Uuid;
pub type PaymentId = Uuid;
pub type CashEntryId = Uuid;
pub type AuctionId = Uuid;
pub type SettlementId = Uuid;
pub type ContractId = Uuid;
pub type DecisionId = Uuid;

/// opaque identity of the user performing an operation, for audit fields
pub type ActorId = String;

/// loan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    /// disbursed, not yet past due date
    Active,
    /// past due date with principal outstanding
    Overdue,
    /// collateral listed in an open auction
    ListedForAuction,
    /// collateral sold at auction
    Sold,
    /// principal fully repaid
    Lunas,
    /// administratively closed
    Closed,
}

impl LoanStatus {
    /// no new payments or auctions are accepted
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Lunas | LoanStatus::Closed)
    }
}

/// cash movement direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    In,
    Out,
}

impl EntryType {
    pub fn opposite(&self) -> EntryType {
        match self {
            EntryType::In => EntryType::Out,
            EntryType::Out => EntryType::In,
        }
    }
}

/// component of a payment, listed in allocation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentComponent {
    #[serde(rename = "PAYMENT_INTEREST")]
    Interest,
    #[serde(rename = "PAYMENT_ADMIN_FEE")]
    AdminFee,
    #[serde(rename = "PAYMENT_PRINCIPAL")]
    Principal,
}

/// where a cash entry came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "source")]
pub enum CashSource {
    LoanDisbursement,
    /// one entry per payment, tagged with every component it covered
    Payment { components: Vec<PaymentComponent> },
    AuctionProceeds,
    Manual,
}

/// entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Posted,
    Reversed,
}

/// record that caused a cash entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryLink {
    Loan(LoanId),
    Payment(PaymentId),
    Settlement(SettlementId),
}

/// auction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuctionStatus {
    Listed,
    Sold,
    Cancelled,
}

/// final outcome when closing an auction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuctionOutcome {
    Sold,
    Cancelled,
}

impl From<AuctionOutcome> for AuctionStatus {
    fn from(outcome: AuctionOutcome) -> Self {
        match outcome {
            AuctionOutcome::Sold => AuctionStatus::Sold,
            AuctionOutcome::Cancelled => AuctionStatus::Cancelled,
        }
    }
}

/// contract status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractStatus {
    Draft,
    Final,
    Void,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&LoanStatus::ListedForAuction).unwrap(), "\"LISTED_FOR_AUCTION\"");
        assert_eq!(serde_json::to_string(&PaymentComponent::AdminFee).unwrap(), "\"PAYMENT_ADMIN_FEE\"");
    }

    #[test]
    fn test_terminal() {
        assert!(LoanStatus::Lunas.is_terminal());
        assert!(LoanStatus::Closed.is_terminal());
        assert!(!LoanStatus::Overdue.is_terminal());
        assert!(!LoanStatus::Sold.is_terminal());
    }

    #[test]
    fn test_allocation_order_is_ord() {
        let mut parts = vec![PaymentComponent::Principal, PaymentComponent::Interest, PaymentComponent::AdminFee];
        parts.sort();
        assert_eq!(parts, vec![PaymentComponent::Interest, PaymentComponent::AdminFee, PaymentComponent::Principal]);
    }
}
