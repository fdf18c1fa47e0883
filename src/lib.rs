pub mod auction;
pub mod cash;
pub mod clock;
pub mod config;
pub mod contract;
pub mod decimal;
pub mod engine;
pub mod errors;
pub mod events;
pub mod interest;
pub mod loan;
pub mod locks;
pub mod payments;
pub mod state;
pub mod store;
pub mod types;

// re-export key types
pub use auction::{Auction, AuctionDecision, Settlement};
pub use cash::{CashLedger, CashLedgerEntry, CashSummary, LedgerView};
pub use clock::Clock;
pub use config::{LedgerConfig, LockRetryPolicy};
pub use contract::{Contract, ContractTerms};
pub use decimal::{Money, Rate};
pub use engine::LedgerEngine;
pub use errors::{ErrorKind, LedgerError, Result};
pub use events::{EventStore, LedgerEvent};
pub use interest::{AccrualEngine, AmountDue};
pub use loan::{Loan, LoanBook, NewLoan};
pub use payments::{Payment, PaymentBreakdown, PaymentReversal};
pub use store::{LedgerStore, MemoryStore, Write, WriteBatch};
pub use types::{
    ActorId, AuctionId, AuctionOutcome, AuctionStatus, CashEntryId, CashSource, ContractId,
    ContractStatus, DecisionId, EntryLink, EntryStatus, EntryType, LoanId, LoanStatus,
    PaymentComponent, PaymentId, SettlementId,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
