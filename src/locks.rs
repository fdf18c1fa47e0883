use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::LockRetryPolicy;
use crate::errors::{LedgerError, Result};
use crate::types::LoanId;

/// in-process per-loan exclusion: at most one mutating operation per loan
#[derive(Debug, Default)]
pub struct LoanLocks {
    held: Mutex<HashSet<LoanId>>,
}

impl LoanLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// take the lock for `loan_id`, retrying on contention per `policy`
    pub fn acquire(&self, loan_id: LoanId, policy: &LockRetryPolicy) -> Result<LoanGuard<'_>> {
        let attempts = policy.max_attempts.max(1);
        for attempt in 1..=attempts {
            if self.try_acquire(loan_id) {
                return Ok(LoanGuard {
                    locks: self,
                    loan_id,
                });
            }
            debug!(%loan_id, attempt, "loan busy, retrying");
            if attempt < attempts {
                thread::sleep(Duration::from_millis(policy.backoff_ms));
            }
        }
        warn!(%loan_id, attempts, "giving up on loan lock");
        Err(LedgerError::LockContention { loan_id, attempts })
    }

    pub fn is_held(&self, loan_id: LoanId) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&loan_id)
    }

    fn try_acquire(&self, loan_id: LoanId) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(loan_id)
    }

    fn release(&self, loan_id: LoanId) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&loan_id);
    }
}

/// releases the loan on drop
#[derive(Debug)]
pub struct LoanGuard<'a> {
    locks: &'a LoanLocks,
    loan_id: LoanId,
}

impl LoanGuard<'_> {
    pub fn loan_id(&self) -> LoanId {
        self.loan_id
    }
}

impl Drop for LoanGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(self.loan_id);
    }
}
