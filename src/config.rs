use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};

/// ledger policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// fixed billing period length in days
    pub days_per_period: u32,
    /// amount a payment may exceed total due by; anything above is rejected
    pub overpayment_tolerance: Money,
    pub min_reversal_reason_len: usize,
    pub min_cancel_note_len: usize,
    pub min_void_reason_len: usize,
    pub lock_retry: LockRetryPolicy,
    /// prefix for generated contract numbers
    pub contract_prefix: String,
}

/// bounded retry on per-loan lock contention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockRetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for LockRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_ms: 10,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            days_per_period: 30,
            overpayment_tolerance: Money::ZERO,
            min_reversal_reason_len: 10,
            min_cancel_note_len: 10,
            min_void_reason_len: 10,
            lock_retry: LockRetryPolicy::default(),
            contract_prefix: "PGD".to_string(),
        }
    }
}

impl LedgerConfig {
    /// stricter audit text requirements, no overpayment slack
    pub fn strict() -> Self {
        Self {
            overpayment_tolerance: Money::ZERO,
            min_reversal_reason_len: 20,
            min_cancel_note_len: 20,
            min_void_reason_len: 20,
            ..Self::default()
        }
    }

    /// load from json; missing fields fall back to defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LedgerConfig =
            serde_json::from_str(json).map_err(|e| LedgerError::Configuration {
                message: format!("cannot parse ledger config: {}", e),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.days_per_period == 0 {
            return Err(LedgerError::Configuration {
                message: "days_per_period must be positive".to_string(),
            });
        }
        if self.overpayment_tolerance.is_negative() {
            return Err(LedgerError::Configuration {
                message: "overpayment_tolerance cannot be negative".to_string(),
            });
        }
        if self.overpayment_tolerance > Money::MAX_AMOUNT {
            return Err(LedgerError::Configuration {
                message: format!("overpayment_tolerance cannot exceed {}", Money::MAX_AMOUNT),
            });
        }
        if self.lock_retry.max_attempts == 0 {
            return Err(LedgerError::Configuration {
                message: "lock_retry.max_attempts must be at least 1".to_string(),
            });
        }
        if self.contract_prefix.trim().is_empty() {
            return Err(LedgerError::Configuration {
                message: "contract_prefix cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}
