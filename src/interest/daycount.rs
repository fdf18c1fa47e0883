use chrono::NaiveDate;

use crate::errors::{LedgerError, Result};

/// whole calendar days from `start` to `end`
pub fn calendar_days(start: NaiveDate, end: NaiveDate) -> Result<u32> {
    let days = (end - start).num_days();
    if days < 0 {
        return Err(LedgerError::InvalidDate {
            message: format!("{} is before {}", end, start),
        });
    }
    u32::try_from(days).map_err(|_| LedgerError::InvalidDate {
        message: format!("span {} -> {} too long", start, end),
    })
}
