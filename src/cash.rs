//! Append-only cash ledger.
//!
//! Entries are never edited. A reversal is a new entry of the opposite type
//! and equal amount pointing at the original, and the original is flagged
//! `Reversed`. Its recorded amount stays as it was.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{ActorId, CashEntryId, CashSource, EntryLink, EntryStatus, EntryType, LoanId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashLedgerEntry {
    pub id: CashEntryId,
    pub entry_type: EntryType,
    pub source: CashSource,
    pub amount: Money,
    pub transaction_date: NaiveDate,
    pub status: EntryStatus,
    pub loan_id: Option<LoanId>,
    pub link: Option<EntryLink>,
    /// set on compensating entries
    pub reverses: Option<CashEntryId>,
    /// set on originals once reversed
    pub reversed_by: Option<CashEntryId>,
    pub note: Option<String>,
    pub posted_by: ActorId,
    pub posted_at: DateTime<Utc>,
}

/// fields for a new entry
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub entry_type: EntryType,
    pub source: CashSource,
    pub amount: Money,
    pub transaction_date: NaiveDate,
    pub loan_id: Option<LoanId>,
    pub link: Option<EntryLink>,
    pub note: Option<String>,
}

impl CashLedgerEntry {
    /// build a posted entry
    pub fn post(draft: EntryDraft, actor: &str, now: DateTime<Utc>) -> Result<Self> {
        if !draft.amount.is_positive() {
            return Err(LedgerError::InvalidAmount {
                amount: draft.amount,
            });
        }
        Ok(Self {
            id: Uuid::new_v4(),
            entry_type: draft.entry_type,
            source: draft.source,
            amount: draft.amount,
            transaction_date: draft.transaction_date,
            status: EntryStatus::Posted,
            loan_id: draft.loan_id,
            link: draft.link,
            reverses: None,
            reversed_by: None,
            note: draft.note,
            posted_by: actor.to_string(),
            posted_at: now,
        })
    }

    /// build the compensating entry for `self`
    pub fn reversal(&self, reason: &str, actor: &str, now: DateTime<Utc>) -> Result<Self> {
        if self.status == EntryStatus::Reversed {
            return Err(LedgerError::EntryNotReversible {
                id: self.id,
                reason: "already reversed".to_string(),
            });
        }
        if self.reverses.is_some() {
            return Err(LedgerError::EntryNotReversible {
                id: self.id,
                reason: "entry is itself a reversal".to_string(),
            });
        }
        Ok(Self {
            id: Uuid::new_v4(),
            entry_type: self.entry_type.opposite(),
            source: self.source.clone(),
            amount: self.amount,
            transaction_date: now.date_naive(),
            status: EntryStatus::Posted,
            loan_id: self.loan_id,
            link: self.link,
            reverses: Some(self.id),
            reversed_by: None,
            note: Some(reason.to_string()),
            posted_by: actor.to_string(),
            posted_at: now,
        })
    }

    pub fn is_reversal(&self) -> bool {
        self.reverses.is_some()
    }

    /// +amount for IN, -amount for OUT
    pub fn signed_amount(&self) -> Money {
        match self.entry_type {
            EntryType::In => self.amount,
            EntryType::Out => -self.amount,
        }
    }
}

/// which entries a summary covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerView {
    /// every entry, originals and reversals
    All,
    /// drop reversed originals together with their compensating entries
    Effective,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CashSummary {
    pub total_in: Money,
    pub total_out: Money,
    pub net: Money,
    pub entries: usize,
}

/// read-only view over ledger entries
pub struct CashLedger<'a> {
    entries: &'a [CashLedgerEntry],
}

impl<'a> CashLedger<'a> {
    pub fn new(entries: &'a [CashLedgerEntry]) -> Self {
        Self { entries }
    }

    pub fn entries(&self, view: LedgerView) -> impl Iterator<Item = &'a CashLedgerEntry> {
        self.entries.iter().filter(move |e| match view {
            LedgerView::All => true,
            LedgerView::Effective => e.status == EntryStatus::Posted && !e.is_reversal(),
        })
    }

    pub fn summary(&self, view: LedgerView) -> CashSummary {
        self.entries(view).fold(CashSummary::default(), |mut acc, e| {
            match e.entry_type {
                EntryType::In => acc.total_in += e.amount,
                EntryType::Out => acc.total_out += e.amount,
            }
            acc.net += e.signed_amount();
            acc.entries += 1;
            acc
        })
    }

    /// posted, non-compensating entries caused by `link`
    pub fn posted_for(&self, link: EntryLink) -> Vec<&'a CashLedgerEntry> {
        self.entries(LedgerView::Effective)
            .filter(|e| e.link == Some(link))
            .collect()
    }

    /// every reversed original has exactly one matching compensating entry
    pub fn is_reconciled(&self) -> bool {
        self.entries
            .iter()
            .filter(|e| e.status == EntryStatus::Reversed)
            .all(|original| {
                let mut compensating = self.entries.iter().filter(|e| e.reverses == Some(original.id));
                match (compensating.next(), compensating.next()) {
                    (Some(rev), None) => {
                        rev.amount == original.amount
                            && rev.entry_type == original.entry_type.opposite()
                            && original.reversed_by == Some(rev.id)
                    }
                    _ => false,
                }
            })
            && self.summary(LedgerView::All).net == self.summary(LedgerView::Effective).net
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(entry_type: EntryType, amount: i64) -> EntryDraft {
        EntryDraft {
            entry_type,
            source: CashSource::Manual,
            amount: Money::from_minor(amount),
            transaction_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            loan_id: None,
            link: None,
            note: None,
        }
    }

    #[test]
    fn test_post_rejects_non_positive() {
        assert!(CashLedgerEntry::post(draft(EntryType::In, 0), "teller", Utc::now()).is_err());
        assert!(CashLedgerEntry::post(draft(EntryType::In, -1), "teller", Utc::now()).is_err());
    }

    #[test]
    fn test_reversal_nets_to_zero_either_view() {
        let now = Utc::now();
        let kept = CashLedgerEntry::post(draft(EntryType::Out, 700), "teller", now).unwrap();
        let mut original = CashLedgerEntry::post(draft(EntryType::In, 1_000), "teller", now).unwrap();
        let reversal = original.reversal("typo in amount", "supervisor", now).unwrap();
        original.status = EntryStatus::Reversed;
        original.reversed_by = Some(reversal.id);

        assert_eq!(reversal.entry_type, EntryType::Out);
        assert_eq!(reversal.amount, original.amount);

        let entries = vec![kept, original, reversal];
        let ledger = CashLedger::new(&entries);

        let all = ledger.summary(LedgerView::All);
        let effective = ledger.summary(LedgerView::Effective);
        assert_eq!(all.net, Money::from_minor(-700));
        assert_eq!(effective.net, Money::from_minor(-700));
        assert_eq!(all.entries, 3);
        assert_eq!(effective.entries, 1);
        assert!(ledger.is_reconciled());
    }

    #[test]
    fn test_cannot_reverse_twice_or_reverse_a_reversal() {
        let now = Utc::now();
        let mut original = CashLedgerEntry::post(draft(EntryType::In, 1_000), "teller", now).unwrap();
        let reversal = original.reversal("duplicate entry", "supervisor", now).unwrap();
        original.status = EntryStatus::Reversed;

        assert!(original.reversal("again", "supervisor", now).is_err());
        assert!(reversal.reversal("undo undo", "supervisor", now).is_err());
    }

    #[test]
    fn test_unmatched_reversal_not_reconciled() {
        let now = Utc::now();
        let mut original = CashLedgerEntry::post(draft(EntryType::In, 1_000), "teller", now).unwrap();
        original.status = EntryStatus::Reversed;
        let entries = vec![original];
        assert!(!CashLedger::new(&entries).is_reconciled());
    }
}
