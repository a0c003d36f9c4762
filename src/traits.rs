//! Traits for the data-access boundary and for date-ordered records

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::types::*;

/// Records that carry a booking or value date
pub trait Dated {
    fn date(&self) -> NaiveDateTime;
}

impl Dated for BankStatementEntry {
    fn date(&self) -> NaiveDateTime {
        self.date
    }
}

impl Dated for Transaction {
    fn date(&self) -> NaiveDateTime {
        self.date
    }
}

/// Data source supplied by the host application
///
/// This is the only place a reconciliation run suspends. Implementations wrap
/// whatever store holds bank statements and the ledger (PostgreSQL, a bank
/// feed, in-memory fixtures, etc.). Returned records need not be sorted.
#[async_trait]
pub trait ReconciliationSource: Send + Sync {
    /// Bank statement entries for an account dated within `first_day..=last_day`
    async fn fetch_bank_entries(
        &self,
        account_id: &str,
        first_day: NaiveDate,
        last_day: NaiveDate,
    ) -> ReconciliationResult<Vec<BankStatementEntry>>;

    /// Ledger transactions for an account dated within `first_day..=last_day`
    async fn fetch_transactions(
        &self,
        account_id: &str,
        first_day: NaiveDate,
        last_day: NaiveDate,
    ) -> ReconciliationResult<Vec<Transaction>>;

    /// Closing balance the ledger expects at the end of `last_day`, if known
    async fn expected_closing_balance(
        &self,
        account_id: &str,
        last_day: NaiveDate,
    ) -> ReconciliationResult<Option<Cents>>;
}
