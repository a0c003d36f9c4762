//! In-memory data source for testing

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::reconciliation::ReconciliationCalculator;
use crate::traits::*;
use crate::types::*;

/// In-memory source implementation for testing and development
///
/// Records are returned in insertion order, filtered to the requested period.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: Arc<RwLock<HashMap<String, Vec<BankStatementEntry>>>>,
    transactions: Arc<RwLock<HashMap<String, Vec<Transaction>>>>,
    closing_balances: Arc<RwLock<HashMap<(String, NaiveDate), Cents>>>,
}

fn poisoned<T>(_: PoisonError<T>) -> ReconciliationError {
    ReconciliationError::Source("memory source lock poisoned".to_string())
}

impl MemorySource {
    /// Create a new empty source
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bank_entry(
        &self,
        account_id: &str,
        entry: BankStatementEntry,
    ) -> ReconciliationResult<()> {
        self.entries
            .write()
            .map_err(poisoned)?
            .entry(account_id.to_string())
            .or_default()
            .push(entry);
        Ok(())
    }

    pub fn add_transaction(
        &self,
        account_id: &str,
        transaction: Transaction,
    ) -> ReconciliationResult<()> {
        self.transactions
            .write()
            .map_err(poisoned)?
            .entry(account_id.to_string())
            .or_default()
            .push(transaction);
        Ok(())
    }

    /// Record the balance the ledger expects at the end of `day`
    pub fn set_expected_closing_balance(
        &self,
        account_id: &str,
        day: NaiveDate,
        balance: Cents,
    ) -> ReconciliationResult<()> {
        self.closing_balances
            .write()
            .map_err(poisoned)?
            .insert((account_id.to_string(), day), balance);
        Ok(())
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> ReconciliationResult<()> {
        self.entries.write().map_err(poisoned)?.clear();
        self.transactions.write().map_err(poisoned)?.clear();
        self.closing_balances.write().map_err(poisoned)?.clear();
        Ok(())
    }
}

#[async_trait]
impl ReconciliationSource for MemorySource {
    async fn fetch_bank_entries(
        &self,
        account_id: &str,
        first_day: NaiveDate,
        last_day: NaiveDate,
    ) -> ReconciliationResult<Vec<BankStatementEntry>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .get(account_id)
            .map(|all| ReconciliationCalculator::filter_by_period(all, first_day, last_day))
            .unwrap_or_default())
    }

    async fn fetch_transactions(
        &self,
        account_id: &str,
        first_day: NaiveDate,
        last_day: NaiveDate,
    ) -> ReconciliationResult<Vec<Transaction>> {
        let transactions = self.transactions.read().map_err(poisoned)?;
        Ok(transactions
            .get(account_id)
            .map(|all| ReconciliationCalculator::filter_by_period(all, first_day, last_day))
            .unwrap_or_default())
    }

    async fn expected_closing_balance(
        &self,
        account_id: &str,
        last_day: NaiveDate,
    ) -> ReconciliationResult<Option<Cents>> {
        let balances = self.closing_balances.read().map_err(poisoned)?;
        Ok(balances.get(&(account_id.to_string(), last_day)).copied())
    }
}
