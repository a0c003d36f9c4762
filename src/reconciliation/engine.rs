//! Reconciliation run orchestration over a host-supplied data source

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::reconciliation::calculator::{
    BalanceDifference, ReconciliationCalculator, TransactionTotals,
};
use crate::reconciliation::discrepancy::DiscrepancyDetector;
use crate::reconciliation::matcher::MatchingEngine;
use crate::tolerance::ToleranceConfig;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{validate_account_id, validate_period};

/// Everything one reconciliation run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub account_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// One result per processed bank entry
    pub matches: Vec<MatchResult>,
    /// Balance discrepancy first (if any), then amount discrepancies
    pub discrepancies: Vec<Discrepancy>,
    /// Ledger transactions no bank entry claimed
    pub unmatched_transactions: Vec<String>,
    /// Records left out because they could not be evaluated
    pub unprocessable: Vec<UnprocessableItem>,
    /// Credit/debit totals of the ledger side for the period
    pub ledger_totals: TransactionTotals,
    /// Closing balance comparison, absent when the source had no expected balance
    pub balance: Option<BalanceDifference>,
}

impl ReconciliationReport {
    /// True when every entry matched and nothing was flagged or rejected
    pub fn is_reconciled(&self) -> bool {
        self.discrepancies.is_empty()
            && self.unprocessable.is_empty()
            && self.unmatched_transactions.is_empty()
            && self.matches.iter().all(|result| result.matched)
    }

    pub fn matched_count(&self) -> usize {
        self.matches.iter().filter(|result| result.matched).count()
    }

    /// Highest severity among the discrepancies
    pub fn worst_severity(&self) -> Option<Severity> {
        self.discrepancies.iter().map(|d| d.severity).max()
    }
}

/// Runs matching and discrepancy detection for one account and period
///
/// The engine holds no mutable state. Runs for the same account must be
/// serialized by the caller.
pub struct ReconciliationEngine<S: ReconciliationSource> {
    source: S,
    calculator: Arc<ReconciliationCalculator>,
    matcher: MatchingEngine,
    detector: DiscrepancyDetector,
}

impl<S: ReconciliationSource> ReconciliationEngine<S> {
    /// Create an engine; fails if the configuration violates its bounds
    pub fn new(source: S, config: ToleranceConfig) -> ReconciliationResult<Self> {
        let calculator = Arc::new(ReconciliationCalculator::new(config)?);
        Ok(Self {
            source,
            matcher: MatchingEngine::new(Arc::clone(&calculator)),
            detector: DiscrepancyDetector::new(Arc::clone(&calculator)),
            calculator,
        })
    }

    pub fn config(&self) -> &ToleranceConfig {
        self.calculator.config()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Reconcile `account_id` for every calendar day from `first_day` through `last_day`
    pub async fn run(
        &self,
        account_id: &str,
        first_day: NaiveDate,
        last_day: NaiveDate,
    ) -> ReconciliationResult<ReconciliationReport> {
        validate_account_id(account_id)?;
        validate_period(first_day, last_day)?;

        let mut entries = self
            .source
            .fetch_bank_entries(account_id, first_day, last_day)
            .await?;
        let mut transactions = self
            .source
            .fetch_transactions(account_id, first_day, last_day)
            .await?;
        let expected_closing = self
            .source
            .expected_closing_balance(account_id, last_day)
            .await?;

        // Stable sorts keep the source order for same-instant records
        entries.sort_by_key(|entry| entry.date);
        transactions.sort_by_key(|transaction| transaction.date);
        let entries = ReconciliationCalculator::filter_by_period(&entries, first_day, last_day);
        let transactions =
            ReconciliationCalculator::filter_by_period(&transactions, first_day, last_day);

        let batch = self.matcher.match_batch(&entries, &transactions);
        let detection = self.detector.detect_amount_discrepancies(&batch.pairs);

        let mut discrepancies = Vec::new();
        let mut unprocessable = batch.unprocessable;
        unprocessable.extend(detection.unprocessable);

        let balance = match expected_closing {
            Some(expected) => {
                let balance = self
                    .calculator
                    .calculate_balance_difference(&entries, expected)?;
                if let Some(discrepancy) = self.detector.balance_discrepancy(&balance)? {
                    discrepancies.push(discrepancy);
                }
                Some(balance)
            }
            None => {
                warn!(account_id, %last_day, "No expected closing balance; skipping balance check");
                None
            }
        };
        discrepancies.extend(detection.discrepancies);

        // Only transactions rejected by validation are left out of the totals
        let rejected: HashSet<&str> = batch
            .rejected_transactions
            .iter()
            .map(String::as_str)
            .collect();
        let valid_transactions: Vec<Transaction> = transactions
            .into_iter()
            .filter(|transaction| !rejected.contains(transaction.id.as_str()))
            .collect();
        let ledger_totals = self
            .calculator
            .calculate_transaction_totals(&valid_transactions)?;

        let report = ReconciliationReport {
            account_id: account_id.to_string(),
            period_start: first_day,
            period_end: last_day,
            matches: batch.results,
            discrepancies,
            unmatched_transactions: batch.unmatched_transactions,
            unprocessable,
            ledger_totals,
            balance,
        };

        info!(
            account_id,
            %first_day,
            %last_day,
            matched = report.matched_count(),
            discrepancies = report.discrepancies.len(),
            unmatched_transactions = report.unmatched_transactions.len(),
            unprocessable = report.unprocessable.len(),
            "Reconciliation run complete"
        );
        Ok(report)
    }
}
