//! Tolerance-aware pairing of bank entries with ledger transactions

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::reconciliation::calculator::ReconciliationCalculator;
use crate::types::*;
use crate::utils::validation::{validate_bank_entry, validate_transaction};

/// Result of matching a batch of bank entries against a pool of transactions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchMatchOutcome {
    /// One result per processed bank entry, in processing order
    pub results: Vec<MatchResult>,
    /// The matched entries with their transactions
    pub pairs: Vec<MatchedPair>,
    /// Transactions still in the pool after every entry was processed
    pub unmatched_transactions: Vec<String>,
    /// Records rejected as malformed
    pub unprocessable: Vec<UnprocessableItem>,
    /// Ids of the transactions among `unprocessable`
    pub rejected_transactions: Vec<String>,
}

impl BatchMatchOutcome {
    pub fn matched_count(&self) -> usize {
        self.pairs.len()
    }

    pub fn unmatched_entries(&self) -> impl Iterator<Item = &MatchResult> {
        self.results.iter().filter(|result| !result.matched)
    }
}

/// Pairs bank entries with transactions using the shared calculator
#[derive(Debug, Clone)]
pub struct MatchingEngine {
    calculator: Arc<ReconciliationCalculator>,
}

impl MatchingEngine {
    pub fn new(calculator: Arc<ReconciliationCalculator>) -> Self {
        Self { calculator }
    }

    /// Evaluate one bank entry against one transaction
    ///
    /// The amount verdict ignores dates; `date_within_tolerance` is reported
    /// alongside for batch eligibility.
    pub fn match_pair(
        &self,
        entry: &BankStatementEntry,
        transaction: &Transaction,
    ) -> ReconciliationResult<MatchResult> {
        let amounts = self.calculator.calculate_amount_difference_for(
            entry.amount,
            transaction.amount,
            transaction.category.as_deref(),
        )?;
        let deviation = amounts.absolute_difference;
        let effective_tolerance = amounts.effective_tolerance;
        let matched = amounts.within_tolerance;

        let confidence_adjustment = if matched {
            confidence_penalty(deviation, effective_tolerance)
        } else {
            BigDecimal::from(0)
        };
        let date_within_tolerance = self
            .calculator
            .is_within_date_tolerance(entry.date, transaction.date);

        debug!(
            bank_reference = %entry.external_reference,
            transaction_id = %transaction.id,
            deviation,
            effective_tolerance,
            matched,
            date_within_tolerance,
            "Evaluated match candidate"
        );

        Ok(MatchResult {
            bank_reference: entry.external_reference.clone(),
            transaction_id: Some(transaction.id.clone()),
            deviation,
            effective_tolerance,
            confidence_adjustment,
            date_within_tolerance,
            matched,
        })
    }

    /// Greedily match entries against a shared pool of transactions
    ///
    /// Entries must already be in ascending date order. Each entry claims the
    /// closest remaining transaction (smallest deviation, then earliest date)
    /// that satisfies both amount and date tolerance. A claimed transaction
    /// leaves the pool, so neither side is ever matched twice.
    pub fn match_batch(
        &self,
        entries: &[BankStatementEntry],
        transactions: &[Transaction],
    ) -> BatchMatchOutcome {
        if !ReconciliationCalculator::is_sorted_by_date(entries) {
            warn!(
                entries = entries.len(),
                "Bank entries are not in date order; greedy matching follows input order"
            );
        }

        let mut outcome = BatchMatchOutcome::default();

        // Malformed transactions never enter the pool
        let mut pool: Vec<Option<&Transaction>> = transactions
            .iter()
            .map(|transaction| match validate_transaction(transaction) {
                Ok(()) => Some(transaction),
                Err(err) => {
                    warn!(transaction_id = %transaction.id, error = %err, "Unprocessable transaction");
                    outcome
                        .unprocessable
                        .push(UnprocessableItem::new(transaction.id.clone(), &err));
                    outcome.rejected_transactions.push(transaction.id.clone());
                    None
                }
            })
            .collect();

        for entry in entries {
            if let Err(err) = validate_bank_entry(entry) {
                warn!(bank_reference = %entry.external_reference, error = %err, "Unprocessable bank entry");
                outcome
                    .unprocessable
                    .push(UnprocessableItem::new(entry.external_reference.clone(), &err));
                continue;
            }

            match self.best_candidate(entry, &pool) {
                Ok(Some((index, result))) => {
                    if let Some(transaction) = pool[index].take() {
                        outcome.pairs.push(MatchedPair {
                            entry: entry.clone(),
                            transaction: transaction.clone(),
                        });
                    }
                    outcome.results.push(result);
                }
                Ok(None) => outcome
                    .results
                    .push(MatchResult::unmatched(entry.external_reference.clone())),
                Err(err) => {
                    warn!(bank_reference = %entry.external_reference, error = %err, "Unprocessable bank entry");
                    outcome
                        .unprocessable
                        .push(UnprocessableItem::new(entry.external_reference.clone(), &err));
                }
            }
        }

        outcome.unmatched_transactions = pool
            .iter()
            .flatten()
            .map(|transaction| transaction.id.clone())
            .collect();

        info!(
            entries = entries.len(),
            transactions = transactions.len(),
            matched = outcome.matched_count(),
            unmatched_transactions = outcome.unmatched_transactions.len(),
            unprocessable = outcome.unprocessable.len(),
            "Batch matching complete"
        );
        outcome
    }

    fn best_candidate(
        &self,
        entry: &BankStatementEntry,
        pool: &[Option<&Transaction>],
    ) -> ReconciliationResult<Option<(usize, MatchResult)>> {
        let mut best: Option<(usize, MatchResult)> = None;

        for (index, slot) in pool.iter().enumerate() {
            let Some(transaction) = slot else { continue };
            let result = self.match_pair(entry, transaction)?;
            if !(result.matched && result.date_within_tolerance) {
                continue;
            }

            let better = match &best {
                None => true,
                Some((best_index, best_result)) => {
                    let best_date = pool[*best_index].map(|t| t.date);
                    result.deviation < best_result.deviation
                        || (result.deviation == best_result.deviation
                            && Some(transaction.date) < best_date)
                }
            };
            if better {
                best = Some((index, result));
            }
        }

        Ok(best)
    }
}

/// `-min(deviation / tolerance * 0.1, 0.2)`
fn confidence_penalty(deviation: Cents, effective_tolerance: Cents) -> BigDecimal {
    if deviation == 0 || effective_tolerance == 0 {
        return BigDecimal::from(0);
    }
    let scaled = BigDecimal::from(deviation) / BigDecimal::from(effective_tolerance)
        / BigDecimal::from(10);
    let cap = BigDecimal::from(2) / BigDecimal::from(10);
    -scaled.min(cap)
}
