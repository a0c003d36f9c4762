//! Balance and amount discrepancy detection with severity classification

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::reconciliation::calculator::{BalanceDifference, ReconciliationCalculator};
use crate::types::*;
use crate::utils::money::checked_abs;
use crate::utils::validation::{validate_non_negative, validate_period};

/// Discrepancies found in a set of matched pairs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionOutcome {
    pub discrepancies: Vec<Discrepancy>,
    /// Pairs that could not be evaluated
    pub unprocessable: Vec<UnprocessableItem>,
}

/// `|difference| / base_amount * 100`, or 100 when the base is zero
pub fn discrepancy_percentage(difference: Cents, base_amount: Cents) -> ReconciliationResult<BigDecimal> {
    validate_non_negative("base amount", base_amount)?;
    if base_amount == 0 {
        return Ok(BigDecimal::from(100));
    }
    Ok(BigDecimal::from(difference.unsigned_abs()) * BigDecimal::from(100)
        / BigDecimal::from(base_amount))
}

/// Classify a difference against its base amount
///
/// Buckets are tested in order and the first hit wins:
/// low (`< 0.1%` or `< 100`), medium (`< 1%` or `< 1000`),
/// high (`< 5%` or `< 10000`), otherwise critical.
/// Percentages are compared by integer cross-multiplication.
pub fn classify_severity(difference: Cents, base_amount: Cents) -> ReconciliationResult<Severity> {
    validate_non_negative("base amount", base_amount)?;
    let diff = u128::from(difference.unsigned_abs());
    let base = base_amount as u128;

    // A zero base is 100%, which fails every percentage test
    let below_percent = |numerator: u128, denominator: u128| {
        base > 0 && diff * 100 * denominator < base * numerator
    };

    let severity = if below_percent(1, 10) || diff < 100 {
        Severity::Low
    } else if below_percent(1, 1) || diff < 1_000 {
        Severity::Medium
    } else if below_percent(5, 1) || diff < 10_000 {
        Severity::High
    } else {
        Severity::Critical
    };
    Ok(severity)
}

/// Flags balance and amount mismatches that matching could not resolve
#[derive(Debug, Clone)]
pub struct DiscrepancyDetector {
    calculator: Arc<ReconciliationCalculator>,
}

impl DiscrepancyDetector {
    pub fn new(calculator: Arc<ReconciliationCalculator>) -> Self {
        Self { calculator }
    }

    /// Compare the closing balance for a period with the expected balance
    ///
    /// `entries` must be sorted ascending by date. Entries on every calendar
    /// day from `period_start` through `period_end` are considered.
    pub fn detect_balance_discrepancy(
        &self,
        entries: &[BankStatementEntry],
        period_start: NaiveDate,
        period_end: NaiveDate,
        expected_closing_balance: Cents,
    ) -> ReconciliationResult<Option<Discrepancy>> {
        validate_period(period_start, period_end)?;
        let in_period = ReconciliationCalculator::filter_by_period(entries, period_start, period_end);
        let balance = self
            .calculator
            .calculate_balance_difference(&in_period, expected_closing_balance)?;
        self.balance_discrepancy(&balance)
    }

    /// Turn an already computed balance comparison into a discrepancy when it
    /// falls outside the balance tolerance
    pub fn balance_discrepancy(
        &self,
        balance: &BalanceDifference,
    ) -> ReconciliationResult<Option<Discrepancy>> {
        if balance.within_tolerance {
            return Ok(None);
        }

        let base_amount = checked_abs(balance.expected_balance)?;
        let discrepancy = build(
            DiscrepancyType::Balance,
            balance.difference,
            base_amount,
            balance.closing_reference.iter().cloned().collect(),
            Vec::new(),
        )?;

        warn!(
            id = %discrepancy.id,
            difference = discrepancy.difference,
            expected = balance.expected_balance,
            calculated = balance.calculated_balance,
            severity = ?discrepancy.severity,
            "Balance discrepancy detected"
        );
        Ok(Some(discrepancy))
    }

    /// Check one matched pair against the amount tolerance
    pub fn detect_amount_discrepancy(
        &self,
        pair: &MatchedPair,
    ) -> ReconciliationResult<Option<Discrepancy>> {
        let amounts = self
            .calculator
            .calculate_amount_difference_for(
                pair.entry.amount,
                pair.transaction.amount,
                pair.transaction.category.as_deref(),
            )?;

        if amounts.within_tolerance {
            return Ok(None);
        }

        let discrepancy = build(
            DiscrepancyType::Amount,
            amounts.bank_amount - amounts.transaction_amount,
            amounts.bank_amount,
            vec![pair.entry.external_reference.clone()],
            vec![pair.transaction.id.clone()],
        )?;

        warn!(
            id = %discrepancy.id,
            bank_reference = %pair.entry.external_reference,
            transaction_id = %pair.transaction.id,
            difference = discrepancy.difference,
            severity = ?discrepancy.severity,
            "Amount discrepancy detected"
        );
        Ok(Some(discrepancy))
    }

    /// Check every pair; a failing pair is recorded and the rest still run
    pub fn detect_amount_discrepancies(&self, pairs: &[MatchedPair]) -> DetectionOutcome {
        let mut outcome = DetectionOutcome::default();

        for pair in pairs {
            match self.detect_amount_discrepancy(pair) {
                Ok(Some(discrepancy)) => outcome.discrepancies.push(discrepancy),
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        bank_reference = %pair.entry.external_reference,
                        error = %err,
                        "Unprocessable matched pair"
                    );
                    outcome.unprocessable.push(UnprocessableItem::new(
                        pair.entry.external_reference.clone(),
                        &err,
                    ));
                }
            }
        }

        outcome
    }
}

fn build(
    discrepancy_type: DiscrepancyType,
    difference: Cents,
    base_amount: Cents,
    bank_references: Vec<String>,
    transaction_ids: Vec<String>,
) -> ReconciliationResult<Discrepancy> {
    Ok(Discrepancy {
        id: Uuid::new_v4(),
        discrepancy_type,
        difference,
        base_amount,
        percentage: discrepancy_percentage(difference, base_amount)?,
        severity: classify_severity(difference, base_amount)?,
        bank_references,
        transaction_ids,
    })
}
