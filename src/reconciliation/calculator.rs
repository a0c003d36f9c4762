//! Shared numeric comparisons and aggregations
//!
//! The matcher and the discrepancy detector both hold an `Arc` to the same
//! [`ReconciliationCalculator`] so a tolerance verdict can never differ
//! between the two.

use bigdecimal::BigDecimal;
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::tolerance::{ToleranceConfig, ToleranceKind};
use crate::traits::Dated;
use crate::types::*;
use crate::utils::money::{checked_abs, checked_add, checked_sub, round_half_even};
use crate::utils::validation::validate_non_negative;

/// Comparison of a bank amount against a ledger amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountDifference {
    /// `|bank amount|`
    pub bank_amount: Cents,
    /// `|transaction amount|`
    pub transaction_amount: Cents,
    pub absolute_difference: Cents,
    /// `absolute_difference / bank_amount * 100`, zero when the bank amount is zero
    pub percentage_difference: BigDecimal,
    /// Amount-matching tolerance resolved for the bank amount and category
    pub effective_tolerance: Cents,
    pub within_tolerance: bool,
}

/// Comparison of the bank's closing balance against the expected balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDifference {
    /// Running balance of the last entry (0 when there are no entries)
    pub calculated_balance: Cents,
    pub expected_balance: Cents,
    /// `expected_balance - calculated_balance`
    pub difference: Cents,
    pub within_tolerance: bool,
    /// Reference of the entry the closing balance was taken from
    pub closing_reference: Option<String>,
}

/// Credit and debit totals for a set of ledger transactions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTotals {
    pub total_credits: Cents,
    pub total_debits: Cents,
    /// `total_credits - total_debits`
    pub net_amount: Cents,
    pub transaction_count: usize,
}

/// Single source of truth for tolerance checks, rounding and totals
#[derive(Debug, Clone)]
pub struct ReconciliationCalculator {
    config: ToleranceConfig,
}

impl ReconciliationCalculator {
    /// Create a calculator over a validated configuration
    pub fn new(config: ToleranceConfig) -> ReconciliationResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ToleranceConfig {
        &self.config
    }

    /// Tolerance that applies to `reference_amount` for the given kind
    ///
    /// Amount matching uses the effective tolerance; the other kinds use the
    /// flat configured value.
    pub fn tolerance_for(
        &self,
        reference_amount: Cents,
        kind: ToleranceKind,
    ) -> ReconciliationResult<Cents> {
        validate_non_negative("reference amount", reference_amount)?;
        match kind {
            ToleranceKind::AmountMatching => self.config.effective_tolerance(reference_amount),
            other => Ok(self.config.flat_tolerance(other)),
        }
    }

    /// `variance <= tolerance`; equal-to-tolerance is still within
    pub fn is_within_tolerance(
        &self,
        variance: Cents,
        reference_amount: Cents,
        kind: ToleranceKind,
    ) -> ReconciliationResult<bool> {
        validate_non_negative("variance", variance)?;
        Ok(variance <= self.tolerance_for(reference_amount, kind)?)
    }

    /// Amount-matching check honouring a per-category override
    pub fn is_within_amount_tolerance(
        &self,
        variance: Cents,
        reference_amount: Cents,
        category: Option<&str>,
    ) -> ReconciliationResult<bool> {
        validate_non_negative("variance", variance)?;
        validate_non_negative("reference amount", reference_amount)?;
        Ok(variance <= self.config.effective_tolerance_for(reference_amount, category)?)
    }

    /// Whether two instants fall within `date_tolerance_days` calendar days of each other
    pub fn is_within_date_tolerance(&self, a: NaiveDateTime, b: NaiveDateTime) -> bool {
        let days = a.date().signed_duration_since(b.date()).num_days().abs();
        days <= self.config.date_tolerance_days
    }

    /// Compare two amounts after normalizing both to absolute values
    pub fn calculate_amount_difference(
        &self,
        bank_amount: Cents,
        transaction_amount: Cents,
    ) -> ReconciliationResult<AmountDifference> {
        self.calculate_amount_difference_for(bank_amount, transaction_amount, None)
    }

    /// Like [`calculate_amount_difference`](Self::calculate_amount_difference), with the
    /// transaction's category selecting its tolerance override
    ///
    /// Matching and discrepancy detection both go through here, so a pair is
    /// judged against the same tolerance by each.
    pub fn calculate_amount_difference_for(
        &self,
        bank_amount: Cents,
        transaction_amount: Cents,
        category: Option<&str>,
    ) -> ReconciliationResult<AmountDifference> {
        let bank_amount = checked_abs(bank_amount)?;
        let transaction_amount = checked_abs(transaction_amount)?;
        let absolute_difference = (bank_amount - transaction_amount).abs();

        let percentage_difference = if bank_amount == 0 {
            BigDecimal::from(0)
        } else {
            BigDecimal::from(absolute_difference) * BigDecimal::from(100)
                / BigDecimal::from(bank_amount)
        };

        let effective_tolerance = self.config.effective_tolerance_for(bank_amount, category)?;

        Ok(AmountDifference {
            bank_amount,
            transaction_amount,
            absolute_difference,
            percentage_difference,
            effective_tolerance,
            within_tolerance: absolute_difference <= effective_tolerance,
        })
    }

    /// Compare the bank's own closing balance with the expected balance
    ///
    /// `entries` must already be sorted ascending by date. The running balance
    /// of the last entry is trusted as the closing balance rather than summing
    /// amounts locally, so bank fees missing from the ledger cannot skew it.
    pub fn calculate_balance_difference(
        &self,
        entries: &[BankStatementEntry],
        expected_closing_balance: Cents,
    ) -> ReconciliationResult<BalanceDifference> {
        if !Self::is_sorted_by_date(entries) {
            warn!(
                entries = entries.len(),
                "Bank entries are not in date order; closing balance attribution is unreliable"
            );
        }

        let expected_abs = checked_abs(expected_closing_balance)?;

        let Some(last) = entries.last() else {
            // Nothing to compare against: the expected balance is measured against itself
            return Ok(BalanceDifference {
                calculated_balance: 0,
                expected_balance: expected_closing_balance,
                difference: expected_closing_balance,
                within_tolerance: self.is_within_tolerance(
                    0,
                    expected_abs,
                    ToleranceKind::BalanceValidation,
                )?,
                closing_reference: None,
            });
        };

        let difference = checked_sub(expected_closing_balance, last.balance)?;
        let within_tolerance = self.is_within_tolerance(
            checked_abs(difference)?,
            expected_abs,
            ToleranceKind::BalanceValidation,
        )?;

        Ok(BalanceDifference {
            calculated_balance: last.balance,
            expected_balance: expected_closing_balance,
            difference,
            within_tolerance,
            closing_reference: Some(last.external_reference.clone()),
        })
    }

    /// Sum absolute amounts into credit and debit buckets
    pub fn calculate_transaction_totals(
        &self,
        transactions: &[Transaction],
    ) -> ReconciliationResult<TransactionTotals> {
        let mut totals = TransactionTotals::default();

        for transaction in transactions {
            let amount = checked_abs(transaction.amount)?;
            match transaction.resolved_type() {
                TransactionType::Credit => {
                    totals.total_credits = checked_add(totals.total_credits, amount)?
                }
                TransactionType::Debit => {
                    totals.total_debits = checked_add(totals.total_debits, amount)?
                }
            }
            totals.transaction_count += 1;
        }

        totals.net_amount = checked_sub(totals.total_credits, totals.total_debits)?;
        Ok(totals)
    }

    /// Records with `start <= date < end`
    pub fn filter_by_date_range<T: Dated + Clone>(
        records: &[T],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Vec<T> {
        records
            .iter()
            .filter(|record| record.date() >= start && record.date() < end)
            .cloned()
            .collect()
    }

    /// Records dated on any calendar day from `first_day` through `last_day`
    ///
    /// Implemented as the half-open range `[first_day 00:00, last_day + 1 00:00)`.
    pub fn filter_by_period<T: Dated + Clone>(
        records: &[T],
        first_day: NaiveDate,
        last_day: NaiveDate,
    ) -> Vec<T> {
        let (start, end) = Self::period_bounds(first_day, last_day);
        Self::filter_by_date_range(records, start, end)
    }

    /// Half-open instant bounds for an inclusive calendar period
    pub fn period_bounds(first_day: NaiveDate, last_day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        let start = first_day.and_time(NaiveTime::MIN);
        let end = last_day
            .checked_add_days(Days::new(1))
            .map(|next| next.and_time(NaiveTime::MIN))
            .unwrap_or(NaiveDateTime::MAX);
        (start, end)
    }

    /// Round a fractional cent amount half-to-even
    pub fn round_to_cents(value: &BigDecimal) -> ReconciliationResult<Cents> {
        round_half_even(value)
    }

    /// Whether records are in ascending date order
    pub fn is_sorted_by_date<T: Dated>(records: &[T]) -> bool {
        records.windows(2).all(|pair| pair[0].date() <= pair[1].date())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        day(d).and_hms_opt(h, m, 0).unwrap()
    }

    fn calculator() -> ReconciliationCalculator {
        ReconciliationCalculator::new(ToleranceConfig::default()).unwrap()
    }

    fn entry(d: u32, amount: Cents, balance: Cents, reference: &str) -> BankStatementEntry {
        BankStatementEntry::new(at(d, 10, 0), amount, balance, reference)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = ToleranceConfig {
            amount_matching_tolerance: 1000,
            ..Default::default()
        };
        assert!(matches!(
            ReconciliationCalculator::new(config),
            Err(ReconciliationError::Configuration(_))
        ));
    }

    #[test]
    fn test_flat_tolerance_boundary() {
        let calc = calculator();
        assert!(calc
            .is_within_tolerance(100, 5_000_000, ToleranceKind::BalanceValidation)
            .unwrap());
        assert!(!calc
            .is_within_tolerance(101, 5_000_000, ToleranceKind::BalanceValidation)
            .unwrap());
        assert!(calc.is_within_tolerance(500, 10, ToleranceKind::BankFee).unwrap());
        assert!(!calc.is_within_tolerance(501, 10, ToleranceKind::BankFee).unwrap());
    }

    #[test]
    fn test_amount_matching_uses_effective_tolerance() {
        let calc = calculator();
        // 20000 * 0.5% = 100
        assert!(calc
            .is_within_tolerance(100, 20_000, ToleranceKind::AmountMatching)
            .unwrap());
        assert!(!calc
            .is_within_tolerance(101, 20_000, ToleranceKind::AmountMatching)
            .unwrap());
        // Small amount falls back to the 1 cent floor
        assert!(calc.is_within_tolerance(1, 50, ToleranceKind::AmountMatching).unwrap());
        assert!(!calc.is_within_tolerance(2, 50, ToleranceKind::AmountMatching).unwrap());
    }

    #[test]
    fn test_negative_inputs_rejected() {
        let calc = calculator();
        assert!(matches!(
            calc.is_within_tolerance(0, -1, ToleranceKind::BalanceValidation),
            Err(ReconciliationError::InvalidInput(_))
        ));
        assert!(matches!(
            calc.is_within_tolerance(-1, 100, ToleranceKind::BankFee),
            Err(ReconciliationError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_amount_difference_normalizes_sign() {
        let calc = calculator();
        let diff = calc.calculate_amount_difference(-15_000, 15_000).unwrap();
        assert_eq!(diff.bank_amount, 15_000);
        assert_eq!(diff.transaction_amount, 15_000);
        assert_eq!(diff.absolute_difference, 0);
        assert_eq!(diff.percentage_difference, BigDecimal::from(0));
        assert!(diff.within_tolerance);
    }

    #[test]
    fn test_amount_difference_percentage() {
        let calc = calculator();
        let diff = calc.calculate_amount_difference(10_000, 9_900).unwrap();
        assert_eq!(diff.absolute_difference, 100);
        assert_eq!(diff.percentage_difference, BigDecimal::from(1));
        assert!(!diff.within_tolerance);
    }

    #[test]
    fn test_amount_difference_zero_bank_amount() {
        let calc = calculator();
        let diff = calc.calculate_amount_difference(0, 1).unwrap();
        assert_eq!(diff.percentage_difference, BigDecimal::from(0));
        assert_eq!(diff.absolute_difference, 1);
        assert!(diff.within_tolerance);
    }

    #[test]
    fn test_amount_difference_applies_category_override() {
        let mut config = ToleranceConfig::default();
        config.category_overrides.insert("bank_fees".to_string(), 300);
        let calc = ReconciliationCalculator::new(config).unwrap();

        let plain = calc.calculate_amount_difference(-10_000, -9_800).unwrap();
        assert_eq!(plain.effective_tolerance, 50);
        assert!(!plain.within_tolerance);

        let fee = calc
            .calculate_amount_difference_for(-10_000, -9_800, Some("bank_fees"))
            .unwrap();
        assert_eq!(fee.effective_tolerance, 300);
        assert!(fee.within_tolerance);
        assert_eq!(
            fee.within_tolerance,
            calc.is_within_amount_tolerance(200, 10_000, Some("bank_fees")).unwrap()
        );
    }

    #[test]
    fn test_amount_difference_rejects_min() {
        let calc = calculator();
        assert!(calc.calculate_amount_difference(Cents::MIN, 0).is_err());
    }

    #[test]
    fn test_balance_difference_uses_last_running_balance() {
        let calc = calculator();
        // The fee entry is only on the bank side; a locally summed total would differ
        let entries = vec![
            entry(2, 100_000, 100_000, "DEP-1"),
            entry(3, -350, 99_650, "FEE-1"),
            entry(5, -20_000, 79_650, "EFT-1"),
        ];
        let diff = calc.calculate_balance_difference(&entries, 79_700).unwrap();
        assert_eq!(diff.calculated_balance, 79_650);
        assert_eq!(diff.difference, 50);
        assert!(diff.within_tolerance);
        assert_eq!(diff.closing_reference.as_deref(), Some("EFT-1"));

        let diff = calc.calculate_balance_difference(&entries, 80_000).unwrap();
        assert_eq!(diff.difference, 350);
        assert!(!diff.within_tolerance);
    }

    #[test]
    fn test_balance_difference_negative_difference() {
        let calc = calculator();
        let entries = vec![entry(2, 5_000, 5_000, "DEP-1")];
        let diff = calc.calculate_balance_difference(&entries, 4_000).unwrap();
        assert_eq!(diff.difference, -1_000);
        assert!(!diff.within_tolerance);
    }

    #[test]
    fn test_balance_difference_empty() {
        let calc = calculator();
        let diff = calc.calculate_balance_difference(&[], 123_456).unwrap();
        assert_eq!(diff.calculated_balance, 0);
        assert_eq!(diff.difference, 123_456);
        assert!(diff.within_tolerance);
        assert!(diff.closing_reference.is_none());
    }

    #[test]
    fn test_unsorted_entries_use_last_position() {
        let calc = calculator();
        let entries = vec![entry(5, -100, 900, "LATE"), entry(2, 1_000, 1_000, "EARLY")];
        assert!(!ReconciliationCalculator::is_sorted_by_date(&entries));
        // No re-sorting: the positional last entry wins
        let diff = calc.calculate_balance_difference(&entries, 900).unwrap();
        assert_eq!(diff.calculated_balance, 1_000);
    }

    #[test]
    fn test_transaction_totals() {
        let calc = calculator();
        let transactions = vec![
            Transaction::new("t1", 150_000, at(1, 9, 0)),
            Transaction::new("t2", -20_000, at(2, 9, 0)),
            Transaction::new("t3", 5_000, at(3, 9, 0)).with_type(TransactionType::Debit),
            Transaction::new("t4", -1_000, at(4, 9, 0)).with_type(TransactionType::Credit),
        ];
        let totals = calc.calculate_transaction_totals(&transactions).unwrap();
        assert_eq!(totals.total_credits, 151_000);
        assert_eq!(totals.total_debits, 25_000);
        assert_eq!(totals.net_amount, 126_000);
        assert_eq!(totals.transaction_count, 4);
    }

    #[test]
    fn test_transaction_totals_overflow() {
        let calc = calculator();
        let transactions = vec![
            Transaction::new("t1", Cents::MAX, at(1, 9, 0)),
            Transaction::new("t2", 1, at(1, 9, 0)),
        ];
        assert!(matches!(
            calc.calculate_transaction_totals(&transactions),
            Err(ReconciliationError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_filter_by_date_range_is_half_open() {
        let entries = vec![
            BankStatementEntry::new(at(1, 0, 0), 1, 1, "start"),
            BankStatementEntry::new(at(15, 12, 0), 1, 2, "middle"),
            BankStatementEntry::new(at(31, 0, 0), 1, 3, "end"),
        ];
        let filtered =
            ReconciliationCalculator::filter_by_date_range(&entries, at(1, 0, 0), at(31, 0, 0));
        let refs: Vec<_> = filtered.iter().map(|e| e.external_reference.as_str()).collect();
        assert_eq!(refs, vec!["start", "middle"]);
    }

    #[test]
    fn test_filter_by_period_includes_whole_last_day() {
        let entries = vec![
            BankStatementEntry::new(at(31, 23, 59), 1, 1, "last-day"),
            BankStatementEntry::new(day(31).and_hms_milli_opt(23, 59, 59, 999).unwrap(), 1, 2, "last-ms"),
            BankStatementEntry::new(
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
                1,
                3,
                "next-month",
            ),
        ];
        let filtered = ReconciliationCalculator::filter_by_period(&entries, day(1), day(31));
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|e| e.external_reference != "next-month"));
    }

    #[test]
    fn test_adjacent_periods_do_not_double_count() {
        let boundary = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let entries = vec![BankStatementEntry::new(boundary, 1, 1, "boundary")];
        let january = ReconciliationCalculator::filter_by_period(&entries, day(1), day(31));
        let february = ReconciliationCalculator::filter_by_period(
            &entries,
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        );
        assert_eq!(january.len() + february.len(), 1);
        assert_eq!(february.len(), 1);
    }

    #[test]
    fn test_date_tolerance() {
        let calc = calculator();
        assert!(calc.is_within_date_tolerance(at(10, 23, 0), at(11, 1, 0)));
        assert!(calc.is_within_date_tolerance(at(11, 0, 0), at(10, 0, 0)));
        assert!(!calc.is_within_date_tolerance(at(10, 0, 0), at(12, 0, 0)));
    }

    #[test]
    fn test_round_to_cents() {
        let value = BigDecimal::from_str("12.5").unwrap();
        assert_eq!(ReconciliationCalculator::round_to_cents(&value).unwrap(), 12);
        let value = BigDecimal::from_str("13.5").unwrap();
        assert_eq!(ReconciliationCalculator::round_to_cents(&value).unwrap(), 14);
    }
}
