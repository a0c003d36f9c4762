//! Core types and data structures for the reconciliation engine

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Monetary amount in the minor currency unit (cents)
pub type Cents = i64;

/// A single line ingested from a bank statement
///
/// Entries are owned by the reconciliation run and never mutated after ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankStatementEntry {
    /// Value date of the entry
    pub date: NaiveDateTime,
    /// Signed amount in cents
    pub amount: Cents,
    /// Running balance reported by the bank after this entry
    pub balance: Cents,
    /// Bank-side reference for the entry
    pub external_reference: String,
}

impl BankStatementEntry {
    /// Create a new bank statement entry
    pub fn new(
        date: NaiveDateTime,
        amount: Cents,
        balance: Cents,
        external_reference: impl Into<String>,
    ) -> Self {
        Self {
            date,
            amount,
            balance,
            external_reference: external_reference.into(),
        }
    }
}

/// Direction of a ledger transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// Money coming into the account
    Credit,
    /// Money leaving the account
    Debit,
}

/// Internal ledger record, read-only to the reconciliation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Ledger identifier
    pub id: String,
    /// Signed amount in cents
    pub amount: Cents,
    /// Booking date
    pub date: NaiveDateTime,
    /// Explicit direction; when absent the sign of `amount` decides
    pub transaction_type: Option<TransactionType>,
    /// Ledger category, used for per-category tolerance overrides
    pub category: Option<String>,
}

impl Transaction {
    /// Create a transaction with no explicit type or category
    pub fn new(id: impl Into<String>, amount: Cents, date: NaiveDateTime) -> Self {
        Self {
            id: id.into(),
            amount,
            date,
            transaction_type: None,
            category: None,
        }
    }

    /// Set the explicit transaction type
    pub fn with_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = Some(transaction_type);
        self
    }

    /// Set the ledger category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// The explicit type, falling back to the sign of the amount
    /// (positive amounts are credits, everything else is a debit)
    pub fn resolved_type(&self) -> TransactionType {
        match self.transaction_type {
            Some(transaction_type) => transaction_type,
            None if self.amount > 0 => TransactionType::Credit,
            None => TransactionType::Debit,
        }
    }
}

/// Outcome of evaluating one bank entry against one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Reference of the bank entry that was evaluated
    pub bank_reference: String,
    /// Transaction the entry was evaluated against, `None` when no candidate existed
    pub transaction_id: Option<String>,
    /// Absolute difference between the normalized amounts
    pub deviation: Cents,
    /// Tolerance the deviation was compared with
    pub effective_tolerance: Cents,
    /// Confidence penalty in `[-0.2, 0]`
    pub confidence_adjustment: BigDecimal,
    /// Whether the booking dates fall within the date tolerance
    pub date_within_tolerance: bool,
    /// Final verdict
    pub matched: bool,
}

impl MatchResult {
    /// Result for a bank entry for which no transaction qualified
    pub fn unmatched(bank_reference: impl Into<String>) -> Self {
        Self {
            bank_reference: bank_reference.into(),
            transaction_id: None,
            deviation: 0,
            effective_tolerance: 0,
            confidence_adjustment: BigDecimal::from(0),
            date_within_tolerance: false,
            matched: false,
        }
    }
}

/// A bank entry together with the transaction it was matched to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub entry: BankStatementEntry,
    pub transaction: Transaction,
}

/// What kind of check produced a discrepancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscrepancyType {
    /// Closing balance differs from the expected balance
    Balance,
    /// A matched pair differs by more than the amount tolerance
    Amount,
}

/// Severity buckets, ordered from least to most serious
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A tolerance-exceeding mismatch between expected and actual figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    /// Unique identifier for audit trails
    pub id: Uuid,
    /// Balance or amount discrepancy
    pub discrepancy_type: DiscrepancyType,
    /// Signed difference in cents
    pub difference: Cents,
    /// Amount the difference is measured against
    pub base_amount: Cents,
    /// `|difference| / base_amount * 100`, 100 when the base is zero
    pub percentage: BigDecimal,
    /// Severity bucket
    pub severity: Severity,
    /// Bank entries involved
    pub bank_references: Vec<String>,
    /// Ledger transactions involved
    pub transaction_ids: Vec<String>,
}

/// A record that could not be evaluated and was left out of the results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnprocessableItem {
    /// Bank reference or transaction id of the offending record
    pub reference: String,
    /// Why the record was rejected
    pub reason: String,
}

impl UnprocessableItem {
    pub fn new(reference: impl Into<String>, error: &ReconciliationError) -> Self {
        Self {
            reference: reference.into(),
            reason: error.to_string(),
        }
    }
}

/// Errors that can occur during reconciliation
#[derive(Debug, thiserror::Error)]
pub enum ReconciliationError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Source error: {0}")]
    Source(String),
}

impl From<::config::ConfigError> for ReconciliationError {
    fn from(err: ::config::ConfigError) -> Self {
        ReconciliationError::Configuration(err.to_string())
    }
}

/// Result type for reconciliation operations
pub type ReconciliationResult<T> = Result<T, ReconciliationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_resolved_type_prefers_explicit_type() {
        let txn = Transaction::new("t1", 500, at(1)).with_type(TransactionType::Debit);
        assert_eq!(txn.resolved_type(), TransactionType::Debit);
    }

    #[test]
    fn test_resolved_type_falls_back_to_sign() {
        assert_eq!(
            Transaction::new("t1", 500, at(1)).resolved_type(),
            TransactionType::Credit
        );
        assert_eq!(
            Transaction::new("t2", -500, at(1)).resolved_type(),
            TransactionType::Debit
        );
        assert_eq!(
            Transaction::new("t3", 0, at(1)).resolved_type(),
            TransactionType::Debit
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_unmatched_result_has_no_transaction() {
        let result = MatchResult::unmatched("FNB-001");
        assert!(!result.matched);
        assert!(result.transaction_id.is_none());
        assert_eq!(result.confidence_adjustment, BigDecimal::from(0));
    }
}
