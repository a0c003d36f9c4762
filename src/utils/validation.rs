//! Validation utilities

use chrono::NaiveDate;

use crate::types::*;

/// Validate that a value is zero or positive
pub fn validate_non_negative(name: &str, value: i64) -> ReconciliationResult<()> {
    if value < 0 {
        Err(ReconciliationError::InvalidInput(format!(
            "{} must not be negative, got {}",
            name, value
        )))
    } else {
        Ok(())
    }
}

/// Validate that a reconciliation period is not inverted
pub fn validate_period(first_day: NaiveDate, last_day: NaiveDate) -> ReconciliationResult<()> {
    if last_day < first_day {
        return Err(ReconciliationError::InvalidInput(format!(
            "period ends ({}) before it starts ({})",
            last_day, first_day
        )));
    }
    Ok(())
}

/// Validate that an account identifier is usable
pub fn validate_account_id(account_id: &str) -> ReconciliationResult<()> {
    if account_id.trim().is_empty() {
        return Err(ReconciliationError::InvalidInput(
            "Account ID cannot be empty".to_string(),
        ));
    }

    if account_id.len() > 50 {
        return Err(ReconciliationError::InvalidInput(
            "Account ID cannot exceed 50 characters".to_string(),
        ));
    }

    if !account_id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ReconciliationError::InvalidInput(
            "Account ID can only contain alphanumeric characters, dashes, and underscores"
                .to_string(),
        ));
    }

    Ok(())
}

/// Validate that a bank entry can be referenced in results
pub fn validate_bank_entry(entry: &BankStatementEntry) -> ReconciliationResult<()> {
    if entry.external_reference.trim().is_empty() {
        return Err(ReconciliationError::InvalidInput(format!(
            "bank entry dated {} has no external reference",
            entry.date
        )));
    }
    if entry.amount == Cents::MIN {
        return Err(ReconciliationError::InvalidInput(format!(
            "bank entry {} has an amount outside the cent range",
            entry.external_reference
        )));
    }
    Ok(())
}

/// Validate that a ledger transaction can take part in matching
pub fn validate_transaction(transaction: &Transaction) -> ReconciliationResult<()> {
    if transaction.id.trim().is_empty() {
        return Err(ReconciliationError::InvalidInput(format!(
            "transaction dated {} has no id",
            transaction.date
        )));
    }
    if transaction.amount == Cents::MIN {
        return Err(ReconciliationError::InvalidInput(format!(
            "transaction {} has an amount outside the cent range",
            transaction.id
        )));
    }
    Ok(())
}
