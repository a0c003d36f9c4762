//! Integer-cent helpers
//!
//! Money never passes through a floating-point type. Rates are `BigDecimal`
//! and are converted back to cents with an explicit rounding rule.

use bigdecimal::{BigDecimal, ToPrimitive};
use std::cmp::Ordering;

use crate::types::*;

/// Absolute value of an amount, rejecting `i64::MIN`
pub fn checked_abs(amount: Cents) -> ReconciliationResult<Cents> {
    amount.checked_abs().ok_or_else(|| {
        ReconciliationError::InvalidInput(format!("amount {} has no absolute value", amount))
    })
}

/// Add two amounts, failing instead of wrapping
pub fn checked_add(total: Cents, amount: Cents) -> ReconciliationResult<Cents> {
    total.checked_add(amount).ok_or_else(|| {
        ReconciliationError::InvalidInput(format!(
            "adding {} to {} overflows the cent range",
            amount, total
        ))
    })
}

/// Subtract two amounts, failing instead of wrapping
pub fn checked_sub(lhs: Cents, rhs: Cents) -> ReconciliationResult<Cents> {
    lhs.checked_sub(rhs).ok_or_else(|| {
        ReconciliationError::InvalidInput(format!(
            "subtracting {} from {} overflows the cent range",
            rhs, lhs
        ))
    })
}

fn to_cents(value: &BigDecimal) -> ReconciliationResult<Cents> {
    value.to_i64().ok_or_else(|| {
        ReconciliationError::InvalidInput(format!("{} does not fit in the cent range", value))
    })
}

/// Round a fractional cent value up to the next whole cent (for non-negative values)
pub fn ceil_to_cents(value: &BigDecimal) -> ReconciliationResult<Cents> {
    let truncated = value.with_scale(0);
    let whole = to_cents(&truncated)?;
    if &truncated < value {
        checked_add(whole, 1)
    } else {
        Ok(whole)
    }
}

/// Round a fractional cent value half-to-even
pub fn round_half_even(value: &BigDecimal) -> ReconciliationResult<Cents> {
    let truncated = value.with_scale(0);
    let whole = to_cents(&truncated)?;
    let doubled_remainder = (value - &truncated).abs() * BigDecimal::from(2);
    let step = if *value < BigDecimal::from(0) { -1 } else { 1 };

    match doubled_remainder.cmp(&BigDecimal::from(1)) {
        Ordering::Less => Ok(whole),
        Ordering::Greater => checked_add(whole, step),
        Ordering::Equal if whole % 2 == 0 => Ok(whole),
        Ordering::Equal => checked_add(whole, step),
    }
}
