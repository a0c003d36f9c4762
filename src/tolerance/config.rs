//! Tolerance parameters and their resolution from defaults, a configuration
//! store and run-specific overrides

use bigdecimal::BigDecimal;
use ::config::{builder::DefaultState, ConfigBuilder, Environment};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use crate::types::*;
use crate::utils::money::ceil_to_cents;

/// Default absolute amount-matching tolerance (1 cent)
pub const DEFAULT_AMOUNT_MATCHING_TOLERANCE: Cents = 1;
/// Default closing-balance tolerance (R1.00)
pub const DEFAULT_BALANCE_VALIDATION_TOLERANCE: Cents = 100;
/// Default bank-fee tolerance (R5.00)
pub const DEFAULT_BANK_FEE_TOLERANCE: Cents = 500;
/// Default date tolerance in days
pub const DEFAULT_DATE_TOLERANCE_DAYS: i64 = 1;
/// Default percentage tolerance as a fraction (0.5%)
pub const DEFAULT_PERCENTAGE_TOLERANCE: &str = "0.005";

/// Upper bound for amount-matching, bank-fee and per-category tolerances
pub const MAX_AMOUNT_TOLERANCE: Cents = 500;

/// Prefix for environment variables, e.g. `RECONCILIATION__BANK_FEE_TOLERANCE`
pub const ENV_PREFIX: &str = "RECONCILIATION";

/// Upper bound for the percentage tolerance (5%)
pub fn max_percentage_tolerance() -> BigDecimal {
    BigDecimal::from(5) / BigDecimal::from(100)
}

/// Which configured tolerance a comparison uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToleranceKind {
    /// Amount matching; resolved through the effective (absolute or percentage) tolerance
    AmountMatching,
    /// Closing balance validation; flat value
    BalanceValidation,
    /// Bank fee absorption; flat value
    BankFee,
}

/// Resolved tolerance parameters for one reconciliation run
///
/// Immutable once loaded. Every constructor that reads external sources
/// validates the bounds before returning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceConfig {
    /// Absolute amount-matching floor in cents
    pub amount_matching_tolerance: Cents,
    /// Closing-balance tolerance in cents
    pub balance_validation_tolerance: Cents,
    /// Bank-fee tolerance in cents
    pub bank_fee_tolerance: Cents,
    /// Maximum distance between booking dates, in whole days
    pub date_tolerance_days: i64,
    /// Proportional amount-matching tolerance as a fraction of the amount
    pub percentage_tolerance: BigDecimal,
    /// Absolute amount-matching floor per transaction category (lowercase keys)
    #[serde(default)]
    pub category_overrides: BTreeMap<String, Cents>,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            amount_matching_tolerance: DEFAULT_AMOUNT_MATCHING_TOLERANCE,
            balance_validation_tolerance: DEFAULT_BALANCE_VALIDATION_TOLERANCE,
            bank_fee_tolerance: DEFAULT_BANK_FEE_TOLERANCE,
            date_tolerance_days: DEFAULT_DATE_TOLERANCE_DAYS,
            percentage_tolerance: BigDecimal::from(5) / BigDecimal::from(1000),
            category_overrides: BTreeMap::new(),
        }
    }
}

/// Run-specific values that take priority over every other source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToleranceOverrides {
    pub amount_matching_tolerance: Option<Cents>,
    pub balance_validation_tolerance: Option<Cents>,
    pub bank_fee_tolerance: Option<Cents>,
    pub date_tolerance_days: Option<i64>,
    pub percentage_tolerance: Option<BigDecimal>,
    pub category_overrides: BTreeMap<String, Cents>,
}

impl ToleranceConfig {
    /// Resolve from the process environment, then apply `overrides`
    pub fn from_env(overrides: &ToleranceOverrides) -> ReconciliationResult<Self> {
        let builder = Self::defaults()?.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );
        Self::resolve(builder, overrides)
    }

    /// Resolve from an explicit key/value store instead of the process environment
    ///
    /// Keys use the field names, with `.` separating category overrides:
    /// `category_overrides.fees`.
    pub fn from_store(
        store: &HashMap<String, String>,
        overrides: &ToleranceOverrides,
    ) -> ReconciliationResult<Self> {
        let mut builder = Self::defaults()?;
        for (key, value) in store {
            builder = builder.set_override(key.to_lowercase(), value.clone())?;
        }
        Self::resolve(builder, overrides)
    }

    fn defaults() -> ReconciliationResult<ConfigBuilder<DefaultState>> {
        Ok(::config::Config::builder()
            .set_default("amount_matching_tolerance", DEFAULT_AMOUNT_MATCHING_TOLERANCE)?
            .set_default(
                "balance_validation_tolerance",
                DEFAULT_BALANCE_VALIDATION_TOLERANCE,
            )?
            .set_default("bank_fee_tolerance", DEFAULT_BANK_FEE_TOLERANCE)?
            .set_default("date_tolerance_days", DEFAULT_DATE_TOLERANCE_DAYS)?
            .set_default("percentage_tolerance", DEFAULT_PERCENTAGE_TOLERANCE)?)
    }

    fn resolve(
        mut builder: ConfigBuilder<DefaultState>,
        overrides: &ToleranceOverrides,
    ) -> ReconciliationResult<Self> {
        if let Some(value) = overrides.amount_matching_tolerance {
            builder = builder.set_override("amount_matching_tolerance", value)?;
        }
        if let Some(value) = overrides.balance_validation_tolerance {
            builder = builder.set_override("balance_validation_tolerance", value)?;
        }
        if let Some(value) = overrides.bank_fee_tolerance {
            builder = builder.set_override("bank_fee_tolerance", value)?;
        }
        if let Some(value) = overrides.date_tolerance_days {
            builder = builder.set_override("date_tolerance_days", value)?;
        }
        if let Some(value) = &overrides.percentage_tolerance {
            // Passed as text so the fraction never round-trips through a float
            builder = builder.set_override("percentage_tolerance", value.to_string())?;
        }
        for (category, value) in &overrides.category_overrides {
            builder = builder.set_override(
                format!("category_overrides.{}", category.to_lowercase()),
                *value,
            )?;
        }

        let mut resolved: ToleranceConfig = builder.build()?.try_deserialize()?;
        resolved.category_overrides = resolved
            .category_overrides
            .into_iter()
            .map(|(category, value)| (category.to_lowercase(), value))
            .collect();
        resolved.validate()?;

        info!(
            amount_matching_tolerance = resolved.amount_matching_tolerance,
            balance_validation_tolerance = resolved.balance_validation_tolerance,
            bank_fee_tolerance = resolved.bank_fee_tolerance,
            date_tolerance_days = resolved.date_tolerance_days,
            percentage_tolerance = %resolved.percentage_tolerance,
            category_overrides = resolved.category_overrides.len(),
            "Resolved tolerance configuration"
        );
        Ok(resolved)
    }

    /// Check every value against its bound; nothing is clamped
    pub fn validate(&self) -> ReconciliationResult<()> {
        check_cents(
            "amount_matching_tolerance",
            self.amount_matching_tolerance,
            Some(MAX_AMOUNT_TOLERANCE),
        )?;
        check_cents(
            "balance_validation_tolerance",
            self.balance_validation_tolerance,
            None,
        )?;
        check_cents(
            "bank_fee_tolerance",
            self.bank_fee_tolerance,
            Some(MAX_AMOUNT_TOLERANCE),
        )?;
        check_cents("date_tolerance_days", self.date_tolerance_days, None)?;

        if self.percentage_tolerance < BigDecimal::from(0)
            || self.percentage_tolerance > max_percentage_tolerance()
        {
            return Err(ReconciliationError::Configuration(format!(
                "percentage_tolerance must be between 0 and {}, got {}",
                max_percentage_tolerance(),
                self.percentage_tolerance
            )));
        }

        for (category, value) in &self.category_overrides {
            check_cents(
                &format!("category_overrides.{}", category),
                *value,
                Some(MAX_AMOUNT_TOLERANCE),
            )?;
        }

        Ok(())
    }

    /// Flat configured value for a tolerance kind
    pub fn flat_tolerance(&self, kind: ToleranceKind) -> Cents {
        match kind {
            ToleranceKind::AmountMatching => self.amount_matching_tolerance,
            ToleranceKind::BalanceValidation => self.balance_validation_tolerance,
            ToleranceKind::BankFee => self.bank_fee_tolerance,
        }
    }

    /// `max(amount_matching_tolerance, ceil(|amount| * percentage_tolerance))`
    pub fn effective_tolerance(&self, amount: Cents) -> ReconciliationResult<Cents> {
        self.effective_with_floor(amount, self.amount_matching_tolerance)
    }

    /// Effective tolerance where a category override replaces the absolute floor
    pub fn effective_tolerance_for(
        &self,
        amount: Cents,
        category: Option<&str>,
    ) -> ReconciliationResult<Cents> {
        let floor = category
            .and_then(|c| self.category_overrides.get(&c.to_lowercase()))
            .copied()
            .unwrap_or(self.amount_matching_tolerance);
        self.effective_with_floor(amount, floor)
    }

    fn effective_with_floor(&self, amount: Cents, floor: Cents) -> ReconciliationResult<Cents> {
        let proportional = BigDecimal::from(amount.unsigned_abs()) * &self.percentage_tolerance;
        Ok(floor.max(ceil_to_cents(&proportional)?))
    }
}

fn check_cents(name: &str, value: i64, max: Option<i64>) -> ReconciliationResult<()> {
    if value < 0 {
        return Err(ReconciliationError::Configuration(format!(
            "{} must not be negative, got {}",
            name, value
        )));
    }
    if let Some(max) = max {
        if value > max {
            return Err(ReconciliationError::Configuration(format!(
                "{} must not exceed {}, got {}",
                name, max, value
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn store(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = ToleranceConfig::from_store(&HashMap::new(), &ToleranceOverrides::default())
            .unwrap();
        assert_eq!(config, ToleranceConfig::default());
        assert_eq!(
            config.percentage_tolerance,
            BigDecimal::from_str("0.005").unwrap()
        );
    }

    #[test]
    fn test_store_beats_defaults() {
        let config = ToleranceConfig::from_store(
            &store(&[
                ("amount_matching_tolerance", "25"),
                ("percentage_tolerance", "0.01"),
            ]),
            &ToleranceOverrides::default(),
        )
        .unwrap();
        assert_eq!(config.amount_matching_tolerance, 25);
        assert_eq!(
            config.percentage_tolerance,
            BigDecimal::from_str("0.01").unwrap()
        );
        assert_eq!(config.bank_fee_tolerance, DEFAULT_BANK_FEE_TOLERANCE);
    }

    #[test]
    fn test_overrides_beat_store() {
        let overrides = ToleranceOverrides {
            amount_matching_tolerance: Some(10),
            ..Default::default()
        };
        let config =
            ToleranceConfig::from_store(&store(&[("amount_matching_tolerance", "25")]), &overrides)
                .unwrap();
        assert_eq!(config.amount_matching_tolerance, 10);
    }

    #[test]
    fn test_out_of_bounds_fails_at_load() {
        let err = ToleranceConfig::from_store(
            &store(&[("amount_matching_tolerance", "501")]),
            &ToleranceOverrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ReconciliationError::Configuration(_)));

        let overrides = ToleranceOverrides {
            percentage_tolerance: Some(BigDecimal::from_str("0.06").unwrap()),
            ..Default::default()
        };
        assert!(ToleranceConfig::from_store(&HashMap::new(), &overrides).is_err());

        let overrides = ToleranceOverrides {
            bank_fee_tolerance: Some(600),
            ..Default::default()
        };
        assert!(ToleranceConfig::from_store(&HashMap::new(), &overrides).is_err());
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let overrides = ToleranceOverrides {
            amount_matching_tolerance: Some(500),
            bank_fee_tolerance: Some(500),
            percentage_tolerance: Some(BigDecimal::from_str("0.05").unwrap()),
            ..Default::default()
        };
        assert!(ToleranceConfig::from_store(&HashMap::new(), &overrides).is_ok());
    }

    #[test]
    fn test_negative_values_rejected() {
        let config = ToleranceConfig {
            date_tolerance_days: -1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_category_override_from_store_and_lookup() {
        let config = ToleranceConfig::from_store(
            &store(&[("category_overrides.bank_fees", "300")]),
            &ToleranceOverrides::default(),
        )
        .unwrap();
        assert_eq!(config.category_overrides.get("bank_fees"), Some(&300));
        assert_eq!(config.effective_tolerance_for(1000, Some("Bank_Fees")).unwrap(), 300);
        assert_eq!(config.effective_tolerance_for(1000, None).unwrap(), 5);
    }

    #[test]
    fn test_category_override_bound() {
        let mut overrides = ToleranceOverrides::default();
        overrides.category_overrides.insert("fees".to_string(), 501);
        assert!(ToleranceConfig::from_store(&HashMap::new(), &overrides).is_err());
    }

    #[test]
    fn test_effective_tolerance() {
        let config = ToleranceConfig::default();
        // Small amounts get the absolute floor
        assert_eq!(config.effective_tolerance(100).unwrap(), 1);
        // 10000 * 0.005 = 50
        assert_eq!(config.effective_tolerance(10_000).unwrap(), 50);
        // 10001 * 0.005 = 50.005, rounded up
        assert_eq!(config.effective_tolerance(10_001).unwrap(), 51);
        // Sign does not matter
        assert_eq!(config.effective_tolerance(-10_000).unwrap(), 50);
        assert!(config.effective_tolerance(Cents::MIN).is_ok());
    }

    #[test]
    fn test_flat_tolerance() {
        let config = ToleranceConfig::default();
        assert_eq!(config.flat_tolerance(ToleranceKind::BalanceValidation), 100);
        assert_eq!(config.flat_tolerance(ToleranceKind::BankFee), 500);
        assert_eq!(config.flat_tolerance(ToleranceKind::AmountMatching), 1);
    }
}
