//! # Reconciliation Core
//!
//! Bank statement reconciliation for accounting back-ends: tolerance-aware
//! matching of bank entries against ledger transactions, discrepancy
//! detection, and the shared integer-cent arithmetic both rely on.
//!
//! ## Features
//!
//! - **Tolerance configuration**: absolute, percentage and per-category tolerances
//!   resolved from defaults, environment and run overrides, validated at load time
//! - **Shared calculator**: one implementation of every tolerance check, rounding
//!   rule and total, used by both the matcher and the discrepancy detector
//! - **Matching**: confidence-scored pair matching and greedy batch matching
//! - **Discrepancies**: balance and amount discrepancies with severity buckets
//! - **Source abstraction**: trait-based data access for full reconciliation runs
//!
//! ## Quick Start
//!
//! ```rust
//! use reconciliation_core::{
//!     BankStatementEntry, MatchingEngine, ReconciliationCalculator, ToleranceConfig,
//!     Transaction,
//! };
//! use chrono::NaiveDate;
//! use std::sync::Arc;
//!
//! let calculator = Arc::new(ReconciliationCalculator::new(ToleranceConfig::default()).unwrap());
//! let matcher = MatchingEngine::new(calculator);
//!
//! let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let entry = BankStatementEntry::new(date, 250_000, 1_250_000, "FNB-8841");
//! let transaction = Transaction::new("INV-2024-001", 250_000, date);
//!
//! let result = matcher.match_pair(&entry, &transaction).unwrap();
//! assert!(result.matched);
//! ```

pub mod reconciliation;
pub mod tolerance;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use reconciliation::*;
pub use tolerance::{ToleranceConfig, ToleranceKind, ToleranceOverrides};
pub use traits::*;
pub use types::*;
