//! Reconciliation of bank statements against the internal ledger
//!
//! [`ReconciliationCalculator`] owns every numeric comparison. The
//! [`MatchingEngine`] and [`DiscrepancyDetector`] share one instance of it,
//! and [`ReconciliationEngine`] wires both to a host data source.

pub mod calculator;
pub mod discrepancy;
pub mod engine;
pub mod matcher;

pub use calculator::*;
pub use discrepancy::*;
pub use engine::*;
pub use matcher::*;
