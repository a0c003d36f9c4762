//! Tolerance configuration for reconciliation runs

pub mod config;

pub use self::config::*;
