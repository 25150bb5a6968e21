//! YARA-like rule engine for pattern matching.
//!
//! This module provides the precise scanning path:
//! - Rule-set validation and parsing (meta, strings, conditions)
//! - Text, case-insensitive, byte and anchored pattern matching
//! - Boolean condition evaluation (`and`/`or`/`not`, `N of ($prefix*)`)
//! - A shared catalog swapped atomically on rule updates

pub mod condition;
pub mod defaults;
pub mod engine;
pub mod matcher;
pub mod parser;
pub mod rules;
pub mod validator;

pub use engine::{compile_rules, ScanEngine};
pub use matcher::{evaluate, MatchOutcome};
pub use parser::parse;
pub use rules::{Condition, Pattern, PatternKind, Rule, RuleCatalog};
pub use validator::validate;
