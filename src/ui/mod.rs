//! User interface components.
//!
//! This module provides:
//! - CLI argument definitions
//! - Text and JSON rendering of scan results

pub mod cli;
pub mod output;

pub use cli::{Cli, Commands, ConfigAction, OutputFormat, RulesAction};
