//! Content detection engines.
//!
//! This module provides two interchangeable scanners behind [`ContentScanner`]:
//! - [`ScanEngine`]: YARA-like rules with full pattern and condition evaluation
//! - [`HeuristicEngine`]: keyword fallback for when the precise engine is unavailable
//!
//! The engine is chosen once at startup with [`build_scanner`].

pub mod heuristic;
pub mod result;
pub mod yara;

pub use heuristic::HeuristicEngine;
pub use result::{RuleSummary, ScanResult, ThreatInfo};
pub use yara::ScanEngine;

use std::sync::Arc;

use crate::core::error::Result;
use crate::core::types::{EngineKind, ScanTarget};

/// Trait for scanning backends.
///
/// All methods take `&self`; implementations handle their own locking so a
/// scanner can be shared across threads behind an `Arc`.
pub trait ContentScanner: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> EngineKind;

    /// Prepare the scanner. Calling it again is a no-op.
    fn initialize(&self) -> Result<()>;

    /// Check if the scanner is ready.
    fn is_initialized(&self) -> bool;

    /// Merge rules from a blob into the active set, returning how many the
    /// blob held.
    fn load_rules(&self, blob: &str) -> Result<usize>;

    /// Replace the active set with the rules in a blob.
    fn replace_rules(&self, blob: &str) -> Result<usize>;

    /// Scan a target and produce a verdict.
    fn scan(&self, target: ScanTarget<'_>) -> Result<ScanResult>;

    /// Get the number of active rules.
    fn rule_count(&self) -> Result<usize>;

    /// Describe active rules in evaluation order.
    fn rule_summaries(&self) -> Result<Vec<RuleSummary>>;

    /// List active rule names in evaluation order.
    fn rule_names(&self) -> Result<Vec<String>> {
        Ok(self
            .rule_summaries()?
            .into_iter()
            .map(|summary| summary.name)
            .collect())
    }

    /// Engine identifier reported in results.
    fn version(&self) -> String;

    /// Release rules and return to the uninitialized state.
    fn shutdown(&self);
}

/// Construct the scanner for `kind`.
///
/// `load_default_rules` only affects the precise engine.
pub fn build_scanner(kind: EngineKind, load_default_rules: bool) -> Arc<dyn ContentScanner> {
    match kind {
        EngineKind::Precise if load_default_rules => Arc::new(ScanEngine::new()),
        EngineKind::Precise => Arc::new(ScanEngine::without_default_rules()),
        EngineKind::Heuristic => Arc::new(HeuristicEngine::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_precise() {
        let scanner = build_scanner(EngineKind::Precise, true);
        assert_eq!(scanner.kind(), EngineKind::Precise);
        scanner.initialize().unwrap();
        assert_eq!(scanner.rule_count().unwrap(), yara::defaults::DEFAULT_RULE_NAMES.len());

        let bare = build_scanner(EngineKind::Precise, false);
        bare.initialize().unwrap();
        assert_eq!(bare.rule_count().unwrap(), 0);
    }

    #[test]
    fn test_build_heuristic() {
        let scanner = build_scanner(EngineKind::Heuristic, true);
        assert_eq!(scanner.kind(), EngineKind::Heuristic);
        scanner.initialize().unwrap();
        assert!(scanner.version().contains("(fallback)"));
        assert_eq!(
            scanner.rule_names().unwrap().len(),
            scanner.rule_count().unwrap()
        );
    }

    #[test]
    fn test_engines_distinguishable() {
        let precise = build_scanner(EngineKind::Precise, true);
        let fallback = build_scanner(EngineKind::Heuristic, true);
        assert_ne!(precise.version(), fallback.version());
    }
}
