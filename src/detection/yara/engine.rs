//! YARA-like scan engine.
//!
//! Owns the active rule catalog and runs every rule against a target.
//! Scans work on an `Arc` snapshot of the catalog taken under a short read
//! lock; rule loads parse outside the lock and swap in a new catalog, so a
//! scan never observes a half-applied update.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use super::defaults::DEFAULT_RULES;
use super::matcher::{self, ScanBuffer};
use super::parser;
use super::rules::{Rule, RuleCatalog};
use super::validator;
use crate::core::error::{Error, Result};
use crate::core::types::{EngineKind, ScanTarget};
use crate::detection::result::{RuleSummary, ScanResult, ThreatInfo};
use crate::detection::ContentScanner;

/// Engine name used in result identifiers.
pub const ENGINE_NAME: &str = "rulescan-precise";

/// Category reported when a matching rule has no `category` meta.
pub const DEFAULT_CATEGORY: &str = "unknown";

/// Severity reported when a matching rule has no `severity` meta.
pub const DEFAULT_SEVERITY: &str = "medium";

#[derive(Debug)]
enum EngineState {
    Uninitialized,
    Ready(Arc<RuleCatalog>),
}

/// Validate and parse a rule-set blob.
pub fn compile_rules(blob: &str) -> Result<RuleCatalog> {
    validator::validate(blob)?;
    Ok(parser::parse(blob)?)
}

/// Rule-based scan engine.
#[derive(Debug)]
pub struct ScanEngine {
    state: RwLock<EngineState>,
    /// Serializes catalog writers (initialize, loads, shutdown)
    writer: Mutex<()>,
    load_default_rules: bool,
}

impl ScanEngine {
    /// Create an engine that loads the built-in rules on initialize.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(EngineState::Uninitialized),
            writer: Mutex::new(()),
            load_default_rules: true,
        }
    }

    /// Create an engine that starts with an empty catalog.
    pub fn without_default_rules() -> Self {
        Self {
            load_default_rules: false,
            ..Self::new()
        }
    }

    /// Move to the ready state. Does nothing if already initialized.
    pub fn initialize(&self) -> Result<()> {
        let _writer = self
            .writer
            .lock()
            .map_err(|_| Error::lock_poisoned("engine writer"))?;

        if self.is_initialized() {
            log::debug!("Scan engine already initialized");
            return Ok(());
        }

        let catalog = if self.load_default_rules {
            compile_rules(DEFAULT_RULES)?
        } else {
            RuleCatalog::new()
        };
        let count = catalog.len();

        *self
            .state
            .write()
            .map_err(|_| Error::lock_poisoned("engine state"))? =
            EngineState::Ready(Arc::new(catalog));

        log::info!("Scan engine initialized with {} rules", count);
        Ok(())
    }

    /// Check whether the engine is ready.
    pub fn is_initialized(&self) -> bool {
        matches!(
            self.state.read().as_deref(),
            Ok(EngineState::Ready(_))
        )
    }

    /// Current catalog snapshot.
    pub fn snapshot(&self) -> Result<Arc<RuleCatalog>> {
        let state = self
            .state
            .read()
            .map_err(|_| Error::lock_poisoned("engine state"))?;
        match &*state {
            EngineState::Ready(catalog) => Ok(Arc::clone(catalog)),
            EngineState::Uninitialized => Err(Error::NotInitialized),
        }
    }

    /// Add rules from a blob to the active catalog.
    ///
    /// A rule whose name is already loaded is replaced and moves to the end
    /// of the scan order. Returns the number of rules in the blob. On any
    /// error the active catalog is unchanged.
    pub fn load_rules(&self, blob: &str) -> Result<usize> {
        self.update_catalog(blob, |current, incoming| current.merged_with(&incoming))
    }

    /// Replace the active catalog with exactly the rules in a blob.
    pub fn replace_rules(&self, blob: &str) -> Result<usize> {
        self.update_catalog(blob, |_, incoming| incoming)
    }

    fn update_catalog<F>(&self, blob: &str, combine: F) -> Result<usize>
    where
        F: FnOnce(&RuleCatalog, RuleCatalog) -> RuleCatalog,
    {
        // Fail fast before doing any parsing work
        self.snapshot()?;

        let incoming = compile_rules(blob).map_err(|e| {
            log::warn!("Rejected rule set: {}", e);
            e
        })?;
        let added = incoming.len();

        let _writer = self
            .writer
            .lock()
            .map_err(|_| Error::lock_poisoned("engine writer"))?;

        let current = self.snapshot()?;
        let updated = Arc::new(combine(&current, incoming));
        let total = updated.len();

        *self
            .state
            .write()
            .map_err(|_| Error::lock_poisoned("engine state"))? = EngineState::Ready(updated);

        log::info!("Loaded {} rules ({} active)", added, total);
        Ok(added)
    }

    /// Scan a target against every loaded rule.
    pub fn scan(&self, target: ScanTarget<'_>) -> Result<ScanResult> {
        let catalog = self.snapshot()?;

        // An empty file is a valid target; an empty buffer has nothing to scan.
        if matches!(target, ScanTarget::Memory(data) if data.is_empty()) {
            return Err(Error::EmptyInput);
        }
        let data = target.data();

        let started = Instant::now();
        let buffer = ScanBuffer::new(data);
        let satisfied: Vec<&Rule> = catalog
            .iter()
            .filter(|rule| {
                let outcome = matcher::evaluate_buffer(rule, &buffer);
                if outcome.satisfied {
                    log::debug!(
                        "Rule {} matched ({:?})",
                        outcome.rule_name,
                        outcome.fired_pattern_ids
                    );
                }
                outcome.satisfied
            })
            .collect();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let result = match satisfied.first() {
            None => ScanResult::clean(self.version(), catalog.len()),
            Some(first) => {
                let threat = ThreatInfo::new(
                    first.name.clone(),
                    first.category().unwrap_or(DEFAULT_CATEGORY),
                    first.severity().unwrap_or(DEFAULT_SEVERITY),
                )
                .with_description(first.description());
                let names = satisfied.iter().map(|rule| rule.name.clone()).collect();
                ScanResult::threat(self.version(), threat, names)
            }
        };

        log::debug!(
            "Scanned {} bytes against {} rules in {} ms: {}",
            data.len(),
            catalog.len(),
            elapsed_ms,
            if result.is_safe() { "clean" } else { result.threat_name() }
        );

        Ok(result
            .with_scan_time(elapsed_ms)
            .with_target_size(target.size()))
    }

    /// Get the number of loaded rules.
    pub fn rule_count(&self) -> Result<usize> {
        Ok(self.snapshot()?.len())
    }

    /// List all rule names in scan order.
    pub fn rule_names(&self) -> Result<Vec<String>> {
        Ok(self
            .snapshot()?
            .names()
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    /// Describe loaded rules in scan order.
    pub fn rule_summaries(&self) -> Result<Vec<RuleSummary>> {
        Ok(self
            .snapshot()?
            .iter()
            .map(|rule| RuleSummary {
                name: rule.name.clone(),
                tags: rule.tags.clone(),
                severity: rule.severity().unwrap_or(DEFAULT_SEVERITY).to_string(),
                category: rule.category().unwrap_or(DEFAULT_CATEGORY).to_string(),
                description: rule.description().map(str::to_string),
            })
            .collect())
    }

    /// Get a copy of a loaded rule by name.
    pub fn get_rule(&self, name: &str) -> Result<Option<Rule>> {
        Ok(self.snapshot()?.get(name).cloned())
    }

    /// Drop the catalog and return to the uninitialized state.
    pub fn shutdown(&self) {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if matches!(*state, EngineState::Ready(_)) {
            log::info!("Scan engine shut down");
        }
        *state = EngineState::Uninitialized;
    }

    /// Engine identifier, e.g. `rulescan-precise/0.1.0`.
    pub fn version(&self) -> String {
        format!("{}/{}", ENGINE_NAME, env!("CARGO_PKG_VERSION"))
    }
}

impl Default for ScanEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentScanner for ScanEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Precise
    }

    fn initialize(&self) -> Result<()> {
        ScanEngine::initialize(self)
    }

    fn is_initialized(&self) -> bool {
        ScanEngine::is_initialized(self)
    }

    fn load_rules(&self, blob: &str) -> Result<usize> {
        ScanEngine::load_rules(self, blob)
    }

    fn replace_rules(&self, blob: &str) -> Result<usize> {
        ScanEngine::replace_rules(self, blob)
    }

    fn scan(&self, target: ScanTarget<'_>) -> Result<ScanResult> {
        ScanEngine::scan(self, target)
    }

    fn rule_count(&self) -> Result<usize> {
        ScanEngine::rule_count(self)
    }

    fn rule_summaries(&self) -> Result<Vec<RuleSummary>> {
        ScanEngine::rule_summaries(self)
    }

    fn rule_names(&self) -> Result<Vec<String>> {
        ScanEngine::rule_names(self)
    }

    fn version(&self) -> String {
        ScanEngine::version(self)
    }

    fn shutdown(&self) {
        ScanEngine::shutdown(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{ParseError, ValidationError};
    use crate::detection::yara::defaults::DEFAULT_RULE_NAMES;
    use std::path::Path;
    use std::thread;

    const CUSTOM: &str = r#"
        rule Custom_Marker {
            meta:
                severity = "low"
                category = "test"
            strings:
                $m = "CUSTOM-MARKER"
            condition:
                $m
        }
    "#;

    fn ready_engine() -> ScanEngine {
        let engine = ScanEngine::new();
        engine.initialize().unwrap();
        engine
    }

    #[test]
    fn test_not_initialized() {
        let engine = ScanEngine::new();
        assert!(!engine.is_initialized());
        assert!(matches!(engine.rule_count(), Err(Error::NotInitialized)));
        assert!(matches!(engine.load_rules(CUSTOM), Err(Error::NotInitialized)));
        assert!(matches!(
            engine.scan(ScanTarget::Memory(b"data")),
            Err(Error::NotInitialized)
        ));
    }

    #[test]
    fn test_initialize_idempotent() {
        let engine = ready_engine();
        let count = engine.rule_count().unwrap();
        assert_eq!(count, DEFAULT_RULE_NAMES.len());

        engine.initialize().unwrap();
        assert_eq!(engine.rule_count().unwrap(), count);
    }

    #[test]
    fn test_without_default_rules() {
        let engine = ScanEngine::without_default_rules();
        engine.initialize().unwrap();
        assert_eq!(engine.rule_count().unwrap(), 0);

        let result = engine.scan(ScanTarget::Memory(b"anything")).unwrap();
        assert!(result.is_safe());
        assert_eq!(result.details(), "No threats detected (0 rules evaluated)");
    }

    #[test]
    fn test_scan_android_malware() {
        let engine = ready_engine();
        let data = b"dex\n035...sendTextMessage...abortBroadcast...RECEIVE_SMS";

        let result = engine.scan(ScanTarget::Memory(data)).unwrap();
        assert!(!result.is_safe());
        assert_eq!(result.threat_name(), "Android_Malware_APK");
        assert_eq!(result.threat_category(), "malware");
        assert_eq!(result.severity(), "high");
        assert_eq!(result.matched_rule_names(), &["Android_Malware_APK".to_string()]);
        assert_eq!(result.target_size_bytes(), data.len() as u64);
        assert!(result.engine_identifier().starts_with("rulescan-precise/"));
    }

    #[test]
    fn test_first_satisfied_rule_wins() {
        let engine = ready_engine();
        engine.load_rules(CUSTOM).unwrap();

        let data = b"Your files have been encrypted, send bitcoin. CUSTOM-MARKER";
        let result = engine.scan(ScanTarget::Memory(data)).unwrap();
        assert_eq!(result.threat_name(), "Ransomware_Generic");
        assert_eq!(result.severity(), "critical");
        assert_eq!(
            result.matched_rule_names(),
            &["Ransomware_Generic".to_string(), "Custom_Marker".to_string()]
        );
    }

    #[test]
    fn test_missing_meta_defaults() {
        let engine = ScanEngine::without_default_rules();
        engine.initialize().unwrap();
        engine
            .load_rules(r#"rule Bare { strings: $a = "bare" condition: $a }"#)
            .unwrap();

        let result = engine.scan(ScanTarget::Memory(b"bare bones")).unwrap();
        assert_eq!(result.threat_category(), DEFAULT_CATEGORY);
        assert_eq!(result.severity(), DEFAULT_SEVERITY);
    }

    #[test]
    fn test_empty_input() {
        let engine = ready_engine();
        assert!(matches!(
            engine.scan(ScanTarget::Memory(b"")),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn test_wide_escape_matches_utf16_bytes() {
        let engine = ScanEngine::without_default_rules();
        engine.initialize().unwrap();
        engine
            .load_rules(r#"rule Wide_Escape { strings: $w = "A\xE9" wide condition: $w }"#)
            .unwrap();

        let hit = engine.scan(ScanTarget::Memory(b"\x00\x41\x00\xE9\x00")).unwrap();
        assert_eq!(hit.threat_name(), "Wide_Escape");
        let miss = engine.scan(ScanTarget::Memory(b"\x41\x00\xFD\xFF")).unwrap();
        assert!(miss.is_safe());
    }

    #[test]
    fn test_empty_file_scans_clean() {
        let engine = ready_engine();
        let file = ScanTarget::File {
            path: Path::new("empty.bin"),
            data: b"",
        };
        let result = engine.scan(file).unwrap();
        assert!(result.is_safe());
        assert_eq!(result.target_size_bytes(), 0);
    }

    #[test]
    fn test_failed_load_keeps_catalog() {
        let engine = ready_engine();
        let before = engine.rule_names().unwrap();

        let err = engine.load_rules("rule Broken { condition: $a ").unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::UnbalancedBraces { .. })
        ));

        let err = engine
            .load_rules(r#"rule Dangling { strings: $a = "x" condition: $b }"#)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Parse(ParseError::UnknownPatternReference { .. })
        ));

        assert_eq!(engine.rule_names().unwrap(), before);
        let data = b"dex\nsendTextMessage abortBroadcast";
        let result = engine.scan(ScanTarget::Memory(data)).unwrap();
        assert_eq!(result.threat_name(), "Android_Malware_APK");
    }

    #[test]
    fn test_reload_moves_rule_to_end() {
        let engine = ready_engine();
        let reloaded = r#"
            rule Android_Banking_Trojan {
                meta:
                    severity = "low"
                    category = "reloaded"
                strings:
                    $banking1 = "overlay_service"
                condition:
                    $banking1
            }
        "#;
        assert_eq!(engine.load_rules(reloaded).unwrap(), 1);

        let names = engine.rule_names().unwrap();
        assert_eq!(names.len(), DEFAULT_RULE_NAMES.len());
        assert_eq!(names.last().map(String::as_str), Some("Android_Banking_Trojan"));
        assert_eq!(
            engine
                .get_rule("Android_Banking_Trojan")
                .unwrap()
                .unwrap()
                .category(),
            Some("reloaded")
        );
    }

    #[test]
    fn test_rule_summaries() {
        let engine = ready_engine();
        let summaries = engine.rule_summaries().unwrap();
        assert_eq!(summaries.len(), DEFAULT_RULE_NAMES.len());

        let whatsapp = &summaries[1];
        assert_eq!(whatsapp.name, "Fake_WhatsApp_APK");
        assert_eq!(whatsapp.tags, vec!["android", "impersonation"]);
        assert_eq!(whatsapp.severity, "critical");
        assert_eq!(whatsapp.category, "impersonation");
    }

    #[test]
    fn test_replace_rules() {
        let engine = ready_engine();
        assert_eq!(engine.replace_rules(CUSTOM).unwrap(), 1);
        assert_eq!(engine.rule_names().unwrap(), vec!["Custom_Marker".to_string()]);

        assert!(engine.replace_rules("not rules").is_err());
        assert_eq!(engine.rule_count().unwrap(), 1);
    }

    #[test]
    fn test_shutdown_and_reinitialize() {
        let engine = ready_engine();
        engine.load_rules(CUSTOM).unwrap();
        engine.shutdown();
        assert!(!engine.is_initialized());
        assert!(matches!(engine.rule_names(), Err(Error::NotInitialized)));

        engine.initialize().unwrap();
        assert_eq!(engine.rule_count().unwrap(), DEFAULT_RULE_NAMES.len());
    }

    #[test]
    fn test_concurrent_scans_during_reload() {
        let engine = Arc::new(ready_engine());
        let data: &[u8] = b"dex\nsendTextMessage abortBroadcast RECEIVE_SMS";

        let scanners: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let result = engine.scan(ScanTarget::Memory(data)).unwrap();
                        assert_eq!(result.threat_name(), "Android_Malware_APK");
                    }
                })
            })
            .collect();

        for _ in 0..20 {
            engine.load_rules(CUSTOM).unwrap();
        }

        for handle in scanners {
            handle.join().unwrap();
        }
        assert_eq!(engine.rule_count().unwrap(), DEFAULT_RULE_NAMES.len() + 1);
    }
}
