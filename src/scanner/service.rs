//! Host-facing scan service.
//!
//! Wraps a [`ContentScanner`] and a [`FileStore`] behind the small surface a
//! host application calls: `initialize`, `load_rules_*`, `scan_*`. The plain
//! methods log failures and return `bool`/`Option`; the `try_*` variants
//! return the underlying error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::ScanTarget;
use crate::detection::{build_scanner, ContentScanner, ScanResult};
use crate::scanner::file::FileStore;

/// Scanner plus file access, as exposed to host callers.
pub struct ScanService {
    scanner: Arc<dyn ContentScanner>,
    files: FileStore,
    /// Rule files loaded on every initialize, in order
    rule_paths: Vec<PathBuf>,
}

impl ScanService {
    /// Create a service around an existing scanner.
    pub fn new(scanner: Arc<dyn ContentScanner>, files: FileStore) -> Self {
        Self {
            scanner,
            files,
            rule_paths: Vec::new(),
        }
    }

    /// Create a service with the backend and limits named in `config`.
    pub fn from_config(config: &Config) -> Self {
        let scanner = build_scanner(config.engine.backend, config.engine.load_default_rules);
        Self::new(scanner, FileStore::from_config(&config.scan))
            .with_rule_paths(config.engine.rule_paths.clone())
    }

    /// Set rule files to load after initialization.
    pub fn with_rule_paths(mut self, rule_paths: Vec<PathBuf>) -> Self {
        self.rule_paths = rule_paths;
        self
    }

    /// The underlying scanner.
    pub fn scanner(&self) -> &Arc<dyn ContentScanner> {
        &self.scanner
    }

    /// The file store used for path-based calls.
    pub fn files(&self) -> &FileStore {
        &self.files
    }

    /// Initialize the scanner and load configured rule files.
    ///
    /// A configured rule file that fails to load is logged and skipped; the
    /// scanner stays usable with the rules it has.
    pub fn try_initialize(&self) -> Result<()> {
        let already = self.scanner.is_initialized();
        self.scanner.initialize()?;
        if already {
            return Ok(());
        }

        for path in &self.rule_paths {
            if let Err(e) = self.try_load_rules_from_path(path) {
                log::warn!("Skipping rule file {}: {}", path.display(), e);
            }
        }
        Ok(())
    }

    /// Initialize; returns true if the scanner is ready.
    pub fn initialize(&self) -> bool {
        report("initialize", self.try_initialize()).is_some()
    }

    pub fn try_load_rules_from_text(&self, blob: &str) -> Result<usize> {
        self.scanner.load_rules(blob)
    }

    /// Merge rules from text; returns false if the rule set was rejected.
    pub fn load_rules_from_text(&self, blob: &str) -> bool {
        report("load rules", self.try_load_rules_from_text(blob)).is_some()
    }

    pub fn try_load_rules_from_path(&self, path: &Path) -> Result<usize> {
        let blob = self.files.read_rules(path)?;
        let count = self.scanner.load_rules(&blob)?;
        log::info!("Loaded {} rules from {}", count, path.display());
        Ok(count)
    }

    /// Merge rules from a file; returns false if the file or rules are bad.
    pub fn load_rules_from_path(&self, path: &Path) -> bool {
        report("load rules from file", self.try_load_rules_from_path(path)).is_some()
    }

    /// Replace all active rules with the rules in `blob`.
    pub fn try_replace_rules(&self, blob: &str) -> Result<usize> {
        self.scanner.replace_rules(blob)
    }

    pub fn try_scan_bytes(&self, data: &[u8]) -> Result<ScanResult> {
        self.scanner.scan(ScanTarget::Memory(data))
    }

    /// Scan a buffer; `None` if it could not be scanned.
    pub fn scan_bytes(&self, data: &[u8]) -> Option<ScanResult> {
        report("scan buffer", self.try_scan_bytes(data))
    }

    pub fn try_scan_path(&self, path: &Path) -> Result<ScanResult> {
        if !self.scanner.is_initialized() {
            return Err(Error::NotInitialized);
        }
        let data = self.files.read(path)?;
        self.scanner.scan(ScanTarget::File { path, data: &data })
    }

    /// Scan a file; `None` if it could not be read or scanned.
    pub fn scan_path(&self, path: &Path) -> Option<ScanResult> {
        report("scan file", self.try_scan_path(path))
    }

    /// Engine identifier of the active backend.
    pub fn version(&self) -> String {
        self.scanner.version()
    }

    /// Number of active rules; 0 when not initialized.
    pub fn loaded_rule_count(&self) -> usize {
        self.scanner.rule_count().unwrap_or(0)
    }

    /// Names of the active rules; empty when not initialized.
    pub fn rule_names(&self) -> Vec<String> {
        self.scanner.rule_names().unwrap_or_default()
    }

    pub fn shutdown(&self) {
        self.scanner.shutdown();
    }
}

/// Log a failed operation with its suggestion and drop the error.
fn report<T>(operation: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Failed to {} [{}]: {}", operation, e.category(), e);
            if let Some(suggestion) = e.suggestion() {
                log::info!("Suggestion: {}", suggestion);
            }
            None
        }
    }
}
