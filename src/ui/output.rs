//! Rendering of scan reports and rule listings.
//!
//! Everything here builds a `String`; printing is left to the caller so
//! the same report can go to stdout, a file, or a test assertion.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::error::{Error, Result};
use crate::detection::{RuleSummary, ScanResult};
use crate::ui::cli::OutputFormat;

/// Process exit status for a finished scan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    /// Every target scanned and none matched
    Clean,
    /// At least one target matched a rule
    ThreatsFound,
    /// Nothing matched but some targets could not be scanned
    Incomplete,
}

impl ScanStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            ScanStatus::Clean => 0,
            ScanStatus::Incomplete => 1,
            ScanStatus::ThreatsFound => 2,
        }
    }
}

/// One scanned target.
#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ScanResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Results of a scan run over one or more targets.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub engine: String,
    pub rules_loaded: usize,
    pub files_scanned: usize,
    pub threats_found: usize,
    pub errors: usize,
    pub entries: Vec<ScanEntry>,
}

impl ScanReport {
    pub fn new(engine: impl Into<String>, rules_loaded: usize) -> Self {
        Self {
            engine: engine.into(),
            rules_loaded,
            files_scanned: 0,
            threats_found: 0,
            errors: 0,
            entries: Vec::new(),
        }
    }

    /// Record a completed scan.
    pub fn push_result(&mut self, path: &Path, result: ScanResult) {
        self.files_scanned += 1;
        if !result.is_safe() {
            self.threats_found += 1;
        }
        self.entries.push(ScanEntry {
            path: path.to_path_buf(),
            result: Some(result),
            error: None,
        });
    }

    /// Record a target that could not be scanned.
    pub fn push_error(&mut self, path: &Path, error: &Error) {
        self.errors += 1;
        self.entries.push(ScanEntry {
            path: path.to_path_buf(),
            result: None,
            error: Some(error.to_string()),
        });
    }

    pub fn status(&self) -> ScanStatus {
        if self.threats_found > 0 {
            ScanStatus::ThreatsFound
        } else if self.errors > 0 {
            ScanStatus::Incomplete
        } else {
            ScanStatus::Clean
        }
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            OutputFormat::Text => Ok(self.to_text()),
        }
    }

    fn to_text(&self) -> String {
        let mut out = String::new();

        for entry in &self.entries {
            match (&entry.result, &entry.error) {
                (Some(result), _) if result.is_safe() => {
                    let _ = writeln!(out, "[CLEAN]  {}", entry.path.display());
                }
                (Some(result), _) => {
                    let _ = writeln!(
                        out,
                        "[THREAT] {}: {} ({})",
                        entry.path.display(),
                        result.threat_name(),
                        result.severity().to_uppercase()
                    );
                    let _ = writeln!(out, "         {}", result.details());
                }
                (None, error) => {
                    let _ = writeln!(
                        out,
                        "[ERROR]  {}: {}",
                        entry.path.display(),
                        error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "=== Scan Complete ===");
        let _ = writeln!(out, "Engine:          {}", self.engine);
        let _ = writeln!(out, "Rules Loaded:    {}", self.rules_loaded);
        let _ = writeln!(out, "Files Scanned:   {}", self.files_scanned);
        let _ = writeln!(out, "Threats Found:   {}", self.threats_found);
        if self.errors > 0 {
            let _ = writeln!(out, "Errors:          {}", self.errors);
        }
        out
    }
}

/// Render the active rule list.
pub fn render_rules(rules: &[RuleSummary], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(rules)?);
    }

    let name_width = rules.iter().map(|r| r.name.len()).max().unwrap_or(4).max(4);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$}  {:<8}  {:<14}  TAGS",
        "NAME",
        "SEVERITY",
        "CATEGORY",
        width = name_width
    );
    for rule in rules {
        let _ = writeln!(
            out,
            "{:<width$}  {:<8}  {:<14}  {}",
            rule.name,
            rule.severity,
            rule.category,
            rule.tags.join(" "),
            width = name_width
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{} rules active", rules.len());
    Ok(out)
}

/// Outcome of checking a rule file.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub file: PathBuf,
    pub valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationReport {
    pub fn valid(file: &Path, rules: Vec<String>) -> Self {
        Self {
            file: file.to_path_buf(),
            valid: true,
            rules,
            error: None,
            suggestion: None,
        }
    }

    pub fn invalid(file: &Path, error: &Error) -> Self {
        Self {
            file: file.to_path_buf(),
            valid: false,
            rules: Vec::new(),
            error: Some(error.to_string()),
            suggestion: error.suggestion().map(str::to_string),
        }
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        if format == OutputFormat::Json {
            return Ok(serde_json::to_string_pretty(self)?);
        }

        let mut out = String::new();
        if self.valid {
            let _ = writeln!(
                out,
                "{}: OK ({} rules)",
                self.file.display(),
                self.rules.len()
            );
            for name in &self.rules {
                let _ = writeln!(out, "  {}", name);
            }
        } else {
            let _ = writeln!(
                out,
                "{}: INVALID: {}",
                self.file.display(),
                self.error.as_deref().unwrap_or("unknown error")
            );
            if let Some(suggestion) = &self.suggestion {
                let _ = writeln!(out, "  Suggestion: {}", suggestion);
            }
        }
        Ok(out)
    }
}
