//! Core type definitions used throughout rulescan.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Severity level of a detected threat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Low risk - potentially unwanted but not necessarily malicious
    Low,
    /// Medium risk - suspicious content detected
    Medium,
    /// High risk - likely malicious
    High,
    /// Critical risk - confirmed malware or impersonation
    Critical,
}

impl Severity {
    /// Get string representation as used in rule metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Which scanning backend to construct at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Full pattern + condition evaluation over loaded rules
    #[default]
    Precise,
    /// Keyword heuristics for when the precise backend is unavailable
    Heuristic,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Precise => write!(f, "precise"),
            EngineKind::Heuristic => write!(f, "heuristic"),
        }
    }
}

/// Content handed to an engine for a single scan.
///
/// The engine never performs I/O; file bytes are acquired by the caller
/// (see [`crate::scanner::FileStore`]) before the scan starts.
#[derive(Debug, Clone, Copy)]
pub enum ScanTarget<'a> {
    /// An in-memory buffer
    Memory(&'a [u8]),
    /// File contents together with the path they were read from
    File { path: &'a Path, data: &'a [u8] },
}

impl<'a> ScanTarget<'a> {
    /// Raw bytes of the target.
    pub fn data(&self) -> &'a [u8] {
        match self {
            ScanTarget::Memory(data) => data,
            ScanTarget::File { data, .. } => data,
        }
    }

    /// Size of the target in bytes.
    pub fn size(&self) -> u64 {
        self.data().len() as u64
    }

    /// Source path, if the target came from a file.
    pub fn path(&self) -> Option<&'a Path> {
        match self {
            ScanTarget::Memory(_) => None,
            ScanTarget::File { path, .. } => Some(path),
        }
    }
}
