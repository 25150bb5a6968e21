//! Fallback heuristic engine.
//!
//! Used when the precise rule engine is unavailable. It never evaluates
//! conditions: files are judged by name (keywords, then extension) and
//! memory buffers by keyword containment in their printable prefix. Every
//! verdict carries at most one matched rule id and a `(fallback)` engine
//! identifier so callers can tell it apart from precise results.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::error::{Error, Result};
use crate::core::types::{EngineKind, ScanTarget};
use crate::detection::result::{RuleSummary, ScanResult, ThreatInfo};
use crate::detection::yara::validator;
use crate::detection::ContentScanner;

/// Engine name used in result identifiers.
pub const ENGINE_NAME: &str = "rulescan-heuristic";

/// Filename keywords, checked in order.
pub const FILENAME_KEYWORDS: &[&str] = &[
    "malware",
    "virus",
    "trojan",
    "backdoor",
    "rootkit",
    "spyware",
    "adware",
    "ransomware",
    "keylogger",
    "botnet",
    "worm",
    "exploit",
    "phishing",
];

/// Extensions flagged when no filename keyword matched.
pub const SUSPICIOUS_EXTENSIONS: &[&str] =
    &[".exe", ".bat", ".cmd", ".scr", ".pif", ".com", ".vbs", ".js"];

/// Keywords searched for in memory buffers, checked in order.
pub const MEMORY_KEYWORDS: &[&str] = &[
    "malware",
    "virus",
    "trojan",
    "exploit",
    "shell32",
    "eval(",
    "unescape(",
    "fromcharcode",
    "createobject",
    "wscript.shell",
];

/// Number of leading bytes inspected in memory buffers.
pub const MEMORY_WINDOW: usize = 1000;

/// Keyword-based scanner for degraded availability.
#[derive(Debug, Default)]
pub struct HeuristicEngine {
    initialized: AtomicBool,
}

impl HeuristicEngine {
    /// Create a new heuristic engine.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    /// Built-in signatures, in evaluation order.
    pub fn signatures() -> Vec<RuleSummary> {
        let signature = |name: String, severity: &str, category: &str, description: String| {
            RuleSummary {
                name,
                tags: vec!["fallback".to_string()],
                severity: severity.to_string(),
                category: category.to_string(),
                description: Some(description),
            }
        };

        let by_name = FILENAME_KEYWORDS.iter().map(|kw| {
            signature(
                format!("fallback_{}_rule", kw),
                "high",
                "malware",
                format!("Filename contains '{}'", kw),
            )
        });
        let by_extension = std::iter::once(signature(
            "fallback_executable_rule".to_string(),
            "medium",
            "suspicious",
            format!("Extension is one of {}", SUSPICIOUS_EXTENSIONS.join(" ")),
        ));
        let by_content = MEMORY_KEYWORDS.iter().map(|kw| {
            signature(
                format!("fallback_memory_{}_rule", sanitize(kw)),
                "medium",
                "malware",
                format!("Buffer contains '{}'", kw),
            )
        });

        by_name.chain(by_extension).chain(by_content).collect()
    }

    fn scan_file_name(&self, file_name: &str) -> ScanResult {
        let lower = file_name.to_lowercase();

        if let Some(keyword) = FILENAME_KEYWORDS.iter().find(|kw| lower.contains(*kw)) {
            let threat = ThreatInfo::new(
                format!("Detected.{}", capitalize(keyword)),
                "malware",
                "high",
            )
            .with_description(Some(format!(
                "Filename contains suspicious keyword '{}'",
                keyword
            )));
            return ScanResult::threat(
                self.version(),
                threat,
                vec![format!("fallback_{}_rule", keyword)],
            );
        }

        if let Some(ext) = SUSPICIOUS_EXTENSIONS.iter().find(|ext| lower.ends_with(*ext)) {
            let threat = ThreatInfo::new("Suspicious.Executable", "suspicious", "medium")
                .with_description(Some(format!("Executable file type '{}'", ext)));
            return ScanResult::threat(
                self.version(),
                threat,
                vec!["fallback_executable_rule".to_string()],
            );
        }

        ScanResult::clean(self.version(), FILENAME_KEYWORDS.len() + 1)
    }

    fn scan_memory(&self, data: &[u8]) -> ScanResult {
        let text: String = data
            .iter()
            .take(MEMORY_WINDOW)
            .filter(|b| (32..=126).contains(*b))
            .map(|&b| (b as char).to_ascii_lowercase())
            .collect();

        if let Some(keyword) = MEMORY_KEYWORDS.iter().find(|kw| text.contains(*kw)) {
            let threat = ThreatInfo::new("Memory.Malware", "malware", "medium").with_description(
                Some(format!("Buffer contains suspicious keyword '{}'", keyword)),
            );
            return ScanResult::threat(
                self.version(),
                threat,
                vec![format!("fallback_memory_{}_rule", sanitize(keyword))],
            );
        }

        ScanResult::clean(self.version(), MEMORY_KEYWORDS.len())
    }
}

/// Upper-case the first letter of a keyword.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Turn a keyword into a rule-id fragment (`wscript.shell` -> `wscript_shell`).
fn sanitize(keyword: &str) -> String {
    keyword
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

impl ContentScanner for HeuristicEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Heuristic
    }

    fn initialize(&self) -> Result<()> {
        if !self.initialized.swap(true, Ordering::AcqRel) {
            log::warn!("Precise engine unavailable, using heuristic fallback scanner");
        }
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn load_rules(&self, blob: &str) -> Result<usize> {
        self.ensure_initialized()?;
        validator::validate(blob)?;
        log::warn!("Heuristic fallback engine cannot evaluate custom rules; rule set accepted but not applied");
        Ok(0)
    }

    fn replace_rules(&self, blob: &str) -> Result<usize> {
        self.load_rules(blob)
    }

    fn scan(&self, target: ScanTarget<'_>) -> Result<ScanResult> {
        self.ensure_initialized()?;

        let started = std::time::Instant::now();
        let result = match target {
            ScanTarget::File { path, .. } => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.scan_file_name(&name)
            }
            ScanTarget::Memory(data) => {
                if data.is_empty() {
                    return Err(Error::EmptyInput);
                }
                self.scan_memory(data)
            }
        };

        Ok(result
            .with_scan_time(started.elapsed().as_millis() as u64)
            .with_target_size(target.size()))
    }

    fn rule_count(&self) -> Result<usize> {
        self.ensure_initialized()?;
        Ok(FILENAME_KEYWORDS.len() + 1 + MEMORY_KEYWORDS.len())
    }

    fn rule_summaries(&self) -> Result<Vec<RuleSummary>> {
        self.ensure_initialized()?;
        Ok(Self::signatures())
    }

    fn version(&self) -> String {
        format!("{}/{} (fallback)", ENGINE_NAME, env!("CARGO_PKG_VERSION"))
    }

    fn shutdown(&self) {
        self.initialized.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn engine() -> HeuristicEngine {
        let engine = HeuristicEngine::new();
        engine.initialize().unwrap();
        engine
    }

    fn scan_name(name: &str) -> ScanResult {
        engine()
            .scan(ScanTarget::File {
                path: Path::new(name),
                data: b"",
            })
            .unwrap()
    }

    #[test]
    fn test_requires_initialize() {
        let engine = HeuristicEngine::new();
        assert!(matches!(
            engine.scan(ScanTarget::Memory(b"x")),
            Err(Error::NotInitialized)
        ));
        assert!(matches!(engine.rule_count(), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_filename_keyword() {
        let result = scan_name("/downloads/trojan_installer.apk");
        assert!(!result.is_safe());
        assert_eq!(result.threat_name(), "Detected.Trojan");
        assert_eq!(result.threat_category(), "malware");
        assert_eq!(result.severity(), "high");
        assert_eq!(result.matched_rule_names(), &["fallback_trojan_rule".to_string()]);
        assert!(result.engine_identifier().ends_with("(fallback)"));
    }

    #[test]
    fn test_first_keyword_wins() {
        let result = scan_name("Virus-MALWARE.txt");
        assert_eq!(result.threat_name(), "Detected.Malware");
    }

    #[test]
    fn test_suspicious_extension() {
        let result = scan_name("setup.EXE");
        assert_eq!(result.threat_name(), "Suspicious.Executable");
        assert_eq!(result.threat_category(), "suspicious");
        assert_eq!(result.severity(), "medium");
        assert_eq!(result.matched_rule_names().len(), 1);

        assert!(scan_name("report.pdf").is_safe());
        assert!(scan_name("archive.jsx").is_safe());
    }

    #[test]
    fn test_bare_extension_name() {
        for name in [".js", "/tmp/.exe", "payload.tar.bat"] {
            let result = scan_name(name);
            assert_eq!(result.threat_name(), "Suspicious.Executable", "name {:?}", name);
        }
        assert!(scan_name("notes.jsx").is_safe());
    }

    #[test]
    fn test_memory_keyword() {
        let engine = engine();
        let result = engine
            .scan(ScanTarget::Memory(b"var s = UNESCAPE('%u9090');"))
            .unwrap();
        assert_eq!(result.threat_name(), "Memory.Malware");
        assert_eq!(result.severity(), "medium");
        assert_eq!(
            result.matched_rule_names(),
            &["fallback_memory_unescape_rule".to_string()]
        );
    }

    #[test]
    fn test_memory_window_and_printable_filter() {
        let engine = engine();

        let mut late = vec![b'a'; MEMORY_WINDOW];
        late.extend_from_slice(b"malware");
        assert!(engine.scan(ScanTarget::Memory(&late)).unwrap().is_safe());

        // Non-printable bytes are dropped before matching
        let split = b"tro\x00jan";
        let result = engine.scan(ScanTarget::Memory(split)).unwrap();
        assert_eq!(result.threat_name(), "Memory.Malware");
    }

    #[test]
    fn test_empty_memory_rejected() {
        assert!(matches!(
            engine().scan(ScanTarget::Memory(b"")),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn test_load_rules_validates_only() {
        let engine = engine();
        assert_eq!(
            engine
                .load_rules(r#"rule A { strings: $a = "x" condition: $a }"#)
                .unwrap(),
            0
        );
        assert!(matches!(engine.load_rules(""), Err(Error::Validation(_))));
        assert_eq!(
            engine.rule_count().unwrap(),
            HeuristicEngine::signatures().len()
        );
    }

    #[test]
    fn test_signature_names() {
        let names = engine().rule_names().unwrap();
        assert!(names.contains(&"fallback_executable_rule".to_string()));
        assert!(names.contains(&"fallback_memory_wscript_shell_rule".to_string()));
        assert!(names.contains(&"fallback_memory_eval_rule".to_string()));
        assert_eq!(names[0], "fallback_malware_rule");
    }
}
