//! Scan verdicts returned to callers.

use serde::Serialize;

use crate::core::error::Result;
use crate::core::types::Severity;

/// Severity reported when nothing matched.
pub const SEVERITY_NONE: &str = "none";

/// Identity of the threat behind an unsafe verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreatInfo {
    /// Threat name (the first satisfied rule's name)
    pub name: String,
    /// Threat category (e.g. "malware", "phishing")
    pub category: String,
    /// Severity string (e.g. "high")
    pub severity: String,
    /// Optional human-readable description
    pub description: Option<String>,
}

impl ThreatInfo {
    /// Create threat info, normalizing the severity spelling.
    pub fn new(name: impl Into<String>, category: impl Into<String>, severity: &str) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            severity: normalize_severity(severity),
            description: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: Option<impl Into<String>>) -> Self {
        self.description = description.map(Into::into);
        self
    }
}

fn normalize_severity(severity: &str) -> String {
    Severity::from_str(severity)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|| severity.trim().to_lowercase())
}

/// Description of one active rule, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub severity: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Outcome of scanning one target.
///
/// Built once per scan and never modified afterwards. Serializes to the
/// camelCase shape host bindings expose (`isSafe`, `threatName`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    is_safe: bool,
    threat_name: String,
    threat_category: String,
    severity: String,
    #[serde(rename = "scanTime")]
    scan_time_ms: u64,
    #[serde(rename = "fileSize")]
    target_size_bytes: u64,
    #[serde(rename = "scanEngine")]
    engine_identifier: String,
    details: String,
    #[serde(rename = "matchedRules")]
    matched_rule_names: Vec<String>,
}

impl ScanResult {
    /// A safe verdict after evaluating `rules_evaluated` rules.
    pub fn clean(engine_identifier: impl Into<String>, rules_evaluated: usize) -> Self {
        Self {
            is_safe: true,
            threat_name: String::new(),
            threat_category: String::new(),
            severity: SEVERITY_NONE.to_string(),
            scan_time_ms: 0,
            target_size_bytes: 0,
            engine_identifier: engine_identifier.into(),
            details: format!("No threats detected ({} rules evaluated)", rules_evaluated),
            matched_rule_names: Vec::new(),
        }
    }

    /// An unsafe verdict for `threat`, listing every satisfied rule.
    pub fn threat(
        engine_identifier: impl Into<String>,
        threat: ThreatInfo,
        matched_rule_names: Vec<String>,
    ) -> Self {
        let mut details = format!(
            "Matched rules: {} | Severity: {} | Category: {}",
            matched_rule_names.join(", "),
            threat.severity.to_uppercase(),
            threat.category
        );
        if let Some(description) = &threat.description {
            details.push_str(" | ");
            details.push_str(description);
        }

        Self {
            is_safe: false,
            threat_name: threat.name,
            threat_category: threat.category,
            severity: threat.severity,
            scan_time_ms: 0,
            target_size_bytes: 0,
            engine_identifier: engine_identifier.into(),
            details,
            matched_rule_names,
        }
    }

    /// Set the elapsed matching time.
    pub fn with_scan_time(mut self, scan_time_ms: u64) -> Self {
        self.scan_time_ms = scan_time_ms;
        self
    }

    /// Set the scanned target size.
    pub fn with_target_size(mut self, target_size_bytes: u64) -> Self {
        self.target_size_bytes = target_size_bytes;
        self
    }

    pub fn is_safe(&self) -> bool {
        self.is_safe
    }

    pub fn threat_name(&self) -> &str {
        &self.threat_name
    }

    pub fn threat_category(&self) -> &str {
        &self.threat_category
    }

    /// Severity string; "none" for safe verdicts.
    pub fn severity(&self) -> &str {
        &self.severity
    }

    /// Severity as a typed level, if it is one of the known levels.
    pub fn severity_level(&self) -> Option<Severity> {
        Severity::from_str(&self.severity)
    }

    pub fn scan_time_ms(&self) -> u64 {
        self.scan_time_ms
    }

    pub fn target_size_bytes(&self) -> u64 {
        self.target_size_bytes
    }

    pub fn engine_identifier(&self) -> &str {
        &self.engine_identifier
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    /// Every satisfied rule, in catalog order.
    pub fn matched_rule_names(&self) -> &[String] {
        &self.matched_rule_names
    }

    /// Serialize to the external JSON representation.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_result() {
        let result = ScanResult::clean("rulescan-precise/0.1.0", 7)
            .with_scan_time(3)
            .with_target_size(128);

        assert!(result.is_safe());
        assert_eq!(result.threat_name(), "");
        assert_eq!(result.threat_category(), "");
        assert_eq!(result.severity(), "none");
        assert_eq!(result.severity_level(), None);
        assert_eq!(result.target_size_bytes(), 128);
        assert!(result.matched_rule_names().is_empty());
        assert_eq!(result.details(), "No threats detected (7 rules evaluated)");
    }

    #[test]
    fn test_threat_result() {
        let threat = ThreatInfo::new("Android_Malware_APK", "malware", "HIGH")
            .with_description(Some("Generic Android malware detection"));
        let result = ScanResult::threat(
            "rulescan-precise/0.1.0",
            threat,
            vec!["Android_Malware_APK".to_string(), "Other".to_string()],
        );

        assert!(!result.is_safe());
        assert_eq!(result.threat_name(), "Android_Malware_APK");
        assert_eq!(result.severity(), "high");
        assert_eq!(result.severity_level(), Some(Severity::High));
        assert_eq!(
            result.details(),
            "Matched rules: Android_Malware_APK, Other | Severity: HIGH | Category: malware \
             | Generic Android malware detection"
        );
    }

    #[test]
    fn test_unknown_severity_kept() {
        let threat = ThreatInfo::new("X", "misc", " Severe ");
        assert_eq!(threat.severity, "severe");
    }

    #[test]
    fn test_json_field_names() {
        let result = ScanResult::threat(
            "engine",
            ThreatInfo::new("Rule", "phishing", "medium"),
            vec!["Rule".to_string()],
        )
        .with_scan_time(5)
        .with_target_size(42);

        let value: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(value["isSafe"], false);
        assert_eq!(value["threatName"], "Rule");
        assert_eq!(value["threatCategory"], "phishing");
        assert_eq!(value["severity"], "medium");
        assert_eq!(value["scanTime"], 5);
        assert_eq!(value["fileSize"], 42);
        assert_eq!(value["scanEngine"], "engine");
        assert_eq!(value["matchedRules"][0], "Rule");
        assert!(value["details"].as_str().unwrap().starts_with("Matched rules: Rule"));
    }
}
