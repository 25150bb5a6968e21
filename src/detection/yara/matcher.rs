//! Pattern search and condition evaluation for a single rule.

use std::cell::OnceCell;
use std::collections::BTreeSet;

use super::rules::{Pattern, Rule};

/// Result of evaluating one rule against one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Name of the evaluated rule
    pub rule_name: String,
    /// Ids of the patterns with at least one qualifying occurrence
    pub fired_pattern_ids: BTreeSet<String>,
    /// Whether the rule's condition holds
    pub satisfied: bool,
}

/// Target bytes shared by every rule evaluated in one scan.
///
/// The ASCII-folded copy is built on first use by a case-insensitive pattern
/// and reused afterwards.
pub struct ScanBuffer<'a> {
    raw: &'a [u8],
    folded: OnceCell<Vec<u8>>,
}

impl<'a> ScanBuffer<'a> {
    pub fn new(raw: &'a [u8]) -> Self {
        Self {
            raw,
            folded: OnceCell::new(),
        }
    }

    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    fn folded(&self) -> &[u8] {
        self.folded.get_or_init(|| self.raw.to_ascii_lowercase())
    }

    fn haystack(&self, pattern: &Pattern) -> &[u8] {
        if pattern.case_insensitive {
            self.folded()
        } else {
            self.raw
        }
    }
}

/// Evaluate a rule against raw target bytes.
pub fn evaluate(rule: &Rule, target: &[u8]) -> MatchOutcome {
    evaluate_buffer(rule, &ScanBuffer::new(target))
}

/// Evaluate a rule against a prepared scan buffer.
pub fn evaluate_buffer(rule: &Rule, buffer: &ScanBuffer<'_>) -> MatchOutcome {
    let fired_pattern_ids: BTreeSet<String> = rule
        .patterns
        .iter()
        .filter(|pattern| pattern_fires(pattern, buffer))
        .map(|pattern| pattern.id.clone())
        .collect();

    let satisfied = rule.condition.evaluate(&fired_pattern_ids);

    MatchOutcome {
        rule_name: rule.name.clone(),
        fired_pattern_ids,
        satisfied,
    }
}

/// Check whether a pattern has a qualifying occurrence in the buffer.
pub fn pattern_fires(pattern: &Pattern, buffer: &ScanBuffer<'_>) -> bool {
    let haystack = buffer.haystack(pattern);
    let needle = pattern.needle();
    if needle.is_empty() {
        return false;
    }

    match pattern.anchor {
        Some(offset) => offset
            .checked_add(needle.len())
            .and_then(|end| haystack.get(offset..end))
            .map_or(false, |window| window == needle.as_ref()),
        None => contains(haystack, &needle),
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.len() <= haystack.len() && haystack.windows(needle.len()).any(|w| w == needle)
}
