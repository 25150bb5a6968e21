//! Rule definitions and the rule catalog.
//!
//! A rule is parsed once from rule text and never mutated afterwards. The
//! catalog is an insertion-ordered collection of shared rules; engines swap
//! whole catalogs instead of editing one in place.

use serde::Serialize;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::core::error::ParseError;

/// What a pattern's value holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    /// Quoted text (possibly UTF-16LE encoded via `wide`)
    Text,
    /// Hex byte sequence
    Bytes,
}

/// A string pattern in a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pattern {
    /// Pattern identifier including the sigil (e.g. "$a")
    pub id: String,
    /// Pattern kind
    pub kind: PatternKind,
    /// Bytes to search for
    pub value: Vec<u8>,
    /// ASCII case folding on both sides when matching
    pub case_insensitive: bool,
    /// Required start offset, if anchored
    pub anchor: Option<usize>,
}

impl Pattern {
    /// Create a case-sensitive text pattern.
    pub fn text(id: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: PatternKind::Text,
            value: text.as_bytes().to_vec(),
            case_insensitive: false,
            anchor: None,
        }
    }

    /// Create a byte pattern.
    pub fn bytes(id: &str, bytes: &[u8]) -> Self {
        Self {
            id: id.to_string(),
            kind: PatternKind::Bytes,
            value: bytes.to_vec(),
            case_insensitive: false,
            anchor: None,
        }
    }

    /// Make the pattern case-insensitive.
    pub fn nocase(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// Anchor the pattern at a fixed offset.
    pub fn at(mut self, offset: usize) -> Self {
        self.anchor = Some(offset);
        self
    }

    /// The bytes to compare against the (possibly folded) target.
    pub fn needle(&self) -> Cow<'_, [u8]> {
        if self.case_insensitive {
            Cow::Owned(self.value.to_ascii_lowercase())
        } else {
            Cow::Borrowed(&self.value)
        }
    }
}

/// Boolean expression over pattern identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// The named pattern fired
    Ref(String),
    /// Any pattern whose id starts with the prefix fired
    GroupAny(String),
    /// At least `n` patterns whose id starts with the prefix fired
    GroupCount(String, usize),
    /// Logical AND
    And(Box<Condition>, Box<Condition>),
    /// Logical OR
    Or(Box<Condition>, Box<Condition>),
    /// Logical NOT
    Not(Box<Condition>),
}

impl Condition {
    /// Evaluate against the set of fired pattern ids.
    pub fn evaluate(&self, fired: &BTreeSet<String>) -> bool {
        match self {
            Condition::Ref(id) => fired.contains(id),
            Condition::GroupAny(prefix) => fired.iter().any(|id| id.starts_with(prefix.as_str())),
            Condition::GroupCount(prefix, n) => {
                fired
                    .iter()
                    .filter(|id| id.starts_with(prefix.as_str()))
                    .count()
                    >= *n
            }
            Condition::And(a, b) => a.evaluate(fired) && b.evaluate(fired),
            Condition::Or(a, b) => a.evaluate(fired) || b.evaluate(fired),
            Condition::Not(c) => !c.evaluate(fired),
        }
    }

    /// Combine conditions with AND, left to right.
    pub fn all(mut conditions: Vec<Condition>) -> Option<Condition> {
        let first = if conditions.is_empty() {
            return None;
        } else {
            conditions.remove(0)
        };
        Some(
            conditions
                .into_iter()
                .fold(first, |acc, c| Condition::And(Box::new(acc), Box::new(c))),
        )
    }

    /// Combine conditions with OR, left to right.
    pub fn any(mut conditions: Vec<Condition>) -> Option<Condition> {
        let first = if conditions.is_empty() {
            return None;
        } else {
            conditions.remove(0)
        };
        Some(
            conditions
                .into_iter()
                .fold(first, |acc, c| Condition::Or(Box::new(acc), Box::new(c))),
        )
    }
}

/// A YARA-like detection rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    /// Rule name
    pub name: String,
    /// Tags listed after the rule name
    pub tags: Vec<String>,
    /// Free-form metadata
    pub meta: BTreeMap<String, String>,
    /// String patterns, in declaration order
    pub patterns: Vec<Pattern>,
    /// Condition for matching
    pub condition: Condition,
}

impl Rule {
    /// Rule description, if present.
    pub fn description(&self) -> Option<&str> {
        self.meta.get("description").map(String::as_str)
    }

    /// Severity metadata, if present.
    pub fn severity(&self) -> Option<&str> {
        self.meta.get("severity").map(String::as_str)
    }

    /// Category metadata, if present.
    pub fn category(&self) -> Option<&str> {
        self.meta.get("category").map(String::as_str)
    }

    /// Look up a pattern by id.
    pub fn pattern(&self, id: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.id == id)
    }
}

/// Insertion-ordered, name-unique collection of rules.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    /// Loaded rules
    rules: Vec<Arc<Rule>>,
    /// Rules indexed by name
    rules_by_name: HashMap<String, usize>,
}

impl RuleCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog, rejecting duplicate names.
    pub fn from_rules(rules: Vec<Rule>) -> Result<Self, ParseError> {
        let mut catalog = Self::new();
        for rule in rules {
            if catalog.rules_by_name.contains_key(&rule.name) {
                return Err(ParseError::DuplicateRuleName(rule.name));
            }
            catalog.push(Arc::new(rule));
        }
        Ok(catalog)
    }

    fn push(&mut self, rule: Arc<Rule>) {
        self.rules_by_name.insert(rule.name.clone(), self.rules.len());
        self.rules.push(rule);
    }

    /// New catalog holding these rules followed by `incoming`.
    ///
    /// A rule in `incoming` whose name is already present replaces the old
    /// one and takes its position at the end.
    pub fn merged_with(&self, incoming: &RuleCatalog) -> RuleCatalog {
        let mut merged = RuleCatalog::new();
        for rule in &self.rules {
            if !incoming.contains(&rule.name) {
                merged.push(Arc::clone(rule));
            }
        }
        for rule in &incoming.rules {
            merged.push(Arc::clone(rule));
        }
        merged
    }

    /// Get the number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check whether the catalog holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check whether a rule with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.rules_by_name.contains_key(name)
    }

    /// Get a rule by name.
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules_by_name
            .get(name)
            .and_then(|&idx| self.rules.get(idx))
            .map(Arc::as_ref)
    }

    /// Iterate rules in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(Arc::as_ref)
    }

    /// All rule names in catalog order.
    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fired(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn rule(name: &str) -> Rule {
        Rule {
            name: name.to_string(),
            tags: Vec::new(),
            meta: BTreeMap::new(),
            patterns: vec![Pattern::text("$a", "x")],
            condition: Condition::Ref("$a".to_string()),
        }
    }

    #[test]
    fn test_condition_ref_and_not() {
        let cond = Condition::Not(Box::new(Condition::Ref("$a".to_string())));
        assert!(cond.evaluate(&fired(&[])));
        assert!(!cond.evaluate(&fired(&["$a"])));
    }

    #[test]
    fn test_condition_group_count() {
        let cond = Condition::GroupCount("$p".to_string(), 2);
        assert!(!cond.evaluate(&fired(&[])));
        assert!(!cond.evaluate(&fired(&["$p1"])));
        assert!(cond.evaluate(&fired(&["$p1", "$p3"])));
        assert!(cond.evaluate(&fired(&["$p1", "$p2", "$p3"])));
        assert!(!cond.evaluate(&fired(&["$p1", "$q2"])));
    }

    #[test]
    fn test_condition_group_any() {
        let cond = Condition::GroupAny("$fake".to_string());
        assert!(cond.evaluate(&fired(&["$fake2"])));
        assert!(!cond.evaluate(&fired(&["$whatsapp1"])));
    }

    #[test]
    fn test_condition_combinators() {
        let cond = Condition::all(vec![
            Condition::Ref("$a".to_string()),
            Condition::any(vec![
                Condition::Ref("$b".to_string()),
                Condition::Ref("$c".to_string()),
            ])
            .unwrap(),
        ])
        .unwrap();
        assert!(cond.evaluate(&fired(&["$a", "$c"])));
        assert!(!cond.evaluate(&fired(&["$a"])));
        assert!(!cond.evaluate(&fired(&["$b", "$c"])));
        assert!(Condition::all(Vec::new()).is_none());
    }

    #[test]
    fn test_nocase_needle() {
        let pattern = Pattern::text("$a", "MiXeD").nocase();
        assert_eq!(pattern.needle().as_ref(), b"mixed");
        let pattern = Pattern::text("$a", "MiXeD");
        assert_eq!(pattern.needle().as_ref(), b"MiXeD");
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let err = RuleCatalog::from_rules(vec![rule("A"), rule("B"), rule("A")]).unwrap_err();
        assert_eq!(err, ParseError::DuplicateRuleName("A".to_string()));
    }

    #[test]
    fn test_catalog_merge_order() {
        let base = RuleCatalog::from_rules(vec![rule("A"), rule("B"), rule("C")]).unwrap();
        let incoming = RuleCatalog::from_rules(vec![rule("D"), rule("A")]).unwrap();

        let merged = base.merged_with(&incoming);
        assert_eq!(merged.names(), vec!["B", "C", "D", "A"]);
        assert_eq!(merged.len(), 4);
        assert!(merged.get("A").is_some());
        // Source catalogs are untouched
        assert_eq!(base.names(), vec!["A", "B", "C"]);
    }
}
