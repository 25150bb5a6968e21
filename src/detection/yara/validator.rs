//! Syntactic sanity checks on raw rule-set text.
//!
//! Validation runs before parsing and never looks inside individual rules;
//! whether a condition actually parses is the parser's job.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::error::ValidationError;

/// Generic `rule <identifier> [: tags] { ... }` shape, case-insensitive, spanning lines.
static RULE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)rule\s+\w+(\s*:[\w\s]*)?\s*\{.*?\}")
        .expect("rule block pattern is a valid regex")
});

/// Validate a rule-set blob.
///
/// Checks run in this order:
/// 1. the blob is non-empty after trimming
/// 2. `{` and `}` counts are equal
/// 3. at least one `rule <name> { ... }` block is present
/// 4. the literal tokens `rule` and `condition:` are present
pub fn validate(blob: &str) -> Result<(), ValidationError> {
    if blob.trim().is_empty() {
        return Err(ValidationError::EmptyInput);
    }

    let open = blob.matches('{').count();
    let close = blob.matches('}').count();
    if open != close {
        return Err(ValidationError::UnbalancedBraces { open, close });
    }

    if !RULE_BLOCK.is_match(blob) {
        return Err(ValidationError::NoRuleFound);
    }

    if !blob.contains("rule") {
        return Err(ValidationError::MissingSection("rule"));
    }
    if !blob.contains("condition:") {
        return Err(ValidationError::MissingSection("condition:"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_blob() {
        let blob = r#"
            rule Demo {
                strings:
                    $a = "hello"
                condition:
                    $a
            }
        "#;
        assert_eq!(validate(blob), Ok(()));
    }

    #[test]
    fn test_tagged_rules_accepted() {
        let blob = r#"
            rule Tagged : android banking {
                strings:
                    $a = "hello"
                condition:
                    $a
            }
        "#;
        assert_eq!(validate(blob), Ok(()));
        assert_eq!(validate("rule T:x { condition: $a }"), Ok(()));
        assert_eq!(
            validate(crate::detection::yara::defaults::DEFAULT_RULES),
            Ok(())
        );
    }

    #[test]
    fn test_empty_blob() {
        assert_eq!(validate(""), Err(ValidationError::EmptyInput));
        assert_eq!(validate("  \n\t "), Err(ValidationError::EmptyInput));
    }

    #[test]
    fn test_no_rule_block() {
        assert_eq!(
            validate("condition: $a"),
            Err(ValidationError::NoRuleFound)
        );
        assert_eq!(
            validate("rule { condition: true }"),
            Err(ValidationError::NoRuleFound)
        );
    }

    #[test]
    fn test_missing_condition() {
        let blob = r#"rule Demo { strings: $a = "x" }"#;
        assert_eq!(
            validate(blob),
            Err(ValidationError::MissingSection("condition:"))
        );
    }

    #[test]
    fn test_uppercase_keyword_lacks_rule_token() {
        let blob = "RULE Demo { condition: $a }";
        assert_eq!(validate(blob), Err(ValidationError::MissingSection("rule")));
    }

    #[test]
    fn test_unbalanced_braces_always_reported() {
        let cases = [
            "rule A { condition: $a",
            "rule A { strings: $h = { 4D 5A } condition: $h",
            "}}} no rules here {",
            "{",
            "rule A { condition: $a } }",
        ];
        for blob in cases {
            assert!(
                matches!(validate(blob), Err(ValidationError::UnbalancedBraces { .. })),
                "expected unbalanced braces for {:?}",
                blob
            );
        }

        assert_eq!(
            validate("rule A { { condition: $a }"),
            Err(ValidationError::UnbalancedBraces { open: 2, close: 1 })
        );
    }
}
