//! Recursive-descent parser for rule conditions.
//!
//! Grammar:
//!
//! ```text
//! or      := and ("or" and)*
//! and     := unary ("and" unary)*
//! unary   := "not" unary | primary
//! primary := "(" or ")" | $id ["at" INT] | quant "of" set
//! quant   := INT | "any" | "all"
//! set     := "them" | "(" item ("," item)* ")"
//! item    := $id | $prefix*
//! ```
//!
//! Every reference is resolved against the rule's declared patterns while
//! parsing, so a parsed condition never names a pattern that does not exist.
//! Conditions are capped in length and nesting so the resulting tree stays
//! shallow enough to evaluate and drop recursively.

use super::rules::{Condition, Pattern};
use crate::core::error::ParseError;

/// Maximum number of tokens in one condition.
pub const MAX_CONDITION_TOKENS: usize = 4096;

/// Maximum depth of parentheses and `not` prefixes.
pub const MAX_CONDITION_NESTING: usize = 64;

/// A parsed condition plus the anchors it requested via `$id at N`.
#[derive(Debug)]
pub struct ParsedCondition {
    pub condition: Condition,
    pub anchors: Vec<(String, usize)>,
}

/// Parse condition text for `rule`, resolving references against `patterns`.
pub fn parse_condition(
    rule: &str,
    text: &str,
    patterns: &[Pattern],
) -> Result<ParsedCondition, ParseError> {
    let tokens = tokenize(rule, text)?;
    if tokens.is_empty() {
        return Err(invalid(rule, "empty condition"));
    }

    let mut parser = ConditionParser {
        rule,
        tokens,
        pos: 0,
        depth: 0,
        patterns,
        anchors: Vec::new(),
    };

    let condition = parser.parse_or()?;
    if let Some(token) = parser.tokens.get(parser.pos) {
        return Err(invalid(rule, &format!("unexpected {}", token)));
    }

    Ok(ParsedCondition {
        condition,
        anchors: parser.anchors,
    })
}

fn invalid(rule: &str, reason: &str) -> ParseError {
    ParseError::InvalidCondition {
        rule: rule.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    Comma,
    Int(usize),
    /// `$name`
    Id(String),
    /// `$prefix*`, stored without the star
    Wildcard(String),
    Word(String),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Comma => write!(f, "','"),
            Token::Int(n) => write!(f, "'{}'", n),
            Token::Id(id) => write!(f, "'{}'", id),
            Token::Wildcard(prefix) => write!(f, "'{}*'", prefix),
            Token::Word(word) => write!(f, "'{}'", word),
        }
    }
}

fn tokenize(rule: &str, text: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let take_word = |start: usize| -> usize {
        let mut end = start;
        while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
            end += 1;
        }
        end
    };

    while i < chars.len() {
        if tokens.len() >= MAX_CONDITION_TOKENS {
            return Err(invalid(
                rule,
                &format!("condition longer than {} tokens", MAX_CONDITION_TOKENS),
            ));
        }

        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '$' => {
                let end = take_word(i + 1);
                let id: String = chars[i..end].iter().collect();
                if chars.get(end) == Some(&'*') {
                    tokens.push(Token::Wildcard(id));
                    i = end + 1;
                } else if end == i + 1 {
                    return Err(invalid(rule, "anonymous '$' reference"));
                } else {
                    tokens.push(Token::Id(id));
                    i = end;
                }
            }
            c if c.is_ascii_digit() => {
                let end = take_word(i);
                let literal: String = chars[i..end].iter().collect();
                let value = match literal.strip_prefix("0x") {
                    Some(hex) if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) => {
                        usize::from_str_radix(hex, 16).ok()
                    }
                    Some(_) => None,
                    None => literal.parse::<usize>().ok(),
                };
                let value = value
                    .ok_or_else(|| invalid(rule, &format!("invalid number '{}'", literal)))?;
                tokens.push(Token::Int(value));
                i = end;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let end = take_word(i);
                tokens.push(Token::Word(chars[i..end].iter().collect()));
                i = end;
            }
            other => {
                return Err(invalid(rule, &format!("unsupported character '{}'", other)));
            }
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, Copy)]
enum Quantifier {
    Any,
    All,
    Count(usize),
}

#[derive(Debug)]
enum SetItem {
    Id(String),
    /// Prefix plus the text to show if nothing matches it
    Prefix(String, String),
}

struct ConditionParser<'p> {
    rule: &'p str,
    tokens: Vec<Token>,
    pos: usize,
    /// Current parenthesis / `not` depth
    depth: usize,
    patterns: &'p [Pattern],
    anchors: Vec<(String, usize)>,
}

impl ConditionParser<'_> {
    fn error(&self, reason: &str) -> ParseError {
        invalid(self.rule, reason)
    }

    fn unknown(&self, reference: &str) -> ParseError {
        ParseError::UnknownPatternReference {
            rule: self.rule.to_string(),
            reference: reference.to_string(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Word(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(self.error(&format!("expected {}, found {}", expected, token))),
            None => Err(self.error(&format!("expected {}, found end of condition", expected))),
        }
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_CONDITION_NESTING {
            return Err(self.error(&format!(
                "nesting deeper than {} levels",
                MAX_CONDITION_NESTING
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_or(&mut self) -> Result<Condition, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat_word("or") {
            let right = self.parse_and()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Condition, ParseError> {
        let mut left = self.parse_unary()?;
        while self.eat_word("and") {
            let right = self.parse_unary()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Condition, ParseError> {
        if self.eat_word("not") {
            let inner = self.nested(Self::parse_unary)?;
            return Ok(Condition::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Condition, ParseError> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.nested(Self::parse_or)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Id(id)) => {
                self.resolve_id(&id)?;
                if self.eat_word("at") {
                    match self.next() {
                        Some(Token::Int(offset)) => self.anchors.push((id.clone(), offset)),
                        _ => return Err(self.error("'at' needs an integer offset")),
                    }
                }
                Ok(Condition::Ref(id))
            }
            Some(Token::Int(n)) => self.parse_of(Quantifier::Count(n)),
            Some(Token::Word(w)) if w == "any" => self.parse_of(Quantifier::Any),
            Some(Token::Word(w)) if w == "all" => self.parse_of(Quantifier::All),
            Some(Token::Wildcard(prefix)) => Err(self.error(&format!(
                "'{}*' can only be used inside an 'of' set",
                prefix
            ))),
            Some(token) => Err(self.error(&format!("unexpected {}", token))),
            None => Err(self.error("unexpected end of condition")),
        }
    }

    fn parse_of(&mut self, quantifier: Quantifier) -> Result<Condition, ParseError> {
        if !self.eat_word("of") {
            return Err(self.error("expected 'of' after quantifier"));
        }

        let items = self.parse_set()?;
        for item in &items {
            match item {
                SetItem::Id(id) => self.resolve_id(id)?,
                SetItem::Prefix(prefix, label) => {
                    if self.prefix_count(prefix) == 0 {
                        return Err(self.unknown(label));
                    }
                }
            }
        }

        if let Quantifier::Count(0) = quantifier {
            return Err(self.error("'0 of' can never be satisfied"));
        }

        if let [item] = items.as_slice() {
            return match (quantifier, item) {
                (Quantifier::Count(n), SetItem::Id(_)) if n > 1 => Err(self.error(&format!(
                    "'{} of' a single pattern can never be satisfied",
                    n
                ))),
                (_, SetItem::Id(id)) => Ok(Condition::Ref(id.clone())),
                (Quantifier::Any, SetItem::Prefix(prefix, _)) => {
                    Ok(Condition::GroupAny(prefix.clone()))
                }
                (Quantifier::All, SetItem::Prefix(prefix, _)) => Ok(Condition::GroupCount(
                    prefix.clone(),
                    self.prefix_count(prefix),
                )),
                (Quantifier::Count(n), SetItem::Prefix(prefix, label)) => {
                    let available = self.prefix_count(prefix);
                    if n > available {
                        Err(self.error(&format!(
                            "'{} of {}' but only {} pattern(s) match",
                            n, label, available
                        )))
                    } else {
                        Ok(Condition::GroupCount(prefix.clone(), n))
                    }
                }
            };
        }

        let combined = match quantifier {
            Quantifier::Any | Quantifier::Count(1) => Condition::any(
                items
                    .iter()
                    .map(|item| match item {
                        SetItem::Id(id) => Condition::Ref(id.clone()),
                        SetItem::Prefix(prefix, _) => Condition::GroupAny(prefix.clone()),
                    })
                    .collect(),
            ),
            Quantifier::All => Condition::all(
                items
                    .iter()
                    .map(|item| match item {
                        SetItem::Id(id) => Condition::Ref(id.clone()),
                        SetItem::Prefix(prefix, _) => {
                            Condition::GroupCount(prefix.clone(), self.prefix_count(prefix))
                        }
                    })
                    .collect(),
            ),
            Quantifier::Count(n) => {
                return Err(self.error(&format!(
                    "'{} of' an explicit list is not supported; use any, all or 1",
                    n
                )))
            }
        };

        combined.ok_or_else(|| self.error("empty pattern set"))
    }

    fn parse_set(&mut self) -> Result<Vec<SetItem>, ParseError> {
        if self.eat_word("them") {
            return Ok(vec![SetItem::Prefix("$".to_string(), "them".to_string())]);
        }

        self.expect(Token::LParen)?;
        let mut items = Vec::new();
        loop {
            match self.next() {
                Some(Token::Id(id)) => items.push(SetItem::Id(id)),
                Some(Token::Wildcard(prefix)) => {
                    let label = format!("{}*", prefix);
                    items.push(SetItem::Prefix(prefix, label));
                }
                Some(token) => {
                    return Err(self.error(&format!("unexpected {} in pattern set", token)))
                }
                None => return Err(self.error("unterminated pattern set")),
            }

            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                Some(token) => {
                    return Err(self.error(&format!("unexpected {} in pattern set", token)))
                }
                None => return Err(self.error("unterminated pattern set")),
            }
        }

        Ok(items)
    }

    fn resolve_id(&self, id: &str) -> Result<(), ParseError> {
        if self.patterns.iter().any(|p| p.id == id) {
            Ok(())
        } else {
            Err(self.unknown(id))
        }
    }

    fn prefix_count(&self, prefix: &str) -> usize {
        self.patterns
            .iter()
            .filter(|p| p.id.starts_with(prefix))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(ids: &[&str]) -> Vec<Pattern> {
        ids.iter().map(|id| Pattern::text(id, "x")).collect()
    }

    fn parse(text: &str, ids: &[&str]) -> Result<ParsedCondition, ParseError> {
        parse_condition("Test", text, &patterns(ids))
    }

    fn reference(id: &str) -> Box<Condition> {
        Box::new(Condition::Ref(id.to_string()))
    }

    #[test]
    fn test_long_chain_rejected() {
        let chain = vec!["$a"; 100_000].join(" or ");
        let err = parse(&chain, &["$a"]).unwrap_err();
        assert!(matches!(err, ParseError::InvalidCondition { .. }));

        let short = vec!["$a"; 500].join(" and ");
        assert!(parse(&short, &["$a"]).is_ok());
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let deep = format!("{}$a{}", "(".repeat(1_000), ")".repeat(1_000));
        assert!(matches!(
            parse(&deep, &["$a"]),
            Err(ParseError::InvalidCondition { .. })
        ));

        let nots = format!("{}$a", "not ".repeat(1_000));
        assert!(matches!(
            parse(&nots, &["$a"]),
            Err(ParseError::InvalidCondition { .. })
        ));

        let ok = format!(
            "{}$a{}",
            "(".repeat(MAX_CONDITION_NESTING),
            ")".repeat(MAX_CONDITION_NESTING)
        );
        assert!(parse(&ok, &["$a"]).is_ok());
    }

    #[test]
    fn test_precedence() {
        let parsed = parse("$a or $b and not $c", &["$a", "$b", "$c"]).unwrap();
        assert_eq!(
            parsed.condition,
            Condition::Or(
                reference("$a"),
                Box::new(Condition::And(
                    reference("$b"),
                    Box::new(Condition::Not(reference("$c")))
                ))
            )
        );
    }

    #[test]
    fn test_parentheses() {
        let parsed = parse("$a and ($b or $c)", &["$a", "$b", "$c"]).unwrap();
        assert_eq!(
            parsed.condition,
            Condition::And(
                reference("$a"),
                Box::new(Condition::Or(reference("$b"), reference("$c")))
            )
        );
    }

    #[test]
    fn test_group_forms() {
        let ids = ["$p1", "$p2", "$p3", "$q"];
        assert_eq!(
            parse("2 of ($p*)", &ids).unwrap().condition,
            Condition::GroupCount("$p".to_string(), 2)
        );
        assert_eq!(
            parse("any of ($p*)", &ids).unwrap().condition,
            Condition::GroupAny("$p".to_string())
        );
        assert_eq!(
            parse("all of ($p*)", &ids).unwrap().condition,
            Condition::GroupCount("$p".to_string(), 3)
        );
        assert_eq!(
            parse("all of them", &ids).unwrap().condition,
            Condition::GroupCount("$".to_string(), 4)
        );
        assert_eq!(
            parse("1 of them", &ids).unwrap().condition,
            Condition::GroupCount("$".to_string(), 1)
        );
    }

    #[test]
    fn test_explicit_lists() {
        let ids = ["$a", "$b", "$p1", "$p2"];
        assert_eq!(
            parse("any of ($a, $b)", &ids).unwrap().condition,
            Condition::Or(reference("$a"), reference("$b"))
        );
        assert_eq!(
            parse("all of ($a, $p*)", &ids).unwrap().condition,
            Condition::And(
                reference("$a"),
                Box::new(Condition::GroupCount("$p".to_string(), 2))
            )
        );
        assert_eq!(
            parse("any of ($a)", &ids).unwrap().condition,
            Condition::Ref("$a".to_string())
        );
        assert!(matches!(
            parse("2 of ($a, $b)", &ids),
            Err(ParseError::InvalidCondition { .. })
        ));
    }

    #[test]
    fn test_anchor_recorded() {
        let parsed = parse("$mz at 0 and $b", &["$mz", "$b"]).unwrap();
        assert_eq!(parsed.anchors, vec![("$mz".to_string(), 0)]);
        assert_eq!(
            parsed.condition,
            Condition::And(reference("$mz"), reference("$b"))
        );

        let parsed = parse("$mz at 0x10", &["$mz"]).unwrap();
        assert_eq!(parsed.anchors, vec![("$mz".to_string(), 16)]);
    }

    #[test]
    fn test_hex_offset_digits() {
        assert!(parse("$mz at 0x1F", &["$mz"]).is_ok());
        for text in ["$mz at 0x+10", "$mz at 0x", "$mz at 0xZ1"] {
            assert!(
                matches!(parse(text, &["$mz"]), Err(ParseError::InvalidCondition { .. })),
                "expected failure for {:?}",
                text
            );
        }
    }

    #[test]
    fn test_unknown_references() {
        let err = parse("$a and $missing", &["$a"]).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownPatternReference {
                rule: "Test".to_string(),
                reference: "$missing".to_string()
            }
        );

        let err = parse("any of ($zz*)", &["$a"]).unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnknownPatternReference { ref reference, .. } if reference == "$zz*"
        ));

        let err = parse("any of them", &[]).unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnknownPatternReference { ref reference, .. } if reference == "them"
        ));
    }

    #[test]
    fn test_count_bounds() {
        let ids = ["$p1", "$p2"];
        assert!(parse("3 of ($p*)", &ids).is_err());
        assert!(parse("0 of ($p*)", &ids).is_err());
        assert!(parse("2 of ($p1)", &ids).is_err());
        assert!(parse("2 of ($p*)", &ids).is_ok());
    }

    #[test]
    fn test_malformed() {
        let ids = ["$a", "$b"];
        for text in [
            "",
            "$a and",
            "($a or $b",
            "$a $b",
            "any ($a)",
            "$a at",
            "#a > 2",
            "filesize < 100",
            "$a*",
            "any of ($a $b)",
        ] {
            assert!(parse(text, &ids).is_err(), "expected failure for {:?}", text);
        }
    }
}
