//! Rule-set text parser.
//!
//! Splits a validated blob into `rule` blocks by tracking brace depth (quote
//! aware, so `{ 4D 5A }` byte literals and `"}"` strings never close a rule
//! early), then parses each block's `meta:`, `strings:` and `condition:`
//! sections. Any failing rule fails the whole blob.

use std::collections::BTreeMap;

use super::condition;
use super::rules::{Pattern, PatternKind, Rule, RuleCatalog};
use crate::core::error::ParseError;

/// Parse a rule-set blob into a catalog.
pub fn parse(blob: &str) -> Result<RuleCatalog, ParseError> {
    let source = strip_comments(blob);
    let blocks = split_rules(&source)?;
    if blocks.is_empty() {
        return Err(ParseError::NoRules);
    }

    let mut rules = Vec::with_capacity(blocks.len());
    for block in blocks {
        rules.push(parse_rule(&block)?);
    }

    RuleCatalog::from_rules(rules)
}

/// Check whether a string is a valid rule name or tag.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Index just past the closing quote of the string starting at `start`.
fn skip_quoted(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Remove `//` and `/* */` comments that are not inside quoted strings.
fn strip_comments(blob: &str) -> String {
    let bytes = blob.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let end = skip_quoted(bytes, i).min(bytes.len());
                out.extend_from_slice(&bytes[i..end]);
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !bytes[i..].starts_with(b"*/") {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
                out.push(b' ');
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// A `rule` block before its contents are interpreted.
#[derive(Debug)]
struct RawRule<'a> {
    header: &'a str,
    body: &'a str,
}

impl RawRule<'_> {
    fn name(&self) -> &str {
        self.header.split(':').next().unwrap_or("").trim()
    }
}

/// Position of the brace closing the one at `open`.
fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i = skip_quoted(bytes, i);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn split_rules(source: &str) -> Result<Vec<RawRule<'_>>, ParseError> {
    let bytes = source.as_bytes();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'"' {
            i = skip_quoted(bytes, i);
            continue;
        }

        let at_keyword = bytes[i..].starts_with(b"rule")
            && (i == 0 || !is_ident_byte(bytes[i - 1]))
            && bytes.get(i + 4).map_or(false, |b| b.is_ascii_whitespace());
        if !at_keyword {
            i += 1;
            continue;
        }

        let header_start = i + 4;
        let open = match bytes[header_start..].iter().position(|&b| b == b'{') {
            Some(offset) => header_start + offset,
            None => {
                let name = source[header_start..]
                    .split_whitespace()
                    .next()
                    .unwrap_or("");
                return Err(ParseError::UnterminatedRule(name.to_string()));
            }
        };

        let header = &source[header_start..open];
        let close = matching_brace(bytes, open).ok_or_else(|| {
            ParseError::UnterminatedRule(RawRule { header, body: "" }.name().to_string())
        })?;

        blocks.push(RawRule {
            header,
            body: &source[open + 1..close],
        });
        i = close + 1;
    }

    Ok(blocks)
}

fn parse_rule(raw: &RawRule<'_>) -> Result<Rule, ParseError> {
    let (name, tags) = parse_header(raw.header)?;
    let sections = split_sections(&name, raw.body)?;

    let mut meta = BTreeMap::new();
    for text in &sections.meta {
        parse_meta(&name, text, &mut meta)?;
    }

    let mut patterns: Vec<Pattern> = Vec::new();
    for text in &sections.strings {
        parse_strings(&name, text, &mut patterns)?;
    }

    let condition_text = match sections.condition.as_slice() {
        [] => return Err(ParseError::MissingCondition(name)),
        [text] => *text,
        _ => {
            return Err(ParseError::InvalidCondition {
                rule: name,
                reason: "more than one condition section".to_string(),
            })
        }
    };

    let parsed = condition::parse_condition(&name, condition_text, &patterns)?;
    for (id, offset) in parsed.anchors {
        if let Some(pattern) = patterns.iter_mut().find(|p| p.id == id) {
            match pattern.anchor {
                Some(existing) if existing != offset => {
                    return Err(ParseError::ConflictingAnchor { rule: name, id });
                }
                _ => pattern.anchor = Some(offset),
            }
        }
    }

    Ok(Rule {
        name,
        tags,
        meta,
        patterns,
        condition: parsed.condition,
    })
}

fn parse_header(header: &str) -> Result<(String, Vec<String>), ParseError> {
    let (name, tags) = match header.split_once(':') {
        Some((name, tags)) => (name.trim(), Some(tags)),
        None => (header.trim(), None),
    };

    if !is_identifier(name) {
        return Err(ParseError::InvalidRuleName(name.to_string()));
    }

    let tags: Vec<String> = tags
        .map(|t| t.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    if (tags.is_empty() && header.contains(':')) || tags.iter().any(|t| !is_identifier(t)) {
        return Err(ParseError::InvalidRuleName(header.trim().to_string()));
    }

    Ok((name.to_string(), tags))
}

#[derive(Debug, Default)]
struct Sections<'a> {
    meta: Vec<&'a str>,
    strings: Vec<&'a str>,
    condition: Vec<&'a str>,
}

#[derive(Debug, Clone, Copy)]
enum Section {
    Meta,
    Strings,
    Condition,
}

const SECTION_LABELS: &[(&str, Section)] = &[
    ("meta:", Section::Meta),
    ("strings:", Section::Strings),
    ("condition:", Section::Condition),
];

fn split_sections<'a>(rule: &str, body: &'a str) -> Result<Sections<'a>, ParseError> {
    let bytes = body.as_bytes();
    // (section, label start, content start)
    let mut labels: Vec<(Section, usize, usize)> = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i = skip_quoted(bytes, i);
                continue;
            }
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            _ if depth == 0 && (i == 0 || !is_ident_byte(bytes[i - 1])) => {
                if let Some((label, section)) = SECTION_LABELS
                    .iter()
                    .find(|(label, _)| bytes[i..].starts_with(label.as_bytes()))
                {
                    labels.push((*section, i, i + label.len()));
                    i += label.len();
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    let leading = &body[..labels.first().map_or(body.len(), |l| l.1)];
    if !leading.trim().is_empty() {
        return Err(ParseError::InvalidCondition {
            rule: rule.to_string(),
            reason: format!("unexpected text outside a section: '{}'", leading.trim()),
        });
    }

    let mut sections = Sections::default();
    for (idx, &(section, _, start)) in labels.iter().enumerate() {
        let end = labels.get(idx + 1).map_or(body.len(), |next| next.1);
        let text = &body[start..end];
        match section {
            Section::Meta => sections.meta.push(text),
            Section::Strings => sections.strings.push(text),
            Section::Condition => sections.condition.push(text),
        }
    }

    Ok(sections)
}

/// Byte cursor over a section's text.
struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    fn skip_ws(&mut self) {
        while self.peek().map_or(false, |b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes().get(self.pos).copied()
    }

    fn eat(&mut self, b: u8) -> bool {
        self.skip_ws();
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let start = self.pos;
        match self.peek() {
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => self.pos += 1,
            _ => return None,
        }
        while self.peek().map_or(false, is_ident_byte) {
            self.pos += 1;
        }
        Some(&self.src[start..self.pos])
    }

    /// Decimal or `0x` hex integer, optionally negative.
    fn integer(&mut self) -> Option<i64> {
        self.skip_ws();
        let start = self.pos;
        let negative = self.peek() == Some(b'-');
        if negative {
            self.pos += 1;
        }
        let digits_start = self.pos;
        while self.peek().map_or(false, is_ident_byte) {
            self.pos += 1;
        }
        let digits = &self.src[digits_start..self.pos];
        let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            Some(hex) if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
                i64::from_str_radix(hex, 16).ok()
            }
            Some(_) => None,
            None => digits.parse::<i64>().ok(),
        };
        match value {
            Some(v) => Some(if negative { -v } else { v }),
            None => {
                self.pos = start;
                None
            }
        }
    }

    /// Read a quoted string at the cursor, decoding escapes.
    fn quoted(&mut self) -> Result<Vec<u8>, String> {
        self.skip_ws();
        if self.peek() != Some(b'"') {
            return Err("expected a quoted string".to_string());
        }
        self.pos += 1;

        let mut out = Vec::new();
        loop {
            let b = self
                .peek()
                .ok_or_else(|| "unterminated string".to_string())?;
            self.pos += 1;
            match b {
                b'"' => return Ok(out),
                b'\\' => {
                    let esc = self
                        .peek()
                        .ok_or_else(|| "unterminated string".to_string())?;
                    self.pos += 1;
                    match esc {
                        b'"' => out.push(b'"'),
                        b'\\' => out.push(b'\\'),
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'x' => {
                            let hex = self
                                .src
                                .get(self.pos..self.pos + 2)
                                .ok_or_else(|| "truncated \\x escape".to_string())?;
                            let byte = Some(hex)
                                .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()))
                                .and_then(|h| u8::from_str_radix(h, 16).ok())
                                .ok_or_else(|| format!("invalid \\x escape '\\x{}'", hex))?;
                            out.push(byte);
                            self.pos += 2;
                        }
                        other => {
                            return Err(format!("unknown escape '\\{}'", other as char));
                        }
                    }
                }
                _ => out.push(b),
            }
        }
    }

    /// Text from `start` to the end of that line, for error messages.
    fn line_from(&self, start: usize) -> String {
        let rest = self.src.get(start..).unwrap_or("").trim_start();
        rest.lines().next().unwrap_or("").trim().to_string()
    }
}

fn parse_meta(
    rule: &str,
    text: &str,
    meta: &mut BTreeMap<String, String>,
) -> Result<(), ParseError> {
    let mut cur = Cursor::new(text);

    while !cur.at_end() {
        let start = cur.pos;
        let invalid = |cur: &Cursor<'_>| ParseError::InvalidMeta {
            rule: rule.to_string(),
            entry: cur.line_from(start),
        };

        let key = cur.ident().ok_or_else(|| invalid(&cur))?;
        if !cur.eat(b'=') {
            return Err(invalid(&cur));
        }

        cur.skip_ws();
        let value = match cur.peek() {
            Some(b'"') => {
                let bytes = cur.quoted().map_err(|_| invalid(&cur))?;
                String::from_utf8_lossy(&bytes).into_owned()
            }
            Some(b) if b == b'-' || b.is_ascii_digit() => {
                cur.integer().ok_or_else(|| invalid(&cur))?.to_string()
            }
            _ => match cur.ident() {
                Some(word @ ("true" | "false")) => word.to_string(),
                _ => return Err(invalid(&cur)),
            },
        };

        meta.insert(key.to_string(), value);
    }

    Ok(())
}

fn parse_strings(rule: &str, text: &str, patterns: &mut Vec<Pattern>) -> Result<(), ParseError> {
    let mut cur = Cursor::new(text);

    while !cur.at_end() {
        let start = cur.pos;
        if !cur.eat(b'$') {
            return Err(ParseError::InvalidPattern {
                rule: rule.to_string(),
                id: cur.line_from(start),
                reason: "expected a pattern identifier".to_string(),
            });
        }

        // Identifier must follow the sigil directly
        let name = match cur.peek() {
            Some(b) if is_ident_byte(b) => cur.ident().unwrap_or(""),
            _ => "",
        };
        let id = format!("${}", name);
        let invalid = |reason: &str| ParseError::InvalidPattern {
            rule: rule.to_string(),
            id: id.clone(),
            reason: reason.to_string(),
        };

        if name.is_empty() || !is_identifier(name) {
            return Err(invalid("anonymous or malformed identifier"));
        }
        if patterns.iter().any(|p| p.id == id) {
            return Err(ParseError::DuplicatePatternId {
                rule: rule.to_string(),
                id: id.clone(),
            });
        }
        if !cur.eat(b'=') {
            return Err(invalid("expected '=' after identifier"));
        }

        cur.skip_ws();
        let mut pattern = match cur.peek() {
            Some(b'"') => {
                let value = cur.quoted().map_err(|e| invalid(&e))?;
                if value.is_empty() {
                    return Err(invalid("empty text"));
                }
                Pattern {
                    id: id.clone(),
                    kind: PatternKind::Text,
                    value,
                    case_insensitive: false,
                    anchor: None,
                }
            }
            Some(b'{') => {
                cur.pos += 1;
                let rest = &text[cur.pos..];
                let end = rest.find('}').ok_or_else(|| invalid("unterminated hex string"))?;
                let value = decode_hex(&rest[..end]).map_err(|e| invalid(&e))?;
                cur.pos += end + 1;
                Pattern::bytes(&id, &value)
            }
            Some(b'/') => return Err(invalid("regular expressions are not supported")),
            _ => return Err(invalid("expected a quoted string or hex bytes")),
        };

        let mut wide = false;
        let mut ascii = false;
        loop {
            cur.skip_ws();
            match cur.peek() {
                None | Some(b'$') => break,
                _ => {}
            }
            let modifier = cur.ident().ok_or_else(|| invalid("unexpected text after pattern"))?;
            match (modifier, pattern.kind) {
                ("nocase", PatternKind::Text) => pattern.case_insensitive = true,
                ("ascii", PatternKind::Text) => ascii = true,
                ("wide", PatternKind::Text) => wide = true,
                ("at", _) => {
                    let offset = cur
                        .integer()
                        .and_then(|v| usize::try_from(v).ok())
                        .ok_or_else(|| invalid("'at' needs a non-negative offset"))?;
                    pattern.anchor = Some(offset);
                }
                (other, _) => {
                    return Err(invalid(&format!("unsupported modifier '{}'", other)));
                }
            }
        }

        if wide {
            if ascii {
                return Err(invalid("'ascii' and 'wide' together are not supported"));
            }
            pattern.value = widen(&pattern.value);
        }

        patterns.push(pattern);
    }

    Ok(())
}

/// UTF-16LE form of a `wide` string.
///
/// Text that is not valid UTF-8 (raw `\x` bytes) is widened byte by byte.
fn widen(value: &[u8]) -> Vec<u8> {
    match std::str::from_utf8(value) {
        Ok(text) => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
        Err(_) => value.iter().flat_map(|&b| u16::from(b).to_le_bytes()).collect(),
    }
}

/// Decode a hex string body such as `4D 5A 90 00`.
fn decode_hex(body: &str) -> Result<Vec<u8>, String> {
    let hex: String = body.split_whitespace().collect();
    if hex.is_empty() {
        return Err("empty hex string".to_string());
    }
    if hex.contains(|c: char| matches!(c, '?' | '[' | ']' | '(' | ')' | '|' | '-')) {
        return Err("wildcards, jumps and alternatives are not supported".to_string());
    }
    hex::decode(&hex).map_err(|e| format!("invalid hex: {}", e))
}
