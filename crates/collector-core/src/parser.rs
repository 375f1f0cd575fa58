//! `.col` text to [`Configuration`] parser
//!
//! The grammar is line oriented. `VERSION`, `SOURCE`, `TRANSFORM` and
//! `OUTPUT` lines start a new unit; every other line is a detail of the most
//! recent unit. The one multi-line construct is the `OPTIONS { ... }` block
//! of an output, which is consumed by a sub-parser advancing the shared
//! [`LineCursor`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::config::{Configuration, Details, OutputSpec, SourceSpec};
use crate::error::ParseError;
use crate::transforms::{CoercionKind, Rule, TransformSpec};

static QUOTED_DETAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^(\w+)\s+"([^"]*)"$"#).expect("valid regex"));

static BARE_DETAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\s+(\S+)$").expect("valid regex"));

const TOP_LEVEL_KEYWORDS: [&str; 4] = ["VERSION", "SOURCE", "TRANSFORM", "OUTPUT"];

/// Parse configuration text
///
/// # Example
///
/// ```rust,ignore
/// let config = collector_core::parser::parse("VERSION 1.0\nSOURCE a TYPE csv\n")?;
/// assert_eq!(config.sources.len(), 1);
/// ```
pub fn parse(text: &str) -> Result<Configuration, ParseError> {
    let mut cursor = LineCursor::new(text);
    let mut parser = Parser::default();
    while let Some((line_no, line)) = cursor.next_line() {
        parser.parse_line(line_no, line, &mut cursor)?;
    }
    Ok(parser.config)
}

/// Reader over the significant lines of a configuration.
///
/// Blank lines and comments are skipped; each returned line is trimmed and
/// has any trailing comment removed. Sub-parsers take `&mut LineCursor` and
/// advance it as far as they need before handing it back.
#[derive(Debug)]
pub struct LineCursor<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> LineCursor<'a> {
    /// Create a cursor at the first line
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            pos: 0,
        }
    }

    /// Advance to the next significant line, returning its 1-based number
    pub fn next_line(&mut self) -> Option<(usize, &'a str)> {
        while self.pos < self.lines.len() {
            let line_no = self.pos + 1;
            let line = strip_comment(self.lines[self.pos]).trim();
            self.pos += 1;
            if !line.is_empty() {
                return Some((line_no, line));
            }
        }
        None
    }
}

/// Cut a `#` comment that starts the line or follows whitespace, outside quotes
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    let mut prev_is_space = true;
    for (idx, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes && prev_is_space => return &line[..idx],
            _ => {}
        }
        prev_is_space = ch.is_whitespace();
    }
    line
}

fn is_top_level(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|kw| TOP_LEVEL_KEYWORDS.contains(&kw))
}

/// The unit that detail lines attach to
#[derive(Debug, Clone, Copy, Default)]
enum Active {
    #[default]
    None,
    Source(usize),
    Transform(usize),
    Output,
}

#[derive(Debug, Default)]
struct Parser {
    config: Configuration,
    active: Active,
}

impl Parser {
    fn parse_line(
        &mut self,
        line_no: usize,
        line: &str,
        cursor: &mut LineCursor<'_>,
    ) -> Result<(), ParseError> {
        let mut tokens = line.split_whitespace();
        match tokens.next().unwrap_or_default() {
            "VERSION" => {
                let version = tokens
                    .next()
                    .ok_or_else(|| ParseError::new(line_no, line, "expected `VERSION <X.Y>`"))?;
                self.config.version = Some(version.to_string());
                self.active = Active::None;
            }
            "SOURCE" => {
                let (name, source_type) = positional(tokens, "TYPE").ok_or_else(|| {
                    ParseError::new(line_no, line, "expected `SOURCE <name> TYPE <type>`")
                })?;
                self.config.sources.push(SourceSpec::new(name, source_type));
                self.active = Active::Source(self.config.sources.len() - 1);
            }
            "TRANSFORM" => {
                let (target, source) = positional(tokens, "FROM").ok_or_else(|| {
                    ParseError::new(line_no, line, "expected `TRANSFORM <target> FROM <source>`")
                })?;
                self.config
                    .transforms
                    .push(TransformSpec::new(target, source));
                self.active = Active::Transform(self.config.transforms.len() - 1);
            }
            "OUTPUT" => {
                let (name, output_type) = positional(tokens, "TYPE").ok_or_else(|| {
                    ParseError::new(line_no, line, "expected `OUTPUT <name> TYPE <type>`")
                })?;
                if self.config.output.is_some() {
                    tracing::warn!(line = line_no, "second OUTPUT block replaces the first");
                }
                self.config.output = Some(OutputSpec::new(name, output_type));
                self.active = Active::Output;
            }
            _ => self.parse_nested(line_no, line, cursor)?,
        }
        Ok(())
    }

    fn parse_nested(
        &mut self,
        line_no: usize,
        line: &str,
        cursor: &mut LineCursor<'_>,
    ) -> Result<(), ParseError> {
        match self.active {
            Active::None => {
                tracing::debug!(line = line_no, text = line, "detail line outside any block");
            }
            Active::Source(idx) => {
                if let Some((key, value)) = parse_detail(line_no, line) {
                    self.config.sources[idx].details.insert(key, value);
                }
            }
            Active::Transform(idx) => {
                if let Some(rule) = parse_rule(line_no, line)? {
                    self.config.transforms[idx].rules.push(rule);
                }
            }
            Active::Output => {
                let Some(output) = self.config.output.as_mut() else {
                    return Ok(());
                };
                if line == "OPTIONS" || line == "OPTIONS {" {
                    let options = parse_options_block(cursor, line_no, line)?;
                    let slot = output
                        .details
                        .entry("options")
                        .or_insert_with(|| Value::Object(Details::new()));
                    match slot {
                        Value::Object(existing) => existing.extend(options),
                        other => *other = Value::Object(options),
                    }
                } else if let Some((key, value)) = parse_detail(line_no, line) {
                    output.details.insert(key, value);
                }
            }
        }
        Ok(())
    }
}

/// Read `<a> KEYWORD <b>` from the tokens following a top-level keyword
fn positional<'a>(
    mut tokens: impl Iterator<Item = &'a str>,
    keyword: &str,
) -> Option<(&'a str, &'a str)> {
    let first = tokens.next()?;
    if tokens.next()? != keyword {
        return None;
    }
    let second = tokens.next()?;
    Some((first, second))
}

/// Parse `KEY "value"` or `KEY token`, lowercasing the key
fn parse_detail(line_no: usize, line: &str) -> Option<(String, Value)> {
    if let Some(caps) = QUOTED_DETAIL.captures(line) {
        return Some((caps[1].to_lowercase(), Value::String(caps[2].to_string())));
    }
    if let Some(caps) = BARE_DETAIL.captures(line) {
        return Some((caps[1].to_lowercase(), bare_value(&caps[2])));
    }
    tracing::debug!(line = line_no, text = line, "skipping unrecognized detail line");
    None
}

/// All-digit tokens become integers, everything else stays a string
fn bare_value(token: &str) -> Value {
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = token.parse::<i64>() {
            return Value::from(n);
        }
    }
    Value::String(token.to_string())
}

/// Parse a single quoted or bare value
fn parse_value(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        let inner = &raw[1..raw.len() - 1];
        if !inner.contains('"') {
            return Some(Value::String(inner.to_string()));
        }
    }
    if raw.is_empty() || raw.contains(char::is_whitespace) || raw.contains('"') {
        return None;
    }
    Some(bare_value(raw))
}

/// Parse a rule declaration inside a TRANSFORM block
fn parse_rule(line_no: usize, line: &str) -> Result<Option<Rule>, ParseError> {
    let (keyword, rest) = match line.split_once(char::is_whitespace) {
        Some((kw, rest)) => (kw, rest.trim()),
        None => (line, ""),
    };

    match keyword.to_uppercase().as_str() {
        "TYPE" => {
            let (kind, format) = match rest.split_once(char::is_whitespace) {
                Some((kind, format)) => (kind, Some(format)),
                None => (rest, None),
            };
            if kind.is_empty() {
                return Err(ParseError::new(
                    line_no,
                    line,
                    "expected `TYPE <int|float|string|date> [\"<format>\"]`",
                ));
            }
            let kind: CoercionKind = kind
                .parse()
                .map_err(|msg: String| ParseError::new(line_no, line, msg))?;
            let format = match format {
                Some(raw) => match parse_value(raw) {
                    Some(Value::String(s)) => Some(s),
                    Some(other) => Some(other.to_string()),
                    None => {
                        return Err(ParseError::new(line_no, line, "malformed format string"));
                    }
                },
                None => None,
            };
            Ok(Some(Rule::Coerce { kind, format }))
        }
        "DEFAULT" => {
            let value = parse_value(rest).ok_or_else(|| {
                ParseError::new(line_no, line, "expected `DEFAULT \"<value>\"` or `DEFAULT <value>`")
            })?;
            Ok(Some(Rule::Default { value }))
        }
        "RENAME" => {
            let new_name = match rest {
                "" => None,
                raw => match parse_value(raw) {
                    Some(Value::String(s)) if !s.is_empty() => Some(s),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    _ => {
                        return Err(ParseError::new(line_no, line, "expected `RENAME [<new-name>]`"));
                    }
                },
            };
            Ok(Some(Rule::Rename { new_name }))
        }
        _ => {
            tracing::debug!(line = line_no, text = line, "skipping unrecognized rule line");
            Ok(None)
        }
    }
}

/// Consume lines up to the closing `}` of an `OPTIONS` block
fn parse_options_block(
    cursor: &mut LineCursor<'_>,
    opened_at: usize,
    opening_line: &str,
) -> Result<Details, ParseError> {
    let unterminated =
        || ParseError::new(opened_at, opening_line, "OPTIONS block is missing its closing `}`");

    let mut options = Details::new();
    while let Some((line_no, line)) = cursor.next_line() {
        if line == "}" {
            return Ok(options);
        }
        if is_top_level(line) {
            return Err(unterminated());
        }
        if let Some((key, value)) = parse_detail(line_no, line) {
            options.insert(key, value);
        }
    }
    Err(unterminated())
}
