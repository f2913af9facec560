use crate::lexer::{self, LexingError, Token};
use crate::model::Attributes;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// `<Tag>.<verb>(<arguments>)`
static DOTTED_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)\((.*)\)$")
        .expect("dotted call pattern is valid")
});

/// A console command after normalization.
///
/// `show User 1234` and `User.show("1234")` produce the same verb, tag and id,
/// so validation and dispatch never need to know which surface syntax was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub verb: String,
    pub tag: Option<String>,
    pub id: Option<String>,
    /// Everything after the id, e.g. attribute name and value for `update`.
    pub args: Vec<Token>,
}

/// Errors that can occur while turning a line into a [`Call`].
#[derive(Debug, PartialEq, Eq)]
pub enum ParsingError {
    /// The line holds no tokens at all.
    Empty,
    /// The line could not be tokenized.
    Lexing(LexingError),
}

impl From<LexingError> for ParsingError {
    fn from(e: LexingError) -> Self {
        ParsingError::Lexing(e)
    }
}

/// Parses one input line under either grammar:
///
/// * verb-first: `<verb> [tag] [id] [rest...]`
/// * dotted-call: `<tag>.<verb>(<argument-list>)`
pub fn parse_line(line: &str) -> Result<Call, ParsingError> {
    let line = line.trim();
    match DOTTED_CALL.captures(line) {
        Some(caps) => {
            let arguments = lexer::split_arguments(&caps[3])?;
            Ok(normalize(
                caps[2].to_string(),
                Some(caps[1].to_string()),
                arguments,
            ))
        }
        None => {
            let mut tokens = lexer::split_into_tokens(line)?.into_iter();
            let verb = tokens.next().ok_or(ParsingError::Empty)?;
            let tag = tokens.next().map(|t| t.text().to_string());
            Ok(normalize(verb.text().to_string(), tag, tokens.collect()))
        }
    }
}

fn normalize(verb: String, tag: Option<String>, rest: Vec<Token>) -> Call {
    let mut rest = rest.into_iter();
    let id = rest.next().map(|t| t.text().to_string());
    Call {
        verb,
        tag,
        id,
        args: rest.collect(),
    }
}

/// Interprets an attribute value token.
///
/// Quoted text is always a string. Anything else is read as a JSON literal
/// (number, boolean, null, list, object) when it parses, and kept as the
/// literal text otherwise. `True`, `False` and `None` are accepted too.
pub fn coerce_value(token: &Token) -> Value {
    match token {
        Token::Quoted(s) => Value::String(s.clone()),
        Token::Object(s) => parse_object_literal(s)
            .map(Value::Object)
            .unwrap_or_else(|_| Value::String(s.clone())),
        Token::Word(s) => match s.as_str() {
            "True" => Value::Bool(true),
            "False" => Value::Bool(false),
            "None" => Value::Null,
            _ => serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone())),
        },
    }
}

/// Parses an inline object literal such as `{"name": "Betty", "age": 30}`.
///
/// Single-quoted strings (`{'name': 'Betty'}`) are accepted as well.
pub fn parse_object_literal(raw: &str) -> Result<Attributes, serde_json::Error> {
    serde_json::from_str(raw).or_else(|e| {
        if raw.contains('\'') {
            serde_json::from_str(&normalize_quotes(raw))
        } else {
            Err(e)
        }
    })
}

/// Rewrites single-quoted strings as double-quoted JSON strings.
fn normalize_quotes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut quote: Option<char> = None;
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (None, '\'' | '"') => {
                quote = Some(ch);
                out.push('"');
            }
            (None, c) => out.push(c),
            (Some(q), '\\') => match chars.next() {
                Some('\'') if q == '\'' => out.push('\''),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            (Some(q), c) if c == q => {
                quote = None;
                out.push('"');
            }
            (Some('\''), '"') => out.push_str("\\\""),
            (Some(_), c) => out.push(c),
        }
    }
    out
}
