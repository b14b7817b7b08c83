//! Lenient parsing and variant-driven serialization for JSON-family documents.
//!
//! Parsing tries a JSON5 grammar first and strict JSON second. Serialization
//! always indents with two spaces; the [`Variant`] bound to a document decides
//! whether the output is strict JSON or JSON5.

use serde_json::{Map, Number, Value};
use thiserror::Error;
use tracing::debug;

/// Output flavour for a bound document, picked once from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Strict,
    LenientPreserving,
}

impl Variant {
    /// Returns `None` for files outside the JSON family.
    pub fn for_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();

        if lower.ends_with(".json5") || lower.ends_with(".jsonc") {
            Some(Self::LenientPreserving)
        } else if lower.ends_with(".json") {
            Some(Self::Strict)
        } else {
            None
        }
    }
}

pub fn is_json_file(name: &str) -> bool {
    Variant::for_file_name(name).is_some()
}

/// Both grammars rejected the text. The JSON5 message comes first since that
/// grammar is the more permissive one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid JSON5: {lenient}")]
pub struct ParseError {
    pub lenient: String,
    pub strict: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseStrategy {
    Lenient,
    Strict,
}

const PARSE_STRATEGIES: [ParseStrategy; 2] = [ParseStrategy::Lenient, ParseStrategy::Strict];

impl ParseStrategy {
    fn name(self) -> &'static str {
        match self {
            Self::Lenient => "json5",
            Self::Strict => "json",
        }
    }

    fn attempt(self, text: &str) -> Result<Value, String> {
        match self {
            Self::Lenient => json5::from_str::<Value>(text).map_err(|err| err.to_string()),
            Self::Strict => serde_json::from_str::<Value>(text).map_err(|err| err.to_string()),
        }
    }
}

pub fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Parses document text. Blank text is an empty object, not an error.
pub fn parse(text: &str) -> Result<Value, ParseError> {
    if text.trim().is_empty() {
        return Ok(empty_object());
    }

    let mut failure = ParseError {
        lenient: String::new(),
        strict: String::new(),
    };

    for strategy in PARSE_STRATEGIES {
        match strategy.attempt(text) {
            Ok(mut value) => {
                debug!(strategy = strategy.name(), "parsed document text");
                normalize_numbers(&mut value);
                return Ok(value);
            }
            Err(err) => {
                debug!(strategy = strategy.name(), %err, "parse strategy rejected text");
                match strategy {
                    ParseStrategy::Lenient => failure.lenient = err,
                    ParseStrategy::Strict => failure.strict = err,
                }
            }
        }
    }

    Err(failure)
}

/// Strict JSON only; the surface always emits standard JSON.
pub fn parse_strict(text: &str) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::from_str::<Value>(text)?;
    normalize_numbers(&mut value);
    Ok(value)
}

pub fn stringify(value: &Value, variant: Variant) -> String {
    match variant {
        Variant::Strict => format!("{value:#}"),
        Variant::LenientPreserving => {
            let mut out = String::new();
            write_json5(&mut out, value, 0);
            out
        }
    }
}

/// Comparison baseline shared by both sides of the channel.
pub fn canonical_text(value: &Value) -> String {
    stringify(value, Variant::Strict)
}

// Integral floats collapse to integers so `1.0` and `1` compare and print alike.
fn normalize_numbers(value: &mut Value) {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

    match value {
        Value::Number(number) if !number.is_i64() && !number.is_u64() => {
            if let Some(float) = number.as_f64()
                && float.fract() == 0.0
                && float.abs() <= MAX_SAFE_INTEGER
            {
                *number = Number::from(float as i64);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_numbers),
        Value::Object(map) => map.values_mut().for_each(normalize_numbers),
        _ => {}
    }
}

const QUOTED_KEYWORDS: [&str; 5] = ["null", "true", "false", "Infinity", "NaN"];

fn write_json5(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Number(number) => out.push_str(&number.to_string()),
        Value::String(text) => write_json5_string(out, text),
        Value::Array(items) if items.is_empty() => out.push_str("[]"),
        Value::Array(items) => {
            out.push_str("[\n");
            for item in items {
                push_indent(out, depth + 1);
                write_json5(out, item, depth + 1);
                out.push_str(",\n");
            }
            push_indent(out, depth);
            out.push(']');
        }
        Value::Object(map) if map.is_empty() => out.push_str("{}"),
        Value::Object(map) => {
            out.push_str("{\n");
            for (key, item) in map {
                push_indent(out, depth + 1);
                if is_bare_key(key) {
                    out.push_str(key);
                } else {
                    write_json5_string(out, key);
                }
                out.push_str(": ");
                write_json5(out, item, depth + 1);
                out.push_str(",\n");
            }
            push_indent(out, depth);
            out.push('}');
        }
    }
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn is_bare_key(key: &str) -> bool {
    let mut chars = key.chars();

    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }

    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '$')
        && !QUOTED_KEYWORDS.contains(&key)
}

fn write_json5_string(out: &mut String, text: &str) {
    let singles = text.matches('\'').count();
    let doubles = text.matches('"').count();
    let quote = if doubles < singles { '"' } else { '\'' };

    out.push(quote);

    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{b}' => out.push_str("\\v"),
            '\0' if chars.peek().is_some_and(char::is_ascii_digit) => out.push_str("\\u0000"),
            '\0' => out.push_str("\\0"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            ch if ch == quote => {
                out.push('\\');
                out.push(ch);
            }
            ch if (ch as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", ch as u32)),
            ch => out.push(ch),
        }
    }

    out.push(quote);
}
