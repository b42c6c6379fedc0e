//! Front-matter parsing for notes.
//!
//! Only the restricted subset of YAML that notes in a vault actually use is
//! understood: flat `key: value` pairs, inline `[a, b]` arrays, and block
//! arrays written as `- item` lines under a key with an empty value.
//!
//! Parsing never fails. A document whose header is not a well-delimited
//! `---` block is returned with an empty front matter and the whole text as
//! its body.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};

use crate::models::ParsedNote;

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[0-9]+(\.[0-9]+)?$").expect("valid number regex"));

const DELIMITER: &str = "---";

/// Split a document into front matter, body, and raw text.
pub fn parse(text: &str) -> ParsedNote {
    match split_block(text) {
        Some((block, body)) => ParsedNote {
            frontmatter: parse_block(&block),
            body: body.to_string(),
            raw: text.to_string(),
        },
        None => ParsedNote {
            frontmatter: BTreeMap::new(),
            body: text.to_string(),
            raw: text.to_string(),
        },
    }
}

/// Locate the front-matter block.
///
/// Returns the block lines (line endings stripped) and the body slice that
/// follows the first closing delimiter.
fn split_block(text: &str) -> Option<(Vec<&str>, &str)> {
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if strip_line_ending(first) != DELIMITER {
        return None;
    }

    let mut offset = first.len();
    let mut block = Vec::new();
    for line in lines {
        offset += line.len();
        let content = strip_line_ending(line);
        if content == DELIMITER {
            return Some((block, &text[offset..]));
        }
        block.push(content);
    }
    None
}

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

fn parse_block(lines: &[&str]) -> BTreeMap<String, Value> {
    let mut map = BTreeMap::new();
    // Key whose value may still be extended by `- item` lines.
    let mut open_list: Option<String> = None;

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(item) = list_item(trimmed) {
            if let Some(key) = &open_list {
                let entry = map.entry(key.clone()).or_insert(Value::Null);
                match entry {
                    Value::Array(items) => items.push(coerce_value(item)),
                    other => *other = Value::Array(vec![coerce_value(item)]),
                }
            }
            continue;
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            open_list = None;
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            open_list = None;
            continue;
        }

        let value = value.trim();
        if value.is_empty() {
            map.insert(key.to_string(), Value::Null);
            open_list = Some(key.to_string());
        } else if value == "[]" {
            map.insert(key.to_string(), Value::Array(Vec::new()));
            open_list = Some(key.to_string());
        } else {
            map.insert(key.to_string(), coerce_value(value));
            open_list = None;
        }
    }

    map
}

fn list_item(line: &str) -> Option<&str> {
    if line == "-" {
        return Some("");
    }
    line.strip_prefix("- ").map(str::trim)
}

/// Coerce a raw scalar or inline-array value.
///
/// Priority: quoted string, boolean, null, inline array, number, plain string.
pub fn coerce_value(raw: &str) -> Value {
    let value = raw.trim();

    if let Some(inner) = strip_matching_quotes(value) {
        return Value::String(inner.to_string());
    }
    match value {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" | "~" => return Value::Null,
        _ => {}
    }
    if value.len() >= 2 && value.starts_with('[') && value.ends_with(']') {
        let inner = &value[1..value.len() - 1];
        if inner.trim().is_empty() {
            return Value::Array(Vec::new());
        }
        return Value::Array(
            split_top_level(inner)
                .into_iter()
                .map(coerce_value)
                .collect(),
        );
    }
    if let Some(number) = parse_number(value) {
        return number;
    }
    Value::String(value.to_string())
}

fn strip_matching_quotes(value: &str) -> Option<&str> {
    if value.len() < 2 {
        return None;
    }
    let first = value.as_bytes()[0];
    let last = value.as_bytes()[value.len() - 1];
    if first == last && (first == b'"' || first == b'\'') {
        Some(&value[1..value.len() - 1])
    } else {
        None
    }
}

fn parse_number(value: &str) -> Option<Value> {
    if !NUMBER_RE.is_match(value) {
        return None;
    }
    if !value.contains('.') {
        if let Ok(n) = value.parse::<i64>() {
            return Some(Value::Number(n.into()));
        }
        if let Ok(n) = value.parse::<u64>() {
            return Some(Value::Number(n.into()));
        }
    }
    value
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Split on commas that are not inside quotes or nested brackets.
fn split_top_level(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in inner.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '[' => depth += 1,
                ']' => depth -= 1,
                ',' if depth == 0 => {
                    parts.push(&inner[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(&inner[start..]);
    parts
}

/// Runtime type name of a front-matter value, as reported in issues.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
