//! The restricted YAML-like dialect used to persist constraint rules.
//!
//! Grammar (indentation-based, spaces only):
//!
//! ```text
//! document := block
//! block    := map | list
//! map      := (KEY ":" [scalar] NEWLINE [block at deeper indent])+
//! list     := ("-" [scalar | map-entry] NEWLINE [block at deeper indent])+
//! scalar   := JSON string | JSON array | JSON object | front-matter scalar
//! ```
//!
//! The emitter writes every string as a JSON-quoted scalar so regex
//! backslashes and quotes survive unchanged; the parser also accepts bare and
//! single-quoted scalars for hand-edited files.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::frontmatter::coerce_value;
use crate::models::{ConstraintRules, RequiredField};

const INDENT: &str = "  ";

// =============================================================================
// EMITTER
// =============================================================================

/// Render rules in the persisted dialect. Empty rules render as an empty string.
pub fn emit_rules(rules: &ConstraintRules) -> String {
    let mut out = String::new();

    if let Some(frontmatter) = &rules.frontmatter {
        match &frontmatter.required_fields {
            None => out.push_str("frontmatter: {}\n"),
            Some(fields) if fields.is_empty() => {
                out.push_str("frontmatter:\n");
                out.push_str(&format!("{INDENT}required_fields: []\n"));
            }
            Some(fields) => {
                out.push_str("frontmatter:\n");
                out.push_str(&format!("{INDENT}required_fields:\n"));
                for field in fields {
                    emit_field(field, &mut out);
                }
            }
        }
    }

    if let Some(filename) = &rules.filename {
        match &filename.pattern {
            None => out.push_str("filename: {}\n"),
            Some(pattern) => {
                out.push_str("filename:\n");
                out.push_str(&format!("{INDENT}pattern: {}\n", quote(pattern)));
            }
        }
    }

    if let Some(content) = &rules.content {
        let mut lines = Vec::new();
        if let Some(min) = content.min_length {
            lines.push(format!("{INDENT}min_length: {min}"));
        }
        if let Some(max) = content.max_length {
            lines.push(format!("{INDENT}max_length: {max}"));
        }
        if let Some(sections) = &content.required_sections {
            let sections: Vec<Value> = sections.iter().cloned().map(Value::String).collect();
            lines.push(format!(
                "{INDENT}required_sections: {}",
                Value::Array(sections)
            ));
        }
        if lines.is_empty() {
            out.push_str("content: {}\n");
        } else {
            out.push_str("content:\n");
            for line in lines {
                out.push_str(&line);
                out.push('\n');
            }
        }
    }

    out
}

fn emit_field(field: &RequiredField, out: &mut String) {
    let item = INDENT.repeat(2);
    let body = INDENT.repeat(3);
    out.push_str(&format!("{item}- name: {}\n", quote(&field.name)));
    out.push_str(&format!("{body}type: {}\n", quote(field.field_type.as_str())));
    if let Some(pattern) = &field.pattern {
        out.push_str(&format!("{body}pattern: {}\n", quote(pattern)));
    }
    if let Some(values) = &field.allowed_values {
        out.push_str(&format!(
            "{body}allowed_values: {}\n",
            Value::Array(values.clone())
        ));
    }
}

fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

// =============================================================================
// PARSER
// =============================================================================

#[derive(Debug, Clone)]
struct Line {
    number: usize,
    indent: usize,
    text: String,
}

impl Line {
    fn is_list_item(&self) -> bool {
        self.text == "-" || self.text.starts_with("- ")
    }
}

#[derive(Debug)]
enum Node {
    Scalar(Value),
    Map(Vec<(String, Node)>),
    List(Vec<Node>),
}

impl Node {
    fn into_value(self) -> Value {
        match self {
            Node::Scalar(value) => value,
            Node::Map(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.into_value()))
                    .collect::<Map<_, _>>(),
            ),
            Node::List(items) => Value::Array(items.into_iter().map(Node::into_value).collect()),
        }
    }
}

/// Parse a rules block into untyped JSON. An empty block is an empty object.
pub fn parse_rules_block(text: &str) -> Result<Value> {
    let mut lines = tokenize(text);
    if lines.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let mut pos = 0;
    let indent = lines[0].indent;
    let node = parse_node(&mut lines, &mut pos, indent)?;
    if let Some(line) = lines.get(pos) {
        return Err(syntax_error(line, "unexpected indentation"));
    }
    Ok(node.into_value())
}

fn tokenize(text: &str) -> Vec<Line> {
    text.lines()
        .enumerate()
        .filter_map(|(i, raw)| {
            let raw = raw.trim_end();
            let text = raw.trim_start();
            if text.is_empty() || text.starts_with('#') {
                return None;
            }
            Some(Line {
                number: i + 1,
                indent: raw.len() - text.len(),
                text: text.to_string(),
            })
        })
        .collect()
}

fn parse_node(lines: &mut [Line], pos: &mut usize, indent: usize) -> Result<Node> {
    if lines[*pos].is_list_item() {
        parse_list(lines, pos, indent)
    } else {
        parse_map(lines, pos, indent)
    }
}

fn parse_map(lines: &mut [Line], pos: &mut usize, indent: usize) -> Result<Node> {
    let mut entries = Vec::new();

    while let Some(line) = lines.get(*pos) {
        if line.indent < indent {
            break;
        }
        if line.indent > indent {
            return Err(syntax_error(line, "unexpected indentation"));
        }
        if line.is_list_item() {
            return Err(syntax_error(line, "list item where a key was expected"));
        }
        let Some((key, value)) = split_entry(&line.text) else {
            return Err(syntax_error(line, "expected `key: value`"));
        };
        let (key, value) = (key.to_string(), value.to_string());
        *pos += 1;

        let child = if value.is_empty() {
            match lines.get(*pos) {
                Some(next)
                    if next.indent > indent || (next.indent == indent && next.is_list_item()) =>
                {
                    let child_indent = next.indent;
                    parse_node(lines, pos, child_indent)?
                }
                _ => Node::Scalar(Value::Null),
            }
        } else {
            Node::Scalar(parse_scalar(&value))
        };
        entries.push((key, child));
    }

    Ok(Node::Map(entries))
}

fn parse_list(lines: &mut [Line], pos: &mut usize, indent: usize) -> Result<Node> {
    let mut items = Vec::new();

    while let Some(line) = lines.get(*pos) {
        if line.indent < indent || !line.is_list_item() {
            break;
        }
        if line.indent > indent {
            return Err(syntax_error(line, "unexpected indentation"));
        }

        let rest = line.text[1..].trim_start().to_string();
        let dash_width = line.text.len() - rest.len();

        if rest.is_empty() {
            *pos += 1;
            let child = match lines.get(*pos) {
                Some(next) if next.indent > indent => {
                    let child_indent = next.indent;
                    parse_node(lines, pos, child_indent)?
                }
                _ => Node::Scalar(Value::Null),
            };
            items.push(child);
        } else if split_entry(&rest).is_some() {
            // `- key: value` opens a map whose keys align with `key`.
            let item_indent = indent + dash_width;
            lines[*pos].indent = item_indent;
            lines[*pos].text = rest;
            items.push(parse_map(lines, pos, item_indent)?);
        } else {
            *pos += 1;
            items.push(Node::Scalar(parse_scalar(&rest)));
        }
    }

    Ok(Node::List(items))
}

/// Split `key: value` when `text` is a mapping entry rather than a scalar.
fn split_entry(text: &str) -> Option<(&str, &str)> {
    let (key, value) = text.split_once(':')?;
    let is_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !is_key || !(value.is_empty() || value.starts_with(' ')) {
        return None;
    }
    Some((key, value.trim()))
}

fn parse_scalar(text: &str) -> Value {
    if text.starts_with('"') || text.starts_with('[') || text.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<Value>(text) {
            return value;
        }
    }
    coerce_value(text)
}

fn syntax_error(line: &Line, message: &str) -> Error {
    Error::Serialization(format!(
        "rules block line {}: {message}: `{}`",
        line.number, line.text
    ))
}
