//! Text documents persisted for knowledge bases and folder constraints.
//!
//! Knowledge base `meta.md`:
//!
//! ```text
//! ---
//! create_time: "2025-01-01T00:00:00Z"
//! description: "Team research notes"
//! subfolder: "research"
//! ---
//!
//! <organization rules, free text>
//! ```
//!
//! Folder constraint document:
//!
//! ````text
//! ---
//! subfolder: "research/papers"
//! ---
//!
//! ```yaml
//! <rules in the dialect of `rules_yaml`>
//! ```
//! ````

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::frontmatter;
use crate::models::{FolderConstraint, KnowledgeBase};
use crate::paths::normalize_path;
use crate::rules::rules_shape_from_json;
use crate::rules_yaml::{emit_rules, parse_rules_block};

const FENCE: &str = "```";

// =============================================================================
// KNOWLEDGE BASES
// =============================================================================

/// Render a knowledge base as its `meta.md` document.
pub fn serialize_knowledge_base(kb: &KnowledgeBase) -> String {
    let mut out = String::from("---\n");
    out.push_str(&format!(
        "create_time: {}\n",
        quote_header(&kb.create_time.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    ));
    out.push_str(&format!("description: {}\n", quote_header(&kb.description)));
    out.push_str(&format!("subfolder: {}\n", quote_header(&kb.subfolder)));
    out.push_str("---\n");

    let rules = kb.organization_rules.trim();
    if !rules.is_empty() {
        out.push('\n');
        out.push_str(rules);
        out.push('\n');
    }
    out
}

/// Parse a `meta.md` document. The name comes from the record's directory.
pub fn parse_knowledge_base(name: &str, text: &str) -> Result<KnowledgeBase> {
    let note = frontmatter::parse(text);

    let create_time = required_string(&note.frontmatter, "create_time", name)?;
    let create_time = DateTime::parse_from_rfc3339(&create_time)
        .map_err(|e| {
            Error::Serialization(format!(
                "knowledge base '{name}' has an invalid create_time: {e}"
            ))
        })?
        .with_timezone(&Utc);

    let subfolder = normalize_path(&required_string(&note.frontmatter, "subfolder", name)?);
    if subfolder.is_empty() {
        return Err(Error::Serialization(format!(
            "knowledge base '{name}' has an empty subfolder"
        )));
    }

    Ok(KnowledgeBase {
        name: name.to_string(),
        create_time,
        description: optional_string(&note.frontmatter, "description"),
        subfolder,
        organization_rules: note.body.trim().to_string(),
    })
}

// =============================================================================
// FOLDER CONSTRAINTS
// =============================================================================

/// Render a folder constraint document.
pub fn serialize_folder_constraint(constraint: &FolderConstraint) -> String {
    format!(
        "---\nsubfolder: {}\n---\n\n{FENCE}yaml\n{}{FENCE}\n",
        quote_header(&constraint.subfolder),
        emit_rules(&constraint.rules)
    )
}

/// Parse a folder constraint document owned by `kb_name`.
pub fn parse_folder_constraint(kb_name: &str, text: &str) -> Result<FolderConstraint> {
    let note = frontmatter::parse(text);
    let subfolder = normalize_path(&required_string(
        &note.frontmatter,
        "subfolder",
        kb_name,
    )?);

    let block = fenced_block(&note.body).ok_or_else(|| {
        Error::Serialization(format!(
            "folder constraint for '{subfolder}' has no fenced rules block"
        ))
    })?;
    let value = parse_rules_block(&block)?;
    let rules = rules_shape_from_json(&value)
        .map_err(|e| Error::Serialization(format!("folder constraint for '{subfolder}': {e}")))?;

    Ok(FolderConstraint {
        kb_name: kb_name.to_string(),
        subfolder,
        rules,
    })
}

/// Contents of the first fenced code block in `body`.
fn fenced_block(body: &str) -> Option<String> {
    let mut lines = body.lines();
    lines.by_ref().find(|line| line.trim_start().starts_with(FENCE))?;

    let mut block = String::new();
    for line in lines {
        if line.trim() == FENCE {
            return Some(block);
        }
        block.push_str(line);
        block.push('\n');
    }
    None
}

// =============================================================================
// HELPERS
// =============================================================================

/// Double-quote a header value. The front-matter parser strips the outer
/// quotes verbatim, so only line breaks need flattening.
fn quote_header(value: &str) -> String {
    let flat: String = value
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    format!("\"{flat}\"")
}

fn required_string(map: &BTreeMap<String, Value>, key: &str, owner: &str) -> Result<String> {
    match map.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(Error::Serialization(format!(
            "record '{owner}' is missing string field '{key}'"
        ))),
    }
}

fn optional_string(map: &BTreeMap<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
