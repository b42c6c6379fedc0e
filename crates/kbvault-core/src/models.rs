//! Data models for knowledge bases, folder constraints, and validation results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::defaults;

// =============================================================================
// KNOWLEDGE BASES
// =============================================================================

/// A named collection of notes owning an exclusive vault subfolder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub name: String,
    pub create_time: DateTime<Utc>,
    pub description: String,
    /// Normalized vault-relative folder (no leading/trailing slash).
    pub subfolder: String,
    /// Free-text guidance for agents organizing notes in this knowledge base.
    pub organization_rules: String,
}

impl KnowledgeBase {
    /// Build the denormalized list-cache row for this knowledge base.
    pub fn summary(&self) -> KnowledgeBaseSummary {
        KnowledgeBaseSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            subfolder: self.subfolder.clone(),
            create_time: self.create_time,
            organization_rules_preview: preview(
                &self.organization_rules,
                defaults::RULES_PREVIEW_LENGTH,
            ),
        }
    }
}

/// Listing row for a knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBaseSummary {
    pub name: String,
    pub description: String,
    pub subfolder: String,
    pub create_time: DateTime<Utc>,
    /// First characters of the organization rules, `...` appended when cut.
    #[serde(default)]
    pub organization_rules_preview: String,
}

/// Truncate `text` to at most `max_chars` characters, marking truncation.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.char_indices();
    match chars.nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

// =============================================================================
// FOLDER CONSTRAINTS
// =============================================================================

/// Machine-checkable rules bound to one subfolder of a knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderConstraint {
    pub kb_name: String,
    pub subfolder: String,
    pub rules: ConstraintRules,
}

/// The three independent optional rule groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontmatter: Option<FrontmatterRules>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<FilenameRules>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontmatterRules {
    /// Checked independently; order is kept for round-tripping only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_fields: Option<Vec<RequiredField>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,
}

impl RequiredField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            pattern: None,
            allowed_values: None,
        }
    }
}

/// Declared type of a required front-matter field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    /// A string starting with `YYYY-MM-DD`.
    Date,
    Array,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Array => "array",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(FieldType::String),
            "number" => Some(FieldType::Number),
            "boolean" => Some(FieldType::Boolean),
            "date" => Some(FieldType::Date),
            "array" => Some(FieldType::Array),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilenameRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// Rules measured against the note body (content after the front matter).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_sections: Option<Vec<String>>,
}

// =============================================================================
// VALIDATION RESULTS
// =============================================================================

/// Kind of rule a note failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingRequiredField,
    InvalidFieldType,
    PatternMismatch,
    InvalidValue,
    ContentTooShort,
    ContentTooLong,
    MissingSection,
}

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path of what failed, e.g. `frontmatter.title` or `filename`.
    pub field: String,
    pub error: IssueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, error: IssueKind) -> Self {
        Self {
            field: field.into(),
            error,
            expected: None,
            actual: None,
            pattern: None,
            message: None,
        }
    }

    pub fn expected(mut self, expected: impl Into<Value>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn actual(mut self, actual: impl Into<Value>) -> Self {
        self.actual = Some(actual.into());
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Outcome of evaluating a note against a folder constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        Self {
            passed: issues.is_empty(),
            issues,
        }
    }

    pub fn pass() -> Self {
        Self::from_issues(Vec::new())
    }
}

// =============================================================================
// NOTES
// =============================================================================

/// A note split into its front matter and body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedNote {
    pub frontmatter: BTreeMap<String, Value>,
    /// Content after the front-matter block, or the whole text without one.
    pub body: String,
    pub raw: String,
}

/// A note as returned by a read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteContent {
    /// Vault-relative path.
    pub path: String,
    pub content: String,
    pub frontmatter: BTreeMap<String, Value>,
    pub body: String,
}

/// Result of a mutating note operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteWriteOutcome {
    /// Vault-relative path that was written.
    pub path: String,
    /// Subfolder of the constraint that was applied, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint_subfolder: Option<String>,
    /// Result the content passed; `None` when the note is unconstrained.
    pub validation: Option<ValidationResult>,
}
