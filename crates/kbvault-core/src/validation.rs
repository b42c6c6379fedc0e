//! Folder constraint evaluation.
//!
//! [`validate`] is pure: it never touches storage and never fails. Every rule
//! is checked independently and all violations are collected, so a caller can
//! report every problem with a note at once.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::trace;

use crate::frontmatter::{self, type_name};
use crate::models::{
    ContentRules, FieldType, FolderConstraint, IssueKind, ParsedNote, RequiredField,
    ValidationIssue, ValidationResult,
};
use crate::paths::file_name;

static DATE_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}").expect("valid date regex"));

/// Validate `content`, to be stored at `path`, against `constraint`.
pub fn validate(path: &str, content: &str, constraint: &FolderConstraint) -> ValidationResult {
    let note = frontmatter::parse(content);
    let filename = file_name(path);
    let rules = &constraint.rules;
    let mut issues = Vec::new();

    if let Some(fields) = rules
        .frontmatter
        .as_ref()
        .and_then(|f| f.required_fields.as_ref())
    {
        for field in fields {
            check_field(&note, field, &mut issues);
        }
    }

    if let Some(pattern) = rules.filename.as_ref().and_then(|f| f.pattern.as_deref()) {
        check_filename(filename, pattern, &mut issues);
    }

    if let Some(content_rules) = &rules.content {
        check_content(&note.body, content_rules, &mut issues);
    }

    trace!(
        note_path = %path,
        subfolder = %constraint.subfolder,
        issue_count = issues.len(),
        "validated note against folder constraint"
    );
    ValidationResult::from_issues(issues)
}

fn check_field(note: &ParsedNote, field: &RequiredField, issues: &mut Vec<ValidationIssue>) {
    let key = format!("frontmatter.{}", field.name);

    let value = match note.frontmatter.get(&field.name) {
        None | Some(Value::Null) => {
            issues.push(
                ValidationIssue::new(key, IssueKind::MissingRequiredField)
                    .expected(field.field_type.as_str())
                    .message(format!("Required field '{}' is missing", field.name)),
            );
            return;
        }
        Some(value) => value,
    };

    if !matches_type(value, field.field_type) {
        let actual = type_name(value);
        issues.push(
            ValidationIssue::new(key, IssueKind::InvalidFieldType)
                .expected(field.field_type.as_str())
                .actual(actual)
                .message(format!(
                    "Field '{}' should be {} but is {}",
                    field.name,
                    field.field_type.as_str(),
                    actual
                )),
        );
        return;
    }

    if let (Some(pattern), Value::String(s)) = (field.pattern.as_deref(), value) {
        // An uncompilable field pattern is skipped rather than reported.
        if let Ok(re) = Regex::new(pattern) {
            if !re.is_match(s) {
                issues.push(
                    ValidationIssue::new(key.clone(), IssueKind::PatternMismatch)
                        .pattern(pattern)
                        .actual(s.as_str())
                        .message(format!(
                            "Field '{}' does not match pattern {}",
                            field.name, pattern
                        )),
                );
            }
        }
    }

    if let Some(allowed) = field.allowed_values.as_ref().filter(|a| !a.is_empty()) {
        if !allowed.iter().any(|candidate| scalar_eq(candidate, value)) {
            issues.push(
                ValidationIssue::new(key, IssueKind::InvalidValue)
                    .expected(Value::Array(allowed.clone()))
                    .actual(value.clone())
                    .message(format!(
                        "Field '{}' must be one of the allowed values",
                        field.name
                    )),
            );
        }
    }
}

fn matches_type(value: &Value, field_type: FieldType) -> bool {
    match field_type {
        FieldType::String => value.is_string(),
        FieldType::Number => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Array => value.is_array(),
        FieldType::Date => value.as_str().is_some_and(|s| DATE_PREFIX_RE.is_match(s)),
    }
}

/// Equality where numbers compare by value, so `1` equals `1.0`.
fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn check_filename(filename: &str, pattern: &str, issues: &mut Vec<ValidationIssue>) {
    let Ok(re) = Regex::new(pattern) else {
        return;
    };
    if !re.is_match(filename) {
        issues.push(
            ValidationIssue::new("filename", IssueKind::PatternMismatch)
                .pattern(pattern)
                .actual(filename)
                .message(format!("Filename '{filename}' does not match pattern {pattern}")),
        );
    }
}

fn check_content(body: &str, rules: &ContentRules, issues: &mut Vec<ValidationIssue>) {
    let length = body.chars().count() as u64;

    if let Some(min) = rules.min_length {
        if length < min {
            issues.push(
                ValidationIssue::new("content", IssueKind::ContentTooShort)
                    .expected(min)
                    .actual(length)
                    .message(format!("Content is {length} characters, minimum is {min}")),
            );
        }
    }

    if let Some(max) = rules.max_length {
        if length > max {
            issues.push(
                ValidationIssue::new("content", IssueKind::ContentTooLong)
                    .expected(max)
                    .actual(length)
                    .message(format!("Content is {length} characters, maximum is {max}")),
            );
        }
    }

    for section in rules.required_sections.iter().flatten() {
        if !has_section(body, section) {
            issues.push(
                ValidationIssue::new("content.sections", IssueKind::MissingSection)
                    .expected(section.as_str())
                    .message(format!("Missing required section '{section}'")),
            );
        }
    }
}

/// Whether `body` has a heading of any depth titled `section`.
pub fn has_section(body: &str, section: &str) -> bool {
    let pattern = format!(r"^#+\s+{}\s*$", regex::escape(section));
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .map(|re| re.is_match(body))
        .unwrap_or(false)
}
