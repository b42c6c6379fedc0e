//! Structural checking of constraint rules supplied as untyped JSON.
//!
//! Tool callers pass rules as arbitrary nested JSON. Everything is checked
//! here, before persistence, so the rest of the crate only ever sees a typed
//! [`ConstraintRules`].

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::frontmatter::type_name;
use crate::models::{
    ConstraintRules, ContentRules, FieldType, FilenameRules, FrontmatterRules, RequiredField,
};

/// Convert untyped rules into [`ConstraintRules`], rejecting malformed shapes
/// and uncompilable filename patterns.
pub fn rules_from_json(value: &Value) -> Result<ConstraintRules> {
    let rules = rules_shape_from_json(value)?;
    check_rules(&rules)?;
    Ok(rules)
}

/// Shape-only conversion, used when reloading persisted documents so a
/// hand-edited bad pattern does not hide the whole constraint.
pub fn rules_shape_from_json(value: &Value) -> Result<ConstraintRules> {
    let root = expect_object(value, "rules")?;

    Ok(ConstraintRules {
        frontmatter: optional_object(root, "frontmatter")?
            .map(frontmatter_rules)
            .transpose()?,
        filename: optional_object(root, "filename")?
            .map(filename_rules)
            .transpose()?,
        content: optional_object(root, "content")?
            .map(content_rules)
            .transpose()?,
    })
}

/// Checks that apply to typed rules as well: the filename pattern must compile.
///
/// Field patterns are deliberately not compiled here; an invalid field pattern
/// is skipped at evaluation time.
pub fn check_rules(rules: &ConstraintRules) -> Result<()> {
    if let Some(pattern) = rules.filename.as_ref().and_then(|f| f.pattern.as_deref()) {
        Regex::new(pattern).map_err(|e| {
            Error::SchemaValidationFailed(format!(
                "filename.pattern is not a valid regular expression: {e}"
            ))
        })?;
    }
    if let Some(fields) = rules
        .frontmatter
        .as_ref()
        .and_then(|f| f.required_fields.as_ref())
    {
        for field in fields {
            if field.name.trim().is_empty() {
                return Err(Error::SchemaValidationFailed(
                    "frontmatter.required_fields entries need a non-empty name".to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn frontmatter_rules(obj: &Map<String, Value>) -> Result<FrontmatterRules> {
    let required_fields = match obj.get("required_fields") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| required_field(i, item))
                .collect::<Result<Vec<_>>>()?,
        ),
        Some(other) => {
            return Err(Error::SchemaValidationFailed(format!(
                "frontmatter.required_fields must be an array, got {}",
                type_name(other)
            )))
        }
    };
    Ok(FrontmatterRules { required_fields })
}

fn required_field(index: usize, item: &Value) -> Result<RequiredField> {
    let ctx = format!("frontmatter.required_fields[{index}]");
    let obj = expect_object(item, &ctx)?;

    let name = match obj.get("name") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => {
            return Err(Error::SchemaValidationFailed(format!(
                "{ctx}.name must be a non-empty string"
            )))
        }
    };

    let field_type = match obj.get("type") {
        Some(Value::String(s)) => FieldType::parse(s).ok_or_else(|| {
            Error::SchemaValidationFailed(format!(
                "{ctx}.type must be one of string, number, boolean, date, array; got '{s}'"
            ))
        })?,
        _ => {
            return Err(Error::SchemaValidationFailed(format!(
                "{ctx}.type must be a string"
            )))
        }
    };

    let pattern = optional_string(obj, "pattern", &ctx)?;

    let allowed_values = match obj.get("allowed_values") {
        None | Some(Value::Null) => None,
        Some(Value::Array(values)) => {
            if let Some(bad) = values
                .iter()
                .find(|v| matches!(v, Value::Array(_) | Value::Object(_)))
            {
                return Err(Error::SchemaValidationFailed(format!(
                    "{ctx}.allowed_values must contain scalars, got {}",
                    type_name(bad)
                )));
            }
            Some(values.clone())
        }
        Some(other) => {
            return Err(Error::SchemaValidationFailed(format!(
                "{ctx}.allowed_values must be an array, got {}",
                type_name(other)
            )))
        }
    };

    Ok(RequiredField {
        name,
        field_type,
        pattern,
        allowed_values,
    })
}

fn filename_rules(obj: &Map<String, Value>) -> Result<FilenameRules> {
    Ok(FilenameRules {
        pattern: optional_string(obj, "pattern", "filename")?,
    })
}

fn content_rules(obj: &Map<String, Value>) -> Result<ContentRules> {
    let required_sections = match obj.get("required_sections") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(Error::SchemaValidationFailed(format!(
                        "content.required_sections must contain strings, got {}",
                        type_name(other)
                    ))),
                })
                .collect::<Result<Vec<_>>>()?,
        ),
        Some(other) => {
            return Err(Error::SchemaValidationFailed(format!(
                "content.required_sections must be an array, got {}",
                type_name(other)
            )))
        }
    };

    Ok(ContentRules {
        min_length: optional_length(obj, "min_length")?,
        max_length: optional_length(obj, "max_length")?,
        required_sections,
    })
}

fn expect_object<'a>(value: &'a Value, ctx: &str) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        Error::SchemaValidationFailed(format!(
            "{ctx} must be an object, got {}",
            type_name(value)
        ))
    })
}

fn optional_object<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => expect_object(value, key).map(Some),
    }
}

fn optional_string(obj: &Map<String, Value>, key: &str, ctx: &str) -> Result<Option<String>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Error::SchemaValidationFailed(format!(
            "{ctx}.{key} must be a string, got {}",
            type_name(other)
        ))),
    }
}

fn optional_length(obj: &Map<String, Value>, key: &str) -> Result<Option<u64>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            Error::SchemaValidationFailed(format!(
                "content.{key} must be a non-negative integer"
            ))
        }),
    }
}
