//! Constraint engine behavior through the public API: resolution, rule
//! evaluation, scoping, and persisted document round-trips.

use chrono::Utc;
use kbvault_core::paths::resolve;
use kbvault_core::{
    find_applicable, parse_folder_constraint, rules_from_json, serialize_folder_constraint,
    validate, ConstraintRules, FolderConstraint, IssueKind, KnowledgeBase,
};
use serde_json::json;

fn constraint(subfolder: &str, rules: serde_json::Value) -> FolderConstraint {
    FolderConstraint {
        kb_name: "kb".to_string(),
        subfolder: subfolder.to_string(),
        rules: rules_from_json(&rules).expect("valid rules"),
    }
}

#[test]
fn test_longest_prefix_selection() {
    let constraints = vec![
        constraint("docs", json!({})),
        constraint("docs/api", json!({})),
        constraint("docs/api/v2", json!({})),
    ];
    let pick = |path: &str| find_applicable(path, &constraints).map(|c| c.subfolder.as_str());

    assert_eq!(pick("docs/api/v2/x.md"), Some("docs/api/v2"));
    assert_eq!(pick("docs/api/y.md"), Some("docs/api"));
    assert_eq!(pick("docs/z.md"), Some("docs"));
    assert_eq!(pick("other/z.md"), None);
    assert_eq!(pick("documents/z.md"), None);
}

#[test]
fn test_all_issues_collected() {
    let c = constraint(
        "notes",
        json!({
            "frontmatter": {"required_fields": [
                {"name": "title", "type": "string"},
                {"name": "created", "type": "date"}
            ]},
            "filename": {"pattern": "^\\d+\\.md$"}
        }),
    );
    let result = validate("notes/abc.md", "---\nother: 1\n---\nBody", &c);
    assert!(!result.passed);
    let kinds: Vec<_> = result.issues.iter().map(|i| i.error).collect();
    assert_eq!(
        kinds,
        vec![
            IssueKind::MissingRequiredField,
            IssueKind::MissingRequiredField,
            IssueKind::PatternMismatch
        ]
    );
}

#[test]
fn test_type_gate_precedence() {
    let c = constraint(
        "notes",
        json!({
            "frontmatter": {"required_fields": [
                {"name": "priority", "type": "string", "pattern": "^P\\d$", "allowed_values": ["P1", "P2"]}
            ]}
        }),
    );
    let result = validate("notes/a.md", "---\npriority: 7\n---\n", &c);
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].error, IssueKind::InvalidFieldType);
    assert_eq!(result.issues[0].expected, Some(json!("string")));
    assert_eq!(result.issues[0].actual, Some(json!("number")));
}

#[test]
fn test_status_and_filename_scenarios() {
    let c = constraint(
        "notes",
        json!({
            "frontmatter": {"required_fields": [
                {"name": "status", "type": "string", "allowed_values": ["draft", "published"]}
            ]},
            "filename": {"pattern": "^\\d{4}-\\d{2}-\\d{2}-.+\\.md$"}
        }),
    );

    let rejected = validate("notes/my-note.md", "---\nstatus: deleted\n---\nBody", &c);
    assert!(!rejected.passed);
    let value_issue = &rejected.issues[0];
    assert_eq!(value_issue.field, "frontmatter.status");
    assert_eq!(value_issue.error, IssueKind::InvalidValue);
    assert_eq!(value_issue.expected, Some(json!(["draft", "published"])));
    assert_eq!(value_issue.actual, Some(json!("deleted")));
    let name_issue = &rejected.issues[1];
    assert_eq!(name_issue.field, "filename");
    assert_eq!(name_issue.error, IssueKind::PatternMismatch);
    assert_eq!(name_issue.actual, Some(json!("my-note.md")));

    let accepted = validate("notes/2025-01-01-x.md", "---\nstatus: draft\n---\nBody", &c);
    assert!(accepted.passed);
    assert!(accepted.issues.is_empty());
}

#[test]
fn test_section_found_at_any_depth() {
    let c = constraint("notes", json!({"content": {"required_sections": ["Summary"]}}));
    assert!(validate("notes/a.md", "## Summary\nText", &c).passed);
    assert!(validate("notes/a.md", "#### summary\nText", &c).passed);
    assert!(!validate("notes/a.md", "Summary\nText", &c).passed);
}

#[test]
fn test_scoping_is_idempotent() {
    let kb = KnowledgeBase {
        name: "research".to_string(),
        create_time: Utc::now(),
        description: String::new(),
        subfolder: "work/research".to_string(),
        organization_rules: String::new(),
    };
    for raw in ["a.md", "/papers//b.md", "work/research/c.md", "./d.md"] {
        let once = resolve(&kb, raw).unwrap();
        assert_eq!(resolve(&kb, &once).unwrap(), once);
        assert!(once.starts_with("work/research/"));
    }
}

#[test]
fn test_hand_written_rules_with_tricky_regex_round_trip() {
    let original = FolderConstraint {
        kb_name: "kb".to_string(),
        subfolder: "journal".to_string(),
        rules: rules_from_json(&json!({
            "frontmatter": {"required_fields": [
                {"name": "mood", "type": "string", "pattern": "^(?:\"happy\"|'sad'|\\w+: \\d+)$"},
                {"name": "tags", "type": "array"},
                {"name": "score", "type": "number", "allowed_values": [1, 2.5, -3]}
            ]},
            "content": {"min_length": 0, "max_length": 10000, "required_sections": ["A: B", "#hash"]}
        }))
        .unwrap(),
    };
    let text = serialize_folder_constraint(&original);
    assert_eq!(parse_folder_constraint("kb", &text).unwrap(), original);
}

#[test]
fn test_empty_rules_always_pass() {
    let c = FolderConstraint {
        kb_name: "kb".to_string(),
        subfolder: "x".to_string(),
        rules: ConstraintRules::default(),
    };
    assert!(validate("x/anything.txt", "", &c).passed);
}
