//! Tool-level workflow against a vault directory: knowledge base setup,
//! constraints, and every note tool.

use std::sync::Arc;

use kbvault_api::ToolRouter;
use kbvault_store::FilesystemStorage;
use serde_json::{json, Value};
use tempfile::TempDir;

async fn setup() -> (TempDir, ToolRouter) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let router = ToolRouter::new(
        Arc::new(FilesystemStorage::new(dir.path())),
        ".knowledge-bases",
    );

    let out = router
        .call(
            "add_knowledge_base",
            json!({
                "name": "research",
                "description": "Papers and reading notes",
                "subfolder": "research",
                "organization_rules": "One paper per note."
            }),
        )
        .await;
    assert!(out.get("error").is_none(), "{out}");

    let out = router
        .call(
            "add_folder_constraint",
            json!({
                "knowledge_base_name": "research",
                "subfolder": "research/papers",
                "rules": {
                    "frontmatter": {"required_fields": [
                        {"name": "status", "type": "string", "allowed_values": ["draft", "published"]},
                        {"name": "year", "type": "number"}
                    ]},
                    "content": {"required_sections": ["Summary"]}
                }
            }),
        )
        .await;
    assert!(out.get("error").is_none(), "{out}");

    (dir, router)
}

fn kind(out: &Value) -> &str {
    out["error"]["kind"].as_str().unwrap_or("")
}

#[tokio::test]
async fn test_knowledge_base_tools() {
    let (_dir, router) = setup().await;

    let out = router.call("list_knowledge_bases", json!({})).await;
    assert_eq!(out["count"], 1);
    assert_eq!(out["knowledge_bases"][0]["name"], "research");
    assert_eq!(
        out["knowledge_bases"][0]["organization_rules_preview"],
        "One paper per note."
    );

    let out = router
        .call(
            "add_knowledge_base",
            json!({"name": "papers", "subfolder": "research/papers"}),
        )
        .await;
    assert_eq!(kind(&out), "SubfolderOverlap");

    let out = router
        .call(
            "add_knowledge_base",
            json!({"name": "research", "subfolder": "elsewhere"}),
        )
        .await;
    assert_eq!(kind(&out), "KnowledgeBaseAlreadyExists");

    let out = router
        .call(
            "update_knowledge_base",
            json!({"name": "research", "description": "Updated"}),
        )
        .await;
    assert_eq!(out["knowledge_base"]["description"], "Updated");

    let out = router.call("list_knowledge_bases", json!({})).await;
    assert_eq!(out["knowledge_bases"][0]["description"], "Updated");

    let out = router
        .call(
            "update_knowledge_base",
            json!({"name": "ghost", "description": "x"}),
        )
        .await;
    assert_eq!(kind(&out), "KnowledgeBaseNotFound");

    let out = router
        .call(
            "list_folder_constraints",
            json!({"knowledge_base_name": "research"}),
        )
        .await;
    assert_eq!(out["count"], 1);
    assert_eq!(
        out["folder_constraints"][0]["rules"]["frontmatter"]["required_fields"][1]["name"],
        "year"
    );
}

#[tokio::test]
async fn test_note_tools() {
    let (dir, router) = setup().await;
    let good = "---\nstatus: draft\nyear: 2024\n---\n# Paper\n\n## Summary\n\nShort.\n";

    let out = router
        .call(
            "create_note",
            json!({"knowledge_base_name": "research", "path": "papers/attention", "content": good}),
        )
        .await;
    assert_eq!(out["path"], "research/papers/attention.md");
    assert_eq!(out["constraint_subfolder"], "research/papers");
    assert_eq!(out["validation"]["passed"], true);
    assert!(dir.path().join("research/papers/attention.md").is_file());

    let out = router
        .call(
            "read_note",
            json!({"knowledge_base_name": "research", "path": "papers/attention.md"}),
        )
        .await;
    assert_eq!(out["frontmatter"]["year"], 2024);
    assert_eq!(out["content"], good);

    let out = router
        .call(
            "update_note",
            json!({
                "knowledge_base_name": "research",
                "path": "papers/attention.md",
                "content": "---\nstatus: archived\nyear: \"2024\"\n---\nNo summary"
            }),
        )
        .await;
    assert_eq!(kind(&out), "FolderConstraintViolation");
    let errors: Vec<_> = out["error"]["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["error"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        errors,
        vec!["invalid_value", "invalid_field_type", "missing_section"]
    );

    let out = router
        .call(
            "append_note",
            json!({"knowledge_base_name": "research", "path": "papers/attention.md", "content": "More.\n"}),
        )
        .await;
    assert_eq!(out["validation"]["passed"], true);

    let out = router
        .call(
            "create_note",
            json!({"knowledge_base_name": "research", "path": "inbox.md", "content": "todo"}),
        )
        .await;
    assert!(out["validation"].is_null());

    let out = router
        .call(
            "move_note",
            json!({"knowledge_base_name": "research", "source_path": "inbox.md", "destination_path": "papers/inbox.md"}),
        )
        .await;
    assert_eq!(kind(&out), "FolderConstraintViolation");

    let out = router
        .call(
            "list_notes",
            json!({"knowledge_base_name": "research"}),
        )
        .await;
    assert_eq!(
        out["notes"],
        json!(["research/inbox.md", "research/papers/attention.md"])
    );

    let out = router
        .call(
            "list_notes",
            json!({"knowledge_base_name": "research", "recursive": false}),
        )
        .await;
    assert_eq!(out["notes"], json!(["research/inbox.md"]));

    let out = router
        .call(
            "delete_note",
            json!({"knowledge_base_name": "research", "path": "inbox"}),
        )
        .await;
    assert_eq!(out["deleted"], true);

    let out = router
        .call(
            "read_note",
            json!({"knowledge_base_name": "research", "path": "inbox"}),
        )
        .await;
    assert_eq!(kind(&out), "NoteNotFound");

    let out = router
        .call(
            "read_note",
            json!({"knowledge_base_name": "research", "path": "../secrets.md"}),
        )
        .await;
    assert_eq!(kind(&out), "InvalidNotePath");
}
