//! Tool catalogue: flat JSON arguments in, flat JSON result or tagged error out.
//!
//! Every call runs inside a `tool_call` span carrying a UUIDv7 `request_id`.
//! Failures are reported as:
//!
//! ```json
//! { "error": { "kind": "FolderConstraintViolation", "message": "...", "issues": [...] } }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use kbvault_core::{
    rules_from_json, CreateKnowledgeBaseRequest, Error, KnowledgeBaseRepository, Result,
    UpdateKnowledgeBaseRequest, VaultStorage,
};
use kbvault_store::{NoteService, VaultKnowledgeBaseRepository};
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Parameter structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, JsonSchema)]
struct ListKnowledgeBasesParams {}

#[derive(Debug, Deserialize, JsonSchema)]
struct AddKnowledgeBaseParams {
    /// Unique knowledge base name, also used as its record directory name
    name: String,
    /// Short description of what the knowledge base holds
    description: Option<String>,
    /// Vault folder owned by this knowledge base; must not overlap another knowledge base
    subfolder: String,
    /// Free-text guidance on how notes in this knowledge base are organized
    organization_rules: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UpdateKnowledgeBaseParams {
    /// Name of the knowledge base to update
    name: String,
    /// New description (unchanged when omitted)
    description: Option<String>,
    /// New subfolder (unchanged when omitted)
    subfolder: Option<String>,
    /// New organization rules (unchanged when omitted)
    organization_rules: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AddFolderConstraintParams {
    /// Knowledge base the constraint belongs to
    knowledge_base_name: String,
    /// Vault folder the constraint governs, inside the knowledge base subfolder
    subfolder: String,
    /// Rules object with optional `frontmatter.required_fields`, `filename.pattern`
    /// and `content` (`min_length`, `max_length`, `required_sections`)
    #[schemars(with = "BTreeMap<String, Value>")]
    rules: Value,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct KnowledgeBaseParams {
    /// Knowledge base name
    knowledge_base_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct NoteWriteParams {
    /// Knowledge base name
    knowledge_base_name: String,
    /// Note path, relative to the knowledge base subfolder or already scoped to it
    path: String,
    /// Note text, optionally starting with a front-matter block
    content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct NotePathParams {
    /// Knowledge base name
    knowledge_base_name: String,
    /// Note path, relative to the knowledge base subfolder or already scoped to it
    path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct MoveNoteParams {
    /// Knowledge base name
    knowledge_base_name: String,
    /// Current note path
    source_path: String,
    /// New note path; must not exist yet
    destination_path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ListNotesParams {
    /// Knowledge base name
    knowledge_base_name: String,
    /// Folder to list; the whole knowledge base when omitted
    folder: Option<String>,
    /// Descend into subfolders (default: true)
    recursive: Option<bool>,
}

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

/// Catalogue entry for one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

fn input_schema<T: JsonSchema>() -> Value {
    let root = schema_for!(T);
    let mut schema = serde_json::to_value(&root.schema).unwrap_or_else(|_| json!({}));
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("title");
        obj.remove("$schema");
        obj.entry("type").or_insert_with(|| json!("object"));
        obj.entry("properties").or_insert_with(|| json!({}));
    }
    schema
}

fn tool<T: JsonSchema>(name: &'static str, description: &'static str) -> ToolDefinition {
    ToolDefinition {
        name,
        description,
        input_schema: input_schema::<T>(),
    }
}

/// All tools in catalogue order.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        tool::<ListKnowledgeBasesParams>(
            "list_knowledge_bases",
            "List all knowledge bases with their subfolders and a preview of their organization rules.",
        ),
        tool::<AddKnowledgeBaseParams>(
            "add_knowledge_base",
            "Create a knowledge base owning a vault subfolder. Subfolders of different knowledge bases may not overlap.",
        ),
        tool::<UpdateKnowledgeBaseParams>(
            "update_knowledge_base",
            "Update the description, subfolder or organization rules of a knowledge base.",
        ),
        tool::<AddFolderConstraintParams>(
            "add_folder_constraint",
            "Attach machine-checked rules to a folder of a knowledge base. Replaces any existing constraint for that folder.",
        ),
        tool::<KnowledgeBaseParams>(
            "list_folder_constraints",
            "List the folder constraints of a knowledge base.",
        ),
        tool::<NoteWriteParams>(
            "create_note",
            "Create a note. The content must satisfy the most specific folder constraint covering the path.",
        ),
        tool::<NotePathParams>(
            "read_note",
            "Read a note and its parsed front matter.",
        ),
        tool::<NoteWriteParams>(
            "update_note",
            "Replace the content of an existing note, validating it against its folder constraint.",
        ),
        tool::<NoteWriteParams>(
            "append_note",
            "Append text to an existing note. The combined note must satisfy its folder constraint.",
        ),
        tool::<MoveNoteParams>(
            "move_note",
            "Move a note within its knowledge base, validating it against the destination folder constraint.",
        ),
        tool::<NotePathParams>("delete_note", "Delete a note."),
        tool::<ListNotesParams>(
            "list_notes",
            "List note paths in a knowledge base or one of its folders.",
        ),
    ]
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Tagged error payload returned to callers.
pub fn error_response(err: &Error) -> Value {
    let mut body = json!({
        "kind": err.kind(),
        "message": err.to_string(),
    });
    if let Some(issues) = err.issues() {
        body["issues"] = serde_json::to_value(issues).unwrap_or(Value::Null);
    }
    json!({ "error": body })
}

fn params<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args)
        .map_err(|e| Error::InvalidInput(format!("invalid arguments for {tool}: {e}")))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Dispatches tool calls to the registry and note service.
pub struct ToolRouter {
    registry: Arc<VaultKnowledgeBaseRepository>,
    notes: NoteService,
}

impl ToolRouter {
    pub fn new(storage: Arc<dyn VaultStorage>, kb_root_dir: &str) -> Self {
        let registry = Arc::new(VaultKnowledgeBaseRepository::with_root(storage, kb_root_dir));
        let notes = NoteService::new(registry.clone());
        Self { registry, notes }
    }

    pub fn registry(&self) -> &Arc<VaultKnowledgeBaseRepository> {
        &self.registry
    }

    /// Run one tool call. Never fails; errors are returned as tagged payloads.
    pub async fn call(&self, name: &str, args: Value) -> Value {
        let request_id = Uuid::now_v7();
        let span = info_span!("tool_call", subsystem = "api", request_id = %request_id, op = %name);

        async move {
            let start = Instant::now();
            let outcome = self.dispatch(name, args).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match outcome {
                Ok(result) => {
                    info!(success = true, duration_ms, "Tool call completed");
                    result
                }
                Err(e) => {
                    if matches!(e, Error::Io(_) | Error::Serialization(_)) {
                        warn!(success = false, duration_ms, error_kind = e.kind(), error = %e, "Tool call failed");
                    } else {
                        info!(success = false, duration_ms, error_kind = e.kind(), error = %e, "Tool call rejected");
                    }
                    error_response(&e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, name: &str, args: Value) -> Result<Value> {
        debug!(op = %name, "dispatching tool");
        match name {
            "list_knowledge_bases" => {
                let _: ListKnowledgeBasesParams = params(name, args)?;
                let knowledge_bases = self.registry.list().await?;
                Ok(json!({
                    "count": knowledge_bases.len(),
                    "knowledge_bases": to_json(&knowledge_bases)?,
                }))
            }
            "add_knowledge_base" => {
                let p: AddKnowledgeBaseParams = params(name, args)?;
                let kb = self
                    .registry
                    .add(CreateKnowledgeBaseRequest {
                        name: p.name,
                        description: p.description.unwrap_or_default(),
                        subfolder: p.subfolder,
                        organization_rules: p.organization_rules.unwrap_or_default(),
                    })
                    .await?;
                Ok(json!({ "knowledge_base": to_json(&kb)? }))
            }
            "update_knowledge_base" => {
                let p: UpdateKnowledgeBaseParams = params(name, args)?;
                let req = UpdateKnowledgeBaseRequest {
                    description: p.description,
                    subfolder: p.subfolder,
                    organization_rules: p.organization_rules,
                };
                if req.is_empty() {
                    return Err(Error::InvalidInput(
                        "update_knowledge_base needs at least one field to change".to_string(),
                    ));
                }
                let kb = self.registry.update(&p.name, req).await?;
                Ok(json!({ "knowledge_base": to_json(&kb)? }))
            }
            "add_folder_constraint" => {
                let p: AddFolderConstraintParams = params(name, args)?;
                let rules = rules_from_json(&p.rules)?;
                let constraint = self
                    .registry
                    .add_folder_constraint(&p.knowledge_base_name, &p.subfolder, rules)
                    .await?;
                Ok(json!({ "folder_constraint": to_json(&constraint)? }))
            }
            "list_folder_constraints" => {
                let p: KnowledgeBaseParams = params(name, args)?;
                let constraints = self
                    .registry
                    .get_folder_constraints(&p.knowledge_base_name)
                    .await?;
                Ok(json!({
                    "count": constraints.len(),
                    "folder_constraints": to_json(&constraints)?,
                }))
            }
            "create_note" => {
                let p: NoteWriteParams = params(name, args)?;
                let outcome = self
                    .notes
                    .create(&p.knowledge_base_name, &p.path, &p.content)
                    .await?;
                to_json(&outcome)
            }
            "read_note" => {
                let p: NotePathParams = params(name, args)?;
                let note = self.notes.read(&p.knowledge_base_name, &p.path).await?;
                to_json(&note)
            }
            "update_note" => {
                let p: NoteWriteParams = params(name, args)?;
                let outcome = self
                    .notes
                    .update(&p.knowledge_base_name, &p.path, &p.content)
                    .await?;
                to_json(&outcome)
            }
            "append_note" => {
                let p: NoteWriteParams = params(name, args)?;
                let outcome = self
                    .notes
                    .append(&p.knowledge_base_name, &p.path, &p.content)
                    .await?;
                to_json(&outcome)
            }
            "move_note" => {
                let p: MoveNoteParams = params(name, args)?;
                let outcome = self
                    .notes
                    .move_note(&p.knowledge_base_name, &p.source_path, &p.destination_path)
                    .await?;
                to_json(&outcome)
            }
            "delete_note" => {
                let p: NotePathParams = params(name, args)?;
                let path = self.notes.delete(&p.knowledge_base_name, &p.path).await?;
                Ok(json!({ "path": path, "deleted": true }))
            }
            "list_notes" => {
                let p: ListNotesParams = params(name, args)?;
                let notes = self
                    .notes
                    .list(
                        &p.knowledge_base_name,
                        p.folder.as_deref(),
                        p.recursive.unwrap_or(true),
                    )
                    .await?;
                Ok(json!({ "count": notes.len(), "notes": notes }))
            }
            other => Err(Error::InvalidInput(format!("Unknown tool: {other}"))),
        }
    }
}
