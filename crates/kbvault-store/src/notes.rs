//! Note operations scoped to a knowledge base.
//!
//! Every mutation resolves its path inside the knowledge base, validates the
//! resulting content against the applicable folder constraint, and only then
//! touches storage.

use std::collections::VecDeque;
use std::sync::Arc;

use kbvault_core::defaults::NOTE_EXTENSION;
use kbvault_core::paths::{resolve, resolve_note};
use kbvault_core::{
    frontmatter, Error, KnowledgeBase, NoteContent, NoteWriteOutcome, Result, VaultStorage,
    WriteMode,
};
use tracing::{debug, info};

use crate::knowledge_bases::VaultKnowledgeBaseRepository;

/// Translate storage-level path errors into note errors.
fn note_error(err: Error) -> Error {
    match err {
        Error::NotFound(path) => Error::NoteNotFound(path),
        Error::AlreadyExists(path) => Error::NoteAlreadyExists(path),
        other => other,
    }
}

/// Create, read, update, append, move, delete and list notes.
pub struct NoteService {
    registry: Arc<VaultKnowledgeBaseRepository>,
}

impl NoteService {
    pub fn new(registry: Arc<VaultKnowledgeBaseRepository>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<VaultKnowledgeBaseRepository> {
        &self.registry
    }

    fn storage(&self) -> &Arc<dyn VaultStorage> {
        self.registry.storage()
    }

    /// Validate `content` for `path`, failing with every issue found.
    async fn enforce(&self, kb: &KnowledgeBase, path: &str, content: &str) -> Result<NoteWriteOutcome> {
        match self.registry.check_note(&kb.name, path, content).await? {
            None => Ok(NoteWriteOutcome {
                path: path.to_string(),
                constraint_subfolder: None,
                validation: None,
            }),
            Some((constraint, result)) if result.passed => Ok(NoteWriteOutcome {
                path: path.to_string(),
                constraint_subfolder: Some(constraint.subfolder),
                validation: Some(result),
            }),
            Some((constraint, result)) => {
                debug!(
                    component = "notes",
                    kb_name = %kb.name,
                    note_path = %path,
                    subfolder = %constraint.subfolder,
                    issue_count = result.issues.len(),
                    "notes: content rejected"
                );
                Err(Error::FolderConstraintViolation {
                    path: path.to_string(),
                    issues: result.issues,
                })
            }
        }
    }

    /// Create a new note. `.md` is appended when missing.
    pub async fn create(&self, kb_name: &str, path: &str, content: &str) -> Result<NoteWriteOutcome> {
        let kb = self.registry.require(kb_name).await?;
        let path = resolve_note(&kb, path)?;

        let outcome = self.enforce(&kb, &path, content).await?;
        if self.storage().exists(&path).await? {
            return Err(Error::NoteAlreadyExists(path));
        }
        self.storage()
            .write(&path, content, WriteMode::Create)
            .await
            .map_err(note_error)?;

        info!(component = "notes", kb_name = %kb_name, note_path = %path, "Note created");
        Ok(outcome)
    }

    /// Read a note with its parsed front matter.
    pub async fn read(&self, kb_name: &str, path: &str) -> Result<NoteContent> {
        let kb = self.registry.require(kb_name).await?;
        let path = resolve_note(&kb, path)?;
        let content = self.storage().read(&path).await.map_err(note_error)?;
        let parsed = frontmatter::parse(&content);

        Ok(NoteContent {
            path,
            content,
            frontmatter: parsed.frontmatter,
            body: parsed.body,
        })
    }

    /// Replace the content of an existing note.
    pub async fn update(&self, kb_name: &str, path: &str, content: &str) -> Result<NoteWriteOutcome> {
        let kb = self.registry.require(kb_name).await?;
        let path = resolve_note(&kb, path)?;
        if !self.storage().exists(&path).await? {
            return Err(Error::NoteNotFound(path));
        }

        let outcome = self.enforce(&kb, &path, content).await?;
        self.storage()
            .write(&path, content, WriteMode::Modify)
            .await
            .map_err(note_error)?;

        info!(component = "notes", kb_name = %kb_name, note_path = %path, "Note updated");
        Ok(outcome)
    }

    /// Append to an existing note. The combined document is what gets validated.
    pub async fn append(&self, kb_name: &str, path: &str, content: &str) -> Result<NoteWriteOutcome> {
        let kb = self.registry.require(kb_name).await?;
        let path = resolve_note(&kb, path)?;
        let existing = self.storage().read(&path).await.map_err(note_error)?;

        let mut combined = existing;
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(content);

        let outcome = self.enforce(&kb, &path, &combined).await?;
        self.storage()
            .write(&path, &combined, WriteMode::Modify)
            .await
            .map_err(note_error)?;

        info!(component = "notes", kb_name = %kb_name, note_path = %path, appended = content.len(), "Note appended");
        Ok(outcome)
    }

    /// Move a note within its knowledge base, validating it against the
    /// destination's constraint.
    pub async fn move_note(&self, kb_name: &str, from: &str, to: &str) -> Result<NoteWriteOutcome> {
        let kb = self.registry.require(kb_name).await?;
        let from = resolve_note(&kb, from)?;
        let to = resolve_note(&kb, to)?;

        let content = self.storage().read(&from).await.map_err(note_error)?;
        if self.storage().exists(&to).await? {
            return Err(Error::NoteAlreadyExists(to));
        }

        let outcome = self.enforce(&kb, &to, &content).await?;
        self.storage()
            .rename(&from, &to)
            .await
            .map_err(note_error)?;

        info!(component = "notes", kb_name = %kb_name, from = %from, to = %to, "Note moved");
        Ok(outcome)
    }

    /// Delete a note. Returns the vault path that was removed.
    pub async fn delete(&self, kb_name: &str, path: &str) -> Result<String> {
        let kb = self.registry.require(kb_name).await?;
        let path = resolve_note(&kb, path)?;
        self.storage().delete(&path).await.map_err(note_error)?;

        info!(component = "notes", kb_name = %kb_name, note_path = %path, "Note deleted");
        Ok(path)
    }

    /// List note paths under `folder` (the whole knowledge base when `None`),
    /// sorted.
    pub async fn list(
        &self,
        kb_name: &str,
        folder: Option<&str>,
        recursive: bool,
    ) -> Result<Vec<String>> {
        let kb = self.registry.require(kb_name).await?;
        let start = resolve(&kb, folder.unwrap_or(""))?;

        let mut notes = Vec::new();
        let mut pending = VecDeque::from([start]);
        while let Some(dir) = pending.pop_front() {
            let listing = match self.storage().list(&dir).await {
                Ok(listing) => listing,
                Err(Error::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            notes.extend(
                listing
                    .files
                    .into_iter()
                    .filter(|p| p.ends_with(NOTE_EXTENSION)),
            );
            if recursive {
                pending.extend(listing.folders);
            }
        }
        notes.sort();

        debug!(component = "notes", kb_name = %kb_name, result_count = notes.len(), recursive, "notes: listed");
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use kbvault_core::{
        ConstraintRules, ContentRules, CreateKnowledgeBaseRequest, FieldType, FrontmatterRules,
        IssueKind, KnowledgeBaseRepository, RequiredField,
    };

    async fn service() -> NoteService {
        let storage = Arc::new(MemoryStorage::new());
        let registry = Arc::new(VaultKnowledgeBaseRepository::new(storage));
        registry
            .add(CreateKnowledgeBaseRequest {
                name: "research".to_string(),
                description: String::new(),
                subfolder: "research".to_string(),
                organization_rules: String::new(),
            })
            .await
            .unwrap();
        registry
            .add_folder_constraint(
                "research",
                "research/papers",
                ConstraintRules {
                    frontmatter: Some(FrontmatterRules {
                        required_fields: Some(vec![RequiredField::new(
                            "status",
                            FieldType::String,
                        )]),
                    }),
                    content: Some(ContentRules {
                        required_sections: Some(vec!["Summary".to_string()]),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        NoteService::new(registry)
    }

    const GOOD: &str = "---\nstatus: draft\n---\n## Summary\nText\n";

    #[tokio::test]
    async fn test_create_read_round_trip() {
        let notes = service().await;
        let outcome = notes.create("research", "papers/one", GOOD).await.unwrap();
        assert_eq!(outcome.path, "research/papers/one.md");
        assert_eq!(outcome.constraint_subfolder.as_deref(), Some("research/papers"));
        assert!(outcome.validation.unwrap().passed);

        let note = notes.read("research", "research/papers/one.md").await.unwrap();
        assert_eq!(note.content, GOOD);
        assert_eq!(note.frontmatter["status"], "draft");
        assert_eq!(note.body, "## Summary\nText\n");
    }

    #[tokio::test]
    async fn test_unconstrained_create() {
        let notes = service().await;
        let outcome = notes.create("research", "scratch.md", "anything").await.unwrap();
        assert_eq!(outcome.path, "research/scratch.md");
        assert!(outcome.validation.is_none());
    }

    #[tokio::test]
    async fn test_create_violation_writes_nothing() {
        let notes = service().await;
        let err = notes
            .create("research", "papers/bad.md", "no front matter")
            .await
            .unwrap_err();
        let issues = err.issues().unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].error, IssueKind::MissingRequiredField);
        assert_eq!(issues[1].error, IssueKind::MissingSection);

        assert!(!notes
            .storage()
            .exists("research/papers/bad.md")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_create_existing_fails() {
        let notes = service().await;
        notes.create("research", "a.md", "x").await.unwrap();
        let err = notes.create("research", "a.md", "y").await.unwrap_err();
        assert!(matches!(err, Error::NoteAlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_path_escape_rejected() {
        let notes = service().await;
        let err = notes
            .create("research", "../outside.md", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidNotePath(_)));
    }

    #[tokio::test]
    async fn test_update_and_missing() {
        let notes = service().await;
        let err = notes.update("research", "nope.md", "x").await.unwrap_err();
        assert!(matches!(err, Error::NoteNotFound(_)));

        notes.create("research", "papers/one", GOOD).await.unwrap();
        let err = notes
            .update("research", "papers/one", "---\nstatus: draft\n---\nno sections\n")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FolderConstraintViolation { .. }));
        assert_eq!(
            notes.read("research", "papers/one").await.unwrap().content,
            GOOD
        );
    }

    #[tokio::test]
    async fn test_append_validates_combined_document() {
        let notes = service().await;
        notes
            .create("research", "log.md", "first line")
            .await
            .unwrap();
        notes.append("research", "log.md", "second line").await.unwrap();
        assert_eq!(
            notes.read("research", "log.md").await.unwrap().content,
            "first line\nsecond line"
        );

        notes.create("research", "papers/one", GOOD).await.unwrap();
        let outcome = notes
            .append("research", "papers/one", "More text\n")
            .await
            .unwrap();
        assert!(outcome.validation.unwrap().passed);

        let err = notes.append("research", "ghost.md", "x").await.unwrap_err();
        assert!(matches!(err, Error::NoteNotFound(_)));
    }

    #[tokio::test]
    async fn test_move_validates_destination() {
        let notes = service().await;
        notes.create("research", "loose.md", "plain").await.unwrap();

        let err = notes
            .move_note("research", "loose.md", "papers/loose.md")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FolderConstraintViolation { .. }));
        assert!(notes.read("research", "loose.md").await.is_ok());

        notes.create("research", "ready.md", GOOD).await.unwrap();
        let outcome = notes
            .move_note("research", "ready.md", "papers/ready.md")
            .await
            .unwrap();
        assert_eq!(outcome.path, "research/papers/ready.md");
        assert!(matches!(
            notes.read("research", "ready.md").await.unwrap_err(),
            Error::NoteNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_move_onto_existing_fails() {
        let notes = service().await;
        notes.create("research", "a.md", "a").await.unwrap();
        notes.create("research", "b.md", "b").await.unwrap();
        let err = notes.move_note("research", "a.md", "b.md").await.unwrap_err();
        assert!(matches!(err, Error::NoteAlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let notes = service().await;
        notes.create("research", "a.md", "a").await.unwrap();
        assert_eq!(notes.delete("research", "a").await.unwrap(), "research/a.md");
        let err = notes.delete("research", "a").await.unwrap_err();
        assert!(matches!(err, Error::NoteNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_flat_and_recursive() {
        let notes = service().await;
        notes.create("research", "b.md", "b").await.unwrap();
        notes.create("research", "a.md", "a").await.unwrap();
        notes.create("research", "papers/p.md", GOOD).await.unwrap();

        assert_eq!(
            notes.list("research", None, false).await.unwrap(),
            vec!["research/a.md", "research/b.md"]
        );
        assert_eq!(
            notes.list("research", None, true).await.unwrap(),
            vec!["research/a.md", "research/b.md", "research/papers/p.md"]
        );
        assert_eq!(
            notes.list("research", Some("papers"), false).await.unwrap(),
            vec!["research/papers/p.md"]
        );
        assert!(notes
            .list("research", Some("missing"), true)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unknown_kb() {
        let notes = service().await;
        let err = notes.read("ghost", "a.md").await.unwrap_err();
        assert!(matches!(err, Error::KnowledgeBaseNotFound(_)));
    }
}
