//! Knowledge base registry backed by vault documents.
//!
//! Layout under the knowledge base root (`.knowledge-bases` by default):
//!
//! ```text
//! <root>/kb_cache.json
//! <root>/<name>/meta.md
//! <root>/<name>/folder_constraints/<sanitized subfolder>.md
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use kbvault_core::defaults::{CONSTRAINTS_DIR, KB_META_FILE, KB_ROOT_DIR, NOTE_EXTENSION};
use kbvault_core::paths::{
    file_name, is_within, normalize_folder, normalize_path, sanitize_subfolder,
    subfolders_overlap, validate_kb_name,
};
use kbvault_core::{
    check_rules, find_applicable, parse_folder_constraint, parse_knowledge_base,
    serialize_folder_constraint, serialize_knowledge_base, validate, ConstraintRules,
    CreateKnowledgeBaseRequest, Error, FolderConstraint, KnowledgeBase, KnowledgeBaseRepository,
    KnowledgeBaseSummary, Result, UpdateKnowledgeBaseRequest, ValidationResult, VaultStorage,
    WriteMode,
};
use tracing::{debug, info, warn};

use crate::cache::{upsert_entry, KnowledgeBaseCache};

/// Registry of knowledge bases and their folder constraints.
pub struct VaultKnowledgeBaseRepository {
    storage: Arc<dyn VaultStorage>,
    root: String,
    cache: KnowledgeBaseCache,
}

impl VaultKnowledgeBaseRepository {
    /// Create a registry using the default root directory.
    pub fn new(storage: Arc<dyn VaultStorage>) -> Self {
        Self::with_root(storage, KB_ROOT_DIR)
    }

    /// Create a registry whose records live under `root`.
    pub fn with_root(storage: Arc<dyn VaultStorage>, root: &str) -> Self {
        let root = normalize_path(root);
        let cache = KnowledgeBaseCache::new(storage.clone(), &root);
        Self {
            storage,
            root,
            cache,
        }
    }

    pub fn storage(&self) -> &Arc<dyn VaultStorage> {
        &self.storage
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    fn kb_dir(&self, name: &str) -> String {
        format!("{}/{}", self.root, name)
    }

    fn meta_path(&self, name: &str) -> String {
        format!("{}/{}", self.kb_dir(name), KB_META_FILE)
    }

    fn constraints_dir(&self, name: &str) -> String {
        format!("{}/{}", self.kb_dir(name), CONSTRAINTS_DIR)
    }

    fn constraint_path(&self, name: &str, subfolder: &str) -> String {
        format!(
            "{}/{}{}",
            self.constraints_dir(name),
            sanitize_subfolder(subfolder),
            NOTE_EXTENSION
        )
    }

    /// Fetch a knowledge base or fail with `KnowledgeBaseNotFound`.
    pub async fn require(&self, name: &str) -> Result<KnowledgeBase> {
        self.get(name)
            .await?
            .ok_or_else(|| Error::KnowledgeBaseNotFound(name.to_string()))
    }

    /// Read every parseable knowledge base record, sorted by name.
    ///
    /// Directories without a `meta.md` are ignored; unparseable records are
    /// skipped with a warning.
    pub async fn scan(&self) -> Result<Vec<KnowledgeBase>> {
        let listing = match self.storage.list(&self.root).await {
            Ok(listing) => listing,
            Err(Error::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut kbs = Vec::with_capacity(listing.folders.len());
        for folder in &listing.folders {
            let name = file_name(folder);
            let meta_path = format!("{folder}/{KB_META_FILE}");
            let text = match self.storage.read(&meta_path).await {
                Ok(text) => text,
                Err(Error::NotFound(_)) => {
                    debug!(component = "registry", kb_name = %name, "registry: directory without meta, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(component = "registry", kb_name = %name, error = %e, "registry: unreadable record, skipping");
                    continue;
                }
            };
            match parse_knowledge_base(name, &text) {
                Ok(kb) => kbs.push(kb),
                Err(e) => {
                    warn!(component = "registry", kb_name = %name, error = %e, "registry: malformed record, skipping")
                }
            }
        }
        kbs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(kbs)
    }

    /// Reject a subfolder that collides with another knowledge base or with
    /// the record root.
    fn check_overlap(&self, name: &str, subfolder: &str, others: &[KnowledgeBase]) -> Result<()> {
        if subfolders_overlap(subfolder, &self.root) {
            return Err(Error::InvalidNotePath(format!(
                "subfolder '{subfolder}' overlaps the reserved directory '{}'",
                self.root
            )));
        }
        if let Some(existing) = others
            .iter()
            .filter(|kb| kb.name != name)
            .find(|kb| subfolders_overlap(subfolder, &kb.subfolder))
        {
            return Err(Error::SubfolderOverlap {
                subfolder: subfolder.to_string(),
                existing_kb: existing.name.clone(),
                existing_subfolder: existing.subfolder.clone(),
            });
        }
        Ok(())
    }

    /// Upsert one summary into the list cache.
    ///
    /// An empty cache is rebuilt from a scan first. After writing, the cache is
    /// re-read once; if a concurrent writer dropped the entry, the merge is
    /// repeated a single time.
    async fn refresh_cache(&self, summary: KnowledgeBaseSummary) {
        for attempt in 0..2 {
            let mut entries = match self.cache.load().await {
                Some(entries) if !entries.is_empty() => entries,
                _ => match self.scan().await {
                    Ok(kbs) => kbs.iter().map(KnowledgeBase::summary).collect(),
                    Err(e) => {
                        warn!(component = "list_cache", error = %e, "list_cache: rebuild scan failed, invalidating");
                        self.cache.invalidate().await;
                        return;
                    }
                },
            };
            upsert_entry(&mut entries, summary.clone());
            self.cache.save(&entries).await;

            let landed = self
                .cache
                .load()
                .await
                .is_some_and(|current| current.contains(&summary));
            if landed {
                return;
            }
            debug!(component = "list_cache", kb_name = %summary.name, attempt, "list_cache: entry lost to a concurrent write");
        }
        warn!(component = "list_cache", kb_name = %summary.name, "list_cache: upsert did not stick, invalidating");
        self.cache.invalidate().await;
    }

    /// The constraint governing `note_path` in knowledge base `kb_name`.
    pub async fn applicable_constraint(
        &self,
        kb_name: &str,
        note_path: &str,
    ) -> Result<Option<FolderConstraint>> {
        let constraints = self.get_folder_constraints(kb_name).await?;
        let selected = find_applicable(note_path, &constraints).cloned();
        debug!(
            component = "registry",
            kb_name = %kb_name,
            note_path = %note_path,
            subfolder = selected.as_ref().map(|c| c.subfolder.as_str()),
            "registry: resolved constraint"
        );
        Ok(selected)
    }

    /// Validate candidate content for `note_path` against its applicable
    /// constraint. `None` when the note is unconstrained.
    pub async fn check_note(
        &self,
        kb_name: &str,
        note_path: &str,
        content: &str,
    ) -> Result<Option<(FolderConstraint, ValidationResult)>> {
        Ok(self
            .applicable_constraint(kb_name, note_path)
            .await?
            .map(|constraint| {
                let result = validate(note_path, content, &constraint);
                (constraint, result)
            }))
    }
}

#[async_trait]
impl KnowledgeBaseRepository for VaultKnowledgeBaseRepository {
    async fn add(&self, req: CreateKnowledgeBaseRequest) -> Result<KnowledgeBase> {
        validate_kb_name(&req.name)?;
        let subfolder = normalize_folder(&req.subfolder)?;

        let meta_path = self.meta_path(&req.name);
        if self.storage.exists(&meta_path).await? {
            return Err(Error::KnowledgeBaseAlreadyExists(req.name));
        }
        let existing = self.scan().await?;
        self.check_overlap(&req.name, &subfolder, &existing)?;

        let kb = KnowledgeBase {
            name: req.name,
            create_time: Utc::now(),
            description: req.description,
            subfolder,
            organization_rules: req.organization_rules.trim().to_string(),
        };

        self.storage
            .write(&meta_path, &serialize_knowledge_base(&kb), WriteMode::Create)
            .await
            .map_err(|e| match e {
                Error::AlreadyExists(_) => Error::KnowledgeBaseAlreadyExists(kb.name.clone()),
                other => other,
            })?;
        self.storage
            .ensure_dir(&self.constraints_dir(&kb.name))
            .await?;
        self.storage.ensure_dir(&kb.subfolder).await?;

        self.refresh_cache(kb.summary()).await;
        info!(component = "registry", kb_name = %kb.name, subfolder = %kb.subfolder, "Knowledge base created");
        Ok(kb)
    }

    async fn update(&self, name: &str, req: UpdateKnowledgeBaseRequest) -> Result<KnowledgeBase> {
        let mut kb = self.require(name).await?;

        if let Some(description) = req.description {
            kb.description = description;
        }
        if let Some(rules) = req.organization_rules {
            kb.organization_rules = rules.trim().to_string();
        }
        if let Some(raw) = req.subfolder {
            let subfolder = normalize_folder(&raw)?;
            if subfolder != kb.subfolder {
                let others = self.scan().await?;
                self.check_overlap(name, &subfolder, &others)?;

                let orphaned = self
                    .get_folder_constraints(name)
                    .await?
                    .into_iter()
                    .filter(|c| !is_within(&c.subfolder, &subfolder))
                    .count();
                if orphaned > 0 {
                    warn!(
                        component = "registry",
                        kb_name = %name,
                        subfolder = %subfolder,
                        orphaned,
                        "Existing folder constraints fall outside the new subfolder"
                    );
                }
                self.storage.ensure_dir(&subfolder).await?;
                kb.subfolder = subfolder;
            }
        }

        self.storage
            .write(
                &self.meta_path(name),
                &serialize_knowledge_base(&kb),
                WriteMode::Overwrite,
            )
            .await?;
        self.refresh_cache(kb.summary()).await;
        info!(component = "registry", kb_name = %name, subfolder = %kb.subfolder, "Knowledge base updated");
        Ok(kb)
    }

    async fn get(&self, name: &str) -> Result<Option<KnowledgeBase>> {
        if validate_kb_name(name).is_err() {
            return Ok(None);
        }
        match self.storage.read(&self.meta_path(name)).await {
            Ok(text) => parse_knowledge_base(name, &text).map(Some),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list(&self) -> Result<Vec<KnowledgeBaseSummary>> {
        if let Some(entries) = self.cache.load().await {
            if !entries.is_empty() {
                debug!(component = "registry", result_count = entries.len(), "registry: list served from cache");
                return Ok(entries);
            }
        }

        let summaries: Vec<KnowledgeBaseSummary> =
            self.scan().await?.iter().map(KnowledgeBase::summary).collect();
        if !summaries.is_empty() {
            warn!(component = "list_cache", result_count = summaries.len(), "list_cache: rebuilt from scan");
            self.cache.save(&summaries).await;
        }
        Ok(summaries)
    }

    async fn add_folder_constraint(
        &self,
        kb_name: &str,
        subfolder: &str,
        rules: ConstraintRules,
    ) -> Result<FolderConstraint> {
        let kb = self.require(kb_name).await?;
        let subfolder = normalize_folder(subfolder)?;
        if !is_within(&subfolder, &kb.subfolder) {
            return Err(Error::InvalidNotePath(format!(
                "subfolder '{subfolder}' is outside knowledge base '{kb_name}' ({})",
                kb.subfolder
            )));
        }
        check_rules(&rules)?;

        let constraint = FolderConstraint {
            kb_name: kb_name.to_string(),
            subfolder,
            rules,
        };
        self.storage
            .write(
                &self.constraint_path(kb_name, &constraint.subfolder),
                &serialize_folder_constraint(&constraint),
                WriteMode::Overwrite,
            )
            .await?;
        info!(component = "registry", kb_name = %kb_name, subfolder = %constraint.subfolder, "Folder constraint saved");
        Ok(constraint)
    }

    async fn get_folder_constraints(&self, kb_name: &str) -> Result<Vec<FolderConstraint>> {
        self.require(kb_name).await?;

        let listing = match self.storage.list(&self.constraints_dir(kb_name)).await {
            Ok(listing) => listing,
            Err(Error::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut constraints = Vec::with_capacity(listing.files.len());
        for path in listing.files.iter().filter(|p| p.ends_with(NOTE_EXTENSION)) {
            let parsed = match self.storage.read(path).await {
                Ok(text) => parse_folder_constraint(kb_name, &text),
                Err(e) => Err(e),
            };
            match parsed {
                Ok(constraint) => constraints.push(constraint),
                Err(e) => {
                    warn!(component = "registry", kb_name = %kb_name, path = %path, error = %e, "registry: skipping unreadable folder constraint")
                }
            }
        }
        debug!(component = "registry", kb_name = %kb_name, result_count = constraints.len(), "registry: loaded folder constraints");
        Ok(constraints)
    }
}
