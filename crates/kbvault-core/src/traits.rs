//! Core traits for kbvault abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable storage backends and testability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::*;

// =============================================================================
// STORAGE TRAITS
// =============================================================================

/// How a write treats an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail with `AlreadyExists` if the path exists.
    Create,
    /// Fail with `NotFound` if the path does not exist.
    Modify,
    /// Create or replace.
    Overwrite,
}

/// One level of a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirListing {
    /// Vault-relative paths of files directly inside the directory.
    pub files: Vec<String>,
    /// Vault-relative paths of subdirectories directly inside the directory.
    pub folders: Vec<String>,
}

/// Host document hierarchy, addressed by vault-relative `/`-separated paths.
///
/// Implementations report a missing path as `Error::NotFound` and a
/// conflicting create as `Error::AlreadyExists`.
#[async_trait]
pub trait VaultStorage: Send + Sync {
    /// Read a document.
    async fn read(&self, path: &str) -> Result<String>;

    /// Write a document according to `mode`.
    async fn write(&self, path: &str, text: &str, mode: WriteMode) -> Result<()>;

    /// Delete a document.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Rename a document. The destination must not exist.
    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Create a directory and its parents. Idempotent.
    async fn ensure_dir(&self, path: &str) -> Result<()>;

    /// List one level of a directory.
    async fn list(&self, path: &str) -> Result<DirListing>;

    /// Check if a file or directory exists.
    async fn exists(&self, path: &str) -> Result<bool>;
}

// =============================================================================
// KNOWLEDGE BASE REPOSITORY TRAITS
// =============================================================================

/// Request for creating a knowledge base.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateKnowledgeBaseRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub subfolder: String,
    #[serde(default)]
    pub organization_rules: String,
}

/// Partial update of a knowledge base; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateKnowledgeBaseRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subfolder: Option<String>,
    #[serde(default)]
    pub organization_rules: Option<String>,
}

impl UpdateKnowledgeBaseRequest {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.subfolder.is_none() && self.organization_rules.is_none()
    }
}

/// Repository for knowledge base and folder constraint records.
#[async_trait]
pub trait KnowledgeBaseRepository: Send + Sync {
    /// Create a knowledge base.
    async fn add(&self, req: CreateKnowledgeBaseRequest) -> Result<KnowledgeBase>;

    /// Apply a partial update.
    async fn update(&self, name: &str, req: UpdateKnowledgeBaseRequest) -> Result<KnowledgeBase>;

    /// Fetch a knowledge base, `None` if absent.
    async fn get(&self, name: &str) -> Result<Option<KnowledgeBase>>;

    /// List summaries of all knowledge bases.
    async fn list(&self) -> Result<Vec<KnowledgeBaseSummary>>;

    /// Add or replace the constraint for a subfolder of a knowledge base.
    async fn add_folder_constraint(
        &self,
        kb_name: &str,
        subfolder: &str,
        rules: ConstraintRules,
    ) -> Result<FolderConstraint>;

    /// All readable constraints of a knowledge base.
    async fn get_folder_constraints(&self, kb_name: &str) -> Result<Vec<FolderConstraint>>;
}
