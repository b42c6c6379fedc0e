//! # kbvault-store
//!
//! Storage-backed layer for kbvault.
//!
//! This crate provides:
//! - Vault storage adapters (local filesystem, in-memory)
//! - The knowledge base list cache
//! - The knowledge base registry with folder constraints
//! - Constraint-checked note operations
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kbvault_store::{FilesystemStorage, NoteService, VaultKnowledgeBaseRepository};
//!
//! let storage = Arc::new(FilesystemStorage::new("/home/me/vault"));
//! let registry = Arc::new(VaultKnowledgeBaseRepository::new(storage));
//! let notes = NoteService::new(registry.clone());
//!
//! let outcome = notes.create("research", "papers/2025-01-01-x.md", text).await?;
//! ```

pub mod cache;
pub mod knowledge_bases;
pub mod notes;
pub mod storage;

pub use cache::KnowledgeBaseCache;
pub use knowledge_bases::VaultKnowledgeBaseRepository;
pub use notes::NoteService;
pub use storage::{FilesystemStorage, MemoryStorage};

// Re-export core types for convenience
pub use kbvault_core::{
    CreateKnowledgeBaseRequest, Error, KnowledgeBaseRepository, Result, UpdateKnowledgeBaseRequest,
    VaultStorage, WriteMode,
};
