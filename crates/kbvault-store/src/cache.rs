//! JSON list cache of knowledge base summaries.
//!
//! The cache is a convenience for `list`: it is never the source of truth.
//! A missing, empty or unreadable cache means "rebuild from a scan", and a
//! failed write only logs a warning.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kbvault_core::defaults::KB_CACHE_FILE;
use kbvault_core::{Error, KnowledgeBaseSummary, Result, VaultStorage, WriteMode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Current on-disk format of the cache document.
pub const CACHE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheDocument {
    version: u32,
    updated_at: DateTime<Utc>,
    knowledge_bases: Vec<KnowledgeBaseSummary>,
}

/// Reads and writes `kb_cache.json` inside the knowledge base root.
pub struct KnowledgeBaseCache {
    storage: Arc<dyn VaultStorage>,
    path: String,
}

impl KnowledgeBaseCache {
    pub fn new(storage: Arc<dyn VaultStorage>, root_dir: &str) -> Self {
        Self {
            storage,
            path: format!("{root_dir}/{KB_CACHE_FILE}"),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Cached summaries, or `None` when the cache is absent or unusable.
    pub async fn load(&self) -> Option<Vec<KnowledgeBaseSummary>> {
        let text = match self.storage.read(&self.path).await {
            Ok(text) => text,
            Err(Error::NotFound(_)) => {
                debug!(component = "list_cache", cache_path = %self.path, "list_cache: miss");
                return None;
            }
            Err(e) => {
                warn!(component = "list_cache", cache_path = %self.path, error = %e, "list_cache: read failed");
                return None;
            }
        };

        match serde_json::from_str::<CacheDocument>(&text) {
            Ok(doc) if doc.version == CACHE_VERSION => Some(doc.knowledge_bases),
            Ok(doc) => {
                warn!(component = "list_cache", cache_path = %self.path, version = doc.version, "list_cache: unknown version, ignoring");
                None
            }
            Err(e) => {
                warn!(component = "list_cache", cache_path = %self.path, error = %e, "list_cache: corrupt, ignoring");
                None
            }
        }
    }

    /// Replace the cache contents. Failures are logged, never returned.
    pub async fn save(&self, entries: &[KnowledgeBaseSummary]) {
        if let Err(e) = self.try_save(entries).await {
            warn!(component = "list_cache", cache_path = %self.path, error = %e, "list_cache: write failed, invalidating");
            self.invalidate().await;
        }
    }

    async fn try_save(&self, entries: &[KnowledgeBaseSummary]) -> Result<()> {
        let doc = CacheDocument {
            version: CACHE_VERSION,
            updated_at: Utc::now(),
            knowledge_bases: entries.to_vec(),
        };
        let text = serde_json::to_string_pretty(&doc)?;
        self.storage
            .write(&self.path, &text, WriteMode::Overwrite)
            .await?;
        debug!(component = "list_cache", cache_path = %self.path, result_count = entries.len(), "list_cache: saved");
        Ok(())
    }

    /// Best-effort removal so the next `list` rebuilds from a scan.
    pub async fn invalidate(&self) {
        match self.storage.delete(&self.path).await {
            Ok(()) | Err(Error::NotFound(_)) => {}
            Err(e) => warn!(component = "list_cache", cache_path = %self.path, error = %e, "list_cache: invalidate failed"),
        }
    }
}

/// Insert `summary` or replace the entry with the same name, keeping the
/// list sorted by name.
pub fn upsert_entry(entries: &mut Vec<KnowledgeBaseSummary>, summary: KnowledgeBaseSummary) {
    match entries.iter_mut().find(|e| e.name == summary.name) {
        Some(existing) => *existing = summary,
        None => entries.push(summary),
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
}
