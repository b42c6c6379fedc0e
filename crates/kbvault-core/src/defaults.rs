//! Centralized default constants for kbvault.
//!
//! **This module is the single source of truth** for shared default values.
//! Every crate references these constants instead of defining its own magic
//! strings or numbers.

// =============================================================================
// VAULT LAYOUT
// =============================================================================

/// Reserved hidden top-level directory holding knowledge base records.
pub const KB_ROOT_DIR: &str = ".knowledge-bases";

/// Per-knowledge-base metadata document.
pub const KB_META_FILE: &str = "meta.md";

/// Per-knowledge-base directory of folder constraint documents.
pub const CONSTRAINTS_DIR: &str = "folder_constraints";

/// JSON list cache of knowledge base summaries, inside [`KB_ROOT_DIR`].
pub const KB_CACHE_FILE: &str = "kb_cache.json";

/// Extension of note and record documents.
pub const NOTE_EXTENSION: &str = ".md";

// =============================================================================
// LISTING
// =============================================================================

/// Characters of `organization_rules` kept in list summaries.
pub const RULES_PREVIEW_LENGTH: usize = 200;

// =============================================================================
// LOGGING
// =============================================================================

/// Default `RUST_LOG` filter when none is set.
pub const LOG_FILTER: &str = "kbvault_api=info,kbvault_store=info,kbvault_core=info";

/// Default log file name when `LOG_FILE` points at a directory-less name.
pub const LOG_FILE_NAME: &str = "kbvault.log";
