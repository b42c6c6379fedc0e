//! Structured logging schema and field name constants for kbvault.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, completed mutations |
//! | DEBUG | Decision points, resolved paths, selected constraints |
//! | TRACE | Per-item iteration (directory entries, rule checks) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID for one tool call. Format: UUIDv7.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Values: "registry", "list_cache", "notes", "fs_storage"
pub const COMPONENT: &str = "component";

/// Logical operation name, usually the tool name.
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Knowledge base name being operated on.
pub const KB_NAME: &str = "kb_name";

/// Vault-relative note path.
pub const NOTE_PATH: &str = "note_path";

/// Vault-relative subfolder of a knowledge base or constraint.
pub const SUBFOLDER: &str = "subfolder";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of items returned by a listing.
pub const RESULT_COUNT: &str = "result_count";

/// Number of validation issues raised.
pub const ISSUE_COUNT: &str = "issue_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Tagged error kind when an operation fails.
pub const ERROR_KIND: &str = "error_kind";

/// Every field name above, for schema checks.
pub const ALL_FIELDS: &[&str] = &[
    REQUEST_ID,
    SUBSYSTEM,
    COMPONENT,
    OPERATION,
    KB_NAME,
    NOTE_PATH,
    SUBFOLDER,
    DURATION_MS,
    RESULT_COUNT,
    ISSUE_COUNT,
    SUCCESS,
    ERROR_MSG,
    ERROR_KIND,
];
