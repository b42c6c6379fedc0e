//! Error types for kbvault.

use thiserror::Error;

use crate::models::ValidationIssue;

/// Result type alias using kbvault's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for kbvault operations.
///
/// The first block of variants is the user-facing taxonomy reported by the
/// tool layer; the remaining variants are infrastructure failures.
#[derive(Error, Debug)]
pub enum Error {
    /// No knowledge base with this name
    #[error("Knowledge base not found: {0}")]
    KnowledgeBaseNotFound(String),

    /// A knowledge base with this name already exists
    #[error("Knowledge base already exists: {0}")]
    KnowledgeBaseAlreadyExists(String),

    /// Subfolder collides with another knowledge base's subfolder
    #[error("Subfolder '{subfolder}' overlaps with knowledge base '{existing_kb}' at '{existing_subfolder}'")]
    SubfolderOverlap {
        subfolder: String,
        existing_kb: String,
        existing_subfolder: String,
    },

    /// Note not found
    #[error("Note not found: {0}")]
    NoteNotFound(String),

    /// Note already exists at the target path
    #[error("Note already exists: {0}")]
    NoteAlreadyExists(String),

    /// Path escapes its knowledge base or contains a traversal segment
    #[error("Invalid note path: {0}")]
    InvalidNotePath(String),

    /// Content rejected by the applicable folder constraint
    #[error("Folder constraint violation for {path}: {} issue(s)", issues.len())]
    FolderConstraintViolation {
        path: String,
        issues: Vec<ValidationIssue>,
    },

    /// Constraint rules input is structurally malformed
    #[error("Schema validation failed: {0}")]
    SchemaValidationFailed(String),

    /// Storage path does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage path already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable tag reported to callers alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::KnowledgeBaseNotFound(_) => "KnowledgeBaseNotFound",
            Error::KnowledgeBaseAlreadyExists(_) => "KnowledgeBaseAlreadyExists",
            Error::SubfolderOverlap { .. } => "SubfolderOverlap",
            Error::NoteNotFound(_) => "NoteNotFound",
            Error::NoteAlreadyExists(_) => "NoteAlreadyExists",
            Error::InvalidNotePath(_) => "InvalidNotePath",
            Error::FolderConstraintViolation { .. } => "FolderConstraintViolation",
            Error::SchemaValidationFailed(_) => "SchemaValidationFailed",
            Error::NotFound(_) => "NotFound",
            Error::AlreadyExists(_) => "AlreadyExists",
            Error::InvalidInput(_) => "InvalidInput",
            Error::Serialization(_) => "Serialization",
            Error::Config(_) => "Config",
            Error::Io(_) => "Io",
        }
    }

    /// Violations carried by a constraint rejection, if any.
    pub fn issues(&self) -> Option<&[ValidationIssue]> {
        match self {
            Error::FolderConstraintViolation { issues, .. } => Some(issues),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IssueKind;

    #[test]
    fn test_error_display_kb_not_found() {
        let err = Error::KnowledgeBaseNotFound("research".to_string());
        assert_eq!(err.to_string(), "Knowledge base not found: research");
        assert_eq!(err.kind(), "KnowledgeBaseNotFound");
    }

    #[test]
    fn test_error_display_subfolder_overlap() {
        let err = Error::SubfolderOverlap {
            subfolder: "docs/api".to_string(),
            existing_kb: "docs".to_string(),
            existing_subfolder: "docs".to_string(),
        };
        assert!(err.to_string().contains("'docs/api'"));
        assert!(err.to_string().contains("knowledge base 'docs'"));
        assert_eq!(err.kind(), "SubfolderOverlap");
    }

    #[test]
    fn test_error_display_invalid_note_path() {
        let err = Error::InvalidNotePath("../etc/passwd".to_string());
        assert_eq!(err.to_string(), "Invalid note path: ../etc/passwd");
    }

    #[test]
    fn test_constraint_violation_carries_issues() {
        let issue = ValidationIssue::new("filename", IssueKind::PatternMismatch);
        let err = Error::FolderConstraintViolation {
            path: "notes/a.md".to_string(),
            issues: vec![issue.clone(), issue],
        };
        assert_eq!(
            err.to_string(),
            "Folder constraint violation for notes/a.md: 2 issue(s)"
        );
        assert_eq!(err.issues().map(|i| i.len()), Some(2));
        assert_eq!(err.kind(), "FolderConstraintViolation");
    }

    #[test]
    fn test_issues_absent_for_other_errors() {
        let err = Error::NoteNotFound("a.md".to_string());
        assert!(err.issues().is_none());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.kind(), "Io");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
