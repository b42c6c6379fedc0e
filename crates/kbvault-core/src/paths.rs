//! Vault path normalization and knowledge base scoping.

use crate::defaults::{KB_CACHE_FILE, NOTE_EXTENSION};
use crate::error::{Error, Result};
use crate::models::KnowledgeBase;

/// Strip leading/trailing slashes, collapse repeated slashes, drop `.` segments.
///
/// `..` segments are kept so callers can reject them explicitly.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether any segment of `path` is `..`.
pub fn has_traversal(path: &str) -> bool {
    path.split('/').any(|segment| segment == "..")
}

/// Whether `path` is `folder` itself or lies below it (slash-bounded).
pub fn is_within(path: &str, folder: &str) -> bool {
    path == folder
        || path
            .strip_prefix(folder)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Whether two folders collide: equal, or one is a slash-bounded prefix of the other.
///
/// `docs` and `docs/api` overlap; `docs` and `documents` do not.
pub fn subfolders_overlap(a: &str, b: &str) -> bool {
    is_within(a, b) || is_within(b, a)
}

/// Directory portion of a path, empty for top-level entries.
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Final `/`-delimited segment of a path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Normalize a folder supplied by a caller, rejecting traversal and empty input.
pub fn normalize_folder(raw: &str) -> Result<String> {
    let folder = normalize_path(raw);
    if has_traversal(&folder) {
        return Err(Error::InvalidNotePath(format!(
            "'{raw}' contains a '..' segment"
        )));
    }
    if folder.is_empty() {
        return Err(Error::InvalidNotePath(
            "subfolder must not be empty".to_string(),
        ));
    }
    Ok(folder)
}

/// Resolve a caller-supplied note path into a vault path inside `kb`.
///
/// Paths already under the knowledge base subfolder are kept; anything else
/// is treated as relative to it. Resolving a resolved path is a no-op.
pub fn resolve(kb: &KnowledgeBase, raw: &str) -> Result<String> {
    let relative = normalize_path(raw);
    if has_traversal(&relative) {
        return Err(Error::InvalidNotePath(format!(
            "'{raw}' contains a '..' segment"
        )));
    }

    let scoped = if is_within(&relative, &kb.subfolder) {
        relative
    } else if relative.is_empty() {
        kb.subfolder.clone()
    } else {
        format!("{}/{}", kb.subfolder, relative)
    };

    let resolved = normalize_path(&scoped);
    if !is_within(&resolved, &kb.subfolder) {
        return Err(Error::InvalidNotePath(format!(
            "'{raw}' is outside knowledge base '{}'",
            kb.name
        )));
    }
    Ok(resolved)
}

/// Resolve a note path and require it to name a note, not the KB folder itself.
///
/// Appends the note extension when missing.
pub fn resolve_note(kb: &KnowledgeBase, raw: &str) -> Result<String> {
    let resolved = resolve(kb, raw)?;
    if resolved == kb.subfolder {
        return Err(Error::InvalidNotePath(format!(
            "'{raw}' does not name a note"
        )));
    }
    if resolved.ends_with(NOTE_EXTENSION) {
        Ok(resolved)
    } else {
        Ok(format!("{resolved}{NOTE_EXTENSION}"))
    }
}

/// File-name-safe form of a subfolder: `/` becomes `_`, then everything
/// outside `[A-Za-z0-9_-]` is dropped.
pub fn sanitize_subfolder(subfolder: &str) -> String {
    subfolder
        .replace('/', "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Check that a knowledge base name is usable as a directory name.
pub fn validate_kb_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput(
            "Knowledge base name cannot be empty".to_string(),
        ));
    }
    if name.starts_with('.') || name.contains('/') || name.contains('\\') || name.contains("..")
    {
        return Err(Error::InvalidInput(format!(
            "Knowledge base name '{name}' must not start with '.' or contain path separators"
        )));
    }
    if name == KB_CACHE_FILE {
        return Err(Error::InvalidInput(format!(
            "Knowledge base name '{name}' is reserved"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn kb(subfolder: &str) -> KnowledgeBase {
        KnowledgeBase {
            name: "docs".to_string(),
            create_time: Utc::now(),
            description: String::new(),
            subfolder: subfolder.to_string(),
            organization_rules: String::new(),
        }
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/a//b/"), "a/b");
        assert_eq!(normalize_path("./a/./b"), "a/b");
        assert_eq!(normalize_path("///"), "");
        assert_eq!(normalize_path("a/../b"), "a/../b");
    }

    #[test]
    fn test_overlap_is_slash_bounded() {
        assert!(subfolders_overlap("docs", "docs"));
        assert!(subfolders_overlap("docs", "docs/api"));
        assert!(subfolders_overlap("docs/api", "docs"));
        assert!(!subfolders_overlap("docs", "documents"));
        assert!(!subfolders_overlap("docs/api", "docs/apis"));
    }

    #[test]
    fn test_resolve_prefixes_relative_paths() {
        let kb = kb("docs");
        assert_eq!(resolve(&kb, "guide.md").unwrap(), "docs/guide.md");
        assert_eq!(resolve(&kb, "/api//x.md").unwrap(), "docs/api/x.md");
    }

    #[test]
    fn test_resolve_keeps_scoped_paths() {
        let kb = kb("docs");
        assert_eq!(resolve(&kb, "docs/guide.md").unwrap(), "docs/guide.md");
        assert_eq!(resolve(&kb, "docs").unwrap(), "docs");
        assert_eq!(resolve(&kb, "").unwrap(), "docs");
    }

    #[test]
    fn test_resolve_does_not_confuse_sibling_prefix() {
        let kb = kb("docs");
        assert_eq!(
            resolve(&kb, "documents/x.md").unwrap(),
            "docs/documents/x.md"
        );
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let kb = kb("notes/research");
        for raw in ["a.md", "/deep/b.md", "notes/research/c.md", "notes/other.md"] {
            let once = resolve(&kb, raw).unwrap();
            let twice = resolve(&kb, &once).unwrap();
            assert_eq!(once, twice, "not idempotent for {raw}");
        }
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let kb = kb("docs");
        for raw in ["../etc/passwd", "docs/../secrets.md", "a/b/../../.."] {
            let err = resolve(&kb, raw).unwrap_err();
            assert!(matches!(err, Error::InvalidNotePath(_)), "{raw}");
        }
    }

    #[test]
    fn test_resolve_note_appends_extension() {
        let kb = kb("docs");
        assert_eq!(resolve_note(&kb, "guide").unwrap(), "docs/guide.md");
        assert_eq!(resolve_note(&kb, "guide.md").unwrap(), "docs/guide.md");
        assert!(matches!(
            resolve_note(&kb, "/").unwrap_err(),
            Error::InvalidNotePath(_)
        ));
    }

    #[test]
    fn test_normalize_folder() {
        assert_eq!(normalize_folder("/docs/api/").unwrap(), "docs/api");
        assert!(normalize_folder("").is_err());
        assert!(normalize_folder("docs/../x").is_err());
    }

    #[test]
    fn test_sanitize_subfolder() {
        assert_eq!(sanitize_subfolder("docs/api/v2"), "docs_api_v2");
        assert_eq!(sanitize_subfolder("my notes/2025 (old)"), "mynotes_2025old");
        assert_eq!(sanitize_subfolder("a-b/c_d"), "a-b_c_d");
    }

    #[test]
    fn test_parent_and_file_name() {
        assert_eq!(parent_dir("docs/api/x.md"), "docs/api");
        assert_eq!(parent_dir("x.md"), "");
        assert_eq!(file_name("docs/api/x.md"), "x.md");
        assert_eq!(file_name("x.md"), "x.md");
    }

    #[test]
    fn test_validate_kb_name() {
        assert!(validate_kb_name("research").is_ok());
        assert!(validate_kb_name("My KB").is_ok());
        assert!(validate_kb_name("").is_err());
        assert!(validate_kb_name(".hidden").is_err());
        assert!(validate_kb_name("a/b").is_err());
        assert!(matches!(
            validate_kb_name(KB_CACHE_FILE),
            Err(Error::InvalidInput(_))
        ));
    }
}
