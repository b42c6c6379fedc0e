//! Selection of the folder constraint that governs a note.

use crate::models::FolderConstraint;
use crate::paths::{normalize_path, parent_dir};

/// Find the most specific constraint whose subfolder contains `note_path`.
///
/// A constraint applies when the note lies anywhere below its subfolder. The
/// longest subfolder wins; on an exact length tie the earliest constraint in
/// `constraints` is kept. `None` means the note is unconstrained.
pub fn find_applicable<'a>(
    note_path: &str,
    constraints: &'a [FolderConstraint],
) -> Option<&'a FolderConstraint> {
    let note_path = normalize_path(note_path);
    let note_dir = parent_dir(&note_path);

    let mut best: Option<&FolderConstraint> = None;
    for constraint in constraints {
        let subfolder = normalize_path(&constraint.subfolder);
        let contains = note_dir == subfolder
            || note_path
                .strip_prefix(subfolder.as_str())
                .is_some_and(|rest| rest.starts_with('/'));
        if !contains {
            continue;
        }
        let longer = best.map_or(true, |b| {
            subfolder.len() > normalize_path(&b.subfolder).len()
        });
        if longer {
            best = Some(constraint);
        }
    }
    best
}
