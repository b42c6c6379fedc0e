//! Vault storage adapters.
//!
//! [`FilesystemStorage`] maps vault paths onto a directory tree and writes
//! atomically (temp file + rename). [`MemoryStorage`] keeps everything in
//! maps and backs the unit tests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use async_trait::async_trait;
use kbvault_core::paths::{has_traversal, normalize_path, parent_dir};
use kbvault_core::{DirListing, Error, Result, VaultStorage, WriteMode};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Normalize a vault path and refuse anything that climbs out of the vault.
fn vault_path(path: &str) -> Result<String> {
    let normalized = normalize_path(path);
    if has_traversal(&normalized) {
        return Err(Error::InvalidInput(format!(
            "storage path '{path}' contains a '..' segment"
        )));
    }
    Ok(normalized)
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

// =============================================================================
// FILESYSTEM
// =============================================================================

/// Storage rooted at a vault directory on the local filesystem.
pub struct FilesystemStorage {
    base_path: PathBuf,
}

impl FilesystemStorage {
    /// Create a storage adapter rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &std::path::Path {
        &self.base_path
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        let normalized = vault_path(path)?;
        let mut full = self.base_path.clone();
        for segment in normalized.split('/').filter(|s| !s.is_empty()) {
            full.push(segment);
        }
        Ok(full)
    }

    /// Check that the vault root is a writable directory.
    pub async fn validate(&self) -> Result<()> {
        let meta = fs::metadata(&self.base_path).await.map_err(|e| {
            Error::Config(format!(
                "vault path {} is not accessible: {e}",
                self.base_path.display()
            ))
        })?;
        if !meta.is_dir() {
            return Err(Error::Config(format!(
                "vault path {} is not a directory",
                self.base_path.display()
            )));
        }
        if meta.permissions().readonly() {
            return Err(Error::Config(format!(
                "vault path {} is read-only",
                self.base_path.display()
            )));
        }
        Ok(())
    }
}

fn map_not_found(err: std::io::Error, path: &str) -> Error {
    if err.kind() == std::io::ErrorKind::NotFound {
        Error::NotFound(path.to_string())
    } else {
        Error::Io(err)
    }
}

#[async_trait]
impl VaultStorage for FilesystemStorage {
    async fn read(&self, path: &str) -> Result<String> {
        let full_path = self.full_path(path)?;
        fs::read_to_string(&full_path)
            .await
            .map_err(|e| map_not_found(e, path))
    }

    async fn write(&self, path: &str, text: &str, mode: WriteMode) -> Result<()> {
        let full_path = self.full_path(path)?;
        debug!(component = "fs_storage", storage_path = %path, full_path = %full_path.display(), size = text.len(), ?mode, "vault_storage: write");

        let exists = fs::try_exists(&full_path).await?;
        match mode {
            WriteMode::Create if exists => return Err(Error::AlreadyExists(path.to_string())),
            WriteMode::Modify if !exists => return Err(Error::NotFound(path.to_string())),
            _ => {}
        }

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(component = "fs_storage", parent = %parent.display(), error = %e, "vault_storage: create_dir_all failed");
                e
            })?;
        }

        // Temp file lives beside the target so the rename stays on one filesystem
        let file_name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidInput(format!("storage path '{path}' has no file name")))?;
        let temp_path = full_path.with_file_name(format!(".{file_name}.tmp"));

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            warn!(component = "fs_storage", temp_path = %temp_path.display(), error = %e, "vault_storage: File::create failed");
            e
        })?;
        file.write_all(text.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(component = "fs_storage", from = %temp_path.display(), to = %full_path.display(), error = %e, "vault_storage: rename failed");
            e
        })?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path)?;
        fs::remove_file(&full_path)
            .await
            .map_err(|e| map_not_found(e, path))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from_path = self.full_path(from)?;
        let to_path = self.full_path(to)?;

        if !fs::try_exists(&from_path).await? {
            return Err(Error::NotFound(from.to_string()));
        }
        if fs::try_exists(&to_path).await? {
            return Err(Error::AlreadyExists(to.to_string()));
        }
        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&from_path, &to_path).await?;
        Ok(())
    }

    async fn ensure_dir(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path)?;
        fs::create_dir_all(&full_path).await?;
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<DirListing> {
        let dir = vault_path(path)?;
        let full_path = self.full_path(&dir)?;
        let mut entries = fs::read_dir(&full_path)
            .await
            .map_err(|e| map_not_found(e, path))?;

        let mut listing = DirListing::default();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            // Leftover temp files from an interrupted write
            if name.starts_with('.') && name.ends_with(".tmp") {
                continue;
            }
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                listing.folders.push(join(&dir, &name));
            } else if file_type.is_file() {
                listing.files.push(join(&dir, &name));
            }
        }
        listing.files.sort();
        listing.folders.sort();
        Ok(listing)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.full_path(path)?;
        Ok(fs::try_exists(full_path).await?)
    }
}

// =============================================================================
// MEMORY
// =============================================================================

#[derive(Default)]
struct MemoryState {
    files: BTreeMap<String, String>,
    dirs: BTreeSet<String>,
}

impl MemoryState {
    fn add_ancestors(&mut self, path: &str) {
        let mut dir = parent_dir(path);
        while !dir.is_empty() {
            if !self.dirs.insert(dir.to_string()) {
                break;
            }
            dir = parent_dir(dir);
        }
    }
}

/// In-memory storage. Directories are created implicitly by writes.
#[derive(Default)]
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VaultStorage for MemoryStorage {
    async fn read(&self, path: &str) -> Result<String> {
        let path = vault_path(path)?;
        let state = self.state.read().await;
        state
            .files
            .get(&path)
            .cloned()
            .ok_or(Error::NotFound(path))
    }

    async fn write(&self, path: &str, text: &str, mode: WriteMode) -> Result<()> {
        let path = vault_path(path)?;
        let mut state = self.state.write().await;
        let exists = state.files.contains_key(&path);
        match mode {
            WriteMode::Create if exists => return Err(Error::AlreadyExists(path)),
            WriteMode::Modify if !exists => return Err(Error::NotFound(path)),
            _ => {}
        }
        state.add_ancestors(&path);
        state.files.insert(path, text.to_string());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let path = vault_path(path)?;
        let mut state = self.state.write().await;
        state
            .files
            .remove(&path)
            .map(|_| ())
            .ok_or(Error::NotFound(path))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from = vault_path(from)?;
        let to = vault_path(to)?;
        let mut state = self.state.write().await;
        if state.files.contains_key(&to) {
            return Err(Error::AlreadyExists(to));
        }
        let text = state.files.remove(&from).ok_or(Error::NotFound(from))?;
        state.add_ancestors(&to);
        state.files.insert(to, text);
        Ok(())
    }

    async fn ensure_dir(&self, path: &str) -> Result<()> {
        let path = vault_path(path)?;
        if path.is_empty() {
            return Ok(());
        }
        let mut state = self.state.write().await;
        state.add_ancestors(&path);
        state.dirs.insert(path);
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<DirListing> {
        let dir = vault_path(path)?;
        let state = self.state.read().await;
        if !dir.is_empty() && !state.dirs.contains(&dir) {
            return Err(Error::NotFound(dir));
        }
        Ok(DirListing {
            files: state
                .files
                .keys()
                .filter(|p| parent_dir(p) == dir)
                .cloned()
                .collect(),
            folders: state
                .dirs
                .iter()
                .filter(|p| parent_dir(p) == dir)
                .cloned()
                .collect(),
        })
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let path = vault_path(path)?;
        let state = self.state.read().await;
        Ok(path.is_empty() || state.files.contains_key(&path) || state.dirs.contains(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn exercise(storage: &dyn VaultStorage) {
        storage
            .write("notes/a.md", "hello", WriteMode::Create)
            .await
            .unwrap();
        assert_eq!(storage.read("notes/a.md").await.unwrap(), "hello");
        assert!(storage.exists("notes").await.unwrap());
        assert!(storage.exists("/notes/a.md").await.unwrap());

        let err = storage
            .write("notes/a.md", "again", WriteMode::Create)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        let err = storage
            .write("notes/missing.md", "x", WriteMode::Modify)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        storage
            .write("notes/a.md", "updated", WriteMode::Modify)
            .await
            .unwrap();
        assert_eq!(storage.read("notes/a.md").await.unwrap(), "updated");

        storage
            .write("notes/deep/b.md", "b", WriteMode::Overwrite)
            .await
            .unwrap();
        let listing = storage.list("notes").await.unwrap();
        assert_eq!(listing.files, vec!["notes/a.md".to_string()]);
        assert_eq!(listing.folders, vec!["notes/deep".to_string()]);

        storage.rename("notes/a.md", "archive/a.md").await.unwrap();
        assert!(!storage.exists("notes/a.md").await.unwrap());
        assert_eq!(storage.read("archive/a.md").await.unwrap(), "updated");

        let err = storage
            .rename("archive/a.md", "notes/deep/b.md")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        storage.delete("archive/a.md").await.unwrap();
        assert!(matches!(
            storage.read("archive/a.md").await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(
            storage.delete("archive/a.md").await.unwrap_err(),
            Error::NotFound(_)
        ));

        storage.ensure_dir("empty/inner").await.unwrap();
        assert!(storage.exists("empty/inner").await.unwrap());
        assert!(storage.list("empty/inner").await.unwrap().files.is_empty());
        assert!(matches!(
            storage.list("nowhere").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_memory_storage_contract() {
        exercise(&MemoryStorage::new()).await;
    }

    #[tokio::test]
    async fn test_filesystem_storage_contract() {
        let dir = TempDir::new().unwrap();
        exercise(&FilesystemStorage::new(dir.path())).await;
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let storage = MemoryStorage::new();
        let err = storage.read("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let dir = TempDir::new().unwrap();
        let fs_storage = FilesystemStorage::new(dir.path());
        assert!(fs_storage
            .write("a/../../x.md", "x", WriteMode::Overwrite)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_filesystem_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(dir.path());
        storage
            .write("n/a.md", "x", WriteMode::Overwrite)
            .await
            .unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path().join("n"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.md".to_string()]);
    }

    #[tokio::test]
    async fn test_filesystem_validate() {
        let dir = TempDir::new().unwrap();
        assert!(FilesystemStorage::new(dir.path()).validate().await.is_ok());
        let missing = FilesystemStorage::new(dir.path().join("missing"));
        assert!(matches!(
            missing.validate().await.unwrap_err(),
            Error::Config(_)
        ));
    }
}
