// Media Store - filesystem access for uploaded assets and shared web files
// Paths are '/'-separated and relative to the application root

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{AppError, AppResult};

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Create parent directories as needed and write `bytes`
    async fn write_file(&self, path: &str, bytes: &[u8]) -> AppResult<()>;
    /// Recursively copy a directory; a missing source copies nothing
    async fn copy_tree(&self, src: &str, dst: &str) -> AppResult<()>;
    /// Remove a directory tree; a missing tree is not an error
    async fn remove_tree(&self, path: &str) -> AppResult<()>;
    async fn remove_file(&self, path: &str) -> AppResult<()>;
    /// Fails with `NotFound` when the file does not exist
    async fn open_file(&self, path: &str) -> AppResult<Vec<u8>>;
}

/// Media store rooted at a directory on local disk
#[derive(Debug, Clone)]
pub struct DiskMediaStore {
    root: PathBuf,
}

impl DiskMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a relative media path onto disk, refusing anything that escapes the root
    pub fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            return Err(AppError::BadPayload(format!("Invalid media path: {}", path)));
        }
        Ok(self.root.join(relative))
    }
}

fn copy_dir_blocking(source: &Path, destination: &Path) -> std::io::Result<u64> {
    let mut copied = 0;
    std::fs::create_dir_all(destination)?;
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(std::io::Error::other)?;
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[async_trait]
impl MediaStore for DiskMediaStore {
    async fn write_file(&self, path: &str, bytes: &[u8]) -> AppResult<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        tracing::debug!("Wrote media file {}", target.display());
        Ok(())
    }

    async fn copy_tree(&self, src: &str, dst: &str) -> AppResult<()> {
        let source = self.resolve(src)?;
        let destination = self.resolve(dst)?;
        if !tokio::fs::try_exists(&source).await? {
            tracing::debug!("No media to copy at {}", source.display());
            return Ok(());
        }

        let copied = tokio::task::spawn_blocking(move || copy_dir_blocking(&source, &destination))
            .await
            .map_err(|e| AppError::Internal(format!("Media copy task failed: {}", e)))??;
        tracing::info!("Copied {} media files from {} to {}", copied, src, dst);
        Ok(())
    }

    async fn remove_tree(&self, path: &str) -> AppResult<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_dir_all(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_file(&self, path: &str) -> AppResult<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn open_file(&self, path: &str) -> AppResult<Vec<u8>> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("Missing media file {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_rejects_escapes() {
        let store = DiskMediaStore::new("/srv/app");
        assert_eq!(
            store.resolve("/upload/abc/a.jpg").unwrap(),
            PathBuf::from("/srv/app/upload/abc/a.jpg")
        );
        assert!(store.resolve("upload/../../etc/passwd").is_err());
        assert!(store.resolve("").is_err());
    }

    #[tokio::test]
    async fn test_copy_and_remove_tree() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskMediaStore::new(dir.path());
        store.write_file("upload/src/a.jpg", b"a").await.unwrap();
        store.write_file("upload/src/sub/b.mp3", b"b").await.unwrap();

        store.copy_tree("upload/src", "upload/dst").await.unwrap();
        assert_eq!(store.open_file("upload/dst/a.jpg").await.unwrap(), b"a");
        assert_eq!(store.open_file("upload/dst/sub/b.mp3").await.unwrap(), b"b");

        store.remove_tree("upload/src").await.unwrap();
        assert!(matches!(
            store.open_file("upload/src/a.jpg").await,
            Err(AppError::NotFound(_))
        ));
        store.remove_tree("upload/src").await.unwrap();
    }

    #[tokio::test]
    async fn test_copy_missing_source_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskMediaStore::new(dir.path());
        store.copy_tree("upload/none", "upload/dst").await.unwrap();
        assert!(!dir.path().join("upload/dst").exists());
    }
}
