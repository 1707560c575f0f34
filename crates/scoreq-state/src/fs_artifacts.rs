use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;

use crate::error::StorageError;
use crate::schema::ArtifactName;
use crate::storage_traits::{ArtifactStore, StorageResult};

/// Filesystem-backed artifact store.
///
/// Layout: `<root>/<artifact name>`, with `/` in names mapped to
/// subdirectories.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Create a new `FsArtifactStore` rooted at `root`. Creates `root` if needed.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, name: &ArtifactName) -> StorageResult<PathBuf> {
        let invalid = || StorageError::InvalidArtifactName {
            name: name.to_string(),
        };
        if name.as_str().is_empty() || name.as_str().split('/').any(str::is_empty) {
            return Err(invalid());
        }
        let relative = Path::new(name.as_str());
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(invalid());
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn read(&self, name: &ArtifactName) -> StorageResult<Vec<u8>> {
        let path = self.blob_path(name)?;
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::ArtifactNotFound {
                    name: name.to_string(),
                }
            } else {
                StorageError::Io(e)
            }
        })
    }

    async fn write(&self, name: &ArtifactName, data: &[u8]) -> StorageResult<()> {
        let path = self.blob_path(name)?;
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        // Write to a temp file in the same directory, then rename over the target.
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.persist(&path).map_err(|e| e.error)?;
        tracing::debug!(artifact = %name, bytes = data.len(), "Wrote artifact");
        Ok(())
    }

    async fn exists(&self, name: &ArtifactName) -> StorageResult<bool> {
        Ok(self.blob_path(name)?.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (tempfile::TempDir, FsArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn nested_names_create_directories() {
        let (dir, store) = make_store();
        let name = ArtifactName::new("submissions/1/2/run.txt");
        store.write(&name, b"program: p.zip\n").await.unwrap();

        assert!(dir.path().join("submissions/1/2/run.txt").is_file());
        assert_eq!(store.read(&name).await.unwrap(), b"program: p.zip\n");
    }

    #[tokio::test]
    async fn write_overwrites_previous_version() {
        let (_dir, store) = make_store();
        let name = ArtifactName::new("a/stdout.txt");
        store.write(&name, b"first").await.unwrap();
        store.write(&name, b"second").await.unwrap();

        assert_eq!(store.read(&name).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn read_missing_returns_not_found() {
        let (_dir, store) = make_store();
        match store.read(&ArtifactName::new("nope.zip")).await {
            Err(StorageError::ArtifactNotFound { name }) => assert_eq!(name, "nope.zip"),
            other => panic!("expected ArtifactNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn traversal_names_are_rejected() {
        let (_dir, store) = make_store();
        for bad in ["../escape.txt", "/etc/passwd", "a//b", ""] {
            let err = store
                .write(&ArtifactName::new(bad), b"x")
                .await
                .unwrap_err();
            assert!(
                matches!(err, StorageError::InvalidArtifactName { .. }),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn exists_tracks_writes() {
        let (_dir, store) = make_store();
        let name = ArtifactName::new("x/y.bin");
        assert!(!store.exists(&name).await.unwrap());
        store.write(&name, b"").await.unwrap();
        assert!(store.exists(&name).await.unwrap());
    }
}
