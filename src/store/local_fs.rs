//! Local filesystem object storage.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use log::{debug, trace};

use super::ObjectStorage;
use crate::error::{Error, Result};

/// Object store rooted in a local directory.
///
/// Public URLs are served by the HTTP layer under `{base_url}/files/`.
pub struct LocalFsStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalFsStorage {
    /// Store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create the root directory.
    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(Error::Validation(format!("invalid storage path: {}", path)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalFsStorage {
    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        trace!("download {path}");
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound("Object")),
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
        upsert: bool,
    ) -> Result<String> {
        let full = self.resolve(path)?;
        trace!("upload {path}, {} bytes", bytes.len());

        if !upsert && tokio::fs::try_exists(&full).await.unwrap_or(false) {
            return Err(Error::Conflict(format!("object {} already exists", path)));
        }
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage(e.to_string()))?;
        }
        tokio::fs::write(&full, &bytes)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;
        Ok(path.to_string())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/files/{}", self.base_url, path)
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        for path in paths {
            let full = self.resolve(path)?;
            match tokio::fs::remove_file(&full).await {
                Ok(()) => {},
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("remove {path}: already gone");
                },
                Err(e) => return Err(Error::Storage(e.to_string())),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFsStorage::new(dir.path(), "http://localhost:8080/");
        storage.init().await.unwrap();

        storage
            .upload("signed/abc.pdf", b"%PDF".to_vec(), "application/pdf", false)
            .await
            .unwrap();
        assert_eq!(storage.download("signed/abc.pdf").await.unwrap(), b"%PDF");
        assert_eq!(
            storage.public_url("signed/abc.pdf"),
            "http://localhost:8080/files/signed/abc.pdf"
        );

        storage.remove(&["signed/abc.pdf".to_string()]).await.unwrap();
        assert!(matches!(storage.download("signed/abc.pdf").await, Err(Error::NotFound(_))));
        storage.remove(&["signed/abc.pdf".to_string()]).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFsStorage::new(dir.path(), "http://x");
        assert!(storage.download("../etc/passwd").await.is_err());
        assert!(storage.download("/etc/passwd").await.is_err());
        assert!(storage.download("").await.is_err());
    }

    #[tokio::test]
    async fn test_no_upsert_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFsStorage::new(dir.path(), "http://x");
        storage.upload("a", vec![1], "x", false).await.unwrap();
        assert!(matches!(
            storage.upload("a", vec![2], "x", false).await,
            Err(Error::Conflict(_))
        ));
    }
}
