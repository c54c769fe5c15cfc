//! Deadline decorator for object storage.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;

use super::ObjectStorage;
use crate::error::{Error, Result};

/// Applies a deadline to outbound transfers of an inner store.
///
/// Expired calls surface as [`Error::Timeout`], which is retryable.
pub struct TimeoutStorage {
    inner: Arc<dyn ObjectStorage>,
    limit: Duration,
}

impl TimeoutStorage {
    /// Wrap `inner` with a per-call deadline.
    pub fn new(inner: Arc<dyn ObjectStorage>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl ObjectStorage for TimeoutStorage {
    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        match tokio::time::timeout(self.limit, self.inner.download(path)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("download of {path} exceeded {:?}", self.limit);
                Err(Error::Timeout(format!("download {}", path)))
            },
        }
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<String> {
        let call = self.inner.upload(path, bytes, content_type, upsert);
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("upload of {path} exceeded {:?}", self.limit);
                Err(Error::Timeout(format!("upload {}", path)))
            },
        }
    }

    fn public_url(&self, path: &str) -> String {
        self.inner.public_url(path)
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        match tokio::time::timeout(self.limit, self.inner.remove(paths)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout("remove".to_string())),
        }
    }
}
