//! Content-addressed cache for raw provider responses.

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{local::LocalFileSystem, memory::InMemory, path::Path, ObjectStore};
use std::sync::Arc;
use tracing::{debug, instrument};

use naturalness_common::{NaturalnessError, NaturalnessResult};

use crate::fingerprint::Fingerprint;

/// Key/value store of provider responses keyed by request fingerprint.
///
/// The presence of an entry is the only cache-hit signal. Entries never
/// expire and are never invalidated.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Check whether a response is stored for `fingerprint`.
    async fn contains(&self, fingerprint: &Fingerprint) -> NaturalnessResult<bool>;

    /// Read the stored response, or `None` if absent.
    async fn get(&self, fingerprint: &Fingerprint) -> NaturalnessResult<Option<Bytes>>;

    /// Store a response, replacing any previous entry.
    async fn put(&self, fingerprint: &Fingerprint, data: Bytes) -> NaturalnessResult<()>;
}

/// [`ResponseCache`] backed by any `object_store` implementation.
pub struct ObjectStoreCache {
    store: Arc<dyn ObjectStore>,
    label: String,
}

impl ObjectStoreCache {
    /// Wrap an existing object store.
    pub fn new(store: Arc<dyn ObjectStore>, label: impl Into<String>) -> Self {
        Self {
            store,
            label: label.into(),
        }
    }

    /// Cache rooted at a local directory, created if missing.
    pub fn local(dir: impl AsRef<std::path::Path>) -> NaturalnessResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            NaturalnessError::storage(format!(
                "Failed to create cache directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let store = LocalFileSystem::new_with_prefix(dir).map_err(|e| {
            NaturalnessError::storage(format!(
                "Failed to open cache directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        Ok(Self::new(Arc::new(store), dir.display().to_string()))
    }

    /// Volatile cache, used by tests.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "memory")
    }
}

#[async_trait]
impl ResponseCache for ObjectStoreCache {
    #[instrument(skip(self), fields(cache = %self.label, fingerprint = %fingerprint))]
    async fn contains(&self, fingerprint: &Fingerprint) -> NaturalnessResult<bool> {
        let location = Path::from(fingerprint.response_path());

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(NaturalnessError::storage(format!(
                "Failed to check {}: {}",
                location, e
            ))),
        }
    }

    #[instrument(skip(self), fields(cache = %self.label, fingerprint = %fingerprint))]
    async fn get(&self, fingerprint: &Fingerprint) -> NaturalnessResult<Option<Bytes>> {
        let location = Path::from(fingerprint.response_path());

        let result = match self.store.get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => {
                return Err(NaturalnessError::storage(format!(
                    "Failed to read {}: {}",
                    location, e
                )))
            }
        };

        let bytes = result
            .bytes()
            .await
            .map_err(|e| NaturalnessError::storage(format!("Failed to read bytes: {}", e)))?;

        debug!(size = bytes.len(), "Read cached response");
        Ok(Some(bytes))
    }

    #[instrument(skip(self, data), fields(cache = %self.label, fingerprint = %fingerprint))]
    async fn put(&self, fingerprint: &Fingerprint, data: Bytes) -> NaturalnessResult<()> {
        let location = Path::from(fingerprint.response_path());
        debug!(size = data.len(), "Writing cached response");

        self.store
            .put(&location, data.into())
            .await
            .map_err(|e| NaturalnessError::storage(format!("Failed to write {}: {}", location, e)))?;

        Ok(())
    }
}
