//! Object storage interface for tile blobs (MinIO/S3 compatible).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, Stream};
use futures::{StreamExt, TryStreamExt};
use metrics::counter;
use object_store::{
    aws::AmazonS3Builder, memory::InMemory, path::Path, Attribute, Attributes, ClientOptions,
    ObjectMeta, ObjectStore, PutOptions, PutPayload,
};
use tracing::{debug, instrument, warn};

use tile_common::error::BoxError;
use tile_common::{StorageError, StorageResult};

use crate::config::S3BlobStoreConfig;

/// Size and modification time of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Outcome of a metadata-only existence probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Found(ObjectInfo),
    NotFound,
}

impl Probe {
    pub fn exists(&self) -> bool {
        matches!(self, Probe::Found(_))
    }
}

/// A fetched object with its full payload.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub info: ObjectInfo,
}

/// One entry of a prefix listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub location: Path,
    pub size: u64,
}

impl From<&ObjectMeta> for ObjectInfo {
    fn from(meta: &ObjectMeta) -> Self {
        Self {
            size: meta.size as u64,
            last_modified: meta.last_modified,
        }
    }
}

/// The object-storage capability the blob store is built on.
///
/// "Not found" is never an error here: it is `None` from `get` and
/// `Probe::NotFound` from `head`. Every other failure is a
/// `StorageError::Backend` naming the operation and key.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    async fn get(&self, key: &Path) -> StorageResult<Option<StoredObject>>;

    async fn head(&self, key: &Path) -> StorageResult<Probe>;

    async fn put(&self, key: &Path, data: Bytes, content_type: &str) -> StorageResult<()>;

    async fn delete(&self, key: &Path) -> StorageResult<()>;

    /// Delete many keys in one request, quietly.
    ///
    /// Missing keys and individual failures do not fail the batch; a failed
    /// request, or a batch where every key failed, does.
    async fn delete_batch(&self, keys: Vec<Path>) -> StorageResult<()>;

    /// Lazily list every object under `prefix` (whole path segments only).
    fn list_by_prefix<'a>(&'a self, prefix: &Path) -> BoxStream<'a, StorageResult<ObjectEntry>>;

    /// Human-readable location of the backing store, for logs.
    fn describe(&self) -> String;
}

/// `ObjectBackend` over any `object_store` implementation.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStoreBackend {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Create an S3 client from config.
    pub fn from_config(config: &S3BlobStoreConfig) -> StorageResult<Self> {
        config.validate()?;

        let mut client_options = ClientOptions::new().with_allow_http(!config.use_https);
        if let Some(max_connections) = config.max_connections {
            client_options = client_options.with_pool_max_idle_per_host(max_connections);
        }
        if let Some(proxy_url) = &config.proxy_url {
            client_options = client_options.with_proxy_url(proxy_url);
        }
        if let Some(timeout) = config.request_timeout_secs {
            client_options = client_options.with_timeout(Duration::from_secs(timeout));
        }

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key)
            .with_client_options(client_options);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::Config(format!("Failed to create S3 client: {}", e)))?;

        debug!(bucket = %config.bucket, endpoint = ?config.endpoint, "Initialized S3 client");
        Ok(Self::new(Arc::new(store), config.bucket.clone()))
    }

    /// A process-local store, for tests and local runs.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "memory")
    }
}

#[async_trait]
impl ObjectBackend for ObjectStoreBackend {
    #[instrument(skip(self), fields(bucket = %self.bucket, key = %key))]
    async fn get(&self, key: &Path) -> StorageResult<Option<StoredObject>> {
        let result = match self.store.get(key).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(StorageError::backend("get", key.as_ref(), e)),
        };

        let info = ObjectInfo::from(&result.meta);
        let data = result
            .bytes()
            .await
            .map_err(|e| StorageError::backend("get", key.as_ref(), e))?;

        debug!(size = data.len(), "Read object");
        Ok(Some(StoredObject { data, info }))
    }

    #[instrument(skip(self), fields(bucket = %self.bucket, key = %key))]
    async fn head(&self, key: &Path) -> StorageResult<Probe> {
        match self.store.head(key).await {
            Ok(meta) => Ok(Probe::Found(ObjectInfo::from(&meta))),
            Err(object_store::Error::NotFound { .. }) => Ok(Probe::NotFound),
            Err(e) => Err(StorageError::backend("head", key.as_ref(), e)),
        }
    }

    #[instrument(skip(self, data), fields(bucket = %self.bucket, key = %key, size = data.len()))]
    async fn put(&self, key: &Path, data: Bytes, content_type: &str) -> StorageResult<()> {
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(key, PutPayload::from(data), options)
            .await
            .map_err(|e| StorageError::backend("put", key.as_ref(), e))?;

        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket, key = %key))]
    async fn delete(&self, key: &Path) -> StorageResult<()> {
        match self.store.delete(key).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(StorageError::backend("delete", key.as_ref(), e)),
        }
    }

    #[instrument(skip(self, keys), fields(bucket = %self.bucket, count = keys.len()))]
    async fn delete_batch(&self, keys: Vec<Path>) -> StorageResult<()> {
        let submitted = keys.len();
        if submitted == 0 {
            return Ok(());
        }

        let locations = stream::iter(keys.into_iter().map(Ok)).boxed();
        settle_batch(submitted, self.store.delete_stream(locations)).await
    }

    fn list_by_prefix<'a>(&'a self, prefix: &Path) -> BoxStream<'a, StorageResult<ObjectEntry>> {
        let listed = prefix.to_string();
        self.store
            .list(Some(prefix))
            .map_ok(|meta| ObjectEntry {
                size: meta.size as u64,
                location: meta.location,
            })
            .map_err(move |e| StorageError::backend("list", listed.clone(), e))
            .boxed()
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.bucket, self.store)
    }
}

/// Fold the per-key results of a quiet batch delete into one outcome.
///
/// Missing keys count as deleted. Failed keys are logged and counted; the
/// batch fails only when none of its keys could be deleted. A stream that
/// yields fewer results than keys were submitted means a whole request
/// failed, and that always fails the batch.
async fn settle_batch(
    submitted: usize,
    mut results: impl Stream<Item = object_store::Result<Path>> + Unpin,
) -> StorageResult<()> {
    let mut received = 0usize;
    let mut failures = 0usize;
    let mut first_failure = None;
    while let Some(result) = results.next().await {
        received += 1;
        match result {
            Ok(_) | Err(object_store::Error::NotFound { .. }) => {}
            Err(e) => {
                failures += 1;
                warn!(error = %e, "Failed to delete object in batch");
                first_failure.get_or_insert(e);
            }
        }
    }

    if failures > 0 {
        counter!("tile_store_batch_delete_failures_total").increment(failures as u64);
    }

    let keys = format!("{} keys", submitted);
    if received < submitted {
        let source: BoxError = match first_failure {
            Some(e) => e.into(),
            None => format!("{} results for {} keys", received, submitted).into(),
        };
        return Err(StorageError::backend("delete_batch", keys, source));
    }
    match first_failure {
        Some(e) if failures == submitted => Err(StorageError::backend("delete_batch", keys, e)),
        _ => Ok(()),
    }
}
