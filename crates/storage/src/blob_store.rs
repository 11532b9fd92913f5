//! Tile blob store backed by an object-storage bucket.
//!
//! [`BlobStore`] is the contract a caching tile server codes against;
//! [`S3BlobStore`] implements it on top of an [`ObjectBackend`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use metrics::counter;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, trace, warn};

use tile_common::{StorageError, StorageResult, TileObject, TileRange};

use crate::bulk_delete::delete_under_prefix;
use crate::config::{S3BlobStoreConfig, MAX_DELETE_BATCH_SIZE};
use crate::key_builder::TmsKeyBuilder;
use crate::listeners::{BlobStoreListener, ListenerList};
use crate::object_store::{ObjectBackend, ObjectStoreBackend, Probe};
use crate::properties::{decode_properties, encode_properties, PROPERTIES_CONTENT_TYPE};

/// Storage contract for cached tiles.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a tile's blob; the tile must carry a blob and a format.
    async fn put(&self, tile: &TileObject) -> StorageResult<()>;

    /// Fill in the tile's blob, size and creation time.
    ///
    /// Returns `false`, leaving the tile untouched, if it is not stored.
    async fn get(&self, tile: &mut TileObject) -> StorageResult<bool>;

    /// Remove a tile, recording the freed size in `tile.blob_size`.
    async fn delete_tile(&self, tile: &mut TileObject) -> StorageResult<bool>;

    /// Remove every tile and the metadata of a layer.
    async fn delete_layer(&self, layer_name: &str) -> StorageResult<bool>;

    /// Remove every tile of a layer in one gridset.
    async fn delete_by_gridset_id(&self, layer_name: &str, gridset_id: &str)
        -> StorageResult<bool>;

    async fn delete_range(&self, range: &TileRange) -> StorageResult<bool>;

    async fn rename(&self, old_layer_name: &str, new_layer_name: &str) -> StorageResult<bool>;

    /// Remove everything in the store.
    async fn clear(&self) -> StorageResult<()>;

    async fn get_layer_metadata(&self, layer_name: &str, key: &str)
        -> StorageResult<Option<String>>;

    async fn put_layer_metadata(&self, layer_name: &str, key: &str, value: &str)
        -> StorageResult<()>;

    /// Release the connection pool and the listeners; later calls fail.
    async fn destroy(&self);

    /// Register a change listener. Ignored once the store is destroyed.
    fn add_listener(&self, listener: Arc<dyn BlobStoreListener>);

    fn remove_listener(&self, listener: &Arc<dyn BlobStoreListener>) -> bool;
}

/// Blob store keeping tiles as objects in an S3-compatible bucket.
pub struct S3BlobStore {
    backend: RwLock<Option<Arc<dyn ObjectBackend>>>,
    key_builder: TmsKeyBuilder,
    listeners: ListenerList,
    destroyed: AtomicBool,
    delete_batch_size: usize,
}

impl S3BlobStore {
    /// Build a store for the configured bucket.
    ///
    /// No request is made; use [`S3BlobStore::connect`] to also verify access.
    pub fn new(config: &S3BlobStoreConfig) -> StorageResult<Self> {
        let backend = ObjectStoreBackend::from_config(config)?;
        Ok(Self::with_backend(Arc::new(backend), config.key_prefix())
            .with_delete_batch_size(config.delete_batch_size))
    }

    /// Build a store and check that the bucket is reachable with the
    /// configured credentials.
    pub async fn connect(config: &S3BlobStoreConfig) -> StorageResult<Self> {
        let store = Self::new(config)?;
        store.check_access().await?;
        Ok(store)
    }

    /// Build a store over any backend, e.g. an in-memory one.
    pub fn with_backend(backend: Arc<dyn ObjectBackend>, prefix: &str) -> Self {
        info!(backend = %backend.describe(), prefix, "Initializing tile blob store");
        Self {
            backend: RwLock::new(Some(backend)),
            key_builder: TmsKeyBuilder::new(prefix),
            listeners: ListenerList::new(),
            destroyed: AtomicBool::new(false),
            delete_batch_size: MAX_DELETE_BATCH_SIZE,
        }
    }

    pub fn with_delete_batch_size(mut self, batch_size: usize) -> Self {
        self.delete_batch_size = batch_size.clamp(1, MAX_DELETE_BATCH_SIZE);
        self
    }

    pub fn key_builder(&self) -> &TmsKeyBuilder {
        &self.key_builder
    }

    /// List at most one object under the root prefix.
    ///
    /// Fails with a backend error if the bucket is missing or the credentials
    /// are rejected.
    pub async fn check_access(&self) -> StorageResult<()> {
        let backend = self.backend().await?;
        debug!(backend = %backend.describe(), "Checking access rights to bucket");
        backend
            .list_by_prefix(self.key_builder.prefix())
            .try_next()
            .await?;
        Ok(())
    }

    async fn backend(&self) -> StorageResult<Arc<dyn ObjectBackend>> {
        self.backend
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or(StorageError::Destroyed)
    }

    async fn load_layer_metadata(
        &self,
        backend: &dyn ObjectBackend,
        layer_name: &str,
    ) -> StorageResult<BTreeMap<String, String>> {
        let key = self.key_builder.layer_metadata(layer_name)?;
        match backend.get(&key).await? {
            Some(object) => decode_properties(&object.data),
            None => Ok(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    #[instrument(skip(self, tile), fields(tile = %tile))]
    async fn put(&self, tile: &TileObject) -> StorageResult<()> {
        let blob = tile
            .blob
            .clone()
            .ok_or_else(|| StorageError::invalid_argument("tile blob is required"))?;
        if tile.blob_format.is_empty() {
            return Err(StorageError::invalid_argument("tile format is required"));
        }

        let key = self.key_builder.for_tile(tile)?;
        let backend = self.backend().await?;

        // The existence probe only serves listeners; skip the round trip without them
        let notify = !self.listeners.is_empty();
        let previous = if notify {
            match backend.head(&key).await? {
                Probe::Found(info) => Some(info.size),
                Probe::NotFound => None,
            }
        } else {
            None
        };

        trace!(key = %key, "Storing tile");
        let size = blob.len() as u64;
        backend.put(&key, blob, &tile.blob_format).await?;
        counter!("tile_store_puts_total").increment(1);
        counter!("tile_store_put_bytes_total").increment(size);

        if notify {
            match previous {
                Some(old_size) => self.listeners.send_tile_updated(tile, old_size),
                None => self.listeners.send_tile_stored(tile),
            }
        }
        Ok(())
    }

    #[instrument(skip(self, tile), fields(tile = %tile))]
    async fn get(&self, tile: &mut TileObject) -> StorageResult<bool> {
        let key = self.key_builder.for_tile(tile)?;
        let backend = self.backend().await?;

        let Some(object) = backend.get(&key).await? else {
            counter!("tile_store_get_misses_total").increment(1);
            return Ok(false);
        };

        trace!(key = %key, size = object.data.len(), "Fetched tile");
        counter!("tile_store_get_hits_total").increment(1);
        tile.set_blob(object.data);
        tile.created = Some(object.info.last_modified);
        Ok(true)
    }

    #[instrument(skip(self, tile), fields(tile = %tile))]
    async fn delete_tile(&self, tile: &mut TileObject) -> StorageResult<bool> {
        let key = self.key_builder.for_tile(tile)?;
        let backend = self.backend().await?;

        let Probe::Found(info) = backend.head(&key).await? else {
            return Ok(false);
        };

        backend.delete(&key).await?;
        counter!("tile_store_deletes_total").increment(1);
        tile.blob_size = info.size;
        self.listeners.send_tile_deleted(tile);
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn delete_layer(&self, layer_name: &str) -> StorageResult<bool> {
        let layer_prefix = self.key_builder.for_layer(layer_name)?;
        let metadata_key = self.key_builder.layer_metadata(layer_name)?;
        let backend = self.backend().await?;

        let tile_count =
            delete_under_prefix(backend.as_ref(), &layer_prefix, self.delete_batch_size).await?;

        // A layer may have metadata but no tiles
        let existed = tile_count > 0 || backend.head(&metadata_key).await?.exists();
        if existed {
            backend.delete(&metadata_key).await?;
            info!(layer = layer_name, tiles = tile_count, "Deleted layer");
            self.listeners.send_layer_deleted(layer_name);
        } else {
            debug!(layer = layer_name, "Layer not present, nothing deleted");
        }
        Ok(existed)
    }

    #[instrument(skip(self))]
    async fn delete_by_gridset_id(
        &self,
        layer_name: &str,
        gridset_id: &str,
    ) -> StorageResult<bool> {
        let gridset_prefix = self.key_builder.for_gridset(layer_name, gridset_id)?;
        let backend = self.backend().await?;

        let tile_count =
            delete_under_prefix(backend.as_ref(), &gridset_prefix, self.delete_batch_size).await?;

        if tile_count > 0 {
            info!(
                layer = layer_name,
                gridset = gridset_id,
                tiles = tile_count,
                "Deleted gridset tiles"
            );
            self.listeners.send_grid_subset_deleted(layer_name, gridset_id);
        }
        Ok(tile_count > 0)
    }

    async fn delete_range(&self, _range: &TileRange) -> StorageResult<bool> {
        Err(StorageError::NotImplemented("delete by tile range"))
    }

    async fn rename(&self, _old_layer_name: &str, _new_layer_name: &str) -> StorageResult<bool> {
        Err(StorageError::NotImplemented("rename layer"))
    }

    async fn clear(&self) -> StorageResult<()> {
        // Other logical stores may share the bucket
        error!("clear() called on the S3 tile blob store");
        Err(StorageError::Misuse(
            "clear() must not be called on a bucket-backed tile store".to_string(),
        ))
    }

    #[instrument(skip(self))]
    async fn get_layer_metadata(
        &self,
        layer_name: &str,
        key: &str,
    ) -> StorageResult<Option<String>> {
        let backend = self.backend().await?;
        let mut properties = self.load_layer_metadata(backend.as_ref(), layer_name).await?;
        Ok(properties.remove(key))
    }

    #[instrument(skip(self, value))]
    async fn put_layer_metadata(
        &self,
        layer_name: &str,
        key: &str,
        value: &str,
    ) -> StorageResult<()> {
        let backend = self.backend().await?;
        let mut properties = self.load_layer_metadata(backend.as_ref(), layer_name).await?;
        properties.insert(key.to_string(), value.to_string());

        let metadata_key = self.key_builder.layer_metadata(layer_name)?;
        backend
            .put(&metadata_key, encode_properties(&properties), PROPERTIES_CONTENT_TYPE)
            .await
    }

    async fn destroy(&self) {
        let mut backend = self.backend.write().await;
        self.destroyed.store(true, Ordering::SeqCst);
        let released = self.listeners.clear();
        if let Some(backend) = backend.take() {
            info!(
                backend = %backend.describe(),
                listeners = released,
                "Shutting down tile blob store"
            );
        }
    }

    fn add_listener(&self, listener: Arc<dyn BlobStoreListener>) {
        if self.destroyed.load(Ordering::SeqCst) {
            warn!("Ignoring listener registered after destroy()");
            return;
        }
        self.listeners.add_listener(listener.clone());
        // destroy() may have cleared the list between the check and the push
        if self.destroyed.load(Ordering::SeqCst) {
            self.listeners.remove_listener(&listener);
        }
    }

    fn remove_listener(&self, listener: &Arc<dyn BlobStoreListener>) -> bool {
        self.listeners.remove_listener(listener)
    }
}

impl std::fmt::Debug for S3BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3BlobStore")
            .field("prefix", &self.key_builder.prefix().as_ref())
            .field("listeners", &self.listeners)
            .field("delete_batch_size", &self.delete_batch_size)
            .finish_non_exhaustive()
    }
}
