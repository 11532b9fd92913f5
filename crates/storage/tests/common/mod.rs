//! Common test utilities for tile-storage tests
//!
//! Provides helpers for:
//! - Counting the requests a blob store sends to its backend
//! - Making backend requests fail on demand
//! - Recording the change events a blob store emits

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tile_storage::{
    BlobStoreListener, ObjectBackend, ObjectEntry, ObjectPath, ObjectStoreBackend, Probe,
    S3BlobStore, StorageError, StorageResult, StoredObject, TileObject,
};

/// Key prefix used by stores built with [`store_with_backend`].
pub const TEST_PREFIX: &str = "gwc";

/// In-memory backend that counts existence probes and batch deletes.
///
/// `head`, `put` and `delete_batch` can be switched to fail without
/// touching the stored objects, the way a rejected request would.
pub struct CountingBackend {
    inner: ObjectStoreBackend,
    heads: AtomicUsize,
    single_deletes: AtomicUsize,
    batches: Mutex<Vec<Vec<ObjectPath>>>,
    fail_heads: AtomicBool,
    fail_puts: AtomicBool,
    fail_batches: AtomicBool,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self {
            inner: ObjectStoreBackend::in_memory(),
            heads: AtomicUsize::new(0),
            single_deletes: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
            fail_heads: AtomicBool::new(false),
            fail_puts: AtomicBool::new(false),
            fail_batches: AtomicBool::new(false),
        }
    }

    pub fn fail_heads(&self, fail: bool) {
        self.fail_heads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_batches(&self, fail: bool) {
        self.fail_batches.store(fail, Ordering::SeqCst);
    }

    pub fn head_count(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }

    pub fn single_delete_count(&self) -> usize {
        self.single_deletes.load(Ordering::SeqCst)
    }

    /// Keys of every batch delete, in submission order.
    pub fn batches(&self) -> Vec<Vec<ObjectPath>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn reset_counts(&self) {
        self.heads.store(0, Ordering::SeqCst);
        self.single_deletes.store(0, Ordering::SeqCst);
        self.batches.lock().unwrap().clear();
    }

    /// Whether an object exists, without touching the counters.
    pub async fn contains(&self, key: &ObjectPath) -> bool {
        self.inner.head(key).await.unwrap().exists()
    }

    /// Write a raw object, bypassing the blob store.
    pub async fn put_raw(&self, key: &str, data: &'static [u8]) {
        self.inner
            .put(&ObjectPath::from(key), Bytes::from_static(data), "application/octet-stream")
            .await
            .unwrap();
    }
}

#[async_trait]
impl ObjectBackend for CountingBackend {
    async fn get(&self, key: &ObjectPath) -> StorageResult<Option<StoredObject>> {
        self.inner.get(key).await
    }

    async fn head(&self, key: &ObjectPath) -> StorageResult<Probe> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        if self.fail_heads.load(Ordering::SeqCst) {
            return Err(StorageError::backend("head", key.as_ref(), "503 SlowDown"));
        }
        self.inner.head(key).await
    }

    async fn put(&self, key: &ObjectPath, data: Bytes, content_type: &str) -> StorageResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::backend("put", key.as_ref(), "500 InternalError"));
        }
        self.inner.put(key, data, content_type).await
    }

    async fn delete(&self, key: &ObjectPath) -> StorageResult<()> {
        self.single_deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }

    async fn delete_batch(&self, keys: Vec<ObjectPath>) -> StorageResult<()> {
        self.batches.lock().unwrap().push(keys.clone());
        if self.fail_batches.load(Ordering::SeqCst) {
            let submitted = format!("{} keys", keys.len());
            return Err(StorageError::backend("delete_batch", submitted, "403 AccessDenied"));
        }
        self.inner.delete_batch(keys).await
    }

    fn list_by_prefix<'a>(&'a self, prefix: &ObjectPath) -> BoxStream<'a, StorageResult<ObjectEntry>> {
        self.inner.list_by_prefix(prefix)
    }

    fn describe(&self) -> String {
        format!("counting {}", self.inner.describe())
    }
}

/// A store over a fresh [`CountingBackend`], returning both.
pub fn store_with_backend() -> (S3BlobStore, Arc<CountingBackend>) {
    let backend = Arc::new(CountingBackend::new());
    let store = S3BlobStore::with_backend(backend.clone(), TEST_PREFIX);
    (store, backend)
}

/// A change event as seen by [`RecordingListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Stored { tile: String, size: u64 },
    Updated { tile: String, size: u64, old_size: u64 },
    Deleted { tile: String, size: u64 },
    LayerDeleted(String),
    GridSubsetDeleted { layer: String, gridset: String },
}

/// Listener that keeps every event it receives.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<Event>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl BlobStoreListener for RecordingListener {
    fn tile_stored(&self, tile: &TileObject) {
        self.record(Event::Stored {
            tile: tile.to_string(),
            size: tile.blob_size,
        });
    }

    fn tile_updated(&self, tile: &TileObject, old_size: u64) {
        self.record(Event::Updated {
            tile: tile.to_string(),
            size: tile.blob_size,
            old_size,
        });
    }

    fn tile_deleted(&self, tile: &TileObject) {
        self.record(Event::Deleted {
            tile: tile.to_string(),
            size: tile.blob_size,
        });
    }

    fn layer_deleted(&self, layer_name: &str) {
        self.record(Event::LayerDeleted(layer_name.to_string()));
    }

    fn grid_subset_deleted(&self, layer_name: &str, gridset_id: &str) {
        self.record(Event::GridSubsetDeleted {
            layer: layer_name.to_string(),
            gridset: gridset_id.to_string(),
        });
    }
}
