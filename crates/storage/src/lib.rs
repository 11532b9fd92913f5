//! Tile blob storage on S3-compatible object stores.
//!
//! Provides:
//! - A TMS-style key layout for tiles and per-layer metadata
//! - The [`BlobStore`] contract and its bucket-backed implementation
//! - Change notification for stored, updated and deleted tiles
//! - Paginated, batched deletion of whole layers and gridsets

pub mod blob_store;
pub mod bulk_delete;
pub mod config;
pub mod key_builder;
pub mod listeners;
pub mod object_store;
pub mod properties;

pub use self::object_store::{ObjectBackend, ObjectEntry, ObjectInfo, ObjectStoreBackend, Probe, StoredObject};
pub use blob_store::{BlobStore, S3BlobStore};
pub use bulk_delete::delete_under_prefix;
pub use config::{S3BlobStoreConfig, MAX_DELETE_BATCH_SIZE};
pub use key_builder::{TmsKeyBuilder, LAYER_METADATA_OBJECT_NAME};
pub use listeners::{BlobStoreListener, ListenerList};

pub use ::object_store::path::Path as ObjectPath;
pub use tile_common::{StorageError, StorageResult, TileCoord, TileObject, TileRange};
