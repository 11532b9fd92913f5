//! Listener that reports store changes through the log.

use tracing::info;

use tile_storage::{BlobStoreListener, TileObject};

/// Logs every change notification at info level.
pub struct LoggingListener;

impl BlobStoreListener for LoggingListener {
    fn tile_stored(&self, tile: &TileObject) {
        info!(tile = %tile, size = tile.blob_size, "Tile stored");
    }

    fn tile_updated(&self, tile: &TileObject, old_size: u64) {
        info!(tile = %tile, size = tile.blob_size, old_size, "Tile updated");
    }

    fn tile_deleted(&self, tile: &TileObject) {
        info!(tile = %tile, size = tile.blob_size, "Tile deleted");
    }

    fn layer_deleted(&self, layer_name: &str) {
        info!(layer = layer_name, "Layer deleted");
    }

    fn grid_subset_deleted(&self, layer_name: &str, gridset_id: &str) {
        info!(layer = layer_name, gridset = gridset_id, "Gridset deleted");
    }
}
