//! Paginated deletion of every tile under a key prefix.

use futures::stream::TryChunksError;
use futures::TryStreamExt;
use metrics::counter;
use object_store::path::Path;
use tracing::{debug, instrument};

use tile_common::StorageResult;

use crate::config::MAX_DELETE_BATCH_SIZE;
use crate::key_builder::TmsKeyBuilder;
use crate::object_store::ObjectBackend;

/// Delete every object under `prefix` except layer metadata objects.
///
/// The listing is consumed one page of `batch_size` keys at a time and each
/// page becomes a single quiet batch delete, so memory stays bounded however
/// large the layer is. Metadata objects are skipped; removing them is the
/// caller's explicit decision.
///
/// Returns the number of keys submitted for deletion. The store may skip keys
/// that vanished meanwhile, so this is not a verified count.
#[instrument(skip(backend), fields(prefix = %prefix))]
pub async fn delete_under_prefix(
    backend: &dyn ObjectBackend,
    prefix: &Path,
    batch_size: usize,
) -> StorageResult<u64> {
    let batch_size = batch_size.clamp(1, MAX_DELETE_BATCH_SIZE);
    let mut pages = backend
        .list_by_prefix(prefix)
        .try_chunks(batch_size)
        .map_err(|TryChunksError(_, e)| e);

    let mut deleted = 0u64;
    let mut batches = 0u64;
    while let Some(page) = pages.try_next().await? {
        let keys: Vec<Path> = page
            .into_iter()
            .map(|entry| entry.location)
            .filter(|key| !TmsKeyBuilder::is_layer_metadata(key))
            .collect();
        if keys.is_empty() {
            continue;
        }

        let submitted = keys.len() as u64;
        debug!(batch = batches, keys = submitted, "Submitting batch delete");
        backend.delete_batch(keys).await?;
        deleted += submitted;
        batches += 1;
    }

    counter!("tile_store_bulk_deleted_objects_total").increment(deleted);
    debug!(deleted, batches, "Prefix deletion finished");
    Ok(deleted)
}
