//! Generators for batches of tiles.
//!
//! Tiles are laid out row-major within a zoom level, so the same arguments
//! always produce the same coordinates.

use tile_common::TileObject;

use crate::fixtures::png_tile;

/// Creates `count` PNG tiles of one layer at zoom level `z`.
///
/// Tile `i` sits at column `i % width` and row `i / width` where `width` is
/// `2^z` (capped so that deep zoom levels still yield compact rows).
///
/// # Example
///
/// ```
/// use test_utils::generate_tiles;
///
/// let tiles = generate_tiles("roads", 2, 6);
/// assert_eq!(tiles.len(), 6);
/// assert_eq!((tiles[5].coord.x, tiles[5].coord.y), (1, 1));
/// ```
pub fn generate_tiles(layer: &str, z: u32, count: usize) -> Vec<TileObject> {
    let width = 1u64 << z.min(16);
    (0..count as u64)
        .map(|i| png_tile(layer, z, (i % width) as u32, (i / width) as u32))
        .collect()
}

/// Same as [`generate_tiles`] but in the given gridset.
pub fn generate_gridset_tiles(layer: &str, gridset: &str, z: u32, count: usize) -> Vec<TileObject> {
    generate_tiles(layer, z, count)
        .into_iter()
        .map(|mut tile| {
            tile.gridset_id = gridset.to_string();
            tile
        })
        .collect()
}
