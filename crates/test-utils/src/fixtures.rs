//! Common test fixtures for tile store tests.
//!
//! This module provides pre-defined names and payloads that represent common
//! tile-caching scenarios.

use bytes::Bytes;
use tile_common::{TileCoord, TileObject};

/// Common layer names for testing.
pub mod layers {
    /// Plain layer name
    pub const ROADS: &str = "roads";

    /// Shares a textual prefix with [`ROADS`] but is a different layer
    pub const ROADS_EXTRA: &str = "roadsextra";

    /// Workspace-qualified name, as served by a WMS
    pub const QUALIFIED: &str = "topp:states";

    /// Contains the key separator
    pub const WITH_SLASH: &str = "basemap/v2";
}

/// Common gridset identifiers.
pub mod gridsets {
    /// WGS84 geographic
    pub const EPSG_4326: &str = "EPSG:4326";

    /// Web Mercator
    pub const EPSG_900913: &str = "EPSG:900913";
}

/// Common tile MIME types.
pub mod formats {
    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
}

/// The 8-byte PNG signature followed by an IHDR chunk header.
///
/// Stored blobs are opaque; this only makes payloads look like real tiles
/// when inspected in a bucket browser.
pub const PNG_HEADER: [u8; 16] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
];

/// A small PNG-looking payload whose body bytes depend on `seed`.
pub fn sample_png(seed: u8, body_len: usize) -> Bytes {
    let mut data = PNG_HEADER.to_vec();
    data.extend((0..body_len).map(|i| seed.wrapping_add(i as u8)));
    Bytes::from(data)
}

/// A PNG tile of the given layer in EPSG:4326, carrying a sample payload.
pub fn png_tile(layer: &str, z: u32, x: u32, y: u32) -> TileObject {
    TileObject::new(layer, gridsets::EPSG_4326, TileCoord::new(z, x, y), formats::PNG)
        .with_blob(sample_png((x ^ y) as u8, 32))
}

/// The same address as `tile`, without a payload, ready for `get`.
pub fn address_of(tile: &TileObject) -> TileObject {
    let mut address = TileObject::new(
        tile.layer_name.clone(),
        tile.gridset_id.clone(),
        tile.coord,
        tile.blob_format.clone(),
    );
    address.parameters_id = tile.parameters_id.clone();
    address
}
