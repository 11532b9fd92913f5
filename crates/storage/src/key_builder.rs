//! Object key layout for tiles and layer metadata.
//!
//! Keys follow the TMS-style layout
//!
//! ```text
//! <prefix>/<layer>/<gridset>/<format-id>/<parameters-id>/<z>/<x>/<y>.<ext>
//! <prefix>/<layer>/metadata.properties
//! ```
//!
//! Every segment goes through `PathPart` percent-encoding, which escapes the
//! `/` delimiter and the `%` escape character itself, so no identifier can
//! forge an extra path level and distinct coordinates never share a key.
//! Layer and gridset prefixes are whole-segment prefixes, so the prefix of
//! layer `a` does not cover keys of layer `ab`.

use object_store::path::{Path, PathPart};

use tile_common::{format::UNKNOWN_EXTENSION, StorageError, StorageResult, TileFormat, TileObject};

/// Leaf name of the per-layer metadata object.
///
/// Tile leaves are always `<y>.<ext>` with a numeric `y`, so they can never
/// take this name.
pub const LAYER_METADATA_OBJECT_NAME: &str = "metadata.properties";

/// Parameters-id segment used for tiles rendered with default parameters.
pub const DEFAULT_PARAMETERS_ID: &str = "default";

/// Builds object keys for one logical store under a fixed root prefix.
#[derive(Debug, Clone)]
pub struct TmsKeyBuilder {
    prefix: Path,
}

impl TmsKeyBuilder {
    /// `prefix` may be empty or contain `/`-separated levels.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: Path::from(prefix),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Key of a single tile.
    pub fn for_tile(&self, tile: &TileObject) -> StorageResult<Path> {
        let (format_id, extension) = match TileFormat::lookup(&tile.blob_format) {
            Some(format) => (format.format_id, format.extension),
            None => (tile.blob_format.as_str(), UNKNOWN_EXTENSION),
        };
        let parameters_id = tile.parameters_id.as_deref().unwrap_or(DEFAULT_PARAMETERS_ID);

        let key = self
            .for_gridset(&tile.layer_name, &tile.gridset_id)?
            .child(segment("format", format_id)?)
            .child(segment("parameters id", parameters_id)?)
            .child(tile.coord.z.to_string())
            .child(tile.coord.x.to_string())
            .child(format!("{}.{}", tile.coord.y, extension));
        Ok(key)
    }

    /// Key of the layer's metadata object.
    pub fn layer_metadata(&self, layer_name: &str) -> StorageResult<Path> {
        Ok(self.for_layer(layer_name)?.child(LAYER_METADATA_OBJECT_NAME))
    }

    /// Prefix covering every tile (and the metadata object) of a layer.
    pub fn for_layer(&self, layer_name: &str) -> StorageResult<Path> {
        Ok(self.prefix.child(segment("layer name", layer_name)?))
    }

    /// Prefix covering every tile of a layer in one gridset.
    pub fn for_gridset(&self, layer_name: &str, gridset_id: &str) -> StorageResult<Path> {
        Ok(self
            .for_layer(layer_name)?
            .child(segment("gridset id", gridset_id)?))
    }

    /// Whether a listed key is a layer metadata object rather than a tile.
    pub fn is_layer_metadata(key: &Path) -> bool {
        key.filename() == Some(LAYER_METADATA_OBJECT_NAME)
    }
}

/// Encode one identifier as a key segment.
///
/// Empty identifiers are rejected because an empty segment disappears from
/// the joined key.
fn segment<'a>(what: &str, value: &'a str) -> StorageResult<PathPart<'a>> {
    if value.is_empty() {
        return Err(StorageError::invalid_argument(format!("{} must not be empty", what)));
    }
    Ok(PathPart::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tile_common::TileCoord;

    fn tile(layer: &str, gridset: &str, z: u32, x: u32, y: u32, format: &str) -> TileObject {
        TileObject::new(layer, gridset, TileCoord::new(z, x, y), format)
    }

    #[test]
    fn test_tile_key_layout() {
        let builder = TmsKeyBuilder::new("gwc");
        let key = builder
            .for_tile(&tile("roads", "EPSG4326", 3, 5, 7, "image/png"))
            .unwrap();
        assert_eq!(key.as_ref(), "gwc/roads/EPSG4326/png/default/3/5/7.png");
    }

    #[test]
    fn test_empty_prefix() {
        let builder = TmsKeyBuilder::new("");
        let key = builder
            .for_tile(&tile("roads", "EPSG4326", 0, 0, 0, "image/jpeg"))
            .unwrap();
        assert_eq!(key.as_ref(), "roads/EPSG4326/jpeg/default/0/0/0.jpeg");
        assert_eq!(builder.layer_metadata("roads").unwrap().as_ref(), "roads/metadata.properties");
    }

    #[test]
    fn test_nested_prefix_and_parameters_id() {
        let builder = TmsKeyBuilder::new("/cache/prod/");
        let key = builder
            .for_tile(&tile("roads", "g", 1, 2, 3, "image/png8").with_parameters_id("a1b2"))
            .unwrap();
        assert_eq!(key.as_ref(), "cache/prod/roads/g/png8/a1b2/1/2/3.png");
    }

    #[test]
    fn test_separator_in_identifiers_is_escaped() {
        let builder = TmsKeyBuilder::new("p");
        let key = builder
            .for_tile(&tile("topp:states/v2", "EPSG:4326", 1, 0, 0, "image/png"))
            .unwrap();
        // The layer stays a single segment
        let parts: Vec<_> = key.parts().collect();
        assert_eq!(parts.len(), 8);
        assert!(!key.as_ref().starts_with("p/topp:states/v2/"));
    }

    #[test]
    fn test_unknown_format_uses_mime_type_segment() {
        let builder = TmsKeyBuilder::new("");
        let key = builder
            .for_tile(&tile("l", "g", 0, 0, 0, "image/x-custom"))
            .unwrap();
        assert!(key.as_ref().ends_with("/default/0/0/0.bin"));
        assert_eq!(key.parts().count(), 7);
    }

    #[test]
    fn test_tile_keys_are_injective() {
        let builder = TmsKeyBuilder::new("root");
        let mut tiles = Vec::new();
        for layer in ["a", "ab", "a/b", "a%2Fb"] {
            for gridset in ["g", "g/1"] {
                for format in ["image/png", "image/png8", "image/jpeg", "image/x-other"] {
                    for (z, x, y) in [(0, 0, 0), (1, 0, 1), (1, 1, 0), (10, 1, 11), (11, 0, 111)] {
                        tiles.push(tile(layer, gridset, z, x, y, format));
                        tiles.push(tile(layer, gridset, z, x, y, format).with_parameters_id("p1"));
                    }
                }
            }
        }

        let keys: HashSet<String> = tiles
            .iter()
            .map(|t| builder.for_tile(t).unwrap().to_string())
            .collect();
        assert_eq!(keys.len(), tiles.len());
    }

    #[test]
    fn test_layer_prefix_is_segment_prefix() {
        let builder = TmsKeyBuilder::new("root");
        let layer_a = builder.for_layer("a").unwrap();
        let tile_a = builder.for_tile(&tile("a", "g", 2, 1, 1, "image/png")).unwrap();
        let tile_ab = builder.for_tile(&tile("ab", "g", 2, 1, 1, "image/png")).unwrap();

        assert!(tile_a.prefix_matches(&layer_a));
        assert_ne!(tile_a, layer_a);
        assert!(!tile_ab.prefix_matches(&layer_a));

        let gridset = builder.for_gridset("a", "g").unwrap();
        assert!(tile_a.prefix_matches(&gridset));
        assert!(gridset.prefix_matches(&layer_a));
    }

    #[test]
    fn test_metadata_key_never_a_tile_key() {
        let builder = TmsKeyBuilder::new("");
        let metadata = builder.layer_metadata("roads").unwrap();
        assert!(TmsKeyBuilder::is_layer_metadata(&metadata));

        let tile_key = builder.for_tile(&tile("roads", "g", 0, 0, 0, "image/png")).unwrap();
        assert!(!TmsKeyBuilder::is_layer_metadata(&tile_key));

        // A gridset named like the metadata object is still told apart
        let tricky = builder
            .for_tile(&tile("roads", LAYER_METADATA_OBJECT_NAME, 0, 0, 0, "image/png"))
            .unwrap();
        assert!(!TmsKeyBuilder::is_layer_metadata(&tricky));
    }

    #[test]
    fn test_empty_identifiers_rejected() {
        let builder = TmsKeyBuilder::new("");
        assert!(matches!(
            builder.for_layer(""),
            Err(StorageError::InvalidArgument(_))
        ));
        assert!(builder.for_tile(&tile("l", "", 0, 0, 0, "image/png")).is_err());
        assert!(builder
            .for_tile(&tile("l", "g", 0, 0, 0, "image/png").with_parameters_id(""))
            .is_err());
    }
}
