//! Tile addressing and the cached tile object.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// A single cached tile: its address plus, once stored or fetched, its blob.
///
/// The address is (layer, gridset, coordinate, format, parameters id). The
/// blob fields are filled in by the caller before `put` and by the store on
/// `get`.
#[derive(Debug, Clone, PartialEq)]
pub struct TileObject {
    pub layer_name: String,
    pub gridset_id: String,
    pub coord: TileCoord,
    /// MIME type of the blob, e.g. `image/png`
    pub blob_format: String,
    /// Request-parameter set the tile was rendered with; `None` is the
    /// default set
    pub parameters_id: Option<String>,
    pub blob: Option<Bytes>,
    pub blob_size: u64,
    /// Creation time as reported by the store
    pub created: Option<DateTime<Utc>>,
}

impl TileObject {
    /// Address a tile without a payload (for `get` and `delete`).
    pub fn new(
        layer_name: impl Into<String>,
        gridset_id: impl Into<String>,
        coord: TileCoord,
        blob_format: impl Into<String>,
    ) -> Self {
        Self {
            layer_name: layer_name.into(),
            gridset_id: gridset_id.into(),
            coord,
            blob_format: blob_format.into(),
            parameters_id: None,
            blob: None,
            blob_size: 0,
            created: None,
        }
    }

    /// Attach a payload, updating the blob size to match.
    pub fn with_blob(mut self, blob: impl Into<Bytes>) -> Self {
        self.set_blob(blob.into());
        self
    }

    pub fn with_parameters_id(mut self, parameters_id: impl Into<String>) -> Self {
        self.parameters_id = Some(parameters_id.into());
        self
    }

    pub fn set_blob(&mut self, blob: Bytes) {
        self.blob_size = blob.len() as u64;
        self.blob = Some(blob);
    }

    /// Take ownership of the payload, leaving the tile without one.
    pub fn take_blob(&mut self) -> Option<Bytes> {
        self.blob.take()
    }
}

impl std::fmt::Display for TileObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.layer_name, self.gridset_id, self.coord, self.blob_format
        )?;
        if let Some(parameters_id) = &self.parameters_id {
            write!(f, ":{}", parameters_id)?;
        }
        Ok(())
    }
}

/// A range of tiles across zoom levels of one layer and gridset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRange {
    pub layer_name: String,
    pub gridset_id: String,
    pub zoom_start: u32,
    pub zoom_stop: u32,
    pub blob_format: String,
    pub parameters_id: Option<String>,
}

impl TileRange {
    pub fn new(
        layer_name: impl Into<String>,
        gridset_id: impl Into<String>,
        zoom_start: u32,
        zoom_stop: u32,
        blob_format: impl Into<String>,
    ) -> Self {
        Self {
            layer_name: layer_name.into(),
            gridset_id: gridset_id.into(),
            zoom_start,
            zoom_stop,
            blob_format: blob_format.into(),
            parameters_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_blob_sets_size() {
        let tile = TileObject::new("roads", "EPSG:4326", TileCoord::new(3, 1, 2), "image/png")
            .with_blob(vec![1u8, 2, 3, 4]);
        assert_eq!(tile.blob_size, 4);
        assert_eq!(tile.blob.as_deref(), Some(&[1u8, 2, 3, 4][..]));
    }

    #[test]
    fn test_take_blob_keeps_size() {
        let mut tile = TileObject::new("roads", "EPSG:4326", TileCoord::new(0, 0, 0), "image/png")
            .with_blob(Bytes::from_static(b"tile"));
        let blob = tile.take_blob().unwrap();
        assert_eq!(blob, Bytes::from_static(b"tile"));
        assert!(tile.blob.is_none());
        assert_eq!(tile.blob_size, 4);
    }

    #[test]
    fn test_display() {
        let tile = TileObject::new("roads", "EPSG:900913", TileCoord::new(5, 10, 12), "image/jpeg")
            .with_parameters_id("night");
        assert_eq!(tile.to_string(), "roads:EPSG:900913:5/10/12:image/jpeg:night");
    }

    #[test]
    fn test_tile_coord_serde() {
        let coord = TileCoord::new(4, 7, 9);
        let json = serde_json::to_string(&coord).unwrap();
        assert_eq!(json, r#"{"z":4,"x":7,"y":9}"#);
        let back: TileCoord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, coord);
    }
}
