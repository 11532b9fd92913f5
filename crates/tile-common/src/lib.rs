//! Common types shared across the tile blob store crates.

pub mod error;
pub mod format;
pub mod tile;

pub use error::{StorageError, StorageResult};
pub use format::TileFormat;
pub use tile::{TileCoord, TileObject, TileRange};
