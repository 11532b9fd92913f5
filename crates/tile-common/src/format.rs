//! Tile formats and their storage identifiers.
//!
//! Each known MIME type maps to a short format id (a key segment) and a file
//! extension (the suffix of the tile leaf). Several formats can share an
//! extension, which is why the format id, not the extension, keeps keys of
//! different formats apart.

/// A known tile format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileFormat {
    /// Canonical MIME type
    pub mime_type: &'static str,
    /// Short identifier used as a key segment
    pub format_id: &'static str,
    /// File extension of the stored object
    pub extension: &'static str,
}

/// Extension used for tiles whose MIME type is not in the table.
pub const UNKNOWN_EXTENSION: &str = "bin";

const KNOWN_FORMATS: &[TileFormat] = &[
    TileFormat { mime_type: "image/png", format_id: "png", extension: "png" },
    TileFormat { mime_type: "image/png8", format_id: "png8", extension: "png" },
    TileFormat { mime_type: "image/png; mode=8bit", format_id: "png8", extension: "png" },
    TileFormat { mime_type: "image/png24", format_id: "png24", extension: "png" },
    TileFormat { mime_type: "image/jpeg", format_id: "jpeg", extension: "jpeg" },
    TileFormat { mime_type: "image/vnd.jpeg-png", format_id: "jpeg-png", extension: "jpeg" },
    TileFormat { mime_type: "image/vnd.jpeg-png8", format_id: "jpeg-png8", extension: "jpeg" },
    TileFormat { mime_type: "image/gif", format_id: "gif", extension: "gif" },
    TileFormat { mime_type: "image/tiff", format_id: "tiff", extension: "tiff" },
    TileFormat { mime_type: "image/webp", format_id: "webp", extension: "webp" },
    TileFormat { mime_type: "image/bmp", format_id: "bmp", extension: "bmp" },
    TileFormat { mime_type: "image/svg+xml", format_id: "svg", extension: "svg" },
    TileFormat {
        mime_type: "application/vnd.mapbox-vector-tile",
        format_id: "pbf",
        extension: "pbf",
    },
    TileFormat {
        mime_type: "application/json;type=geojson",
        format_id: "geojson",
        extension: "geojson",
    },
    TileFormat {
        mime_type: "application/json;type=topojson",
        format_id: "topojson",
        extension: "topojson",
    },
    TileFormat {
        mime_type: "application/json;type=utfgrid",
        format_id: "utfgrid",
        extension: "json",
    },
    TileFormat { mime_type: "text/plain", format_id: "txt", extension: "txt" },
    TileFormat { mime_type: "text/html", format_id: "html", extension: "html" },
    TileFormat { mime_type: "application/vnd.google-earth.kml+xml", format_id: "kml", extension: "kml" },
];

impl TileFormat {
    /// Look up a format by MIME type or by short format id.
    ///
    /// Matching ignores ASCII case and whitespace, so `image/PNG` and
    /// `application/json; type=geojson` resolve like their canonical forms.
    pub fn lookup(format: &str) -> Option<&'static TileFormat> {
        let wanted = normalize(format);
        KNOWN_FORMATS
            .iter()
            .find(|f| normalize(f.mime_type) == wanted || f.format_id == wanted)
    }
}

fn normalize(format: &str) -> String {
    format
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
