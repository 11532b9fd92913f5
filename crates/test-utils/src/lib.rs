//! Shared test utilities for the tile blob store workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Tile fixtures (layer, gridset and format names, sample blobs)
//! - Generators for batches of tiles
//! - A skip macro for tests that need a live object store
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{require_env, fixtures};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Macro to skip a test if an environment variable is not set.
///
/// Tests against a real S3/MinIO bucket use this so they are skipped in
/// environments without one (e.g. CI without object storage).
///
/// # Usage
///
/// ```ignore
/// use test_utils::require_env;
///
/// #[tokio::test]
/// async fn test_against_minio() {
///     let bucket = require_env!("TILE_STORE_TEST_BUCKET");
///     // Test code using bucket...
/// }
/// ```
///
/// If the variable is unset or empty, the test prints a skip message and returns early.
#[macro_export]
macro_rules! require_env {
    ($name:expr) => {{
        match ::std::env::var($name) {
            Ok(value) if !value.is_empty() => value,
            _ => {
                eprintln!("SKIPPED: environment variable '{}' not set.", $name);
                return;
            }
        }
    }};
}
