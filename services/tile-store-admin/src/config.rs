//! Store configuration for the admin CLI.
//!
//! A YAML file given with `--config` wins; otherwise the `TILE_STORE_*`
//! environment (including a `.env` file) is used.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use tile_storage::S3BlobStoreConfig;

/// Resolve and validate the store configuration.
pub fn load_store_config(path: Option<&Path>) -> Result<S3BlobStoreConfig> {
    let config = match path {
        Some(path) => {
            info!(path = %path.display(), "Loading store configuration file");
            S3BlobStoreConfig::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?
        }
        None => {
            debug!("No configuration file given, reading TILE_STORE_* environment");
            S3BlobStoreConfig::from_env().context("Invalid TILE_STORE_* environment")?
        }
    };

    config.validate().context("Incomplete store configuration")?;
    debug!(config = ?config, "Resolved store configuration");
    Ok(config)
}
