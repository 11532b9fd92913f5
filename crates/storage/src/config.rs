//! Construction-time settings for the S3 tile blob store.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tile_common::{StorageError, StorageResult};

/// Largest batch most object stores accept in a single multi-object delete.
pub const MAX_DELETE_BATCH_SIZE: usize = 1000;

/// Configuration for the S3 tile blob store.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3BlobStoreConfig {
    /// Bucket name
    pub bucket: String,
    /// Root prefix under which all keys of this store live
    pub prefix: Option<String>,
    /// S3/MinIO endpoint URL (None uses AWS)
    pub endpoint: Option<String>,
    /// AWS region (use "us-east-1" for MinIO)
    pub region: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Reject plain HTTP endpoints
    pub use_https: bool,
    /// Maximum idle connections kept in the pool per host
    ///
    /// This bounds reuse, not concurrency: busy moments may open more
    /// connections, the surplus is closed once idle.
    pub max_connections: Option<usize>,
    /// HTTP proxy, credentials may be embedded in the URL
    pub proxy_url: Option<String>,
    /// Per-request timeout
    pub request_timeout_secs: Option<u64>,
    /// Keys per listing page and per batch delete
    pub delete_batch_size: usize,
}

impl Default for S3BlobStoreConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: None,
            endpoint: None,
            region: "us-east-1".to_string(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            use_https: true,
            max_connections: None,
            proxy_url: None,
            request_timeout_secs: None,
            delete_batch_size: MAX_DELETE_BATCH_SIZE,
        }
    }
}

impl std::fmt::Debug for S3BlobStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3BlobStoreConfig")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key_id", &redact(&self.access_key_id))
            .field("secret_access_key", &redact(&self.secret_access_key))
            .field("use_https", &self.use_https)
            .field("max_connections", &self.max_connections)
            .field("proxy_url", &self.proxy_url.as_deref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("delete_batch_size", &self.delete_batch_size)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl S3BlobStoreConfig {
    /// Defaults overlaid with `TILE_STORE_*` environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load a YAML configuration file.
    pub fn load(path: &Path) -> StorageResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StorageError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: S3BlobStoreConfig = serde_yaml::from_str(&content).map_err(|e| {
            StorageError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), bucket = %config.bucket, "Loaded blob store config");
        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StorageResult<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("TILE_STORE_BUCKET") {
            config.bucket = v;
        }
        config.prefix = lookup("TILE_STORE_PREFIX").or(config.prefix);
        config.endpoint = lookup("TILE_STORE_ENDPOINT").or(config.endpoint);
        if let Some(v) = lookup("TILE_STORE_REGION") {
            config.region = v;
        }
        if let Some(v) = lookup("TILE_STORE_ACCESS_KEY_ID") {
            config.access_key_id = v;
        }
        if let Some(v) = lookup("TILE_STORE_SECRET_ACCESS_KEY") {
            config.secret_access_key = v;
        }
        if let Some(v) = lookup("TILE_STORE_USE_HTTPS") {
            config.use_https = parse_var("TILE_STORE_USE_HTTPS", &v)?;
        }
        if let Some(v) = lookup("TILE_STORE_MAX_CONNECTIONS") {
            config.max_connections = Some(parse_var("TILE_STORE_MAX_CONNECTIONS", &v)?);
        }
        config.proxy_url = lookup("TILE_STORE_PROXY_URL").or(config.proxy_url);
        if let Some(v) = lookup("TILE_STORE_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = Some(parse_var("TILE_STORE_REQUEST_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("TILE_STORE_DELETE_BATCH_SIZE") {
            config.delete_batch_size = parse_var("TILE_STORE_DELETE_BATCH_SIZE", &v)?;
        }

        Ok(config)
    }

    /// Check that everything needed to reach the bucket is present.
    pub fn validate(&self) -> StorageResult<()> {
        if self.bucket.trim().is_empty() {
            return Err(StorageError::Config("Bucket not provided".to_string()));
        }
        if self.access_key_id.is_empty() {
            return Err(StorageError::Config("Access key not provided".to_string()));
        }
        if self.secret_access_key.is_empty() {
            return Err(StorageError::Config("Secret key not provided".to_string()));
        }
        if self.delete_batch_size == 0 || self.delete_batch_size > MAX_DELETE_BATCH_SIZE {
            return Err(StorageError::Config(format!(
                "delete_batch_size must be between 1 and {}, got {}",
                MAX_DELETE_BATCH_SIZE, self.delete_batch_size
            )));
        }
        Ok(())
    }

    /// The root prefix with surrounding slashes removed.
    pub fn key_prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or("").trim_matches('/')
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> StorageResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| StorageError::Config(format!("Invalid value for {}: {}", name, e)))
}
