//! Tile store administration CLI.
//!
//! Operates on a tile cache kept in an S3-compatible bucket:
//! - Verifies bucket access with the configured credentials
//! - Deletes whole layers or the tiles of one gridset
//! - Reads and writes layer metadata
//! - Fetches and stores single tiles

mod config;
mod listener;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use tile_storage::{BlobStore, S3BlobStore, TileCoord, TileObject};

use crate::config::load_store_config;
use crate::listener::LoggingListener;

#[derive(Parser, Debug)]
#[command(name = "tile-store-admin")]
#[command(about = "Inspect and maintain a tile cache stored in an S3 bucket")]
struct Args {
    /// YAML store configuration (default: TILE_STORE_* environment)
    #[arg(long, env = "TILE_STORE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and verify bucket access
    Check,

    /// Delete every tile and the metadata of a layer
    DeleteLayer { layer: String },

    /// Delete every tile of a layer in one gridset
    DeleteGridset { layer: String, gridset: String },

    /// Print one layer metadata value
    GetMetadata { layer: String, key: String },

    /// Set one layer metadata value
    PutMetadata {
        layer: String,
        key: String,
        value: String,
    },

    /// Fetch a tile to a file or stdout
    GetTile {
        #[command(flatten)]
        address: TileAddress,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Store a tile read from a file
    PutTile {
        #[command(flatten)]
        address: TileAddress,

        /// File holding the tile blob
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(ClapArgs, Debug, Clone)]
struct TileAddress {
    layer: String,
    gridset: String,
    z: u32,
    x: u32,
    y: u32,

    /// Tile MIME type, e.g. image/png
    #[arg(short, long)]
    format: String,

    /// Request-parameter set id (default: the default set)
    #[arg(long)]
    parameters_id: Option<String>,
}

impl TileAddress {
    fn to_tile(&self) -> TileObject {
        let tile = TileObject::new(
            self.layer.clone(),
            self.gridset.clone(),
            TileCoord::new(self.z, self.x, self.y),
            self.format.clone(),
        );
        match &self.parameters_id {
            Some(parameters_id) => tile.with_parameters_id(parameters_id.clone()),
            None => tile,
        }
    }
}

impl Command {
    fn is_mutating(&self) -> bool {
        matches!(
            self,
            Command::DeleteLayer { .. }
                | Command::DeleteGridset { .. }
                | Command::PutMetadata { .. }
                | Command::PutTile { .. }
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Logs go to stderr so tile bytes on stdout stay clean
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let config = load_store_config(args.config.as_deref())?;
    let store = S3BlobStore::connect(&config)
        .await
        .with_context(|| format!("Cannot access bucket '{}'", config.bucket))?;

    if args.command.is_mutating() {
        store.add_listener(Arc::new(LoggingListener));
    }

    let result = run(&store, args.command).await;
    store.destroy().await;
    result
}

async fn run(store: &S3BlobStore, command: Command) -> Result<()> {
    match command {
        Command::Check => {
            info!(store = ?store, "Bucket is accessible");
        }
        Command::DeleteLayer { layer } => {
            if !store.delete_layer(&layer).await? {
                info!(layer = %layer, "Layer not found, nothing deleted");
            }
        }
        Command::DeleteGridset { layer, gridset } => {
            if !store.delete_by_gridset_id(&layer, &gridset).await? {
                info!(layer = %layer, gridset = %gridset, "No tiles found, nothing deleted");
            }
        }
        Command::GetMetadata { layer, key } => {
            match store.get_layer_metadata(&layer, &key).await? {
                Some(value) => println!("{}", value),
                None => bail!("Layer '{}' has no metadata key '{}'", layer, key),
            }
        }
        Command::PutMetadata { layer, key, value } => {
            store.put_layer_metadata(&layer, &key, &value).await?;
            info!(layer = %layer, key = %key, "Metadata updated");
        }
        Command::GetTile { address, output } => {
            let mut tile = address.to_tile();
            if !store.get(&mut tile).await? {
                bail!("Tile {} not found", tile);
            }
            let blob = tile.take_blob().unwrap_or_default();
            match output {
                Some(path) => tokio::fs::write(&path, &blob)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => std::io::stdout().lock().write_all(&blob)?,
            }
            info!(tile = %tile, size = tile.blob_size, "Tile fetched");
        }
        Command::PutTile { address, input } => {
            let data = tokio::fs::read(&input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let tile = address.to_tile().with_blob(Bytes::from(data));
            store.put(&tile).await?;
        }
    }
    Ok(())
}
