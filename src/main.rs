//! datamover -- command-line driver for the transfer proxy.
//!
//! Stands in for the data-management layer: loads the configuration,
//! builds the configured backend, authenticates, runs one proxy operation,
//! and prints the result as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use datamover::config;
use datamover::destination::default_layout;
use datamover::model::{
    DownloadDestination, DownloadRequest, FileLocation, MetadataEntry, UploadRequest,
    UploadSource,
};
use datamover::transfer::{DataTransferProxy, GridBackend, ObjectStoreBackend};

/// Command-line arguments for the datamover CLI.
#[derive(Parser, Debug)]
#[command(name = "datamover", version, about = "Move and archive data objects")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "datamover.example.yaml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a data object to the configured archive.
    Upload {
        /// Logical catalog path of the data object.
        #[arg(long)]
        path: String,

        /// Caller-supplied correlation id.
        #[arg(long)]
        caller_object_id: Option<String>,

        /// Remote source as `endpoint:path` (grid backend).
        #[arg(long, conflicts_with = "source_file")]
        source_location: Option<String>,

        /// Local source file (object store backend).
        #[arg(long)]
        source_file: Option<PathBuf>,

        /// Metadata entries as `attribute=value`, repeatable.
        #[arg(long = "metadata")]
        metadata: Vec<String>,
    },

    /// Download a data object from its archive location.
    Download {
        /// Archive location as `container:path`.
        #[arg(long)]
        location: String,

        /// Remote destination as `endpoint:path` (grid backend).
        #[arg(long, conflicts_with = "destination_file")]
        destination_location: Option<String>,

        /// Local destination file (object store backend).
        #[arg(long)]
        destination_file: Option<PathBuf>,
    },

    /// Canonical status of a transfer request.
    Status {
        #[arg(long)]
        request_id: String,
    },

    /// Full task telemetry of a transfer request.
    Report {
        #[arg(long)]
        request_id: String,
    },

    /// Bytes transferred so far for a transfer request.
    Size {
        #[arg(long)]
        request_id: String,
    },

    /// Probe a remote path.
    Attributes {
        /// Location as `container:path`.
        #[arg(long)]
        location: String,

        /// Also compute the aggregate size (walks the tree).
        #[arg(long)]
        size: bool,
    },
}

/// Parse a `container:path` argument.
fn parse_location(raw: &str) -> anyhow::Result<FileLocation> {
    let (container, path) = raw
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("expected container:path, got '{raw}'"))?;
    Ok(FileLocation::new(container, path))
}

/// Parse an `attribute=value` metadata argument.
fn parse_metadata(raw: &[String]) -> anyhow::Result<Vec<MetadataEntry>> {
    raw.iter()
        .map(|entry| {
            let (attribute, value) = entry
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("expected attribute=value, got '{entry}'"))?;
            Ok(MetadataEntry {
                attribute: attribute.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

fn init_logging(logging: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(logging.level.clone()));
    if logging.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config(&cli.config)?;
    init_logging(&config.logging);
    info!("configuration loaded from {}", cli.config);

    // Build the configured backend.  Construction is eager: a missing
    // section or malformed setting fails here, not on the first call.
    let proxy: Arc<dyn DataTransferProxy> = match config.backend.as_str() {
        "grid" => {
            let grid_config = config
                .grid
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("grid section missing"))?;
            Arc::new(GridBackend::new(grid_config, &config.walk, default_layout())?)
        }
        "object_store" => {
            let store_config = config
                .object_store
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("object_store section missing"))?;
            Arc::new(ObjectStoreBackend::new(store_config, default_layout())?)
        }
        other => anyhow::bail!("unknown backend '{other}'"),
    };

    let session = proxy.authenticate(&config.account.credentials()).await?;

    match cli.command {
        Command::Upload {
            path,
            caller_object_id,
            source_location,
            source_file,
            metadata,
        } => {
            let source = match (source_location, source_file) {
                (Some(raw), None) => UploadSource::Remote(parse_location(&raw)?),
                (None, Some(file)) => UploadSource::File(file),
                _ => anyhow::bail!("exactly one of --source-location or --source-file is required"),
            };
            let request = UploadRequest {
                path,
                caller_object_id,
                source,
            };
            let metadata = parse_metadata(&metadata)?;
            let response = proxy
                .upload_data_object(&session, request, &metadata, None)
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Download {
            location,
            destination_location,
            destination_file,
        } => {
            let destination = match (destination_location, destination_file) {
                (Some(raw), None) => DownloadDestination::Remote(parse_location(&raw)?),
                (None, Some(file)) => DownloadDestination::File(file),
                _ => anyhow::bail!(
                    "exactly one of --destination-location or --destination-file is required"
                ),
            };
            let request = DownloadRequest {
                archive_location: parse_location(&location)?,
                destination,
            };
            let response = proxy.download_data_object(&session, request, None).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Status { request_id } => {
            let status = proxy.get_data_transfer_status(&session, &request_id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Report { request_id } => {
            let report = proxy.get_data_transfer_report(&session, &request_id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Size { request_id } => {
            let size = proxy.get_data_transfer_size(&session, &request_id).await?;
            println!("{size}");
        }
        Command::Attributes { location, size } => {
            let location = parse_location(&location)?;
            let attributes = proxy
                .get_path_attributes(&session, &location, size)
                .await?;
            println!("{}", serde_json::to_string_pretty(&attributes)?);
        }
    }

    Ok(())
}
