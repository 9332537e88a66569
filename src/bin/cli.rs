//! feed-relay CLI
//!
//! Local execution entry point. For AWS Lambda, use `feed-relay-lambda`.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use feed_relay::{
    error::{AppError, Result},
    flow::{FlowDefinition, Provisioner, bedrock::BedrockFlows, pipeline_definition},
    models::{Config, format_rss_date},
    pipeline::{self, Collaborators},
    seed,
    services::{
        FileSourceFeed, HttpSourceFeed, SecretProvider, SecretsManagerProvider, SourceFeed,
        StaticSecretProvider,
    },
    storage::{BlobStore, FeedStore, LocalBlobStore, S3BlobStore},
    utils::aws::load_sdk_config,
};

/// Relay a news feed through a classification flow into RSS
#[derive(Parser, Debug)]
#[command(name = "feed-relay", version, about = "Feed relay runner and operator tool")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Use a local directory instead of S3 (defaults to storage.local_root)
    #[arg(long, value_name = "DIR", num_args = 0..=1, default_missing_value = "")]
    local: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one relay pass
    Run {
        #[command(flatten)]
        store: StoreArgs,

        /// Source feed URL, bypassing the secret lookup
        #[arg(long, conflicts_with = "source_file")]
        feed_url: Option<String>,

        /// Read the source feed from a file instead of fetching it
        #[arg(long)]
        source_file: Option<PathBuf>,
    },

    /// Ensure the flow exists and print it
    Provision {
        /// Delete every matching flow and create a new one
        #[arg(long)]
        force: bool,
    },

    /// Print the flow topology as JSON
    Definition,

    /// Write the bundled seed documents to the store
    Seed {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Validate configuration and flow topology
    Validate,

    /// List the items of a stored document
    Show {
        #[command(flatten)]
        store: StoreArgs,

        /// Document key (defaults to the public feed)
        #[arg(long)]
        key: Option<String>,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

async fn open_store(args: &StoreArgs, config: &Config) -> Result<Box<dyn BlobStore>> {
    match &args.local {
        Some(dir) => {
            let root = if dir.as_os_str().is_empty() {
                Path::new(&config.storage.local_root).to_path_buf()
            } else {
                dir.clone()
            };
            log::info!("Using local store at {}", root.display());
            Ok(Box::new(LocalBlobStore::new(root)))
        }
        None => {
            let sdk = load_sdk_config().await;
            Ok(Box::new(S3BlobStore::from_sdk_config(&sdk, &config.storage.bucket)?))
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn checked_definition(config: &Config) -> Result<FlowDefinition> {
    let definition = pipeline_definition(&config.pipeline);
    definition.validate()?;
    Ok(definition)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env();
    log::debug!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Run {
            store,
            feed_url,
            source_file,
        } => {
            config.validate()?;
            let blobs = open_store(&store, &config).await?;
            let sdk = load_sdk_config().await;
            let flows = BedrockFlows::from_sdk_config(&sdk, &config.pipeline);

            let secrets: Box<dyn SecretProvider> = match (&feed_url, &source_file) {
                (_, Some(path)) => Box::new(StaticSecretProvider::new(path.display().to_string())),
                (Some(url), None) => Box::new(StaticSecretProvider::new(url.clone())),
                (None, None) => Box::new(SecretsManagerProvider::from_sdk_config(&sdk)),
            };
            let source: Box<dyn SourceFeed> = match source_file {
                Some(path) => Box::new(FileSourceFeed::new(path)),
                None => Box::new(HttpSourceFeed::from_config(&config.source)?),
            };

            let deps = Collaborators {
                store: blobs.as_ref(),
                secrets: secrets.as_ref(),
                source: source.as_ref(),
                registry: &flows,
                invoker: &flows,
            };
            let outcome = pipeline::run_relay(&config, deps).await?;
            print_json(&outcome)?;
        }

        Command::Provision { force } => {
            config.pipeline.validate()?;
            if config.pipeline.execution_role_arn.trim().is_empty() {
                return Err(AppError::config(
                    "pipeline.execution_role_arn is empty (set FLOW_EXECUTION_ROLE_ARN)",
                ));
            }
            let sdk = load_sdk_config().await;
            let flows = BedrockFlows::from_sdk_config(&sdk, &config.pipeline);
            let provisioner = Provisioner::new(&flows, &config.pipeline);

            let instance = if force {
                provisioner.recreate().await?
            } else {
                provisioner.ensure_pipeline().await?
            };
            print_json(&instance)?;
        }

        Command::Definition => {
            print_json(&checked_definition(&config)?)?;
        }

        Command::Seed { store } => {
            let blobs = open_store(&store, &config).await?;
            let written = seed::seed_store(blobs.as_ref()).await?;
            log::info!("Seeded {} documents", written.len());
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            config.validate()?;
            log::info!("✓ Config OK");

            let definition = checked_definition(&config)?;
            log::info!(
                "✓ Flow topology OK ({} nodes, {} connections)",
                definition.nodes.len(),
                definition.connections.len()
            );
        }

        Command::Show { store, key } => {
            let blobs = open_store(&store, &config).await?;
            let key = key.unwrap_or_else(|| config.storage.public_key.clone());
            let document = FeedStore::new(blobs.as_ref(), &config.feed).load(&key).await?;

            println!("{} ({} items)", document.title, document.len());
            if let Some(built) = document.last_build {
                println!("Last build: {}", format_rss_date(built));
            }
            for (index, item) in document.items.iter().enumerate() {
                let published = item.published_at.map(format_rss_date).unwrap_or_default();
                println!("{index:>3}  {}  {}  {}", item.guid, published, item.title);
            }
        }
    }

    Ok(())
}
