//! Warnish CLI

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warnish_compression::loader::load_from_file;
use warnish_compression::{CacheConfig, CacheKeys};
use warnish_store::{CacheStore, StoreConfig};

#[derive(Parser)]
#[command(name = "warnish")]
#[command(about = "Warnish compression cache", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "warnish.yaml")]
        config: PathBuf,
    },

    /// Connect to the configured store and ping it
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "warnish.yaml")]
        config: PathBuf,

        /// Log level (trace, debug, info, warn, error)
        #[arg(short, long, default_value = "info")]
        log_level: String,
    },

    /// Show the cached entry for a URL
    Inspect {
        /// Path to configuration file
        #[arg(short, long, default_value = "warnish.yaml")]
        config: PathBuf,

        /// Request path and query, e.g. /index.html?lang=en
        #[arg(short, long)]
        url: String,

        /// Compression method the entry was stored under
        #[arg(short, long, default_value = "gzip")]
        method: String,

        /// Log level (trace, debug, info, warn, error)
        #[arg(short, long, default_value = "warn")]
        log_level: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => {
            tracing_subscriber::fmt().with_target(false).init();

            tracing::info!("Validating configuration: {}", config.display());

            match load_from_file(&config) {
                Ok(cfg) => {
                    tracing::info!("Configuration is valid");
                    tracing::info!("  Prefix: {}", cfg.prefix);
                    tracing::info!("  Methods: {}", cfg.methods.join(", "));
                    tracing::info!("  Entry TTL: {}s", cfg.cache_expires_secs);
                    tracing::info!("  Store: {}", describe_store(&cfg.store));
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Check { config, log_level } => {
            init_tracing(&log_level)?;

            let config = load(&config)?;
            let store = warnish_store::connect(&config.store)
                .await
                .with_context(|| format!("Failed to connect to {}", describe_store(&config.store)))?;
            store.health_check().await.context("Store health check failed")?;

            tracing::info!(store = %describe_store(&config.store), "Store is reachable");
            Ok(())
        }

        Commands::Inspect {
            config,
            url,
            method,
            log_level,
        } => {
            init_tracing(&log_level)?;

            let config = load(&config)?;
            let registry = config.registry()?;
            if registry.get(&method).is_none() {
                bail!(
                    "Method '{}' is not registered (registered: {})",
                    method,
                    config.methods.join(", ")
                );
            }

            let store = warnish_store::connect(&config.store).await?;
            let keys = CacheKeys::derive(&config.prefix, Some(&method), &url);
            inspect(store.as_ref(), &keys).await
        }

        Commands::Version => {
            println!("Warnish compression cache");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

fn load(path: &Path) -> Result<CacheConfig> {
    load_from_file(path).with_context(|| format!("Failed to load {}", path.display()))
}

async fn inspect(store: &dyn CacheStore, keys: &CacheKeys) -> Result<()> {
    println!("Body key:   {}", keys.body);
    println!("Header key: {}", keys.header);

    let Some(body) = store.get(&keys.body).await? else {
        println!("No cached entry");
        return Ok(());
    };

    let ttl = store.ttl(&keys.body).await?;
    let headers: BTreeMap<String, String> = store.hgetall(&keys.header).await?.into_iter().collect();

    println!("Body size:  {} bytes", body.len());
    match ttl {
        Some(ttl) => println!("Expires in: {}s", ttl.as_secs()),
        None => println!("Expires in: never"),
    }
    println!("Headers:");
    println!("{}", serde_json::to_string_pretty(&headers)?);

    Ok(())
}

fn describe_store(store: &StoreConfig) -> String {
    match store {
        StoreConfig::Memory => "in-memory".to_string(),
        StoreConfig::Redis(redis) => format!("redis at {}", redis.display_addr()),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true),
        )
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(filter.into())
                .add_directive("redis=warn".parse()?),
        )
        .init();

    Ok(())
}
