//! Remote configuration CLI.
//!
//! Loads one or more configuration documents, follows nested `*Fetch`
//! references, and prints part of the merged result as JSON.
//!
//! ```text
//! remote-config --source https://example.com/settings.json keys
//! remote-config --config client.toml paths complexObject
//! remote-config --source https://example.com/settings.json get complexObject.prop1 --path
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use remote_config::config::{load_config, ClientConfig, NestedLoadMode};
use remote_config::observability::init_logging;
use remote_config::ConfigurationStore;

#[derive(Parser)]
#[command(name = "remote-config")]
#[command(about = "Load and inspect aggregated remote JSON configuration", long_about = None)]
struct Cli {
    /// Client settings file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Document URL to load; repeatable, loaded after the settings file sources.
    #[arg(short, long = "source")]
    sources: Vec<String>,

    /// Wait for nested documents inside each load instead of afterwards.
    #[arg(long)]
    await_nested: bool,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Top-level keys of the root document
    Keys,
    /// Leaf paths, optionally filtered by prefix
    Paths { filter: Option<String> },
    /// Value of a top-level key, or of a path with --path
    Get {
        key: String,
        #[arg(long)]
        path: bool,
    },
    /// The whole merged tree
    Dump,
    /// Documents that were loaded
    Urls,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if cli.await_nested {
        config.loading.nested_mode = NestedLoadMode::Awaited;
    }
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }
    config.loading.sources.extend(cli.sources.iter().cloned());

    init_logging(&config.observability.log_level);

    if config.loading.sources.is_empty() {
        return Err("no configuration source given (use --source or a settings file)".into());
    }

    let store = ConfigurationStore::from_config(&config)?;
    tracing::debug!(
        sources = config.loading.sources.len(),
        nested_mode = ?store.nested_mode(),
        "Loading configuration"
    );

    for source in &config.loading.sources {
        store.load(source).await?;
    }
    store.settle().await;

    let output = match cli.command {
        Commands::Keys => Value::from(store.get_keys()),
        Commands::Paths { filter } => Value::from(store.get_object_paths(filter.as_deref())),
        Commands::Get { key, path } => {
            let value = if path {
                store.get_path_value(&key)
            } else {
                store.get_value(&key)
            };
            value.unwrap_or(Value::Null)
        }
        Commands::Dump => store.snapshot().unwrap_or(Value::Null),
        Commands::Urls => Value::from(store.get_configuration_urls()),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
