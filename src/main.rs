use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use std::path::PathBuf;
use tracing::info;

use socialfetch::config::platform::determine_platform;
use socialfetch::logging::{init_logging, LoggingConfig};
use socialfetch::{ConfigStore, FetcherFactory};

#[derive(Parser)]
#[command(name = "socialfetch")]
#[command(about = "Social media scraping framework command line interface")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, help = "Main configuration file path")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Fetcher configuration file path")]
    fetcher_config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the configuration files and report validation errors
    Validate,

    /// Print one configuration value by dot path
    Get {
        #[arg(help = "Dot-separated path, e.g. fetcher.retry.attempts")]
        path: String,
    },

    /// List configured platforms and the resolved default
    Platforms,

    /// Dump the merged configuration with credentials masked
    Export {
        #[arg(short, long, help = "Output file path, stdout when omitted")]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let main_path = cli.config.or_else(default_config_path);
    let config = ConfigStore::load(main_path.as_deref(), cli.fetcher_config.as_deref())
        .context("failed to load configuration")?;

    let mut log_config = LoggingConfig::from_config(&config);
    if cli.verbose {
        log_config.level = "debug".to_string();
    }
    init_logging(&log_config)?;

    match cli.command {
        Commands::Validate => {
            // load() already ran schema validation
            info!("Configuration is valid");
            println!("configuration OK");
        }
        Commands::Get { path } => match config.get(&path) {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => {
                anyhow::bail!("no value at path '{path}'");
            }
        },
        Commands::Platforms => {
            let resolved = determine_platform(&config, None);
            let configured: Vec<&String> = config
                .subtree("platforms")
                .map(|tree| tree.keys().collect())
                .unwrap_or_default();
            println!("supported: {}", FetcherFactory::supported_platforms().join(", "));
            if configured.is_empty() {
                println!("configured: (none)");
            } else {
                let names: Vec<&str> = configured.iter().map(|s| s.as_str()).collect();
                println!("configured: {}", names.join(", "));
            }
            println!("default: {resolved}");
        }
        Commands::Export { output } => {
            let masked = config.export_safe();
            let rendered = serde_json::to_string_pretty(&masked)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("cannot write {}", path.display()))?;
                    info!("Masked configuration written to {}", path.display());
                }
                None => println!("{rendered}"),
            }
        }
    }

    Ok(())
}

/// Platform config directory, e.g. `~/.config/socialfetch/config.json`.
fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "socialfetch").map(|dirs| dirs.config_dir().join("config.json"))
}
