//! Command-line entry point for sismo-scraper.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde_json::json;

use sismo_scraper::{
    extract_with_diagnostics, ChromiumRenderer, KeyValueStore, PersistMode, Renderer,
    ScraperConfig, SqliteStore, StrategyKind,
};
use sismo_scraper_handler::{init_tracing, invoke, LogFormat};

#[derive(Parser)]
#[command(
    name = "sismo-scraper",
    about = "Scrape the latest IGP seismic reports and persist them",
    version
)]
struct Cli {
    /// Path to a TOML config file (default: $SISMO_CONFIG or ./sismo-scraper.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log line format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, extract and persist the latest reports (default).
    Run {
        /// Fetch strategy to try, in order. Repeat to set a priority list.
        #[arg(long = "strategy")]
        strategies: Vec<StrategyKind>,

        /// Persistence mode (upsert, replace, off).
        #[arg(long)]
        persist: Option<PersistMode>,

        /// SQLite file to persist to (default: store_path, else ~/.sismo-scraper/sismos.db).
        #[arg(long, value_name = "PATH")]
        store: Option<PathBuf>,

        /// Dry run: keep records in memory only, ignoring any configured store.
        #[arg(long, conflicts_with = "store")]
        memory: bool,

        /// Triggering event as a JSON document. Logged, not interpreted.
        #[arg(long)]
        event: Option<String>,
    },

    /// Extract reports from a saved HTML page.
    Extract {
        /// HTML file to read.
        file: PathBuf,
    },

    /// Print the records currently in the store.
    List,

    /// Print the effective configuration as TOML.
    Config,

    /// Generate shell completion scripts.
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    let command = cli.command.unwrap_or(Commands::Run {
        strategies: Vec::new(),
        persist: None,
        store: None,
        memory: false,
        event: None,
    });

    match command {
        Commands::Run {
            strategies,
            persist,
            store,
            memory,
            event,
        } => {
            let mut config = ScraperConfig::load(cli.config.as_deref())?;
            if !strategies.is_empty() {
                config.strategies = strategies;
            }
            if let Some(persist) = persist {
                config.persist = persist;
            }
            config.store_path = resolve_store(config.store_path.take(), store, memory);
            config.validate()?;

            let event = match event {
                Some(raw) => serde_json::from_str(&raw).context("--event is not valid JSON")?,
                None => json!({}),
            };
            let context = json!({
                "invoked_by": "cli",
                "pid": std::process::id(),
            });

            let renderer = Arc::new(ChromiumRenderer::new(config.render.clone()));
            let response = invoke(&event, &context, &config, renderer.clone()).await;

            if let Err(e) = renderer.shutdown().await {
                tracing::warn!(error = %e, "failed to shut down Chromium");
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.is_success() {
                std::process::exit(1);
            }
        }

        Commands::Extract { file } => {
            let markup = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            let extraction = extract_with_diagnostics(&markup)?;
            let skipped: Vec<_> = extraction
                .skipped
                .iter()
                .map(|s| json!({ "row": s.index, "cells": s.cells }))
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "reports": extraction.reports,
                    "skipped": skipped,
                }))?
            );
        }

        Commands::List => {
            let config = ScraperConfig::load(cli.config.as_deref())?;
            let Some(path) = resolve_store(config.store_path, None, false) else {
                anyhow::bail!("no store configured");
            };
            if !path.exists() {
                anyhow::bail!("no store at {}", path.display());
            }
            let store = SqliteStore::open(&path, &config.table_name)?;
            println!("{}", serde_json::to_string_pretty(&store.scan()?)?);
        }

        Commands::Config => {
            let config = ScraperConfig::load(cli.config.as_deref())?;
            print!("{}", config.to_toml()?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "sismo-scraper", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// SQLite file a CLI run reads and writes: `--store`, then the configured
/// path, then the default file. `--memory` opts out of persistence to disk.
fn resolve_store(
    configured: Option<PathBuf>,
    flag: Option<PathBuf>,
    memory: bool,
) -> Option<PathBuf> {
    if memory {
        return None;
    }
    Some(flag.or(configured).unwrap_or_else(SqliteStore::default_path))
}
