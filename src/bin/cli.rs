//! streamrank CLI
//!
//! Offline batch entry point; an external scheduler invokes `streamrank run`
//! periodically.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use streamrank::{
    error::Result,
    models::{Config, Source},
    pipeline::run_pipeline,
};

/// streamrank - IPTV playlist aggregator and ranker
#[derive(Parser, Debug)]
#[command(
    name = "streamrank",
    version,
    about = "Aggregates, probes and ranks IPTV playlist sources"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Path to the source list (one URL per line)
    #[arg(short, long, default_value = "sources.txt")]
    sources: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline: fetch → parse → probe → rank → write
    Run,

    /// Validate configuration and source list
    Validate,

    /// Show a summary of the current output artifacts
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Run => {
            config.validate()?;
            let stats = run_pipeline(Arc::new(config), &cli.sources).await?;
            log::info!(
                "Run complete in {}s: {} sources ({} failed), {} parsed, {} unique, {} valid, {} invalid{}",
                stats.elapsed_secs(),
                stats.sources_total,
                stats.sources_failed,
                stats.entries_parsed,
                stats.entries_unique,
                stats.entries_valid,
                stats.entries_invalid,
                if stats.used_backup { " (backup fallback)" } else { "" }
            );
            Ok(())
        }
        Command::Validate => validate(&config, &cli.sources).await,
        Command::Info => info(&config).await,
    }
}

/// Check the configuration and source list without touching the network.
async fn validate(config: &Config, sources: &PathBuf) -> Result<()> {
    config.validate()?;
    log::info!("Configuration OK");
    log::info!("  fetch timeout: {}s", config.fetcher.timeout_secs);
    log::info!("  probe hard timeout: {}s", config.probe.hard_timeout_secs);
    log::info!("  categories: {}", config.classify.categories.len());

    match tokio::fs::read_to_string(sources).await {
        Ok(text) => {
            let parsed = Source::parse_list(&text);
            log::info!("Source list OK: {} sources", parsed.len());
            for source in &parsed {
                log::debug!(
                    "  {} ({}){}",
                    source.name,
                    source.url,
                    if source.apply_region_filter {
                        ""
                    } else {
                        " [unfiltered]"
                    }
                );
            }
        }
        Err(error) => {
            log::warn!(
                "Source list {:?} unavailable ({}); runs will rely on the backup artifact",
                sources,
                error
            );
        }
    }
    Ok(())
}

/// Summarize the current artifacts.
async fn info(config: &Config) -> Result<()> {
    match tokio::fs::read_to_string(&config.output.index_path).await {
        Ok(index) => {
            for line in index.lines().take_while(|line| line.starts_with('#')) {
                log::info!("{}", line.trim_start_matches(['#', ' ']));
            }
        }
        Err(_) => log::info!("No index artifact at {:?}", config.output.index_path),
    }

    match tokio::fs::read_to_string(&config.output.playlist_path).await {
        Ok(playlist) => {
            let entries = playlist
                .lines()
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .count();
            log::info!(
                "Playlist {:?}: {} entries",
                config.output.playlist_path,
                entries
            );
        }
        Err(_) => log::info!("No playlist artifact at {:?}", config.output.playlist_path),
    }

    if config.output.backup_path.exists() {
        log::info!("Backup present at {:?}", config.output.backup_path);
    } else {
        log::info!("No backup artifact");
    }
    Ok(())
}
