//! Trade watcher CLI
//!
//! Runs one watch cycle per invocation; schedule it externally (cron,
//! CI schedule, systemd timer). The exit code tells the scheduler what
//! happened, see `trade_watcher::error::exit_codes`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use trade_watcher::{
    error::{AppError, Result, exit_codes},
    models::{Config, SeenState},
    pipeline,
    services::{Notifier, RecordExtractor, TelegramNotifier},
    storage::StateStore,
};

/// Trade Watcher - trading disclosure notifier
#[derive(Parser, Debug)]
#[command(
    name = "trade-watcher",
    version,
    about = "Polls trading disclosure pages and posts new trades to Telegram"
)]

struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "watcher.toml", global = true)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one watch cycle (default)
    Run {
        /// Skip the plain fetch and always use the headless browser
        #[arg(long)]
        force_render: bool,

        /// Override the state file path
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Send the test message and exit
    Test,

    /// Extract records from a saved HTML page
    Extract {
        /// HTML file to read
        #[arg(short, long)]
        file: PathBuf,

        /// Feed name attached to the records
        #[arg(long, default_value = "local")]
        feed: String,
    },

    /// Validate configuration and credentials
    Validate,

    /// Show seen-state info
    Info,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn load_config(path: &Path) -> Config {
    let mut config = if path.exists() {
        log::info!("Loading configuration from {}", path.display());
        Config::load_or_default(path)
    } else {
        log::info!("No config at {}, using defaults", path.display());
        Config::default()
    };
    config.apply_env(|key| std::env::var(key).ok());
    config
}

/// Main entry point for the CLI application.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let command = cli.command.unwrap_or(Command::Run {
        force_render: false,
        state: None,
    });

    let code = match dispatch(command, &cli.config).await {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            e.exit_code()
        }
    };

    ExitCode::from(code)
}

async fn dispatch(command: Command, config_path: &Path) -> Result<()> {
    match command {
        Command::Run {
            force_render,
            state,
        } => {
            let mut config = load_config(config_path);
            if force_render {
                config.modes.force_render = true;
                config.render.enabled = true;
            }
            if let Some(path) = state {
                config.state.path = path.display().to_string();
            }

            let report = pipeline::run_watcher(&config).await?;
            log::info!(
                "Cycle complete: {} notified{}",
                report.notified(),
                if report.state_saved { ", state saved" } else { "" }
            );
        }

        Command::Test => {
            let config = load_config(config_path);
            config.validate_credentials()?;
            TelegramNotifier::new(&config.telegram)?
                .send(&config.telegram.test_message)
                .await?;
            log::info!("Test message sent.");
        }

        Command::Extract { file, feed } => {
            let config = load_config(config_path);
            let html = std::fs::read_to_string(&file)?;
            let extraction = RecordExtractor::new(&config.extraction)?.extract(&html, &feed);

            if extraction.is_empty() {
                return Err(AppError::NoRecords { feeds: vec![feed] });
            }

            log::info!(
                "{} records via {:?}",
                extraction.records.len(),
                extraction.strategy
            );
            for record in &extraction.records {
                println!("{}\t{}", record.identity(), record.summary());
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            let config = load_config(config_path);

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({} feeds)", config.feeds.len());

            config.validate_credentials()?;
            log::info!("✓ Telegram credentials present");

            log::info!("All validations passed!");
        }

        Command::Info => {
            let config = load_config(config_path);
            let store = StateStore::new(&config.state.path);
            log::info!("State file: {}", store.path().display());
            log::info!("Policy: {:?}", config.state.policy);

            if !store.path().exists() {
                log::info!("No state recorded yet.");
                return Ok(());
            }

            match store.load_state(config.state.policy).await {
                SeenState::Latest(latest) => {
                    for (feed, marker) in &latest.feeds {
                        log::info!(
                            "{}: {} (at {})",
                            feed,
                            marker.summary,
                            format_timestamp(marker.timestamp)
                        );
                    }
                }
                SeenState::Ledger(ledger) => {
                    log::info!("Recorded identities: {}", ledger.len());
                    if let Some(newest) = ledger.entries.values().max_by_key(|e| e.timestamp) {
                        log::info!(
                            "Most recent: {} (at {})",
                            newest.summary,
                            format_timestamp(newest.timestamp)
                        );
                    }
                }
            }
        }

        Command::Init { force } => {
            if config_path.exists() && !force {
                log::warn!(
                    "Config already exists at {}. Use --force to overwrite.",
                    config_path.display()
                );
                return Ok(());
            }
            std::fs::write(config_path, Config::default().to_toml()?)?;
            log::info!("Default configuration written to {}", config_path.display());
        }
    }

    Ok(())
}

fn format_timestamp(secs: i64) -> String {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}
