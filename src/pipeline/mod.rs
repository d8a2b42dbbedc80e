//! Pipeline entry points for watcher operations.
//!
//! - `detect`: novelty rules comparing records against seen-state
//! - `watch`: the cycle orchestrator
//! - `run_watcher`: one cycle wired to the real HTTP, browser and Telegram

pub mod detect;
pub mod watch;

pub use detect::{detect_latest, detect_new, detect_unseen};
pub use watch::{CycleReport, FeedReport, Watcher};

use crate::error::Result;
use crate::models::Config;
use crate::services::{HttpFetcher, RenderedFetcher, TelegramNotifier};
use crate::storage::StateStore;

/// Run one cycle against the live services described by `config`.
///
/// Failures are forwarded to the chat when error reporting is enabled
/// before being returned.
pub async fn run_watcher(config: &Config) -> Result<CycleReport> {
    config.validate()?;
    config.validate_credentials()?;

    let primary = HttpFetcher::new(&config.fetch)?;
    let rendered = RenderedFetcher::new(&config.render, &config.fetch);
    let notifier = TelegramNotifier::new(&config.telegram)?;
    let store = StateStore::new(&config.state.path);

    let mut watcher = Watcher::new(config, &primary, &notifier, &store)?;
    if config.render.enabled {
        watcher = watcher.with_rendered(&rendered);
    }

    let result = watcher.execute().await;
    if let Err(e) = &result {
        watcher.report_failure(e).await;
    }
    result
}
