// src/pipeline/watch.rs

//! One watch cycle: fetch → extract → detect → notify → persist.

use std::collections::HashSet;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{Config, FeedConfig, Record, SeenState};
use crate::services::{Extraction, Notifier, PageSource, RecordExtractor, Strategy};
use crate::storage::StateStore;
use crate::utils::escape_html;

use super::detect::detect_new;

/// Longest error text forwarded to the chat.
const MAX_ERROR_REPORT_CHARS: usize = 3500;

/// What happened to one feed during a cycle.
#[derive(Debug, Clone, Default)]
pub struct FeedReport {
    pub name: String,
    /// Page source that produced the records
    pub source: Option<String>,
    pub strategy: Option<Strategy>,
    pub records: usize,
    pub fresh: usize,
    pub notified: usize,
    pub failed: usize,
}

/// Summary of a finished cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub feeds: Vec<FeedReport>,
    pub state_saved: bool,
}

impl CycleReport {
    pub fn notified(&self) -> usize {
        self.feeds.iter().map(|f| f.notified).sum()
    }

    pub fn failed(&self) -> usize {
        self.feeds.iter().map(|f| f.failed).sum()
    }

    /// Feeds on which no record could be identified.
    pub fn empty_feeds(&self) -> Vec<String> {
        self.feeds
            .iter()
            .filter(|f| f.records == 0)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Turn cycle-level failures into an error.
    ///
    /// Delivery failures take precedence over empty feeds.
    pub fn into_result(self) -> Result<Self> {
        let failed = self.failed();
        if failed > 0 {
            return Err(AppError::Delivery { failed });
        }
        let empty = self.empty_feeds();
        if !empty.is_empty() {
            return Err(AppError::NoRecords { feeds: empty });
        }
        Ok(self)
    }

    pub fn log_summary(&self) {
        for feed in &self.feeds {
            log::info!(
                "{}: {} records ({} via {}), {} new, {} notified, {} failed",
                feed.name,
                feed.records,
                feed.strategy
                    .map(|s| format!("{s:?}"))
                    .unwrap_or_else(|| "none".to_string()),
                feed.source.as_deref().unwrap_or("-"),
                feed.fresh,
                feed.notified,
                feed.failed
            );
        }
        if self.notified() == 0 && self.failed() == 0 {
            log::info!("Nothing new.");
        }
    }
}

/// Orchestrates watch cycles over the configured feeds.
pub struct Watcher<'a> {
    config: &'a Config,
    extractor: RecordExtractor,
    primary: &'a dyn PageSource,
    rendered: Option<&'a dyn PageSource>,
    notifier: &'a dyn Notifier,
    store: &'a StateStore,
}

impl<'a> Watcher<'a> {
    pub fn new(
        config: &'a Config,
        primary: &'a dyn PageSource,
        notifier: &'a dyn Notifier,
        store: &'a StateStore,
    ) -> Result<Self> {
        Ok(Self {
            config,
            extractor: RecordExtractor::new(&config.extraction)?,
            primary,
            rendered: None,
            notifier,
            store,
        })
    }

    /// Use `rendered` when the plain fetch yields nothing, or always when
    /// `force_render` is set.
    pub fn with_rendered(mut self, rendered: &'a dyn PageSource) -> Self {
        self.rendered = Some(rendered);
        self
    }

    /// Run according to the configured mode and fold failures into the result.
    pub async fn execute(&self) -> Result<CycleReport> {
        if self.config.modes.test_mode {
            log::info!("Test mode: sending test message only.");
            self.send_test_message().await?;
            return Ok(CycleReport::default());
        }

        let report = self.run_cycle().await?;
        report.log_summary();
        report.into_result()
    }

    /// Send the canned test message.
    pub async fn send_test_message(&self) -> Result<()> {
        self.notifier.send(&self.config.telegram.test_message).await?;
        Ok(())
    }

    /// Forward a failure to the chat when error reporting is enabled.
    pub async fn report_failure(&self, error: &AppError) {
        if !self.config.modes.error_report {
            return;
        }
        let message: String = error
            .to_string()
            .chars()
            .take(MAX_ERROR_REPORT_CHARS)
            .collect();
        let text = self
            .config
            .telegram
            .error_template
            .replace("{error}", &escape_html(&message));
        if let Err(e) = self.notifier.send(&text).await {
            log::warn!("Failed to report error to chat: {}", e);
        }
    }

    /// Process every feed once and persist the state if it changed.
    ///
    /// Only a state write failure aborts the cycle; empty feeds and
    /// delivery failures are recorded in the report.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let policy = self.config.state.policy;
        let mut state = self.store.load_state(policy).await;
        log::info!(
            "Loaded {} seen entries ({:?}) from {}",
            state.len(),
            policy,
            self.store.path().display()
        );

        let mut report = CycleReport::default();
        let mut dirty = false;
        let mut attempted: HashSet<String> = HashSet::new();
        let mut on_page: HashSet<String> = HashSet::new();

        for feed in &self.config.feeds {
            let (extraction, source) = self.collect(feed).await;
            let mut feed_report = FeedReport {
                name: feed.name.clone(),
                source,
                strategy: extraction.strategy,
                records: extraction.records.len(),
                ..FeedReport::default()
            };

            if extraction.is_empty() {
                log::warn!(
                    "No records found on {} ({}); the page layout may have changed",
                    feed.name,
                    feed.url
                );
                report.feeds.push(feed_report);
                continue;
            }

            on_page.extend(extraction.records.iter().map(Record::identity));
            let fresh = detect_new(&feed.name, &extraction.records, &state);
            feed_report.fresh = fresh.len();

            for record in fresh {
                let identity = record.identity();
                if matches!(state, SeenState::Ledger(_)) && !attempted.insert(identity.clone()) {
                    log::debug!("Already handled {} this cycle", identity);
                    continue;
                }

                let text = record.format(&self.config.telegram.alert_template, &feed.url);
                match self.notifier.send(&text).await {
                    Ok(()) => {
                        log::info!("Notified: {}", record.summary());
                        state.mark(record, Utc::now().timestamp());
                        feed_report.notified += 1;
                        dirty = true;
                    }
                    Err(e) => {
                        log::error!("Failed to notify {}: {}", identity, e);
                        feed_report.failed += 1;
                    }
                }
            }

            report.feeds.push(feed_report);
        }

        if dirty {
            if let SeenState::Ledger(ledger) = &mut state {
                let removed = ledger.prune(
                    &self.config.state.retention,
                    Utc::now().timestamp(),
                    &on_page,
                );
                if removed > 0 {
                    log::info!("Pruned {} old seen entries", removed);
                }
            }
            self.store.save_state(&state).await?;
            report.state_saved = true;
            log::info!("State saved to {}", self.store.path().display());
        }

        Ok(report)
    }

    /// Fetch and extract one feed, falling back to the rendered source.
    async fn collect(&self, feed: &FeedConfig) -> (Extraction, Option<String>) {
        if self.config.modes.force_render {
            let Some(rendered) = self.rendered else {
                log::warn!("Rendered fetch forced but no renderer is configured");
                return (Extraction::default(), None);
            };
            let extraction = self.extract_from(rendered, feed).await;
            return (extraction, Some(rendered.name().to_string()));
        }

        let extraction = self.extract_from(self.primary, feed).await;
        if !extraction.is_empty() {
            return (extraction, Some(self.primary.name().to_string()));
        }

        if let Some(rendered) = self.rendered {
            log::info!("No records from plain fetch of {}; trying rendered fetch", feed.name);
            let extraction = self.extract_from(rendered, feed).await;
            if !extraction.is_empty() {
                return (extraction, Some(rendered.name().to_string()));
            }
        }

        (Extraction::default(), None)
    }

    async fn extract_from(&self, source: &dyn PageSource, feed: &FeedConfig) -> Extraction {
        match source.fetch(&feed.url).await {
            Some(html) => self.extractor.extract(&html, &feed.name),
            None => Extraction::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(name: &str, records: usize, notified: usize, failed: usize) -> FeedReport {
        FeedReport {
            name: name.to_string(),
            records,
            notified,
            failed,
            ..FeedReport::default()
        }
    }

    #[test]
    fn test_clean_report_is_ok() {
        let report = CycleReport {
            feeds: vec![feed("Pelosi", 3, 1, 0)],
            state_saved: true,
        };
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_empty_feed_is_no_records() {
        let report = CycleReport {
            feeds: vec![feed("Pelosi", 3, 0, 0), feed("All", 0, 0, 0)],
            state_saved: false,
        };
        match report.into_result() {
            Err(AppError::NoRecords { feeds }) => assert_eq!(feeds, vec!["All".to_string()]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_delivery_failure_takes_precedence() {
        let report = CycleReport {
            feeds: vec![feed("Pelosi", 3, 1, 2), feed("All", 0, 0, 0)],
            state_saved: true,
        };
        assert!(matches!(
            report.into_result(),
            Err(AppError::Delivery { failed: 2 })
        ));
    }
}
