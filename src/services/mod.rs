//! Service layer for the watcher application.
//!
//! This module contains the business logic for:
//! - Row classification (`RowClassifier`)
//! - Record extraction (`RecordExtractor`)
//! - Page fetching (`HttpFetcher`, `RenderedFetcher`)
//! - Notification delivery (`TelegramNotifier`)

pub mod classify;
mod extractor;
mod fetch;
mod notifier;

pub use classify::RowClassifier;
pub use extractor::{Extraction, RecordExtractor, Strategy, dedup_by_identity};
pub use fetch::{HttpFetcher, PageSource, RenderedFetcher};
pub use notifier::{Notifier, NotifyError, TelegramNotifier};
