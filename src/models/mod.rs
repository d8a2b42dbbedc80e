// src/models/mod.rs

//! Domain models for the watcher application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod record;
mod seen;

// Re-export all public types
pub use config::{
    Config, ExtractionConfig, FeedConfig, FetchConfig, ModeFlags, NoveltyPolicy, RenderConfig,
    RetentionConfig, StateConfig, TelegramConfig, env_keys,
};
pub use record::{IDENTITY_SEPARATOR, Record, identity};
pub use seen::{LatestMarker, LatestState, SeenEntry, SeenLedger, SeenState};
