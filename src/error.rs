// src/error.rs

//! Unified error handling for the watcher application.

use std::fmt;

use thiserror::Error;

use crate::services::NotifyError;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Process exit codes reported by the CLI.
pub mod exit_codes {
    /// Cycle finished, whether or not anything new was found.
    pub const SUCCESS: u8 = 0;
    /// Fetch, parse or configuration failure.
    pub const GENERIC: u8 = 1;
    /// At least one feed yielded no records (possible layout change).
    pub const NO_RECORDS: u8 = 2;
    /// At least one notification could not be delivered.
    pub const DELIVERY_FAILED: u8 = 3;
    /// Seen-state could not be written.
    pub const STATE_PERSIST: u8 = 4;
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Notification could not be delivered
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// No record could be identified on the listed feeds
    #[error("No records found on: {}", feeds.join(", "))]
    NoRecords { feeds: Vec<String> },

    /// One or more alerts were not delivered; state was not advanced for them
    #[error("Failed to deliver {failed} notification(s)")]
    Delivery { failed: usize },

    /// Seen-state write failed
    #[error("Failed to persist state to {path}: {message}")]
    StatePersist { path: String, message: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a state persistence error.
    pub fn state_persist(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::StatePersist {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Exit code the process should terminate with for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::NoRecords { .. } => exit_codes::NO_RECORDS,
            Self::Delivery { .. } | Self::Notify(_) => exit_codes::DELIVERY_FAILED,
            Self::StatePersist { .. } => exit_codes::STATE_PERSIST,
            _ => exit_codes::GENERIC,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_failure_kind() {
        let no_records = AppError::NoRecords {
            feeds: vec!["Pelosi".into()],
        };
        let delivery = AppError::Delivery { failed: 1 };
        let persist = AppError::state_persist("last_seen.json", "disk full");
        let generic = AppError::config("missing token");

        assert_eq!(no_records.exit_code(), exit_codes::NO_RECORDS);
        assert_eq!(delivery.exit_code(), exit_codes::DELIVERY_FAILED);
        assert_eq!(persist.exit_code(), exit_codes::STATE_PERSIST);
        assert_eq!(generic.exit_code(), exit_codes::GENERIC);
    }

    #[test]
    fn no_records_message_lists_feeds() {
        let err = AppError::NoRecords {
            feeds: vec!["Pelosi".into(), "All".into()],
        };
        assert_eq!(err.to_string(), "No records found on: Pelosi, All");
    }
}
