//! Seen-state persistence.
//!
//! A single JSON document at a fixed path holds everything the watcher
//! remembers between cycles. It is read once at cycle start and written
//! only when the cycle changed it.

pub mod local;

// Re-export for convenience
pub use local::StateStore;
