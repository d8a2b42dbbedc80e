//! Local filesystem state store.
//!
//! Writes go to a sibling temp file that is then renamed over the target, so
//! a crash mid-write leaves the previous state intact.

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{LatestState, NoveltyPolicy, SeenLedger, SeenState};

/// JSON file holding the seen-state.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load state, falling back to `T::default()` on any read or parse error.
    pub async fn load<T: DeserializeOwned + Default>(&self) -> T {
        match self.read_json().await {
            Ok(Some(value)) => value,
            Ok(None) => {
                log::info!("No state file at {}, starting fresh", self.path.display());
                T::default()
            }
            Err(e) => {
                log::warn!(
                    "Failed to load state from {}: {}. Starting fresh.",
                    self.path.display(),
                    e
                );
                T::default()
            }
        }
    }

    /// Persist state. Any failure is reported as [`AppError::StatePersist`].
    pub async fn save<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let result = match serde_json::to_vec_pretty(value) {
            Ok(bytes) => self.write_bytes(&bytes).await,
            Err(e) => Err(AppError::Json(e)),
        };
        result.map_err(|e| AppError::state_persist(self.path.display().to_string(), e))
    }

    /// Load the state shape used by `policy`.
    pub async fn load_state(&self, policy: NoveltyPolicy) -> SeenState {
        match policy {
            NoveltyPolicy::LatestOnly => SeenState::Latest(self.load::<LatestState>().await),
            NoveltyPolicy::SetMembership => SeenState::Ledger(self.load::<SeenLedger>().await),
        }
    }

    pub async fn save_state(&self, state: &SeenState) -> Result<()> {
        self.save(state).await
    }

    async fn read_json<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match self.read_bytes().await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LatestMarker, SeenEntry};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path().join("last_seen.json"));

        let ledger: SeenLedger = store.load().await;
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("last_seen.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let state = StateStore::new(&path)
            .load_state(NoveltyPolicy::SetMembership)
            .await;
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_ledger_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path().join("nested/last_seen.json"));

        let mut ledger = SeenLedger::default();
        ledger.entries.insert(
            "TSLA||Sale||2024-01-15".to_string(),
            SeenEntry {
                summary: "2024-01-15 — Sale TSLA".to_string(),
                timestamp: 1_705_000_000,
            },
        );
        store.save_state(&SeenState::Ledger(ledger.clone())).await.unwrap();

        let loaded = store.load_state(NoveltyPolicy::SetMembership).await;
        assert_eq!(loaded, SeenState::Ledger(ledger));
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_latest_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path().join("last_seen.json"));

        let mut state = LatestState::default();
        state.feeds.insert(
            "Pelosi".to_string(),
            LatestMarker {
                last_identity: "NVDA||Purchase||2024-06-24".to_string(),
                timestamp: 1_719_000_000,
                summary: "2024-06-24 — Purchase NVDA".to_string(),
            },
        );
        store.save(&state).await.unwrap();

        let loaded: LatestState = store.load().await;
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_latest_file_is_not_a_ledger() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path().join("last_seen.json"));
        std::fs::write(
            store.path(),
            br#"{"last_identity": "x", "timestamp": 1, "summary": "s"}"#,
        )
        .unwrap();

        let ledger: SeenLedger = store.load().await;
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_save_failure_is_reported() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        let store = StateStore::new(blocker.join("last_seen.json"));

        let err = store.save(&SeenLedger::default()).await.unwrap_err();
        assert!(matches!(err, AppError::StatePersist { .. }));
    }
}
