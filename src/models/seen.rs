//! Persisted markers of what has already been notified.
//!
//! Two shapes exist, one per novelty policy:
//!
//! ```text
//! latest_only:     { "<feed>": { "last_identity": "...", "timestamp": 0, "summary": "..." } }
//! set_membership:  { "<identity>": { "summary": "...", "timestamp": 0 } }
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::config::{NoveltyPolicy, RetentionConfig};
use super::record::Record;

const SECS_PER_DAY: i64 = 86_400;

/// Last notified record of a single feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LatestMarker {
    pub last_identity: String,
    /// Unix seconds
    pub timestamp: i64,
    pub summary: String,
}

impl LatestMarker {
    pub fn from_record(record: &Record, now: i64) -> Self {
        Self {
            last_identity: record.identity(),
            timestamp: now,
            summary: record.summary(),
        }
    }
}

/// Latest-only state: one marker per feed, overwritten on each success.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct LatestState {
    pub feeds: BTreeMap<String, LatestMarker>,
}

impl LatestState {
    pub fn marker(&self, feed: &str) -> Option<&LatestMarker> {
        self.feeds.get(feed)
    }

    /// Replace the feed's marker with `record`.
    pub fn advance(&mut self, record: &Record, now: i64) {
        self.feeds
            .insert(record.feed.clone(), LatestMarker::from_record(record, now));
    }
}

/// A notified identity in the set-membership ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeenEntry {
    pub summary: String,
    /// Unix seconds
    pub timestamp: i64,
}

/// Set-membership state: every identity notified so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct SeenLedger {
    pub entries: BTreeMap<String, SeenEntry>,
}

impl SeenLedger {
    pub fn contains(&self, identity: &str) -> bool {
        self.entries.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a successfully notified record.
    pub fn insert(&mut self, record: &Record, now: i64) {
        self.entries.insert(
            record.identity(),
            SeenEntry {
                summary: record.summary(),
                timestamp: now,
            },
        );
    }

    /// Drop entries by age, then the oldest entries beyond the count cap.
    ///
    /// Identities in `keep` are never removed. Returns the number of entries
    /// dropped.
    pub fn prune(&mut self, retention: &RetentionConfig, now: i64, keep: &HashSet<String>) -> usize {
        let before = self.entries.len();

        if let Some(days) = retention.max_age_days {
            let cutoff = now - i64::from(days) * SECS_PER_DAY;
            self.entries
                .retain(|id, entry| entry.timestamp >= cutoff || keep.contains(id));
        }

        if self.entries.len() > retention.max_entries {
            let mut evictable: Vec<(i64, String)> = self
                .entries
                .iter()
                .filter(|(id, _)| !keep.contains(*id))
                .map(|(id, entry)| (entry.timestamp, id.clone()))
                .collect();
            evictable.sort();

            let excess = self.entries.len() - retention.max_entries;
            for (_, id) in evictable.into_iter().take(excess) {
                self.entries.remove(&id);
            }
        }

        before - self.entries.len()
    }
}

/// Loaded seen-state for the configured policy.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SeenState {
    Latest(LatestState),
    Ledger(SeenLedger),
}

impl SeenState {
    /// Empty state for a policy.
    pub fn empty(policy: NoveltyPolicy) -> Self {
        match policy {
            NoveltyPolicy::LatestOnly => Self::Latest(LatestState::default()),
            NoveltyPolicy::SetMembership => Self::Ledger(SeenLedger::default()),
        }
    }

    /// Number of markers or ledger entries.
    pub fn len(&self) -> usize {
        match self {
            Self::Latest(state) => state.feeds.len(),
            Self::Ledger(ledger) => ledger.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record that `record` was notified successfully.
    pub fn mark(&mut self, record: &Record, now: i64) {
        match self {
            Self::Latest(state) => state.advance(record, now),
            Self::Ledger(ledger) => ledger.insert(record, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ticker: &str) -> Record {
        Record {
            feed: "Pelosi".into(),
            columns: vec![ticker.into(), "Sale".into(), "2024-01-15".into()],
            ticker: ticker.into(),
            transaction_label: "Sale".into(),
            traded_label: "2024-01-15".into(),
            details: vec![],
        }
    }

    fn entry(ts: i64) -> SeenEntry {
        SeenEntry {
            summary: String::new(),
            timestamp: ts,
        }
    }

    #[test]
    fn test_latest_state_advance_overwrites() {
        let mut state = LatestState::default();
        state.advance(&record("TSLA"), 10);
        state.advance(&record("NVDA"), 20);

        let marker = state.marker("Pelosi").unwrap();
        assert_eq!(marker.last_identity, "NVDA||Sale||2024-01-15");
        assert_eq!(marker.timestamp, 20);
        assert_eq!(state.feeds.len(), 1);
    }

    #[test]
    fn test_ledger_serializes_as_identity_map() {
        let mut ledger = SeenLedger::default();
        ledger.insert(&record("TSLA"), 1_700_000_000);
        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(
            json["TSLA||Sale||2024-01-15"]["timestamp"],
            serde_json::json!(1_700_000_000)
        );
    }

    #[test]
    fn test_prune_by_count_removes_oldest() {
        let mut ledger = SeenLedger::default();
        for (id, ts) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
            ledger.entries.insert(id.into(), entry(ts));
        }
        let retention = RetentionConfig {
            max_entries: 2,
            max_age_days: None,
        };

        let removed = ledger.prune(&retention, 10, &HashSet::new());
        assert_eq!(removed, 2);
        assert!(ledger.contains("c"));
        assert!(ledger.contains("d"));
    }

    #[test]
    fn test_prune_keeps_current_identities() {
        let mut ledger = SeenLedger::default();
        ledger.entries.insert("old".into(), entry(0));
        ledger.entries.insert("on-page".into(), entry(0));
        let retention = RetentionConfig {
            max_entries: 100,
            max_age_days: Some(1),
        };
        let keep: HashSet<String> = ["on-page".to_string()].into();

        let removed = ledger.prune(&retention, 10 * SECS_PER_DAY, &keep);
        assert_eq!(removed, 1);
        assert!(ledger.contains("on-page"));
        assert!(!ledger.contains("old"));
    }

    #[test]
    fn test_seen_state_empty_matches_policy() {
        assert!(matches!(
            SeenState::empty(NoveltyPolicy::LatestOnly),
            SeenState::Latest(_)
        ));
        assert!(SeenState::empty(NoveltyPolicy::SetMembership).is_empty());
    }
}
