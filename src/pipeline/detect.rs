//! Novelty detection.
//!
//! Decides which extracted records have not been notified yet, given the
//! state loaded at cycle start. Records are never reordered: extraction
//! order is taken as newest-first and date cells are not compared.

use crate::models::{LatestMarker, Record, SeenLedger, SeenState};

/// Latest-only rule: the first record is new iff it differs from the marker.
pub fn detect_latest<'a>(
    records: &'a [Record],
    marker: Option<&LatestMarker>,
) -> Option<&'a Record> {
    let latest = records.first()?;
    match marker {
        Some(marker) if marker.last_identity == latest.identity() => None,
        _ => Some(latest),
    }
}

/// Set-membership rule: every record whose identity is not in the ledger.
pub fn detect_unseen<'a>(records: &'a [Record], ledger: &SeenLedger) -> Vec<&'a Record> {
    records
        .iter()
        .filter(|record| !ledger.contains(&record.identity()))
        .collect()
}

/// New records of one feed under the policy `state` was loaded for.
pub fn detect_new<'a>(feed: &str, records: &'a [Record], state: &SeenState) -> Vec<&'a Record> {
    match state {
        SeenState::Latest(latest) => detect_latest(records, latest.marker(feed))
            .into_iter()
            .collect(),
        SeenState::Ledger(ledger) => detect_unseen(records, ledger),
    }
}
