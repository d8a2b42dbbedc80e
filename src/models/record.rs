//! Trade record data structure.

use serde::{Deserialize, Serialize};

use crate::utils::escape_html;

/// Separator between the fields that make up a record identity.
pub const IDENTITY_SEPARATOR: &str = "||";

/// A trade disclosure row classified by the extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    /// Name of the feed the row was found on
    pub feed: String,

    /// Non-empty, trimmed cell texts in source order
    pub columns: Vec<String>,

    /// Security symbol
    pub ticker: String,

    /// Cell describing the action (purchase, sale, ...)
    pub transaction_label: String,

    /// Cell describing when the trade happened
    pub traded_label: String,

    /// Cells not claimed by any of the fields above
    pub details: Vec<String>,
}

/// Build the identity key for a ticker/transaction/traded triple.
pub fn identity(ticker: &str, transaction: &str, traded: &str) -> String {
    [ticker, transaction, traded].join(IDENTITY_SEPARATOR)
}

impl Record {
    /// Deduplication and novelty key.
    ///
    /// Rows that agree on ticker, transaction and traded label share an
    /// identity even when their other cells differ.
    pub fn identity(&self) -> String {
        identity(&self.ticker, &self.transaction_label, &self.traded_label)
    }

    /// One-line human readable rendering.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} — {} {}",
            self.traded_label, self.transaction_label, self.ticker
        );
        if !self.details.is_empty() {
            line.push_str(" — ");
            line.push_str(&self.details.join(", "));
        }
        line
    }

    /// Format the record for a Telegram HTML message using a template.
    ///
    /// Supported placeholders:
    /// - `{summary}`, `{ticker}`, `{transaction}`, `{traded}`
    /// - `{feed}`, `{url}`
    ///
    /// Substituted values are HTML-escaped; the template itself is not.
    pub fn format(&self, template: &str, url: &str) -> String {
        template
            .replace("{summary}", &escape_html(&self.summary()))
            .replace("{ticker}", &escape_html(&self.ticker))
            .replace("{transaction}", &escape_html(&self.transaction_label))
            .replace("{traded}", &escape_html(&self.traded_label))
            .replace("{feed}", &escape_html(&self.feed))
            .replace("{url}", &escape_html(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> Record {
        Record {
            feed: "Pelosi".to_string(),
            columns: vec![
                "NVDA".to_string(),
                "Purchase".to_string(),
                "2024-06-24".to_string(),
                "$1M - $5M".to_string(),
            ],
            ticker: "NVDA".to_string(),
            transaction_label: "Purchase".to_string(),
            traded_label: "2024-06-24".to_string(),
            details: vec!["$1M - $5M".to_string()],
        }
    }

    #[test]
    fn test_identity_is_deterministic() {
        let record = sample_record();
        assert_eq!(record.identity(), "NVDA||Purchase||2024-06-24");
        assert_eq!(record.identity(), record.identity());
        assert_eq!(
            record.identity(),
            identity("NVDA", "Purchase", "2024-06-24")
        );
    }

    #[test]
    fn test_identity_ignores_other_columns() {
        let a = sample_record();
        let mut b = sample_record();
        b.columns.push("Nancy Pelosi".to_string());
        b.details = vec!["$250K - $500K".to_string()];
        b.feed = "All Congress Trades".to_string();
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn test_summary() {
        let mut record = sample_record();
        assert_eq!(record.summary(), "2024-06-24 — Purchase NVDA — $1M - $5M");

        record.details.clear();
        assert_eq!(record.summary(), "2024-06-24 — Purchase NVDA");
    }

    #[test]
    fn test_format_escapes_values() {
        let mut record = sample_record();
        record.details = vec!["<script>".to_string()];
        let text = record.format("<b>{ticker}</b> {summary} [{feed}] {url}", "https://x.test/?a=1&b=2");
        assert_eq!(
            text,
            "<b>NVDA</b> 2024-06-24 — Purchase NVDA — &lt;script&gt; [Pelosi] https://x.test/?a=1&amp;b=2"
        );
    }
}
