//! Content-based row classification.
//!
//! Cells are assigned to record fields by what they look like rather than
//! where they sit, so column reordering on the source page does not break
//! extraction. [`RULES`] is evaluated in order; a cell claimed by one rule is
//! not offered to later ones.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{ExtractionConfig, Record};

static TICKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9.\-]{1,6}$").expect("valid ticker regex"));

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(buys?|bought|sells?|sold|purchase[sd]?|sales?|exchange[sd]?|options?)\b",
    )
        .expect("valid action regex")
});

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\b\d{4}-\d{2}-\d{2}\b",
        r"|^Q[1-4]$|\bQ[1-4]\s+\d{4}\b|\b\d{4}\s+Q[1-4]\b",
        r"|\b\d{1,2}/\d{1,2}/\d{2,4}\b",
        r"|\b(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4}\b",
    ))
    .expect("valid date regex")
});

/// Record field a rule fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Ticker,
    Transaction,
    Traded,
}

/// Which cells a rule may look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The first `ticker_columns` cells
    Leading,
    /// Every cell of the row
    Anywhere,
}

/// One entry of the classification table.
#[derive(Debug, Clone, Copy)]
pub struct ColumnRule {
    pub field: Field,
    pub scope: Scope,
    pub matcher: fn(&str) -> Option<String>,
    /// Column used when no cell matches
    pub fallback: Option<usize>,
    /// Whether a row without this field is rejected
    pub required: bool,
}

/// Classification rules in priority order.
pub const RULES: [ColumnRule; 3] = [
    ColumnRule {
        field: Field::Ticker,
        scope: Scope::Leading,
        matcher: match_ticker,
        fallback: None,
        required: true,
    },
    ColumnRule {
        field: Field::Transaction,
        scope: Scope::Anywhere,
        matcher: match_transaction,
        fallback: Some(1),
        required: false,
    },
    ColumnRule {
        field: Field::Traded,
        scope: Scope::Anywhere,
        matcher: match_traded,
        fallback: Some(3),
        required: false,
    },
];

/// Ticker-shaped cell, or the ticker-shaped first word of a cell.
///
/// Digit-only tokens, action keywords and quarter tokens are rejected.
pub fn match_ticker(cell: &str) -> Option<String> {
    let candidates = [Some(cell), cell.split_whitespace().next()];
    candidates.into_iter().flatten().find_map(|token| {
        let plausible = TICKER_RE.is_match(token)
            && token.chars().any(|c| c.is_ascii_uppercase())
            && !ACTION_RE.is_match(token)
            && !DATE_RE.is_match(token);
        plausible.then(|| token.to_string())
    })
}

/// Cell containing a trade action keyword.
pub fn match_transaction(cell: &str) -> Option<String> {
    ACTION_RE.is_match(cell).then(|| cell.to_string())
}

/// Cell containing something date-like.
pub fn match_traded(cell: &str) -> Option<String> {
    DATE_RE.is_match(cell).then(|| cell.to_string())
}

/// Turns rows of cell texts into records.
#[derive(Debug, Clone)]
pub struct RowClassifier {
    ticker_columns: usize,
    min_columns: usize,
}

impl RowClassifier {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            ticker_columns: config.ticker_columns,
            min_columns: config.min_columns,
        }
    }

    /// Classify one row; `None` means the row is not a trade.
    pub fn classify(&self, feed: &str, columns: Vec<String>) -> Option<Record> {
        if columns.is_empty() || columns.len() < self.min_columns {
            return None;
        }

        let mut claimed: Vec<usize> = Vec::with_capacity(RULES.len());
        let mut ticker = String::new();
        let mut transaction = String::new();
        let mut traded = String::new();

        for rule in &RULES {
            let limit = match rule.scope {
                Scope::Leading => self.ticker_columns.min(columns.len()),
                Scope::Anywhere => columns.len(),
            };

            let matched = columns[..limit]
                .iter()
                .enumerate()
                .filter(|(i, _)| !claimed.contains(i))
                .find_map(|(i, cell)| (rule.matcher)(cell).map(|value| (i, value)));

            let found = matched.or_else(|| {
                rule.fallback
                    .filter(|i| !claimed.contains(i))
                    .and_then(|i| columns.get(i).map(|cell| (i, cell.clone())))
            });

            let value = match found {
                Some((index, value)) => {
                    claimed.push(index);
                    value
                }
                None if rule.required => return None,
                None => String::new(),
            };

            match rule.field {
                Field::Ticker => ticker = value,
                Field::Transaction => transaction = value,
                Field::Traded => traded = value,
            }
        }

        let details = columns
            .iter()
            .enumerate()
            .filter(|(i, _)| !claimed.contains(i))
            .map(|(_, cell)| cell.clone())
            .collect();

        Some(Record {
            feed: feed.to_string(),
            columns,
            ticker,
            transaction_label: transaction,
            traded_label: traded,
            details,
        })
    }
}

impl Default for RowClassifier {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_match_ticker() {
        assert_eq!(match_ticker("TSLA"), Some("TSLA".to_string()));
        assert_eq!(match_ticker("BRK.B"), Some("BRK.B".to_string()));
        assert_eq!(match_ticker("NVDA NVIDIA Corp"), Some("NVDA".to_string()));
        assert_eq!(match_ticker("Tesla"), None);
        assert_eq!(match_ticker("2024"), None);
        assert_eq!(match_ticker("-"), None);
        assert_eq!(match_ticker("SALE"), None);
        assert_eq!(match_ticker("Q1"), None);
        assert_eq!(match_ticker("TOOLONG"), None);
        assert_eq!(match_ticker("BUYZ"), Some("BUYZ".to_string()));
        assert_eq!(match_ticker("SELLS"), None);
    }

    #[test]
    fn test_match_transaction() {
        assert!(match_transaction("Purchase").is_some());
        assert!(match_transaction("Sale (Partial)").is_some());
        assert!(match_transaction("Call Options").is_some());
        assert!(match_transaction("2024-01-15").is_none());
        assert!(match_transaction("Salesforce Inc").is_none());
        assert!(match_transaction("Optionality Fund").is_none());
    }

    #[test]
    fn test_match_traded() {
        assert!(match_traded("2024-01-15").is_some());
        assert!(match_traded("Q3 2023").is_some());
        assert!(match_traded("1/15/2024").is_some());
        assert!(match_traded("Jan. 15, 2024").is_some());
        assert!(match_traded("2023 Q4").is_some());
        assert!(match_traded("Q2").is_some());
        assert!(match_traded("Purchase").is_none());
        assert!(match_traded("Q2 Holdings").is_none());
    }

    #[test]
    fn test_company_names_do_not_shadow_keywords() {
        let classifier = RowClassifier::default();
        let purchase = classifier
            .classify("All", row(&["CRM", "Salesforce Inc", "Purchase", "2024-01-15"]))
            .unwrap();
        assert_eq!(purchase.transaction_label, "Purchase");
        assert_eq!(purchase.details, row(&["Salesforce Inc"]));

        let sale = classifier
            .classify("All", row(&["CRM", "Salesforce Inc", "Sale", "2024-01-15"]))
            .unwrap();
        assert_ne!(purchase.identity(), sale.identity());

        let quarter = classifier
            .classify("All", row(&["QTWO", "Q2 Holdings", "Sale", "Q1 2024"]))
            .unwrap();
        assert_eq!(quarter.traded_label, "Q1 2024");
        assert_eq!(quarter.details, row(&["Q2 Holdings"]));
    }

    #[test]
    fn test_ticker_starting_with_keyword() {
        let record = RowClassifier::default()
            .classify("All", row(&["BUYZ", "Purchase", "2024-01-15"]))
            .unwrap();
        assert_eq!(record.ticker, "BUYZ");
        assert_eq!(record.transaction_label, "Purchase");
    }

    #[test]
    fn test_classify_simple_row() {
        let record = RowClassifier::default()
            .classify("Pelosi", row(&["TSLA", "Sale", "2024-01-15"]))
            .unwrap();
        assert_eq!(record.ticker, "TSLA");
        assert_eq!(record.transaction_label, "Sale");
        assert_eq!(record.traded_label, "2024-01-15");
        assert!(record.details.is_empty());
        assert_eq!(record.feed, "Pelosi");
    }

    #[test]
    fn test_classify_reordered_columns() {
        let record = RowClassifier::default()
            .classify(
                "All",
                row(&["Jan 3, 2024", "AAPL Apple Inc", "Nancy Pelosi", "Purchase", "$1M"]),
            )
            .unwrap();
        assert_eq!(record.ticker, "AAPL");
        assert_eq!(record.transaction_label, "Purchase");
        assert_eq!(record.traded_label, "Jan 3, 2024");
        assert_eq!(record.details, row(&["Nancy Pelosi", "$1M"]));
    }

    #[test]
    fn test_classify_uses_fallback_columns() {
        let record = RowClassifier::default()
            .classify("All", row(&["MSFT", "Disclosed", "Filed late", "Last week"]))
            .unwrap();
        assert_eq!(record.transaction_label, "Disclosed");
        assert_eq!(record.traded_label, "Last week");
        assert_eq!(record.details, row(&["Filed late"]));
    }

    #[test]
    fn test_classify_rejects_rows_without_ticker() {
        let classifier = RowClassifier::default();
        assert!(classifier
            .classify("All", row(&["Stock", "Transaction", "Traded"]))
            .is_none());
        assert!(classifier
            .classify("All", row(&["Tesla", "Sale", "2024-01-15", "TSLA"]))
            .is_none());
        assert!(classifier.classify("All", Vec::new()).is_none());
    }

    #[test]
    fn test_classify_respects_min_columns() {
        assert!(RowClassifier::default().classify("All", row(&["TSLA"])).is_none());

        let lenient = RowClassifier::new(&ExtractionConfig {
            min_columns: 1,
            ..ExtractionConfig::default()
        });
        let record = lenient.classify("All", row(&["TSLA"])).unwrap();
        assert_eq!(record.transaction_label, "");
        assert_eq!(record.traded_label, "");
    }
}
