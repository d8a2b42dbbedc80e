// src/services/extractor.rs

//! Trade record extraction from loosely structured HTML.
//!
//! Tables are tried in three passes, each only when the previous one
//! produced nothing:
//!
//! 1. tables following a heading whose text starts with a configured label
//! 2. every table in the document
//! 3. every row in the document, regardless of its table, including ARIA
//!    grid rows (`role="row"`) that script-rendered pages build from divs
//!
//! In the first two passes scanning stops after the first table that yields
//! a record; later tables are not merged in even if they hold more rows.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{ExtractionConfig, Record};
use crate::services::classify::RowClassifier;
use crate::utils::normalize_whitespace;

/// Elements whose leading text may name the trades section.
const ANCHOR_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "caption", "div", "section", "header", "span", "p",
    "strong", "b",
];

/// Which pass produced the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Labelled,
    AllTables,
    RowScan,
}

/// Result of extracting one page.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Unique records in document order
    pub records: Vec<Record>,
    /// `None` when nothing was found
    pub strategy: Option<Strategy>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Extracts trade records from feed pages.
pub struct RecordExtractor {
    classifier: RowClassifier,
    labels: Vec<String>,
    table_sel: Selector,
    row_sel: Selector,
    cell_sel: Selector,
    any_row_sel: Selector,
    any_cell_sel: Selector,
}

impl RecordExtractor {
    /// Create an extractor with the given heuristics.
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        Ok(Self {
            classifier: RowClassifier::new(config),
            labels: config
                .heading_labels
                .iter()
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty())
                .collect(),
            table_sel: Self::parse_selector("table")?,
            row_sel: Self::parse_selector("tr")?,
            cell_sel: Self::parse_selector("td, th")?,
            any_row_sel: Self::parse_selector(r#"tr, [role="row"]"#)?,
            any_cell_sel: Self::parse_selector(
                r#"td, th, [role="cell"], [role="gridcell"], [role="rowheader"]"#,
            )?,
        })
    }

    /// Extract unique records from a page, in document order.
    pub fn extract(&self, html: &str, feed: &str) -> Extraction {
        let document = Html::parse_document(html);

        let labelled = self.labelled_tables(&document);
        if let Some(records) = self.first_yielding(&labelled, feed) {
            return Self::finish(records, Strategy::Labelled);
        }

        let tables: Vec<ElementRef> = document.select(&self.table_sel).collect();
        if let Some(records) = self.first_yielding(&tables, feed) {
            return Self::finish(records, Strategy::AllTables);
        }

        let records: Vec<Record> = document
            .select(&self.any_row_sel)
            .filter_map(|row| self.classify_row(&row, &self.any_cell_sel, feed))
            .collect();
        if !records.is_empty() {
            return Self::finish(records, Strategy::RowScan);
        }

        Extraction::default()
    }

    fn finish(records: Vec<Record>, strategy: Strategy) -> Extraction {
        let records = dedup_by_identity(records);
        log::debug!("Extracted {} records via {:?}", records.len(), strategy);
        Extraction {
            records,
            strategy: Some(strategy),
        }
    }

    /// Tables introduced by a labelled heading or container.
    fn labelled_tables<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        if self.labels.is_empty() {
            return Vec::new();
        }

        // Pre-order: an element's own descendants come right after it.
        let elements: Vec<ElementRef<'a>> = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .collect();

        let mut tables: Vec<ElementRef<'a>> = Vec::new();
        for (index, element) in elements.iter().enumerate() {
            let name = element.value().name();
            if !ANCHOR_TAGS.contains(&name) || !self.is_labelled(element) {
                continue;
            }

            let table = if name == "caption" {
                element
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .find(|e| e.value().name() == "table")
            } else {
                elements[index + 1..]
                    .iter()
                    .find(|e| e.value().name() == "table")
                    .copied()
            };

            if let Some(table) = table {
                if !tables.iter().any(|t| t.id() == table.id()) {
                    tables.push(table);
                }
            }
        }
        tables
    }

    fn is_labelled(&self, element: &ElementRef) -> bool {
        let Some(first) = element.text().map(str::trim).find(|t| !t.is_empty()) else {
            return false;
        };
        let first = first.to_lowercase();
        self.labels.iter().any(|label| first.starts_with(label))
    }

    /// Records of the first table that yields any.
    fn first_yielding(&self, tables: &[ElementRef], feed: &str) -> Option<Vec<Record>> {
        tables.iter().find_map(|table| {
            let records: Vec<Record> = table
                .select(&self.row_sel)
                .filter_map(|row| self.classify_row(&row, &self.cell_sel, feed))
                .collect();
            (!records.is_empty()).then_some(records)
        })
    }

    fn classify_row(&self, row: &ElementRef, cells: &Selector, feed: &str) -> Option<Record> {
        let columns: Vec<String> = row
            .select(cells)
            .map(|cell| normalize_whitespace(&cell.text().collect::<Vec<_>>().join(" ")))
            .filter(|text| !text.is_empty())
            .collect();
        self.classifier.classify(feed, columns)
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

/// Drop records whose identity was already seen, keeping first occurrences.
pub fn dedup_by_identity(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::new();
    let mut deduped = Vec::with_capacity(records.len());
    for record in records {
        if seen.insert(record.identity()) {
            deduped.push(record);
        }
    }
    deduped
}
