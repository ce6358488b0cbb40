use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::builder::{build_record, RejectReason};
use crate::classify::{classify_row, MalformedReason, RowClass};
use crate::mapper::{map_row, ColumnLayout, MapError};
use crate::models::{PlacementRecord, RecordField};
use crate::source::SourceDocument;

/// How many failing rows are kept as samples per document.
pub const MAX_FAILURE_SAMPLES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowLocation {
    pub page: usize,
    pub table: usize,
    pub row: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowFailureKind {
    Malformed(MalformedReason),
    Unmapped(MapError),
    Rejected(RejectReason),
}

impl std::fmt::Display for RowFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowFailureKind::Malformed(reason) => write!(f, "malformed row: {reason}"),
            RowFailureKind::Unmapped(err) => write!(f, "unmapped row: {err}"),
            RowFailureKind::Rejected(reason) => write!(f, "rejected record: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFailure {
    pub document: String,
    #[serde(flatten)]
    pub location: RowLocation,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionReport {
    pub rows_seen: usize,
    pub rows_accepted: usize,
    pub header_rows: usize,
    pub summary_rows: usize,
    /// Rows under the minimum cell count. Layout noise, not failures.
    pub short_rows: usize,
    pub malformed_rows: usize,
    pub rejected_rows: usize,
    /// First [`MAX_FAILURE_SAMPLES`] rows that failed past classification.
    pub samples: Vec<RowFailure>,
    pub defaulted_fields: BTreeMap<RecordField, usize>,
    pub gender_mismatches: usize,
}

impl ExtractionReport {
    pub fn rows_failed(&self) -> usize {
        self.malformed_rows + self.rejected_rows
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentExtraction {
    pub records: Vec<PlacementRecord>,
    pub report: ExtractionReport,
}

/// Result of pushing a single row through classify, map and build.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Record(Box<PlacementRecord>),
    Header,
    Summary,
    Failed(RowFailureKind),
}

pub fn process_row<S: AsRef<str>>(
    layout: &ColumnLayout,
    academic_year: &str,
    cells: &[S],
) -> RowOutcome {
    match classify_row(cells) {
        RowClass::Header => RowOutcome::Header,
        RowClass::Summary => RowOutcome::Summary,
        RowClass::Malformed(reason) => RowOutcome::Failed(RowFailureKind::Malformed(reason)),
        RowClass::Data => {
            let mapped = match map_row(layout, cells) {
                Ok(mapped) => mapped,
                Err(err) => return RowOutcome::Failed(RowFailureKind::Unmapped(err)),
            };
            match build_record(academic_year, mapped) {
                Ok(record) => RowOutcome::Record(Box::new(record)),
                Err(reason) => RowOutcome::Failed(RowFailureKind::Rejected(reason)),
            }
        }
    }
}

impl DocumentExtraction {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            report: ExtractionReport::default(),
        }
    }

    /// Folds one row outcome into the records and counters.
    pub fn push(&mut self, document: &str, location: RowLocation, outcome: RowOutcome) {
        let report = &mut self.report;
        report.rows_seen += 1;

        let kind = match outcome {
            RowOutcome::Record(record) => {
                report.rows_accepted += 1;
                for field in &record.defaulted_fields {
                    *report.defaulted_fields.entry(*field).or_insert(0) += 1;
                }
                if !record.gender_distribution.is_consistent() {
                    report.gender_mismatches += 1;
                }
                self.records.push(*record);
                return;
            }
            RowOutcome::Header => {
                report.header_rows += 1;
                return;
            }
            RowOutcome::Summary => {
                report.summary_rows += 1;
                return;
            }
            RowOutcome::Failed(kind) => kind,
        };

        match kind {
            // Short rows are layout noise, not worth a sample.
            RowFailureKind::Malformed(MalformedReason::TooFewCells(_)) => {
                report.short_rows += 1;
                return;
            }
            RowFailureKind::Malformed(_) => report.malformed_rows += 1,
            RowFailureKind::Unmapped(_) | RowFailureKind::Rejected(_) => report.rejected_rows += 1,
        }

        debug!(
            document,
            page = location.page,
            table = location.table,
            row = location.row,
            reason = %kind,
            "skipping row"
        );
        if report.samples.len() < MAX_FAILURE_SAMPLES {
            report.samples.push(RowFailure {
                document: document.to_string(),
                location,
                reason: kind.to_string(),
            });
        }
    }
}

impl Default for DocumentExtraction {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks every page, table and row of `document`. A failing row is recorded and skipped.
pub fn extract_document(
    document: &SourceDocument,
    academic_year: &str,
    layout: &ColumnLayout,
) -> DocumentExtraction {
    let mut extraction = DocumentExtraction::new();

    for (page_idx, page) in document.pages.iter().enumerate() {
        for (table_idx, table) in page.tables.iter().enumerate() {
            for (row_idx, row) in table.iter().enumerate() {
                let location = RowLocation {
                    page: page_idx + 1,
                    table: table_idx + 1,
                    row: row_idx + 1,
                };
                let outcome = process_row(layout, academic_year, row);
                extraction.push(&document.name, location, outcome);
            }
        }
    }

    extraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Page;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn document(tables: Vec<Vec<Vec<String>>>) -> SourceDocument {
        SourceDocument {
            name: "Placement Report 2023-24.pdf".to_string(),
            pages: vec![Page { tables }],
        }
    }

    #[test]
    fn data_row_yields_one_record_with_summed_selections() {
        let doc = document(vec![vec![row(&[
            "1", "Barclays", "7", "4", "3", "5", "8", "4", "12", "12", "", "144",
        ])]]);
        let out = extract_document(&doc, "2023-24", &ColumnLayout::standard());

        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].hires(), 4 + 3 + 5);
        assert_eq!(out.report.rows_seen, 1);
        assert_eq!(out.report.rows_accepted, 1);
    }

    #[test]
    fn header_and_summary_rows_produce_nothing() {
        let doc = document(vec![vec![
            row(&[
                "Sr.No", "Company Name", "CGPA", "CE", "IT", "ETC", "M", "F", "T", "LPA", "Total",
            ]),
            row(&["", "Grand Total", "", "", "", "", "", "", "", "", ""]),
        ]]);
        let out = extract_document(&doc, "2023-24", &ColumnLayout::standard());

        assert!(out.records.is_empty());
        assert_eq!(out.report.header_rows, 1);
        assert_eq!(out.report.summary_rows, 1);
        assert!(out.report.samples.is_empty());
    }

    #[test]
    fn short_rows_do_not_stop_the_page() {
        let doc = document(vec![vec![
            row(&["1", "Barclays"]),
            row(&[]),
            row(&["2", "Mastercard", "7", "2", "2", "0", "3", "1", "4", "9", "", "36"]),
        ]]);
        let out = extract_document(&doc, "2023-24", &ColumnLayout::standard());

        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].company_name, "Mastercard");
        assert_eq!(out.report.short_rows, 2);
        assert_eq!(out.report.malformed_rows, 0);
        assert_eq!(out.report.rows_failed(), 0);
        assert_eq!(out.report.rows_seen, 3);
    }

    #[test]
    fn rejected_rows_are_sampled_with_location() {
        let mut tables = vec![vec![]];
        for i in 0..(MAX_FAILURE_SAMPLES + 3) {
            let sr = i.to_string();
            tables[0].push(row(&[
                sr.as_str(), "Acme", "7", "-1", "0", "0", "", "", "", "6", "", "6",
            ]));
        }
        tables.push(vec![row(&["1", "Zeta", "7", "1", "0", "0", "1", "0", "1", "6", "", "6"])]);
        let doc = document(tables);
        let out = extract_document(&doc, "2023-24", &ColumnLayout::standard());

        assert_eq!(out.records.len(), 1);
        assert_eq!(out.report.rejected_rows, MAX_FAILURE_SAMPLES + 3);
        assert_eq!(out.report.samples.len(), MAX_FAILURE_SAMPLES);
        assert_eq!(
            out.report.samples[1].location,
            RowLocation {
                page: 1,
                table: 1,
                row: 2
            }
        );
        assert!(out.report.samples[0].reason.contains("selections.CE"));
    }

    #[test]
    fn tracks_defaults_and_gender_mismatch() {
        let doc = document(vec![vec![
            row(&["1", "Infosys", "3.6", "2", "7.2"]),
            row(&["2", "Wipro", "6", "1", "1", "1", "2", "2", "3", "3.5", "", "10.5"]),
        ]]);
        let out = extract_document(&doc, "2019-20", &ColumnLayout::standard());

        assert_eq!(out.records.len(), 2);
        assert_eq!(out.report.defaulted_fields.get(&RecordField::GenderTotal), Some(&1));
        // Infosys has 0/0/0 which is consistent; Wipro reports 2+2 against a total of 3.
        assert_eq!(out.report.gender_mismatches, 1);
    }

    #[test]
    fn empty_company_row_is_sampled_as_malformed() {
        let doc = document(vec![vec![row(&["4", " ", "7", "1", "1"])]]);
        let out = extract_document(&doc, "2019-20", &ColumnLayout::standard());

        assert!(out.records.is_empty());
        assert_eq!(out.report.malformed_rows, 1);
        assert_eq!(out.report.samples.len(), 1);
        assert_eq!(out.report.rows_failed(), 1);
    }
}
