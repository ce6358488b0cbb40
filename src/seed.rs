//! Pre-formatted JSON seed files (`placement_data_*_formatted.json`).
//!
//! Each file holds an array of records in the stored shape. They still pass through the record
//! builder, so ids and categories are re-derived and bad entries are quarantined.

use std::path::Path;

use serde_json::Value;

use crate::builder::build_record;
use crate::coerce::{parse_float, parse_int};
use crate::error::{PipelineError, PipelineResult};
use crate::extract::{DocumentExtraction, RowFailureKind, RowLocation, RowOutcome};
use crate::mapper::MappedRow;
use crate::models::Branch;
use crate::source::{file_name, resolve_academic_year};

pub const DEFAULT_SEED_PATTERN: &str = "placement_data_*_formatted.json";

pub fn read_seed_file(path: &Path) -> PipelineResult<DocumentExtraction> {
    let name = file_name(path);
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    extract_seed(&name, &value)
}

pub fn extract_seed(document: &str, value: &Value) -> PipelineResult<DocumentExtraction> {
    let entries = value.as_array().ok_or_else(|| PipelineError::Extraction {
        file: document.to_string(),
        message: "expected a JSON array of records".to_string(),
    })?;
    let fallback_year = resolve_academic_year(document);

    let mut extraction = DocumentExtraction::new();
    for (idx, entry) in entries.iter().enumerate() {
        let location = RowLocation {
            page: 1,
            table: 1,
            row: idx + 1,
        };
        let year = entry
            .get("academic_year")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| fallback_year.clone())
            .unwrap_or_default();
        let outcome = match build_record(&year, map_entry(entry)) {
            Ok(record) => RowOutcome::Record(Box::new(record)),
            Err(reason) => RowOutcome::Failed(RowFailureKind::Rejected(reason)),
        };
        extraction.push(document, location, outcome);
    }
    Ok(extraction)
}

fn map_entry(entry: &Value) -> MappedRow {
    let text = |pointer: &str| cell_text(entry.pointer(pointer));
    let eligible_branches = entry
        .pointer("/criteria/eligible_branches")
        .and_then(|v| serde_json::from_value::<Vec<Branch>>(v.clone()).ok())
        .unwrap_or_else(|| Branch::ALL.to_vec());

    MappedRow {
        company_name: entry
            .get("company_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string(),
        min_cgpa: parse_float(text("/criteria/min_cgpa").as_deref()),
        selections_ce: parse_int(text("/selections/CE").as_deref()),
        selections_it: parse_int(text("/selections/IT").as_deref()),
        selections_entc: parse_int(text("/selections/E&TC").as_deref()),
        gender_male: parse_int(text("/gender_distribution/male").as_deref()),
        gender_female: parse_int(text("/gender_distribution/female").as_deref()),
        gender_total: parse_int(text("/gender_distribution/total").as_deref()),
        salary_lpa: parse_float(text("/salary_lpa").as_deref()),
        total_salary_lpa: parse_float(text("/total_salary_lpa").as_deref()),
        eligible_branches,
    }
}

/// Numbers and strings both go through the same coercion as table cells.
fn cell_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
