use once_cell::sync::Lazy;
use regex::Regex;

use crate::coerce::Coerced;
use crate::mapper::MappedRow;
use crate::models::{Criteria, GenderDistribution, PlacementRecord, RecordField, Selections};

static ACADEMIC_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").expect("academic year pattern is valid"));

/// Why a mapped row could not become a record.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    EmptyCompanyName,
    InvalidAcademicYear(String),
    NegativeValue { field: RecordField, value: f64 },
    NonFiniteValue { field: RecordField },
    CountOutOfRange { field: RecordField, value: i64 },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::EmptyCompanyName => write!(f, "company name is empty"),
            RejectReason::InvalidAcademicYear(year) => {
                write!(f, "academic year '{year}' is not YYYY-YY")
            }
            RejectReason::NegativeValue { field, value } => {
                write!(f, "{} is negative ({value})", field.name())
            }
            RejectReason::NonFiniteValue { field } => write!(f, "{} is not finite", field.name()),
            RejectReason::CountOutOfRange { field, value } => {
                write!(f, "{} count {value} is out of range", field.name())
            }
        }
    }
}

pub fn is_academic_year(value: &str) -> bool {
    ACADEMIC_YEAR.is_match(value)
}

/// Validates a mapped row against the current record schema and assembles the record.
pub fn build_record(academic_year: &str, row: MappedRow) -> Result<PlacementRecord, RejectReason> {
    let company_name = row.company_name.trim().to_string();
    if company_name.is_empty() {
        return Err(RejectReason::EmptyCompanyName);
    }
    if !is_academic_year(academic_year) {
        return Err(RejectReason::InvalidAcademicYear(academic_year.to_string()));
    }

    let defaulted_fields = row.defaulted_fields();
    let salary_lpa = amount(RecordField::SalaryLpa, row.salary_lpa)?;
    let total_salary_lpa = amount(RecordField::TotalSalaryLpa, row.total_salary_lpa)?;
    let min_cgpa = amount(RecordField::MinCgpa, row.min_cgpa)?;

    let selections = Selections {
        ce: count(RecordField::SelectionsCe, row.selections_ce)?,
        it: count(RecordField::SelectionsIt, row.selections_it)?,
        entc: count(RecordField::SelectionsEntc, row.selections_entc)?,
    };
    let gender_distribution = GenderDistribution {
        male: count(RecordField::GenderMale, row.gender_male)?,
        female: count(RecordField::GenderFemale, row.gender_female)?,
        total: count(RecordField::GenderTotal, row.gender_total)?,
    };

    Ok(PlacementRecord::assemble(
        academic_year.to_string(),
        company_name,
        salary_lpa,
        Criteria {
            min_cgpa,
            eligible_branches: row.eligible_branches,
        },
        selections,
        gender_distribution,
        total_salary_lpa,
        defaulted_fields,
    ))
}

fn amount(field: RecordField, value: Coerced<f64>) -> Result<f64, RejectReason> {
    let value = value.value();
    if !value.is_finite() {
        return Err(RejectReason::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(RejectReason::NegativeValue { field, value });
    }
    Ok(value)
}

fn count(field: RecordField, value: Coerced<i64>) -> Result<u32, RejectReason> {
    let value = value.value();
    u32::try_from(value).map_err(|_| RejectReason::CountOutOfRange { field, value })
}
