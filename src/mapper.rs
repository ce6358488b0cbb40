use crate::coerce::{parse_float, parse_int, Coerced};
use crate::models::{Branch, RecordField};

/// Where a field sits in a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Counted from the first cell.
    Index(usize),
    /// Counted from the last cell; `FromEnd(1)` is the last one.
    FromEnd(usize),
}

impl Position {
    fn resolve(self, len: usize) -> Option<usize> {
        match self {
            Position::Index(i) if i < len => Some(i),
            Position::FromEnd(n) if n >= 1 && n <= len => Some(len - n),
            _ => None,
        }
    }
}

/// Positional layout of a report table.
///
/// Leading columns drift between report years, trailing salary columns do not, so the salary
/// fields are addressed from the end of the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    pub company_name: usize,
    pub min_cgpa: Position,
    pub selections_ce: Position,
    pub selections_it: Position,
    pub selections_entc: Position,
    pub gender_male: Position,
    pub gender_female: Position,
    pub gender_total: Position,
    pub salary_lpa: Position,
    pub total_salary_lpa: Position,
    pub eligible_branches: Vec<Branch>,
}

impl ColumnLayout {
    pub fn standard() -> Self {
        Self {
            company_name: 1,
            min_cgpa: Position::Index(2),
            selections_ce: Position::Index(3),
            selections_it: Position::Index(4),
            selections_entc: Position::Index(5),
            gender_male: Position::Index(6),
            gender_female: Position::Index(7),
            gender_total: Position::Index(8),
            salary_lpa: Position::FromEnd(3),
            total_salary_lpa: Position::FromEnd(1),
            eligible_branches: Branch::ALL.to_vec(),
        }
    }
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self::standard()
    }
}

/// A data row's cells, coerced but not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    pub company_name: String,
    pub min_cgpa: Coerced<f64>,
    pub selections_ce: Coerced<i64>,
    pub selections_it: Coerced<i64>,
    pub selections_entc: Coerced<i64>,
    pub gender_male: Coerced<i64>,
    pub gender_female: Coerced<i64>,
    pub gender_total: Coerced<i64>,
    pub salary_lpa: Coerced<f64>,
    pub total_salary_lpa: Coerced<f64>,
    pub eligible_branches: Vec<Branch>,
}

impl MappedRow {
    /// Fields that fell back to a default, in a stable order.
    pub fn defaulted_fields(&self) -> Vec<RecordField> {
        let checks = [
            (RecordField::MinCgpa, self.min_cgpa.is_defaulted()),
            (RecordField::SelectionsCe, self.selections_ce.is_defaulted()),
            (RecordField::SelectionsIt, self.selections_it.is_defaulted()),
            (RecordField::SelectionsEntc, self.selections_entc.is_defaulted()),
            (RecordField::GenderMale, self.gender_male.is_defaulted()),
            (RecordField::GenderFemale, self.gender_female.is_defaulted()),
            (RecordField::GenderTotal, self.gender_total.is_defaulted()),
            (RecordField::SalaryLpa, self.salary_lpa.is_defaulted()),
            (RecordField::TotalSalaryLpa, self.total_salary_lpa.is_defaulted()),
        ];
        checks
            .into_iter()
            .filter_map(|(field, defaulted)| defaulted.then_some(field))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// The trailing salary columns cannot be located.
    MissingColumn { field: RecordField, cells: usize },
    MissingCompanyColumn { cells: usize },
}

impl std::fmt::Display for MapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapError::MissingColumn { field, cells } => {
                write!(f, "row of {cells} cells has no column for {}", field.name())
            }
            MapError::MissingCompanyColumn { cells } => {
                write!(f, "row of {cells} cells has no company column")
            }
        }
    }
}

pub fn map_row<S: AsRef<str>>(layout: &ColumnLayout, cells: &[S]) -> Result<MappedRow, MapError> {
    let len = cells.len();
    let cell = |pos: Position| pos.resolve(len).map(|i| cells[i].as_ref());
    let required = |pos: Position, field: RecordField| {
        pos.resolve(len)
            .map(|i| cells[i].as_ref())
            .ok_or(MapError::MissingColumn { field, cells: len })
    };

    let salary = required(layout.salary_lpa, RecordField::SalaryLpa)?;
    let total_salary = required(layout.total_salary_lpa, RecordField::TotalSalaryLpa)?;
    let company = cells
        .get(layout.company_name)
        .map(|c| c.as_ref().trim().to_string())
        .ok_or(MapError::MissingCompanyColumn { cells: len })?;

    Ok(MappedRow {
        company_name: company,
        min_cgpa: parse_float(cell(layout.min_cgpa)),
        selections_ce: parse_int(cell(layout.selections_ce)),
        selections_it: parse_int(cell(layout.selections_it)),
        selections_entc: parse_int(cell(layout.selections_entc)),
        gender_male: parse_int(cell(layout.gender_male)),
        gender_female: parse_int(cell(layout.gender_female)),
        gender_total: parse_int(cell(layout.gender_total)),
        salary_lpa: parse_float(Some(salary)),
        total_salary_lpa: parse_float(Some(total_salary)),
        eligible_branches: layout.eligible_branches.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn maps_full_row() {
        let cells = row(&[
            "1", " Barclays ", "7.5", "4", "3", "3", "6", "4", "10", "12", "", "120",
        ]);
        let mapped = map_row(&ColumnLayout::standard(), &cells).unwrap();

        assert_eq!(mapped.company_name, "Barclays");
        assert_eq!(mapped.min_cgpa, Coerced::Parsed(7.5));
        assert_eq!(mapped.selections_ce, Coerced::Parsed(4));
        assert_eq!(mapped.selections_it, Coerced::Parsed(3));
        assert_eq!(mapped.selections_entc, Coerced::Parsed(3));
        assert_eq!(mapped.gender_total, Coerced::Parsed(10));
        assert_eq!(mapped.salary_lpa, Coerced::Parsed(12.0));
        assert_eq!(mapped.total_salary_lpa, Coerced::Parsed(120.0));
        assert!(mapped.defaulted_fields().is_empty());
    }

    #[test]
    fn short_rows_default_leading_fields() {
        // Five cells: salary is cells[2], total salary cells[4].
        let cells = row(&["1", "Infosys", "3.6", "2", "7.2"]);
        let mapped = map_row(&ColumnLayout::standard(), &cells).unwrap();

        assert_eq!(mapped.min_cgpa, Coerced::Parsed(3.6));
        assert_eq!(mapped.selections_ce, Coerced::Parsed(2));
        assert_eq!(mapped.selections_entc, Coerced::DefaultedMissing);
        assert_eq!(mapped.gender_male, Coerced::DefaultedMissing);
        assert_eq!(mapped.salary_lpa, Coerced::Parsed(3.6));
        assert_eq!(mapped.total_salary_lpa, Coerced::Parsed(7.2));
        assert_eq!(
            mapped.defaulted_fields(),
            vec![
                RecordField::SelectionsEntc,
                RecordField::GenderMale,
                RecordField::GenderFemale,
                RecordField::GenderTotal,
            ]
        );
    }

    #[test]
    fn unparseable_cells_are_flagged() {
        let cells = row(&["1", "TCS", "NA", "x", "2", "1", "", "", "", "3.5", "", "-"]);
        let mapped = map_row(&ColumnLayout::standard(), &cells).unwrap();

        assert_eq!(mapped.min_cgpa, Coerced::DefaultedUnparseable);
        assert_eq!(mapped.selections_ce, Coerced::DefaultedUnparseable);
        assert_eq!(mapped.gender_male, Coerced::DefaultedMissing);
        assert_eq!(mapped.total_salary_lpa, Coerced::DefaultedUnparseable);
        assert_eq!(mapped.salary_lpa.value(), 3.5);
    }

    #[test]
    fn rows_without_trailing_columns_error() {
        let cells = row(&["1", "TCS"]);
        let err = map_row(&ColumnLayout::standard(), &cells).unwrap_err();
        assert_eq!(
            err,
            MapError::MissingColumn {
                field: RecordField::SalaryLpa,
                cells: 2
            }
        );
    }
}
