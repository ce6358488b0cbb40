/// Rows shorter than this cannot carry a company visit.
pub const MIN_DATA_CELLS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowClass {
    Header,
    Summary,
    Data,
    Malformed(MalformedReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    TooFewCells(usize),
    EmptyCompanyName,
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedReason::TooFewCells(n) => {
                write!(f, "row has {n} cells, need at least {MIN_DATA_CELLS}")
            }
            MalformedReason::EmptyCompanyName => write!(f, "company name is empty"),
        }
    }
}

/// Labels a raw row. Matching is case-sensitive, as the reports print it.
pub fn classify_row<S: AsRef<str>>(cells: &[S]) -> RowClass {
    if cells.len() < MIN_DATA_CELLS {
        return RowClass::Malformed(MalformedReason::TooFewCells(cells.len()));
    }

    let first = cells[0].as_ref();
    let company = cells[1].as_ref();

    if company.contains("Company") || first.contains("Sr.") {
        return RowClass::Header;
    }
    // "Grand Total" is covered by the same substring.
    if company.contains("Total") {
        return RowClass::Summary;
    }
    if company.trim().is_empty() {
        return RowClass::Malformed(MalformedReason::EmptyCompanyName);
    }

    RowClass::Data
}
