//! Numeric coercion for free-form report cells.
//!
//! Source cells are formatted inconsistently ("1,200", " 7.5 ", "-", ""). Parsing is total:
//! [`Coerced::value`] falls back to zero, and the outcome tells a real zero from a default.

/// Outcome of coercing one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced<T> {
    Parsed(T),
    /// The cell was absent (short row) or blank.
    DefaultedMissing,
    /// The cell had text that is not a number.
    DefaultedUnparseable,
}

impl<T: Copy + Default> Coerced<T> {
    pub fn value(&self) -> T {
        match self {
            Coerced::Parsed(v) => *v,
            Coerced::DefaultedMissing | Coerced::DefaultedUnparseable => T::default(),
        }
    }

    pub fn is_defaulted(&self) -> bool {
        !matches!(self, Coerced::Parsed(_))
    }
}

pub fn parse_float(raw: Option<&str>) -> Coerced<f64> {
    let Some(cleaned) = clean(raw) else {
        return Coerced::DefaultedMissing;
    };
    match cleaned.parse::<f64>() {
        Ok(v) => Coerced::Parsed(v),
        Err(_) => Coerced::DefaultedUnparseable,
    }
}

/// Parses as a float first and truncates, so "12.0" and "1,200.75" are accepted.
pub fn parse_int(raw: Option<&str>) -> Coerced<i64> {
    match parse_float(raw) {
        Coerced::Parsed(v) if v.is_finite() => Coerced::Parsed(v.trunc() as i64),
        Coerced::Parsed(_) => Coerced::DefaultedUnparseable,
        Coerced::DefaultedMissing => Coerced::DefaultedMissing,
        Coerced::DefaultedUnparseable => Coerced::DefaultedUnparseable,
    }
}

fn clean(raw: Option<&str>) -> Option<String> {
    let cleaned = raw?.trim().replace(',', "");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float(raw: &str) -> f64 {
        parse_float(Some(raw)).value()
    }

    fn int(raw: &str) -> i64 {
        parse_int(Some(raw)).value()
    }

    #[test]
    fn strips_separators_and_whitespace() {
        assert_eq!(float(" 1,250.5 "), 1250.5);
        assert_eq!(int("1,200"), 1200);
        assert_eq!(float("7"), 7.0);
    }

    #[test]
    fn falls_back_to_zero() {
        assert_eq!(float("N/A"), 0.0);
        assert_eq!(float(""), 0.0);
        assert_eq!(int("-"), 0);
        assert_eq!(int("   "), 0);
    }

    #[test]
    fn int_truncates_fraction() {
        assert_eq!(int("12.9"), 12);
        assert_eq!(int("3.0"), 3);
        assert_eq!(int("1e2"), 100);
    }

    #[test]
    fn non_finite_ints_default() {
        assert_eq!(parse_int(Some("inf")), Coerced::DefaultedUnparseable);
        assert_eq!(parse_int(Some("NaN")), Coerced::DefaultedUnparseable);
    }

    #[test]
    fn outcomes_distinguish_missing_from_unparseable() {
        assert_eq!(parse_float(None), Coerced::DefaultedMissing);
        assert_eq!(parse_float(Some("  ")), Coerced::DefaultedMissing);
        assert_eq!(parse_float(Some("TBD")), Coerced::DefaultedUnparseable);
        assert_eq!(parse_float(Some("0")), Coerced::Parsed(0.0));
        assert!(!parse_float(Some("0")).is_defaulted());
        assert!(parse_int(Some("x")).is_defaulted());
    }
}
