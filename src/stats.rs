//! Read-side statistics over placement records.
//!
//! Everything here is a pure function of the record slice it is given. Inputs are ordered by
//! id before grouping so repeated calls over the same records return identical output no matter
//! how the store returned them.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{
    Branch, CompanyDetail, CompanyProfile, CompanyVisit, GenderDivergence, PlacementRecord,
    RecordField, TopCompany, YearlyStats,
};

pub const TOP_COMPANIES: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsOptions {
    /// Leave salaries that were defaulted during extraction out of highest/avg/median.
    pub exclude_defaulted_salaries: bool,
}

/// Middle value of the ascending list, or the mean of the two central values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

fn sorted_by_id(records: &[PlacementRecord]) -> Vec<&PlacementRecord> {
    let mut sorted: Vec<&PlacementRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.id().cmp(b.id()));
    sorted
}

/// Stats for one year's records. An empty group gives zeros.
pub fn summarize_year(year: &str, records: &[&PlacementRecord], options: StatsOptions) -> YearlyStats {
    let salaries: Vec<f64> = records
        .iter()
        .filter(|r| !(options.exclude_defaulted_salaries && r.is_defaulted(RecordField::SalaryLpa)))
        .map(|r| r.salary_lpa)
        .collect();

    let highest_package = salaries.iter().copied().fold(None, |acc: Option<f64>, v| {
        Some(acc.map_or(v, |a| a.max(v)))
    });
    let avg_package = if salaries.is_empty() {
        0.0
    } else {
        salaries.iter().sum::<f64>() / salaries.len() as f64
    };

    let mut dept_distribution = [0u64; 3];
    for record in records {
        for (slot, branch) in dept_distribution.iter_mut().zip(Branch::ALL) {
            *slot += u64::from(record.selections.get(branch));
        }
    }

    let mut ranked: Vec<&PlacementRecord> = records.to_vec();
    ranked.sort_by(|a, b| {
        b.hires()
            .cmp(&a.hires())
            .then_with(|| a.company_name.cmp(&b.company_name))
    });
    let top_companies = ranked
        .into_iter()
        .take(TOP_COMPANIES)
        .map(|r| TopCompany {
            company: r.company_name.clone(),
            total_selected: r.hires(),
        })
        .collect();

    YearlyStats {
        year: year.to_string(),
        total_placed: records.iter().map(|r| r.hires()).sum(),
        highest_package: highest_package.unwrap_or(0.0),
        avg_package,
        median_package: median(&salaries).unwrap_or(0.0),
        dept_distribution,
        top_companies,
    }
}

/// One entry per academic year, newest first.
pub fn yearly_stats(records: &[PlacementRecord], options: StatsOptions) -> Vec<YearlyStats> {
    let mut groups: BTreeMap<&str, Vec<&PlacementRecord>> = BTreeMap::new();
    for record in sorted_by_id(records) {
        groups.entry(record.academic_year.as_str()).or_default().push(record);
    }

    groups
        .iter()
        .rev()
        .map(|(year, group)| summarize_year(year, group, options))
        .collect()
}

/// Stats for `year`, or `None` when no record carries that year.
pub fn yearly_stats_for(
    records: &[PlacementRecord],
    year: &str,
    options: StatsOptions,
) -> Option<YearlyStats> {
    let group: Vec<&PlacementRecord> = sorted_by_id(records)
        .into_iter()
        .filter(|r| r.academic_year == year)
        .collect();
    if group.is_empty() {
        return None;
    }
    Some(summarize_year(year, &group, options))
}

fn profile(company: &str, records: &[&PlacementRecord]) -> CompanyProfile {
    let years: BTreeSet<&str> = records.iter().map(|r| r.academic_year.as_str()).collect();
    let max_salary = records
        .iter()
        .map(|r| r.salary_lpa)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));
    let min_cgpa = records
        .iter()
        .map(|r| r.criteria.min_cgpa)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))));

    CompanyProfile {
        company: company.to_string(),
        total_hires: records.iter().map(|r| r.hires()).sum(),
        visit_count: years.len(),
        years: years.iter().rev().map(|y| y.to_string()).collect(),
        max_salary: max_salary.unwrap_or(0.0),
        min_cgpa: min_cgpa.unwrap_or(0.0),
    }
}

/// One profile per company, alphabetical.
pub fn company_profiles(records: &[PlacementRecord]) -> Vec<CompanyProfile> {
    let mut groups: BTreeMap<&str, Vec<&PlacementRecord>> = BTreeMap::new();
    for record in sorted_by_id(records) {
        groups.entry(record.company_name.as_str()).or_default().push(record);
    }

    groups
        .iter()
        .map(|(company, group)| profile(company, group))
        .collect()
}

pub fn company_profile(records: &[PlacementRecord], company: &str) -> Option<CompanyProfile> {
    let group: Vec<&PlacementRecord> = sorted_by_id(records)
        .into_iter()
        .filter(|r| r.company_name == company)
        .collect();
    if group.is_empty() {
        return None;
    }
    Some(profile(company, &group))
}

/// Visit history for one company, newest year first.
pub fn company_detail(records: &[PlacementRecord], company: &str) -> Option<CompanyDetail> {
    let mut visits: Vec<&PlacementRecord> = records
        .iter()
        .filter(|r| r.company_name == company)
        .collect();
    if visits.is_empty() {
        return None;
    }
    visits.sort_by(|a, b| b.academic_year.cmp(&a.academic_year));

    let history: Vec<CompanyVisit> = visits
        .into_iter()
        .map(|r| CompanyVisit {
            year: r.academic_year.clone(),
            salary_lpa: r.salary_lpa,
            hires: r.hires(),
            dept_breakdown: r.selections,
            criteria: r.criteria.clone(),
            category: r.category(),
        })
        .collect();

    Some(CompanyDetail {
        name: company.to_string(),
        total_hires: history.iter().map(|v| v.hires).sum(),
        visit_count: history.len(),
        history,
    })
}

/// Records whose gender total disagrees with male + female. Informational only.
pub fn gender_divergences(records: &[PlacementRecord]) -> Vec<GenderDivergence> {
    sorted_by_id(records)
        .into_iter()
        .filter(|r| !r.gender_distribution.is_consistent())
        .map(|r| GenderDivergence {
            id: r.id().to_string(),
            male: r.gender_distribution.male,
            female: r.gender_distribution.female,
            total: r.gender_distribution.total,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::record;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn median_handles_odd_and_even_lengths() {
        assert_eq!(median(&[9.0, 4.0, 20.0, 6.0, 9.0]), Some(9.0));
        assert_eq!(median(&[20.0, 4.0, 9.0, 6.0]), Some(7.5));
        assert_eq!(median(&[3.0]), Some(3.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn yearly_stats_aggregate_each_year() {
        let records = vec![
            record("2023-24", "Barclays", 4, 3, 3, 12.0, 7.0),
            record("2023-24", "Mastercard", 2, 2, 1, 9.0, 7.5),
            record("2023-24", "Infosys", 10, 5, 5, 4.0, 6.0),
            record("2022-23", "Barclays", 2, 2, 2, 11.0, 7.0),
        ];

        let stats = yearly_stats(&records, StatsOptions::default());
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].year, "2023-24");
        assert_eq!(stats[1].year, "2022-23");

        let latest = &stats[0];
        assert_eq!(latest.total_placed, 35);
        assert_eq!(latest.highest_package, 12.0);
        assert_close(latest.avg_package, 25.0 / 3.0);
        assert_eq!(latest.median_package, 9.0);
        assert_eq!(latest.dept_distribution, [16, 10, 9]);
        let top: Vec<(&str, u64)> = latest
            .top_companies
            .iter()
            .map(|t| (t.company.as_str(), t.total_selected))
            .collect();
        assert_eq!(top, vec![("Infosys", 20), ("Barclays", 10), ("Mastercard", 5)]);
    }

    #[test]
    fn yearly_median_matches_reference_lists() {
        let odd: Vec<PlacementRecord> = [4.0, 6.0, 9.0, 9.0, 20.0]
            .iter()
            .enumerate()
            .map(|(i, s)| record("2020-21", &format!("C{i}"), 1, 0, 0, *s, 6.0))
            .collect();
        let even: Vec<PlacementRecord> = [4.0, 6.0, 9.0, 20.0]
            .iter()
            .enumerate()
            .map(|(i, s)| record("2021-22", &format!("C{i}"), 1, 0, 0, *s, 6.0))
            .collect();

        let odd_stats = yearly_stats_for(&odd, "2020-21", StatsOptions::default()).unwrap();
        let even_stats = yearly_stats_for(&even, "2021-22", StatsOptions::default()).unwrap();
        assert_eq!(odd_stats.median_package, 9.0);
        assert_eq!(even_stats.median_package, 7.5);
    }

    #[test]
    fn top_companies_truncate_and_break_ties_by_name() {
        let records: Vec<PlacementRecord> = ["Zeta", "Alpha", "Mu", "Beta", "Kappa", "Gamma"]
            .iter()
            .map(|name| record("2023-24", name, 3, 0, 0, 8.0, 7.0))
            .collect();

        let stats = yearly_stats_for(&records, "2023-24", StatsOptions::default()).unwrap();
        let names: Vec<&str> = stats.top_companies.iter().map(|t| t.company.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Gamma", "Kappa", "Mu"]);
    }

    #[test]
    fn company_profile_rolls_up_visits() {
        let records = vec![
            record("2021-22", "Barclays", 5, 3, 2, 10.0, 7.0),
            record("2022-23", "Barclays", 6, 4, 2, 12.5, 6.5),
            record("2023-24", "Barclays", 5, 5, 1, 11.0, 7.5),
            record("2023-24", "Amazon", 1, 1, 0, 30.0, 8.0),
        ];

        let barclays = company_profile(&records, "Barclays").unwrap();
        assert_eq!(barclays.total_hires, 33);
        assert_eq!(barclays.visit_count, 3);
        assert_eq!(barclays.years, vec!["2023-24", "2022-23", "2021-22"]);
        assert_eq!(barclays.max_salary, 12.5);
        assert_eq!(barclays.min_cgpa, 6.5);

        let all = company_profiles(&records);
        let names: Vec<&str> = all.iter().map(|p| p.company.as_str()).collect();
        assert_eq!(names, vec!["Amazon", "Barclays"]);
        assert_eq!(company_profile(&records, "Unknown"), None);
    }

    #[test]
    fn company_detail_lists_newest_first() {
        let records = vec![
            record("2021-22", "Barclays", 5, 3, 2, 10.0, 7.0),
            record("2023-24", "Barclays", 5, 5, 1, 11.0, 7.5),
        ];

        let detail = company_detail(&records, "Barclays").unwrap();
        assert_eq!(detail.total_hires, 21);
        assert_eq!(detail.visit_count, 2);
        assert_eq!(detail.history[0].year, "2023-24");
        assert_eq!(detail.history[0].hires, 11);
        assert_eq!(detail.history[1].dept_breakdown.ce, 5);
        assert!(company_detail(&records, "Nobody").is_none());
    }

    #[test]
    fn unknown_year_is_none_and_empty_group_is_zero() {
        let records = vec![record("2021-22", "Barclays", 5, 3, 2, 10.0, 7.0)];
        assert!(yearly_stats_for(&records, "1999-00", StatsOptions::default()).is_none());

        let empty = summarize_year("2030-31", &[], StatsOptions::default());
        assert_eq!(empty.total_placed, 0);
        assert_eq!(empty.median_package, 0.0);
        assert_eq!(empty.avg_package, 0.0);
        assert!(empty.top_companies.is_empty());
    }

    #[test]
    fn defaulted_salaries_can_be_excluded() {
        use crate::builder::build_record;
        use crate::mapper::{map_row, ColumnLayout};

        let unparsed = map_row(
            &ColumnLayout::standard(),
            &["1", "Startup", "6", "2", "0", "0", "2", "0", "2", "TBD", "", "0"],
        )
        .unwrap();
        let records = vec![
            record("2023-24", "Barclays", 4, 3, 3, 12.0, 7.0),
            build_record("2023-24", unparsed).unwrap(),
        ];

        let included = yearly_stats_for(&records, "2023-24", StatsOptions::default()).unwrap();
        assert_eq!(included.avg_package, 6.0);

        let options = StatsOptions {
            exclude_defaulted_salaries: true,
        };
        let excluded = yearly_stats_for(&records, "2023-24", options).unwrap();
        assert_eq!(excluded.avg_package, 12.0);
        assert_eq!(excluded.median_package, 12.0);
        // Hires still count; only the salary is in doubt.
        assert_eq!(excluded.total_placed, 12);
    }

    #[test]
    fn recomputing_is_stable_regardless_of_input_order() {
        let mut records = vec![
            record("2023-24", "Barclays", 4, 3, 3, 12.0, 7.0),
            record("2023-24", "Amazon", 4, 3, 3, 30.0, 8.0),
            record("2022-23", "Barclays", 2, 2, 2, 11.0, 7.0),
        ];
        let first = yearly_stats(&records, StatsOptions::default());
        records.reverse();
        let second = yearly_stats(&records, StatsOptions::default());
        assert_eq!(first, second);
        assert_eq!(company_profiles(&records), company_profiles(&records));
    }

    #[test]
    fn reports_gender_divergence() {
        use crate::builder::build_record;
        use crate::mapper::{map_row, ColumnLayout};

        let mismatched = map_row(
            &ColumnLayout::standard(),
            &["1", "Wipro", "6", "1", "1", "1", "2", "2", "3", "3.5", "", "10.5"],
        )
        .unwrap();
        let records = vec![
            record("2023-24", "Barclays", 4, 3, 3, 12.0, 7.0),
            build_record("2023-24", mismatched).unwrap(),
        ];

        let divergent = gender_divergences(&records);
        assert_eq!(divergent.len(), 1);
        assert_eq!(divergent[0].id, "2023-24_Wipro");
        assert_eq!(divergent[0].total, 3);
    }
}
