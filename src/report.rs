use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::load::{FileStatus, RunReport};
use crate::models::{Branch, CompanyProfile, GenderDivergence, YearlyStats};

/// Companies listed in the markdown report, by total hires.
const REPORT_COMPANIES: usize = 10;

fn format_year_list(years: &[String]) -> String {
    if years.is_empty() {
        "-".to_string()
    } else {
        years.join(", ")
    }
}

pub fn build_report(
    generated_at: DateTime<Utc>,
    stats: &[YearlyStats],
    profiles: &[CompanyProfile],
    divergences: &[GenderDivergence],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Placement Statistics Report");
    let _ = writeln!(
        output,
        "Generated {} across {} academic years and {} companies",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        stats.len(),
        profiles.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Yearly Summary");

    if stats.is_empty() {
        let _ = writeln!(output, "No placement records loaded.");
    } else {
        let _ = writeln!(
            output,
            "| Year | Placed | Highest (LPA) | Average (LPA) | Median (LPA) | {} | {} | {} |",
            Branch::Ce.code(),
            Branch::It.code(),
            Branch::Entc.code()
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|");
        for year in stats {
            let [ce, it, entc] = year.dept_distribution;
            let _ = writeln!(
                output,
                "| {} | {} | {:.2} | {:.2} | {:.2} | {} | {} | {} |",
                year.year,
                year.total_placed,
                year.highest_package,
                year.avg_package,
                year.median_package,
                ce,
                it,
                entc
            );
        }
    }

    for year in stats {
        let _ = writeln!(output);
        let _ = writeln!(output, "### Top Recruiters {}", year.year);
        if year.top_companies.is_empty() {
            let _ = writeln!(output, "No selections recorded.");
            continue;
        }
        for (rank, company) in year.top_companies.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. {} ({} selected)",
                rank + 1,
                company.company,
                company.total_selected
            );
        }
    }

    let mut by_hires: Vec<&CompanyProfile> = profiles.iter().collect();
    by_hires.sort_by(|a, b| {
        b.total_hires
            .cmp(&a.total_hires)
            .then_with(|| a.company.cmp(&b.company))
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## Leading Companies");
    if by_hires.is_empty() {
        let _ = writeln!(output, "No companies recorded.");
    } else {
        for profile in by_hires.iter().take(REPORT_COMPANIES) {
            let _ = writeln!(
                output,
                "- {}: {} hires over {} visits ({}), max {:.2} LPA, min CGPA {:.2}",
                profile.company,
                profile.total_hires,
                profile.visit_count,
                format_year_list(&profile.years),
                profile.max_salary,
                profile.min_cgpa
            );
        }
    }

    if !divergences.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Gender Count Mismatches");
        for row in divergences {
            let _ = writeln!(
                output,
                "- {}: male {} + female {} != total {}",
                row.id, row.male, row.female, row.total
            );
        }
    }

    output
}

/// Plain-text summary of a load run, for terminals.
pub fn render_run_report(report: &RunReport) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "Loaded {} files ({} failed, {} skipped without a year).",
        report.files_processed, report.files_failed, report.files_skipped_no_year
    );
    if report.records_cleared > 0 {
        let _ = writeln!(output, "Cleared {} existing records.", report.records_cleared);
    }
    let _ = writeln!(
        output,
        "Rows seen {}, rejected {}, too short {}. Records extracted {}, inserted {}, failed {}.",
        report.rows_seen,
        report.rows_rejected,
        report.rows_short,
        report.records_extracted,
        report.records_inserted,
        report.records_failed
    );
    if let Some(stored) = report.records_stored {
        let _ = writeln!(output, "{stored} records in the store.");
    }
    if report.gender_mismatches > 0 {
        let _ = writeln!(
            output,
            "{} records have a gender total that differs from male + female.",
            report.gender_mismatches
        );
    }

    for file in &report.files {
        let status = match file.status {
            FileStatus::Loaded => "loaded",
            FileStatus::SkippedNoYear => "skipped (no year)",
            FileStatus::Failed => "failed",
        };
        let _ = write!(
            output,
            "- {} [{}] {}: {} inserted, {} failed",
            file.file,
            file.academic_year.as_deref().unwrap_or("-"),
            status,
            file.inserted,
            file.failed
        );
        match &file.error {
            Some(error) => {
                let _ = writeln!(output, " ({error})");
            }
            None => {
                let _ = writeln!(output);
            }
        }
    }

    if !report.quarantine.is_empty() {
        let _ = writeln!(output, "Quarantined rows:");
        for failure in &report.quarantine {
            let _ = writeln!(
                output,
                "- {} p{} t{} r{}: {}",
                failure.document,
                failure.location.page,
                failure.location.table,
                failure.location.row,
                failure.reason
            );
        }
    }

    output
}
