use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

mod analytics;
mod builder;
mod classify;
mod coerce;
mod config;
mod db;
mod error;
mod extract;
mod load;
mod logging;
mod mapper;
mod models;
mod report;
mod seed;
mod source;
mod stats;
mod store;

use crate::analytics::{AnalyticsService, CompanyDirectory};
use crate::config::Config;
use crate::db::PgRecordStore;
use crate::load::{LoadEngine, LoadMode, RunReport};
use crate::stats::StatsOptions;
use crate::store::{InMemoryStore, RecordStore};

#[derive(Parser)]
#[command(name = "placement-stats")]
#[command(about = "Placement report ingestion and statistics", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load placement reports (CSV or PDF) from a directory
    ///
    /// A reseed clears the collection before inserting, so readers can briefly see an
    /// empty or partly loaded collection.
    Ingest {
        dir: PathBuf,
        #[arg(long, default_value = source::DEFAULT_SOURCE_PATTERN)]
        pattern: String,
        #[arg(long, value_enum, default_value_t = LoadMode::Reseed)]
        mode: LoadMode,
        /// Extract and count without touching Postgres
        #[arg(long)]
        dry_run: bool,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reseed the collection from formatted JSON record files
    Seed {
        dir: PathBuf,
        #[arg(long, default_value = seed::DEFAULT_SEED_PATTERN)]
        pattern: String,
        #[arg(long)]
        json: bool,
    },
    /// Yearly placement statistics, newest year first
    Stats {
        #[arg(long)]
        year: Option<String>,
        /// Leave defaulted salaries out of highest, average and median
        #[arg(long)]
        exclude_defaulted: bool,
        #[arg(long)]
        json: bool,
    },
    /// Company profiles, alphabetical
    Companies {
        /// Only list distinct company names
        #[arg(long, conflicts_with = "name")]
        names: bool,
        /// Profile of a single company
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Visit history for one company, newest year first
    Company {
        name: String,
        /// Print the stored records instead of the history view
        #[arg(long)]
        raw: bool,
        #[arg(long)]
        json: bool,
    },
    /// Find company names mentioned in free text
    Match { text: String },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "placement-report.md")]
        out: PathBuf,
        #[arg(long)]
        exclude_defaulted: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_json);
    let config = Config::from_env()?;

    match cli.command {
        Commands::Ingest {
            dir,
            pattern,
            mode,
            dry_run: true,
            json,
        } => {
            let files = source::discover_sources(&dir, &pattern)?;
            let engine = LoadEngine::new(Arc::new(InMemoryStore::new()));
            let report = engine.run(&files, mode).await?;
            print_run_report(&report, json)?;
        }
        command => {
            let pool = db::connect(&config).await?;
            let store = Arc::new(PgRecordStore::new(pool.clone(), config.store_timeout));
            run_against_store(command, &pool, store).await?;
        }
    }

    Ok(())
}

async fn run_against_store(
    command: Commands,
    pool: &sqlx::PgPool,
    store: Arc<PgRecordStore>,
) -> anyhow::Result<()> {
    let directory = Arc::new(CompanyDirectory::new());

    match command {
        Commands::InitDb => {
            db::init_db(pool).await?;
            println!("Schema ready.");
        }
        Commands::Ingest {
            dir,
            pattern,
            mode,
            json,
            ..
        } => {
            let files = source::discover_sources(&dir, &pattern)?;
            if files.is_empty() {
                println!("No files matching '{pattern}' in {}.", dir.display());
                return Ok(());
            }
            let report = load(store, directory, &files, mode).await?;
            print_run_report(&report, json)?;
        }
        Commands::Seed { dir, pattern, json } => {
            let files = source::discover_sources(&dir, &pattern)?;
            if files.is_empty() {
                println!("No seed files matching '{pattern}' in {}.", dir.display());
                return Ok(());
            }
            let report = load(store, directory, &files, LoadMode::Reseed).await?;
            print_run_report(&report, json)?;
        }
        Commands::Stats {
            year,
            exclude_defaulted,
            json,
        } => {
            let service = AnalyticsService::new(store, directory).with_options(StatsOptions {
                exclude_defaulted_salaries: exclude_defaulted,
            });
            let stats = match year {
                Some(year) => match service.yearly_stats_for(&year).await? {
                    Some(stats) => vec![stats],
                    None => {
                        println!("No placement records for {year}.");
                        return Ok(());
                    }
                },
                None => service.yearly_stats().await?,
            };
            if json {
                print_json(&stats)?;
            } else if stats.is_empty() {
                println!("No placement records loaded.");
            } else {
                for year in &stats {
                    println!(
                        "{}: {} placed, highest {:.2} LPA, avg {:.2}, median {:.2}, CE/IT/E&TC {:?}",
                        year.year,
                        year.total_placed,
                        year.highest_package,
                        year.avg_package,
                        year.median_package,
                        year.dept_distribution
                    );
                }
            }
        }
        Commands::Companies { names: true, .. } => {
            let names = AnalyticsService::new(store, directory).company_names().await?;
            println!("{}", names.join("\n"));
        }
        Commands::Companies {
            name: Some(name),
            json,
            ..
        } => {
            let service = AnalyticsService::new(store, directory);
            let Some(profile) = service.company_profile(&name).await? else {
                println!("No placement records for {name}.");
                return Ok(());
            };
            if json {
                print_json(&profile)?;
            } else {
                println!(
                    "{}: {} hires over {} visits ({}), max {:.2} LPA, min CGPA {:.2}",
                    profile.company,
                    profile.total_hires,
                    profile.visit_count,
                    profile.years.join(", "),
                    profile.max_salary,
                    profile.min_cgpa
                );
            }
        }
        Commands::Companies { json, .. } => {
            let profiles = AnalyticsService::new(store, directory)
                .company_profiles()
                .await?;
            if json {
                print_json(&profiles)?;
            } else {
                for profile in &profiles {
                    println!(
                        "- {}: {} hires over {} visits, max {:.2} LPA",
                        profile.company, profile.total_hires, profile.visit_count, profile.max_salary
                    );
                }
            }
        }
        Commands::Company {
            name, raw: true, ..
        } => {
            let records = AnalyticsService::new(store, directory)
                .company_records(&name)
                .await?;
            print_json(&records)?;
        }
        Commands::Company { name, json, .. } => {
            let service = AnalyticsService::new(store, directory);
            let Some(detail) = service.company_detail(&name).await? else {
                println!("No placement records for {name}.");
                return Ok(());
            };
            if json {
                print_json(&detail)?;
            } else {
                println!(
                    "{}: {} hires over {} visits",
                    detail.name, detail.total_hires, detail.visit_count
                );
                for visit in &detail.history {
                    println!(
                        "- {} {} LPA ({}), {} hires, min CGPA {:.2}",
                        visit.year,
                        visit.salary_lpa,
                        visit.category.label(),
                        visit.hires,
                        visit.criteria.min_cgpa
                    );
                }
            }
        }
        Commands::Match { text } => {
            let found = AnalyticsService::new(store, directory)
                .match_companies(&text)
                .await?;
            if found.is_empty() {
                println!("No known companies mentioned.");
            } else {
                println!("{}", found.join("\n"));
            }
        }
        Commands::Report {
            out,
            exclude_defaulted,
        } => {
            let service = AnalyticsService::new(store, directory).with_options(StatsOptions {
                exclude_defaulted_salaries: exclude_defaulted,
            });
            let report = report::build_report(
                chrono::Utc::now(),
                &service.yearly_stats().await?,
                &service.company_profiles().await?,
                &service.gender_divergences().await?,
            );
            write_report(&out, &report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn load<S: RecordStore>(
    store: Arc<S>,
    directory: Arc<CompanyDirectory>,
    files: &[PathBuf],
    mode: LoadMode,
) -> anyhow::Result<RunReport> {
    LoadEngine::new(store)
        .with_directory(directory)
        .run(files, mode)
        .await
        .context("load aborted")
}

fn print_run_report(report: &RunReport, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(report)
    } else {
        print!("{}", report::render_run_report(report));
        Ok(())
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_report(out: &Path, report: &str) -> anyhow::Result<()> {
    std::fs::write(out, report).with_context(|| format!("failed to write {}", out.display()))
}
