//! # capacity-report
//!
//! Offline capacity report. Reads sites, weather readings, ecological
//! indicators and an optional policy file from JSON and prints the dynamic
//! capacity of every site, computed by the same calculator the server uses.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, ValueHint};
use lib_ecogate::capacity::CapacityCalculator;
use lib_ecogate::configs::PolicyService;
use lib_ecogate::models::{DynamicCapacity, EcologicalIndicators, Site, SiteId, WeatherReading};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// CLI arguments for capacity-report.
#[derive(Parser)]
#[clap(
    name = "capacity-report",
    version = "1.0.0",
    author = "ckir",
    about = "Prints the dynamic capacity of each site from JSON fixtures.",
    long_about = "Evaluates every site in the sites file against its latest weather reading and \
                  ecological indicators, applying the sensitivity policies and overrides from the \
                  policy file (built-in defaults when absent)."
)]
pub struct Cli {
    /// JSON array of sites.
    #[clap(long, value_hint = ValueHint::FilePath)]
    pub sites: PathBuf,

    /// JSON array of weather readings. The newest reading per site is used.
    #[clap(long, value_hint = ValueHint::FilePath)]
    pub weather: Option<PathBuf>,

    /// JSON array of ecological indicator records. The newest per site is used.
    #[clap(long, value_hint = ValueHint::FilePath)]
    pub indicators: Option<PathBuf>,

    /// Policy file with sensitivity policies and capacity overrides.
    #[clap(long, value_hint = ValueHint::FilePath)]
    pub policies: Option<PathBuf>,

    /// Evaluation instant (RFC 3339). Defaults to now.
    #[clap(long)]
    pub at: Option<DateTime<Utc>>,

    /// Emit JSON instead of a text table.
    #[clap(long, action = ArgAction::SetTrue)]
    pub json: bool,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

/// Keeps the newest record per site.
fn newest_by_site<T>(
    records: Vec<T>,
    site_of: impl Fn(&T) -> &SiteId,
    time_of: impl Fn(&T) -> DateTime<Utc>,
) -> HashMap<SiteId, T> {
    let mut newest: HashMap<SiteId, T> = HashMap::new();
    for record in records {
        let replace = newest
            .get(site_of(&record))
            .is_none_or(|current| time_of(&record) >= time_of(current));
        if replace {
            newest.insert(site_of(&record).clone(), record);
        }
    }
    newest
}

pub fn build_report(cli: &Cli) -> Result<BTreeMap<SiteId, DynamicCapacity>> {
    let sites: Vec<Site> = read_json(&cli.sites)?;
    let weather = match &cli.weather {
        Some(path) => newest_by_site(read_json::<Vec<WeatherReading>>(path)?, |r| &r.site_id, |r| r.recorded_at),
        None => HashMap::new(),
    };
    let indicators = match &cli.indicators {
        Some(path) => newest_by_site(
            read_json::<Vec<EcologicalIndicators>>(path)?,
            |r| &r.site_id,
            |r| r.recorded_at,
        ),
        None => HashMap::new(),
    };
    let policies = match &cli.policies {
        Some(path) => PolicyService::load(path),
        None => PolicyService::in_memory(),
    };

    let calculator = CapacityCalculator::new(Arc::new(policies));
    let now = cli.at.unwrap_or_else(Utc::now);
    Ok(calculator.evaluate_batch(&sites, &weather, &indicators, now))
}

fn render_table(report: &BTreeMap<SiteId, DynamicCapacity>) -> String {
    let mut out = format!(
        "{:<20} {:>6} {:>9} {:>10} {:>8} {:>9}  {}\n",
        "SITE", "MAX", "OCCUPIED", "MULTIPLIER", "ADJUSTED", "AVAILABLE", "MESSAGE"
    );
    for (site_id, capacity) in report {
        out.push_str(&format!(
            "{:<20} {:>6} {:>9} {:>10.3} {:>8} {:>9}  {}\n",
            site_id,
            capacity.max_capacity,
            capacity.current_occupancy,
            capacity.combined_multiplier,
            capacity.adjusted_capacity,
            capacity.available_spots,
            capacity.message
        ));
    }
    out
}

fn main() {
    let cli = Cli::parse();

    let report = match build_report(&cli) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: Failed to build capacity report.");
            eprintln!("Details: {:#}", e);
            std::process::exit(1);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: Failed to encode report: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        print!("{}", render_table(&report));
    }
}
