//! `tablegen` builds the static timezone tables shipped with the clock
//! firmware: a pooled location table from a ranked dataset, or a
//! city-name table covering the whole zone database.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};

use tztable_rs::{
    epoch_year, names, BucketKey, LocationRecord, LocationSet, ProfileProvider, RuleResolver,
    Snapshot, SnapshotOptions, TzTableError, TzdbProvider,
};

mod dataset;
mod emit;

#[derive(Debug)]
enum TablegenError {
    Io(io::Error),
    Json(serde_json::Error),
    Table(TzTableError),
    EmptyDataset(PathBuf),
}

impl From<io::Error> for TablegenError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for TablegenError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<TzTableError> for TablegenError {
    fn from(value: TzTableError) -> Self {
        Self::Table(value)
    }
}

#[derive(Debug, Parser)]
#[command(name = "tablegen", about = "Generate static timezone tables")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a pooled location table from a ranked location dataset
    Locations(LocationsArgs),
    /// Generate a city-name table covering the zone database
    Zones(ZonesArgs),
}

#[derive(Debug, Args)]
struct LocationsArgs {
    /// Location dataset, a JSON array of location records
    #[arg(long)]
    dataset: PathBuf,
    /// Ranked code list, a JSON array of codes; defaults to the dataset in
    /// descending traffic order
    #[arg(long)]
    ranking: Option<PathBuf>,
    /// Target year; defaults to the current UTC year
    #[arg(long)]
    year: Option<i32>,
    /// Number of ranked codes seeding each standard-offset group
    #[arg(long, default_value_t = 10)]
    top: usize,
    /// Maximum number of codes per bucket
    #[arg(long = "max-bucket", default_value_t = 3)]
    max_bucket: usize,
    /// Resolve every zone in the database instead of the dataset's zones
    #[arg(long)]
    all_zones: bool,
    /// Identifier prefix for the emitted C arrays
    #[arg(long, default_value = "location")]
    prefix: String,
    /// Output C source path
    #[arg(long)]
    out: PathBuf,
    /// Directory for a JSON dump of the allocated buckets, for diffing
    #[arg(long)]
    debug_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ZonesArgs {
    /// Target year; defaults to the current UTC year
    #[arg(long)]
    year: Option<i32>,
    /// Output C source path
    #[arg(long)]
    out: PathBuf,
}

fn main() -> Result<(), TablegenError> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Locations(args) => run_locations(args),
        Command::Zones(args) => run_zones(args),
    }
}

fn run_locations(args: LocationsArgs) -> Result<(), TablegenError> {
    let year = args.year.unwrap_or_else(current_utc_year);

    let records = dataset::load_locations(&args.dataset)?;
    if records.is_empty() {
        return Err(TablegenError::EmptyDataset(args.dataset));
    }
    let locations = LocationSet::from_records(records);

    let ranked = match &args.ranking {
        Some(path) => {
            let codes = dataset::load_ranking(path)?;
            if codes.is_empty() {
                return Err(TablegenError::EmptyDataset(path.clone()));
            }
            ranked_from_codes(&codes, &locations)
        }
        None => ranked_by_traffic(&locations),
    };

    let resolver = RuleResolver::new(TzdbProvider::default());
    let universe = if args.all_zones {
        resolver.provider().available_identifiers()
    } else {
        locations.timezone_ids()
    };
    log::info!("resolving {} zones for {year}", universe.len());

    let options = SnapshotOptions {
        year,
        per_bucket_cap: args.max_bucket,
        per_group_seed_size: args.top,
    };
    let snapshot = Snapshot::build(&resolver, &universe, &ranked, &locations, &options);
    let pools = snapshot.pooled(&locations);

    emit::write_location_tables(&args.out, &args.prefix, year, &pools)?;
    if let Some(debug_dir) = &args.debug_dir {
        emit::write_debug_snapshot(debug_dir, &snapshot)?;
    }

    println!(
        "Generated {} with {} tz buckets and {} pooled locations.",
        args.out.display(),
        snapshot.buckets.len(),
        pools.codes.len()
    );
    Ok(())
}

fn run_zones(args: ZonesArgs) -> Result<(), TablegenError> {
    let year = args.year.unwrap_or_else(current_utc_year);

    let resolver = RuleResolver::new(TzdbProvider::default());
    let identifiers = resolver.provider().available_identifiers();
    log::info!("resolving {} zones for {year}", identifiers.len());

    let mut buckets: BTreeMap<BucketKey, BTreeSet<String>> = BTreeMap::new();
    for identifier in &identifiers {
        let Some(label) = names::zone_city_label(identifier) else {
            continue;
        };
        let key = BucketKey::from(resolver.resolve(identifier, year));
        let _ = buckets.entry(key).or_default().insert(label);
    }

    emit::write_zone_tables(&args.out, year, &buckets)?;
    println!(
        "Generated {} with {} unique offset/DST rule combinations.",
        args.out.display(),
        buckets.len()
    );
    Ok(())
}

/// Maps ranked codes back onto dataset records, preserving rank order.
fn ranked_from_codes(codes: &[String], locations: &LocationSet) -> Vec<LocationRecord> {
    codes
        .iter()
        .filter_map(|code| {
            let record = locations.get(code).cloned();
            if record.is_none() {
                log::warn!("ranked code {code} is missing from the dataset");
            }
            record
        })
        .collect()
}

/// The whole dataset in descending traffic order.
fn ranked_by_traffic(locations: &LocationSet) -> Vec<LocationRecord> {
    let mut ranked: Vec<LocationRecord> = locations.iter().cloned().collect();
    ranked.sort_by_key(|record| core::cmp::Reverse(record.traffic_rank));
    ranked
}

fn current_utc_year() -> i32 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    epoch_year(now.as_secs() as i64)
}
