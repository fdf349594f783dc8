//! `tztable_rs` compiles IANA timezone data into compact, static
//! offset/DST tables for clients that cannot perform live timezone
//! computation, such as a watch face redrawing from a frozen table.
//!
//! The pipeline is a single-threaded batch computation:
//!
//! 1. [`RuleResolver`] profiles every zone in the universe for one target
//!    year by hourly sampling.
//! 2. [`BucketSet`] collapses zones with identical profiles into buckets
//!    and groups them by standard offset.
//! 3. [`Allocator`] fills each bucket with a bounded, ranked list of
//!    location codes, with classification/traffic fallback for groups the
//!    ranking never reaches.
//! 4. [`PoolLayout`] flattens the buckets into the pooled layout the
//!    emitted tables use.
//!
//! The resulting tables are only valid for the generated year; rebuilding
//! yearly is the intended mode of operation.
//!
//! ```no_run
//! use tztable_rs::{RuleResolver, Snapshot, SnapshotOptions, LocationSet, TzdbProvider};
//!
//! let resolver = RuleResolver::new(TzdbProvider::default());
//! let locations = LocationSet::default();
//! let universe = vec!["America/New_York".to_owned(), "Europe/Paris".to_owned()];
//! let snapshot = Snapshot::build(
//!     &resolver,
//!     &universe,
//!     &[],
//!     &locations,
//!     &SnapshotOptions::for_year(2025),
//! );
//! assert!(!snapshot.buckets.is_empty());
//! ```

use std::io;

pub mod allocate;
pub mod bucket;
pub mod names;
pub mod pool;
pub mod resolver;
pub mod tzdb;

pub(crate) mod utils;

pub use allocate::{Allocator, Classification, LocationRecord, LocationSet};
pub use bucket::{Bucket, BucketKey, BucketSet};
pub use pool::{PoolEntry, PoolLayout};
pub use resolver::{ProfileProvider, RuleResolver, TzYearProfile};
pub use tzdb::TzdbProvider;

/// The `tztable` result type.
pub type TzTableResult<T> = Result<T, TzTableError>;

/// The general error type for table compilation.
///
/// The core pipeline degrades per-item failures internally; these errors
/// only surface from the I/O shell around it.
#[derive(Debug)]
pub enum TzTableError {
    Io(io::Error),
    ZoneData(String),
}

impl From<io::Error> for TzTableError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl core::fmt::Display for TzTableError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::ZoneData(msg) => write!(f, "zone data error: {msg}"),
        }
    }
}

impl std::error::Error for TzTableError {}

/// Returns the calendar year containing the given epoch seconds.
///
/// Exposed so callers defaulting to "the current year" can derive it from
/// the system clock without further date dependencies.
pub fn epoch_year(epoch_seconds: i64) -> i32 {
    utils::epoch_seconds_to_epoch_year(epoch_seconds)
}

/// Build parameters for one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotOptions {
    /// The calendar year the tables are valid for.
    pub year: i32,
    /// Final code capacity of every bucket.
    pub per_bucket_cap: usize,
    /// Ranked codes seeding each standard-offset group.
    pub per_group_seed_size: usize,
}

impl SnapshotOptions {
    /// Options with the stock capacities used by the shipped tables.
    pub fn for_year(year: i32) -> Self {
        Self {
            year,
            per_bucket_cap: 3,
            per_group_seed_size: 10,
        }
    }
}

/// One complete, allocated table build.
#[derive(Debug, serde::Serialize)]
pub struct Snapshot {
    pub year: i32,
    /// Buckets in presentation order, codes populated.
    pub buckets: Vec<Bucket>,
}

impl Snapshot {
    /// Runs the full pipeline over a zone universe and a ranked location
    /// sequence.
    pub fn build<P: ProfileProvider>(
        provider: &P,
        universe: &[String],
        ranked: &[LocationRecord],
        locations: &LocationSet,
        options: &SnapshotOptions,
    ) -> Self {
        let mut buckets = BucketSet::build(
            provider,
            universe.iter().map(String::as_str),
            options.year,
        );
        Allocator::new(provider, locations, options.year).allocate(
            &mut buckets,
            ranked,
            options.per_bucket_cap,
            options.per_group_seed_size,
        );
        Self {
            year: options.year,
            buckets: buckets.into_ordered(),
        }
    }

    /// Flattens the snapshot into the pooled layout.
    pub fn pooled(&self, locations: &LocationSet) -> PoolLayout {
        PoolLayout::from_buckets(&self.buckets, locations)
    }
}
