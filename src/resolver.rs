//! Yearly timezone rule extraction.
//!
//! A [`TzYearProfile`] is the entire offset behavior of one zone for one
//! calendar year: its standard offset, its daylight offset, and the UTC
//! instants at which it enters and leaves daylight time. Zones are profiled
//! by brute force: the resolver samples the zone once per hour across the
//! whole year and watches the daylight flag toggle. This is plenty fast for
//! a batch build over a few hundred zones, and it needs no knowledge of how
//! the underlying rules are encoded.

use std::cell::RefCell;

use hashbrown::HashMap;

use crate::tzdb::TzdbProvider;
use crate::utils::{self, SECS_PER_HOUR};

/// Hours sampled per scan: a full leap year plus a small spillover buffer,
/// so a transition landing on the year boundary is observed from both sides.
const SAMPLED_HOURS: i64 = 366 * 24 + 3;

/// Offsets closer than this are the same local time variant; a zone whose
/// standard and daylight offsets differ by less is treated as observing no
/// daylight time at all for the year.
const OFFSET_DIFF_THRESHOLD: i64 = 60;

/// The offset/DST behavior of one zone for one calendar year.
///
/// A zone that does not observe daylight time for the year carries equal
/// offsets and zeroed transition timestamps.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TzYearProfile {
    /// The UTC offset in effect outside daylight time, in seconds.
    pub std_offset_seconds: i32,
    /// The UTC offset in effect during daylight time, in seconds.
    pub dst_offset_seconds: i32,
    /// UTC timestamp of the last in-year entry into daylight time, `0` when
    /// not applicable.
    pub dst_start_utc: i64,
    /// UTC timestamp of the last in-year exit from daylight time, `0` when
    /// not applicable.
    pub dst_end_utc: i64,
}

impl TzYearProfile {
    /// Whether the zone observes daylight time in the profiled year.
    pub fn observes_dst(&self) -> bool {
        self.std_offset_seconds != self.dst_offset_seconds
    }
}

/// The profile source seam for the bucket and allocation layers.
///
/// Implemented by [`RuleResolver`] over real zone data and by fixed maps in
/// tests.
pub trait ProfileProvider {
    /// Resolves the yearly profile for a zone identifier.
    ///
    /// Never fails: an identifier that cannot be resolved yields the zero
    /// profile.
    fn resolve(&self, identifier: &str, year: i32) -> TzYearProfile;
}

/// The memoizing profile resolver.
///
/// Owns the per-run memo table; dropping the resolver drops every cached
/// profile, so each build run starts from a clean slate.
#[derive(Debug, Default)]
pub struct RuleResolver {
    provider: TzdbProvider,
    cache: RefCell<HashMap<(String, i32), TzYearProfile>>,
}

impl RuleResolver {
    pub fn new(provider: TzdbProvider) -> Self {
        Self {
            provider,
            cache: RefCell::default(),
        }
    }

    /// The underlying zone data provider.
    pub fn provider(&self) -> &TzdbProvider {
        &self.provider
    }

    fn scan_year(&self, identifier: &str, year: i32) -> TzYearProfile {
        let year_start = utils::epoch_seconds_for_year(year);

        let Ok(tzif) = self.provider.get(identifier) else {
            log::debug!("no zone data for {identifier}, using the zero profile");
            return TzYearProfile::default();
        };

        // Sample one hour before the year opens so a transition landing
        // exactly on the boundary is still seen as a toggle. If the
        // boundary instant cannot be resolved, retry at noon on January 1
        // before giving up on the zone.
        let mut cursor = year_start - SECS_PER_HOUR;
        let initial = tzif
            .local_record(cursor)
            .or_else(|| tzif.local_record(year_start + 12 * SECS_PER_HOUR));
        let Some(initial) = initial else {
            log::debug!("{identifier} has no resolvable instants in {year}");
            return TzYearProfile::default();
        };

        let initial_offset = initial.offset;
        let mut prev_dst = initial.is_dst;
        let mut std_offset: Option<i64> = None;
        let mut dst_offset: Option<i64> = None;
        let mut start_ts = 0;
        let mut end_ts = 0;

        for _ in 0..SAMPLED_HOURS {
            cursor += SECS_PER_HOUR;
            let Some(record) = tzif.local_record(cursor) else {
                continue;
            };

            // Track the latest offset seen on either side of the flag.
            if record.is_dst {
                dst_offset = Some(record.offset);
            } else {
                std_offset = Some(record.offset);
            }

            // A flag toggle is a transition; keep the last one of each
            // polarity that lands inside the target year.
            if record.is_dst != prev_dst && utils::epoch_seconds_to_epoch_year(cursor) == year {
                if record.is_dst {
                    start_ts = cursor;
                } else {
                    end_ts = cursor;
                }
            }
            prev_dst = record.is_dst;
        }

        let std_offset = std_offset.unwrap_or(initial_offset);
        let dst_offset = dst_offset.unwrap_or(std_offset);

        if (std_offset - dst_offset).abs() < OFFSET_DIFF_THRESHOLD {
            return TzYearProfile {
                std_offset_seconds: std_offset as i32,
                dst_offset_seconds: std_offset as i32,
                dst_start_utc: 0,
                dst_end_utc: 0,
            };
        }

        TzYearProfile {
            std_offset_seconds: std_offset as i32,
            dst_offset_seconds: dst_offset as i32,
            dst_start_utc: start_ts,
            dst_end_utc: end_ts,
        }
    }
}

impl ProfileProvider for RuleResolver {
    fn resolve(&self, identifier: &str, year: i32) -> TzYearProfile {
        let key = (identifier.to_owned(), year);
        if let Some(profile) = self.cache.borrow().get(&key) {
            return *profile;
        }
        let profile = self.scan_year(identifier, year);
        let _ = self.cache.borrow_mut().insert(key, profile);
        profile
    }
}
