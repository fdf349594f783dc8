//! Location allocation.
//!
//! Buckets start empty; this module decides which location codes each one
//! carries. Ranked locations seed their standard-offset group first and
//! then land in the bucket matching their exact profile, so a group fans
//! out across its daylight variants. Groups no ranked location reaches are
//! covered by a classification/traffic fallback so every standard offset
//! keeps at least one selectable location wherever the data allows it.

use indexmap::IndexMap;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::bucket::{BucketKey, BucketSet};
use crate::resolver::ProfileProvider;

/// Service classification of a location, largest first.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Major,
    Regional,
    Minor,
    #[default]
    Unknown,
}

/// One allocatable location.
///
/// Records come straight out of the location dataset; missing metadata
/// deserializes to the defaults (`unknown`, unranked, no scheduled
/// service) rather than failing the load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Stable short identifier, e.g. an IATA code.
    pub code: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub timezone_id: String,
    /// Relative traffic volume; `0` means no data.
    #[serde(default)]
    pub traffic_rank: u32,
    #[serde(default)]
    pub classification: Classification,
    /// Whether the location sees scheduled service. Required for the
    /// classified fallback tiers.
    #[serde(default)]
    pub scheduled_service: bool,
}

/// The read-only location universe, indexed by code.
///
/// Insertion order is preserved and the first record wins on duplicate
/// codes, so iteration stays deterministic for a given dataset.
#[derive(Debug, Default)]
pub struct LocationSet {
    records: IndexMap<String, LocationRecord>,
}

impl LocationSet {
    pub fn from_records(records: impl IntoIterator<Item = LocationRecord>) -> Self {
        let mut set = Self::default();
        for record in records {
            set.records.entry(record.code.clone()).or_insert(record);
        }
        set
    }

    pub fn get(&self, code: &str) -> Option<&LocationRecord> {
        self.records.get(code)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocationRecord> {
        self.records.values()
    }

    /// Distinct, sorted zone identifiers across the set.
    pub fn timezone_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .records
            .values()
            .filter(|record| !record.timezone_id.is_empty())
            .map(|record| record.timezone_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Fills bucket code lists from a ranked location sequence.
pub struct Allocator<'a, P> {
    provider: &'a P,
    locations: &'a LocationSet,
    year: i32,
}

impl<'a, P: ProfileProvider> Allocator<'a, P> {
    pub fn new(provider: &'a P, locations: &'a LocationSet, year: i32) -> Self {
        Self {
            provider,
            locations,
            year,
        }
    }

    /// Populates `buckets` from the ranked sequence.
    ///
    /// `per_group_seed_size` bounds how many ranked codes seed each
    /// standard-offset group; `per_bucket_cap` bounds the final code count
    /// of every bucket.
    pub fn allocate(
        &self,
        buckets: &mut BucketSet,
        ranked: &[LocationRecord],
        per_bucket_cap: usize,
        per_group_seed_size: usize,
    ) {
        let seeded = self.seed_groups(ranked, per_group_seed_size);
        self.place_seeded(buckets, &seeded);
        self.cover_empty_groups(buckets, &seeded, per_bucket_cap);

        // Final invariant: no bucket exceeds the cap, however it was filled.
        for bucket in buckets.values_mut() {
            bucket.codes.truncate(per_bucket_cap);
        }
    }

    /// Collects ranked codes per standard-offset group, deduplicated by
    /// code and truncated to the seed size in rank order.
    fn seed_groups(
        &self,
        ranked: &[LocationRecord],
        per_group_seed_size: usize,
    ) -> IndexMap<i32, Vec<String>> {
        let mut seeded: IndexMap<i32, Vec<String>> = IndexMap::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for record in ranked {
            if record.timezone_id.is_empty() || !seen.insert(record.code.as_str()) {
                continue;
            }
            let profile = self.provider.resolve(&record.timezone_id, self.year);
            let codes = seeded.entry(profile.std_offset_seconds).or_default();
            if codes.len() < per_group_seed_size {
                codes.push(record.code.clone());
            }
        }
        seeded
    }

    /// Places every seeded code into the bucket matching its own resolved
    /// profile. A code whose profile has no bucket in the universe is
    /// dropped, not an error.
    fn place_seeded(&self, buckets: &mut BucketSet, seeded: &IndexMap<i32, Vec<String>>) {
        for codes in seeded.values() {
            for code in codes {
                let Some(record) = self.locations.get(code) else {
                    continue;
                };
                let key = BucketKey::from(self.provider.resolve(&record.timezone_id, self.year));
                let Some(bucket) = buckets.get_mut(&key) else {
                    log::debug!("seeded code {code} resolves outside the bucket universe");
                    continue;
                };
                if !bucket.codes.iter().any(|existing| existing == code) {
                    bucket.codes.push(code.clone());
                }
            }
        }
    }

    /// Injects fallback coverage into groups no ranked code reached.
    ///
    /// The fallback list goes into the first still-empty bucket of the
    /// group only; sibling empty buckets stay empty.
    fn cover_empty_groups(
        &self,
        buckets: &mut BucketSet,
        seeded: &IndexMap<i32, Vec<String>>,
        per_bucket_cap: usize,
    ) {
        let group_offsets: Vec<i32> = buckets.groups().map(|(offset, _)| offset).collect();
        for offset in group_offsets {
            let seeded_codes = seeded.get(&offset).map(Vec::as_slice).unwrap_or_default();
            if !seeded_codes.is_empty() {
                continue;
            }

            let candidates = self.fallback_codes(offset, seeded_codes, per_bucket_cap);
            if candidates.is_empty() {
                log::warn!("no fallback coverage for standard offset {offset}s");
                continue;
            }

            let keys: Vec<BucketKey> = buckets.group_keys(offset).to_vec();
            for key in keys {
                let Some(bucket) = buckets.get_mut(&key) else {
                    continue;
                };
                if bucket.codes.is_empty() {
                    bucket.codes.extend(candidates.iter().cloned());
                    break;
                }
            }
        }
    }

    /// The classification/traffic fallback hierarchy for one standard
    /// offset: up to the cap from majors with scheduled service, then up
    /// to two regionals, then one minor; if everything above came up
    /// empty, the single highest-traffic location regardless of
    /// classification.
    fn fallback_codes(&self, std_offset: i32, exclude: &[String], cap: usize) -> Vec<String> {
        let mut segment: Vec<&LocationRecord> = self
            .locations
            .iter()
            .filter(|record| !record.timezone_id.is_empty())
            .filter(|record| {
                self.provider
                    .resolve(&record.timezone_id, self.year)
                    .std_offset_seconds
                    == std_offset
            })
            .collect();
        if segment.is_empty() {
            return Vec::new();
        }
        segment.sort_by_key(|record| core::cmp::Reverse(record.traffic_rank));

        let tier = |classification: Classification| {
            segment
                .iter()
                .filter(move |record| {
                    record.classification == classification && record.scheduled_service
                })
                .map(|record| record.code.clone())
        };

        let mut result: Vec<String> = tier(Classification::Major).take(cap).collect();
        let remaining = cap.saturating_sub(result.len());
        if remaining > 0 {
            result.extend(tier(Classification::Regional).take(remaining.min(2)));
        }
        let remaining = cap.saturating_sub(result.len());
        if remaining > 0 {
            result.extend(tier(Classification::Minor).take(1));
        }
        if result.is_empty() {
            result.push(segment[0].code.clone());
        }

        result.retain(|code| !exclude.contains(code));
        result.truncate(cap);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::TzYearProfile;
    use std::collections::BTreeMap;

    struct StaticProfiles(BTreeMap<&'static str, TzYearProfile>);

    impl ProfileProvider for StaticProfiles {
        fn resolve(&self, identifier: &str, _year: i32) -> TzYearProfile {
            self.0.get(identifier).copied().unwrap_or_default()
        }
    }

    fn fixed(std: i32, dst: i32, start: i64, end: i64) -> TzYearProfile {
        TzYearProfile {
            std_offset_seconds: std,
            dst_offset_seconds: dst,
            dst_start_utc: start,
            dst_end_utc: end,
        }
    }

    fn location(code: &str, tz: &str) -> LocationRecord {
        LocationRecord {
            code: code.into(),
            display_name: format!("{code} Field"),
            timezone_id: tz.into(),
            traffic_rank: 0,
            classification: Classification::Unknown,
            scheduled_service: false,
        }
    }

    fn classified(
        code: &str,
        tz: &str,
        traffic: u32,
        classification: Classification,
        scheduled: bool,
    ) -> LocationRecord {
        LocationRecord {
            traffic_rank: traffic,
            classification,
            scheduled_service: scheduled,
            ..location(code, tz)
        }
    }

    /// Two buckets at one standard offset, one observing daylight time.
    fn split_group_provider() -> StaticProfiles {
        StaticProfiles(BTreeMap::from([
            ("T/Dst", fixed(-18000, -14400, 100, 200)),
            ("T/Std", fixed(-18000, -18000, 0, 0)),
        ]))
    }

    #[test]
    fn seeded_codes_split_by_dst_membership() {
        let provider = split_group_provider();
        let mut records = Vec::new();
        // Twelve ranked candidates alternating across the two variants.
        for i in 0..12 {
            let tz = if i % 2 == 0 { "T/Dst" } else { "T/Std" };
            records.push(location(&format!("C{i:02}"), tz));
        }
        let locations = LocationSet::from_records(records.clone());
        let mut buckets = BucketSet::build(&provider, ["T/Dst", "T/Std"], 2024);

        Allocator::new(&provider, &locations, 2024).allocate(&mut buckets, &records, 3, 10);

        let ordered = buckets.into_ordered();
        assert_eq!(ordered.len(), 2);
        for bucket in &ordered {
            assert_eq!(bucket.codes.len(), 3);
        }
        // The daylight bucket holds the daylight-zone codes in rank order.
        let dst_bucket = ordered
            .iter()
            .find(|b| b.key.dst_start_utc != 0)
            .expect("daylight bucket");
        assert_eq!(dst_bucket.codes, ["C00", "C02", "C04"]);
        let std_bucket = ordered
            .iter()
            .find(|b| b.key.dst_start_utc == 0)
            .expect("standard bucket");
        assert_eq!(std_bucket.codes, ["C01", "C03", "C05"]);
    }

    #[test]
    fn seed_size_bounds_each_group() {
        let provider = StaticProfiles(BTreeMap::from([("T/Solo", fixed(3600, 3600, 0, 0))]));
        let records: Vec<LocationRecord> = (0..8)
            .map(|i| location(&format!("S{i}"), "T/Solo"))
            .collect();
        let locations = LocationSet::from_records(records.clone());
        let mut buckets = BucketSet::build(&provider, ["T/Solo"], 2024);

        Allocator::new(&provider, &locations, 2024).allocate(&mut buckets, &records, 10, 4);

        let ordered = buckets.into_ordered();
        assert_eq!(ordered[0].codes.len(), 4);
    }

    #[test]
    fn fallback_covers_unseeded_group() {
        let provider = StaticProfiles(BTreeMap::from([
            ("T/Popular", fixed(0, 0, 0, 0)),
            ("T/Remote", fixed(45900, 45900, 0, 0)),
        ]));
        let locations = LocationSet::from_records([
            classified("AAA", "T/Popular", 900, Classification::Major, true),
            classified("RRR", "T/Remote", 4, Classification::Regional, true),
            classified("SSS", "T/Remote", 9, Classification::Major, true),
        ]);
        // Only the popular zone is ranked.
        let ranked = [classified("AAA", "T/Popular", 900, Classification::Major, true)];
        let mut buckets = BucketSet::build(&provider, ["T/Popular", "T/Remote"], 2024);

        Allocator::new(&provider, &locations, 2024).allocate(&mut buckets, &ranked, 3, 10);

        let ordered = buckets.into_ordered();
        let remote = ordered
            .iter()
            .find(|b| b.key.std_offset_seconds == 45900)
            .expect("remote bucket");
        // Major first, then the regional backfill, traffic order.
        assert_eq!(remote.codes, ["SSS", "RRR"]);
    }

    #[test]
    fn fallback_tiers_respect_caps() {
        let provider = StaticProfiles(BTreeMap::from([("T/Tier", fixed(7200, 7200, 0, 0))]));
        let locations = LocationSet::from_records([
            classified("M1", "T/Tier", 100, Classification::Major, true),
            classified("M2", "T/Tier", 90, Classification::Major, true),
            classified("M3", "T/Tier", 80, Classification::Major, true),
            classified("M4", "T/Tier", 70, Classification::Major, true),
            classified("R1", "T/Tier", 60, Classification::Regional, true),
            classified("N1", "T/Tier", 50, Classification::Minor, true),
        ]);
        let mut buckets = BucketSet::build(&provider, ["T/Tier"], 2024);

        Allocator::new(&provider, &locations, 2024).allocate(&mut buckets, &[], 3, 10);

        let ordered = buckets.into_ordered();
        // Majors alone fill the cap; no regional or minor makes it in.
        assert_eq!(ordered[0].codes, ["M1", "M2", "M3"]);
    }

    #[test]
    fn fallback_mixes_tiers_when_majors_are_scarce() {
        let provider = StaticProfiles(BTreeMap::from([("T/Mix", fixed(1800, 1800, 0, 0))]));
        let locations = LocationSet::from_records([
            classified("M1", "T/Mix", 100, Classification::Major, true),
            classified("R1", "T/Mix", 90, Classification::Regional, true),
            classified("R2", "T/Mix", 80, Classification::Regional, true),
            classified("R3", "T/Mix", 70, Classification::Regional, true),
            classified("N1", "T/Mix", 60, Classification::Minor, true),
        ]);
        let mut buckets = BucketSet::build(&provider, ["T/Mix"], 2024);

        Allocator::new(&provider, &locations, 2024).allocate(&mut buckets, &[], 4, 10);

        let ordered = buckets.into_ordered();
        // One major, two regionals, one minor.
        assert_eq!(ordered[0].codes, ["M1", "R1", "R2", "N1"]);
    }

    #[test]
    fn unclassified_last_resort() {
        let provider = StaticProfiles(BTreeMap::from([("T/Lonely", fixed(41400, 41400, 0, 0))]));
        let locations = LocationSet::from_records([
            classified("ONE", "T/Lonely", 2, Classification::Unknown, false),
            classified("TWO", "T/Lonely", 7, Classification::Unknown, false),
        ]);
        let mut buckets = BucketSet::build(&provider, ["T/Lonely"], 2024);

        Allocator::new(&provider, &locations, 2024).allocate(&mut buckets, &[], 3, 10);

        let ordered = buckets.into_ordered();
        // Single highest-traffic location regardless of classification.
        assert_eq!(ordered[0].codes, ["TWO"]);
    }

    #[test]
    fn fallback_fills_first_empty_bucket_only() {
        let provider = StaticProfiles(BTreeMap::from([
            ("T/VarA", fixed(12600, 16200, 100, 200)),
            ("T/VarB", fixed(12600, 12600, 0, 0)),
        ]));
        let locations = LocationSet::from_records([classified(
            "FBK",
            "T/VarB",
            50,
            Classification::Major,
            true,
        )]);
        let mut buckets = BucketSet::build(&provider, ["T/VarA", "T/VarB"], 2024);

        Allocator::new(&provider, &locations, 2024).allocate(&mut buckets, &[], 3, 10);

        // Injection hits the first key of the group in first-seen order,
        // which is the daylight variant here, regardless of the fallback
        // code's own zone.
        let filled = buckets.group_keys(12600)[0];
        let sibling = buckets.group_keys(12600)[1];
        assert_eq!(buckets.get(&filled).unwrap().codes, ["FBK"]);
        assert!(buckets.get(&sibling).unwrap().codes.is_empty());
    }

    #[test]
    fn group_with_no_locations_stays_empty() {
        let provider = StaticProfiles(BTreeMap::from([("T/Empty", fixed(-34200, -34200, 0, 0))]));
        let locations = LocationSet::from_records([]);
        let mut buckets = BucketSet::build(&provider, ["T/Empty"], 2024);

        Allocator::new(&provider, &locations, 2024).allocate(&mut buckets, &[], 3, 10);

        let ordered = buckets.into_ordered();
        assert!(ordered[0].codes.is_empty());
    }

    #[test]
    fn duplicate_ranked_codes_seed_once() {
        let provider = StaticProfiles(BTreeMap::from([("T/Dup", fixed(0, 0, 0, 0))]));
        let record = location("DUP", "T/Dup");
        let locations = LocationSet::from_records([record.clone()]);
        let ranked = [record.clone(), record.clone(), record];
        let mut buckets = BucketSet::build(&provider, ["T/Dup"], 2024);

        Allocator::new(&provider, &locations, 2024).allocate(&mut buckets, &ranked, 3, 10);

        let ordered = buckets.into_ordered();
        assert_eq!(ordered[0].codes, ["DUP"]);
    }
}
