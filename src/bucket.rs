//! Profile buckets.
//!
//! Zones that behave identically for the target year collapse into a
//! single bucket keyed by their shared profile. The bucket set also keeps
//! a side table from standard offset to the bucket keys sharing it, which
//! is what the allocator walks when it needs per-offset fallback coverage.

use indexmap::IndexMap;

use crate::resolver::{ProfileProvider, TzYearProfile};

/// The identity of a bucket: the full yearly profile 4-tuple.
///
/// The derived ordering doubles as the presentation order of the emitted
/// table, ascending by standard offset, daylight offset, then entry
/// timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct BucketKey {
    pub std_offset_seconds: i32,
    pub dst_offset_seconds: i32,
    pub dst_start_utc: i64,
    pub dst_end_utc: i64,
}

impl From<TzYearProfile> for BucketKey {
    fn from(profile: TzYearProfile) -> Self {
        Self {
            std_offset_seconds: profile.std_offset_seconds,
            dst_offset_seconds: profile.dst_offset_seconds,
            dst_start_utc: profile.dst_start_utc,
            dst_end_utc: profile.dst_end_utc,
        }
    }
}

/// One emitted table row: a distinct yearly profile and the location codes
/// allocated to it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Bucket {
    pub key: BucketKey,
    /// Ordered location codes; bounded by the allocation cap.
    pub codes: Vec<String>,
}

impl Bucket {
    fn new(key: BucketKey) -> Self {
        Self {
            key,
            codes: Vec::new(),
        }
    }
}

/// The bucket universe for one build run.
#[derive(Debug, Default)]
pub struct BucketSet {
    // First occurrence of a key creates the bucket; repeats are no-ops.
    buckets: IndexMap<BucketKey, Bucket>,
    // Standard offset -> bucket keys, in first-seen order.
    groups: IndexMap<i32, Vec<BucketKey>>,
}

impl BucketSet {
    /// Builds the bucket set for a universe of zone identifiers.
    ///
    /// Codes are empty at this stage; the allocator fills them in.
    pub fn build<'a, P, I>(provider: &P, identifiers: I, year: i32) -> Self
    where
        P: ProfileProvider,
        I: IntoIterator<Item = &'a str>,
    {
        let mut set = Self::default();
        for identifier in identifiers {
            set.insert(BucketKey::from(provider.resolve(identifier, year)));
        }
        set
    }

    fn insert(&mut self, key: BucketKey) {
        if self.buckets.contains_key(&key) {
            return;
        }
        let _ = self.buckets.insert(key, Bucket::new(key));
        self.groups
            .entry(key.std_offset_seconds)
            .or_default()
            .push(key);
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn get(&self, key: &BucketKey) -> Option<&Bucket> {
        self.buckets.get(key)
    }

    pub fn get_mut(&mut self, key: &BucketKey) -> Option<&mut Bucket> {
        self.buckets.get_mut(key)
    }

    /// The bucket keys sharing a standard offset, in first-seen order.
    pub fn group_keys(&self, std_offset_seconds: i32) -> &[BucketKey] {
        self.groups
            .get(&std_offset_seconds)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Iterates the standard-offset groups in first-seen order.
    pub fn groups(&self) -> impl Iterator<Item = (i32, &[BucketKey])> {
        self.groups
            .iter()
            .map(|(offset, keys)| (*offset, keys.as_slice()))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Bucket> {
        self.buckets.values_mut()
    }

    /// Consumes the set, producing buckets in presentation order.
    pub fn into_ordered(self) -> Vec<Bucket> {
        let mut buckets: Vec<Bucket> = self.buckets.into_values().collect();
        buckets.sort_by_key(|bucket| bucket.key);
        buckets
    }
}
