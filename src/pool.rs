//! Pooled table layout.
//!
//! Downstream storage keeps every bucket's codes in one flat pool and
//! addresses them per bucket with an offset/count pair. The allocator's
//! bucket order therefore fixes the pool layout; this module performs the
//! flattening and carries the parallel display-name pool.

use crate::allocate::LocationSet;
use crate::bucket::{Bucket, BucketKey};

/// One bucket's slice of the pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PoolEntry {
    pub key: BucketKey,
    pub pool_offset: usize,
    pub pool_count: usize,
}

/// The flattened snapshot: parallel code/name pools plus per-bucket
/// offset/count entries, in bucket presentation order.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct PoolLayout {
    pub codes: Vec<String>,
    pub names: Vec<String>,
    pub entries: Vec<PoolEntry>,
}

impl PoolLayout {
    pub fn from_buckets(buckets: &[Bucket], locations: &LocationSet) -> Self {
        let mut layout = Self::default();
        for bucket in buckets {
            let pool_offset = layout.codes.len();
            for code in &bucket.codes {
                let name = locations
                    .get(code)
                    .map(|record| clean_display_name(&record.display_name))
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| code.clone());
                layout.codes.push(code.clone());
                layout.names.push(name);
            }
            layout.entries.push(PoolEntry {
                key: bucket.key,
                pool_offset,
                pool_count: bucket.codes.len(),
            });
        }
        layout
    }
}

// Display names come from airport-style datasets where nearly every entry
// ends in "... International Airport" or "... Airport"; the suffix wastes
// table bytes on a small screen.
fn clean_display_name(name: &str) -> String {
    let trimmed = name
        .strip_suffix(" International Airport")
        .or_else(|| name.strip_suffix(" Airport"))
        .unwrap_or(name);
    trimmed.trim_end().to_owned()
}
