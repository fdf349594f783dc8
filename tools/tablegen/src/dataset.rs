//! Dataset loading.
//!
//! Both inputs are plain JSON: the location dataset is an array of
//! location records, the ranking an array of codes in priority order.

use std::fs;
use std::path::Path;

use tztable_rs::LocationRecord;

use crate::TablegenError;

pub(crate) fn load_locations(path: &Path) -> Result<Vec<LocationRecord>, TablegenError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub(crate) fn load_ranking(path: &Path) -> Result<Vec<String>, TablegenError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
