//! Display labels for zone identifiers.
//!
//! The zone-name table variant labels each bucket with city names derived
//! from the IANA identifiers themselves. Region-level identifiers and
//! legacy aliases make poor labels on a watch face, so identifiers and
//! labels both go through a selection filter before emission.

/// Labels that name a region or administrative zone rather than a city.
///
/// Matched case-insensitively against the derived label.
pub const GENERIC_ZONE_LABELS: &[&str] = &[
    "Samoa",
    "Hawaii",
    "Aleutian",
    "Alaska",
    "Pacific",
    "Arizona",
    "Yukon",
    "Mountain",
    "General",
    "Saskatchewan",
    "Central",
    "Knox IN",
    "EasterIsland",
    "Acre",
    "Jamaica",
    "Michigan",
    "Eastern",
    "East-Indiana",
    "Atlantic",
    "Continental",
    "Newfoundland",
    "East",
    "Bahia",
    "Noronha",
    "South Georgia",
    "Canary",
    "Faeroe",
    "Faroe",
    "Guernsey",
    "Isle of Man",
    "Jersey",
    "Madeira",
    "Jan Mayen",
    "West",
    "North",
    "South",
    "ACT",
    "NSW",
    "Tasmania",
    "Victoria",
    "Queensland",
    "Yap",
    "South Pole",
    "Kanton",
];

/// Whether an identifier names a real location zone.
///
/// Fixed-offset zones (`Etc/*`), bare abbreviations without a region
/// segment, and the `right/`/`posix/` leap-second variants are skipped
/// when enumerating the zone universe.
pub fn is_selectable_identifier(identifier: &str) -> bool {
    if !identifier.contains('/') || identifier.starts_with("Etc/") {
        return false;
    }
    let lower = identifier.to_ascii_lowercase();
    lower != "factory" && !lower.starts_with("right/") && !lower.starts_with("posix/")
}

/// Derives a city label from a zone identifier, or `None` when the
/// identifier does not yield a presentable label.
pub fn zone_city_label(identifier: &str) -> Option<String> {
    let segment = identifier.rsplit('/').next()?;
    let label = segment.replace('_', " ");
    if !label.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
        return None;
    }
    if GENERIC_ZONE_LABELS
        .iter()
        .any(|generic| generic.eq_ignore_ascii_case(&label))
    {
        return None;
    }
    Some(label)
}
