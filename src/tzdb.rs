//! TZif-backed zone data access.
//!
//! The resolver samples zones at UTC instants only, so this module keeps
//! the instant-to-record half of a TZif lookup: binary search over the v2
//! transition times, falling back to the POSIX footer string for instants
//! past the final compiled transition.
//!
//! Data comes from the platform zoneinfo directory when one is present,
//! otherwise from the tzdata bundled with `jiff-tzdb`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;

use combine::Parser;

use tzif::{
    self,
    data::{
        posix::{PosixTzString, TransitionDate, TransitionDay, TimeZoneVariantInfo},
        time::Seconds,
        tzif::{DataBlock, LocalTimeTypeRecord, TzifData, TzifHeader},
    },
};

use crate::names::is_selectable_identifier;
use crate::utils;
use crate::{TzTableError, TzTableResult};

pub(crate) const ZONEINFO_DIR: &str = "/usr/share/zoneinfo/";

/// An instantaneous local time record: the zone's total UTC offset and
/// whether a daylight variant is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTimeRecord {
    /// The time zone offset in seconds.
    pub offset: i64,
    /// Whether the record is a Daylight Savings Time variant.
    pub is_dst: bool,
}

impl LocalTimeRecord {
    // POSIX variant offsets are inverted relative to the tzif convention.
    fn from_standard_time(info: &TimeZoneVariantInfo) -> Self {
        Self {
            offset: -info.offset.0,
            is_dst: false,
        }
    }

    fn from_daylight_savings_time(info: &TimeZoneVariantInfo) -> Self {
        Self {
            offset: -info.offset.0,
            is_dst: true,
        }
    }
}

impl From<LocalTimeTypeRecord> for LocalTimeRecord {
    fn from(value: LocalTimeTypeRecord) -> Self {
        Self {
            offset: value.utoff.0,
            is_dst: value.is_dst,
        }
    }
}

/// A parsed TZif file.
///
/// This is a thin shell over the `tzif` crate's parse output that adds the
/// epoch-seconds lookup the resolver needs. See [RFC 8536][rfc8536] for the
/// underlying layout.
///
/// [rfc8536]: https://datatracker.ietf.org/doc/html/rfc8536
#[derive(Debug, Clone)]
pub struct Tzif {
    pub header1: TzifHeader,
    pub data_block1: DataBlock,
    pub header2: Option<TzifHeader>,
    pub data_block2: Option<DataBlock>,
    pub footer: Option<PosixTzString>,
}

impl From<TzifData> for Tzif {
    fn from(value: TzifData) -> Self {
        let TzifData {
            header1,
            data_block1,
            header2,
            data_block2,
            footer,
        } = value;

        Self {
            header1,
            data_block1,
            header2,
            data_block2,
            footer,
        }
    }
}

impl Tzif {
    pub fn from_bytes(data: &[u8]) -> TzTableResult<Self> {
        let Ok((parse_result, _)) = tzif::parse::tzif::tzif().parse(data) else {
            return Err(TzTableError::ZoneData("illformed TZif data".into()));
        };
        Ok(Self::from(parse_result))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> TzTableResult<Self> {
        tzif::parse_tzif_file(path.as_ref())
            .map(Into::into)
            .map_err(|e| TzTableError::ZoneData(e.to_string()))
    }

    pub fn posix_tz_string(&self) -> Option<&PosixTzString> {
        self.footer.as_ref()
    }

    fn get_data_block2(&self) -> TzTableResult<&DataBlock> {
        self.data_block2
            .as_ref()
            .ok_or(TzTableError::ZoneData("only TZif v2+ is supported".into()))
    }

    /// Resolves the local time record in effect at a UTC instant.
    ///
    /// An instant landing exactly on a transition resolves to the record
    /// the transition switches into.
    pub fn get(&self, epoch_seconds: &Seconds) -> TzTableResult<LocalTimeRecord> {
        let db = self.get_data_block2()?;

        match db.transition_times.binary_search(epoch_seconds) {
            Ok(idx) => Ok(get_local_record(db, idx).into()),
            Err(idx) if idx == 0 => Ok(get_local_record(db, idx).into()),
            Err(idx) => {
                if db.transition_times.len() <= idx {
                    // Past the final compiled transition; resolve with the
                    // POSIX tz string.
                    return posix_record_for_epoch_seconds(
                        self.posix_tz_string().ok_or(TzTableError::ZoneData(
                            "no POSIX tz string to resolve with".into(),
                        ))?,
                        epoch_seconds.0,
                    );
                }
                Ok(get_local_record(db, idx - 1).into())
            }
        }
    }

    /// The failure-tolerant sampling query used by the resolver.
    pub fn local_record(&self, epoch_seconds: i64) -> Option<LocalTimeRecord> {
        self.get(&Seconds(epoch_seconds)).ok()
    }
}

#[inline]
fn get_local_record(db: &DataBlock, idx: usize) -> LocalTimeTypeRecord {
    // NOTE: Transition type can be empty. If no transition_type exists,
    // then use 0 as the default index of local_time_type_records.
    db.local_time_type_records[db.transition_types.get(idx).copied().unwrap_or(0)]
}

/// The month, week of month, and day of week value built into the POSIX tz string.
///
/// For more information, see the [POSIX tz string docs](https://sourceware.org/glibc/manual/2.40/html_node/Proleptic-TZ.html)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Mwd(u16, u16, u16);

impl Mwd {
    fn from_seconds(seconds: i64) -> Self {
        let month = u16::from(utils::epoch_seconds_to_month_in_year(seconds)) + 1;
        let day_of_month = utils::epoch_seconds_to_day_of_month(seconds);
        let week_of_month = day_of_month / 7 + 1;
        let day_of_week = utils::epoch_seconds_to_day_of_week(seconds);
        Self(month, week_of_month, day_of_week)
    }
}

/// Where a local instant falls relative to a transition rule date:
/// `Less` is before the boundary, anything else is at or past it.
fn rule_position(local_seconds: i64, date: &TransitionDate) -> core::cmp::Ordering {
    let day_cmp = match date.day {
        TransitionDay::Mwd(month, week, day) => {
            Mwd::from_seconds(local_seconds).cmp(&Mwd(month, week, day))
        }
        // Julian day counts are one based without the leap day ...
        TransitionDay::NoLeap(day) => {
            (utils::epoch_seconds_to_day_in_year(local_seconds) as u16 + 1).cmp(&day)
        }
        // ... and zero based with it.
        TransitionDay::WithLeap(day) => {
            (utils::epoch_seconds_to_day_in_year(local_seconds) as u16).cmp(&day)
        }
    };
    day_cmp.then_with(|| utils::seconds_in_day(local_seconds).cmp(&date.time.0))
}

/// Resolve the footer of a TZif file for a UTC instant.
///
/// The rule dates compare in local wall time: the entry boundary in the
/// standard variant, the exit boundary in the daylight variant. A rule
/// whose entry date falls after its exit date wraps the new year
/// (southern hemisphere).
fn posix_record_for_epoch_seconds(
    posix_tz_string: &PosixTzString,
    seconds: i64,
) -> TzTableResult<LocalTimeRecord> {
    let std = &posix_tz_string.std_info;
    let Some(dst) = &posix_tz_string.dst_info else {
        // Regardless of the time, there is one variant and we can return it.
        return Ok(LocalTimeRecord::from_standard_time(std));
    };

    let wraps = match (&dst.start_date.day, &dst.end_date.day) {
        (TransitionDay::Mwd(sm, sw, sd), TransitionDay::Mwd(em, ew, ed)) => {
            Mwd(*sm, *sw, *sd) > Mwd(*em, *ew, *ed)
        }
        (TransitionDay::NoLeap(start), TransitionDay::NoLeap(end))
        | (TransitionDay::WithLeap(start), TransitionDay::WithLeap(end)) => start > end,
        // The assumption here is that mismatched day forms on a POSIX
        // string is an illformed string.
        _ => {
            return Err(TzTableError::ZoneData(
                "mismatched POSIX transition day forms".into(),
            ))
        }
    };

    let past_start =
        rule_position(seconds - std.offset.0, &dst.start_date) != core::cmp::Ordering::Less;
    let before_end = rule_position(seconds - dst.variant_info.offset.0, &dst.end_date)
        == core::cmp::Ordering::Less;

    let is_dst = if wraps {
        past_start || before_end
    } else {
        past_start && before_end
    };

    if is_dst {
        Ok(LocalTimeRecord::from_daylight_savings_time(
            &dst.variant_info,
        ))
    } else {
        Ok(LocalTimeRecord::from_standard_time(std))
    }
}

/// A caching provider for parsed TZif data.
///
/// Reads the platform zoneinfo directory first and falls back to the
/// bundled `jiff-tzdb` data, so a build host without tzdata installed
/// still produces tables.
#[derive(Debug, Default)]
pub struct TzdbProvider {
    cache: RefCell<BTreeMap<String, Tzif>>,
}

impl TzdbProvider {
    pub fn get(&self, identifier: &str) -> TzTableResult<Tzif> {
        if let Some(tzif) = self.cache.borrow().get(identifier) {
            return Ok(tzif.clone());
        }
        let tzif = Self::load(identifier)?;
        Ok(self
            .cache
            .borrow_mut()
            .entry(identifier.into())
            .or_insert(tzif)
            .clone())
    }

    fn load(identifier: &str) -> TzTableResult<Tzif> {
        let path = Path::new(ZONEINFO_DIR).join(identifier);
        if path.is_file() {
            return Tzif::from_path(&path);
        }
        let Some((_canonical, data)) = jiff_tzdb::get(identifier) else {
            return Err(TzTableError::ZoneData(format!(
                "unknown time zone identifier {identifier}"
            )));
        };
        Tzif::from_bytes(data)
    }

    /// Enumerates the location-zone universe, filtered and sorted.
    pub fn available_identifiers(&self) -> Vec<String> {
        let mut identifiers = Vec::new();
        let dir = Path::new(ZONEINFO_DIR);
        if dir.is_dir() && walk_zoneinfo_dir(dir, "", &mut identifiers).is_err() {
            identifiers.clear();
        }
        if identifiers.is_empty() {
            identifiers = jiff_tzdb::available().map(str::to_owned).collect();
        }
        identifiers.retain(|id| is_selectable_identifier(id));
        identifiers.sort();
        identifiers.dedup();
        identifiers
    }
}

fn walk_zoneinfo_dir(dir: &Path, prefix: &str, out: &mut Vec<String>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let identifier = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        if entry.file_type()?.is_dir() {
            walk_zoneinfo_dir(&entry.path(), &identifier, out)?;
        } else {
            out.push(identifier);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tzif::data::posix::DstTransitionInfo;

    fn us_eastern_posix() -> PosixTzString {
        // EST5EDT,M3.2.0,M11.1.0
        PosixTzString {
            std_info: TimeZoneVariantInfo {
                name: "EST".into(),
                offset: Seconds(5 * 3600),
            },
            dst_info: Some(DstTransitionInfo {
                variant_info: TimeZoneVariantInfo {
                    name: "EDT".into(),
                    offset: Seconds(4 * 3600),
                },
                start_date: TransitionDate {
                    day: TransitionDay::Mwd(3, 2, 0),
                    time: Seconds(2 * 3600),
                },
                end_date: TransitionDate {
                    day: TransitionDay::Mwd(11, 1, 0),
                    time: Seconds(2 * 3600),
                },
            }),
        }
    }

    #[test]
    fn posix_us_eastern_transitions() {
        let posix = us_eastern_posix();

        // One second before the 2024 spring-forward instant.
        let record = posix_record_for_epoch_seconds(&posix, 1_710_053_999).unwrap();
        assert_eq!(record.offset, -5 * 3600);
        assert!(!record.is_dst);

        // The spring-forward instant itself.
        let record = posix_record_for_epoch_seconds(&posix, 1_710_054_000).unwrap();
        assert_eq!(record.offset, -4 * 3600);
        assert!(record.is_dst);

        // Midsummer.
        let record = posix_record_for_epoch_seconds(&posix, 1_719_835_200).unwrap();
        assert!(record.is_dst);

        // One second before the fall-back instant, then the instant itself.
        let record = posix_record_for_epoch_seconds(&posix, 1_730_613_599).unwrap();
        assert!(record.is_dst);
        let record = posix_record_for_epoch_seconds(&posix, 1_730_613_600).unwrap();
        assert_eq!(record.offset, -5 * 3600);
        assert!(!record.is_dst);
    }

    #[test]
    fn posix_southern_hemisphere_wraps() {
        // AEST-10AEDT,M10.1.0,M4.1.0/3
        let posix = PosixTzString {
            std_info: TimeZoneVariantInfo {
                name: "AEST".into(),
                offset: Seconds(-10 * 3600),
            },
            dst_info: Some(DstTransitionInfo {
                variant_info: TimeZoneVariantInfo {
                    name: "AEDT".into(),
                    offset: Seconds(-11 * 3600),
                },
                start_date: TransitionDate {
                    day: TransitionDay::Mwd(10, 1, 0),
                    time: Seconds(2 * 3600),
                },
                end_date: TransitionDate {
                    day: TransitionDay::Mwd(4, 1, 0),
                    time: Seconds(3 * 3600),
                },
            }),
        };

        // Mid-January is daylight time in Sydney.
        let record = posix_record_for_epoch_seconds(&posix, 1_705_276_800).unwrap();
        assert!(record.is_dst);
        assert_eq!(record.offset, 11 * 3600);

        // Mid-June is standard time.
        let record = posix_record_for_epoch_seconds(&posix, 1_718_409_600).unwrap();
        assert!(!record.is_dst);
        assert_eq!(record.offset, 10 * 3600);
    }

    #[test]
    fn no_dst_posix_string() {
        let posix = PosixTzString {
            std_info: TimeZoneVariantInfo {
                name: "JST".into(),
                offset: Seconds(-9 * 3600),
            },
            dst_info: None,
        };
        let record = posix_record_for_epoch_seconds(&posix, 1_710_054_000).unwrap();
        assert_eq!(record.offset, 9 * 3600);
        assert!(!record.is_dst);
    }
}
