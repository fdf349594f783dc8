//! C source emission.
//!
//! The emitted files mirror the layout the clock firmware compiles in:
//! offsets as float hours, transition timestamps as `int64_t` epoch
//! seconds, and either pooled name indices (location tables) or static
//! per-bucket name arrays (zone tables).

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tztable_rs::{BucketKey, PoolLayout, Snapshot};

pub(crate) fn write_location_tables(
    path: &Path,
    prefix: &str,
    year: i32,
    layout: &PoolLayout,
) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    render_location_tables(&mut out, prefix, year, layout)?;
    out.flush()
}

pub(crate) fn write_zone_tables(
    path: &Path,
    year: i32,
    buckets: &BTreeMap<BucketKey, BTreeSet<String>>,
) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    render_zone_tables(&mut out, year, buckets)?;
    out.flush()
}

/// Writes a pretty JSON dump of the allocated buckets, so table changes
/// between tzdb or dataset updates show up in a plain diff.
pub(crate) fn write_debug_snapshot(dir: &Path, snapshot: &Snapshot) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(dir.join("snapshot.json"), json)
}

fn render_location_tables(
    out: &mut impl Write,
    prefix: &str,
    year: i32,
    layout: &PoolLayout,
) -> io::Result<()> {
    writeln!(out, "// Auto-generated by tablegen")?;
    writeln!(out, "// Year-specific DST data for {year}")?;
    writeln!(out)?;
    writeln!(out, "#include <stdint.h>")?;
    writeln!(out)?;

    writeln!(out, "static const char* {prefix}_code_pool[] = {{")?;
    for code in &layout.codes {
        writeln!(out, "    \"{}\",", c_str(code))?;
    }
    writeln!(out, "}};")?;
    writeln!(out)?;

    writeln!(out, "static const char* {prefix}_name_pool[] = {{")?;
    for name in &layout.names {
        writeln!(out, "    \"{}\",", c_str(name))?;
    }
    writeln!(out, "}};")?;
    writeln!(out)?;

    writeln!(out, "typedef struct {{")?;
    writeln!(out, "    float std_offset_hours;")?;
    writeln!(out, "    float dst_offset_hours;")?;
    writeln!(out, "    int64_t dst_start_utc;")?;
    writeln!(out, "    int64_t dst_end_utc;")?;
    writeln!(out, "    int name_offset;")?;
    writeln!(out, "    int name_count;")?;
    writeln!(out, "}} TzInfo;")?;
    writeln!(out)?;

    writeln!(out, "static const TzInfo {prefix}_tz_list[] = {{")?;
    for entry in &layout.entries {
        writeln!(
            out,
            "    {{ {:.2}f, {:.2}f, {}LL, {}LL, {}, {} }},",
            offset_hours(entry.key.std_offset_seconds),
            offset_hours(entry.key.dst_offset_seconds),
            entry.key.dst_start_utc,
            entry.key.dst_end_utc,
            entry.pool_offset,
            entry.pool_count
        )?;
    }
    writeln!(out, "}};")?;
    writeln!(out)?;

    let upper = prefix.to_uppercase();
    writeln!(
        out,
        "#define {upper}_TZ_LIST_COUNT (sizeof({prefix}_tz_list)/sizeof({prefix}_tz_list[0]))"
    )?;
    writeln!(
        out,
        "#define {upper}_CODE_POOL_COUNT (sizeof({prefix}_code_pool)/sizeof({prefix}_code_pool[0]))"
    )?;
    writeln!(
        out,
        "#define {upper}_NAME_POOL_COUNT (sizeof({prefix}_name_pool)/sizeof({prefix}_name_pool[0]))"
    )
}

fn render_zone_tables(
    out: &mut impl Write,
    year: i32,
    buckets: &BTreeMap<BucketKey, BTreeSet<String>>,
) -> io::Result<()> {
    writeln!(out, "// Auto-generated by tablegen from TZif data")?;
    writeln!(
        out,
        "// Includes Standard & DST offsets and UTC transition timestamps for {year}."
    )?;
    writeln!(out, "// WARNING: DST rules accurate only for the generated year.")?;
    writeln!(out)?;
    writeln!(out, "#include <stdint.h>")?;
    writeln!(out)?;

    writeln!(out, "// Holds a single city name string")?;
    writeln!(out, "typedef struct {{")?;
    writeln!(out, "    const char* name;")?;
    writeln!(out, "}} TzCityName;")?;
    writeln!(out)?;

    writeln!(out, "// Holds offset info and points to an array of names")?;
    writeln!(out, "typedef struct {{")?;
    writeln!(out, "    float std_offset_hours;")?;
    writeln!(out, "    float dst_offset_hours;")?;
    writeln!(out, "    int64_t dst_start_utc;")?;
    writeln!(out, "    int64_t dst_end_utc;")?;
    writeln!(out, "    const TzCityName* names;")?;
    writeln!(out, "    int name_count;")?;
    writeln!(out, "}} TzInfo;")?;
    writeln!(out)?;

    for (idx, labels) in buckets.values().enumerate() {
        writeln!(out, "static const TzCityName tz_names_{idx}[] = {{")?;
        for label in labels {
            writeln!(out, "    {{ \"{}\" }},", c_str(label))?;
        }
        writeln!(out, "}};")?;
        writeln!(out)?;
    }

    writeln!(
        out,
        "// Main list mapping offsets/DST info to their respective name arrays"
    )?;
    writeln!(out, "static const TzInfo tz_list[] = {{")?;
    for (idx, (key, labels)) in buckets.iter().enumerate() {
        writeln!(
            out,
            "    {{ {:.2}f, {:.2}f, {}LL, {}LL, tz_names_{idx}, {} }},",
            offset_hours(key.std_offset_seconds),
            offset_hours(key.dst_offset_seconds),
            key.dst_start_utc,
            key.dst_end_utc,
            labels.len()
        )?;
    }
    writeln!(out, "}};")?;
    writeln!(out)?;
    writeln!(out, "#define TZ_LIST_COUNT {}", buckets.len())
}

fn offset_hours(seconds: i32) -> f64 {
    f64::from(seconds) / 3600.0
}

fn c_str(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
