//! Parsing helpers for the control protocol's text payloads (spec.md §6),
//! in the free-function-plus-inline-tests style the teacher uses in its own
//! `utils.rs`.

use std::collections::HashMap;

use hifitime::Epoch;

use crate::ephemeris::{EphemerisError, SatelliteSpec};

/// Parses a TLE block: repeated `name` / `line1` / `line2` triples. Blank
/// lines between entries and surrounding whitespace on each line are
/// tolerated; a trailing partial entry (fewer than 3 lines) is ignored.
pub fn parse_tle_block(block: &str) -> Result<Vec<SatelliteSpec>, EphemerisError> {
    let lines: Vec<&str> = block.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let mut specs = Vec::with_capacity(lines.len() / 3);
    for chunk in lines.chunks_exact(3) {
        specs.push(SatelliteSpec::parse(chunk[0], chunk[1], chunk[2])?);
    }
    Ok(specs)
}

/// Parses a frequency block: one `NAME: f1, f2, ...` line per satellite,
/// frequencies in Hz.
pub fn parse_frequency_block(block: &str) -> HashMap<String, Vec<u64>> {
    let mut out = HashMap::new();

    for line in block.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some((name, freqs)) = line.split_once(':') else {
            continue;
        };
        let values: Vec<u64> = freqs
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        out.insert(name.trim().to_string(), values);
    }

    out
}

/// Parses `"YYYY-MM-DD HH:MM:SS"` as a UTC instant.
pub fn parse_utc_datetime(s: &str) -> Option<Epoch> {
    let naive = chrono::NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S").ok()?;
    Some(Epoch::from_unix_seconds(naive.and_utc().timestamp() as f64))
}

/// Formats a UTC instant as RFC3339, for the wire (`getMeta`).
pub fn format_utc_rfc3339(t: Epoch) -> String {
    let (y, m, d, hh, mm, ss, _) = t.to_gregorian_utc();
    format!("{y:04}-{m:02}-{d:02}T{hh:02}:{mm:02}:{ss:02}Z")
}

#[cfg(test)]
mod test {
    use super::*;

    const ISS_L1: &str = "1 25544U 98067A   20194.88612269  .00000984  00000-0  25302-4 0  9990";
    const ISS_L2: &str = "2 25544  51.6452  21.4326 0001361  95.0891  23.5953 15.49531632239936";

    #[test]
    fn parses_a_single_tle() {
        let block = format!("ISS (ZARYA)\n{ISS_L1}\n{ISS_L2}\n");
        let specs = parse_tle_block(&block).expect("valid TLE block");
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "ISS (ZARYA)");
    }

    #[test]
    fn tolerates_blank_lines_between_entries() {
        let block = format!("\nISS (ZARYA)\n{ISS_L1}\n{ISS_L2}\n\n");
        let specs = parse_tle_block(&block).expect("valid TLE block");
        assert_eq!(specs.len(), 1);
    }

    #[test]
    fn parses_a_frequency_block() {
        let freqs = parse_frequency_block("ISS (ZARYA): 145800000, 437800000\nNOAA 19: 137100000");
        assert_eq!(freqs["ISS (ZARYA)"], vec![145_800_000, 437_800_000]);
        assert_eq!(freqs["NOAA 19"], vec![137_100_000]);
    }

    #[test]
    fn round_trips_a_utc_datetime() {
        let t = parse_utc_datetime("2024-01-01 00:00:00").unwrap();
        assert_eq!(format_utc_rfc3339(t), "2024-01-01T00:00:00Z");
    }
}
