//! Cross-module Schedule Builder invariants (spec.md §8: invariants 1, 2, 7,
//! 9, scenario S2) that need `ephemeris`, `observer` and `schedule` together.

use std::sync::Arc;

use groundctl::ephemeris::SatelliteSpec;
use groundctl::observer::Observer;
use groundctl::schedule::Schedule;
use hifitime::{Duration, Epoch};

const ISS_L1: &str = "1 25544U 98067A   20194.88612269  .00000984  00000-0  25302-4 0  9990";
const ISS_L2: &str = "2 25544  51.6452  21.4326 0001361  95.0891  23.5953 15.49531632239936";
const NOAA_L1: &str = "1 33591U 09005A   20194.50000000  .00000060  00000-0  51538-4 0  9990";
const NOAA_L2: &str = "2 33591  99.1909 126.3010 0014538  89.9115 270.3745 14.12501077589740";
const BAD_L1: &str = "not a valid tle line";
const BAD_L2: &str = "still not valid";

fn observer() -> Observer {
    Observer::new(37.229_572, -80.413_940, 0.0)
}

#[test]
fn an_unreachable_satellite_is_skipped_without_aborting_the_batch() {
    // invariant 7: a single satellite's failure does not prevent other
    // satellites in the same batch from being scheduled.
    let good = Arc::new(SatelliteSpec::parse("ISS (ZARYA)", ISS_L1, ISS_L2).unwrap());
    let bad = SatelliteSpec::parse("BROKEN", BAD_L1, BAD_L2);
    assert!(bad.is_err());

    let mut schedule = Schedule::new();
    let t0 = Epoch::from_unix_seconds(1_592_438_400.0);
    let t1 = t0 + Duration::from_hours(24.0);
    schedule.extend(&[good], t0, t1, &observer());

    assert!(!schedule.is_empty());
}

#[test]
fn schedule_stays_rise_ordered_and_non_overlapping_across_multiple_extends() {
    // invariants 1, 2, 9: rise-monotone, non-overlapping, append-only after
    // the current tail, across repeated Schedule Builder calls (S2).
    let iss = Arc::new(SatelliteSpec::parse("ISS (ZARYA)", ISS_L1, ISS_L2).unwrap());
    let noaa = Arc::new(SatelliteSpec::parse("NOAA 19", NOAA_L1, NOAA_L2).unwrap());

    let mut schedule = Schedule::new();
    let t0 = Epoch::from_unix_seconds(1_592_438_400.0);
    let t1 = t0 + Duration::from_hours(24.0);
    schedule.extend(&[iss.clone(), noaa.clone()], t0, t1, &observer());

    let t2 = t1 + Duration::from_hours(24.0);
    schedule.extend(&[iss, noaa], t1, t2, &observer());

    let windows = schedule.windows();
    assert!(windows.len() >= 2);

    for pair in windows.windows(2) {
        assert!(pair[0].rise_utc <= pair[1].rise_utc, "rise times must be non-decreasing");
        assert!(pair[0].set_utc <= pair[1].rise_utc, "windows must not overlap");
    }

    for w in windows {
        assert!(w.rise_utc < w.set_utc);
        assert!(w.rise_utc >= t0);
        assert!(w.set_utc <= t2);
    }
}

#[test]
fn an_empty_time_range_leaves_the_schedule_unchanged() {
    let iss = Arc::new(SatelliteSpec::parse("ISS (ZARYA)", ISS_L1, ISS_L2).unwrap());
    let mut schedule = Schedule::new();
    let t0 = Epoch::from_unix_seconds(1_592_438_400.0);
    let t1 = t0 + Duration::from_hours(24.0);
    schedule.extend(&[iss.clone()], t0, t1, &observer());

    let windows_before: Vec<_> = schedule.windows().iter().map(|w| w.rise_utc).collect();
    schedule.extend(&[iss], t1, t1, &observer());
    let windows_after: Vec<_> = schedule.windows().iter().map(|w| w.rise_utc).collect();

    assert_eq!(windows_before, windows_after);
}
