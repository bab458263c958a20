//! Schedule Builder (spec.md §4.2): turns a queue of satellites into a
//! non-overlapping, rise-ordered sequence of [`ViewingWindow`]s.

use hifitime::Epoch;
use log::{debug, warn};

use crate::ephemeris::{self, SatelliteRef};
use crate::observer::Observer;

/// A single scheduled pass, per spec.md §3.
#[derive(Debug, Clone)]
pub struct ViewingWindow {
    pub name: String,
    pub rise_utc: Epoch,
    pub set_utc: Epoch,
    pub sat: SatelliteRef,
}

impl ViewingWindow {
    pub fn new(name: impl Into<String>, rise_utc: Epoch, set_utc: Epoch, sat: SatelliteRef) -> Self {
        assert!(rise_utc < set_utc, "a viewing window's rise must precede its set");
        Self {
            name: name.into(),
            rise_utc,
            set_utc,
            sat,
        }
    }
}

/// A completed or failed pass, appended once the Tracker has moved past it
/// (SPEC_FULL.md §2, Open Question 4).
#[derive(Debug, Clone)]
pub struct ProcessedWindow {
    pub window: ViewingWindow,
    pub completed: bool,
}

/// The pending queue of viewing windows, ordered by rise time and
/// non-overlapping (spec.md §8 invariants 1, 2).
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    windows: Vec<ViewingWindow>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn windows(&self) -> &[ViewingWindow] {
        &self.windows
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn pop_front(&mut self) -> Option<ViewingWindow> {
        if self.windows.is_empty() {
            None
        } else {
            Some(self.windows.remove(0))
        }
    }

    pub fn clear(&mut self) {
        self.windows.clear();
    }

    fn tail_set_utc(&self) -> Option<Epoch> {
        self.windows.last().map(|w| w.set_utc)
    }

    /// Appends at most one pass per satellite in `to_add`, each strictly
    /// after the schedule's current tail, per spec.md §4.2's algorithm. A
    /// satellite with no observable pass in `[start_utc, end_utc]` is
    /// skipped (logged, not an error) rather than aborting the whole batch.
    pub fn extend(
        &mut self,
        to_add: &[SatelliteRef],
        start_utc: Epoch,
        end_utc: Epoch,
        observer: &Observer,
    ) {
        let mut cursor = self.tail_set_utc().unwrap_or(start_utc);
        let mut has_tail = self.tail_set_utc().is_some();

        for sat in to_add {
            match ephemeris::find_windows(sat, observer, cursor, end_utc) {
                Ok(mut windows) => {
                    windows.sort_by_key(|w| w.0);
                    let selected = windows.into_iter().find(|(rise, _)| {
                        if has_tail {
                            *rise > cursor
                        } else {
                            *rise >= cursor
                        }
                    });

                    match selected {
                        Some((rise, set)) => {
                            self.windows
                                .push(ViewingWindow::new(sat.name.clone(), rise, set, sat.clone()));
                            cursor = set;
                            has_tail = true;
                        }
                        None => {
                            debug!(
                                "{}: no observable pass in [{}, {}], skipping",
                                sat.name, cursor, end_utc
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!("{}: failed to compute viewing windows: {e}", sat.name);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hifitime::Duration;
    use std::sync::Arc;

    use crate::ephemeris::SatelliteSpec;

    const ISS_L1: &str = "1 25544U 98067A   20194.88612269  .00000984  00000-0  25302-4 0  9990";
    const ISS_L2: &str = "2 25544  51.6452  21.4326 0001361  95.0891  23.5953 15.49531632239936";
    // A second, slightly different mean anomaly so its passes don't line up
    // with ISS's at the same instants.
    const NOAA_L1: &str = "1 33591U 09005A   20194.50000000  .00000060  00000-0  51538-4 0  9990";
    const NOAA_L2: &str = "2 33591  99.1909 126.3010 0014538  89.9115 270.3745 14.12501077589740";

    fn observer() -> Observer {
        Observer::new(37.229_572, -80.413_940, 0.0)
    }

    #[test]
    fn extend_produces_non_overlapping_rise_ordered_windows() {
        let sats = vec![
            Arc::new(SatelliteSpec::parse("ISS (ZARYA)", ISS_L1, ISS_L2).unwrap()),
            Arc::new(SatelliteSpec::parse("NOAA 19", NOAA_L1, NOAA_L2).unwrap()),
        ];

        let mut schedule = Schedule::new();
        let t0 = Epoch::from_unix_seconds(1_592_438_400.0);
        let t1 = t0 + Duration::from_hours(48.0);
        schedule.extend(&sats, t0, t1, &observer());

        let windows = schedule.windows();
        for pair in windows.windows(2) {
            assert!(pair[0].set_utc <= pair[1].rise_utc);
            assert!(pair[0].rise_utc <= pair[1].rise_utc);
        }
        for w in windows {
            assert!(w.rise_utc >= t0);
            assert!(w.set_utc <= t1);
        }
    }

    #[test]
    fn extend_is_a_noop_on_an_empty_range() {
        let sats = vec![Arc::new(SatelliteSpec::parse("ISS (ZARYA)", ISS_L1, ISS_L2).unwrap())];
        let mut schedule = Schedule::new();
        let t0 = Epoch::from_unix_seconds(1_592_438_400.0);
        schedule.extend(&sats, t0, t0, &observer());
        assert!(schedule.is_empty());
    }

    #[test]
    fn subsequent_extend_only_appends_after_the_tail() {
        let sats = vec![Arc::new(SatelliteSpec::parse("ISS (ZARYA)", ISS_L1, ISS_L2).unwrap())];
        let mut schedule = Schedule::new();
        let t0 = Epoch::from_unix_seconds(1_592_438_400.0);
        let t1 = t0 + Duration::from_hours(24.0);
        schedule.extend(&sats, t0, t1, &observer());

        let tail_before = schedule.tail_set_utc();
        let t2 = t1 + Duration::from_hours(24.0);
        schedule.extend(&sats, t1, t2, &observer());

        if let Some(tail_before) = tail_before {
            for w in schedule.windows() {
                assert!(w.rise_utc >= tail_before || w.set_utc <= tail_before);
            }
        }
    }
}
