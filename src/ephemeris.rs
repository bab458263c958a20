//! Ephemeris Oracle (spec.md §4.1): TLE parsing, viewing-window search and
//! instantaneous topocentric azimuth/elevation, built on the `sgp4`
//! propagator (SPEC_FULL.md §2).

use std::sync::Arc;

use hifitime::{Duration, Epoch};

pub use crate::error::EphemerisError;
use crate::observer::Observer;

pub type SatelliteRef = Arc<SatelliteSpec>;

/// A satellite's orbital elements plus the frequencies it was queued with.
#[derive(Debug, Clone)]
pub struct SatelliteSpec {
    pub name: String,
    pub line1: String,
    pub line2: String,
    pub frequencies: Vec<u64>,
    elements: sgp4::Elements,
}

impl SatelliteSpec {
    pub fn parse(name: &str, line1: &str, line2: &str) -> Result<Self, EphemerisError> {
        let elements =
            sgp4::Elements::from_tle(Some(name.to_string()), line1.as_bytes(), line2.as_bytes())?;

        Ok(Self {
            name: name.to_string(),
            line1: line1.to_string(),
            line2: line2.to_string(),
            frequencies: Vec::new(),
            elements,
        })
    }

    pub fn elements(&self) -> &sgp4::Elements {
        &self.elements
    }
}

fn duration_seconds(d: Duration) -> f64 {
    d.total_nanoseconds() as f64 / 1.0e9
}

/// All `(rise, set)` intervals in `[t0_utc, t1_utc]` during which the
/// satellite's topocentric elevation is >= 0 deg.
///
/// Open Question resolved (SPEC_FULL.md §4.1): an event falling exactly on
/// `t0_utc`/`t1_utc` is treated as absent from the open interval, but a pass
/// already in progress at `t0_utc` (or still in progress at `t1_utc`) is
/// clipped to the boundary rather than dropped.
pub fn find_windows(
    spec: &SatelliteSpec,
    observer: &Observer,
    t0_utc: Epoch,
    t1_utc: Epoch,
) -> Result<Vec<(Epoch, Epoch)>, EphemerisError> {
    const STEP_SECONDS: f64 = 30.0;

    let mut windows = Vec::new();
    if t1_utc <= t0_utc {
        return Ok(windows);
    }

    let constants = sgp4::Constants::from_elements(spec.elements())?;
    let elevation_at = |t: Epoch| -> f64 {
        azel_with_constants(&constants, spec, observer, t)
            .map(|(_, el)| el)
            .unwrap_or(-90.0)
    };

    let total_seconds = duration_seconds(t1_utc - t0_utc);
    let steps = (total_seconds / STEP_SECONDS).ceil().max(1.0) as u64;

    let mut t_prev = t0_utc;
    let mut el_prev = elevation_at(t_prev);
    let mut rise: Option<Epoch> = if el_prev >= 0.0 { Some(t0_utc) } else { None };

    for i in 1..=steps {
        let t_cur = if i == steps {
            t1_utc
        } else {
            t0_utc + Duration::from_seconds(STEP_SECONDS * i as f64)
        };
        let el_cur = elevation_at(t_cur);

        if el_prev < 0.0 && el_cur >= 0.0 {
            rise = Some(bisect_crossing(&elevation_at, t_prev, t_cur));
        } else if el_prev >= 0.0 && el_cur < 0.0 {
            if let Some(t_rise) = rise.take() {
                let t_set = bisect_crossing(&elevation_at, t_prev, t_cur);
                windows.push((t_rise, t_set));
            }
        }

        t_prev = t_cur;
        el_prev = el_cur;
    }

    if let Some(t_rise) = rise {
        windows.push((t_rise, t1_utc));
    }

    Ok(windows)
}

/// Bisects the elevation=0 crossing between `lo` (elevation < 0) and `hi`
/// (elevation >= 0) down to sub-second precision.
fn bisect_crossing(elevation_at: &impl Fn(Epoch) -> f64, mut lo: Epoch, mut hi: Epoch) -> Epoch {
    for _ in 0..20 {
        let mid = lo + (hi - lo) * 0.5;
        if elevation_at(mid) >= 0.0 {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    hi
}

/// Instantaneous topocentric azimuth/elevation (degrees) of `spec` as seen
/// from `observer` at `t_utc`.
pub fn azel(
    spec: &SatelliteSpec,
    observer: &Observer,
    t_utc: Epoch,
) -> Result<(f64, f64), EphemerisError> {
    let constants = sgp4::Constants::from_elements(spec.elements())?;
    azel_with_constants(&constants, spec, observer, t_utc)
}

fn azel_with_constants(
    constants: &sgp4::Constants,
    spec: &SatelliteSpec,
    observer: &Observer,
    t_utc: Epoch,
) -> Result<(f64, f64), EphemerisError> {
    let minutes_since_epoch = minutes_since_tle_epoch(spec, t_utc);
    let prediction = constants.propagate(sgp4::MinutesSinceEpoch(minutes_since_epoch))?;

    let gmst = gmst_radians(t_utc);
    let sat_ecef = teme_to_ecef(prediction.position, gmst);
    Ok(ecef_to_azel(sat_ecef, observer))
}

fn minutes_since_tle_epoch(spec: &SatelliteSpec, t_utc: Epoch) -> f64 {
    let tle_epoch_unix = spec.elements().datetime.and_utc().timestamp() as f64;
    (t_utc.to_unix_seconds() - tle_epoch_unix) / 60.0
}

/// Greenwich mean sidereal time, in radians, via the standard IAU-82 series.
fn gmst_radians(t_utc: Epoch) -> f64 {
    let jd = t_utc.to_jde_utc_days();
    let t = (jd - 2_451_545.0) / 36_525.0;
    let gmst_deg = 280.460_618_37 + 360.985_647_366_29 * (jd - 2_451_545.0)
        + 0.000_387_933 * t * t
        - t * t * t / 38_710_000.0;
    gmst_deg.rem_euclid(360.0).to_radians()
}

/// TEME position (km) rotated into a pseudo-ECEF frame by Earth rotation
/// alone (polar motion and nutation/precession corrections are outside the
/// scope of a ground-station controller operating on a single TLE).
fn teme_to_ecef(position_km: [f64; 3], gmst: f64) -> [f64; 3] {
    let (s, c) = gmst.sin_cos();
    [
        c * position_km[0] + s * position_km[1],
        -s * position_km[0] + c * position_km[1],
        position_km[2],
    ]
}

const WGS84_A_KM: f64 = 6378.137;
const WGS84_F: f64 = 1.0 / 298.257223563;

/// ECEF satellite position to topocentric (azimuth, elevation) in degrees,
/// via the observer's WGS84 geodetic position and a local ENU tangent plane.
fn ecef_to_azel(sat_ecef: [f64; 3], observer: &Observer) -> (f64, f64) {
    let lat = observer.latitude_deg.to_radians();
    let lon = observer.longitude_deg.to_radians();
    let alt_km = observer.elevation_m / 1000.0;

    let e2 = WGS84_F * (2.0 - WGS84_F);
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    let n = WGS84_A_KM / (1.0 - e2 * sin_lat * sin_lat).sqrt();

    let obs_ecef = [
        (n + alt_km) * cos_lat * cos_lon,
        (n + alt_km) * cos_lat * sin_lon,
        (n * (1.0 - e2) + alt_km) * sin_lat,
    ];

    let d = [
        sat_ecef[0] - obs_ecef[0],
        sat_ecef[1] - obs_ecef[1],
        sat_ecef[2] - obs_ecef[2],
    ];

    let east = -sin_lon * d[0] + cos_lon * d[1];
    let north = -sin_lat * cos_lon * d[0] - sin_lat * sin_lon * d[1] + cos_lat * d[2];
    let up = cos_lat * cos_lon * d[0] + cos_lat * sin_lon * d[1] + sin_lat * d[2];

    let range = (east * east + north * north + up * up).sqrt();
    let el = (up / range).asin().to_degrees();
    let az = east.atan2(north).to_degrees();

    (if az < 0.0 { az + 360.0 } else { az }, el)
}

#[cfg(test)]
mod test {
    use super::*;

    // Vallado validation case for NORAD 25544 (ISS), widely reused as an
    // SGP4 test fixture.
    const ISS_NAME: &str = "ISS (ZARYA)";
    const ISS_L1: &str = "1 25544U 98067A   20194.88612269  .00000984  00000-0  25302-4 0  9990";
    const ISS_L2: &str = "2 25544  51.6452  21.4326 0001361  95.0891  23.5953 15.49531632239936";

    fn iss() -> SatelliteSpec {
        SatelliteSpec::parse(ISS_NAME, ISS_L1, ISS_L2).unwrap()
    }

    fn blacksburg() -> Observer {
        Observer::new(37.229_572, -80.413_940, 0.0)
    }

    #[test]
    fn rejects_malformed_tle() {
        assert!(SatelliteSpec::parse("bad", "not a tle", "still not a tle").is_err());
    }

    #[test]
    fn azel_stays_in_range() {
        let spec = iss();
        let observer = blacksburg();
        let t0 = Epoch::from_unix_seconds(1_592_438_400.0);
        let (az, el) = azel(&spec, &observer, t0).unwrap();
        assert!((0.0..360.0).contains(&az));
        assert!((-90.0..=90.0).contains(&el));
    }

    #[test]
    fn windows_are_monotone_and_clipped_to_range() {
        let spec = iss();
        let observer = blacksburg();
        let t0 = Epoch::from_unix_seconds(1_592_438_400.0);
        let t1 = t0 + Duration::from_hours(24.0);
        let windows = find_windows(&spec, &observer, t0, t1).unwrap();

        let mut prev_set: Option<Epoch> = None;
        for (rise, set) in &windows {
            assert!(rise < set);
            assert!(*rise >= t0);
            assert!(*set <= t1);
            if let Some(prev) = prev_set {
                assert!(prev <= *rise);
            }
            prev_set = Some(*set);
        }
    }

    #[test]
    fn empty_range_yields_no_windows() {
        let spec = iss();
        let observer = blacksburg();
        let t0 = Epoch::from_unix_seconds(1_592_438_400.0);
        assert!(find_windows(&spec, &observer, t0, t0).unwrap().is_empty());
    }
}
