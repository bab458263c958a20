use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use hifitime::Epoch;
use tzf_rs::DefaultFinder;

/// A fixed ground-station location, per spec.md §3. `timezone_id` is derived
/// from `(latitude_deg, longitude_deg)` once, at construction, the way the
/// source derives it via `timezonefinder` — `tzf-rs` is the closest
/// maintained Rust analogue for this one lookup (see SPEC_FULL.md §2).
#[derive(Debug, Clone)]
pub struct Observer {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub elevation_m: f64,
    pub timezone_id: String,
}

impl Observer {
    pub fn new(latitude_deg: f64, longitude_deg: f64, elevation_m: f64) -> Self {
        let timezone_id = DefaultFinder::new()
            .get_tz_name(longitude_deg, latitude_deg)
            .to_string();

        Self {
            latitude_deg,
            longitude_deg,
            elevation_m,
            timezone_id,
        }
    }

    /// Renders a UTC epoch in this observer's local timezone. Used only at
    /// presentation boundaries (operator-facing log lines); the wire protocol
    /// itself reports UTC (SPEC_FULL.md §4, Open Question 2).
    pub fn render_local(&self, t_utc: Epoch) -> String {
        let chrono_utc = Utc
            .timestamp_opt(t_utc.to_unix_seconds() as i64, 0)
            .single()
            .unwrap_or_else(Utc::now);

        match self.timezone_id.parse::<Tz>() {
            Ok(tz) => chrono_utc
                .with_timezone(&tz)
                .format("%Y-%m-%d %H:%M:%S %Z")
                .to_string(),
            Err(_) => chrono_utc.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn derives_a_timezone_id() {
        let observer = Observer::new(40.7128, -74.0060, 10.0);
        assert!(!observer.timezone_id.is_empty());
    }

    #[test]
    fn renders_local_time_without_panicking() {
        let observer = Observer::new(51.5074, -0.1278, 35.0);
        let t = Epoch::from_unix_seconds(1_700_000_000.0);
        let rendered = observer.render_local(t);
        assert!(!rendered.is_empty());
    }
}
