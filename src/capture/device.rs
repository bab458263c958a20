//! SDR device abstraction (spec.md §1: the SDR driver is an opaque external
//! dependency). Mirrors the teacher's `device/interface.rs` split between a
//! real hardware backend and a substitute data source.

use num_complex::Complex32;

use crate::error::CaptureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunerMode {
    Single,
    Dual,
}

impl TunerMode {
    pub fn num_channels(self) -> usize {
        match self {
            TunerMode::Single => 1,
            TunerMode::Dual => 2,
        }
    }

    pub fn bandwidth_hz(self) -> u64 {
        match self {
            TunerMode::Single => 10_000_000,
            TunerMode::Dual => 2_000_000,
        }
    }
}

pub enum ReadOutcome {
    Samples(usize),
    Timeout,
    Overflow,
    Error(String),
}

/// A channel-addressable SDR, independent of any concrete driver.
pub trait Sdr: Send {
    fn set_sample_rate(&mut self, channel: usize, sample_rate_hz: f64) -> Result<(), CaptureError>;
    fn set_center_freq(&mut self, channel: usize, freq_hz: f64) -> Result<(), CaptureError>;
    fn set_gain(&mut self, channel: usize, gain_db: f64) -> Result<(), CaptureError>;
    fn open_rx_stream(&mut self, channel: usize) -> Result<(), CaptureError>;
    fn read_stream(&mut self, channel: usize, scratch: &mut [Complex32]) -> ReadOutcome;
    fn deactivate_stream(&mut self, channel: usize);
    fn close(&mut self);

    /// A short human-readable identifier, for the `device_get` command.
    fn descriptor(&self) -> String {
        "unknown".to_string()
    }
}

/// Stand-in used when no real SDR driver is wired in: produces silent I/Q
/// at the configured rate instead of failing outright, so the rest of the
/// pipeline (queueing, file layout, admission control) stays exercisable
/// without hardware attached.
#[derive(Default)]
pub struct NullSdr {
    sample_rates: std::collections::HashMap<usize, f64>,
}

impl Sdr for NullSdr {
    fn set_sample_rate(&mut self, channel: usize, sample_rate_hz: f64) -> Result<(), CaptureError> {
        self.sample_rates.insert(channel, sample_rate_hz);
        Ok(())
    }

    fn set_center_freq(&mut self, _channel: usize, _freq_hz: f64) -> Result<(), CaptureError> {
        Ok(())
    }

    fn set_gain(&mut self, _channel: usize, _gain_db: f64) -> Result<(), CaptureError> {
        Ok(())
    }

    fn open_rx_stream(&mut self, _channel: usize) -> Result<(), CaptureError> {
        Ok(())
    }

    fn read_stream(&mut self, _channel: usize, scratch: &mut [Complex32]) -> ReadOutcome {
        let n = scratch.len().min(4096);
        for sample in scratch[..n].iter_mut() {
            *sample = Complex32::new(0.0, 0.0);
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
        ReadOutcome::Samples(n)
    }

    fn deactivate_stream(&mut self, _channel: usize) {}

    fn close(&mut self) {}

    fn descriptor(&self) -> String {
        "null-sdr (no hardware attached)".to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tuner_mode_reports_channel_count_and_bandwidth() {
        assert_eq!(TunerMode::Single.num_channels(), 1);
        assert_eq!(TunerMode::Dual.num_channels(), 2);
        assert!(TunerMode::Single.bandwidth_hz() > TunerMode::Dual.bandwidth_hz());
    }

    #[test]
    fn null_sdr_produces_samples() {
        let mut sdr = NullSdr::default();
        sdr.set_sample_rate(0, 2_000_000.0).unwrap();
        let mut scratch = vec![Complex32::new(1.0, 1.0); 8192];
        match sdr.read_stream(0, &mut scratch) {
            ReadOutcome::Samples(n) => assert!(n > 0),
            _ => panic!("expected samples"),
        }
    }
}
