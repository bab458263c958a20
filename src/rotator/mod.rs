//! Rotator serial driver (spec.md §4.4/§6). Mirrors the teacher's
//! `device.rs` shape: a trait over the line protocol, a concrete serial
//! implementation owning a `Box<dyn SerialPort>`, and a no-op double for
//! tests.

use std::io::{BufRead, BufReader, Write};
use std::time::Duration;

use log::debug;
use serialport::SerialPort;

use crate::error::RotatorError;

const AZ_RANGE: std::ops::RangeInclusive<f64> = 0.0..=450.0;
const EL_RANGE: std::ops::RangeInclusive<f64> = 0.0..=180.0;

/// Whether `(az, el)` lies within the rotator's mechanical reach (spec.md
/// §4.4, scenario S4).
pub fn in_reachable_box(az: f64, el: f64) -> bool {
    AZ_RANGE.contains(&az) && EL_RANGE.contains(&el)
}

pub trait Rotator: Send {
    fn mov(&mut self, az: f64, el: f64) -> Result<(), RotatorError>;
    fn calibrate(&mut self) -> Result<String, RotatorError>;
}

/// Drives a rotator over a serial line: `MOVE <az>, <el>\n` / `calibrate\n`
/// out, a single text reply in.
pub struct SerialRotator {
    port: Box<dyn SerialPort>,
}

impl SerialRotator {
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, RotatorError> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(500))
            .open()?;
        Ok(Self { port })
    }

    fn read_reply(&mut self) -> Result<String, RotatorError> {
        let clone = self
            .port
            .try_clone()
            .map_err(|e| RotatorError::Device(e.to_string()))?;
        let mut reader = BufReader::new(clone);
        let mut line = String::new();

        reader.read_line(&mut line).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                RotatorError::SerialTimeout
            } else {
                RotatorError::Io(e)
            }
        })?;

        Ok(line.trim().to_string())
    }
}

impl Rotator for SerialRotator {
    fn mov(&mut self, az: f64, el: f64) -> Result<(), RotatorError> {
        if !in_reachable_box(az, el) {
            return Err(RotatorError::OutOfReach { az, el });
        }

        let cmd = format!("MOVE {az:.1}, {el:.1}\n");
        self.port.write_all(cmd.as_bytes())?;

        let reply = self.read_reply()?;
        if let Some(msg) = reply.strip_prefix("Error") {
            return Err(RotatorError::Device(msg.trim().to_string()));
        }

        debug!("rotator moved to az={az:.1} el={el:.1} (reply: {reply:?})");
        Ok(())
    }

    fn calibrate(&mut self) -> Result<String, RotatorError> {
        self.port.write_all(b"calibrate\n")?;
        self.read_reply()
    }
}

/// No-op stand-in used when no rotator is attached and in tests — logs the
/// commands it would have issued instead of driving hardware.
#[derive(Default)]
pub struct NullRotator {
    pub last_position: Option<(f64, f64)>,
}

impl Rotator for NullRotator {
    fn mov(&mut self, az: f64, el: f64) -> Result<(), RotatorError> {
        if !in_reachable_box(az, el) {
            return Err(RotatorError::OutOfReach { az, el });
        }
        debug!("(no rotator attached) would MOVE {az:.1}, {el:.1}");
        self.last_position = Some((az, el));
        Ok(())
    }

    fn calibrate(&mut self) -> Result<String, RotatorError> {
        Ok("calibrated".to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reachable_box_matches_mechanical_limits() {
        assert!(in_reachable_box(0.0, 0.0));
        assert!(in_reachable_box(450.0, 180.0));
        assert!(!in_reachable_box(-1.0, 10.0));
        assert!(!in_reachable_box(10.0, 181.0));
    }

    #[test]
    fn null_rotator_rejects_out_of_reach_targets() {
        let mut rotator = NullRotator::default();
        assert!(rotator.mov(10.0, 20.0).is_ok());
        assert_eq!(rotator.last_position, Some((10.0, 20.0)));
        assert!(rotator.mov(500.0, 20.0).is_err());
    }
}
