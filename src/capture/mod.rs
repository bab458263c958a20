//! Capture Engine (spec.md §4.3): owns the device for the duration of a
//! pass, spawns a producer/consumer OS-thread pair per channel, and enforces
//! admission control before a capture is allowed to start.

pub mod buffer;
pub mod consumer;
pub mod device;
pub mod producer;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::error;
use tokio::sync::watch;

use crate::error::CaptureError;
use buffer::BYTES_PER_SAMPLE;
use consumer::{run_consumer, ConsumerConfig};
use device::{Sdr, TunerMode};
use producer::{run_producer, ProducerConfig};

pub const QUEUE_CAPACITY: usize = 10_000;
pub const DEFAULT_STORAGE_CAP_GB: f64 = 120.0;

#[derive(Debug, Clone)]
pub struct CapturePlan {
    pub name: String,
    pub center_freq_hz: u64,
    pub gain_db: f64,
    pub mode: TunerMode,
    pub sample_rate_hz: f64,
    pub duration_s: f64,
    pub output_dir: PathBuf,
}

impl CapturePlan {
    /// Upper bound on the bytes this capture will write, across all
    /// channels, used for admission control (spec.md §4.3).
    pub fn projected_bytes(&self) -> u64 {
        (BYTES_PER_SAMPLE as f64
            * self.sample_rate_hz
            * self.duration_s
            * self.mode.num_channels() as f64) as u64
    }
}

/// Refuses a capture that would push used storage past `cap_gb` (spec.md §9
/// "Admission control").
pub fn check_admission(plan: &CapturePlan, used_bytes: u64, cap_gb: f64) -> Result<(), CaptureError> {
    let gib = (1u64 << 30) as f64;
    let projected_gb = plan.projected_bytes() as f64 / gib;
    let used_gb = used_bytes as f64 / gib;

    if used_gb + projected_gb > cap_gb {
        return Err(CaptureError::InsufficientSpace {
            used_gb,
            projected_gb,
            cap_gb,
        });
    }
    Ok(())
}

/// Sums the size of every regular file directly under `dir`.
pub fn directory_used_bytes(dir: &std::path::Path) -> u64 {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter_map(|e| e.metadata().ok())
                .filter(|m| m.is_file())
                .map(|m| m.len())
                .sum()
        })
        .unwrap_or(0)
}

/// Owns the device for one pass's duration and the per-channel
/// producer/consumer thread pairs.
pub struct CaptureEngine {
    device: Arc<Mutex<Box<dyn Sdr>>>,
    stop_tx: watch::Sender<bool>,
    tasks: Vec<(JoinHandle<()>, JoinHandle<std::io::Result<PathBuf>>)>,
}

impl CaptureEngine {
    pub fn new(device: Arc<Mutex<Box<dyn Sdr>>>) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            device,
            stop_tx,
            tasks: Vec::new(),
        }
    }

    pub fn stop_handle(&self) -> watch::Sender<bool> {
        self.stop_tx.clone()
    }

    /// Configures the device and spawns a producer/consumer pair for every
    /// channel `plan.mode` requires.
    pub fn start(&mut self, plan: CapturePlan) -> Result<(), CaptureError> {
        for channel in 0..plan.mode.num_channels() {
            {
                let mut dev = self.device.lock().unwrap();
                dev.set_sample_rate(channel, plan.sample_rate_hz)?;
                dev.set_center_freq(channel, plan.center_freq_hz as f64)?;
                dev.set_gain(channel, plan.gain_db)?;
                dev.open_rx_stream(channel)?;
            }

            let (tx, rx) = std::sync::mpsc::sync_channel(QUEUE_CAPACITY);

            let producer_cfg = ProducerConfig {
                channel,
                sample_rate_hz: plan.sample_rate_hz,
                duration_s: plan.duration_s,
            };
            let stop_rx = self.stop_tx.subscribe();
            let device = self.device.clone();
            let producer = std::thread::spawn(move || run_producer(device, producer_cfg, tx, stop_rx));

            let consumer_cfg = ConsumerConfig {
                channel,
                sat_name: plan.name.clone(),
                center_freq_hz: plan.center_freq_hz,
                output_dir: plan.output_dir.clone(),
            };
            let consumer = std::thread::spawn(move || run_consumer(consumer_cfg, rx));

            self.tasks.push((producer, consumer));
        }
        Ok(())
    }

    /// Signals every producer to stop, joins them, deactivates the streams,
    /// then joins the consumers so every byte already queued gets flushed.
    /// This producers-then-consumers order is the critical invariant from
    /// spec.md §4.3/§9: closing the device before the consumers drain would
    /// lose buffered samples.
    pub fn stop(mut self) -> Vec<PathBuf> {
        let _ = self.stop_tx.send(true);

        let mut consumers = Vec::new();
        for (producer, consumer) in self.tasks.drain(..) {
            let _ = producer.join();
            consumers.push(consumer);
        }

        {
            let mut dev = self.device.lock().unwrap();
            for channel in 0..consumers.len() {
                dev.deactivate_stream(channel);
            }
            dev.close();
        }

        consumers
            .into_iter()
            .filter_map(|c| match c.join() {
                Ok(Ok(path)) => Some(path),
                Ok(Err(e)) => {
                    error!("consumer failed: {e}");
                    None
                }
                Err(_) => {
                    error!("consumer thread panicked");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use device::NullSdr;

    fn plan(output_dir: PathBuf) -> CapturePlan {
        CapturePlan {
            name: "TESTSAT".to_string(),
            center_freq_hz: 100_000_000,
            gain_db: 20.0,
            mode: TunerMode::Single,
            sample_rate_hz: 2_000_000.0,
            duration_s: 0.05,
            output_dir,
        }
    }

    #[test]
    fn admission_control_rejects_overbudget_captures() {
        let p = plan(PathBuf::from("."));
        assert!(check_admission(&p, 0, 10_000.0).is_ok());
        assert!(check_admission(&p, 0, 0.0).is_err());
    }

    #[test]
    fn a_full_capture_produces_one_file_per_channel() {
        let dir = std::env::temp_dir().join(format!("groundctl-engine-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let device: Arc<Mutex<Box<dyn Sdr>>> = Arc::new(Mutex::new(Box::new(NullSdr::default())));
        let mut engine = CaptureEngine::new(device);
        engine.start(plan(dir.clone())).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(200));
        let paths = engine.stop();

        assert_eq!(paths.len(), 1);
        assert!(paths[0].exists());

        for p in &paths {
            let _ = std::fs::remove_file(p);
        }
        let _ = std::fs::remove_dir(&dir);
    }
}
