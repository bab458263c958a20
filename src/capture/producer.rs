//! Producer thread contract (spec.md §4.3, §5 "parallel OS-level threads").
//! One OS thread per channel, reading from the device and pushing into the
//! bounded queue that feeds the matching consumer.

use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::time::{Duration as StdDuration, Instant};

use log::{error, warn};
use num_complex::Complex32;
use tokio::sync::watch;

use super::buffer::{SampleBuffer, BUFFER_SIZE_SAMPLES};
use super::device::{ReadOutcome, Sdr};

pub enum PipelineMessage {
    Buffer(SampleBuffer),
    EndOfStream,
}

pub struct ProducerConfig {
    pub channel: usize,
    pub sample_rate_hz: f64,
    pub duration_s: f64,
}

const ENQUEUE_WARN_EVERY: StdDuration = StdDuration::from_secs(5);

/// Reads from `device` until `duration_s` worth of samples has been
/// collected or `stop_rx` is asserted, pushing every non-empty buffer onto
/// `tx`. The queue is the system's only backpressure point: a full queue is
/// waited out, never dropped (spec.md §9 "Backpressure").
pub fn run_producer(
    device: Arc<Mutex<Box<dyn Sdr>>>,
    cfg: ProducerConfig,
    tx: SyncSender<PipelineMessage>,
    stop_rx: watch::Receiver<bool>,
) {
    let target_samples = (cfg.sample_rate_hz * cfg.duration_s).round().max(0.0) as u64;
    let mut collected: u64 = 0;
    let mut scratch = vec![Complex32::new(0.0, 0.0); BUFFER_SIZE_SAMPLES];

    while collected < target_samples && !*stop_rx.borrow() {
        let outcome = {
            let mut dev = device.lock().unwrap();
            dev.read_stream(cfg.channel, &mut scratch)
        };

        match outcome {
            ReadOutcome::Samples(n) if n > 0 => {
                collected += n as u64;
                if !enqueue(&tx, SampleBuffer::new(scratch[..n].to_vec()), cfg.channel) {
                    return;
                }
            }
            ReadOutcome::Samples(_) | ReadOutcome::Timeout => {}
            ReadOutcome::Overflow => warn!("channel {}: driver-reported overflow", cfg.channel),
            ReadOutcome::Error(e) => {
                error!("channel {}: stream error, terminating producer: {e}", cfg.channel);
                break;
            }
        }
    }

    let _ = tx.send(PipelineMessage::EndOfStream);
}

/// Pushes `buf` onto `tx`, retrying (never dropping) while the queue is
/// full, and logging a warning at most every [`ENQUEUE_WARN_EVERY`] while it
/// waits. Returns `false` if the consumer side has gone away.
fn enqueue(tx: &SyncSender<PipelineMessage>, buf: SampleBuffer, channel: usize) -> bool {
    let mut item = PipelineMessage::Buffer(buf);
    let mut waiting_since: Option<Instant> = None;
    let mut next_warn_at = ENQUEUE_WARN_EVERY;

    loop {
        match tx.try_send(item) {
            Ok(()) => return true,
            Err(TrySendError::Full(back)) => {
                item = back;
                let elapsed = waiting_since.get_or_insert_with(Instant::now).elapsed();
                if elapsed >= next_warn_at {
                    warn!(
                        "channel {channel}: output queue saturated for {elapsed:?}, still waiting (backpressure, not dropping)"
                    );
                    next_warn_at += ENQUEUE_WARN_EVERY;
                }
                std::thread::sleep(StdDuration::from_millis(50));
            }
            Err(TrySendError::Disconnected(_)) => return false,
        }
    }
}
