//! Consumer thread contract (spec.md §4.3): drains one channel's buffers
//! to disk, naming the file after `original_source/sdr_recorder.py`'s
//! convention and zero-padding the trailing partial block on close.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;

use hifitime::Epoch;
use log::debug;

use super::buffer::{pad_to_block, BLOCK_SIZE_BYTES};
use super::producer::PipelineMessage;

pub struct ConsumerConfig {
    pub channel: usize,
    pub sat_name: String,
    pub center_freq_hz: u64,
    pub output_dir: PathBuf,
}

/// Drains `rx` to a new file under `cfg.output_dir` until an
/// [`PipelineMessage::EndOfStream`] (or a disconnected producer) is seen,
/// then zero-pads the file to a multiple of [`BLOCK_SIZE_BYTES`].
pub fn run_consumer(cfg: ConsumerConfig, rx: Receiver<PipelineMessage>) -> std::io::Result<PathBuf> {
    let timestamp = iso_timestamp(Epoch::now().unwrap_or_else(|_| Epoch::from_unix_seconds(0.0)));
    let filename = format!(
        "{}_Frequency{}_Channel{}_{}.dat",
        cfg.sat_name, cfg.center_freq_hz, cfg.channel, timestamp
    );
    let path = cfg.output_dir.join(filename);

    let mut file = File::create(&path)?;

    loop {
        match rx.recv() {
            Ok(PipelineMessage::Buffer(buf)) => file.write_all(&buf.to_bytes())?,
            Ok(PipelineMessage::EndOfStream) | Err(_) => break,
        }
    }

    // Pad only the trailing partial block, not the whole file in memory:
    // `pad_to_block` sees a buffer holding just the bytes already written
    // into the file's final block and rounds that up the same way it would
    // a full in-memory buffer.
    let total_len = file.metadata()?.len() as usize;
    let tail_len = total_len % BLOCK_SIZE_BYTES;
    let mut tail = vec![0u8; tail_len];
    pad_to_block(&mut tail);
    if tail.len() > tail_len {
        file.write_all(&tail[tail_len..])?;
    }
    file.sync_all()?;

    debug!("closed capture file {path:?}");
    Ok(path)
}

fn iso_timestamp(t: Epoch) -> String {
    let (y, m, d, hh, mm, ss, _) = t.to_gregorian_utc();
    format!("{y:04}-{m:02}-{d:02}_{hh:02}-{mm:02}-{ss:02}")
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc::sync_channel;

    #[test]
    fn pads_the_final_file_to_a_block_boundary() {
        let dir = std::env::temp_dir().join(format!("groundctl-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let (tx, rx) = sync_channel(4);
        let cfg = ConsumerConfig {
            channel: 0,
            sat_name: "TESTSAT".to_string(),
            center_freq_hz: 100_000_000,
            output_dir: dir.clone(),
        };

        let samples = vec![num_complex::Complex32::new(0.0, 0.0); 10];
        tx.send(PipelineMessage::Buffer(super::super::buffer::SampleBuffer::new(samples)))
            .unwrap();
        tx.send(PipelineMessage::EndOfStream).unwrap();

        let path = run_consumer(cfg, rx).unwrap();
        let len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(len % BLOCK_SIZE_BYTES as u64, 0);

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_dir(&dir);
    }
}
