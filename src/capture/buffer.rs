//! Sample buffers and the on-disk byte layout (spec.md §4.3/§8 invariant 3).

use num_complex::Complex32;

/// Samples drained from the device driver in one `read_stream` call, per
/// `original_source/sdr_recorder.py`'s `BUFFER_SIZE`.
pub const BUFFER_SIZE_SAMPLES: usize = 1 << 17;

/// Capture files are zero-padded to a multiple of this many bytes.
pub const BLOCK_SIZE_BYTES: usize = 131_072;

/// Bytes per complex sample: two little-endian `f32`s (I, Q).
pub const BYTES_PER_SAMPLE: usize = 8;

#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub samples: Vec<Complex32>,
}

impl SampleBuffer {
    pub fn new(samples: Vec<Complex32>) -> Self {
        Self { samples }
    }

    /// Interleaved little-endian I/Q byte encoding of this buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * BYTES_PER_SAMPLE);
        for sample in &self.samples {
            bytes.extend_from_slice(&sample.re.to_le_bytes());
            bytes.extend_from_slice(&sample.im.to_le_bytes());
        }
        bytes
    }
}

/// Pads `bytes` up to the next multiple of [`BLOCK_SIZE_BYTES`] with zeros,
/// if it isn't already block-aligned.
pub fn pad_to_block(bytes: &mut Vec<u8>) {
    let remainder = bytes.len() % BLOCK_SIZE_BYTES;
    if remainder != 0 {
        bytes.resize(bytes.len() + (BLOCK_SIZE_BYTES - remainder), 0);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn to_bytes_is_little_endian_interleaved() {
        let buf = SampleBuffer::new(vec![Complex32::new(1.0, -1.0)]);
        let bytes = buf.to_bytes();
        assert_eq!(bytes.len(), BYTES_PER_SAMPLE);
        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &(-1.0f32).to_le_bytes());
    }

    #[test]
    fn pad_to_block_is_a_noop_when_already_aligned() {
        let mut bytes = vec![0u8; BLOCK_SIZE_BYTES * 2];
        pad_to_block(&mut bytes);
        assert_eq!(bytes.len(), BLOCK_SIZE_BYTES * 2);
    }

    #[test]
    fn pad_to_block_rounds_up_a_partial_block() {
        let mut bytes = vec![1u8; BLOCK_SIZE_BYTES + 10];
        pad_to_block(&mut bytes);
        assert_eq!(bytes.len(), BLOCK_SIZE_BYTES * 2);
        assert!(bytes[BLOCK_SIZE_BYTES + 10..].iter().all(|&b| b == 0));
    }
}
