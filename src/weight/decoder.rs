//! Six-digit frame extraction.
//!
//! Indicators frame their output inconsistently (`STX`, `ST,GS,`, `=`,
//! CR/LF, unit suffixes...), so the decoder does not look for any marker.
//! A reading is a run of exactly six ASCII digits; any other byte closes
//! the run. Shorter and longer runs are dropped whole.

use std::time::Instant;

use super::types::{NumericSample, RawChunk};

pub const FRAME_DIGITS: usize = 6;

#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    carry_partial_runs: bool,
    // Saturates at FRAME_DIGITS + 1; anything past six is already invalid
    run_len: usize,
    run_value: u32,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep an unterminated run across chunk boundaries instead of dropping it
    pub fn with_carry(carry_partial_runs: bool) -> Self {
        Self {
            carry_partial_runs,
            ..Self::default()
        }
    }

    pub fn decode(&mut self, chunk: &RawChunk) -> Vec<NumericSample> {
        self.decode_bytes(&chunk.bytes, Instant::now())
    }

    pub fn decode_bytes(&mut self, bytes: &[u8], at: Instant) -> Vec<NumericSample> {
        let mut samples = Vec::new();

        for &byte in bytes {
            if byte.is_ascii_digit() {
                self.push_digit(byte - b'0');
            } else {
                self.close_run(at, &mut samples);
            }
        }

        if !self.carry_partial_runs {
            // Chunk end counts as a boundary
            self.close_run(at, &mut samples);
        }

        samples
    }

    /// Drop any carried run
    pub fn reset(&mut self) {
        self.run_len = 0;
        self.run_value = 0;
    }

    pub fn has_pending_run(&self) -> bool {
        self.run_len > 0
    }

    fn push_digit(&mut self, digit: u8) {
        if self.run_len < FRAME_DIGITS {
            self.run_value = self.run_value * 10 + u32::from(digit);
            self.run_len += 1;
        } else {
            self.run_len = FRAME_DIGITS + 1;
        }
    }

    fn close_run(&mut self, at: Instant, samples: &mut Vec<NumericSample>) {
        if self.run_len == FRAME_DIGITS {
            samples.push(NumericSample::new(f64::from(self.run_value), at));
        }
        self.reset();
    }
}

/// Decode a single byte slice with a fresh decoder
pub fn decode_frames(bytes: &[u8]) -> Vec<f64> {
    FrameDecoder::new()
        .decode_bytes(bytes, Instant::now())
        .into_iter()
        .map(|s| s.value)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_six_digit_run() {
        assert_eq!(decode_frames(b"ST,GS,+012345kg\r\n"), vec![12345.0]);
        assert_eq!(decode_frames(b"\x02000800\x03"), vec![800.0]);
    }

    #[test]
    fn test_runs_at_chunk_edges() {
        assert_eq!(decode_frames(b"123456"), vec![123456.0]);
        assert_eq!(decode_frames(b"654321 kg"), vec![654321.0]);
        assert_eq!(decode_frames(b"W=100000"), vec![100000.0]);
    }

    #[test]
    fn test_wrong_length_runs_dropped() {
        assert!(decode_frames(b"ABC12345XYZ").is_empty());
        assert!(decode_frames(b"AB1234567CD").is_empty());
        assert!(decode_frames(b"1234567").is_empty());
        assert!(decode_frames(b"").is_empty());
        assert!(decode_frames(b"\r\n\r\n").is_empty());
    }

    #[test]
    fn test_every_run_reported() {
        let values = decode_frames(b"=000100=000100=000200\r\n");
        assert_eq!(values, vec![100.0, 100.0, 200.0]);
    }

    #[test]
    fn test_decimal_point_is_a_boundary() {
        // "1234.56" is two short runs, neither a reading
        assert!(decode_frames(b"1234.56").is_empty());
        assert_eq!(decode_frames(b"001234.5"), vec![1234.0]);
    }

    #[test]
    fn test_split_run_dropped_without_carry() {
        let mut decoder = FrameDecoder::new();
        let now = Instant::now();
        assert!(decoder.decode_bytes(b"ST,012", now).is_empty());
        assert!(decoder.decode_bytes(b"345\r\n", now).is_empty());
        assert!(!decoder.has_pending_run());
    }

    #[test]
    fn test_split_run_reassembled_with_carry() {
        let mut decoder = FrameDecoder::with_carry(true);
        let now = Instant::now();
        assert!(decoder.decode_bytes(b"ST,012", now).is_empty());
        assert!(decoder.has_pending_run());
        let samples = decoder.decode_bytes(b"345\r\n", now);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 12345.0);
    }

    #[test]
    fn test_carry_rejects_overlong_run() {
        let mut decoder = FrameDecoder::with_carry(true);
        let now = Instant::now();
        assert!(decoder.decode_bytes(b"1234", now).is_empty());
        assert!(decoder.decode_bytes(b"5678", now).is_empty());
        assert!(decoder.decode_bytes(b"\n", now).is_empty());
        assert!(!decoder.has_pending_run());
    }
}
