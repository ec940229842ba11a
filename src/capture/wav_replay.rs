//! Deterministic WAV replay backend (spec §9 "sample-counter time, not
//! wall-clock", used for the CLI and for T6 bit-exact-replay tests). Reads a
//! mono 16-bit PCM file hop by hop; end of file zero-fills the remainder of
//! the final hop and every hop after it, matching capture's own partial-read
//! contract rather than erroring.

use hound::WavReader;

use crate::error::CaptureError;

use super::{Capture, CaptureOutcome};

pub struct WavReplayCapture {
    samples: Vec<f32>,
    cursor: usize,
    sample_rate_hz: u32,
}

impl WavReplayCapture {
    pub fn open(path: &str) -> Result<Self, CaptureError> {
        let mut reader = WavReader::open(path).map_err(|e| CaptureError::ReadError { details: e.to_string() })?;
        let spec = reader.spec();
        if spec.channels != 1 {
            return Err(CaptureError::ReadError {
                details: format!("expected mono WAV, got {} channels", spec.channels),
            });
        }

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Int => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
                .collect::<Result<_, _>>()
                .map_err(|e| CaptureError::ReadError { details: e.to_string() })?,
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| CaptureError::ReadError { details: e.to_string() })?,
        };

        Ok(Self { samples, cursor: 0, sample_rate_hz: spec.sample_rate })
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.samples.len()
    }

    /// Total number of mono samples in the file, for callers (the CLI) that
    /// want to size a hop budget instead of looping past end-of-file.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

impl Capture for WavReplayCapture {
    fn capture_hop(&mut self, out: &mut [f32]) -> Result<CaptureOutcome, CaptureError> {
        let remaining = self.samples.len().saturating_sub(self.cursor);
        let take = remaining.min(out.len());

        out[..take].copy_from_slice(&self.samples[self.cursor..self.cursor + take]);
        if take < out.len() {
            out[take..].fill(0.0);
        }
        self.cursor += take;

        if take == out.len() {
            Ok(CaptureOutcome::Full)
        } else if take == 0 {
            Ok(CaptureOutcome::Skipped)
        } else {
            Ok(CaptureOutcome::PartialZeroFilled { samples_delivered: take })
        }
    }
}
