//! Capture stage (spec §4.1): delivers exactly H samples per hop as
//! normalised float in [-1, 1], with the bit-reformatting pipeline applied
//! by the backend that owns the raw samples.

mod cpal_backend;
mod wav_replay;

#[cfg(feature = "fixtures")]
mod synthetic;

pub use cpal_backend::CpalCapture;
pub use wav_replay::WavReplayCapture;

#[cfg(feature = "fixtures")]
pub use synthetic::SyntheticCapture;

use crate::error::CaptureError;

/// Outcome of one `capture_hop` call, distinguishing a clean read from a
/// degraded one the caller should still treat as a full hop (spec §4.1:
/// "the hop is still delivered").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Full,
    PartialZeroFilled { samples_delivered: usize },
    Skipped,
}

/// Common interface implemented by every capture backend: the real
/// microphone (`cpal`), deterministic WAV replay, and the optional
/// synthetic-signal generators used by tests.
pub trait Capture {
    /// Blocks until one hop of `out.len()` samples has been written, or
    /// the backend's own timeout has elapsed (spec: "blocks up to
    /// 2*hop_duration"). On any recoverable failure, `out` is left fully
    /// populated (zero-filled where necessary) and the outcome communicates
    /// what happened; only truly unrecoverable conditions return `Err`.
    fn capture_hop(&mut self, out: &mut [f32]) -> Result<CaptureOutcome, CaptureError>;
}

/// Converts one DMA-style 32-bit slot to a normalised float sample, per the
/// exact bit-reformatting pipeline in spec §4.1. Shared by every backend
/// that emulates the target MEMS microphone's raw word format.
pub fn reformat_raw_slot(raw: i32, pre_amp: f32) -> f32 {
    let shifted = raw >> 14;
    let biased = shifted + 7_000;
    let clipped = biased.clamp(-131_072, 131_072);
    let centred = clipped - 360;
    let unit = centred as f32 / 131_072.0;
    let amplified = unit * pre_amp;
    (amplified * 32_767.0).clamp(-32_767.0, 32_767.0) / 32_767.0
}
