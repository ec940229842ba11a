//! Synthetic signal generators (`fixtures` feature): click trains, sustained
//! chords, silence, and noise, used by the CLI replay tool and integration
//! tests that don't ship recorded WAV fixtures.

use rand::Rng;

use crate::error::CaptureError;

use super::{Capture, CaptureOutcome};

#[derive(Debug, Clone)]
pub enum SyntheticSignal {
    Silence,
    /// Short percussive clicks at a fixed tempo.
    ClickTrain { bpm: f32, click_duration_s: f32 },
    /// Sustained sum of sinusoids at the given frequencies (a chord).
    Chord { frequencies_hz: Vec<f32> },
    /// Uniform white noise in [-amplitude, amplitude].
    Noise { amplitude: f32 },
}

/// Deterministic synthetic capture backend: generates exactly one hop of
/// samples per call from a sample-counter phase, so repeated runs over the
/// same signal and seed are bit-identical (spec §9 replay determinism).
pub struct SyntheticCapture {
    signal: SyntheticSignal,
    sample_rate_hz: u32,
    sample_index: u64,
    rng: rand::rngs::StdRng,
}

impl SyntheticCapture {
    pub fn new(signal: SyntheticSignal, sample_rate_hz: u32, seed: u64) -> Self {
        use rand::SeedableRng;
        Self {
            signal,
            sample_rate_hz,
            sample_index: 0,
            rng: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }

    fn sample_at(&mut self, n: u64) -> f32 {
        let t = n as f32 / self.sample_rate_hz as f32;
        match &self.signal {
            SyntheticSignal::Silence => 0.0,
            SyntheticSignal::ClickTrain { bpm, click_duration_s } => {
                let period_s = 60.0 / bpm.max(1.0);
                let phase = t % period_s;
                if phase < *click_duration_s {
                    1.0 - (phase / click_duration_s)
                } else {
                    0.0
                }
            }
            SyntheticSignal::Chord { frequencies_hz } => {
                if frequencies_hz.is_empty() {
                    return 0.0;
                }
                let sum: f32 = frequencies_hz
                    .iter()
                    .map(|f| (2.0 * std::f32::consts::PI * f * t).sin())
                    .sum();
                (sum / frequencies_hz.len() as f32).clamp(-1.0, 1.0)
            }
            SyntheticSignal::Noise { amplitude } => self.rng.gen_range(-amplitude..=*amplitude),
        }
    }
}

impl Capture for SyntheticCapture {
    fn capture_hop(&mut self, out: &mut [f32]) -> Result<CaptureOutcome, CaptureError> {
        for slot in out.iter_mut() {
            *slot = self.sample_at(self.sample_index);
            self.sample_index += 1;
        }
        Ok(CaptureOutcome::Full)
    }
}
