//! Chroma extraction and key-clarity stability tracking (spec §4.7).
//!
//! Folds the harmony bank's semitone-spaced magnitudes into 12 pitch
//! classes by equal-temperament mapping, then smooths key clarity with a
//! slow (~500 ms) time constant.

pub const CHROMA_CLASSES: usize = 12;
/// A4 = 440 Hz maps to pitch class 9 (A) in the C=0 convention.
const A4_CLASS_SHIFT: i32 = 9;

pub struct ChromaExtractor {
    harmony_freqs: Vec<f32>,
    clarity_alpha: f32,
    smoothed_clarity: f32,
}

impl ChromaExtractor {
    pub fn new(harmony_freqs: Vec<f32>, hop_rate_hz: f32, clarity_tau_s: f32) -> Self {
        Self {
            harmony_freqs,
            clarity_alpha: 1.0 - (-1.0 / (clarity_tau_s * hop_rate_hz)).exp(),
            smoothed_clarity: 0.0,
        }
    }

    /// Folds `harmony_mags` (parallel to `harmony_freqs`) into 12 classes,
    /// normalises by the maximum, and returns (chroma, key_clarity).
    pub fn update(&mut self, harmony_mags: &[f32]) -> ([f32; CHROMA_CLASSES], f32) {
        debug_assert_eq!(harmony_mags.len(), self.harmony_freqs.len());
        let mut classes = [0.0f32; CHROMA_CLASSES];
        for (&freq, &mag) in self.harmony_freqs.iter().zip(harmony_mags) {
            let class = pitch_class(freq);
            classes[class] += mag;
        }
        let max = classes.iter().cloned().fold(0.0f32, f32::max);
        if max > 0.0 {
            for c in classes.iter_mut() {
                *c /= max;
            }
        }
        let total: f32 = classes.iter().sum();
        let dominant = classes.iter().cloned().fold(0.0f32, f32::max);
        let raw_clarity = if total > 0.0 { dominant / total } else { 0.0 };
        self.smoothed_clarity += self.clarity_alpha * (raw_clarity - self.smoothed_clarity);
        (classes, self.smoothed_clarity)
    }
}

/// bin = round(12*log2(f/440)) mod 12, rotated so C = 0 (A4 is class 9).
fn pitch_class(freq_hz: f32) -> usize {
    if freq_hz <= 0.0 {
        return 0;
    }
    let semis_from_a4 = (12.0 * (freq_hz / 440.0).log2()).round() as i32;
    let class = (semis_from_a4 + A4_CLASS_SHIFT).rem_euclid(CHROMA_CLASSES as i32);
    class as usize
}
