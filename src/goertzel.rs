//! Multi-bin Goertzel filter bank with Q14 fixed-point recurrence (spec §4.3).
//!
//! Two instances exist in the running core (rhythm, harmony); both are
//! plain data owned by the audio task, with all scratch space sized once at
//! construction (spec §5 "no heap in hot path").

use crate::ring::SampleRing;
use crate::window::WindowBank;

const Q14_SHIFT: u32 = 14;
const Q14_ONE: f64 = 16_384.0;

/// Immutable per-bin descriptor, computed once at bank construction and
/// never mutated afterward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoertzelBinConfig {
    pub target_hz: f32,
    pub window_n: usize,
    /// c = round(2*cos(2*pi*f/Fs) * 16384), Q14 fixed point.
    pub coeff_q14: i32,
}

impl GoertzelBinConfig {
    pub fn new(target_hz: f32, window_n: usize, sample_rate_hz: u32) -> Self {
        let omega = 2.0 * std::f64::consts::PI * target_hz as f64 / sample_rate_hz as f64;
        let coeff_q14 = (2.0 * omega.cos() * Q14_ONE).round() as i32;
        Self {
            target_hz,
            window_n,
            coeff_q14,
        }
    }
}

/// Evenly (semitone- or linear-) spaced bin layout helper. Spec §4.3 leaves
/// the exact spacing law unspecified beyond "spanning" a range and the
/// harmony bank being semitone-spaced; rhythm bins are laid out linearly
/// since they track low-frequency periodicity, not pitch.
pub fn linear_bin_freqs(min_hz: f32, max_hz: f32, count: usize) -> Vec<f32> {
    if count <= 1 {
        return vec![min_hz];
    }
    (0..count)
        .map(|i| min_hz + (max_hz - min_hz) * i as f32 / (count - 1) as f32)
        .collect()
}

pub fn semitone_bin_freqs(min_hz: f32, max_hz: f32, count: usize) -> Vec<f32> {
    if count <= 1 {
        return vec![min_hz];
    }
    let semitones = (max_hz / min_hz).log2() * 12.0;
    let step = semitones / (count - 1) as f32;
    (0..count)
        .map(|i| min_hz * 2f32.powf(i as f32 * step / 12.0))
        .collect()
}

/// Window size in samples for a bin, chosen so the analysis covers a fixed
/// number of cycles of the target frequency at the given sample rate
/// (longer windows for lower frequencies, clamped into a sane range).
pub fn window_size_for(target_hz: f32, sample_rate_hz: u32, cycles: f32, max_n: usize) -> usize {
    let raw = (cycles * sample_rate_hz as f32 / target_hz.max(1.0)) as usize;
    raw.clamp(64, max_n)
}

/// Owns a bin array, a group-by-N index, and scratch space sized to the
/// largest window. No allocation happens in `compute`.
pub struct GoertzelBank {
    bins: Vec<GoertzelBinConfig>,
    /// window size -> indices of bins sharing it (spec §4.3 "group-by-N").
    groups: Vec<(usize, Vec<usize>)>,
    max_window: usize,
    scratch: Vec<f32>,
    sample_rate_hz: u32,
    /// Previous full output, kept here only so a bin that failed to exceed
    /// its noise floor can be reported as held at floor rather than zero.
    pub last_output: Vec<f32>,
}

impl GoertzelBank {
    pub fn new(bins: Vec<GoertzelBinConfig>, sample_rate_hz: u32) -> Self {
        let max_window = bins.iter().map(|b| b.window_n).max().unwrap_or(0);
        let mut groups_map: Vec<(usize, Vec<usize>)> = Vec::new();
        for (idx, bin) in bins.iter().enumerate() {
            match groups_map.iter_mut().find(|(n, _)| *n == bin.window_n) {
                Some((_, indices)) => indices.push(idx),
                None => groups_map.push((bin.window_n, vec![idx])),
            }
        }
        let n_bins = bins.len();
        Self {
            bins,
            groups: groups_map,
            max_window,
            scratch: vec![0.0; max_window],
            sample_rate_hz,
            last_output: vec![0.0; n_bins],
        }
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    pub fn bins(&self) -> &[GoertzelBinConfig] {
        &self.bins
    }

    /// Runs the full bank against the ring buffer's current tail, writing
    /// one magnitude per bin into `out` (must be `bin_count()` long).
    pub fn compute(&mut self, ring: &SampleRing, windows: &mut WindowBank, out: &mut [f32]) {
        debug_assert_eq!(out.len(), self.bins.len());
        for (n, indices) in &self.groups {
            ring.copy_last(*n, &mut self.scratch[..*n]);
            let table = windows.get(*n);
            for &idx in indices {
                out[idx] = goertzel_one(&self.scratch[..*n], table, self.bins[idx].coeff_q14);
            }
        }
        self.last_output.copy_from_slice(out);
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }
}

/// Single-bin Goertzel evaluation in Q14 fixed point (spec §4.3 steps 2-4).
fn goertzel_one(samples: &[f32], window: &[f32], coeff_q14: i32) -> f32 {
    let n = samples.len() as f32;
    let mut q1: i64 = 0;
    let mut q2: i64 = 0;
    for i in 0..samples.len() {
        let windowed = samples[i] * window[i];
        let s = (windowed * 32_767.0).round().clamp(-32_767.0, 32_767.0) as i64;
        let q0 = s + ((coeff_q14 as i64 * q1) >> Q14_SHIFT) - q2;
        q2 = q1;
        q1 = q0;
    }
    let radicand = (q1 * q1 + q2 * q2) as f64 - (coeff_q14 as i64 * q1 * q2) as f64;
    let radicand = radicand.max(0.0);
    (radicand.sqrt() / n as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::SampleRing;
    use std::f32::consts::PI;

    fn tone(freq: f32, sample_rate: u32, n: usize, amplitude: f32) -> Vec<f32> {
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn coeff_matches_cosine_formula() {
        let cfg = GoertzelBinConfig::new(1000.0, 256, 16_000);
        let expected = (2.0 * (2.0 * std::f64::consts::PI * 1000.0 / 16_000.0).cos() * 16_384.0)
            .round() as i32;
        assert_eq!(cfg.coeff_q14, expected);
    }

    #[test]
    fn tone_at_bin_frequency_dominates_neighbours() {
        // T1: pure tone at bin frequency >= 10x neighbouring bins' magnitude.
        let sample_rate = 16_000;
        let n = 512;
        let target = 440.0;
        let neighbour_lo = 220.0;
        let neighbour_hi = 880.0;
        let bins = vec![
            GoertzelBinConfig::new(neighbour_lo, n, sample_rate),
            GoertzelBinConfig::new(target, n, sample_rate),
            GoertzelBinConfig::new(neighbour_hi, n, sample_rate),
        ];
        let mut bank = GoertzelBank::new(bins, sample_rate);
        let mut ring = SampleRing::new(2048).unwrap();
        ring.push_hop(&tone(target, sample_rate, 2048, 0.2));
        let mut windows = WindowBank::new();
        let mut out = vec![0.0; 3];
        bank.compute(&ring, &mut windows, &mut out);
        assert!(out[1] > out[0] * 10.0, "{:?}", out);
        assert!(out[1] > out[2] * 10.0, "{:?}", out);
    }

    #[test]
    fn silence_yields_near_zero_magnitude() {
        let sample_rate = 16_000;
        let bins = vec![GoertzelBinConfig::new(200.0, 256, sample_rate)];
        let mut bank = GoertzelBank::new(bins, sample_rate);
        let ring = SampleRing::new(2048).unwrap();
        let mut windows = WindowBank::new();
        let mut out = vec![0.0; 1];
        bank.compute(&ring, &mut windows, &mut out);
        assert!(out[0] < 1e-3);
    }

    #[test]
    fn group_by_n_shares_scratch_across_bins_of_same_window() {
        let sample_rate = 16_000;
        let bins = vec![
            GoertzelBinConfig::new(100.0, 256, sample_rate),
            GoertzelBinConfig::new(200.0, 256, sample_rate),
            GoertzelBinConfig::new(300.0, 128, sample_rate),
        ];
        let bank = GoertzelBank::new(bins, sample_rate);
        assert_eq!(bank.groups.len(), 2);
    }

    #[test]
    fn linear_bin_freqs_spans_range_inclusive() {
        let freqs = linear_bin_freqs(60.0, 600.0, 24);
        assert_eq!(freqs.len(), 24);
        assert!((freqs[0] - 60.0).abs() < 1e-3);
        assert!((freqs[23] - 600.0).abs() < 1e-3);
    }

    #[test]
    fn semitone_bin_freqs_spans_range_inclusive() {
        let freqs = semitone_bin_freqs(55.0, 4200.0, 64);
        assert_eq!(freqs.len(), 64);
        assert!((freqs[0] - 55.0).abs() < 1e-3);
        assert!((freqs[63] - 4200.0).abs() < 1.0);
    }

    #[test]
    fn output_is_never_negative() {
        let sample_rate = 16_000;
        let bins = vec![GoertzelBinConfig::new(150.0, 256, sample_rate)];
        let mut bank = GoertzelBank::new(bins, sample_rate);
        let mut ring = SampleRing::new(2048).unwrap();
        ring.push_hop(&tone(150.0, sample_rate, 2048, 0.9));
        let mut windows = WindowBank::new();
        let mut out = vec![0.0; 1];
        bank.compute(&ring, &mut windows, &mut out);
        assert!(out[0] >= 0.0);
    }
}
