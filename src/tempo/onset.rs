//! Layer 1: onset detection (spec §4.9.1, §4.9.2).

use std::collections::VecDeque;

const HISTORY_LEN: usize = 40;

/// EMA baselines, flux history, and refractory bookkeeping for onset
/// detection. Lives entirely inside the tempo tracker; never shared.
pub struct OnsetState {
    vu_baseline: f32,
    flux_baseline: f32,
    baseline_alpha: f32,
    baseline_min: f32,
    flux_max: f32,
    adaptive_threshold_sensitivity: f32,
    history: VecDeque<f32>,
    prev_combined: f32,
    prev_prev_combined: f32,
    last_onset_sample: Option<u64>,
    prev_rms: f32,
}

pub struct OnsetResult {
    pub combined_flux: f32,
    pub is_onset: bool,
    pub onset_strength: f32,
}

impl OnsetState {
    pub fn new(baseline_alpha: f32, baseline_min: f32, flux_max: f32, adaptive_threshold_sensitivity: f32) -> Self {
        Self {
            vu_baseline: baseline_min,
            flux_baseline: baseline_min,
            baseline_alpha,
            baseline_min,
            flux_max,
            adaptive_threshold_sensitivity,
            history: VecDeque::with_capacity(HISTORY_LEN),
            prev_combined: 0.0,
            prev_prev_combined: 0.0,
            last_onset_sample: None,
            prev_rms: 0.0,
        }
    }

    /// One hop of onset evaluation.
    ///
    /// `threshold_multiplier` and `refractory_samples` come from the state
    /// machine and config respectively; `sample_index` is the sample count
    /// at hop end (deterministic refractory gating, spec §4.9.2 (iii)).
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        rms: f32,
        spectral_flux: f32,
        sample_index: u64,
        threshold_multiplier: f32,
        refractory_samples: u64,
        min_absolute_floor: f32,
    ) -> OnsetResult {
        let vu_delta = (rms - self.prev_rms).max(0.0);
        self.prev_rms = rms;

        self.vu_baseline += self.baseline_alpha * (vu_delta - self.vu_baseline);
        self.vu_baseline = self.vu_baseline.max(self.baseline_min);
        self.flux_baseline += self.baseline_alpha * (spectral_flux - self.flux_baseline);
        self.flux_baseline = self.flux_baseline.max(self.baseline_min);

        let vu_norm = (vu_delta / self.vu_baseline).clamp(0.0, self.flux_max);
        let flux_norm = (spectral_flux / self.flux_baseline).clamp(0.0, self.flux_max);
        let combined = (0.5 * vu_norm + 0.5 * flux_norm).clamp(0.0, self.flux_max);

        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(combined);

        let threshold = adaptive_threshold(&self.history, self.adaptive_threshold_sensitivity);
        // Peak-picking per spec: flux > prev > prev_prev.
        let is_peak = combined > self.prev_combined && self.prev_combined > self.prev_prev_combined;

        let refractory_ok = match self.last_onset_sample {
            None => true,
            Some(last) => sample_index.saturating_sub(last) >= refractory_samples,
        };

        let is_onset = combined > threshold * threshold_multiplier
            && is_peak
            && refractory_ok
            && combined > min_absolute_floor;

        self.prev_prev_combined = self.prev_combined;
        self.prev_combined = combined;

        if is_onset {
            self.last_onset_sample = Some(sample_index);
        }

        let onset_strength = if threshold > 1e-9 {
            (combined / threshold).clamp(0.0, 5.0)
        } else {
            0.0
        };

        OnsetResult {
            combined_flux: combined,
            is_onset,
            onset_strength,
        }
    }

    pub fn last_onset_sample(&self) -> Option<u64> {
        self.last_onset_sample
    }
}

/// median(history) + sensitivity*std(history). Sensitivity defaults to 1.5
/// per the spec's worked example but is configurable as
/// `adaptiveThresholdSensitivity`.
fn adaptive_threshold(history: &VecDeque<f32>, sensitivity: f32) -> f32 {
    if history.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f32> = history.iter().copied().collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };
    let mean: f32 = sorted.iter().sum::<f32>() / sorted.len() as f32;
    let variance: f32 = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / sorted.len() as f32;
    median + sensitivity * variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_hop_never_declares_onset() {
        let mut onset = OnsetState::new(0.22, 1e-3, 10.0, 1.5);
        let r = onset.update(0.5, 0.5, 256, 1.0, 12_800, 0.01);
        assert!(!r.is_onset);
    }

    #[test]
    fn silence_never_declares_onset() {
        let mut onset = OnsetState::new(0.22, 1e-3, 10.0, 1.5);
        for i in 0..100u64 {
            let r = onset.update(0.0, 0.0, i * 256, 1.0, 12_800, 0.01);
            assert!(!r.is_onset);
        }
    }

    #[test]
    fn refractory_period_blocks_rapid_repeat_onsets() {
        let mut onset = OnsetState::new(0.22, 1e-3, 10.0, 1.5);
        // Warm up the baseline on a quiet floor, then two sharp spikes close together.
        for i in 0..20u64 {
            onset.update(0.01, 0.01, i * 256, 1.0, 3200, 0.001);
        }
        let first = onset.update(1.0, 1.0, 20 * 256, 1.0, 3200, 0.001);
        let second = onset.update(1.0, 1.0, 21 * 256, 1.0, 3200, 0.001);
        if first.is_onset {
            assert!(!second.is_onset, "refractory should suppress immediate repeat");
        }
    }

    #[test]
    fn onset_strength_is_clamped_to_five() {
        let mut onset = OnsetState::new(0.22, 1e-3, 10.0, 1.5);
        for i in 0..20u64 {
            onset.update(0.01, 0.01, i * 256, 1.0, 3200, 0.001);
        }
        let r = onset.update(5.0, 5.0, 20 * 256, 1.0, 3200, 0.001);
        assert!(r.onset_strength <= 5.0);
    }
}
