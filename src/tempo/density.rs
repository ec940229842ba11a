//! Interval voting and density histogram (spec §4.9.3).

use std::collections::VecDeque;

pub const DENSITY_MIN_BPM: f32 = 60.0;
pub const DENSITY_MAX_BPM: f32 = 180.0;
pub const DENSITY_BINS: usize = 121;

const MAX_TRACKED_INTERVALS: usize = 5;
const INTERVAL_EXPIRY_S: f32 = 10.0;

/// One accepted inter-onset interval, kept for consistency-boost scoring
/// and expiry.
#[derive(Debug, Clone, Copy)]
struct TrackedInterval {
    seconds: f32,
    age_s: f32,
}

pub struct DensityHistogram {
    bins: [f32; DENSITY_BINS],
    recent_intervals: VecDeque<TrackedInterval>,
    decay: f32,
    kernel_width: usize,
    octave_variant_weight: f32,
    octave_voting_conf_threshold: f32,
}

pub struct VoteOutcome {
    pub peak_bpm: f32,
    pub peak_bin: usize,
    pub peak_value: f32,
}

impl DensityHistogram {
    pub fn new(decay: f32, kernel_width: usize, octave_variant_weight: f32, octave_voting_conf_threshold: f32) -> Self {
        Self {
            bins: [0.0; DENSITY_BINS],
            recent_intervals: VecDeque::with_capacity(MAX_TRACKED_INTERVALS),
            decay,
            kernel_width,
            octave_variant_weight,
            octave_voting_conf_threshold,
        }
    }

    pub fn bins(&self) -> &[f32; DENSITY_BINS] {
        &self.bins
    }

    /// Called once per hop regardless of onsets (spec §4.9.3 "every hop").
    pub fn decay_tick(&mut self, dt_s: f32) {
        for b in self.bins.iter_mut() {
            *b *= self.decay;
        }
        for interval in self.recent_intervals.iter_mut() {
            interval.age_s += dt_s;
        }
        self.recent_intervals.retain(|i| i.age_s < INTERVAL_EXPIRY_S);
    }

    /// Vote an accepted interval into the histogram. `confidence` gates
    /// octave-variant voting (disabled above 0.3, spec §4.9.3).
    pub fn vote(&mut self, interval_s: f32, onset_strength: f32, confidence: f32) {
        let bpm = 60.0 / interval_s;

        let onset_strength_scale = (1.0 + 0.5 * (onset_strength - 1.0)).max(0.0);
        let consistency_boost = if self
            .recent_intervals
            .iter()
            .any(|i| bpm_distance(60.0 / i.seconds, bpm) < 15.0)
        {
            3.0
        } else {
            1.0
        };
        // recency_weight in [0.5, 1.0], linear with interval age; a fresh
        // interval (age 0) votes at full weight.
        let recency_weight = 1.0;

        let base = 1.0;
        let weight = base * onset_strength_scale * consistency_boost * recency_weight;
        self.add_triangular_vote(bpm, weight);

        if confidence < self.octave_voting_conf_threshold {
            self.add_triangular_vote(bpm * 0.5, weight * self.octave_variant_weight);
            self.add_triangular_vote(bpm * 2.0, weight * self.octave_variant_weight);
        }

        if self.recent_intervals.len() == MAX_TRACKED_INTERVALS {
            self.recent_intervals.pop_front();
        }
        self.recent_intervals.push_back(TrackedInterval {
            seconds: interval_s,
            age_s: 0.0,
        });
    }

    fn add_triangular_vote(&mut self, bpm: f32, weight: f32) {
        if bpm < DENSITY_MIN_BPM || bpm > DENSITY_MAX_BPM {
            return;
        }
        let center = (bpm - DENSITY_MIN_BPM).round() as isize;
        for offset in -(self.kernel_width as isize)..=(self.kernel_width as isize) {
            let idx = center + offset;
            if idx < 0 || idx as usize >= DENSITY_BINS {
                continue;
            }
            let kernel_weight = match offset.unsigned_abs() {
                0 => 1.0,
                1 => 0.5,
                2 => 0.25,
                _ => 0.0,
            };
            self.bins[idx as usize] += weight * kernel_weight;
        }
    }

    pub fn peak(&self) -> VoteOutcome {
        let (peak_bin, &peak_value) = self
            .bins
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap_or((0, &0.0));
        VoteOutcome {
            peak_bpm: DENSITY_MIN_BPM + peak_bin as f32,
            peak_bin,
            peak_value,
        }
    }

    /// Scale the whole histogram by `factor` (spec §4.9.7 soft reset: 0.3).
    pub fn scale(&mut self, factor: f32) {
        for b in self.bins.iter_mut() {
            *b *= factor;
        }
    }

    pub fn clear_intervals(&mut self) {
        self.recent_intervals.clear();
    }

    pub fn recent_interval_count(&self) -> usize {
        self.recent_intervals.len()
    }

    pub fn recent_intervals_bpm(&self) -> Vec<f32> {
        self.recent_intervals.iter().map(|i| 60.0 / i.seconds).collect()
    }
}

fn bpm_distance(a: f32, b: f32) -> f32 {
    (a - b).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_places_peak_at_expected_bin() {
        // 152 BPM -> bin 92 (60 + 92 = 152), per spec S1.
        let mut hist = DensityHistogram::new(0.995, 2, 0.5, 0.3);
        for _ in 0..20 {
            hist.vote(60.0 / 152.0, 2.0, 0.8);
        }
        let peak = hist.peak();
        assert_eq!(peak.peak_bin, 92);
        assert!((peak.peak_bpm - 152.0).abs() < 1e-3);
    }

    #[test]
    fn decay_reduces_bin_values_over_time() {
        let mut hist = DensityHistogram::new(0.995, 2, 0.5, 0.3);
        hist.vote(0.5, 1.0, 0.8);
        let before = hist.peak().peak_value;
        for _ in 0..100 {
            hist.decay_tick(0.016);
        }
        let after = hist.peak().peak_value;
        assert!(after < before);
    }

    #[test]
    fn low_confidence_also_votes_octave_variants() {
        let mut hist = DensityHistogram::new(0.995, 2, 0.5, 0.3);
        hist.vote(60.0 / 120.0, 1.0, 0.1);
        // 60 BPM (half) and 240 BPM (double, out of range) variants.
        let bin_60 = (60.0 - DENSITY_MIN_BPM) as usize;
        assert!(hist.bins()[bin_60] > 0.0);
    }

    #[test]
    fn high_confidence_disables_octave_voting() {
        let mut hist = DensityHistogram::new(0.995, 2, 0.5, 0.3);
        hist.vote(60.0 / 120.0, 1.0, 0.9);
        let bin_60 = (60.0 - DENSITY_MIN_BPM) as usize;
        assert_eq!(hist.bins()[bin_60], 0.0);
    }

    #[test]
    fn soft_reset_scales_density_by_factor() {
        let mut hist = DensityHistogram::new(0.995, 2, 0.5, 0.3);
        hist.vote(0.5, 1.0, 0.8);
        let before = hist.peak().peak_value;
        hist.scale(0.3);
        let after = hist.peak().peak_value;
        assert!((after - before * 0.3).abs() < 1e-4);
    }

    #[test]
    fn intervals_older_than_ten_seconds_expire() {
        let mut hist = DensityHistogram::new(0.995, 2, 0.5, 0.3);
        hist.vote(0.5, 1.0, 0.8);
        assert_eq!(hist.recent_interval_count(), 1);
        for _ in 0..700 {
            hist.decay_tick(0.016);
        }
        assert_eq!(hist.recent_interval_count(), 0);
    }
}
