//! Rolling style classifier (spec §4.10). Decoupled from the tempo
//! tracker: it only reads already-published features, never gates onset
//! sensitivity (spec §9 design note).

use serde::{Deserialize, Serialize};

use crate::config::StyleConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StyleClass {
    Unknown,
    Rhythmic,
    Harmonic,
    Melodic,
    Texture,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleClassification {
    pub dominant: StyleClass,
    pub weights: [f32; 5],
    pub confidence: f32,
    pub frames_analysed: u64,
}

struct RunningStats {
    rms_min: f32,
    rms_max: f32,
    flux_sum: f32,
    flux_sq_sum: f32,
    conf_sum: f32,
    conf_sq_sum: f32,
    band_sums: [f32; 8],
    chord_changes: f32,
    prev_dominant_chroma_class: Option<usize>,
    n: f32,
}

impl RunningStats {
    fn new() -> Self {
        Self {
            rms_min: f32::MAX,
            rms_max: f32::MIN,
            flux_sum: 0.0,
            flux_sq_sum: 0.0,
            conf_sum: 0.0,
            conf_sq_sum: 0.0,
            band_sums: [0.0; 8],
            chord_changes: 0.0,
            prev_dominant_chroma_class: None,
            n: 0.0,
        }
    }

    fn decay(&mut self, factor: f32) {
        self.flux_sum *= factor;
        self.flux_sq_sum *= factor;
        self.conf_sum *= factor;
        self.conf_sq_sum *= factor;
        for b in self.band_sums.iter_mut() {
            *b *= factor;
        }
        self.chord_changes *= factor;
        self.n *= factor;
    }

    fn observe(&mut self, rms: f32, flux: f32, beat_confidence: f32, bands: &[f32; 8], chroma: &[f32; 12]) {
        self.rms_min = self.rms_min.min(rms);
        self.rms_max = self.rms_max.max(rms);
        self.flux_sum += flux;
        self.flux_sq_sum += flux * flux;
        self.conf_sum += beat_confidence;
        self.conf_sq_sum += beat_confidence * beat_confidence;
        for (s, &b) in self.band_sums.iter_mut().zip(bands) {
            *s += b;
        }

        let dominant_class = chroma
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i);
        if let (Some(prev), Some(curr)) = (self.prev_dominant_chroma_class, dominant_class) {
            if prev != curr {
                self.chord_changes += 1.0;
            }
        }
        self.prev_dominant_chroma_class = dominant_class;

        self.n += 1.0;
    }
}

/// Accumulates per-hop statistics and derives the five class scores.
pub struct StyleDetector {
    cfg: StyleConfig,
    stats: RunningStats,
    hops: u64,
    hop_rate_hz: f32,
    weights: [f32; 5],
    dominant: StyleClass,
}

impl StyleDetector {
    pub fn new(cfg: StyleConfig, hop_rate_hz: f32) -> Self {
        Self {
            cfg,
            stats: RunningStats::new(),
            hops: 0,
            hop_rate_hz,
            weights: [0.0; 5],
            dominant: StyleClass::Unknown,
        }
    }

    pub fn update(
        &mut self,
        rms: f32,
        flux: f32,
        beat_confidence: f32,
        bands: &[f32; 8],
        chroma: &[f32; 12],
    ) -> StyleClassification {
        self.hops += 1;
        if self.hops as u32 > self.cfg.analysis_window_hops {
            self.stats.decay(0.99);
        }
        self.stats.observe(rms, flux, beat_confidence, bands, chroma);

        if self.hops < self.cfg.min_hops_for_classification as u64 {
            return StyleClassification {
                dominant: StyleClass::Unknown,
                weights: [0.0; 5],
                confidence: 0.0,
                frames_analysed: self.hops,
            };
        }

        let n = self.stats.n.max(1.0);
        let beat_conf_avg = self.stats.conf_sum / n;
        let beat_conf_var = (self.stats.conf_sq_sum / n - beat_conf_avg * beat_conf_avg).max(0.0);
        let flux_mean = self.stats.flux_sum / n;
        let flux_variance = (self.stats.flux_sq_sum / n - flux_mean * flux_mean).max(0.0);
        let dynamic_range = (self.stats.rms_max - self.stats.rms_min).max(0.0);

        let total_band: f32 = self.stats.band_sums.iter().sum::<f32>().max(1e-6);
        let bass_ratio = self.stats.band_sums[0..2].iter().sum::<f32>() / total_band;
        let mid_ratio = self.stats.band_sums[2..5].iter().sum::<f32>() / total_band;
        let treble_ratio = self.stats.band_sums[5..8].iter().sum::<f32>() / total_band;

        let chord_change_rate = self.stats.chord_changes / (n / self.hop_rate_hz).max(1e-3);

        let mut raw = [0.0f32; 5];

        // RHYTHMIC
        if beat_conf_avg > 0.45 {
            raw[0] += 0.5;
        }
        if bass_ratio > 0.35 {
            raw[0] += 0.3;
        }
        if beat_conf_var < 0.1 && beat_conf_avg > 0.3 {
            raw[0] += 0.2;
        }

        // HARMONIC
        if chord_change_rate > 0.5 {
            raw[1] += 0.5;
        }
        if beat_conf_avg < 0.45 {
            raw[1] += 0.2;
        }
        if mid_ratio > 0.4 {
            raw[1] += 0.3;
        }

        // MELODIC
        if treble_ratio > 0.25 {
            raw[2] += 0.5;
        }
        if beat_conf_avg > 0.2 && beat_conf_avg < 0.6 {
            raw[2] += 0.3;
        }
        if bass_ratio < 0.35 {
            raw[2] += 0.2;
        }

        // TEXTURE
        if flux_variance > 0.05 {
            raw[3] += 0.4;
        }
        if beat_conf_avg < 0.2 {
            raw[3] += 0.3;
        }
        raw[3] += (1.0 - (bass_ratio - treble_ratio).abs()).clamp(0.0, 1.0) * 0.3;

        // DYNAMIC
        if dynamic_range > 0.3 {
            raw[4] += 0.6;
        }
        if beat_conf_var > 0.15 {
            raw[4] += 0.2;
        }
        if mid_ratio > 0.5 {
            raw[4] += 0.2;
        }

        for (w, &r) in self.weights.iter_mut().zip(raw.iter()) {
            *w += self.cfg.style_alpha * (r.clamp(0.0, 1.0) - *w);
        }

        self.dominant = pick_dominant(self.dominant, &self.weights, self.cfg.style_hysteresis);
        let confidence = self.weights[class_index(self.dominant)];

        StyleClassification {
            dominant: self.dominant,
            weights: self.weights,
            confidence,
            frames_analysed: self.hops,
        }
    }
}

fn class_index(class: StyleClass) -> usize {
    match class {
        StyleClass::Unknown => 0,
        StyleClass::Rhythmic => 0,
        StyleClass::Harmonic => 1,
        StyleClass::Melodic => 2,
        StyleClass::Texture => 3,
        StyleClass::Dynamic => 4,
    }
}

fn index_class(i: usize) -> StyleClass {
    match i {
        0 => StyleClass::Rhythmic,
        1 => StyleClass::Harmonic,
        2 => StyleClass::Melodic,
        3 => StyleClass::Texture,
        _ => StyleClass::Dynamic,
    }
}

/// Picks the max-scoring class, but keeps the current one unless a rival
/// beats it by more than `hysteresis` (spec §4.10 "prevents flapping").
fn pick_dominant(current: StyleClass, weights: &[f32; 5], hysteresis: f32) -> StyleClass {
    let (best_idx, &best_val) = weights
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .unwrap();
    let best_class = index_class(best_idx);

    if current == StyleClass::Unknown {
        return best_class;
    }
    let current_val = weights[class_index(current)];
    if best_class == current {
        return current;
    }
    if best_val > current_val + hysteresis {
        best_class
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bands_biased_bass() -> [f32; 8] {
        [0.9, 0.8, 0.1, 0.1, 0.1, 0.05, 0.05, 0.05]
    }

    #[test]
    fn stays_unknown_before_min_hops() {
        let mut det = StyleDetector::new(StyleConfig::default(), 62.5);
        let chroma = [0.0; 12];
        let bands = bands_biased_bass();
        let mut last = StyleClass::Unknown;
        for _ in 0..50 {
            last = det.update(0.5, 0.1, 0.5, &bands, &chroma).dominant;
        }
        assert_eq!(last, StyleClass::Unknown);
    }

    #[test]
    fn strong_steady_beat_and_bass_classifies_rhythmic() {
        let mut det = StyleDetector::new(StyleConfig::default(), 62.5);
        let chroma = [0.0; 12];
        let bands = bands_biased_bass();
        let mut result = det.update(0.5, 0.1, 0.6, &bands, &chroma);
        for _ in 0..300 {
            result = det.update(0.5, 0.1, 0.6, &bands, &chroma);
        }
        assert_eq!(result.dominant, StyleClass::Rhythmic);
    }

    #[test]
    fn frames_analysed_tracks_hop_count() {
        let mut det = StyleDetector::new(StyleConfig::default(), 62.5);
        let chroma = [0.0; 12];
        let bands = [0.0; 8];
        let mut last = 0;
        for _ in 0..10 {
            last = det.update(0.0, 0.0, 0.0, &bands, &chroma).frames_analysed;
        }
        assert_eq!(last, 10);
    }

    #[test]
    fn weights_stay_in_unit_range() {
        let mut det = StyleDetector::new(StyleConfig::default(), 62.5);
        let chroma = [0.9, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let bands = [0.5; 8];
        let mut result = det.update(0.5, 0.5, 0.5, &bands, &chroma);
        for _ in 0..500 {
            result = det.update(0.5, 0.5, 0.5, &bands, &chroma);
        }
        for w in result.weights {
            assert!((0.0..=1.0).contains(&w));
        }
    }
}
