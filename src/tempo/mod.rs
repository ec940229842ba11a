//! Tempo tracker: onset detection, interval density voting, the PLL, the
//! five-state lock machine, and confidence (spec §4.9). This is the hardest
//! sub-core and the only one the spec calls out as fully specified end to
//! end; the module split here (onset/density/pll/state) mirrors that
//! three-layer breakdown (§4.9.1).

mod density;
mod onset;
mod pll;
mod state;

pub use density::DensityHistogram;
pub use onset::OnsetState;
pub use pll::Pll;
pub use state::TempoTrackerState;

use crate::config::TempoConfig;
use crate::frame::AudioFeatureFrame;
use crate::telemetry::{self, IntervalRejectReason};

const RECENT_INTERVALS_FOR_CONSISTENCY: usize = 5;

/// Mutable tracker state that survives across hops (spec §3 `BeatState`).
pub struct BeatState {
    pub smoothed_bpm: f32,
    pub raw_bpm: f32,
    pub prev_smoothed_bpm: f32,
    pub phase01: f32,
    pub confidence: f32,
    pub last_update_sample: u64,
    pub last_onset_sample: Option<u64>,
    pub period_ema_s: f32,
    pub last_tick_sample: Option<u64>,
    pub low_conf_since_sample: Option<u64>,
    pub interval_mismatch_run: u32,
    pub hops_since_start: u64,
    pub last_phase_error: f32,
    pub last_onset_strength: f32,
}

impl BeatState {
    fn new(initial_bpm: f32) -> Self {
        Self {
            smoothed_bpm: initial_bpm,
            raw_bpm: initial_bpm,
            prev_smoothed_bpm: initial_bpm,
            phase01: 0.0,
            confidence: 0.0,
            last_update_sample: 0,
            last_onset_sample: None,
            period_ema_s: 60.0 / initial_bpm,
            last_tick_sample: None,
            low_conf_since_sample: None,
            interval_mismatch_run: 0,
            hops_since_start: 0,
            last_phase_error: 0.0,
            last_onset_strength: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoOutput {
    pub bpm_smoothed: f32,
    pub confidence: f32,
    pub beat_phase01: f32,
    pub beat_tick: bool,
    pub beat_detected: bool,
    pub state: TempoTrackerState,
}

pub struct TempoTracker {
    cfg: TempoConfig,
    sample_rate_hz: u32,
    onset: OnsetState,
    density: DensityHistogram,
    pll: Pll,
    beat: BeatState,
    state: TempoTrackerState,
}

impl TempoTracker {
    pub fn new(cfg: TempoConfig, sample_rate_hz: u32) -> Self {
        let initial_bpm = (cfg.min_bpm + cfg.max_bpm) / 2.0;
        Self {
            onset: OnsetState::new(cfg.onset_baseline_alpha, cfg.onset_baseline_min, cfg.flux_normalized_max, cfg.adaptive_threshold_sensitivity),
            density: DensityHistogram::new(
                cfg.density_decay,
                cfg.kernel_width,
                cfg.octave_variant_weight,
                cfg.octave_voting_conf_threshold,
            ),
            pll: Pll::new(cfg.pll_kp, cfg.pll_ki, cfg.pll_max_phase_correction, cfg.pll_max_tempo_correction, cfg.pll_max_integral),
            beat: BeatState::new(initial_bpm),
            state: TempoTrackerState::Initializing,
            sample_rate_hz,
            cfg,
        }
    }

    pub fn state(&self) -> TempoTrackerState {
        self.state
    }

    pub fn confidence(&self) -> f32 {
        self.beat.confidence
    }

    /// Strength of the most recent onset this tracker has seen, clamped to
    /// [0, 5] (spec §4.9.2). Zero before the first onset.
    pub fn last_onset_strength(&self) -> f32 {
        self.beat.last_onset_strength
    }

    /// Modern entry point (spec §9 open question (a): the legacy
    /// band-array overload is a compatibility shim, dropped here).
    pub fn update(&mut self, frame: &AudioFeatureFrame, sample_index: u64) -> TempoOutput {
        let dt_s = 1.0 / (self.sample_rate_hz as f32 / self.hop_size_hint());
        self.beat.hops_since_start += 1;

        let refractory_samples =
            (self.cfg.refractory_ms / 1000.0 * self.sample_rate_hz as f32) as u64;
        let threshold_multiplier = self.cfg.onset_thresh_k * self.state.onset_threshold_multiplier();
        let onset_result = self.onset.update(
            frame.rms,
            frame.rhythm_novelty,
            sample_index,
            threshold_multiplier,
            refractory_samples,
            1e-4,
        );

        if onset_result.is_onset {
            self.beat.last_onset_strength = onset_result.onset_strength;
            self.handle_onset(sample_index, onset_result.onset_strength);
        }

        self.density.decay_tick(dt_s);

        let peak = self.density.peak();
        if peak.peak_value > 0.0 {
            self.beat.raw_bpm = peak.peak_bpm;
        }

        let alpha = if self.state.uses_attack_alpha() {
            self.cfg.bpm_alpha_attack
        } else {
            self.cfg.bpm_alpha_release
        };
        self.beat.prev_smoothed_bpm = self.beat.smoothed_bpm;
        self.beat.smoothed_bpm += alpha * (self.beat.raw_bpm - self.beat.smoothed_bpm);
        self.beat.smoothed_bpm = self.beat.smoothed_bpm.clamp(self.cfg.min_bpm, self.cfg.max_bpm);
        telemetry::hub().observe_bpm(self.beat.smoothed_bpm);

        let beat_tick = self.advance_phase(dt_s, sample_index);

        self.update_confidence(peak.peak_value, sample_index);
        self.run_safety_nets(peak.peak_bpm, sample_index);

        let prev_state = self.state;
        let was_locked = prev_state == TempoTrackerState::Locked;
        self.state = self.state.next(self.beat.confidence, self.beat.hops_since_start, was_locked);
        if self.state != prev_state {
            telemetry::hub().record_state_transition(prev_state, self.state, sample_index);
        }

        let beat_detected = beat_tick && self.state == TempoTrackerState::Locked;

        TempoOutput {
            bpm_smoothed: self.beat.smoothed_bpm,
            confidence: self.beat.confidence,
            beat_phase01: self.beat.phase01,
            beat_tick,
            beat_detected,
            state: self.state,
        }
    }

    /// Hop size isn't tracked directly by the tracker; callers always run
    /// it once per 256-sample hop, so dt is derived from the configured
    /// sample rate and the spec's fixed hop size.
    fn hop_size_hint(&self) -> f32 {
        256.0
    }

    fn handle_onset(&mut self, sample_index: u64, onset_strength: f32) {
        if let Some(last) = self.beat.last_onset_sample {
            let interval_s = (sample_index - last) as f32 / self.sample_rate_hz as f32;
            let min_interval = 60.0 / self.cfg.max_bpm;
            let max_interval = 60.0 / self.cfg.min_bpm;
            if interval_s < min_interval {
                telemetry::hub().record_interval_rejected(IntervalRejectReason::TooFast, interval_s);
            } else if interval_s > max_interval {
                telemetry::hub().record_interval_rejected(IntervalRejectReason::TooSlow, interval_s);
            } else {
                telemetry::hub().record_interval_accepted();
                self.beat.period_ema_s += 0.2 * (interval_s - self.beat.period_ema_s);

                let implied_bpm = 60.0 / interval_s;
                let peak_bpm_before = self.density.peak().peak_bpm;
                if (implied_bpm - peak_bpm_before).abs() > self.cfg.interval_mismatch_threshold_bpm {
                    self.beat.interval_mismatch_run += 1;
                } else {
                    self.beat.interval_mismatch_run = 0;
                }

                self.density.vote(interval_s, onset_strength, self.beat.confidence);

                let onset_time_s = sample_index as f64 / self.sample_rate_hz as f64;
                let predicted_beat_time_s =
                    onset_time_s - (self.beat.phase01 as f64) * self.beat.period_ema_s as f64;
                let correction = self.pll.correct(onset_time_s, predicted_beat_time_s, self.beat.period_ema_s);
                self.beat.last_phase_error = correction.phase_error;
                self.beat.phase01 = wrap01(self.beat.phase01 + correction.phase_correction);
                self.beat.smoothed_bpm =
                    (self.beat.smoothed_bpm + correction.tempo_correction_bpm).clamp(self.cfg.min_bpm, self.cfg.max_bpm);
            }
        }
        telemetry::hub().record_onset();
        self.beat.last_onset_sample = Some(sample_index);
        self.beat.last_update_sample = sample_index;
    }

    fn advance_phase(&mut self, dt_s: f32, sample_index: u64) -> bool {
        let prev_phase = self.beat.phase01;
        self.beat.phase01 += (self.beat.smoothed_bpm / 60.0) * dt_s;
        let wrapped = self.beat.phase01 >= 1.0;
        if wrapped {
            self.beat.phase01 -= self.beat.phase01.floor();
        }

        let period_samples = (self.sample_rate_hz as f32 * 60.0 / self.beat.smoothed_bpm.max(1.0)) as u64;
        let debounce_samples = (period_samples as f32 * 0.6) as u64;

        let crossed_wrap_window = prev_phase > 0.9 && self.beat.phase01 < 0.1;
        if crossed_wrap_window {
            let debounce_ok = match self.beat.last_tick_sample {
                None => true,
                Some(last) => sample_index.saturating_sub(last) >= debounce_samples,
            };
            if debounce_ok {
                self.beat.last_tick_sample = Some(sample_index);
                return true;
            }
        }
        false
    }

    fn update_confidence(&mut self, votes_in_winner_bin: f32, sample_index: u64) {
        let onset_strength_factor = self.beat.last_onset_strength.clamp(0.0, 2.0);

        let recent_bpms = self.density_recent_bpms();
        let tempo_consistency = if recent_bpms.len() >= 2 {
            let mean: f32 = recent_bpms.iter().sum::<f32>() / recent_bpms.len() as f32;
            let variance: f32 =
                recent_bpms.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / recent_bpms.len() as f32;
            let cov = if mean > 1e-6 { variance.sqrt() / mean } else { 1.0 };
            1.0 - cov.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let stability = (votes_in_winner_bin / 100.0).clamp(0.0, 1.0);
        let phase_coherence = (1.0 - self.beat.last_phase_error.abs() * 2.0).clamp(0.0, 1.0);

        let raw = 0.4 * onset_strength_factor + 0.3 * tempo_consistency + 0.2 * stability + 0.1 * phase_coherence;

        let conf_rise = self.cfg_conf_rise();
        let conf_fall_per_s = self.cfg_conf_fall_per_s();
        let dt_s = 1.0 / (self.sample_rate_hz as f32 / self.hop_size_hint());

        let pre_ema = if raw > self.beat.confidence {
            (self.beat.confidence + conf_rise).min(raw)
        } else {
            (self.beat.confidence - conf_fall_per_s * dt_s).max(raw).max(0.0)
        };

        self.beat.confidence += 0.2 * (pre_ema - self.beat.confidence);
        self.beat.confidence = self.beat.confidence.clamp(0.0, 1.0);
        telemetry::hub().observe_phase_ms((self.beat.last_phase_error * self.beat.period_ema_s * 1000.0).abs());

        if self.beat.confidence < self.cfg.low_conf_threshold {
            if self.beat.low_conf_since_sample.is_none() {
                self.beat.low_conf_since_sample = Some(sample_index);
            }
        } else {
            self.beat.low_conf_since_sample = None;
        }
    }

    fn cfg_conf_rise(&self) -> f32 {
        0.1
    }

    fn cfg_conf_fall_per_s(&self) -> f32 {
        0.2
    }

    fn density_recent_bpms(&self) -> Vec<f32> {
        let mut v = self.density.recent_intervals_bpm();
        if v.len() > RECENT_INTERVALS_FOR_CONSISTENCY {
            let drop = v.len() - RECENT_INTERVALS_FOR_CONSISTENCY;
            v.drain(0..drop);
        }
        v
    }

    fn run_safety_nets(&mut self, peak_bpm: f32, sample_index: u64) {
        if let Some(since) = self.beat.low_conf_since_sample {
            let elapsed_s = (sample_index.saturating_sub(since)) as f32 / self.sample_rate_hz as f32;
            if elapsed_s >= self.cfg.low_conf_reset_time_s {
                self.density.scale(self.cfg.density_soft_reset_factor);
                self.density.clear_intervals();
                self.beat.low_conf_since_sample = None;
                telemetry::hub().record_soft_reset(sample_index);
            }
        }

        if self.beat.interval_mismatch_run >= self.cfg.interval_mismatch_count {
            self.density.scale(0.0);
            self.density.clear_intervals();
            self.beat.interval_mismatch_run = 0;
        }

        let prev_stable = self.beat.prev_smoothed_bpm.max(1.0);
        let ratio = peak_bpm / prev_stable;
        if (0.55..=1.8).contains(&ratio) && !(0.9..=1.1).contains(&ratio) {
            telemetry::hub().record_octave_flip(prev_stable, peak_bpm, sample_index);
        }
    }
}

fn wrap01(x: f32) -> f32 {
    let mut v = x;
    while v >= 1.0 {
        v -= 1.0;
    }
    while v < 0.0 {
        v += 1.0;
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::AudioTime;

    fn click_frame(sample_index: u64, onset: bool, rms: f32, novelty: f32) -> AudioFeatureFrame {
        let mut f = AudioFeatureFrame::silent(AudioTime::new(sample_index, 16_000, 0));
        f.rms = rms;
        f.rhythm_novelty = novelty;
        f.onset_flag = onset;
        f
    }

    #[test]
    fn silence_never_raises_confidence_above_threshold() {
        let mut tracker = TempoTracker::new(TempoConfig::default(), 16_000);
        let mut sample_index = 0u64;
        for _ in 0..2000 {
            let frame = click_frame(sample_index, false, 0.0, 0.0);
            let out = tracker.update(&frame, sample_index);
            assert!(out.confidence < 0.2, "confidence={}", out.confidence);
            sample_index += 256;
        }
    }

    #[test]
    fn click_train_increases_confidence_over_time() {
        let mut tracker = TempoTracker::new(TempoConfig::default(), 16_000);
        let bpm = 120.0;
        let period_samples = (16_000.0 * 60.0 / bpm) as u64;
        let mut sample_index = 0u64;
        let mut last_conf = 0.0;
        for hop in 0..3000u64 {
            sample_index = hop * 256;
            let is_click = sample_index % period_samples < 256;
            let frame = click_frame(sample_index, is_click, if is_click { 0.8 } else { 0.0 }, if is_click { 3.0 } else { 0.05 });
            let out = tracker.update(&frame, sample_index);
            last_conf = out.confidence;
        }
        assert!(last_conf > 0.1, "confidence={}", last_conf);
    }

    #[test]
    fn state_starts_initializing() {
        let tracker = TempoTracker::new(TempoConfig::default(), 16_000);
        assert_eq!(tracker.state(), TempoTrackerState::Initializing);
    }

    #[test]
    fn bpm_stays_within_configured_bounds() {
        let cfg = TempoConfig::default();
        let (min, max) = (cfg.min_bpm, cfg.max_bpm);
        let mut tracker = TempoTracker::new(cfg, 16_000);
        let mut sample_index = 0u64;
        for hop in 0..1000u64 {
            sample_index = hop * 256;
            let frame = click_frame(sample_index, hop % 10 == 0, 0.5, 2.0);
            let out = tracker.update(&frame, sample_index);
            assert!(out.bpm_smoothed >= min && out.bpm_smoothed <= max);
        }
    }
}
