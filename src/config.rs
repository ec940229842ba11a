//! Configuration for the audio/tempo core.
//!
//! Mirrors the knob table in spec §6: one sub-struct per pipeline stage,
//! loaded once at startup and treated as read-only thereafter (spec §5).
//! JSON loading follows the same fall-back-to-defaults policy as the
//! teacher's `AppConfig::load_from_file`: a missing or malformed file never
//! aborts startup, it just logs and falls back.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub hop_size: usize,
    pub sample_rate_hz: u32,
    /// capture_hop() gives up after this many hop durations (spec §4.1: 2x).
    pub dma_timeout_hops: f32,
    pub pre_amp: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            hop_size: 256,
            sample_rate_hz: 16_000,
            dma_timeout_hops: 2.0,
            pre_amp: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingConfig {
    /// Must be >= the largest Goertzel window and a power of two.
    pub capacity: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self { capacity: 2048 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoertzelConfig {
    pub rhythm_bins: usize,
    pub harmony_bins: usize,
    /// Harmony bank runs once every N hops (spec §4.3: "every 2nd hop").
    pub harmony_hop_divisor: u32,
    pub rhythm_min_hz: f32,
    pub rhythm_max_hz: f32,
    pub harmony_min_hz: f32,
    pub harmony_max_hz: f32,
    /// Per-hop compute ceiling before the harmony tick is dropped (spec §4.3).
    pub overload_ceiling_us: u64,
}

impl Default for GoertzelConfig {
    fn default() -> Self {
        Self {
            rhythm_bins: 24,
            harmony_bins: 64,
            harmony_hop_divisor: 2,
            rhythm_min_hz: 60.0,
            rhythm_max_hz: 600.0,
            harmony_min_hz: 55.0,
            harmony_max_hz: 4200.0,
            overload_ceiling_us: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseFloorConfig {
    pub time_constant_s: f32,
    pub epsilon: f32,
    pub above_floor_multiplier: f32,
}

impl Default for NoiseFloorConfig {
    fn default() -> Self {
        Self {
            time_constant_s: 1.0,
            epsilon: 1e-6,
            above_floor_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgcConfig {
    pub attack_s: f32,
    pub release_s: f32,
    pub target_rms: f32,
}

impl Default for AgcConfig {
    fn default() -> Self {
        Self {
            attack_s: 0.010,
            release_s: 0.5,
            target_rms: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlBusConfig {
    pub attack: f32,
    pub release: f32,
    pub drive_release: f32,
    pub punch_release: f32,
}

impl Default for ControlBusConfig {
    fn default() -> Self {
        Self {
            attack: 0.3,
            release: 0.85,
            drive_release: 0.9,
            punch_release: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoConfig {
    pub min_bpm: f32,
    pub max_bpm: f32,
    pub refractory_ms: f32,
    pub onset_thresh_k: f32,
    pub adaptive_threshold_sensitivity: f32,
    pub bpm_alpha_attack: f32,
    pub bpm_alpha_release: f32,
    pub pll_kp: f32,
    pub pll_ki: f32,
    pub pll_max_phase_correction: f32,
    pub pll_max_tempo_correction: f32,
    pub pll_max_integral: f32,
    pub density_decay: f32,
    pub kernel_width: usize,
    pub octave_variant_weight: f32,
    pub octave_voting_conf_threshold: f32,
    pub lock_threshold: f32,
    pub low_conf_threshold: f32,
    pub low_conf_reset_time_s: f32,
    pub density_soft_reset_factor: f32,
    pub interval_mismatch_threshold_bpm: f32,
    pub interval_mismatch_count: u32,
    pub flux_normalized_max: f32,
    pub onset_baseline_alpha: f32,
    pub onset_baseline_min: f32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            min_bpm: 60.0,
            max_bpm: 300.0,
            refractory_ms: 200.0,
            onset_thresh_k: 1.8,
            adaptive_threshold_sensitivity: 1.5,
            bpm_alpha_attack: 0.15,
            bpm_alpha_release: 0.05,
            pll_kp: 0.1,
            pll_ki: 0.01,
            pll_max_phase_correction: 0.1,
            pll_max_tempo_correction: 5.0,
            pll_max_integral: 2.0,
            density_decay: 0.995,
            kernel_width: 2,
            octave_variant_weight: 0.5,
            octave_voting_conf_threshold: 0.3,
            lock_threshold: 0.5,
            low_conf_threshold: 0.15,
            low_conf_reset_time_s: 8.0,
            density_soft_reset_factor: 0.3,
            interval_mismatch_threshold_bpm: 10.0,
            interval_mismatch_count: 5,
            flux_normalized_max: 10.0,
            onset_baseline_alpha: 0.22,
            onset_baseline_min: 1e-3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleConfig {
    pub style_alpha: f32,
    pub style_hysteresis: f32,
    pub min_hops_for_classification: u32,
    pub analysis_window_hops: u32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            style_alpha: 0.1,
            style_hysteresis: 0.15,
            min_hops_for_classification: 120,
            analysis_window_hops: 600,
        }
    }
}

/// Top-level configuration composed of one sub-config per pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CoreConfig {
    pub capture: CaptureConfig,
    pub ring: RingConfig,
    pub goertzel: GoertzelConfig,
    pub noise_floor: NoiseFloorConfig,
    pub agc: AgcConfig,
    pub control_bus: ControlBusConfig,
    pub tempo: TempoConfig,
    pub style: StyleConfig,
}

impl CoreConfig {
    /// Load from an explicit JSON path. Falls back to defaults (with a
    /// logged warning) on any read/parse failure rather than propagating,
    /// matching the teacher's `AppConfig::load_from_file`.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match Self::try_load_from_file(&path) {
            Ok(config) => {
                log::info!("[config] loaded {:?}", path.as_ref());
                config
            }
            Err(err) => {
                log::warn!("[config] {err}, using defaults");
                Self::default()
            }
        }
    }

    /// Same as `load_from_file` but returns the error instead of silently
    /// falling back, for callers (tests, the CLI) that want to inspect it.
    pub fn try_load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFailed {
            path: path.as_ref().display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&contents).map_err(|e| ConfigError::ParseFailed {
            path: path.as_ref().display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Desktop default lookup path; defaults if absent.
    pub fn load() -> Self {
        Self::load_from_file("assets/cadence_config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.capture.hop_size, 256);
        assert_eq!(cfg.capture.sample_rate_hz, 16_000);
        assert_eq!(cfg.ring.capacity, 2048);
        assert_eq!(cfg.goertzel.rhythm_bins, 24);
        assert_eq!(cfg.goertzel.harmony_bins, 64);
        assert_eq!(cfg.tempo.min_bpm, 60.0);
        assert_eq!(cfg.tempo.max_bpm, 300.0);
        assert_eq!(cfg.tempo.refractory_ms, 200.0);
        assert_eq!(cfg.style.min_hops_for_classification, 120);
        assert_eq!(cfg.style.analysis_window_hops, 600);
    }

    #[test]
    fn json_roundtrip() {
        let cfg = CoreConfig::default();
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        let parsed: CoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, parsed);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = CoreConfig::load_from_file("/nonexistent/path/cadence.json");
        assert_eq!(cfg, CoreConfig::default());
    }

    #[test]
    fn malformed_json_returns_error_via_try_load() {
        let dir = std::env::temp_dir().join("cadence_core_test_config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let result = CoreConfig::try_load_from_file(&path);
        assert!(matches!(result, Err(ConfigError::ParseFailed { .. })));
    }

    #[test]
    fn ring_capacity_covers_largest_goertzel_window() {
        // The largest rhythm/harmony window must never exceed ring capacity;
        // this is the invariant enforced at construction time in goertzel.rs.
        let cfg = CoreConfig::default();
        assert!(cfg.ring.capacity >= 2048);
    }
}
