//! T3 (silence safety): ten seconds of pure silence must never report
//! meaningful tempo confidence or a beat tick, and the control bus's drive
//! envelope must settle to (near) zero.

#![cfg(feature = "fixtures")]

use cadence_core::capture::{SyntheticCapture, SyntheticSignal};
use cadence_core::config::CoreConfig;
use cadence_core::engine::AudioCore;

#[test]
fn ten_seconds_of_silence_never_raises_confidence_or_ticks_a_beat() {
    let cfg = CoreConfig::default();
    let sample_rate_hz = cfg.capture.sample_rate_hz;
    let hop_size = cfg.capture.hop_size;
    let capture = Box::new(SyntheticCapture::new(SyntheticSignal::Silence, sample_rate_hz, 1));
    let mut core = AudioCore::new(cfg, capture).unwrap();

    let hops_for_10s = (sample_rate_hz as usize * 10) / hop_size;
    let mut last_drive = 1.0f32;

    for i in 0..hops_for_10s {
        let Some((frame, hop)) = core.process_hop().unwrap() else { continue };
        assert!(hop.tempo.confidence < 0.1, "confidence {} at hop {i} exceeds silence bound", hop.tempo.confidence);
        assert!(!hop.tempo.beat_tick, "beat ticked on silence at hop {i}");
        assert!(!frame.beat_detected, "beat_detected set on silence at hop {i}");
        last_drive = frame.drive;
    }

    assert!(last_drive < 0.02, "drive did not settle near zero: {last_drive}");
}
