//! Black-box checks for the always-true invariants the published
//! `ControlBusFrame` must satisfy regardless of what's playing (spec §8
//! properties P1-P3), run against a synthetic click train so there's
//! nontrivial energy flowing through every stage.

#![cfg(feature = "fixtures")]

use cadence_core::capture::{SyntheticCapture, SyntheticSignal};
use cadence_core::config::CoreConfig;
use cadence_core::engine::AudioCore;

fn click_core() -> AudioCore {
    let cfg = CoreConfig::default();
    let capture = Box::new(SyntheticCapture::new(
        SyntheticSignal::ClickTrain { bpm: 128.0, click_duration_s: 0.01 },
        cfg.capture.sample_rate_hz,
        7,
    ));
    AudioCore::new(cfg, capture).unwrap()
}

#[test]
fn sample_index_advances_by_exactly_one_hop_per_call() {
    let mut core = click_core();
    let hop_size = 256u64;
    let mut previous = core.sample_index();
    for _ in 0..500 {
        core.process_hop().unwrap();
        let current = core.sample_index();
        assert_eq!(current - previous, hop_size);
        previous = current;
    }
}

#[test]
fn published_frame_fields_stay_finite_and_in_unit_range() {
    let mut core = click_core();
    for _ in 0..1000 {
        let Some((frame, _)) = core.process_hop().unwrap() else { continue };

        assert!(frame.rms.is_finite() && (0.0..=1.0).contains(&frame.rms));
        assert!(frame.flux.is_finite() && (0.0..=1.0).contains(&frame.flux));
        assert!(frame.drive.is_finite() && (0.0..=1.0).contains(&frame.drive));
        assert!(frame.punch.is_finite() && (0.0..=1.0).contains(&frame.punch));
        assert!(frame.beat_strength.is_finite() && (0.0..=1.0).contains(&frame.beat_strength));
        for &b in frame.bands.iter() {
            assert!(b.is_finite() && (0.0..=1.0).contains(&b), "band out of range: {b}");
        }
        for &c in frame.chroma.iter() {
            assert!(c.is_finite() && (0.0..=1.0).contains(&c), "chroma out of range: {c}");
        }
    }
}

#[test]
fn chroma_vector_never_exceeds_its_normalisation_bound() {
    let mut core = click_core();
    for _ in 0..500 {
        let Some((frame, _)) = core.process_hop().unwrap() else { continue };
        let sum: f32 = frame.chroma.iter().sum();
        let max = frame.chroma.iter().cloned().fold(0.0f32, f32::max);
        assert!(sum <= 12.0 + 1e-3, "chroma sum {sum} exceeds 12");
        assert!(max <= 1.0 + 1e-6, "chroma max {max} exceeds 1");
    }
}
