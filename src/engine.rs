//! `AudioCore`: the single audio-task aggregate driving every stage once
//! per hop in the exact order of spec §2. Everything here is confined to
//! one task (spec §5 "per-task confinement") — no mutex appears anywhere
//! below the snapshot publish at the very end.

use std::time::Instant;

use crate::agc::Agc;
use crate::capture::{Capture, CaptureOutcome};
use crate::chroma::ChromaExtractor;
use crate::config::CoreConfig;
use crate::control_bus::{ControlBus, ControlBusFrame, RawFrame, BAND_COUNT};
use crate::error::{CaptureError, CoreError, ErrorCode};
use crate::frame::AudioFeatureFrame;
use crate::goertzel::{linear_bin_freqs, semitone_bin_freqs, window_size_for, GoertzelBank, GoertzelBinConfig};
use crate::noise_floor::NoiseFloor;
use crate::novelty::NoveltyTracker;
use crate::ring::SampleRing;
use crate::style::{StyleClassification, StyleDetector};
use crate::tempo::{TempoOutput, TempoTracker};
use crate::telemetry;
use crate::time::AudioTime;
use crate::window::WindowBank;

/// Everything the render/debug side cares about from one hop, beyond the
/// `ControlBusFrame` that goes through the SPSC snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HopOutput {
    pub control: ControlBusFrameView,
    pub tempo: TempoOutput,
    pub style: StyleClassificationView,
}

/// `ControlBusFrame` isn't `Copy` (fixed arrays make it fine actually, but
/// keeping a view type here avoids coupling `HopOutput`'s copy semantics to
/// that struct's field list). Mirrors it field for field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlBusFrameView {
    pub rms: f32,
    pub flux: f32,
    pub drive: f32,
    pub punch: f32,
    pub beat_detected: bool,
    pub beat_strength: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleClassificationView {
    pub dominant: crate::style::StyleClass,
    pub confidence: f32,
}

impl From<&StyleClassification> for StyleClassificationView {
    fn from(s: &StyleClassification) -> Self {
        Self {
            dominant: s.dominant,
            confidence: s.confidence,
        }
    }
}

/// Drives the full pipeline: Capture -> Ring Buffer -> (Rhythm Goertzel,
/// every-other-hop Harmony Goertzel) -> Noise Floor/AGC -> Novelty, Chroma
/// -> Tempo Tracker, Style Detector -> Control Bus -> caller publishes the
/// resulting `ControlBusFrame` to the snapshot.
pub struct AudioCore {
    cfg: CoreConfig,
    capture: Box<dyn Capture>,
    ring: SampleRing,
    windows: WindowBank,
    rhythm_bank: GoertzelBank,
    harmony_bank: GoertzelBank,
    rhythm_floor: NoiseFloor,
    harmony_floor: NoiseFloor,
    agc: Agc,
    novelty: NoveltyTracker,
    chroma: ChromaExtractor,
    control_bus: ControlBus,
    tempo: TempoTracker,
    style: StyleDetector,
    sample_index: u64,
    hop_count: u64,
    last_harmony_mags: Vec<f32>,
    hop_buf: Vec<f32>,
}

impl AudioCore {
    pub fn new(cfg: CoreConfig, capture: Box<dyn Capture>) -> Result<Self, CoreError> {
        let sample_rate_hz = cfg.capture.sample_rate_hz;
        let hop_rate_hz = sample_rate_hz as f32 / cfg.capture.hop_size as f32;

        let ring = SampleRing::new(cfg.ring.capacity)?;

        let rhythm_freqs = linear_bin_freqs(cfg.goertzel.rhythm_min_hz, cfg.goertzel.rhythm_max_hz, cfg.goertzel.rhythm_bins);
        let harmony_freqs = semitone_bin_freqs(cfg.goertzel.harmony_min_hz, cfg.goertzel.harmony_max_hz, cfg.goertzel.harmony_bins);

        let max_window = cfg.ring.capacity;
        let rhythm_bins: Vec<GoertzelBinConfig> = rhythm_freqs
            .iter()
            .map(|&f| GoertzelBinConfig::new(f, window_size_for(f, sample_rate_hz, 4.0, max_window), sample_rate_hz))
            .collect();
        let harmony_bins: Vec<GoertzelBinConfig> = harmony_freqs
            .iter()
            .map(|&f| GoertzelBinConfig::new(f, window_size_for(f, sample_rate_hz, 4.0, max_window), sample_rate_hz))
            .collect();

        let rhythm_bank = GoertzelBank::new(rhythm_bins, sample_rate_hz);
        let harmony_bank = GoertzelBank::new(harmony_bins, sample_rate_hz);

        let rhythm_floor = NoiseFloor::new(
            rhythm_bank.bin_count(),
            cfg.noise_floor.time_constant_s,
            hop_rate_hz,
            cfg.noise_floor.epsilon,
        );
        let harmony_floor = NoiseFloor::new(
            harmony_bank.bin_count(),
            cfg.noise_floor.time_constant_s,
            hop_rate_hz,
            cfg.noise_floor.epsilon,
        );

        let agc = Agc::new(cfg.agc.attack_s, cfg.agc.release_s, cfg.agc.target_rms, hop_rate_hz);
        let novelty = NoveltyTracker::new(rhythm_bank.bin_count());
        let chroma = ChromaExtractor::new(harmony_freqs, hop_rate_hz, 0.5);
        let control_bus = ControlBus::new(
            cfg.control_bus.attack,
            cfg.control_bus.release,
            cfg.control_bus.drive_release,
            cfg.control_bus.punch_release,
        );
        let tempo = TempoTracker::new(cfg.tempo.clone(), sample_rate_hz);
        let style = StyleDetector::new(cfg.style.clone(), hop_rate_hz);

        let harmony_bin_count = harmony_bank.bin_count();
        let hop_size = cfg.capture.hop_size;

        Ok(Self {
            cfg,
            capture,
            ring,
            windows: WindowBank::new(),
            rhythm_bank,
            harmony_bank,
            rhythm_floor,
            harmony_floor,
            agc,
            novelty,
            chroma,
            control_bus,
            tempo,
            style,
            sample_index: 0,
            hop_count: 0,
            last_harmony_mags: vec![0.0; harmony_bin_count],
            hop_buf: vec![0.0; hop_size],
        })
    }

    pub fn sample_index(&self) -> u64 {
        self.sample_index
    }

    /// Runs one hop of the full pipeline. Returns `None` when capture
    /// signalled a dropped hop (DMA timeout with nothing delivered at all);
    /// the caller should simply call again on the next scheduling tick
    /// (spec §4.1: "the pipeline never stalls waiting").
    pub fn process_hop(&mut self) -> Result<Option<(ControlBusFrame, HopOutput)>, CaptureError> {
        let hop_size = self.cfg.capture.hop_size;
        if self.hop_buf.len() != hop_size {
            self.hop_buf = vec![0.0; hop_size];
        }

        let capture_start = Instant::now();
        let outcome = match self.capture.capture_hop(&mut self.hop_buf) {
            Ok(outcome) => outcome,
            Err(CaptureError::DmaTimeout) => {
                telemetry::hub().record_dma_timeout();
                return Ok(None);
            }
            Err(err) => {
                telemetry::hub().record_read_error();
                telemetry::hub().record_capture_fault(err.code(), err.message());
                return Err(err);
            }
        };
        let read_time_us = capture_start.elapsed().as_micros() as f32;

        if let CaptureOutcome::PartialZeroFilled { .. } = outcome {
            telemetry::hub().record_partial_read();
        }
        let peak = self.hop_buf.iter().cloned().fold(0.0f32, |acc, s| acc.max(s.abs()));
        telemetry::hub().record_hop_captured(peak, read_time_us);

        self.ring.push_hop(&self.hop_buf);
        self.sample_index += hop_size as u64;
        self.hop_count += 1;
        let time = AudioTime::new(self.sample_index, self.cfg.capture.sample_rate_hz, 0);

        let mut rhythm_mags = vec![0.0; self.rhythm_bank.bin_count()];
        self.rhythm_bank.compute(&self.ring, &mut self.windows, &mut rhythm_mags);

        let run_harmony = self.hop_count % self.cfg.goertzel.harmony_hop_divisor as u64 == 0;
        if run_harmony {
            let harmony_start = Instant::now();
            let mut harmony_mags = vec![0.0; self.harmony_bank.bin_count()];
            self.harmony_bank.compute(&self.ring, &mut self.windows, &mut harmony_mags);
            let elapsed_us = harmony_start.elapsed().as_micros() as u64;
            // Spec §4.3: the harmony tick is dropped for this hop on
            // overload; rhythm and tempo never stall for it. Keeping the
            // previous harmony magnitudes means chroma/key-clarity simply
            // hold their last value for one extra hop.
            if elapsed_us > self.cfg.goertzel.overload_ceiling_us {
                telemetry::hub().record_overload(self.sample_index, elapsed_us);
            } else {
                self.harmony_floor.update(&harmony_mags);
                // Spec §4.3 tie-break: bins under 1x floor read as the floor
                // itself, not raw, before chroma ever sees them.
                for (k, m) in harmony_mags.iter_mut().enumerate() {
                    *m = self.harmony_floor.held_at_floor(k, *m);
                }
                self.last_harmony_mags = harmony_mags;
            }
        }

        self.rhythm_floor.update(&rhythm_mags);
        for (k, m) in rhythm_mags.iter_mut().enumerate() {
            *m = self.rhythm_floor.held_at_floor(k, *m);
        }
        let rhythm_rms = rms_of(&self.hop_buf);
        self.agc.process(rhythm_rms, &mut rhythm_mags);

        let rhythm_novelty = self.novelty.update(&rhythm_mags, &self.rhythm_floor);
        let (chroma, key_clarity) = self.chroma.update(&self.last_harmony_mags);
        let bands = aggregate_bands(&rhythm_mags);

        let mut frame = AudioFeatureFrame::silent(time);
        frame.rms = rhythm_rms.clamp(0.0, 1.0);
        frame.spectral_flux = rhythm_novelty;
        frame.bands = bands;
        frame.chroma = chroma;
        frame.key_clarity = key_clarity;
        frame.rhythm_novelty = rhythm_novelty;
        frame.harmony_flux = 0.0;

        let tempo_out = self.tempo.update(&frame, self.sample_index);
        frame.onset_strength = self.tempo.last_onset_strength();
        frame.onset_flag = tempo_out.beat_tick;

        let style_out = self.style.update(frame.rms, rhythm_novelty, tempo_out.confidence, &bands, &chroma);

        let raw = RawFrame {
            time,
            rms: frame.rms,
            flux: rhythm_novelty,
            bands,
            chroma,
            beat_detected: tempo_out.beat_detected,
            beat_strength: tempo_out.confidence,
        };
        let control_frame = self.control_bus.update(&raw);

        let view = ControlBusFrameView {
            rms: control_frame.rms,
            flux: control_frame.flux,
            drive: control_frame.drive,
            punch: control_frame.punch,
            beat_detected: control_frame.beat_detected,
            beat_strength: control_frame.beat_strength,
        };

        Ok(Some((
            control_frame,
            HopOutput {
                control: view,
                tempo: tempo_out,
                style: StyleClassificationView::from(&style_out),
            },
        )))
    }

}

fn rms_of(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Aggregates the rhythm bank's magnitudes into `BAND_COUNT` contiguous
/// groups (spec §3: "8-band energies ... aggregated from rhythm bins").
fn aggregate_bands(rhythm_mags: &[f32]) -> [f32; BAND_COUNT] {
    let mut bands = [0.0f32; BAND_COUNT];
    if rhythm_mags.is_empty() {
        return bands;
    }
    let per_band = (rhythm_mags.len() as f32 / BAND_COUNT as f32).ceil() as usize;
    let per_band = per_band.max(1);
    for (b, chunk) in bands.iter_mut().zip(rhythm_mags.chunks(per_band)) {
        *b = chunk.iter().sum::<f32>() / chunk.len() as f32;
    }
    bands
}

#[cfg(all(test, feature = "fixtures"))]
mod tests {
    use super::*;
    use crate::capture::{SyntheticCapture, SyntheticSignal};

    fn build_core() -> AudioCore {
        let cfg = CoreConfig::default();
        let capture = Box::new(SyntheticCapture::new(SyntheticSignal::Silence, 16_000, 0));
        AudioCore::new(cfg, capture).unwrap()
    }

    #[test]
    fn process_hop_on_silence_advances_sample_index() {
        let mut core = build_core();
        core.process_hop().unwrap();
        assert_eq!(core.sample_index(), 256);
    }

    #[test]
    fn silence_never_triggers_beat_detected() {
        let mut core = build_core();
        for _ in 0..50 {
            let (_, hop) = core.process_hop().unwrap().unwrap();
            assert!(!hop.control.beat_detected);
        }
    }

    #[test]
    fn control_bus_fields_stay_in_unit_range_over_many_hops() {
        let cfg = CoreConfig::default();
        let capture = Box::new(SyntheticCapture::new(
            SyntheticSignal::ClickTrain { bpm: 120.0, click_duration_s: 0.01 },
            16_000,
            0,
        ));
        let mut core = AudioCore::new(cfg, capture).unwrap();
        for _ in 0..400 {
            let (frame, _) = core.process_hop().unwrap().unwrap();
            assert!(frame.rms.is_finite() && (0.0..=1.0).contains(&frame.rms));
            assert!(frame.drive.is_finite() && (0.0..=1.0).contains(&frame.drive));
            assert!(frame.punch.is_finite() && (0.0..=1.0).contains(&frame.punch));
            for c in frame.chroma {
                assert!((0.0..=1.0).contains(&c));
            }
        }
    }

    #[test]
    fn bands_aggregation_averages_contiguous_groups() {
        let mags = vec![1.0, 1.0, 1.0, 3.0, 3.0, 3.0];
        let bands = aggregate_bands(&mags);
        assert!((bands[0] - 1.0).abs() < 1e-6);
        assert!((bands[1] - 3.0).abs() < 1e-6);
    }
}
