//! Diagnostics collector for the audio/tempo core.
//!
//! Unlike the teacher's FFI-facing `TelemetryHub` (which fans events out to
//! Dart over a tokio broadcast channel), this hub has no async consumer: the
//! render core and any debug tooling just poll `DiagnosticsHub::snapshot()`
//! synchronously at their own cadence, which is all spec §6 asks for. State
//! is still process-global via `once_cell::sync::Lazy` so every pipeline
//! stage can record into it without threading a handle through every call.

pub mod events;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub use events::{IntervalRejectReason, MetricEvent};

const HISTORY_CAPACITY: usize = 256;
const JITTER_WINDOW: usize = 64;

static HUB: Lazy<DiagnosticsHub> = Lazy::new(DiagnosticsHub::default);

/// Access the global diagnostics hub.
pub fn hub() -> &'static DiagnosticsHub {
    &HUB
}

/// Point-in-time read of the counters plus recent bounded history, the
/// low-rate product described in spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    pub hops_captured: u64,
    pub dma_timeouts: u64,
    pub read_errors: u64,
    pub partial_reads: u64,
    pub peak_sample: f32,
    pub avg_read_time_us: f32,
    pub onsets_detected: u64,
    pub intervals_accepted: u64,
    pub intervals_rejected: u64,
    pub density_peak_value: f32,
    pub density_peak_bin: u32,
    pub overloads: u64,
    pub soft_resets: u64,
    pub octave_flips: u64,
    pub bpm_jitter: f32,
    pub phase_jitter_ms: f32,
    pub recent: Vec<MetricEvent>,
}

/// Rolling window used for jitter/latency gauges, same shape as the
/// teacher's `LatencyTracker`.
struct RollingWindow {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl RollingWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn observe(&mut self, value: f32) -> f32 {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
        let mean: f32 = self.samples.iter().sum::<f32>() / self.samples.len() as f32;
        let variance: f32 = self
            .samples
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f32>()
            / self.samples.len() as f32;
        variance.sqrt()
    }

    fn avg(&self) -> f32 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.samples.iter().sum::<f32>() / self.samples.len() as f32
        }
    }
}

#[derive(Default)]
struct AtomicF32Bits(AtomicU32);

impl AtomicF32Bits {
    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Plain atomic counters for the hot-path-visible gauges, plus a
/// mutex-guarded bounded history for discrete events. No atomic is ever
/// touched more than once per hop, so contention is a non-issue even
/// though the consumer may poll concurrently.
pub struct DiagnosticsHub {
    hops_captured: AtomicU64,
    dma_timeouts: AtomicU64,
    read_errors: AtomicU64,
    partial_reads: AtomicU64,
    peak_sample: AtomicF32Bits,
    onsets_detected: AtomicU64,
    intervals_accepted: AtomicU64,
    intervals_rejected: AtomicU64,
    density_peak_value: AtomicF32Bits,
    density_peak_bin: AtomicU32,
    overloads: AtomicU64,
    soft_resets: AtomicU64,
    octave_flips: AtomicU64,
    read_time: Mutex<RollingWindow>,
    bpm_jitter: Mutex<RollingWindow>,
    phase_jitter: Mutex<RollingWindow>,
    history: Mutex<VecDeque<MetricEvent>>,
}

impl Default for DiagnosticsHub {
    fn default() -> Self {
        Self {
            hops_captured: AtomicU64::new(0),
            dma_timeouts: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
            partial_reads: AtomicU64::new(0),
            peak_sample: AtomicF32Bits::default(),
            onsets_detected: AtomicU64::new(0),
            intervals_accepted: AtomicU64::new(0),
            intervals_rejected: AtomicU64::new(0),
            density_peak_value: AtomicF32Bits::default(),
            density_peak_bin: AtomicU32::new(0),
            overloads: AtomicU64::new(0),
            soft_resets: AtomicU64::new(0),
            octave_flips: AtomicU64::new(0),
            read_time: Mutex::new(RollingWindow::new(JITTER_WINDOW)),
            bpm_jitter: Mutex::new(RollingWindow::new(JITTER_WINDOW)),
            phase_jitter: Mutex::new(RollingWindow::new(JITTER_WINDOW)),
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        }
    }
}

impl DiagnosticsHub {
    pub fn record_hop_captured(&self, peak_sample: f32, read_time_us: f32) {
        self.hops_captured.fetch_add(1, Ordering::Relaxed);
        let prev_peak = self.peak_sample.load();
        if peak_sample.abs() > prev_peak {
            self.peak_sample.store(peak_sample.abs());
        }
        self.read_time
            .lock()
            .expect("read_time poisoned")
            .observe(read_time_us);
    }

    pub fn record_dma_timeout(&self) {
        self.dma_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_partial_read(&self) {
        self.partial_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_onset(&self) {
        self.onsets_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_interval_accepted(&self) {
        self.intervals_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_interval_rejected(&self, reason: IntervalRejectReason, interval_s: f32) {
        self.intervals_rejected.fetch_add(1, Ordering::Relaxed);
        self.push_event(MetricEvent::IntervalRejected { reason, interval_s });
    }

    pub fn record_density_peak(&self, value: f32, bin: u32) {
        self.density_peak_value.store(value);
        self.density_peak_bin.store(bin, Ordering::Relaxed);
    }

    pub fn record_overload(&self, sample_index: u64, elapsed_us: u64) {
        self.overloads.fetch_add(1, Ordering::Relaxed);
        self.push_event(MetricEvent::Overload { sample_index, elapsed_us });
    }

    pub fn record_soft_reset(&self, sample_index: u64) {
        self.soft_resets.fetch_add(1, Ordering::Relaxed);
        self.push_event(MetricEvent::SoftReset { sample_index });
    }

    pub fn record_octave_flip(&self, previous_bpm: f32, new_bpm: f32, sample_index: u64) {
        self.octave_flips.fetch_add(1, Ordering::Relaxed);
        self.push_event(MetricEvent::OctaveFlip {
            previous_bpm,
            new_bpm,
            sample_index,
        });
    }

    pub fn record_state_transition(
        &self,
        from: crate::tempo::TempoTrackerState,
        to: crate::tempo::TempoTrackerState,
        sample_index: u64,
    ) {
        self.push_event(MetricEvent::StateTransition { from, to, sample_index });
    }

    pub fn record_capture_fault(&self, code: i32, detail: impl Into<String>) {
        self.push_event(MetricEvent::CaptureFault {
            code,
            detail: detail.into(),
        });
    }

    /// Observe a new BPM sample; returns the rolling standard deviation
    /// ("jitter") used for S1/S5's jitter acceptance criteria.
    pub fn observe_bpm(&self, bpm: f32) -> f32 {
        self.bpm_jitter.lock().expect("bpm_jitter poisoned").observe(bpm)
    }

    /// Observe a phase error in milliseconds; returns rolling stddev.
    pub fn observe_phase_ms(&self, phase_error_ms: f32) -> f32 {
        self.phase_jitter
            .lock()
            .expect("phase_jitter poisoned")
            .observe(phase_error_ms)
    }

    fn push_event(&self, event: MetricEvent) {
        let mut history = self.history.lock().expect("history poisoned");
        if history.len() == HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(event);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let history = self.history.lock().expect("history poisoned");
        DiagnosticsSnapshot {
            hops_captured: self.hops_captured.load(Ordering::Relaxed),
            dma_timeouts: self.dma_timeouts.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            partial_reads: self.partial_reads.load(Ordering::Relaxed),
            peak_sample: self.peak_sample.load(),
            avg_read_time_us: self.read_time.lock().expect("read_time poisoned").avg(),
            onsets_detected: self.onsets_detected.load(Ordering::Relaxed),
            intervals_accepted: self.intervals_accepted.load(Ordering::Relaxed),
            intervals_rejected: self.intervals_rejected.load(Ordering::Relaxed),
            density_peak_value: self.density_peak_value.load(),
            density_peak_bin: self.density_peak_bin.load(Ordering::Relaxed),
            overloads: self.overloads.load(Ordering::Relaxed),
            soft_resets: self.soft_resets.load(Ordering::Relaxed),
            octave_flips: self.octave_flips.load(Ordering::Relaxed),
            bpm_jitter: self.bpm_jitter.lock().expect("bpm_jitter poisoned").avg(),
            phase_jitter_ms: self
                .phase_jitter
                .lock()
                .expect("phase_jitter poisoned")
                .avg(),
            recent: history.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_hub_reports_zeroed_snapshot() {
        let hub = DiagnosticsHub::default();
        let snap = hub.snapshot();
        assert_eq!(snap.hops_captured, 0);
        assert_eq!(snap.dma_timeouts, 0);
        assert!(snap.recent.is_empty());
    }

    #[test]
    fn hop_capture_tracks_peak_and_count() {
        let hub = DiagnosticsHub::default();
        hub.record_hop_captured(0.5, 100.0);
        hub.record_hop_captured(-0.9, 120.0);
        let snap = hub.snapshot();
        assert_eq!(snap.hops_captured, 2);
        assert!((snap.peak_sample - 0.9).abs() < 1e-6);
        assert!(snap.avg_read_time_us > 0.0);
    }

    #[test]
    fn history_is_bounded() {
        let hub = DiagnosticsHub::default();
        for i in 0..(HISTORY_CAPACITY + 10) {
            hub.record_soft_reset(i as u64);
        }
        let snap = hub.snapshot();
        assert_eq!(snap.recent.len(), HISTORY_CAPACITY);
    }

    #[test]
    fn interval_rejection_increments_and_logs_reason() {
        let hub = DiagnosticsHub::default();
        hub.record_interval_rejected(IntervalRejectReason::TooFast, 0.1);
        let snap = hub.snapshot();
        assert_eq!(snap.intervals_rejected, 1);
        assert!(matches!(
            snap.recent.last(),
            Some(MetricEvent::IntervalRejected { reason: IntervalRejectReason::TooFast, .. })
        ));
    }

    #[test]
    fn bpm_jitter_is_zero_for_constant_series() {
        let hub = DiagnosticsHub::default();
        for _ in 0..10 {
            hub.observe_bpm(120.0);
        }
        assert!(hub.snapshot().bpm_jitter < 1e-6);
    }
}
