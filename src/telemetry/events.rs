//! Event types recorded into the bounded diagnostics history.

use serde::{Deserialize, Serialize};

use crate::tempo::TempoTrackerState;

/// Reasons an inter-onset interval was rejected by the density voter
/// (spec §4.9.3, §8 diagnostics).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntervalRejectReason {
    TooFast,
    TooSlow,
    RefractoryViolation,
}

/// Bounded-history diagnostic events, independent of and lower-rate than
/// the per-hop `ControlBusFrame` (spec §6 "Diagnostics").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    StateTransition {
        from: TempoTrackerState,
        to: TempoTrackerState,
        sample_index: u64,
    },
    SoftReset {
        sample_index: u64,
    },
    OctaveFlip {
        previous_bpm: f32,
        new_bpm: f32,
        sample_index: u64,
    },
    Overload {
        sample_index: u64,
        elapsed_us: u64,
    },
    IntervalRejected {
        reason: IntervalRejectReason,
        interval_s: f32,
    },
    CaptureFault {
        code: i32,
        detail: String,
    },
}
