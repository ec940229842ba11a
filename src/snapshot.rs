//! Cross-core snapshot hand-off (spec §4.11) and the renderer-side musical
//! grid derived from it (spec §3 `MusicalGridSnapshot`).
//!
//! The audio task owns the producer half; the render/consumer task owns the
//! reader half. `triple_buffer` gives us the release/acquire publish
//! protocol the spec calls for without a mutex.

use triple_buffer::{triple_buffer, Input, Output};

use crate::control_bus::ControlBusFrame;

/// Producer-side handle, held by the audio task.
pub struct SnapshotWriter {
    input: Input<ControlBusFrame>,
}

impl SnapshotWriter {
    pub fn publish(&mut self, frame: ControlBusFrame) {
        self.input.write(frame);
    }
}

/// Consumer-side handle, held by the render task.
pub struct SnapshotReader {
    output: Output<ControlBusFrame>,
}

impl SnapshotReader {
    /// Reads the latest published frame. Never blocks; if nothing new has
    /// been published since the last read, returns the same frame again.
    pub fn latest(&mut self) -> &ControlBusFrame {
        self.output.read()
    }

    pub fn has_update(&self) -> bool {
        self.output.updated()
    }
}

/// Builds a fresh writer/reader pair seeded with a silent frame.
pub fn snapshot_channel(initial: ControlBusFrame) -> (SnapshotWriter, SnapshotReader) {
    let (input, output) = triple_buffer(&initial);
    (SnapshotWriter { input }, SnapshotReader { output })
}

/// Renderer-side musical grid (spec §3 `MusicalGridSnapshot`). Derived
/// on-demand from the beat/tempo fields of incoming `ControlBusFrame`s; it
/// is not itself published across the SPSC channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MusicalGridSnapshot {
    pub bpm_smoothed: f32,
    pub tempo_confidence: f32,
    pub beat_index: u64,
    pub beat_phase01: f32,
    pub beat_tick: bool,
    pub bar_index: u64,
    pub bar_phase01: f32,
    pub downbeat_tick: bool,
    pub beat_in_bar: u32,
    pub beats_per_bar: u32,
}

/// Tracks beat/bar indices across successive `ControlBusFrame` observations.
/// One instance per consumer; never shared.
pub struct MusicalGrid {
    beats_per_bar: u32,
    beat_index: u64,
    beat_in_bar: u32,
}

impl MusicalGrid {
    pub fn new(beats_per_bar: u32) -> Self {
        Self {
            beats_per_bar: beats_per_bar.max(1),
            beat_index: 0,
            beat_in_bar: 0,
        }
    }

    pub fn observe(
        &mut self,
        bpm_smoothed: f32,
        tempo_confidence: f32,
        beat_phase01: f32,
        beat_tick: bool,
    ) -> MusicalGridSnapshot {
        let mut downbeat_tick = false;
        if beat_tick {
            self.beat_index += 1;
            self.beat_in_bar = (self.beat_in_bar + 1) % self.beats_per_bar;
            if self.beat_in_bar == 0 {
                downbeat_tick = true;
            }
        }
        let bar_index = self.beat_index / self.beats_per_bar as u64;
        let bar_phase01 = (self.beat_in_bar as f32 + beat_phase01) / self.beats_per_bar as f32;

        MusicalGridSnapshot {
            bpm_smoothed,
            tempo_confidence,
            beat_index: self.beat_index,
            beat_phase01,
            beat_tick,
            bar_index,
            bar_phase01,
            downbeat_tick,
            beat_in_bar: self.beat_in_bar,
            beats_per_bar: self.beats_per_bar,
        }
    }
}
