//! Envelope smoother and frame aggregator (spec §4.8).
//!
//! Every field follows `y <- y + alpha*(x - y)`, with `alpha = attack` when
//! rising and `alpha = release` when falling (a lower alpha means slower).
//! *drive* and *punch* get their own dedicated release constants.

use crate::time::AudioTime;

pub const BAND_COUNT: usize = 8;
pub const CHROMA_COUNT: usize = 12;

/// Raw, unsmoothed per-hop features handed to the control bus.
pub struct RawFrame {
    pub time: AudioTime,
    pub rms: f32,
    pub flux: f32,
    pub bands: [f32; BAND_COUNT],
    pub chroma: [f32; CHROMA_COUNT],
    pub beat_detected: bool,
    pub beat_strength: f32,
}

/// Smoothed per-hop product, the single primary output of the core
/// (spec §3, §6). Every field is in `[0, 1]` after smoothing.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlBusFrame {
    pub time: AudioTime,
    pub rms: f32,
    pub flux: f32,
    pub bands: [f32; BAND_COUNT],
    pub chroma: [f32; CHROMA_COUNT],
    pub drive: f32,
    pub punch: f32,
    pub beat_detected: bool,
    pub beat_strength: f32,
}

pub struct ControlBus {
    attack: f32,
    release: f32,
    drive_release: f32,
    punch_release: f32,
    rms: f32,
    flux: f32,
    bands: [f32; BAND_COUNT],
    chroma: [f32; CHROMA_COUNT],
    drive: f32,
    punch: f32,
}

impl ControlBus {
    pub fn new(attack: f32, release: f32, drive_release: f32, punch_release: f32) -> Self {
        Self {
            attack,
            release,
            drive_release,
            punch_release,
            rms: 0.0,
            flux: 0.0,
            bands: [0.0; BAND_COUNT],
            chroma: [0.0; CHROMA_COUNT],
            drive: 0.0,
            punch: 0.0,
        }
    }

    fn smooth(&self, y: f32, x: f32) -> f32 {
        let alpha = if x > y { self.attack } else { self.release };
        (y + alpha * (x - y)).clamp(0.0, 1.0)
    }

    pub fn update(&mut self, raw: &RawFrame) -> ControlBusFrame {
        self.rms = self.smooth(self.rms, raw.rms.clamp(0.0, 1.0));
        self.flux = self.smooth(self.flux, raw.flux.clamp(0.0, 1.0));
        for (y, &x) in self.bands.iter_mut().zip(raw.bands.iter()) {
            *y = self.smooth(*y, x.clamp(0.0, 1.0));
        }
        for (y, &x) in self.chroma.iter_mut().zip(raw.chroma.iter()) {
            *y = self.smooth(*y, x.clamp(0.0, 1.0));
        }

        // drive: slow envelope of RMS with a dedicated release constant.
        let drive_alpha = if raw.rms > self.drive {
            self.attack
        } else {
            self.drive_release
        };
        self.drive = (self.drive + drive_alpha * (raw.rms.clamp(0.0, 1.0) - self.drive)).clamp(0.0, 1.0);

        // punch: max-hold of positive flux, decaying with its own release.
        let punch_target = raw.flux.clamp(0.0, 1.0);
        if punch_target > self.punch {
            self.punch = punch_target;
        } else {
            self.punch += self.punch_release * (punch_target - self.punch);
            self.punch = self.punch.clamp(0.0, 1.0);
        }

        ControlBusFrame {
            time: raw.time,
            rms: self.rms,
            flux: self.flux,
            bands: self.bands,
            chroma: self.chroma,
            drive: self.drive,
            punch: self.punch,
            beat_detected: raw.beat_detected,
            beat_strength: raw.beat_strength.clamp(0.0, 1.0),
        }
    }
}
