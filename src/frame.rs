//! `AudioFeatureFrame` (spec §3): the compact per-hop artefact passed from
//! the DSP conditioning stages into the tempo tracker and style detector.

use crate::chroma::CHROMA_CLASSES;
use crate::control_bus::BAND_COUNT;
use crate::time::AudioTime;

#[derive(Debug, Clone, PartialEq)]
pub struct AudioFeatureFrame {
    pub time: AudioTime,
    pub rms: f32,
    pub spectral_flux: f32,
    pub bands: [f32; BAND_COUNT],
    pub chroma: [f32; CHROMA_CLASSES],
    pub key_clarity: f32,
    pub rhythm_novelty: f32,
    /// Always `0.0`. No harmony-side analogue of §4.6 novelty is defined;
    /// kept in the data model for field-parity with spec §3.
    pub harmony_flux: f32,
    pub onset_strength: f32,
    pub onset_flag: bool,
}

impl AudioFeatureFrame {
    pub fn silent(time: AudioTime) -> Self {
        Self {
            time,
            rms: 0.0,
            spectral_flux: 0.0,
            bands: [0.0; BAND_COUNT],
            chroma: [0.0; CHROMA_CLASSES],
            key_clarity: 0.0,
            rhythm_novelty: 0.0,
            harmony_flux: 0.0,
            onset_strength: 0.0,
            onset_flag: false,
        }
    }
}
