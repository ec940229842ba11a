//! Cadence core: an embedded audio front-end and musical-intelligence
//! pipeline that turns a mono mic stream into per-hop musical feature
//! frames (spectral magnitudes, onset strength, chroma, envelopes,
//! beat/tempo lock, style classification).
//!
//! [`engine::AudioCore`] is the single entry point: it owns one
//! [`capture::Capture`] backend plus every DSP stage and drives them once
//! per hop via [`engine::AudioCore::process_hop`]. The resulting
//! [`control_bus::ControlBusFrame`] is handed to a [`snapshot::SnapshotWriter`]
//! for lock-free publication to a render/debug consumer holding the paired
//! [`snapshot::SnapshotReader`].

pub mod agc;
pub mod capture;
pub mod chroma;
pub mod config;
pub mod control_bus;
#[cfg(feature = "debug_http")]
pub mod debug_http;
pub mod engine;
pub mod error;
pub mod frame;
pub mod goertzel;
pub mod noise_floor;
pub mod novelty;
pub mod ring;
pub mod snapshot;
pub mod style;
pub mod telemetry;
pub mod tempo;
pub mod time;
pub mod window;

/// Initializes `tracing` with an env-filter subscriber. Safe to call more
/// than once; later calls are no-ops once a global subscriber is set.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}

#[cfg(all(test, feature = "fixtures"))]
mod pipeline_smoke_test {
    use crate::capture::{SyntheticCapture, SyntheticSignal};
    use crate::config::CoreConfig;
    use crate::engine::AudioCore;
    use crate::snapshot::snapshot_channel;

    /// Smoke test wiring the whole module tree together end to end: build a
    /// core over a synthetic capture, run a few hops, publish each resulting
    /// frame through the snapshot channel, and read it back.
    #[test]
    fn full_pipeline_wires_together_and_publishes_snapshots() {
        let cfg = CoreConfig::default();
        let capture = Box::new(SyntheticCapture::new(SyntheticSignal::Silence, 16_000, 0));
        let mut core = AudioCore::new(cfg, capture).unwrap();

        let (first_frame, _) = core.process_hop().unwrap().unwrap();
        let (mut writer, mut reader) = snapshot_channel(first_frame);

        for _ in 0..10 {
            if let Some((frame, _)) = core.process_hop().unwrap() {
                writer.publish(frame);
            }
        }

        let latest = reader.latest();
        assert!(latest.rms.is_finite());
    }
}
