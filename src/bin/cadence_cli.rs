//! Desktop replay tool: feeds a WAV file (or, with the `fixtures` feature, a
//! synthetic signal) through the full pipeline and prints one JSON line per
//! hop to stdout. Useful for manual listening tests and for piping into
//! `jq`/plotting scripts when there's no render surface to look at.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;

use cadence_core::capture::{Capture, WavReplayCapture};
use cadence_core::config::CoreConfig;
use cadence_core::engine::AudioCore;

#[cfg(feature = "fixtures")]
use cadence_core::capture::{SyntheticCapture, SyntheticSignal};

#[derive(Parser, Debug)]
#[command(name = "cadence-cli", about = "Replay a mono audio source through the cadence pipeline")]
struct Args {
    /// Path to a mono WAV file to replay. Mutually exclusive with --fixture.
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Synthetic test signal to replay instead of a WAV file (requires the
    /// `fixtures` feature).
    #[arg(long, value_enum)]
    fixture: Option<Fixture>,

    /// Number of hops to run. Required with --fixture; defaults to "until
    /// the WAV file is exhausted" with --wav.
    #[arg(long)]
    hops: Option<u64>,

    /// Path to a JSON config file (falls back to defaults if omitted or
    /// unreadable).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed for synthetic fixtures.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Port for the read-only diagnostics HTTP endpoint (requires the
    /// `debug_http` feature).
    #[cfg(feature = "debug_http")]
    #[arg(long)]
    http_port: Option<u16>,
}

#[derive(Clone, Debug, ValueEnum)]
enum Fixture {
    Silence,
    Click,
    Chord,
    Noise,
}

#[derive(Serialize)]
struct HopLine {
    sample_index: u64,
    seconds: f64,
    monotonic_us: u64,
    rms: f32,
    flux: f32,
    drive: f32,
    punch: f32,
    beat_detected: bool,
    beat_strength: f32,
    bpm_smoothed: f32,
    tempo_confidence: f32,
    beat_tick: bool,
    style: &'static str,
    style_confidence: f32,
}

fn main() -> Result<()> {
    cadence_core::init_logging();
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => CoreConfig::load_from_file(path),
        None => CoreConfig::default(),
    };
    let sample_rate_hz = cfg.capture.sample_rate_hz;

    let (capture, wav_hop_bound) = build_capture(&args, sample_rate_hz)?;
    let hop_size = cfg.capture.hop_size;
    let mut core = AudioCore::new(cfg, capture).context("failed to initialize audio core")?;

    #[cfg(feature = "debug_http")]
    if let Some(port) = args.http_port {
        cadence_core::debug_http::spawn(port);
    }

    // For a WAV source with no explicit --hops, stop once the file's been
    // fully replayed instead of looping on zero-filled silence forever.
    let hop_limit = args
        .hops
        .or_else(|| wav_hop_bound.map(|samples| (samples as u64).div_ceil(hop_size as u64)))
        .unwrap_or(u64::MAX);
    let mut hops_run = 0u64;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    while hops_run < hop_limit {
        let Some((control, hop)) = core.process_hop()? else {
            continue;
        };

        // The core never reads a wall clock; this is the one edge where a
        // real `monotonic_us` is allowed to attach, for correlating this line
        // against other logs after the fact.
        let stamped_time = control.time.with_monotonic_us(cadence_core::time::wall_clock_now_us());
        let line = HopLine {
            sample_index: stamped_time.sample_index,
            seconds: stamped_time.seconds(),
            monotonic_us: stamped_time.monotonic_us,
            rms: control.rms,
            flux: control.flux,
            drive: control.drive,
            punch: control.punch,
            beat_detected: control.beat_detected,
            beat_strength: control.beat_strength,
            bpm_smoothed: hop.tempo.bpm_smoothed,
            tempo_confidence: hop.tempo.confidence,
            beat_tick: hop.tempo.beat_tick,
            style: style_name(hop.style.dominant),
            style_confidence: hop.style.confidence,
        };
        serde_json::to_writer(&mut out, &line)?;
        writeln!(out)?;

        hops_run += 1;
    }

    Ok(())
}

/// Returns the capture backend plus, for a WAV source, its total sample
/// count (used to bound the default hop budget instead of looping forever
/// on the zero-filled silence past end-of-file).
fn build_capture(args: &Args, sample_rate_hz: u32) -> Result<(Box<dyn Capture>, Option<usize>)> {
    if let Some(path) = &args.wav {
        let cap = WavReplayCapture::open(&path.to_string_lossy())
            .with_context(|| format!("failed to open WAV file {path:?}"))?;
        let sample_count = cap.sample_count();
        return Ok((Box::new(cap), Some(sample_count)));
    }

    #[cfg(feature = "fixtures")]
    if let Some(fixture) = &args.fixture {
        let signal = match fixture {
            Fixture::Silence => SyntheticSignal::Silence,
            Fixture::Click => SyntheticSignal::ClickTrain { bpm: 120.0, click_duration_s: 0.01 },
            Fixture::Chord => SyntheticSignal::Chord { frequencies_hz: vec![261.63, 329.63, 392.0] },
            Fixture::Noise => SyntheticSignal::Noise { amplitude: 0.3 },
        };
        return Ok((Box::new(SyntheticCapture::new(signal, sample_rate_hz, args.seed)), None));
    }
    #[cfg(not(feature = "fixtures"))]
    if args.fixture.is_some() {
        anyhow::bail!("this binary was built without the `fixtures` feature");
    }

    anyhow::bail!("pass either --wav <path> or --fixture <name>")
}

fn style_name(class: cadence_core::style::StyleClass) -> &'static str {
    use cadence_core::style::StyleClass::*;
    match class {
        Unknown => "unknown",
        Rhythmic => "rhythmic",
        Harmonic => "harmonic",
        Melodic => "melodic",
        Texture => "texture",
        Dynamic => "dynamic",
    }
}
