//! Desktop microphone backend (spec §4.1, dev-rig equivalent of the target's
//! I2S driver). `cpal` drives an input stream on its own callback thread; we
//! bridge into the blocking `capture_hop()` contract with an `rtrb` SPSC
//! ring so the audio task never touches the callback thread directly.

use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::warn;

use crate::error::CaptureError;

use super::{Capture, CaptureOutcome};

/// Live microphone capture via `cpal`. Holds the stream alive for as long as
/// this struct lives; dropping it tears the stream down.
pub struct CpalCapture {
    _stream: Stream,
    consumer: Consumer<f32>,
    sample_rate_hz: u32,
    hop_size: usize,
    dma_timeout_hops: f32,
}

impl CpalCapture {
    /// Opens the system default input device at `sample_rate_hz` mono and
    /// wires its callback into a queue sized generously beyond one hop so a
    /// slow consumer doesn't force the callback thread to drop samples.
    pub fn open(sample_rate_hz: u32, hop_size: usize, dma_timeout_hops: f32) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CaptureError::ReadError { details: "no default input device".into() })?;

        let config = device
            .default_input_config()
            .map_err(|e| CaptureError::ReadError { details: e.to_string() })?;
        let sample_format = config.sample_format();
        let stream_config: cpal::StreamConfig = config.into();

        let (producer, consumer) = RingBuffer::<f32>::new(hop_size * 16);

        let stream = build_stream(&device, &stream_config, sample_format, producer)?;
        stream
            .play()
            .map_err(|e| CaptureError::ReadError { details: e.to_string() })?;

        Ok(Self {
            _stream: stream,
            consumer,
            sample_rate_hz: stream_config.sample_rate.0,
            hop_size,
            dma_timeout_hops,
        })
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: SampleFormat,
    mut producer: Producer<f32>,
) -> Result<Stream, CaptureError> {
    let err_fn = |err| warn!("cpal input stream error: {err}");
    let channels = config.channels as usize;

    let result = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _| push_mono(&mut producer, data, channels, |s| *s),
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _| push_mono(&mut producer, data, channels, |s| *s as f32 / i16::MAX as f32),
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            config,
            move |data: &[u16], _| {
                push_mono(&mut producer, data, channels, |s| {
                    (*s as f32 - u16::MAX as f32 / 2.0) / (u16::MAX as f32 / 2.0)
                })
            },
            err_fn,
            None,
        ),
        other => {
            return Err(CaptureError::ReadError {
                details: format!("unsupported cpal sample format: {other:?}"),
            });
        }
    };

    result.map_err(|e| CaptureError::ReadError { details: e.to_string() })
}

/// Downmixes an interleaved callback buffer to mono by averaging channels
/// and pushes each frame into the SPSC queue, dropping overflow silently
/// (the audio task's own `DMA_TIMEOUT` accounting is what matters).
fn push_mono<S: Copy>(producer: &mut Producer<f32>, data: &[S], channels: usize, to_f32: impl Fn(&S) -> f32) {
    for frame in data.chunks(channels.max(1)) {
        let mono = frame.iter().map(&to_f32).sum::<f32>() / frame.len().max(1) as f32;
        let _ = producer.push(mono);
    }
}

impl Capture for CpalCapture {
    fn capture_hop(&mut self, out: &mut [f32]) -> Result<CaptureOutcome, CaptureError> {
        let hop_duration = Duration::from_secs_f32(self.hop_size as f32 / self.sample_rate_hz as f32);
        let timeout = hop_duration.mul_f32(self.dma_timeout_hops.max(1.0));
        let deadline = Instant::now() + timeout;

        let mut filled = 0;
        while filled < out.len() {
            match self.consumer.pop() {
                Ok(sample) => {
                    out[filled] = sample;
                    filled += 1;
                }
                Err(_) => {
                    if Instant::now() >= deadline {
                        break;
                    }
                    std::thread::yield_now();
                }
            }
        }

        if filled == out.len() {
            Ok(CaptureOutcome::Full)
        } else if filled == 0 {
            Err(CaptureError::DmaTimeout)
        } else {
            out[filled..].fill(0.0);
            Ok(CaptureOutcome::PartialZeroFilled { samples_delivered: filled })
        }
    }
}
