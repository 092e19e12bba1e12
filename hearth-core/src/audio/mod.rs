//! Audio capture via the cpal backend.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It must not allocate, block on a lock, or perform I/O. The callback here
//! only downmixes into a reused scratch buffer and pushes into the SPSC
//! sample ring, whose `push_slice` is wait-free.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on Windows/macOS. `AudioCapture` must be
//! created and dropped on the same OS thread; the session does this by
//! opening it inside the control loop's `spawn_blocking` closure.

pub mod device;
pub mod resample;
pub mod wav;

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleRate, Stream, StreamConfig,
};

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::{error, info, warn};

use crate::{
    buffering::{Producer, SampleProducer},
    error::{HearthError, Result},
};

/// Handle to an active capture stream.
///
/// **Not `Send`** — bound to its creation thread on Windows/macOS.
pub struct AudioCapture {
    /// Kept alive so the stream is not dropped prematurely.
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    /// Shared flag — set to `false` to make the callback a no-op.
    running: Arc<AtomicBool>,
    /// Sample rate the device actually delivers (Hz).
    pub sample_rate: u32,
}

#[cfg(feature = "audio-cpal")]
impl AudioCapture {
    /// Open an input device by preferred name, falling back to the system
    /// default and then to the first available input.
    ///
    /// # Errors
    /// `HearthError::NoDefaultInputDevice` when no microphone exists,
    /// `HearthError::AudioStream` when the stream cannot be built.
    pub fn open_with_preference(
        producer: SampleProducer,
        running: Arc<AtomicBool>,
        preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        let host = cpal::default_host();

        let mut selected = None;
        if let Some(wanted) = preferred_device_name {
            match host.input_devices() {
                Ok(mut devices) => {
                    selected = devices
                        .find(|d| d.name().map(|n| n == wanted).unwrap_or(false));
                    if selected.is_none() {
                        warn!("preferred input device '{wanted}' not found, falling back");
                    }
                }
                Err(e) => warn!("failed to list input devices: {e}"),
            }
        }

        let device = match selected.or_else(|| host.default_input_device()) {
            Some(d) => d,
            None => {
                let mut devices = host
                    .input_devices()
                    .map_err(|e| HearthError::AudioDevice(e.to_string()))?;
                devices.next().ok_or(HearthError::NoDefaultInputDevice)?
            }
        };

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening input device"
        );

        let supported = device
            .default_input_config()
            .map_err(|e| HearthError::AudioDevice(e.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();

        info!(sample_rate, channels, "capture config selected");

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &config, producer, Arc::clone(&running))
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &config, producer, Arc::clone(&running))
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &config, producer, Arc::clone(&running))
            }
            cpal::SampleFormat::U8 => {
                build_stream::<u8>(&device, &config, producer, Arc::clone(&running))
            }
            fmt => Err(HearthError::AudioStream(format!(
                "unsupported sample format: {fmt:?}"
            ))),
        }?;

        stream
            .play()
            .map_err(|e| HearthError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
            sample_rate,
        })
    }

    /// Open the system default microphone.
    pub fn open_default(producer: SampleProducer, running: Arc<AtomicBool>) -> Result<Self> {
        Self::open_with_preference(producer, running, None)
    }

    /// Signal the callback to no-op on its next invocation.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Build an input stream for one concrete sample type, downmixing frames to
/// mono f32 and pushing into the SPSC ring.
#[cfg(feature = "audio-cpal")]
fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer: SampleProducer,
    running: Arc<AtomicBool>,
) -> Result<Stream>
where
    T: cpal::Sample + cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let channels = config.channels as usize;
    let mut mix_buf: Vec<f32> = Vec::new();

    device
        .build_input_stream(
            config,
            move |data: &[T], _info| {
                if !running.load(Ordering::Relaxed) {
                    return;
                }
                let frames = data.len() / channels;
                mix_buf.resize(frames, 0.0);
                for (frame_idx, frame) in data.chunks_exact(channels).enumerate() {
                    let mut sum = 0f32;
                    for &sample in frame {
                        let value: f32 = cpal::Sample::from_sample(sample);
                        sum += value;
                    }
                    mix_buf[frame_idx] = sum / channels as f32;
                }
                let written = producer.push_slice(&mix_buf[..frames]);
                if written < frames {
                    warn!("sample ring full: dropped {} frames", frames - written);
                }
            },
            |err| error!("audio stream error: {err}"),
            None,
        )
        .map_err(|e| HearthError::AudioStream(e.to_string()))
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl AudioCapture {
    pub fn open_with_preference(
        _producer: SampleProducer,
        _running: Arc<AtomicBool>,
        _preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        Err(HearthError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }

    pub fn open_default(producer: SampleProducer, running: Arc<AtomicBool>) -> Result<Self> {
        Self::open_with_preference(producer, running, None)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}
