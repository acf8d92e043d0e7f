//! Real-time audio host.
//!
//! One output stream hosts everything that must run on the audio deadline:
//! file playback, the capture tap and the [`FeatureExtractor`]. The capture
//! stream only downmixes and forwards samples; capture audio is analysed
//! but never reaches the output device.
//!
//! The render side steers the host through a [`ControlPort`] and reads the
//! file position from a [`PlaybackClock`]. Both are plain atomics.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::Sample;

use super::features::FeatureExtractor;
use super::ring::{self, Consumer, Producer};
use super::source::{default_output_device, DecodedAudio};
use super::AudioFeatureRecord;
use crate::error::{Error, Result};
use crate::params::AudioConfig;

/// Capture samples buffered between the capture and output callbacks
const CAPTURE_TAP_SECONDS: usize = 1;

/// Snapshot of what the audio host should be doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlMessage {
    pub is_playing: bool,
    pub mic_active: bool,
    pub block_size: usize,
    pub sample_rate_hz: u32,
    pub capacity: usize,
}

/// Lock-free mailbox for [`ControlMessage`]s. The host reads it once per
/// callback.
#[derive(Debug, Default)]
pub struct ControlPort {
    is_playing: AtomicBool,
    mic_active: AtomicBool,
    block_size: AtomicUsize,
    sample_rate_hz: AtomicU32,
    capacity: AtomicUsize,
    rewind: AtomicBool,
}

impl ControlPort {
    pub fn send(&self, msg: ControlMessage) {
        self.block_size.store(msg.block_size, Ordering::Relaxed);
        self.sample_rate_hz.store(msg.sample_rate_hz, Ordering::Relaxed);
        self.capacity.store(msg.capacity, Ordering::Relaxed);
        self.mic_active.store(msg.mic_active, Ordering::Relaxed);
        self.is_playing.store(msg.is_playing, Ordering::Release);
    }

    pub fn message(&self) -> ControlMessage {
        let is_playing = self.is_playing.load(Ordering::Acquire);
        ControlMessage {
            is_playing,
            mic_active: self.mic_active.load(Ordering::Relaxed),
            block_size: self.block_size.load(Ordering::Relaxed),
            sample_rate_hz: self.sample_rate_hz.load(Ordering::Relaxed),
            capacity: self.capacity.load(Ordering::Relaxed),
        }
    }

    /// Ask the callback to restart the file from the beginning. The
    /// callback owns the position, so the rewind happens there.
    pub fn request_rewind(&self) {
        self.rewind.store(true, Ordering::Release);
    }

    /// True until the callback has performed a requested rewind
    pub fn rewind_pending(&self) -> bool {
        self.rewind.load(Ordering::Acquire)
    }

    fn complete_rewind(&self) {
        self.rewind.store(false, Ordering::Release);
    }
}

/// File playback position, advanced by the audio callback
#[derive(Debug)]
pub struct PlaybackClock {
    /// Position in source frames (f64 bits)
    position: AtomicU64,
    ended: AtomicBool,
    sample_rate_hz: u32,
}

impl PlaybackClock {
    pub fn new(sample_rate_hz: u32) -> Self {
        Self {
            position: AtomicU64::new(0f64.to_bits()),
            ended: AtomicBool::new(false),
            sample_rate_hz,
        }
    }

    pub fn position_frames(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Acquire))
    }

    pub fn position_s(&self) -> f64 {
        self.position_frames() / self.sample_rate_hz as f64
    }

    fn store_frames(&self, frames: f64) {
        self.position.store(frames.to_bits(), Ordering::Release);
    }

    pub fn rewind(&self) {
        self.store_frames(0.0);
        self.ended.store(false, Ordering::Release);
    }

    pub fn has_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }
}

/// File playback state owned by the callback
pub struct FilePlayer {
    samples: Arc<[f32]>,
    clock: Arc<PlaybackClock>,
    step: f64,
}

impl FilePlayer {
    pub fn new(audio: &DecodedAudio, clock: Arc<PlaybackClock>, output_rate_hz: u32) -> Self {
        Self {
            samples: Arc::clone(&audio.samples),
            clock,
            step: audio.sample_rate_hz as f64 / output_rate_hz as f64,
        }
    }

    fn sample_at(&self, position: f64) -> f32 {
        let i = position as usize;
        let frac = (position - i as f64) as f32;
        let a = self.samples[i];
        let b = self.samples.get(i + 1).copied().unwrap_or(0.0);
        a + (b - a) * frac
    }
}

/// Capture samples converted from the input device rate to the output
/// rate by linear interpolation. Holds the last sample on underrun.
pub struct CaptureTap {
    samples: Consumer<f32>,
    step: f64,
    phase: f64,
    current: f32,
    next: f32,
}

impl CaptureTap {
    pub fn new(samples: Consumer<f32>, input_rate_hz: u32, output_rate_hz: u32) -> Self {
        Self {
            samples,
            step: input_rate_hz as f64 / output_rate_hz.max(1) as f64,
            phase: 0.0,
            current: 0.0,
            next: 0.0,
        }
    }

    /// Input samples waiting to be consumed
    pub fn backlog(&self) -> usize {
        self.samples.available()
    }

    fn next_sample(&mut self) -> f32 {
        let value = self.current + (self.next - self.current) * self.phase as f32;
        self.phase += self.step;
        while self.phase >= 1.0 {
            self.phase -= 1.0;
            self.current = self.next;
            if let Some(s) = self.samples.pop() {
                self.next = s;
            }
        }
        value
    }
}

/// Everything the output callback does, separated from cpal so it can be
/// driven directly.
pub struct HostCallback {
    port: Arc<ControlPort>,
    file: Option<FilePlayer>,
    mic: Option<CaptureTap>,
    extractor: FeatureExtractor,
    features: Producer<AudioFeatureRecord>,
}

impl HostCallback {
    pub fn new(
        port: Arc<ControlPort>,
        file: Option<FilePlayer>,
        mic: Option<CaptureTap>,
        extractor: FeatureExtractor,
        features: Producer<AudioFeatureRecord>,
    ) -> Self {
        Self {
            port,
            file,
            mic,
            extractor,
            features,
        }
    }

    /// Fill one interleaved output buffer
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        let control = self.port.message();
        let channels = channels.max(1);

        // Clear the ended flag before the request so the render side never
        // sees a pending-free, still-ended clock after a rewind.
        if self.port.rewind_pending() {
            if let Some(file) = &self.file {
                file.clock.rewind();
            }
            self.port.complete_rewind();
        }

        let mut position = self.file.as_ref().map(|f| f.clock.position_frames());
        let mut ended = false;

        for frame in out.chunks_mut(channels) {
            let mut played = 0.0;
            let mut analysing = false;

            if control.is_playing {
                if let (Some(file), Some(pos)) = (&self.file, position.as_mut()) {
                    if *pos < file.samples.len() as f64 {
                        played = file.sample_at(*pos);
                        *pos += file.step;
                        analysing = true;
                    } else {
                        ended = true;
                    }
                }
            }
            frame.fill(played);

            let mut analysed = played;
            if control.mic_active {
                if let Some(mic) = self.mic.as_mut() {
                    analysed += mic.next_sample();
                    analysing = true;
                }
            }

            if analysing {
                self.extractor.push_sample(analysed, &mut self.features);
            }
        }

        if !control.is_playing {
            return;
        }
        if let (Some(file), Some(pos)) = (&self.file, position) {
            let len = file.samples.len() as f64;
            file.clock.store_frames(pos.min(len));
            if ended || pos >= len {
                file.clock.ended.store(true, Ordering::Release);
            }
        }
    }
}

/// Running device streams. Field order is teardown order: the capture
/// stream stops first, then the output stream (and the extractor inside
/// it) is dropped.
pub struct AudioHost {
    _capture: Option<cpal::Stream>,
    _output: cpal::Stream,
    sample_rate_hz: u32,
}

/// Render-side ends of the host's channels
pub struct HostOutputs {
    pub features: Consumer<AudioFeatureRecord>,
    pub capture_tap: Option<Consumer<f32>>,
}

impl AudioHost {
    /// Open the default output device, optionally a capture device, and
    /// start both streams.
    pub fn start(
        config: &AudioConfig,
        port: Arc<ControlPort>,
        file: Option<(&DecodedAudio, Arc<PlaybackClock>)>,
        capture: Option<&cpal::Device>,
    ) -> Result<(Self, HostOutputs)> {
        let timeout = Some(Duration::from_millis(config.stream_timeout_ms));

        let device = default_output_device()?;
        let out_config = device
            .default_output_config()
            .map_err(|e| Error::setup(format!("failed to get output config: {}", e)))?;
        let sample_rate_hz = out_config.sample_rate().0;
        let channels = out_config.channels() as usize;

        let (feature_tx, feature_rx) = ring::channel(config.capacity);

        let mut capture_stream = None;
        let mut capture_tap = None;
        let mut mic = None;
        if let Some(input) = capture {
            let input_config = input
                .default_input_config()
                .map_err(|e| Error::setup(format!("failed to get input config: {}", e)))?;
            let input_rate_hz = input_config.sample_rate().0;
            let (host_tx, host_rx) = ring::channel(input_rate_hz as usize * CAPTURE_TAP_SECONDS);
            let (tap_tx, tap_rx) = ring::channel(config.fft_size * 4);
            let stream = build_capture_stream(input, input_config, host_tx, tap_tx, timeout)?;
            stream
                .play()
                .map_err(|e| Error::setup(format!("failed to start capture stream: {}", e)))?;
            if input_rate_hz != sample_rate_hz {
                tracing::info!(input_rate_hz, output_rate_hz = sample_rate_hz, "Resampling capture");
            }
            capture_stream = Some(stream);
            capture_tap = Some(tap_rx);
            mic = Some(CaptureTap::new(host_rx, input_rate_hz, sample_rate_hz));
        }

        let player = file.map(|(audio, clock)| FilePlayer::new(audio, clock, sample_rate_hz));
        let extractor = FeatureExtractor::new(config, sample_rate_hz);
        let mut callback = HostCallback::new(port, player, mic, extractor, feature_tx);

        let output = device
            .build_output_stream(
                &out_config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback.render(data, channels);
                },
                |err| tracing::error!(%err, "Audio output stream error"),
                timeout,
            )
            .map_err(|e| Error::setup(format!("failed to build output stream: {}", e)))?;
        output
            .play()
            .map_err(|e| Error::setup(format!("failed to start output stream: {}", e)))?;

        tracing::info!(
            device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate_hz,
            channels,
            capture = capture.is_some(),
            "Audio host started"
        );

        Ok((
            Self {
                _capture: capture_stream,
                _output: output,
                sample_rate_hz,
            },
            HostOutputs {
                features: feature_rx,
                capture_tap,
            },
        ))
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }
}

fn build_capture_stream(
    device: &cpal::Device,
    supported: cpal::SupportedStreamConfig,
    host_tap: Producer<f32>,
    analyser_tap: Producer<f32>,
    timeout: Option<Duration>,
) -> Result<cpal::Stream> {
    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    match format {
        cpal::SampleFormat::F32 => {
            build_capture_stream_impl::<f32>(device, &config, host_tap, analyser_tap, timeout)
        }
        cpal::SampleFormat::I16 => {
            build_capture_stream_impl::<i16>(device, &config, host_tap, analyser_tap, timeout)
        }
        cpal::SampleFormat::U16 => {
            build_capture_stream_impl::<u16>(device, &config, host_tap, analyser_tap, timeout)
        }
        other => Err(Error::setup(format!(
            "unsupported capture sample format {:?}",
            other
        ))),
    }
}

fn build_capture_stream_impl<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut host_tap: Producer<f32>,
    mut analyser_tap: Producer<f32>,
    timeout: Option<Duration>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                for frame in data.chunks(channels) {
                    let mixed = frame
                        .iter()
                        .fold(0.0f32, |acc, &s| acc + s.to_sample::<f32>())
                        / frame.len() as f32;
                    host_tap.push(mixed);
                    analyser_tap.push(mixed);
                }
            },
            |err| tracing::error!(%err, "Audio capture stream error"),
            timeout,
        )
        .map_err(|e| Error::setup(format!("failed to build capture stream: {}", e)))
}
