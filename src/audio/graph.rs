//! Audio source graph: file playback and live capture.
//!
//! Owns up to one file source and one capture source, rebuilds the
//! [`AudioHost`] whenever the set of sources changes, and combines the
//! per-source amplitude and spectrum once per frame.
//!
//! When both sources are active they are combined as
//! `sqrt(a_file² + a_mic²)`, bin by bin for the spectrum. This adds
//! energies and ignores phase.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::host::{AudioHost, ControlMessage, ControlPort, PlaybackClock};
use super::ring::Consumer;
use super::source::{decode_wav, find_input_device, DecodedAudio};
use super::spectrum::SpectrumAnalyser;
use super::AudioFeatureRecord;
use crate::error::Result;
use crate::params::AudioConfig;

/// Which sources currently contribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Neither,
    File,
    Capture,
    Both,
}

impl SourceState {
    fn from_flags(file: bool, capture: bool) -> Self {
        match (file, capture) {
            (false, false) => Self::Neither,
            (true, false) => Self::File,
            (false, true) => Self::Capture,
            (true, true) => Self::Both,
        }
    }

    pub fn capture_active(self) -> bool {
        matches!(self, Self::Capture | Self::Both)
    }
}

/// File transport as seen by the frame clock
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FileTransport {
    pub started: bool,
    pub playing: bool,
    pub position_s: f64,
}

struct FileSource {
    path: PathBuf,
    audio: DecodedAudio,
    clock: Arc<PlaybackClock>,
    analyser: SpectrumAnalyser,
    started: bool,
    playing: bool,
}

struct CaptureSource {
    device_id: Option<String>,
    analyser: SpectrumAnalyser,
    scratch: Vec<f32>,
}

// Field order is teardown order: streams stop before their rings drop.
struct RunningHost {
    host: AudioHost,
    features: Consumer<AudioFeatureRecord>,
    capture_tap: Option<Consumer<f32>>,
}

pub struct AudioGraph {
    config: AudioConfig,
    port: Arc<ControlPort>,
    file: Option<FileSource>,
    capture: Option<CaptureSource>,
    running: Option<RunningHost>,

    /// Overruns from channels already torn down
    dropped_before: u64,

    spectrum: Vec<f32>,
    amplitude: f32,
}

impl AudioGraph {
    pub fn new(config: AudioConfig) -> Self {
        let bins = config.frequency_bins();
        Self {
            config,
            port: Arc::new(ControlPort::default()),
            file: None,
            capture: None,
            running: None,
            dropped_before: 0,
            spectrum: vec![0.0; bins],
            amplitude: 0.0,
        }
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Replace the file source and start playing it.
    ///
    /// The previous file is released before the new one is decoded. On
    /// failure the graph keeps running without a file source.
    pub fn start_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.release_file();
        self.shutdown_host();

        let started = decode_wav(path).and_then(|audio| {
            let clock = Arc::new(PlaybackClock::new(audio.sample_rate_hz));
            self.file = Some(FileSource {
                path: path.to_path_buf(),
                audio,
                clock,
                analyser: SpectrumAnalyser::new(&self.config),
                started: true,
                playing: true,
            });
            self.rebuild()
        });

        if let Err(e) = started {
            tracing::warn!(path = %path.display(), error = %e, "File source failed to start");
            self.file = None;
            self.recover();
            return Err(e);
        }
        tracing::info!(path = %path.display(), "File source started");
        Ok(())
    }

    /// Release the file source. Idempotent.
    pub fn stop_file(&mut self) {
        if self.file.is_none() {
            return;
        }
        self.release_file();
        self.recover();
    }

    /// Pause or resume the file source. Returns whether it is now playing.
    /// A file that reached its end restarts from the beginning.
    pub fn toggle_playback(&mut self) -> bool {
        let Some(file) = self.file.as_mut() else {
            return false;
        };
        if !file.started {
            self.port.request_rewind();
            file.started = true;
            file.playing = true;
        } else {
            file.playing = !file.playing;
        }
        let playing = file.playing;
        tracing::debug!(playing, "File playback toggled");
        self.publish_control();
        playing
    }

    /// Start capture, or stop it if active. Returns whether capture is now
    /// active. A device that cannot be opened leaves capture off.
    pub fn toggle_capture(&mut self, device_id: Option<&str>) -> Result<bool> {
        if self.capture.is_some() {
            self.stop_capture();
            return Ok(false);
        }
        self.start_capture(device_id)?;
        Ok(true)
    }

    pub fn start_capture(&mut self, device_id: Option<&str>) -> Result<()> {
        self.shutdown_host();
        self.capture = Some(CaptureSource {
            device_id: device_id.map(str::to_string),
            analyser: SpectrumAnalyser::new(&self.config),
            scratch: vec![0.0; self.config.fft_size],
        });
        if let Err(e) = self.rebuild() {
            tracing::warn!(device = ?device_id, error = %e, "Capture failed to start");
            self.capture = None;
            self.recover();
            return Err(e);
        }
        tracing::info!(device = ?device_id, "Capture started");
        Ok(())
    }

    /// Stop capture. Idempotent.
    pub fn stop_capture(&mut self) {
        if self.capture.take().is_none() {
            return;
        }
        tracing::info!("Capture stopped");
        self.recover();
    }

    /// Stop every source and tear the host down. Idempotent.
    pub fn stop(&mut self) {
        self.shutdown_host();
        self.file = None;
        self.capture = None;
        self.spectrum.fill(0.0);
        self.amplitude = 0.0;
        self.publish_control();
    }

    /// Move pending feature records into `out`; returns how many.
    pub fn drain_features(&mut self, out: &mut [AudioFeatureRecord]) -> usize {
        match self.running.as_mut() {
            Some(running) => running.features.drain_into(out),
            None => 0,
        }
    }

    /// Refresh per-source snapshots and the combined outputs. Called once
    /// per frame. While [`is_frozen`](Self::is_frozen) the previous outputs
    /// are kept as they are.
    pub fn update(&mut self) {
        if self.is_frozen() {
            return;
        }

        let rewinding = self.port.rewind_pending();
        let mut ended = false;
        if let Some(file) = self.file.as_mut() {
            if file.started && !rewinding && file.clock.has_ended() {
                file.started = false;
                file.playing = false;
                file.analyser.reset();
                ended = true;
                tracing::info!(path = %file.path.display(), "File source ended");
            }
            if file.playing {
                let position = file.clock.position_frames() as usize;
                file.analyser.load_window(&file.audio.samples, position);
                file.analyser.update();
            }
        }
        if ended {
            self.publish_control();
        }

        if let Some(capture) = self.capture.as_mut() {
            if let Some(tap) = self.running.as_mut().and_then(|r| r.capture_tap.as_mut()) {
                loop {
                    let n = tap.drain_into(&mut capture.scratch);
                    if n == 0 {
                        break;
                    }
                    capture.analyser.push_samples(&capture.scratch[..n]);
                }
            }
            capture.analyser.update();
        }

        let file = self
            .file
            .as_ref()
            .filter(|f| f.playing)
            .map(|f| &f.analyser);
        let mic = self.capture.as_ref().map(|c| &c.analyser);

        self.amplitude = combine_amplitudes(
            file.map(|a| a.average_amplitude()),
            mic.map(|a| a.average_amplitude()),
        );
        combine_spectra(
            file.map(|a| a.snapshot()),
            mic.map(|a| a.snapshot()),
            &mut self.spectrum,
        );
    }

    /// A started file is paused and no capture runs: downstream state holds
    pub fn is_frozen(&self) -> bool {
        self.capture.is_none() && self.file.as_ref().is_some_and(|f| f.started && !f.playing)
    }

    pub fn state(&self) -> SourceState {
        let file = self.file.as_ref().is_some_and(|f| f.playing);
        SourceState::from_flags(file, self.capture.is_some())
    }

    pub fn file_transport(&self) -> FileTransport {
        match &self.file {
            Some(file) => FileTransport {
                started: file.started,
                playing: file.playing,
                position_s: if self.port.rewind_pending() {
                    0.0
                } else {
                    file.clock.position_s()
                },
            },
            None => FileTransport::default(),
        }
    }

    /// Combined amplitude, 0 when no source is active
    pub fn average_amplitude(&self) -> f32 {
        self.amplitude
    }

    /// Combined spectrum, `fft_size / 2` bins
    pub fn spectrum(&self) -> &[f32] {
        &self.spectrum
    }

    /// Feature records lost to ring overruns since construction
    pub fn dropped_records(&self) -> u64 {
        self.dropped_before + self.running.as_ref().map_or(0, |r| r.features.dropped())
    }

    fn release_file(&mut self) {
        if let Some(file) = self.file.take() {
            tracing::debug!(path = %file.path.display(), "Releasing file source");
        }
    }

    fn shutdown_host(&mut self) {
        if let Some(running) = self.running.take() {
            let RunningHost {
                host,
                features,
                capture_tap,
            } = running;
            drop(host);
            self.dropped_before += features.dropped();
            drop(capture_tap);
            drop(features);
        }
    }

    /// Start a host for the current sources (none if there are none)
    fn rebuild(&mut self) -> Result<()> {
        self.shutdown_host();
        self.publish_control();
        if self.file.is_none() && self.capture.is_none() {
            return Ok(());
        }

        let device = match &self.capture {
            Some(capture) => Some(find_input_device(capture.device_id.as_deref())?),
            None => None,
        };
        let file = self
            .file
            .as_ref()
            .map(|f| (&f.audio, Arc::clone(&f.clock)));

        let (host, outputs) =
            AudioHost::start(&self.config, Arc::clone(&self.port), file, device.as_ref())?;
        self.running = Some(RunningHost {
            host,
            features: outputs.features,
            capture_tap: outputs.capture_tap,
        });
        self.publish_control();
        Ok(())
    }

    /// Best-effort rebuild after a source was removed or failed to start
    fn recover(&mut self) {
        if let Err(e) = self.rebuild() {
            tracing::error!(error = %e, "Audio host could not be restarted");
            self.shutdown_host();
            self.file = None;
            self.capture = None;
            self.publish_control();
        }
        if self.state() == SourceState::Neither {
            self.spectrum.fill(0.0);
            self.amplitude = 0.0;
        }
    }

    fn publish_control(&self) {
        self.port.send(ControlMessage {
            is_playing: self.file.as_ref().is_some_and(|f| f.playing),
            mic_active: self.capture.is_some(),
            block_size: self.config.block_size,
            sample_rate_hz: self
                .running
                .as_ref()
                .map_or(0, |r| r.host.sample_rate_hz()),
            capacity: self.config.capacity,
        });
    }
}

impl Drop for AudioGraph {
    fn drop(&mut self) {
        self.shutdown_host();
    }
}

/// Energy-additive amplitude combination
pub fn combine_amplitudes(file: Option<f32>, mic: Option<f32>) -> f32 {
    match (file, mic) {
        (Some(a), Some(b)) => (a * a + b * b).sqrt(),
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => 0.0,
    }
}

/// Energy-additive spectrum combination into `out`
pub fn combine_spectra(file: Option<&[f32]>, mic: Option<&[f32]>, out: &mut [f32]) {
    match (file, mic) {
        (Some(a), Some(b)) => {
            for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b)) {
                *o = (x * x + y * y).sqrt();
            }
        }
        (Some(a), None) | (None, Some(a)) => {
            let n = out.len().min(a.len());
            out[..n].copy_from_slice(&a[..n]);
        }
        (None, None) => out.fill(0.0),
    }
}

#[cfg(test)]
impl AudioGraph {
    /// Install an in-memory file source without building a host
    pub(crate) fn attach_file(&mut self, started: bool, playing: bool) {
        self.file = Some(FileSource {
            path: PathBuf::from("loaded.wav"),
            audio: DecodedAudio {
                samples: vec![0.0; 64].into(),
                sample_rate_hz: 44100,
            },
            clock: Arc::new(PlaybackClock::new(44100)),
            analyser: SpectrumAnalyser::new(&AudioConfig::default()),
            started,
            playing,
        });
    }
}
