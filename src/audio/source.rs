//! Source setup: WAV decode and capture device lookup.
//!
//! Everything here runs on the control path (never in a callback) and may
//! block on I/O or the audio host.

use std::path::Path;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::{Error, Result};

/// A fully decoded file source, downmixed to mono
#[derive(Clone)]
pub struct DecodedAudio {
    pub samples: Arc<[f32]>,
    pub sample_rate_hz: u32,
}

impl DecodedAudio {
    pub fn duration_s(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate_hz as f64
    }
}

impl std::fmt::Debug for DecodedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedAudio")
            .field("frames", &self.samples.len())
            .field("sample_rate_hz", &self.sample_rate_hz)
            .finish()
    }
}

/// Decode a WAV file into mono f32 samples
pub fn decode_wav(path: impl AsRef<Path>) -> Result<DecodedAudio> {
    let path = path.as_ref();
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    if interleaved.is_empty() {
        return Err(Error::setup(format!("{} contains no samples", path.display())));
    }

    let samples: Vec<f32> = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    tracing::info!(
        path = %path.display(),
        frames = samples.len(),
        sample_rate_hz = spec.sample_rate,
        channels,
        "Decoded audio file"
    );

    Ok(DecodedAudio {
        samples: samples.into(),
        sample_rate_hz: spec.sample_rate,
    })
}

/// Names of the available capture devices
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| Error::setup(format!("cannot enumerate input devices: {}", e)))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Find a capture device by name, or the default one
pub fn find_input_device(device_id: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    match device_id {
        None => host
            .default_input_device()
            .ok_or_else(|| Error::setup("no audio input device found")),
        Some(id) => host
            .input_devices()
            .map_err(|e| Error::setup(format!("cannot enumerate input devices: {}", e)))?
            .find(|d| d.name().map(|n| n == id).unwrap_or(false))
            .ok_or_else(|| Error::setup(format!("input device '{}' not found", id))),
    }
}

pub fn default_output_device() -> Result<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::setup("no audio output device found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, frames: &[[i16; 2]]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for &s in &frame[..channels as usize] {
                writer.write_sample(s).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_decode_downmixes_stereo() {
        let path = std::env::temp_dir().join("baryon_decode_stereo.wav");
        write_wav(&path, 2, &[[16384, 0], [-16384, -16384], [0, 0]]);

        let audio = decode_wav(&path).unwrap();
        assert_eq!(audio.sample_rate_hz, 22050);
        assert_eq!(audio.samples.len(), 3);
        assert!((audio.samples[0] - 0.25).abs() < 1e-4);
        assert!((audio.samples[1] + 0.5).abs() < 1e-4);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = decode_wav("/nonexistent/baryon.wav").unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_empty_file_is_setup_failure() {
        let path = std::env::temp_dir().join("baryon_decode_empty.wav");
        write_wav(&path, 1, &[]);
        assert!(matches!(decode_wav(&path), Err(Error::Setup(_))));
        let _ = std::fs::remove_file(path);
    }
}
