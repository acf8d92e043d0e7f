//! Audio analysis and transport configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Analysis and transport parameters shared by the audio host and the
/// render-side analysers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Samples per feature-extraction block (power of 2)
    /// 2048 @ 44.1kHz ≈ 46ms, ~21 records per second
    pub block_size: usize,

    /// Analyser FFT window for spectrum snapshots (power of 2)
    /// Yields `fft_size / 2` frequency bins
    pub fft_size: usize,

    /// Ring channel capacity in feature records
    pub capacity: usize,

    /// Lowest pitch considered by the peak picker (Hz)
    pub min_pitch_hz: f32,

    /// Highest pitch considered by the peak picker (Hz)
    pub max_pitch_hz: f32,

    /// Analyser smoothing between snapshots (0 = none, 1 = frozen)
    pub smoothing: f32,

    /// Analyser floor, maps to 0.0 (dBFS)
    pub min_decibels: f32,

    /// Analyser ceiling, maps to 1.0 (dBFS)
    pub max_decibels: f32,

    /// Timeout for building device streams (milliseconds)
    pub stream_timeout_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            block_size: 2048,
            fft_size: 4096,
            capacity: 5,
            min_pitch_hz: 40.0,
            max_pitch_hz: 5000.0,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            stream_timeout_ms: 2000,
        }
    }
}

impl AudioConfig {
    /// Number of frequency bins in a spectrum snapshot
    pub fn frequency_bins(&self) -> usize {
        self.fft_size / 2
    }

    /// Convert frequency (Hz) to FFT bin index for a given window size
    pub fn hz_to_bin(hz: f32, window: usize, sample_rate_hz: u32) -> usize {
        ((hz * window as f32) / sample_rate_hz as f32) as usize
    }

    pub fn validate(&self) -> Result<()> {
        if !self.block_size.is_power_of_two() || self.block_size < 64 {
            return Err(Error::config(format!(
                "block size must be a power of 2 >= 64, got {}",
                self.block_size
            )));
        }
        if !self.fft_size.is_power_of_two() || self.fft_size < 64 {
            return Err(Error::config(format!(
                "FFT size must be a power of 2 >= 64, got {}",
                self.fft_size
            )));
        }
        if self.capacity == 0 {
            return Err(Error::config("ring capacity must be > 0"));
        }
        if !(self.min_pitch_hz > 0.0 && self.min_pitch_hz < self.max_pitch_hz) {
            return Err(Error::config(format!(
                "pitch range {}..{} Hz is empty",
                self.min_pitch_hz, self.max_pitch_hz
            )));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(Error::config("smoothing must be in [0, 1)"));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(Error::config("min_decibels must be below max_decibels"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(AudioConfig::default().validate().is_ok());
        assert_eq!(AudioConfig::default().frequency_bins(), 2048);
    }

    #[test]
    fn test_hz_to_bin() {
        // 44100 / 2048 ≈ 21.5 Hz per bin
        assert_eq!(AudioConfig::hz_to_bin(0.0, 2048, 44100), 0);
        assert_eq!(AudioConfig::hz_to_bin(440.0, 2048, 44100), 20);
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        let config = AudioConfig {
            block_size: 1000,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }
}
