//! Per-block pitch, confidence and RMS extraction.
//!
//! Runs inside the audio callback: every buffer is sized at construction
//! and the FFT is planned up front, so `push_sample` never allocates.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::ring::Producer;
use super::{AudioFeatureRecord, RMS_FLOOR};
use crate::params::AudioConfig;

/// Bins either side of the peak counted toward confidence
const PEAK_HALF_WIDTH: usize = 2;

/// Below this in-range energy a block is treated as silent
const ENERGY_EPSILON: f32 = 1e-12;

pub struct FeatureExtractor {
    block_size: usize,
    sample_rate_hz: u32,
    min_bin: usize,
    max_bin: usize,

    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    samples: Vec<f32>,
    filled: usize,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl FeatureExtractor {
    pub fn new(config: &AudioConfig, sample_rate_hz: u32) -> Self {
        let n = config.block_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);
        let scratch_len = fft.get_inplace_scratch_len();

        let nyquist_bin = n / 2 - 1;
        let min_bin = AudioConfig::hz_to_bin(config.min_pitch_hz, n, sample_rate_hz).max(1);
        let max_bin = AudioConfig::hz_to_bin(config.max_pitch_hz, n, sample_rate_hz)
            .min(nyquist_bin)
            .max(min_bin);

        Self {
            block_size: n,
            sample_rate_hz,
            min_bin,
            max_bin,
            fft,
            window: (0..n).map(|i| hann_window(i, n)).collect(),
            samples: vec![0.0; n],
            filled: 0,
            spectrum: vec![Complex::new(0.0, 0.0); n],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            magnitudes: vec![0.0; n / 2],
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Accumulate one sample; on a full block, analyse it and publish the
    /// record. A full channel drops the record (counted by the channel).
    pub fn push_sample(&mut self, sample: f32, out: &mut Producer<AudioFeatureRecord>) {
        self.samples[self.filled] = sample;
        self.filled += 1;
        if self.filled == self.block_size {
            self.filled = 0;
            let record = self.analyze_current();
            out.push(record);
        }
    }

    pub fn push_samples(&mut self, samples: &[f32], out: &mut Producer<AudioFeatureRecord>) {
        for &s in samples {
            self.push_sample(s, out);
        }
    }

    /// Discard a partially filled block
    pub fn reset(&mut self) {
        self.filled = 0;
    }

    /// Analyse one full block directly.
    ///
    /// # Panics
    /// Panics if `block.len()` differs from the configured block size.
    pub fn analyze(&mut self, block: &[f32]) -> AudioFeatureRecord {
        assert_eq!(block.len(), self.block_size, "block size mismatch");
        self.samples.copy_from_slice(block);
        self.analyze_current()
    }

    fn analyze_current(&mut self) -> AudioFeatureRecord {
        let n = self.block_size;

        let mut sum_sq = 0.0f32;
        for i in 0..n {
            let s = self.samples[i];
            sum_sq += s * s;
            self.spectrum[i] = Complex::new(s * self.window[i], 0.0);
        }
        let rms = (sum_sq / n as f32).sqrt() + RMS_FLOOR;

        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);
        for (mag, c) in self.magnitudes.iter_mut().zip(&self.spectrum) {
            *mag = c.norm();
        }

        let (pitch_hz, confidence) = self.estimate_pitch();
        AudioFeatureRecord {
            pitch_hz,
            confidence,
            rms,
        }
    }

    /// Strongest in-range peak refined by parabolic interpolation over log
    /// magnitudes.
    fn estimate_pitch(&self) -> (f32, f32) {
        let mags = &self.magnitudes;

        let mut peak = self.min_bin;
        let mut total = 0.0f32;
        for k in self.min_bin..=self.max_bin {
            total += mags[k] * mags[k];
            if mags[k] > mags[peak] {
                peak = k;
            }
        }
        if total < ENERGY_EPSILON {
            return (0.0, 0.0);
        }

        let lo = peak.saturating_sub(PEAK_HALF_WIDTH).max(self.min_bin);
        let hi = (peak + PEAK_HALF_WIDTH).min(self.max_bin);
        let near: f32 = mags[lo..=hi].iter().map(|m| m * m).sum();
        let confidence = (near / total).clamp(0.0, 1.0);

        let mut offset = 0.0;
        if peak > 0 && peak + 1 < mags.len() {
            let a = (mags[peak - 1] + ENERGY_EPSILON).ln();
            let b = (mags[peak] + ENERGY_EPSILON).ln();
            let c = (mags[peak + 1] + ENERGY_EPSILON).ln();
            let denom = a - 2.0 * b + c;
            if denom.abs() > f32::EPSILON {
                offset = (0.5 * (a - c) / denom).clamp(-0.5, 0.5);
            }
        }

        let bin_hz = self.sample_rate_hz as f32 / self.block_size as f32;
        ((peak as f32 + offset) * bin_hz, confidence)
    }
}

/// Hann window function for FFT analysis
pub fn hann_window(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ring;
    use approx::assert_abs_diff_eq;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect()
    }

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(&AudioConfig::default(), 44100)
    }

    #[test]
    fn test_hann_window() {
        let size = 1024;

        // Hann window should be 0 at edges, 1 at center
        assert!((hann_window(0, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size - 1, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size / 2, size) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_sine_440_pitch() {
        let mut fx = extractor();
        let record = fx.analyze(&sine(440.0, 44100, 2048));
        assert_abs_diff_eq!(record.pitch_hz, 440.0, epsilon = 2.0);
        assert!(record.confidence > 0.8, "confidence {}", record.confidence);
        // 0.5 amplitude sine: rms = 0.5 / sqrt(2)
        assert_abs_diff_eq!(record.rms, 0.3536, epsilon = 0.01);
    }

    #[test]
    fn test_other_pitches() {
        let mut fx = extractor();
        for freq in [97.0, 1000.0, 2500.0] {
            let record = fx.analyze(&sine(freq, 44100, 2048));
            assert_abs_diff_eq!(record.pitch_hz, freq, epsilon = 2.0);
        }
    }

    #[test]
    fn test_silence_is_finite() {
        let mut fx = extractor();
        let record = fx.analyze(&vec![0.0; 2048]);
        assert_abs_diff_eq!(record.rms, RMS_FLOOR, epsilon = 1e-9);
        assert_eq!(record.pitch_hz, 0.0);
        assert_eq!(record.confidence, 0.0);
        assert!(record.log_rms().is_finite());
    }

    #[test]
    fn test_one_record_per_block() {
        let mut fx = extractor();
        let (mut tx, mut rx) = ring::channel(5);
        let input = sine(440.0, 44100, 2048 * 3 + 100);
        fx.push_samples(&input, &mut tx);
        assert_eq!(rx.available(), 3);
        let record = rx.pop().unwrap();
        assert_abs_diff_eq!(record.pitch_hz, 440.0, epsilon = 2.0);
    }

    #[test]
    fn test_full_channel_drops_records() {
        let mut fx = extractor();
        let (mut tx, rx) = ring::channel(2);
        fx.push_samples(&vec![0.1; 2048 * 4], &mut tx);
        assert_eq!(rx.available(), 2);
        assert_eq!(rx.dropped(), 2);
    }
}
