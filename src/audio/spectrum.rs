//! Render-side frequency analyser.
//!
//! Keeps the most recent `fft_size` samples of a source and produces a
//! normalized snapshot of `fft_size / 2` bins: Hann window, magnitude
//! scaled by 1/N, exponential smoothing across snapshots, dB mapped from
//! `[min_decibels, max_decibels]` onto `[0, 1]`.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::features::hann_window;
use crate::params::AudioConfig;

pub struct SpectrumAnalyser {
    fft_size: usize,
    smoothing: f32,
    min_db: f32,
    max_db: f32,

    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    history: Vec<f32>,
    head: usize,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    normalized: Vec<f32>,
    average: f32,
}

impl SpectrumAnalyser {
    pub fn new(config: &AudioConfig) -> Self {
        let n = config.fft_size;
        let mut planner = FftPlanner::new();
        Self {
            fft_size: n,
            smoothing: config.smoothing,
            min_db: config.min_decibels,
            max_db: config.max_decibels,
            fft: planner.plan_fft_forward(n),
            window: (0..n).map(|i| hann_window(i, n)).collect(),
            history: vec![0.0; n],
            head: 0,
            buffer: vec![Complex::new(0.0, 0.0); n],
            smoothed: vec![0.0; n / 2],
            normalized: vec![0.0; n / 2],
            average: 0.0,
        }
    }

    pub fn bins(&self) -> usize {
        self.fft_size / 2
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Append samples to the analysis history, oldest first
    pub fn push_samples(&mut self, samples: &[f32]) {
        for &s in samples {
            self.history[self.head] = s;
            self.head = (self.head + 1) % self.fft_size;
        }
    }

    /// Replace the history with the `fft_size` samples ending at `end`
    /// (zero padded before the start of `samples`)
    pub fn load_window(&mut self, samples: &[f32], end: usize) {
        let end = end.min(samples.len());
        let start = end.saturating_sub(self.fft_size);
        let pad = self.fft_size - (end - start);
        self.history[..pad].fill(0.0);
        self.history[pad..].copy_from_slice(&samples[start..end]);
        self.head = 0;
    }

    /// Recompute the snapshot from the current history
    pub fn update(&mut self) {
        let n = self.fft_size;
        for i in 0..n {
            let s = self.history[(self.head + i) % n];
            self.buffer[i] = Complex::new(s * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        let scale = 1.0 / n as f32;
        let range = self.max_db - self.min_db;
        let mut sum = 0.0;
        for k in 0..self.bins() {
            let magnitude = self.buffer[k].norm() * scale;
            let smoothed = self.smoothing * self.smoothed[k] + (1.0 - self.smoothing) * magnitude;
            self.smoothed[k] = smoothed;

            let db = 20.0 * smoothed.max(f32::MIN_POSITIVE).log10();
            let value = ((db - self.min_db) / range).clamp(0.0, 1.0);
            self.normalized[k] = value;
            sum += value;
        }
        self.average = sum / self.bins() as f32;
    }

    /// Normalized bins, 0..1
    pub fn snapshot(&self) -> &[f32] {
        &self.normalized
    }

    /// Mean of the normalized bins
    pub fn average_amplitude(&self) -> f32 {
        self.average
    }

    /// Forget history and smoothing state
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.head = 0;
        self.smoothed.fill(0.0);
        self.normalized.fill(0.0);
        self.average = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn config() -> AudioConfig {
        AudioConfig {
            fft_size: 1024,
            smoothing: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_silence_is_zero() {
        let mut analyser = SpectrumAnalyser::new(&config());
        analyser.update();
        assert_eq!(analyser.average_amplitude(), 0.0);
        assert!(analyser.snapshot().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_tone_peaks_at_its_bin() {
        let mut analyser = SpectrumAnalyser::new(&config());
        let tone: Vec<f32> = (0..1024)
            .map(|i| (2.0 * PI * 64.0 * i as f32 / 1024.0).sin())
            .collect();
        analyser.push_samples(&tone);
        analyser.update();

        let snapshot = analyser.snapshot();
        assert_eq!(snapshot.len(), 512);
        assert!(snapshot[64] > 0.9);
        assert!(snapshot[300] < snapshot[64]);
        assert!(analyser.average_amplitude() > 0.0);
    }

    #[test]
    fn test_load_window_pads_start() {
        let mut analyser = SpectrumAnalyser::new(&config());
        analyser.load_window(&[1.0; 600], 600);
        analyser.update();
        assert!(analyser.average_amplitude() > 0.0);

        analyser.reset();
        assert_eq!(analyser.average_amplitude(), 0.0);
    }
}
