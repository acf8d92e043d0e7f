//! Chladni-style scalar field over rest-position space.
//!
//! `value(p) = Σ Aᵢ · sin(uᵢπx) · sin(vᵢπy) · sin(wᵢπz)`. Its zero crossings
//! are the nodal surfaces particles are attracted to. The GPU field stage
//! computes the same function; these CPU versions are the reference the
//! shaders are checked against.

mod transition;
mod waves;

use std::f32::consts::PI;

use glam::Vec3;

pub use transition::WaveTransition;
pub use waves::{validate_components, WaveComponent, WaveGenerator};

use crate::params::MAX_WAVE_COMPONENTS;

/// Pitch that maps to a mode shift of 0
pub const REFERENCE_PITCH_HZ: f32 = 110.0;

/// Largest mode-number shift pitch may apply
pub const MAX_MODE_SHIFT: i32 = 4;

/// Audio-driven adjustments applied to every component
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldModulation {
    /// Per-component amplitude gains, each in `[0, 1]`
    pub gains: [f32; MAX_WAVE_COMPONENTS],
    /// Added to u, v and w
    pub mode_shift: i32,
}

impl Default for FieldModulation {
    fn default() -> Self {
        Self {
            gains: [1.0; MAX_WAVE_COMPONENTS],
            mode_shift: 0,
        }
    }
}

pub fn evaluate(components: &[WaveComponent], p: Vec3) -> f32 {
    evaluate_modulated(components, p, &FieldModulation::default())
}

pub fn evaluate_modulated(
    components: &[WaveComponent],
    p: Vec3,
    modulation: &FieldModulation,
) -> f32 {
    components
        .iter()
        .zip(modulation.gains.iter())
        .map(|(c, &gain)| {
            let u = (c.u + modulation.mode_shift) as f32;
            let v = (c.v + modulation.mode_shift) as f32;
            let w = (c.w + modulation.mode_shift) as f32;
            gain * c.amplitude * (u * PI * p.x).sin() * (v * PI * p.y).sin() * (w * PI * p.z).sin()
        })
        .sum()
}

/// `(1 - b) · f(current) + b · f(target)`
pub fn evaluate_blended(
    current: &[WaveComponent],
    target: &[WaveComponent],
    blend: f32,
    p: Vec3,
    modulation: &FieldModulation,
) -> f32 {
    let b = blend.clamp(0.0, 1.0);
    let a = evaluate_modulated(current, p, modulation);
    if b == 0.0 {
        return a;
    }
    (1.0 - b) * a + b * evaluate_modulated(target, p, modulation)
}

/// Upper bound on |value(p)|
pub fn amplitude_bound(components: &[WaveComponent]) -> f32 {
    components.iter().map(|c| c.amplitude.abs()).sum()
}

/// Amplitude gain for a spectrum band level in `[0, 1]`. Stays within
/// `[1 - influence, 1]` so modulation never raises the bound.
pub fn band_gain(band: f32, influence: f32) -> f32 {
    1.0 - influence.clamp(0.0, 1.0) * (1.0 - band.clamp(0.0, 1.0))
}

/// Integer octave offset of a confident pitch above [`REFERENCE_PITCH_HZ`]
pub fn pitch_mode_shift(pitch_hz: f32, confidence: f32, scale: f32, min_confidence: f32) -> i32 {
    if confidence < min_confidence || pitch_hz <= REFERENCE_PITCH_HZ {
        return 0;
    }
    let octaves = (pitch_hz / REFERENCE_PITCH_HZ).log2();
    ((octaves * scale).round() as i32).clamp(0, MAX_MODE_SHIFT)
}

/// True when `value` lies inside the nodal band of half-width `epsilon`
pub fn is_zero_point(value: f32, epsilon: f32) -> bool {
    value.abs() < epsilon
}
