//! Particle field parameters (compute stage uniforms and rest geometry).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Particle integration mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementMode {
    /// Direct lerp toward the attractor
    #[default]
    Quickest,
    /// Flow-field perturbed path blended with direct attraction
    Smoothed,
}

impl MovementMode {
    /// Flag value passed to the particle shader
    pub fn as_flag(self) -> u32 {
        match self {
            Self::Quickest => 0,
            Self::Smoothed => 1,
        }
    }
}

/// Parameters for the scalar field, zero-point and particle stages.
///
/// Pure configuration: uploaded as uniforms, never written by the GPU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleParameters {
    /// Number of simulated particles
    pub count: usize,

    /// Sphere radius of the rest geometry (world units)
    pub radius: f32,

    /// Zero-point band half-width ε on |value(p)|
    pub threshold: f32,

    /// Tighter ε used for surface particles when `surface_control` is on
    pub surface_threshold: f32,

    /// Apply `surface_threshold` to particles near the outer radius
    pub surface_control: bool,

    /// Fraction of rest positions placed on the sphere surface
    pub surface_ratio: f32,

    /// Flow-field displacement scale (smoothed mode)
    pub flow_field_strength: f32,

    /// Flow-field spatial frequency (cycles per world unit)
    pub flow_field_frequency: f32,

    /// Blend of flow-field vs direct attraction, 0..1 (smoothed mode)
    pub flow_field_influence: f32,

    /// Approach rate toward the attractor (per second)
    pub particle_speed: f32,

    pub movement_mode: MovementMode,

    /// Particles never leave radius × tolerance
    pub distance_tolerance: f32,

    /// How far spectrum bands may attenuate component amplitudes, 0..1
    pub audio_influence: f32,

    /// Mode-number shift per octave of detected pitch above 110 Hz
    pub pitch_mode_scale: f32,

    /// Minimum pitch confidence before pitch shifts mode numbers
    pub min_confidence: f32,

    /// Below this average amplitude particles return to rest
    pub amplitude_floor: f32,

    /// Seed for volume rest positions
    pub seed: u64,
}

impl Default for ParticleParameters {
    fn default() -> Self {
        Self {
            count: 100_000,
            radius: 3.0,
            threshold: 0.05,
            surface_threshold: 0.01,
            surface_control: true,
            surface_ratio: 0.33,
            flow_field_strength: 2.0,
            flow_field_frequency: 0.5,
            flow_field_influence: 0.5,
            particle_speed: 1.5,
            movement_mode: MovementMode::Quickest,
            distance_tolerance: 1.05,
            audio_influence: 0.5,
            pitch_mode_scale: 1.0,
            min_confidence: 0.5,
            amplitude_floor: 0.01,
            seed: 7,
        }
    }
}

impl ParticleParameters {
    /// Side length P of the square state textures (P = ceil(sqrt(count)))
    pub fn texture_size(&self) -> u32 {
        texture_size_for(self.count)
    }

    /// Validate against the device's 2D texture limit
    pub fn validate(&self, max_texture_dimension: u32) -> Result<()> {
        if self.count == 0 {
            return Err(Error::config("particle count must be > 0"));
        }
        let side = self.texture_size();
        if side > max_texture_dimension {
            return Err(Error::config(format!(
                "particle count {} needs {}x{} textures, device limit is {}",
                self.count, side, side, max_texture_dimension
            )));
        }
        if !(self.radius > 0.0 && self.radius.is_finite()) {
            return Err(Error::config(format!("radius must be > 0, got {}", self.radius)));
        }
        if !(self.threshold > 0.0) || !(self.surface_threshold > 0.0) {
            return Err(Error::config("thresholds must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.surface_ratio) {
            return Err(Error::config("surface ratio must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.flow_field_influence)
            || !(0.0..=1.0).contains(&self.audio_influence)
        {
            return Err(Error::config("influence factors must be in [0, 1]"));
        }
        if self.particle_speed < 0.0 {
            return Err(Error::config("particle speed must be >= 0"));
        }
        if self.distance_tolerance < 1.0 {
            return Err(Error::config("distance tolerance must be >= 1"));
        }
        Ok(())
    }

    /// True when a change requires new rest positions
    pub fn geometry_differs(&self, other: &Self) -> bool {
        self.count != other.count
            || self.radius != other.radius
            || self.surface_ratio != other.surface_ratio
            || self.seed != other.seed
    }
}

/// Side length of a square texture holding `count` texels
pub fn texture_size_for(count: usize) -> u32 {
    let mut side = (count as f64).sqrt().ceil() as u64;
    // Guard float rounding at perfect squares
    while side * side < count as u64 {
        side += 1;
    }
    side as u32
}
