//! Ranges for random wave component sets and transition timing.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound on wave components uploaded to the scalar field stage
pub const MAX_WAVE_COMPONENTS: usize = 32;

/// Generation ranges for random Chladni-style component sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveRanges {
    /// Number of components per set
    pub count: usize,

    pub min_amplitude: f32,
    pub max_amplitude: f32,

    /// Inclusive range for the u, v, w mode numbers
    pub min_mode: i32,
    pub max_mode: i32,

    /// Blend time when switching component sets (seconds, 0 = immediate)
    pub transition_duration_s: f32,

    pub seed: u64,
}

impl Default for WaveRanges {
    fn default() -> Self {
        Self {
            count: 12,
            min_amplitude: 1.0,
            max_amplitude: 4.0,
            min_mode: 1,
            max_mode: 10,
            transition_duration_s: 1.0,
            seed: 42,
        }
    }
}

impl WaveRanges {
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 || self.count > MAX_WAVE_COMPONENTS {
            return Err(Error::config(format!(
                "wave component count must be in 1..={}, got {}",
                MAX_WAVE_COMPONENTS, self.count
            )));
        }
        if self.min_amplitude > self.max_amplitude {
            return Err(Error::config("min_amplitude exceeds max_amplitude"));
        }
        if self.min_mode > self.max_mode {
            return Err(Error::config("min_mode exceeds max_mode"));
        }
        if self.transition_duration_s < 0.0 {
            return Err(Error::config("transition duration must be >= 0"));
        }
        Ok(())
    }
}
