//! Parameter definitions with physical units and documented semantics.
//!
//! All magic numbers are extracted here with:
//! - Units (seconds, Hz, dBFS, world units)
//! - Documented ranges and meanings
//! - A `validate()` that rejects values the core cannot run with

mod audio;
mod config;
mod particles;
mod render;
mod waves;

pub use audio::AudioConfig;
pub use config::Config;
pub use particles::{texture_size_for, MovementMode, ParticleParameters};
pub use render::{RecordingConfig, RunConfig};
pub use waves::{WaveRanges, MAX_WAVE_COMPONENTS};
