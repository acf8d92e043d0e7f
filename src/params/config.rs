//! Top-level configuration file (TOML).

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{AudioConfig, ParticleParameters, RunConfig, WaveRanges};
use crate::error::Result;

/// Everything the driver reads from a config file. Missing sections fall
/// back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub particles: ParticleParameters,
    pub waves: WaveRanges,
    pub run: RunConfig,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate_static()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Checks that do not depend on device limits
    pub fn validate_static(&self) -> Result<()> {
        self.audio.validate()?;
        self.waves.validate()?;
        self.run.validate()?;
        self.particles.validate(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::params::MovementMode;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [particles]
            count = 4096
            movement_mode = "smoothed"
            "#,
        )
        .unwrap();
        assert_eq!(config.particles.count, 4096);
        assert_eq!(config.particles.movement_mode, MovementMode::Smoothed);
        assert_eq!(config.particles.radius, 3.0);
        assert_eq!(config.audio.capacity, 5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::from_toml_str("[particles]\nradius = -1.0\n").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = Config::from_toml_str("[particles\n").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }
}
