//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::error::Result;
use crate::params::{Config, MovementMode, RecordingConfig};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "baryon")]
#[command(about = "Audio-reactive particle field (headless)", long_about = None)]
pub struct Args {
    /// WAV file to play and analyse
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Analyse live capture; optionally name the input device
    #[arg(long, value_name = "DEVICE", num_args = 0..=1, default_missing_value = "")]
    pub capture: Option<String>,

    /// TOML config file (missing sections use defaults)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Particle count override
    #[arg(long, value_name = "N")]
    pub particles: Option<usize>,

    /// Movement mode: quickest (default), smoothed
    #[arg(long, value_name = "MODE")]
    pub movement: Option<String>,

    /// Frame rate override
    #[arg(long, value_name = "FPS")]
    pub fps: Option<u32>,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub duration: Option<f32>,

    /// Switch to a random wave set every N seconds
    #[arg(long, value_name = "SECONDS")]
    pub randomize_every: Option<f32>,

    /// Dump the particle texture as PNG frames into this directory
    #[arg(long, value_name = "DIR")]
    pub dump: Option<String>,

    /// With --dump, also write the audio data, scalar field and zero point textures
    #[arg(long)]
    pub dump_stages: bool,

    /// Dump every N frames
    #[arg(long, value_name = "N", default_value_t = 30)]
    pub dump_every: u32,

    /// List capture devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

impl Args {
    /// Load the config file (or defaults) and apply command-line overrides
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(count) = self.particles {
            config.particles.count = count;
        }
        if let Some(mode) = self.parse_movement_mode() {
            config.particles.movement_mode = mode;
        }
        if let Some(fps) = self.fps {
            config.run.fps = fps;
        }
        if self.duration.is_some() {
            config.run.duration_secs = self.duration;
        }

        config.validate_static()?;
        Ok(config)
    }

    /// Parse movement mode from command-line arguments
    pub fn parse_movement_mode(&self) -> Option<MovementMode> {
        let mode = self.movement.as_deref()?;
        match mode.to_lowercase().as_str() {
            "quickest" => Some(MovementMode::Quickest),
            "smoothed" => Some(MovementMode::Smoothed),
            other => {
                tracing::warn!(mode = other, "Unknown movement mode, keeping configured one");
                None
            }
        }
    }

    /// `Some(None)` for the default capture device
    pub fn capture_device(&self) -> Option<Option<&str>> {
        self.capture
            .as_deref()
            .map(|name| if name.is_empty() { None } else { Some(name) })
    }

    /// Create frame dump configuration if dumping is enabled
    pub fn create_recording_config(&self) -> Result<Option<RecordingConfig>> {
        let Some(dir) = &self.dump else {
            return Ok(None);
        };
        let mut config = RecordingConfig::new(dir.clone());
        config.every = self.dump_every;
        config.all_stages = self.dump_stages;
        std::fs::create_dir_all(config.frames_dir())?;
        Ok(Some(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply() {
        let args = Args::parse_from([
            "baryon",
            "--particles",
            "1024",
            "--movement",
            "Smoothed",
            "--fps",
            "30",
        ]);
        let config = args.resolve_config().unwrap();
        assert_eq!(config.particles.count, 1024);
        assert_eq!(config.particles.movement_mode, MovementMode::Smoothed);
        assert_eq!(config.run.fps, 30);
    }

    #[test]
    fn test_capture_flag_forms() {
        let bare = Args::parse_from(["baryon", "--capture"]);
        assert_eq!(bare.capture_device(), Some(None));

        let named = Args::parse_from(["baryon", "--capture", "USB Mic"]);
        assert_eq!(named.capture_device(), Some(Some("USB Mic")));

        let none = Args::parse_from(["baryon"]);
        assert_eq!(none.capture_device(), None);
    }

    #[test]
    fn test_zero_particles_rejected() {
        let args = Args::parse_from(["baryon", "--particles", "0"]);
        assert!(args.resolve_config().is_err());
    }
}
