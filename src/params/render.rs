//! Headless frame loop and frame dump configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Frame loop configuration for the headless driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Frame rate (FPS)
    pub fps: u32,

    /// Run length (seconds); None runs until the file ends
    pub duration_secs: Option<f32>,

    /// Log diagnostics every N frames (0 = never)
    pub diagnostics_interval: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            duration_secs: None,
            diagnostics_interval: 60,
        }
    }
}

impl RunConfig {
    /// Seconds per frame
    pub fn frame_interval_s(&self) -> f64 {
        1.0 / self.fps as f64
    }

    /// Total number of frames, if bounded
    pub fn total_frames(&self) -> Option<usize> {
        self.duration_secs
            .map(|d| (d * self.fps as f32).ceil() as usize)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(Error::config("fps must be > 0"));
        }
        if matches!(self.duration_secs, Some(d) if !(d > 0.0)) {
            return Err(Error::config("duration must be > 0"));
        }
        Ok(())
    }
}

/// Frame dump configuration (particle texture written as PNG)
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Output directory for frames
    pub output_dir: String,

    /// Dump every N frames
    pub every: u32,

    /// Also dump the intermediate state textures
    pub all_stages: bool,
}

impl RecordingConfig {
    pub fn new(output_dir: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            every: 30,
            all_stages: false,
        }
    }

    /// Frame directory path
    pub fn frames_dir(&self) -> String {
        format!("{}/frames", self.output_dir)
    }

    /// Path for a given frame index
    pub fn frame_path(&self, frame: u64) -> String {
        format!("{}/frame_{:06}.png", self.frames_dir(), frame)
    }

    /// Path for a named state texture at a given frame index
    pub fn stage_path(&self, stage: &str, frame: u64) -> String {
        format!("{}/{}_{:06}.png", self.frames_dir(), stage, frame)
    }

    pub fn should_dump(&self, frame: u64) -> bool {
        self.every > 0 && frame % self.every as u64 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_frames() {
        let run = RunConfig {
            fps: 30,
            duration_secs: Some(2.5),
            ..Default::default()
        };
        assert_eq!(run.total_frames(), Some(75));
        assert_eq!(RunConfig::default().total_frames(), None);
    }

    #[test]
    fn test_frame_paths() {
        let rec = RecordingConfig::new("out");
        assert_eq!(rec.frame_path(7), "out/frames/frame_000007.png");
        assert_eq!(rec.stage_path("zero_points", 30), "out/frames/zero_points_000030.png");
        assert!(rec.should_dump(0));
        assert!(!rec.should_dump(1));
    }
}
