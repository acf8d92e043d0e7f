//! Frame clock reconciliation.
//!
//! Picks one clock each frame:
//! - capture active: wall clock
//! - file playing: the file's own playback position (it follows real
//!   decode progress, which may drift from the render clock)
//! - file started but paused: frozen at the last known file time, dt = 0
//! - otherwise: wall clock
//!
//! Switching between clocks is discontinuous; no interpolation is attempted.

use crate::audio::graph::FileTransport;

/// Inputs sampled once per frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClockInputs {
    pub capture_active: bool,
    pub file: FileTransport,
    /// Seconds since the render loop started
    pub wall_elapsed: f64,
    /// Seconds since the previous frame
    pub wall_delta: f64,
}

/// Which clock produced a [`FrameTime`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    Wall,
    File,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    pub time: f64,
    pub delta: f64,
    pub source: ClockSource,
}

#[derive(Debug, Default)]
pub struct TimeBase {
    last_known_time: f64,
    prev_file_time: Option<f64>,
}

impl TimeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve this frame's (time, dt). Call exactly once per frame.
    pub fn advance(&mut self, inputs: &ClockInputs) -> FrameTime {
        let wall = FrameTime {
            time: inputs.wall_elapsed,
            delta: inputs.wall_delta.max(0.0),
            source: ClockSource::Wall,
        };

        if inputs.capture_active {
            self.prev_file_time = None;
            return wall;
        }

        let file = &inputs.file;
        if file.started && file.playing {
            let time = file.position_s;
            // First file frame after start or restart has no previous
            // position; the wall delta stands in for it.
            let delta = self
                .prev_file_time
                .map_or(wall.delta, |prev| (time - prev).max(0.0));
            self.prev_file_time = Some(time);
            self.last_known_time = time;
            return FrameTime {
                time,
                delta,
                source: ClockSource::File,
            };
        }

        if file.started {
            return FrameTime {
                time: self.last_known_time,
                delta: 0.0,
                source: ClockSource::Paused,
            };
        }

        self.prev_file_time = None;
        wall
    }

    pub fn last_known_time(&self) -> f64 {
        self.last_known_time
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
