//! Explicitly constructed session: the public entry points of the core.
//!
//! A `Session` owns the audio graph, the frame clock and the particle
//! pipeline. The render loop calls [`Session::tick`] once per frame and
//! hands [`Session::output_texture`] to whatever draws the particles.

use std::path::Path;
use std::sync::Arc;

use crate::audio::graph::SourceState;
use crate::audio::{AudioFeatureRecord, AudioGraph};
use crate::clock::{ClockInputs, ClockSource, FrameTime, TimeBase};
use crate::compute::{FrameInputs, GpuContext, GpuTexture, ParticlePipeline};
use crate::error::Result;
use crate::field::{WaveComponent, WaveGenerator};
use crate::params::{Config, MovementMode, ParticleParameters};

/// Partial parameter update; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterUpdate {
    pub radius: Option<f32>,
    pub threshold: Option<f32>,
    pub surface_ratio: Option<f32>,
    pub flow_field_strength: Option<f32>,
    pub particle_speed: Option<f32>,
    pub movement_mode: Option<MovementMode>,
}

impl ParameterUpdate {
    pub fn apply(&self, base: &ParticleParameters) -> ParticleParameters {
        let mut p = base.clone();
        if let Some(v) = self.radius {
            p.radius = v;
        }
        if let Some(v) = self.threshold {
            p.threshold = v;
        }
        if let Some(v) = self.surface_ratio {
            p.surface_ratio = v;
        }
        if let Some(v) = self.flow_field_strength {
            p.flow_field_strength = v;
        }
        if let Some(v) = self.particle_speed {
            p.particle_speed = v;
        }
        if let Some(v) = self.movement_mode {
            p.movement_mode = v;
        }
        p
    }
}

/// Read-only counters, not authoritative for anything
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diagnostics {
    pub dropped_records: u64,
    pub average_amplitude: f32,
    pub particle_count: usize,
    pub sources: SourceState,
    pub frame: u64,
}

pub struct Session {
    graph: AudioGraph,
    clock: TimeBase,
    pipeline: ParticlePipeline,
    generator: WaveGenerator,
    transition_duration_s: f32,

    /// Latest drained records, kept until newer ones arrive
    records: Vec<AudioFeatureRecord>,
    record_count: usize,
    scratch: Vec<AudioFeatureRecord>,
    last_frame: FrameTime,
}

impl Session {
    pub fn new(ctx: Arc<GpuContext>, config: &Config) -> Result<Self> {
        config.validate_static()?;

        let mut generator = WaveGenerator::new(config.waves.clone());
        let capacity = config.audio.capacity;
        let pipeline = ParticlePipeline::new(
            ctx,
            config.particles.clone(),
            generator.next_set(),
            capacity,
            config.audio.frequency_bins(),
        )?;

        Ok(Self {
            graph: AudioGraph::new(config.audio.clone()),
            clock: TimeBase::new(),
            pipeline,
            generator,
            transition_duration_s: config.waves.transition_duration_s,
            records: vec![AudioFeatureRecord::default(); capacity],
            record_count: 0,
            scratch: vec![AudioFeatureRecord::default(); capacity],
            last_frame: FrameTime {
                time: 0.0,
                delta: 0.0,
                source: ClockSource::Wall,
            },
        })
    }

    /// Play a file, replacing any current file source
    pub fn start(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.clock.reset();
        let result = self.graph.start_file(path);
        if result.is_err() && self.graph.state() == SourceState::Neither {
            self.record_count = 0;
        }
        result
    }

    /// Stop every source. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.graph.stop();
        self.clock.reset();
        self.record_count = 0;
    }

    /// Pause or resume the file source; returns whether it now plays
    pub fn toggle_playback(&mut self) -> bool {
        self.graph.toggle_playback()
    }

    /// Start or stop capture; returns whether capture is now active
    pub fn toggle_capture(&mut self, device_id: Option<&str>) -> Result<bool> {
        self.graph.toggle_capture(device_id)
    }

    /// Blend to a caller-supplied component set
    pub fn set_wave_components(&mut self, components: Vec<WaveComponent>) -> Result<()> {
        self.pipeline
            .set_wave_components(components, self.transition_duration_s)
    }

    /// Blend to a fresh random component set
    pub fn randomize_waves(&mut self) -> Result<()> {
        let components = self.generator.next_set();
        self.set_wave_components(components)
    }

    pub fn set_parameters(&mut self, update: &ParameterUpdate) -> Result<()> {
        let params = update.apply(self.pipeline.params());
        self.set_particle_parameters(params)
    }

    pub fn set_particle_parameters(&mut self, params: ParticleParameters) -> Result<()> {
        self.pipeline.set_parameters(params).inspect_err(|e| {
            tracing::warn!(error = %e, "Rejected particle parameters");
        })
    }

    /// Advance one frame: resolve the clock, drain the feature channel and
    /// run the compute graph. Never fails.
    pub fn tick(&mut self, wall_elapsed: f64, wall_delta: f64) -> FrameTime {
        self.graph.update();
        let sources = self.graph.state();
        let frozen = self.graph.is_frozen();

        let frame = self.clock.advance(&ClockInputs {
            capture_active: sources.capture_active(),
            file: self.graph.file_transport(),
            wall_elapsed,
            wall_delta,
        });

        let drained = self.graph.drain_features(&mut self.scratch);
        if drained > 0 && !frozen {
            self.records[..drained].copy_from_slice(&self.scratch[..drained]);
            self.record_count = drained;
        }
        if sources == SourceState::Neither && !frozen {
            self.record_count = 0;
        }

        self.pipeline.dispatch(&FrameInputs {
            time: frame.time,
            dt: frame.delta,
            records: &self.records[..self.record_count],
            spectrum: self.graph.spectrum(),
            amplitude: self.graph.average_amplitude(),
            audio_active: sources != SourceState::Neither || frozen,
        });

        self.last_frame = frame;
        frame
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            dropped_records: self.graph.dropped_records(),
            average_amplitude: self.graph.average_amplitude(),
            particle_count: self.pipeline.params().count,
            sources: self.graph.state(),
            frame: self.pipeline.frame(),
        }
    }

    /// Particle positions written by the latest frame
    pub fn output_texture(&self) -> &GpuTexture {
        self.pipeline.output_texture()
    }

    pub fn pipeline(&self) -> &ParticlePipeline {
        &self.pipeline
    }

    pub fn last_frame(&self) -> FrameTime {
        self.last_frame
    }

    /// Latest records handed to the pipeline
    pub fn latest_records(&self) -> &[AudioFeatureRecord] {
        &self.records[..self.record_count]
    }
}
