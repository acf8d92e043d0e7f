//! Per-frame compute graph: AudioData → ScalarField → ZeroPoints → Particles.
//!
//! All four stages are encoded into one command buffer in dependency order.
//! Each stage writes the half of its ping-pong pair selected by the frame
//! parity; the particle stage reads its own output from the previous frame.

use std::sync::Arc;

use super::context::GpuContext;
use super::stages::{AudioUniforms, FieldUniforms, MotionUniforms, Stages, ZeroPointUniforms};
use super::textures::{AudioInputs, GpuTexture, StateKind, StateTextures};
use crate::audio::AudioFeatureRecord;
use crate::error::Result;
use crate::field::{validate_components, WaveComponent, WaveTransition};
use crate::params::{ParticleParameters, MAX_WAVE_COMPONENTS};
use crate::particles::{initial_positions, pad_to_texture, rest_positions};

/// What one frame feeds into the graph
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    pub time: f64,
    pub dt: f64,
    pub records: &'a [AudioFeatureRecord],
    pub spectrum: &'a [f32],
    pub amplitude: f32,
    /// At least one audio source is active
    pub audio_active: bool,
}

struct FrameBindGroups {
    audio_data: wgpu::BindGroup,
    scalar_field: wgpu::BindGroup,
    zero_points: wgpu::BindGroup,
    particles: wgpu::BindGroup,
}

pub struct ParticlePipeline {
    ctx: Arc<GpuContext>,
    stages: Stages,
    textures: StateTextures,
    inputs: AudioInputs,
    bind_groups: [FrameBindGroups; 2],
    params: ParticleParameters,
    waves: WaveTransition,
    frame: u64,
}

impl ParticlePipeline {
    pub fn new(
        ctx: Arc<GpuContext>,
        params: ParticleParameters,
        components: Vec<WaveComponent>,
        capacity: usize,
        spectrum_bins: usize,
    ) -> Result<Self> {
        params.validate(ctx.max_texture_dimension())?;
        validate_components(&components)?;

        let device = &ctx.device;
        let stages = Stages::new(device);
        let textures = StateTextures::new(device, params.texture_size(), params.count as u32);
        let inputs = AudioInputs::new(device, capacity as u32, spectrum_bins as u32);
        let bind_groups = [0, 1].map(|parity| bind_frame(device, &stages, &textures, &inputs, parity));

        let pipeline = Self {
            ctx,
            stages,
            textures,
            inputs,
            bind_groups,
            params,
            waves: WaveTransition::new(components),
            frame: 0,
        };
        pipeline.upload_geometry();

        tracing::info!(
            count = pipeline.params.count,
            size = pipeline.textures.size,
            "Particle pipeline ready"
        );
        Ok(pipeline)
    }

    pub fn params(&self) -> &ParticleParameters {
        &self.params
    }

    /// Apply new parameters. Rejected parameters leave the previous ones in
    /// effect. A new count reallocates every state texture.
    pub fn set_parameters(&mut self, params: ParticleParameters) -> Result<()> {
        params.validate(self.ctx.max_texture_dimension())?;

        let resize = params.count != self.params.count;
        let regenerate = params.geometry_differs(&self.params);
        self.params = params;

        if resize {
            let device = &self.ctx.device;
            self.textures =
                StateTextures::new(device, self.params.texture_size(), self.params.count as u32);
            self.bind_groups = [0, 1].map(|parity| {
                bind_frame(device, &self.stages, &self.textures, &self.inputs, parity)
            });
            tracing::info!(
                count = self.params.count,
                size = self.textures.size,
                "Reallocated particle textures"
            );
        }
        if regenerate {
            self.upload_geometry();
        }
        Ok(())
    }

    /// Blend toward a new component set over `duration_s` seconds
    pub fn set_wave_components(&mut self, components: Vec<WaveComponent>, duration_s: f32) -> Result<()> {
        validate_components(&components)?;
        self.waves.begin(components, duration_s);
        Ok(())
    }

    pub fn waves(&self) -> &WaveTransition {
        &self.waves
    }

    /// Put every particle back at its starting position
    pub fn reset_particles(&mut self) {
        self.upload_geometry();
    }

    /// Run the four stages for one frame
    pub fn dispatch(&mut self, frame: &FrameInputs) {
        let parity = (self.frame & 1) as usize;
        let queue = &self.ctx.queue;
        let size = self.textures.size;
        let count = self.textures.count;
        let p = &self.params;

        let blend = self.waves.advance(frame.dt as f32);
        let records = &frame.records[..frame.records.len().min(self.inputs.capacity() as usize)];
        self.inputs.write_features(queue, records);
        self.inputs.write_spectrum(queue, frame.spectrum);

        self.stages.audio_data.write_uniforms(
            queue,
            &AudioUniforms {
                size,
                count,
                record_count: records.len() as u32,
                spectrum_len: self.inputs.bins(),
            },
        );
        self.stages
            .scalar_field
            .write_uniforms(queue, &field_uniforms(&self.waves, blend, p, size, count));
        self.stages.zero_points.write_uniforms(
            queue,
            &ZeroPointUniforms {
                size,
                count,
                surface_control: p.surface_control as u32,
                _pad0: 0,
                threshold: p.threshold,
                surface_threshold: p.surface_threshold,
                _pad1: [0.0; 2],
            },
        );
        let audio_active = frame.audio_active && frame.amplitude > p.amplitude_floor;
        self.stages.particles.write_uniforms(
            queue,
            &MotionUniforms {
                size,
                count,
                mode: p.movement_mode.as_flag(),
                audio_active: audio_active as u32,
                speed: p.particle_speed,
                dt: frame.dt as f32,
                time: frame.time as f32,
                max_radius: p.radius * p.distance_tolerance,
                flow_strength: p.flow_field_strength,
                flow_frequency: p.flow_field_frequency,
                flow_influence: p.flow_field_influence,
                _pad: 0.0,
            },
        );

        let groups = &self.bind_groups[parity];
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Particle Frame Encoder"),
            });
        self.stages
            .audio_data
            .dispatch(&mut encoder, &groups.audio_data, size);
        self.stages
            .scalar_field
            .dispatch(&mut encoder, &groups.scalar_field, size);
        self.stages
            .zero_points
            .dispatch(&mut encoder, &groups.zero_points, size);
        self.stages
            .particles
            .dispatch(&mut encoder, &groups.particles, size);
        queue.submit(std::iter::once(encoder.finish()));

        self.frame += 1;
    }

    /// Frames dispatched so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn texture_size(&self) -> u32 {
        self.textures.size
    }

    /// Latest written texture of a kind (the rest texture before any frame)
    pub fn state_texture(&self, kind: StateKind) -> &GpuTexture {
        // Parity of the last dispatched frame; before the first dispatch the
        // "previous" half holds the initial state.
        let last = (self.frame.wrapping_sub(1) & 1) as usize;
        self.textures.get(kind).write_target(last)
    }

    /// Particle positions for the renderer: `xyz` position, `w` attractor flag
    pub fn output_texture(&self) -> &GpuTexture {
        self.state_texture(StateKind::Particles)
    }

    pub fn rest_texture(&self) -> &GpuTexture {
        &self.textures.rest
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    fn upload_geometry(&self) {
        let p = &self.params;
        let side = self.textures.size;
        let rest = rest_positions(p.count, p.radius, p.surface_ratio, p.seed);
        let initial = initial_positions(p.count, p.radius, p.seed);
        self.textures
            .write_rest(&self.ctx.queue, &pad_to_texture(rest, side));
        self.textures
            .write_particles(&self.ctx.queue, &pad_to_texture(initial, side));
    }
}

fn field_uniforms(
    waves: &WaveTransition,
    blend: f32,
    p: &ParticleParameters,
    size: u32,
    count: u32,
) -> FieldUniforms {
    let pack = |set: &[WaveComponent]| {
        let mut out = [[0.0f32; 4]; MAX_WAVE_COMPONENTS];
        for (slot, c) in out.iter_mut().zip(set) {
            *slot = c.to_gpu();
        }
        (out, set.len().min(MAX_WAVE_COMPONENTS) as u32)
    };
    let (current, current_len) = pack(waves.current());
    let (next, next_len) = pack(waves.target());
    FieldUniforms {
        size,
        count,
        current_len,
        next_len,
        blend,
        audio_influence: p.audio_influence,
        pitch_mode_scale: p.pitch_mode_scale,
        min_confidence: p.min_confidence,
        current,
        next,
    }
}

fn bind_frame(
    device: &wgpu::Device,
    stages: &Stages,
    t: &StateTextures,
    inputs: &AudioInputs,
    parity: usize,
) -> FrameBindGroups {
    let audio_data = t.audio_data.write_target(parity);
    let scalar_field = t.scalar_field.write_target(parity);
    let zero_points = t.zero_points.write_target(parity);
    FrameBindGroups {
        audio_data: stages.audio_data.bind(
            device,
            &[&inputs.features.view, &inputs.spectrum.view, &audio_data.view],
        ),
        scalar_field: stages
            .scalar_field
            .bind(device, &[&t.rest.view, &audio_data.view, &scalar_field.view]),
        zero_points: stages
            .zero_points
            .bind(device, &[&t.rest.view, &scalar_field.view, &zero_points.view]),
        particles: stages.particles.bind(
            device,
            &[
                &t.rest.view,
                &zero_points.view,
                &t.particles.previous(parity).view,
                &t.particles.write_target(parity).view,
            ],
        ),
    }
}
