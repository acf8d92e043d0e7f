//! Compute stage pipelines and their uniform layouts.

use bytemuck::{Pod, Zeroable};

use crate::params::MAX_WAVE_COMPONENTS;

/// Threads per workgroup along each axis (must match the shaders)
pub const WORKGROUP_SIZE: u32 = 16;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct AudioUniforms {
    pub size: u32,
    pub count: u32,
    pub record_count: u32,
    pub spectrum_len: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct FieldUniforms {
    pub size: u32,
    pub count: u32,
    pub current_len: u32,
    pub next_len: u32,
    pub blend: f32,
    pub audio_influence: f32,
    pub pitch_mode_scale: f32,
    pub min_confidence: f32,
    pub current: [[f32; 4]; MAX_WAVE_COMPONENTS],
    pub next: [[f32; 4]; MAX_WAVE_COMPONENTS],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct ZeroPointUniforms {
    pub size: u32,
    pub count: u32,
    pub surface_control: u32,
    pub _pad0: u32,
    pub threshold: f32,
    pub surface_threshold: f32,
    pub _pad1: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct MotionUniforms {
    pub size: u32,
    pub count: u32,
    pub mode: u32,
    pub audio_active: u32,
    pub speed: f32,
    pub dt: f32,
    pub time: f32,
    pub max_radius: f32,
    pub flow_strength: f32,
    pub flow_frequency: f32,
    pub flow_influence: f32,
    pub _pad: f32,
}

/// One compute pass: pipeline, its bind group layout and uniform buffer
pub struct Stage {
    pub label: &'static str,
    pub pipeline: wgpu::ComputePipeline,
    pub layout: wgpu::BindGroupLayout,
    pub uniforms: wgpu::Buffer,
}

/// Binding slots a stage declares, in binding order
#[derive(Clone, Copy)]
pub enum Slot {
    /// `texture_2d<f32>` read with `textureLoad`
    Sampled,
    /// `texture_storage_2d<rgba32float, write>`
    Storage,
    Uniform,
}

impl Stage {
    pub fn new(
        device: &wgpu::Device,
        label: &'static str,
        source: &'static str,
        slots: &[Slot],
        uniform_size: u64,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let entries: Vec<wgpu::BindGroupLayoutEntry> = slots
            .iter()
            .enumerate()
            .map(|(binding, slot)| wgpu::BindGroupLayoutEntry {
                binding: binding as u32,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: match slot {
                    Slot::Sampled => wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    Slot::Storage => wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba32Float,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    Slot::Uniform => wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                },
                count: None,
            })
            .collect();

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: uniform_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            label,
            pipeline,
            layout,
            uniforms,
        }
    }

    /// Bind `views` to the sampled/storage slots in order; the uniform
    /// buffer goes in the last slot.
    pub fn bind(&self, device: &wgpu::Device, views: &[&wgpu::TextureView]) -> wgpu::BindGroup {
        let mut entries: Vec<wgpu::BindGroupEntry> = views
            .iter()
            .enumerate()
            .map(|(binding, view)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: views.len() as u32,
            resource: self.uniforms.as_entire_binding(),
        });

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.layout,
            entries: &entries,
        })
    }

    pub fn write_uniforms<T: Pod>(&self, queue: &wgpu::Queue, value: &T) {
        queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(value));
    }

    /// Record one pass over a `size × size` texture
    pub fn dispatch(&self, encoder: &mut wgpu::CommandEncoder, bind_group: &wgpu::BindGroup, size: u32) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(self.label),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        let groups = size.div_ceil(WORKGROUP_SIZE);
        pass.dispatch_workgroups(groups, groups, 1);
    }
}

/// The four stages in dispatch order
pub struct Stages {
    pub audio_data: Stage,
    pub scalar_field: Stage,
    pub zero_points: Stage,
    pub particles: Stage,
}

impl Stages {
    pub fn new(device: &wgpu::Device) -> Self {
        use Slot::*;
        Self {
            audio_data: Stage::new(
                device,
                "Audio Data Stage",
                include_str!("shaders/audio_data.wgsl"),
                &[Sampled, Sampled, Storage, Uniform],
                std::mem::size_of::<AudioUniforms>() as u64,
            ),
            scalar_field: Stage::new(
                device,
                "Scalar Field Stage",
                include_str!("shaders/scalar_field.wgsl"),
                &[Sampled, Sampled, Storage, Uniform],
                std::mem::size_of::<FieldUniforms>() as u64,
            ),
            zero_points: Stage::new(
                device,
                "Zero Point Stage",
                include_str!("shaders/zero_points.wgsl"),
                &[Sampled, Sampled, Storage, Uniform],
                std::mem::size_of::<ZeroPointUniforms>() as u64,
            ),
            particles: Stage::new(
                device,
                "Particle Stage",
                include_str!("shaders/particles.wgsl"),
                &[Sampled, Sampled, Sampled, Storage, Uniform],
                std::mem::size_of::<MotionUniforms>() as u64,
            ),
        }
    }
}
