//! State textures owned by the compute pipeline.
//!
//! Four P×P `Rgba32Float` textures (audio data, scalar field, zero points,
//! particles), each double-buffered, plus the rest-position texture and the
//! two small audio input textures.

use crate::audio::AudioFeatureRecord;

pub const STATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
pub const SPECTRUM_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

/// Which state texture to address (for readback and dumps)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    AudioData,
    ScalarField,
    ZeroPoints,
    Particles,
}

impl StateKind {
    pub const ALL: [StateKind; 4] = [
        StateKind::AudioData,
        StateKind::ScalarField,
        StateKind::ZeroPoints,
        StateKind::Particles,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::AudioData => "audio_data",
            Self::ScalarField => "scalar_field",
            Self::ZeroPoints => "zero_points",
            Self::Particles => "particles",
        }
    }
}

pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl GpuTexture {
    fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    /// Replace the whole texture; `texel_bytes` is the size of one texel
    pub fn write(&self, queue: &wgpu::Queue, data: &[u8], texel_bytes: u32) {
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(self.width * texel_bytes),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

/// Two textures alternating by frame parity
pub struct PingPong {
    targets: [GpuTexture; 2],
}

impl PingPong {
    fn new(device: &wgpu::Device, label: &str, size: u32) -> Self {
        let usage = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST;
        Self {
            targets: [
                GpuTexture::new(device, &format!("{} A", label), size, size, STATE_FORMAT, usage),
                GpuTexture::new(device, &format!("{} B", label), size, size, STATE_FORMAT, usage),
            ],
        }
    }

    /// Written on frames with this parity
    pub fn write_target(&self, parity: usize) -> &GpuTexture {
        &self.targets[parity & 1]
    }

    /// Written on the previous frame
    pub fn previous(&self, parity: usize) -> &GpuTexture {
        &self.targets[(parity + 1) & 1]
    }

    pub fn both(&self) -> &[GpuTexture; 2] {
        &self.targets
    }
}

/// Everything sized by the particle count
pub struct StateTextures {
    pub size: u32,
    pub count: u32,
    pub rest: GpuTexture,
    pub audio_data: PingPong,
    pub scalar_field: PingPong,
    pub zero_points: PingPong,
    pub particles: PingPong,
}

impl StateTextures {
    pub fn new(device: &wgpu::Device, size: u32, count: u32) -> Self {
        let rest_usage = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST;
        Self {
            size,
            count,
            rest: GpuTexture::new(device, "Rest Positions", size, size, STATE_FORMAT, rest_usage),
            audio_data: PingPong::new(device, "Audio Data", size),
            scalar_field: PingPong::new(device, "Scalar Field", size),
            zero_points: PingPong::new(device, "Zero Points", size),
            particles: PingPong::new(device, "Particles", size),
        }
    }

    pub fn get(&self, kind: StateKind) -> &PingPong {
        match kind {
            StateKind::AudioData => &self.audio_data,
            StateKind::ScalarField => &self.scalar_field,
            StateKind::ZeroPoints => &self.zero_points,
            StateKind::Particles => &self.particles,
        }
    }

    /// Upload `[x, y, z, surface]` rest texels (P·P entries)
    pub fn write_rest(&self, queue: &wgpu::Queue, texels: &[[f32; 4]]) {
        self.rest.write(queue, bytemuck::cast_slice(texels), 16);
    }

    /// Seed both particle buffers with starting positions
    pub fn write_particles(&self, queue: &wgpu::Queue, texels: &[[f32; 4]]) {
        for target in self.particles.both() {
            target.write(queue, bytemuck::cast_slice(texels), 16);
        }
    }
}

/// Per-frame audio inputs: drained feature records and the spectrum
pub struct AudioInputs {
    pub features: GpuTexture,
    pub spectrum: GpuTexture,
    capacity: u32,
    bins: u32,
    staging: Vec<[f32; 4]>,
}

impl AudioInputs {
    pub fn new(device: &wgpu::Device, capacity: u32, bins: u32) -> Self {
        let usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        Self {
            features: GpuTexture::new(device, "Feature Records", capacity, 1, STATE_FORMAT, usage),
            spectrum: GpuTexture::new(device, "Spectrum", bins, 1, SPECTRUM_FORMAT, usage),
            capacity,
            bins,
            staging: vec![[0.0; 4]; capacity as usize],
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn bins(&self) -> u32 {
        self.bins
    }

    /// Upload up to `capacity` records as `[pitch, confidence, log_rms, 0]`
    pub fn write_features(&mut self, queue: &wgpu::Queue, records: &[AudioFeatureRecord]) {
        self.staging.fill([0.0; 4]);
        for (texel, record) in self.staging.iter_mut().zip(records) {
            *texel = [record.pitch_hz, record.confidence, record.log_rms(), 0.0];
        }
        self.features
            .write(queue, bytemuck::cast_slice(&self.staging), 16);
    }

    /// Upload the combined spectrum; shorter input is zero padded
    pub fn write_spectrum(&self, queue: &wgpu::Queue, bins: &[f32]) {
        if bins.len() == self.bins as usize {
            self.spectrum.write(queue, bytemuck::cast_slice(bins), 4);
        } else {
            let mut padded = vec![0.0f32; self.bins as usize];
            let n = padded.len().min(bins.len());
            padded[..n].copy_from_slice(&bins[..n]);
            self.spectrum.write(queue, bytemuck::cast_slice(&padded), 4);
        }
    }
}
