//! Copy state textures back to the CPU and dump them as PNG.
//!
//! Blocking; for tests and debug dumps, never the per-frame path.

use std::path::Path;

use image::{Rgba, RgbaImage};

use super::context::GpuContext;
use super::textures::GpuTexture;
use crate::error::{Error, Result};

const TEXEL_BYTES: u32 = 16;

/// Read an `Rgba32Float` texture, row-major, `width × height` texels
pub fn read_texture(ctx: &GpuContext, texture: &GpuTexture) -> Result<Vec<[f32; 4]>> {
    let (width, height) = (texture.width, texture.height);
    let unpadded_bytes_per_row = width * TEXEL_BYTES;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

    let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Texture Readback Buffer"),
        size: (padded_bytes_per_row * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Texture Readback Encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture: &texture.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    ctx.queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    ctx.device.poll(wgpu::Maintain::Wait);
    receiver
        .recv()
        .map_err(|_| Error::setup("texture readback was cancelled"))?
        .map_err(|e| Error::setup(format!("texture readback failed: {}", e)))?;

    let data = slice.get_mapped_range();
    let mut texels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        let start = (y * padded_bytes_per_row) as usize;
        let row = &data[start..start + unpadded_bytes_per_row as usize];
        texels.extend_from_slice(bytemuck::cast_slice::<u8, [f32; 4]>(row));
    }
    drop(data);
    buffer.unmap();

    Ok(texels)
}

/// Map each channel by its largest magnitude onto 0..255 (0 → 128)
pub fn to_rgba8(texels: &[[f32; 4]], width: u32, height: u32) -> RgbaImage {
    let mut scale = [0.0f32; 4];
    for t in texels {
        for c in 0..4 {
            if t[c].is_finite() {
                scale[c] = scale[c].max(t[c].abs());
            }
        }
    }

    let mut img = RgbaImage::new(width, height);
    for (i, t) in texels.iter().enumerate().take((width * height) as usize) {
        let mut px = [0u8; 4];
        for c in 0..3 {
            let v = if scale[c] > 0.0 { t[c] / scale[c] } else { 0.0 };
            px[c] = ((v * 0.5 + 0.5) * 255.0).clamp(0.0, 255.0) as u8;
        }
        px[3] = 255;
        img.put_pixel(i as u32 % width, i as u32 / width, Rgba(px));
    }
    img
}

/// Read a texture back and save it as PNG
pub fn save_png(ctx: &GpuContext, texture: &GpuTexture, path: impl AsRef<Path>) -> Result<()> {
    let texels = read_texture(ctx, texture)?;
    let path = path.as_ref();
    to_rgba8(&texels, texture.width, texture.height).save(path)?;
    tracing::debug!(path = %path.display(), "Saved texture dump");
    Ok(())
}
