//! Headless GPU device and one-time capability probe.

use crate::error::{Error, Result};

/// Smallest 2D texture limit the particle textures are allowed to work with
const MIN_TEXTURE_DIMENSION: u32 = 2048;

/// Device and queue shared by the compute pipeline and readback
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    max_texture_dimension: u32,
}

impl GpuContext {
    /// Acquire a headless adapter and device.
    ///
    /// Fails with `PlatformUnsupported` if the adapter cannot run compute
    /// shaders, and with `Setup` if no adapter or device is available.
    pub async fn new() -> Result<Self> {
        check_shared_memory()?;

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| Error::setup("failed to find a GPU adapter"))?;

        let adapter_info = adapter.get_info();
        let adapter_limits = adapter.limits();
        check_capabilities(
            adapter.get_downlevel_capabilities().flags,
            adapter_limits.max_texture_dimension_2d,
        )?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Compute Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits {
                        max_texture_dimension_2d: adapter_limits.max_texture_dimension_2d,
                        ..wgpu::Limits::downlevel_defaults()
                    },
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        device.on_uncaptured_error(Box::new(|err| {
            tracing::error!(%err, "Uncaptured GPU error");
        }));

        tracing::info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            max_texture_dimension = adapter_limits.max_texture_dimension_2d,
            "GPU context ready"
        );

        Ok(Self {
            device,
            queue,
            adapter_info,
            max_texture_dimension: adapter_limits.max_texture_dimension_2d,
        })
    }

    pub fn new_blocking() -> Result<Self> {
        pollster::block_on(Self::new())
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    /// Largest P for a P×P state texture
    pub fn max_texture_dimension(&self) -> u32 {
        self.max_texture_dimension
    }
}

/// The audio and render contexts share state through atomics only
fn check_shared_memory() -> Result<()> {
    if cfg!(all(target_has_atomic = "ptr", target_has_atomic = "64")) {
        Ok(())
    } else {
        Err(Error::unsupported(
            "target lacks the atomics needed to share state with the audio thread",
        ))
    }
}

pub(crate) fn check_capabilities(flags: wgpu::DownlevelFlags, max_dimension: u32) -> Result<()> {
    if !flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
        return Err(Error::unsupported("GPU adapter cannot run compute shaders"));
    }
    if max_dimension < MIN_TEXTURE_DIMENSION {
        return Err(Error::unsupported(format!(
            "GPU texture limit {} is below {}",
            max_dimension, MIN_TEXTURE_DIMENSION
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_compute_is_unsupported() {
        let err = check_capabilities(wgpu::DownlevelFlags::empty(), 8192).unwrap_err();
        assert!(matches!(err, Error::PlatformUnsupported(_)));
    }

    #[test]
    fn test_small_textures_are_unsupported() {
        let err = check_capabilities(wgpu::DownlevelFlags::COMPUTE_SHADERS, 1024).unwrap_err();
        assert!(!err.is_recoverable());
        assert!(check_capabilities(wgpu::DownlevelFlags::COMPUTE_SHADERS, 8192).is_ok());
    }

    #[test]
    fn test_host_has_atomics() {
        assert!(check_shared_memory().is_ok());
    }
}
