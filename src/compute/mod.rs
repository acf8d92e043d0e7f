//! GPU compute graph over fixed-size particle state textures.

mod context;
mod pipeline;
pub mod readback;
mod stages;
mod textures;

pub use context::GpuContext;
pub use pipeline::{FrameInputs, ParticlePipeline};
pub use stages::WORKGROUP_SIZE;
pub use textures::{GpuTexture, StateKind};
