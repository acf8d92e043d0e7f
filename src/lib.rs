//! Baryon library - Audio-reactive particle field core
//!
//! Live or file audio is analysed on the audio thread, handed to the render
//! loop through a lock-free ring channel, and drives a four-stage GPU
//! compute graph that moves particles onto the nodal surfaces of a
//! Chladni-style scalar field.

pub mod audio;
pub mod cli;
pub mod clock;
pub mod compute;
pub mod error;
pub mod field;
pub mod params;
pub mod particles;
pub mod session;

pub use error::{Error, Result};
pub use session::{Diagnostics, ParameterUpdate, Session};
