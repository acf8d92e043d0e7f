//! Audio analysis and transport.
//!
//! The real-time side (`host`) decodes/plays the file source, mixes in the
//! capture tap and runs the `FeatureExtractor`, publishing one
//! [`AudioFeatureRecord`] per analysis block into a `ring` channel. The render
//! side (`graph`) drains that channel once per frame and keeps per-source
//! spectrum snapshots.

pub mod features;
pub mod graph;
pub mod host;
pub mod ring;
pub mod source;
pub mod spectrum;

use bytemuck::{Pod, Zeroable};

pub use features::FeatureExtractor;
pub use graph::{combine_amplitudes, combine_spectra, AudioGraph, SourceState};
pub use host::{CaptureTap, ControlMessage, ControlPort, HostCallback, PlaybackClock};
pub use source::{list_input_devices, DecodedAudio};
pub use spectrum::SpectrumAnalyser;

/// Added to RMS before log compression so silence stays finite
pub const RMS_FLOOR: f32 = 1e-6;

/// One analysis block's worth of features. Layout matches the GPU upload
/// (three 4-byte floats).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct AudioFeatureRecord {
    /// Dominant pitch (Hz), 0 when the block had no usable peak
    pub pitch_hz: f32,
    /// Share of in-range spectral energy around the peak, 0..1
    pub confidence: f32,
    /// Root mean square of the block, floor included
    pub rms: f32,
}

impl AudioFeatureRecord {
    /// Log-compressed RMS, roughly 0 at -40 dBFS and 1 at full scale
    pub fn log_rms(&self) -> f32 {
        1.0 + 0.5 * (self.rms.max(RMS_FLOOR)).log10()
    }
}
