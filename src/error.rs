//! Crate-wide error type.
//!
//! Ring overruns are deliberately absent: they are counted on the channel,
//! never raised.

use thiserror::Error;

/// Result alias carrying [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the control layer.
#[derive(Error, Debug)]
pub enum Error {
    /// An audio device, codec or GPU context could not be acquired.
    /// The session stays idle with zeroed outputs.
    #[error("setup failed: {0}")]
    Setup(String),

    /// A configuration was rejected; the previous one is still in effect.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The platform lacks a capability the core needs to run at all.
    #[error("platform unsupported: {0}")]
    PlatformUnsupported(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("audio decode failed: {0}")]
    Decode(#[from] hound::Error),

    #[error("config parse failed: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("GPU device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("image encode failed: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::PlatformUnsupported(msg.into())
    }

    /// True for failures that leave the session idle but usable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::PlatformUnsupported(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_errors_are_not_recoverable() {
        assert!(!Error::unsupported("no compute").is_recoverable());
        assert!(Error::setup("no device").is_recoverable());
        assert!(Error::config("bad radius").is_recoverable());
    }

    #[test]
    fn test_messages_carry_context() {
        let err = Error::config("particle count 0");
        assert_eq!(err.to_string(), "invalid configuration: particle count 0");
    }
}
