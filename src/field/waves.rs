//! Wave components and random component sets.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::params::{WaveRanges, MAX_WAVE_COMPONENTS};

/// One `A · sin(uπx) · sin(vπy) · sin(wπz)` term
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveComponent {
    pub amplitude: f32,
    pub u: i32,
    pub v: i32,
    pub w: i32,
}

impl WaveComponent {
    pub fn new(amplitude: f32, u: i32, v: i32, w: i32) -> Self {
        Self { amplitude, u, v, w }
    }

    /// Packed as `(A, u, v, w)` for the field uniform
    pub fn to_gpu(self) -> [f32; 4] {
        [self.amplitude, self.u as f32, self.v as f32, self.w as f32]
    }
}

/// Reject sets the field stage cannot hold
pub fn validate_components(components: &[WaveComponent]) -> Result<()> {
    if components.is_empty() || components.len() > MAX_WAVE_COMPONENTS {
        return Err(Error::config(format!(
            "expected 1..={} wave components, got {}",
            MAX_WAVE_COMPONENTS,
            components.len()
        )));
    }
    if components.iter().any(|c| !c.amplitude.is_finite()) {
        return Err(Error::config("wave amplitudes must be finite"));
    }
    Ok(())
}

/// Seeded source of random component sets
pub struct WaveGenerator {
    rng: StdRng,
    ranges: WaveRanges,
}

impl WaveGenerator {
    pub fn new(ranges: WaveRanges) -> Self {
        Self {
            rng: StdRng::seed_from_u64(ranges.seed),
            ranges,
        }
    }

    pub fn ranges(&self) -> &WaveRanges {
        &self.ranges
    }

    pub fn next_set(&mut self) -> Vec<WaveComponent> {
        let r = &self.ranges;
        (0..r.count)
            .map(|_| WaveComponent {
                amplitude: self.rng.random_range(r.min_amplitude..=r.max_amplitude),
                u: self.rng.random_range(r.min_mode..=r.max_mode),
                v: self.rng.random_range(r.min_mode..=r.max_mode),
                w: self.rng.random_range(r.min_mode..=r.max_mode),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sets_respect_ranges() {
        let mut generator = WaveGenerator::new(WaveRanges::default());
        for _ in 0..10 {
            let set = generator.next_set();
            assert_eq!(set.len(), 12);
            for c in &set {
                assert!((1.0..=4.0).contains(&c.amplitude));
                for m in [c.u, c.v, c.w] {
                    assert!((1..=10).contains(&m));
                }
            }
        }
    }

    #[test]
    fn test_same_seed_same_sets() {
        let mut a = WaveGenerator::new(WaveRanges::default());
        let mut b = WaveGenerator::new(WaveRanges::default());
        assert_eq!(a.next_set(), b.next_set());
    }

    #[test]
    fn test_validate_components() {
        assert!(validate_components(&[]).is_err());
        assert!(validate_components(&[WaveComponent::new(1.0, 1, 2, 3)]).is_ok());
        assert!(validate_components(&vec![WaveComponent::new(1.0, 1, 1, 1); 33]).is_err());
        assert!(validate_components(&[WaveComponent::new(f32::NAN, 1, 1, 1)]).is_err());
    }
}
