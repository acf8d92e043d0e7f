//! Zero-point attraction and particle integration (CPU mirror of
//! `zero_points.wgsl` and `particles.wgsl`).

use std::f32::consts::TAU;

use glam::Vec3;

use crate::params::{MovementMode, ParticleParameters};

/// Candidate texels searched for a nearest attractor
pub const ATTRACTOR_CANDIDATES: u32 = 16;

/// Largest time step integrated in one frame (seconds)
pub const MAX_STEP_DT: f32 = 0.1;

/// Zero-point thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZeroPointParams {
    pub threshold: f32,
    pub surface_threshold: f32,
    pub surface_control: bool,
}

impl ZeroPointParams {
    pub fn from_params(params: &ParticleParameters) -> Self {
        Self {
            threshold: params.threshold,
            surface_threshold: params.surface_threshold,
            surface_control: params.surface_control,
        }
    }

    /// Band half-width for a particle with the given surface flag
    pub fn epsilon(&self, surface: bool) -> f32 {
        if self.surface_control && surface {
            self.surface_threshold
        } else {
            self.threshold
        }
    }

    pub fn is_valid(&self, value: f32, surface: bool) -> bool {
        value.abs() < self.epsilon(surface)
    }
}

/// Per-frame inputs to the particle step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionFrame {
    pub time: f32,
    pub dt: f32,
    /// Audio present and above the amplitude floor
    pub active: bool,
}

/// k-th candidate texel for particle `index`, spread over `count` texels
pub fn candidate_index(index: u32, k: u32, count: u32) -> u32 {
    let stride = (count / ATTRACTOR_CANDIDATES).max(1);
    let offset = index.wrapping_mul(2_654_435_761) % stride;
    (offset + k * stride) % count
}

/// The particle's own rest position when it lies on a nodal band,
/// otherwise the nearest valid candidate.
pub fn find_attractor(
    index: u32,
    values: &[f32],
    rest: &[[f32; 4]],
    zero: &ZeroPointParams,
) -> Option<Vec3> {
    let own = rest[index as usize];
    let own_pos = Vec3::new(own[0], own[1], own[2]);
    if zero.is_valid(values[index as usize], own[3] > 0.5) {
        return Some(own_pos);
    }

    let count = values.len() as u32;
    let mut best: Option<(f32, Vec3)> = None;
    for k in 0..ATTRACTOR_CANDIDATES.min(count) {
        let c = candidate_index(index, k, count) as usize;
        let texel = rest[c];
        if !zero.is_valid(values[c], texel[3] > 0.5) {
            continue;
        }
        let pos = Vec3::new(texel[0], texel[1], texel[2]);
        let d = pos.distance_squared(own_pos);
        if best.map_or(true, |(bd, _)| d < bd) {
            best = Some((d, pos));
        }
    }
    best.map(|(_, pos)| pos)
}

/// Advance one particle by one frame
pub fn step_particle(
    position: Vec3,
    rest: Vec3,
    attractor: Option<Vec3>,
    params: &ParticleParameters,
    frame: &MotionFrame,
) -> Vec3 {
    let target = match (frame.active, attractor) {
        (true, Some(a)) => a,
        _ => rest,
    };
    let dt = frame.dt.clamp(0.0, MAX_STEP_DT);
    let rate = (params.particle_speed * dt).clamp(0.0, 1.0);
    let toward = target - position;

    let velocity = match params.movement_mode {
        MovementMode::Quickest => toward,
        MovementMode::Smoothed => {
            let phase = position * params.flow_field_frequency * TAU + Vec3::splat(frame.time);
            let flow = Vec3::new(phase.y.sin(), phase.z.sin(), phase.x.sin())
                * params.flow_field_strength
                * toward.length();
            toward.lerp(flow, params.flow_field_influence)
        }
    };

    clamp_to_radius(position + velocity * rate, params.radius * params.distance_tolerance)
}

pub fn clamp_to_radius(p: Vec3, max_len: f32) -> Vec3 {
    let len = p.length();
    if len > max_len && len > 0.0 {
        p * (max_len / len)
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn zero() -> ZeroPointParams {
        ZeroPointParams {
            threshold: 0.05,
            surface_threshold: 0.01,
            surface_control: true,
        }
    }

    #[test]
    fn test_surface_particles_use_tighter_band() {
        let z = zero();
        assert!(z.is_valid(0.03, false));
        assert!(!z.is_valid(0.03, true));
        let off = ZeroPointParams {
            surface_control: false,
            ..z
        };
        assert!(off.is_valid(0.03, true));
    }

    #[test]
    fn test_candidates_in_range() {
        for index in [0, 5, 999] {
            for k in 0..ATTRACTOR_CANDIDATES {
                assert!(candidate_index(index, k, 1000) < 1000);
            }
        }
        assert_eq!(candidate_index(3, 7, 1), 0);
    }

    #[test]
    fn test_own_zero_point_attracts_itself() {
        let rest = vec![[1.0, 0.0, 0.0, 0.0], [0.0, 2.0, 0.0, 0.0]];
        let values = vec![0.0, 1.0];
        assert_eq!(find_attractor(0, &values, &rest, &zero()), Some(Vec3::X));
    }

    #[test]
    fn test_no_valid_candidates() {
        let rest = vec![[0.0; 4]; 4];
        let values = vec![1.0; 4];
        assert_eq!(find_attractor(2, &values, &rest, &zero()), None);
    }

    #[test]
    fn test_quickest_lerps_toward_attractor() {
        let params = ParticleParameters {
            particle_speed: 5.0,
            ..Default::default()
        };
        let frame = MotionFrame {
            time: 0.0,
            dt: 0.1,
            active: true,
        };
        let p = step_particle(Vec3::ZERO, Vec3::Y, Some(Vec3::X), &params, &frame);
        assert_abs_diff_eq!(p.x, 0.5);
        assert_abs_diff_eq!(p.y, 0.0);
    }

    #[test]
    fn test_inactive_audio_returns_to_rest() {
        let params = ParticleParameters {
            particle_speed: 10.0,
            ..Default::default()
        };
        let frame = MotionFrame {
            time: 0.0,
            dt: 0.1,
            active: false,
        };
        let p = step_particle(Vec3::ZERO, Vec3::Y, Some(Vec3::X), &params, &frame);
        assert_eq!(p, Vec3::Y);
    }

    #[test]
    fn test_paused_clock_holds_position() {
        let params = ParticleParameters {
            movement_mode: MovementMode::Smoothed,
            ..Default::default()
        };
        let frame = MotionFrame {
            time: 2.0,
            dt: 0.0,
            active: true,
        };
        let start = Vec3::new(0.2, 0.1, -0.3);
        assert_eq!(step_particle(start, Vec3::ZERO, Some(Vec3::X), &params, &frame), start);
    }

    #[test]
    fn test_clamp_to_radius() {
        let p = clamp_to_radius(Vec3::new(10.0, 0.0, 0.0), 3.15);
        assert_abs_diff_eq!(p.length(), 3.15, epsilon = 1e-5);
        assert_eq!(clamp_to_radius(Vec3::ZERO, 1.0), Vec3::ZERO);
    }
}
