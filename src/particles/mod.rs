//! Particle rest geometry and CPU reference for the zero-point and
//! particle stages.

pub mod motion;

use std::f32::consts::PI;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub use motion::{candidate_index, find_attractor, step_particle, MotionFrame, ZeroPointParams};

/// Rest positions, `[x, y, z, surface]` with `surface` 1.0 for particles
/// on the sphere shell and 0.0 for volume particles.
///
/// The first `count · surface_ratio` particles follow a golden-angle spiral
/// over the sphere surface; the rest are uniform inside the volume.
pub fn rest_positions(count: usize, radius: f32, surface_ratio: f32, seed: u64) -> Vec<[f32; 4]> {
    let surface_count = (count as f32 * surface_ratio).floor() as usize;
    let golden_ratio = (1.0 + 5f32.sqrt()) / 2.0;
    let angle_increment = PI * 2.0 * golden_ratio;

    let mut positions = Vec::with_capacity(count);
    for i in 0..surface_count {
        let t = i as f32 / surface_count as f32;
        let inclination = (1.0 - 2.0 * t).acos();
        let azimuth = angle_increment * i as f32;
        let p = spherical(radius, inclination, azimuth);
        positions.push([p.x, p.y, p.z, 1.0]);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    for _ in surface_count..count {
        let p = random_in_sphere(&mut rng, radius);
        positions.push([p.x, p.y, p.z, 0.0]);
    }
    positions
}

/// Starting positions: uniform inside a sphere of a tenth of the radius
pub fn initial_positions(count: usize, radius: f32, seed: u64) -> Vec<[f32; 4]> {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    (0..count)
        .map(|_| {
            let p = random_in_sphere(&mut rng, radius / 10.0);
            [p.x, p.y, p.z, 0.0]
        })
        .collect()
}

/// Zero-pad a texel list to fill a `side × side` texture
pub fn pad_to_texture(mut texels: Vec<[f32; 4]>, side: u32) -> Vec<[f32; 4]> {
    texels.resize((side as usize) * (side as usize), [0.0; 4]);
    texels
}

fn random_in_sphere(rng: &mut StdRng, radius: f32) -> Vec3 {
    let r = rng.random::<f32>().cbrt() * radius;
    let theta = rng.random::<f32>() * PI * 2.0;
    let phi = (2.0 * rng.random::<f32>() - 1.0).acos();
    spherical(r, phi, theta)
}

fn spherical(r: f32, inclination: f32, azimuth: f32) -> Vec3 {
    Vec3::new(
        r * inclination.sin() * azimuth.cos(),
        r * inclination.sin() * azimuth.sin(),
        r * inclination.cos(),
    )
}
