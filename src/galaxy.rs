use std::f32::consts::TAU;

use glam::Vec3;
use rand::Rng;

use crate::params::GalaxyParams;

/// Number of points in the background starfield.
pub const STAR_COUNT: u32 = 20_000;
/// Starfield cube side length per unit of initial camera distance.
pub const STAR_SPREAD_FACTOR: f32 = 50.0;
/// World-space size of a starfield point.
pub const STAR_POINT_SIZE: f32 = 0.001;

/// CPU-side point buffers: `count * 3` position floats and the same number
/// of color floats, laid out x,y,z / r,g,b per point.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointCloud {
    pub positions: Vec<f32>,
    pub colors: Vec<f32>,
}

impl PointCloud {
    /// Number of points in the cloud.
    pub fn len(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Position of point `index`.
    pub fn position(&self, index: usize) -> Vec3 {
        let i = index * 3;
        Vec3::new(self.positions[i], self.positions[i + 1], self.positions[i + 2])
    }

    /// Color of point `index`.
    pub fn color(&self, index: usize) -> Vec3 {
        let i = index * 3;
        Vec3::new(self.colors[i], self.colors[i + 1], self.colors[i + 2])
    }
}

/// Generates the spiral galaxy described by `params`.
///
/// The shape is a deterministic function of the parameters; placement
/// detail comes from `rng`, so two calls with the same parameters and the
/// same seeded generator produce identical buffers.
///
/// Each point picks a radial distance, joins one of the arms by index
/// modulo `branch_count`, twists by `radius * spin`, then jitters each
/// axis by an offset that scales with its own radius. Color interpolates
/// from `inside_color` to `outside_color` over the radial distance.
pub fn generate(params: &GalaxyParams, rng: &mut impl Rng) -> PointCloud {
    let count = params.count as usize;
    // The panel allows a branch count of zero; a single arm is the
    // documented fallback (the angle formula divides by this).
    let branches = params.branch_count.max(1) as usize;

    let mut positions = Vec::with_capacity(count * 3);
    let mut colors = Vec::with_capacity(count * 3);

    for i in 0..count {
        let radius = rng.gen::<f32>() * params.radius;
        let branch_angle = (i % branches) as f32 / branches as f32 * TAU;
        let spin_angle = radius * params.spin;

        let jitter_x = (rng.gen::<f32>() - 0.5) * params.randomness * radius;
        let jitter_y = (rng.gen::<f32>() - 0.5) * params.randomness * radius;
        let jitter_z = (rng.gen::<f32>() - 0.5) * params.randomness * radius;

        let angle = branch_angle + spin_angle;
        positions.push(angle.cos() * radius + jitter_x);
        positions.push(jitter_y);
        positions.push(angle.sin() * radius + jitter_z);

        // A zero radius would make the interpolation factor 0/0; collapse
        // to the inner color instead of letting NaN into the buffer.
        let mix = if params.radius > 0.0 {
            radius / params.radius
        } else {
            0.0
        };
        let color = params.inside_color.lerp(params.outside_color, mix);
        colors.push(color.x);
        colors.push(color.y);
        colors.push(color.z);
    }

    PointCloud { positions, colors }
}

/// Generates the one-shot background starfield: `count` white points with
/// every coordinate uniform in `[-spread / 2, spread / 2]`.
pub fn starfield(count: u32, spread: f32, rng: &mut impl Rng) -> PointCloud {
    let floats = count as usize * 3;
    let mut positions = Vec::with_capacity(floats);
    for _ in 0..floats {
        positions.push((rng.gen::<f32>() - 0.5) * spread);
    }
    PointCloud {
        positions,
        colors: vec![1.0; floats],
    }
}
