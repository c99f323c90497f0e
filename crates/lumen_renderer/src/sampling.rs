//! Random sampling kernel.
//!
//! Workers own a [`SmallRng`] seeded per frame; there is no shared RNG
//! state. Cone-constrained reflection directions come from a precomputed
//! table of unit vectors shared by all workers.

use std::sync::OnceLock;

use lumen_math::{Vec2, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Number of precomputed unit directions in the shared table.
const DIRECTION_TABLE_SIZE: usize = 32 * 1024;

/// Cone angles below this collapse to a perfect mirror reflection.
const CONE_ANGLE_MIN: f32 = 1e-4;

/// Rejection sampling bail-out. Narrow cones reject most of the table; past
/// this many attempts the mirror direction is close enough.
const MAX_REJECTION_ATTEMPTS: u32 = 4096;

/// Uniform point inside the unit disc, as (angle, sqrt-radius) so callers
/// can scale the radius themselves.
pub fn uniform_disc(rng: &mut SmallRng) -> Vec2 {
    let angle = rng.gen::<f32>() * 2.0 * std::f32::consts::PI;
    let radius = rng.gen::<f32>().sqrt();
    Vec2::new(angle.cos() * radius, angle.sin() * radius)
}

/// Precomputed table of uniformly distributed unit directions.
pub struct DirectionTable {
    directions: Vec<Vec3>,
}

impl DirectionTable {
    pub fn new(count: usize, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut directions = Vec::with_capacity(count);
        while directions.len() < count {
            let candidate = Vec3::new(
                rng.gen::<f32>() * 2.0 - 1.0,
                rng.gen::<f32>() * 2.0 - 1.0,
                rng.gen::<f32>() * 2.0 - 1.0,
            );
            let len_sq = candidate.length_squared();
            if len_sq > 1e-6 && len_sq <= 1.0 {
                directions.push(candidate / len_sq.sqrt());
            }
        }
        Self { directions }
    }

    /// Pick a direction within a cone of half-angle `max_angle` around the
    /// mirror reflection of `view` about `normal`.
    ///
    /// Directions are drawn from the table and rejected until one falls
    /// inside the cone. A half-angle of pi accepts the whole sphere, which
    /// is how diffuse surfaces sample; indirect-light gating above rejects
    /// the below-horizon picks.
    pub fn random_reflection(
        &self,
        view: Vec3,
        normal: Vec3,
        max_angle: f32,
        rng: &mut SmallRng,
    ) -> Vec3 {
        let mirror = view.reflect(normal);
        if max_angle < CONE_ANGLE_MIN {
            return mirror;
        }

        let cos_limit = max_angle.cos();
        for _ in 0..MAX_REJECTION_ATTEMPTS {
            let candidate = self.directions[rng.gen_range(0..self.directions.len())];
            if candidate.dot(mirror) >= cos_limit {
                return candidate;
            }
        }
        mirror
    }
}

static REFLECTION_TABLE: OnceLock<DirectionTable> = OnceLock::new();

/// The process-wide reflection table, built on first use.
pub fn reflection_table() -> &'static DirectionTable {
    REFLECTION_TABLE
        .get_or_init(|| DirectionTable::new(DIRECTION_TABLE_SIZE, rand::random::<u64>()))
}
