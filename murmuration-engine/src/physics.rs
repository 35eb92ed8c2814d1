//! Physics-based avoidance and hover behaviours. The engine never owns
//! collision geometry; it only issues sphere casts against an
//! externally supplied [`CollisionWorld`] and turns the results into
//! steering corrections.

use crate::species::SwarmSpecies;
use crate::vision::line_of_sight_vector;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Bit-mask filter applied to every cast: a cast and a collider
/// interact when each belongs to a layer the other collides with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionFilter {
    pub belongs_to: u32,
    pub collides_with: u32,
}

impl CollisionFilter {
    pub const ALL: Self = Self {
        belongs_to: u32::MAX,
        collides_with: u32::MAX,
    };

    pub fn matches(&self, other: &CollisionFilter) -> bool {
        self.collides_with & other.belongs_to != 0
            && other.collides_with & self.belongs_to != 0
    }
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self::ALL
    }
}

/// The externally supplied collision query surface. Implementations
/// must be safely queryable from many casts within one synchronous
/// phase; the orchestrator never interleaves casts with other
/// physics-dependent work.
pub trait CollisionWorld: Send + Sync {
    /// Cast a sphere from `origin` along `direction` (unit length) up to
    /// `max_distance`. Returns the hit fraction in `[0, 1]` of
    /// `max_distance`, or `None` for a clear path.
    fn sphere_cast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        filter: CollisionFilter,
    ) -> Option<f32>;
}

/// Obstacle avoidance for a single agent: casts a fan of spheres along
/// the line-of-sight spiral and returns a steering correction plus an
/// emergency-override flag.
///
/// Cast 0 is straight ahead. A clear first cast means the path is open
/// and no correction is needed; the first clear later cast becomes the
/// correction immediately. If everything hits, the direction whose hit
/// was farthest away is the fallback. The override flag is set when the
/// forward cast hits inside the force-avoidance distance.
pub fn avoid(
    world: &dyn CollisionWorld,
    species: &SwarmSpecies,
    rotation: Quat,
    position: Vec3,
) -> (Vec3, bool) {
    let Some(avoidance) = &species.avoidance else {
        return (Vec3::ZERO, false);
    };

    let mut best_direction = Vec3::ZERO;
    let mut best_fraction = 0.0_f32;
    let mut should_force = false;

    for index in 0..avoidance.max_casts {
        let direction = rotation
            * line_of_sight_vector(index, avoidance.max_casts, species.vision_angle_radians);

        let hit = world.sphere_cast(
            position + direction * avoidance.cast_radius,
            avoidance.cast_radius,
            direction,
            avoidance.distance,
            avoidance.filter,
        );

        match hit {
            Some(fraction) => {
                if index == 0 {
                    should_force = fraction * avoidance.distance < avoidance.force_distance;
                }
                if fraction > best_fraction {
                    best_direction = direction;
                    best_fraction = fraction;
                }
            }
            None => {
                if index == 0 {
                    // Nothing obstructing the path, don't correct it
                    return (Vec3::ZERO, false);
                }
                return (direction, should_force);
            }
        }
    }

    (best_direction, should_force)
}

/// Hover for a single agent: one cast along the configured direction,
/// blending from full correction at the surface down to zero at the
/// target clearance. Never forces an override.
pub fn hover(world: &dyn CollisionWorld, species: &SwarmSpecies, position: Vec3) -> (Vec3, bool) {
    let Some(hover) = &species.hover else {
        return (Vec3::ZERO, false);
    };

    let correction = world
        .sphere_cast(
            position,
            hover.cast_radius,
            hover.direction.normalize_or_zero(),
            hover.distance,
            hover.filter,
        )
        .map(|fraction| (-hover.direction.normalize_or_zero()).lerp(Vec3::ZERO, fraction))
        .unwrap_or(Vec3::ZERO);

    (correction, false)
}
