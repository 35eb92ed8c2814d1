//! Species settings: one immutable configuration shared by a batch of
//! agents. Agents carry only a [`SpeciesId`]; the settings themselves
//! live in the [`SpeciesTable`] and are read-only during a frame.

use crate::physics::CollisionFilter;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A tag that an agent can have. Makes differently tagged agents
/// interact asymmetrically (predators chase, prey flee).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwarmTag {
    #[default]
    Default,
    Predator,
    Prey,
}

/// Tags that an environmental node can have: a target attracts agents,
/// an obstacle repels them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeTag {
    Target,
    Obstacle,
}

/// The mode in which a behaviour's directional vector is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementMode {
    /// Steer the current velocity towards the vector, capped by the
    /// species' acceleration limit.
    #[default]
    Steering,
    /// Apply the normalized vector directly as acceleration.
    Force,
}

/// Physics-based obstacle avoidance parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidanceSettings {
    pub mode: MovementMode,
    /// The distance at which to detect obstacles.
    pub distance: f32,
    /// Hits closer than this force avoidance above all other behaviours.
    pub force_distance: f32,
    pub cast_radius: f32,
    /// Maximum number of sphere casts in the line-of-sight fan.
    pub max_casts: u32,
    pub filter: CollisionFilter,
    pub weight: f32,
}

impl Default for AvoidanceSettings {
    fn default() -> Self {
        Self {
            mode: MovementMode::Steering,
            distance: 10.0,
            force_distance: 2.0,
            cast_radius: 0.5,
            max_casts: 8,
            filter: CollisionFilter::ALL,
            weight: 1.0,
        }
    }
}

/// Physics-based hover parameters: keep a target clearance above the
/// nearest surface along `direction`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HoverSettings {
    pub mode: MovementMode,
    /// World-space cast direction, typically straight down.
    pub direction: Vec3,
    /// The clearance to hold above the surface.
    pub distance: f32,
    pub cast_radius: f32,
    pub filter: CollisionFilter,
    pub weight: f32,
}

impl Default for HoverSettings {
    fn default() -> Self {
        Self {
            mode: MovementMode::Steering,
            direction: Vec3::NEG_Y,
            distance: 5.0,
            cast_radius: 0.5,
            filter: CollisionFilter::ALL,
            weight: 1.0,
        }
    }
}

/// The settings for one kind of swarm agent. Immutable once registered;
/// every agent referencing the same id is processed as one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmSpecies {
    /// The agent will not go slower than this.
    pub min_speed: f32,
    /// The agent will not go faster than this.
    pub max_speed: f32,
    /// Acceleration limit used by all steering-mode behaviours.
    pub acceleration: f32,

    /// The tag newly spawned agents of this species start with.
    pub default_tag: SwarmTag,
    /// Whether orientation uses the world up or the agent's previous up.
    pub global_up: bool,

    /// How far this agent can see.
    pub vision_distance: f32,
    /// Half-angle of the vision cone; PI means full 360 degree vision.
    pub vision_angle_radians: f32,

    pub separation_mode: MovementMode,
    pub separation_weight: f32,

    /// Alignment is always applied via steering.
    pub alignment_weight: f32,

    pub cohesion_mode: MovementMode,
    pub cohesion_weight: f32,

    pub target_mode: MovementMode,
    /// Targets closer than this are ignored.
    pub minimum_target_distance: f32,
    pub target_weight: f32,

    pub obstacle_mode: MovementMode,
    /// Obstacle nodes farther than this are ignored.
    pub maximum_obstacle_distance: f32,
    pub obstacle_weight: f32,

    /// Physics-based obstacle avoidance; `None` disables it.
    pub avoidance: Option<AvoidanceSettings>,
    /// Physics-based hover; `None` disables it.
    pub hover: Option<HoverSettings>,

    /// Applied every update, scaled by delta time.
    pub gravity: Vec3,
    /// Opposes the current velocity, scaled by delta time.
    pub drag: f32,
}

impl Default for SwarmSpecies {
    fn default() -> Self {
        Self {
            min_speed: 2.0,
            max_speed: 5.0,
            acceleration: 5.0,
            default_tag: SwarmTag::Default,
            global_up: true,
            vision_distance: 10.0,
            vision_angle_radians: std::f32::consts::PI * 0.75,
            separation_mode: MovementMode::Steering,
            separation_weight: 1.0,
            alignment_weight: 1.0,
            cohesion_mode: MovementMode::Steering,
            cohesion_weight: 1.0,
            target_mode: MovementMode::Steering,
            minimum_target_distance: 0.0,
            target_weight: 0.0,
            obstacle_mode: MovementMode::Steering,
            maximum_obstacle_distance: 0.0,
            obstacle_weight: 0.0,
            avoidance: None,
            hover: None,
            gravity: Vec3::ZERO,
            drag: 0.0,
        }
    }
}

impl SwarmSpecies {
    /// Whether the physics-query phase has any work for this species.
    pub fn needs_physics(&self) -> bool {
        self.avoidance.is_some() || self.hover.is_some()
    }
}

/// Fatal configuration problems, reported at registration time rather
/// than from inside the per-frame loop.
#[derive(Debug, Error, PartialEq)]
pub enum SpeciesError {
    #[error("vision distance must be positive, got {0}")]
    VisionDistance(f32),
    #[error("vision angle must be positive, got {0}")]
    VisionAngle(f32),
    #[error("speed bounds inverted: min {min} > max {max}")]
    SpeedBounds { min: f32, max: f32 },
    #[error("speed bounds must be non-negative, got min {0}")]
    NegativeSpeed(f32),
    #[error("avoidance needs at least one sphere cast")]
    NoAvoidanceCasts,
    #[error("sphere cast radius must be positive, got {0}")]
    CastRadius(f32),
    #[error("hover direction must be non-zero")]
    HoverDirection,
    #[error("unknown species id {0:?}")]
    UnknownSpecies(SpeciesId),
}

/// Key of a settings batch inside a [`SpeciesTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpeciesId(pub(crate) u32);

impl SpeciesId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Registry of all species active in a simulation. Settings are
/// validated on registration and never mutated afterwards.
#[derive(Debug, Default)]
pub struct SpeciesTable {
    species: Vec<SwarmSpecies>,
}

impl SpeciesTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a settings batch, returning its id.
    pub fn register(&mut self, species: SwarmSpecies) -> Result<SpeciesId, SpeciesError> {
        if !(species.vision_distance > 0.0) {
            return Err(SpeciesError::VisionDistance(species.vision_distance));
        }
        if !(species.vision_angle_radians > 0.0) {
            return Err(SpeciesError::VisionAngle(species.vision_angle_radians));
        }
        if species.min_speed < 0.0 {
            return Err(SpeciesError::NegativeSpeed(species.min_speed));
        }
        if species.min_speed > species.max_speed {
            return Err(SpeciesError::SpeedBounds {
                min: species.min_speed,
                max: species.max_speed,
            });
        }
        if let Some(avoidance) = &species.avoidance {
            if avoidance.max_casts == 0 {
                return Err(SpeciesError::NoAvoidanceCasts);
            }
            if !(avoidance.cast_radius > 0.0) {
                return Err(SpeciesError::CastRadius(avoidance.cast_radius));
            }
        }
        if let Some(hover) = &species.hover {
            if !(hover.cast_radius > 0.0) {
                return Err(SpeciesError::CastRadius(hover.cast_radius));
            }
            if hover.direction.length_squared() < 1e-12 {
                return Err(SpeciesError::HoverDirection);
            }
        }

        let id = SpeciesId(self.species.len() as u32);
        self.species.push(species);
        Ok(id)
    }

    pub fn get(&self, id: SpeciesId) -> &SwarmSpecies {
        &self.species[id.index()]
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Iterate settings batches in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (SpeciesId, &SwarmSpecies)> {
        self.species
            .iter()
            .enumerate()
            .map(|(index, species)| (SpeciesId(index as u32), species))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_assigns_sequential_ids() {
        let mut table = SpeciesTable::new();
        let a = table.register(SwarmSpecies::default()).unwrap();
        let b = table.register(SwarmSpecies::default()).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn register_rejects_zero_vision_distance() {
        let mut table = SpeciesTable::new();
        let species = SwarmSpecies {
            vision_distance: 0.0,
            ..Default::default()
        };
        assert_eq!(
            table.register(species),
            Err(SpeciesError::VisionDistance(0.0))
        );
    }

    #[test]
    fn register_rejects_inverted_speed_bounds() {
        let mut table = SpeciesTable::new();
        let species = SwarmSpecies {
            min_speed: 6.0,
            max_speed: 5.0,
            ..Default::default()
        };
        assert!(matches!(
            table.register(species),
            Err(SpeciesError::SpeedBounds { .. })
        ));
    }

    #[test]
    fn register_rejects_castless_avoidance() {
        let mut table = SpeciesTable::new();
        let species = SwarmSpecies {
            avoidance: Some(AvoidanceSettings {
                max_casts: 0,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(table.register(species), Err(SpeciesError::NoAvoidanceCasts));
    }

    #[test]
    fn species_deserializes_with_defaults() {
        let species: SwarmSpecies = serde_json::from_str(r#"{"max_speed": 8.0}"#).unwrap();
        assert_eq!(species.max_speed, 8.0);
        assert_eq!(species.min_speed, 2.0);
        assert!(species.avoidance.is_none());
    }
}
