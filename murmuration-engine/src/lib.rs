//! Real-time flocking simulation engine: thousands of autonomous agents
//! compute steering forces from nearby agents and from the environment,
//! then integrate motion every frame.

use glam::{Quat, Vec3};
use murmuration_core::impl_component;

pub mod behaviour;
pub mod grid;
pub mod math;
pub mod physics;
pub mod spawner;
pub mod species;
pub mod swarm;
pub mod vision;

pub use behaviour::SwarmBehaviour;
pub use grid::SpatialGrid;
pub use physics::{CollisionFilter, CollisionWorld};
pub use spawner::{SpawnDirection, SpawnShape, SwarmSpawner};
pub use species::{
    AvoidanceSettings, HoverSettings, MovementMode, NodeTag, SpeciesError, SpeciesId,
    SpeciesTable, SwarmSpecies, SwarmTag,
};
pub use swarm::{FrameStats, SwarmSystem};

// --- Components ---

/// World-space placement of an entity.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}
impl_component!(Transform);

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
        }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    /// The local +Z axis in world space.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    /// The local +Y axis in world space.
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }
}

/// Per-agent simulation state. Position and orientation live on the
/// entity's [`Transform`]; everything here is mutated by the
/// [`SwarmSystem`] each frame.
#[derive(Debug, Clone, Copy)]
pub struct SwarmAgent {
    /// Which settings batch this agent belongs to.
    pub species: SpeciesId,
    pub velocity: Vec3,
    pub tag: SwarmTag,
    /// Cached result of the last physics-query phase.
    pub physics_result: Vec3,
    /// Whether the physics result must override all other behaviours
    /// this frame (emergency avoidance).
    pub force_physics: bool,
}
impl_component!(SwarmAgent);

impl SwarmAgent {
    pub fn new(species: SpeciesId, velocity: Vec3, tag: SwarmTag) -> Self {
        Self {
            species,
            velocity,
            tag,
            physics_result: Vec3::ZERO,
            force_physics: false,
        }
    }
}

/// A fixed point of interest that influences agents but is never
/// influenced by them.
#[derive(Debug, Clone, Copy)]
pub struct SwarmNode {
    pub tag: NodeTag,
}
impl_component!(SwarmNode);

// --- Resources ---

/// Seconds elapsed since the previous frame.
#[derive(Debug, Clone, Copy)]
pub struct DeltaTime(pub f32);
