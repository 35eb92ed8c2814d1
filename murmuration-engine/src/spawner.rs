//! Population spawning: emits initial agent records before the first
//! update touches them. Placement and facing follow small declarative
//! policies so scenes can describe flocks without scripting.

use crate::math::look_rotation;
use crate::species::{SpeciesError, SpeciesId, SpeciesTable};
use crate::{SwarmAgent, Transform};
use glam::Vec3;
use murmuration_core::{Entity, World};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The shape agents are scattered in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnShape {
    /// Fill the entire bounds uniformly.
    #[default]
    Cube,
    /// A sphere stretched to fit the bounds, via rejection sampling.
    Ellipsoid,
}

/// How each spawned agent's initial facing is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnDirection {
    #[default]
    Random,
    /// Face the center of the bounds.
    Inward,
    /// Face away from the center of the bounds.
    Outward,
    /// Keep the default facing (+Z).
    Forward,
}

/// A one-shot spawn request for a batch of agents of one species.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmSpawner {
    pub species: SpeciesId,
    pub count: u32,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    #[serde(default)]
    pub shape: SpawnShape,
    #[serde(default)]
    pub direction: SpawnDirection,
}

impl SwarmSpawner {
    /// Emit `count` agents into the world. Each gets a transform at the
    /// sampled position facing the sampled direction, and a velocity of
    /// that direction at the species' minimum speed.
    pub fn spawn<R: Rng>(
        &self,
        world: &mut World,
        species_table: &SpeciesTable,
        rng: &mut R,
    ) -> Result<Vec<Entity>, SpeciesError> {
        if self.species.index() >= species_table.len() {
            return Err(SpeciesError::UnknownSpecies(self.species));
        }
        let species = species_table.get(self.species);
        let center = (self.bounds_min + self.bounds_max) * 0.5;

        let mut spawned = Vec::with_capacity(self.count as usize);
        for _ in 0..self.count {
            let position = match self.shape {
                SpawnShape::Cube => {
                    let sample = random_unit_cube(rng);
                    self.bounds_min + sample * (self.bounds_max - self.bounds_min)
                }
                SpawnShape::Ellipsoid => {
                    // Rejection-sample the unit sphere, then stretch to
                    // the bounds
                    let mut sample = random_unit_cube(rng);
                    while (sample - Vec3::splat(0.5)).length() > 0.5 {
                        sample = random_unit_cube(rng);
                    }
                    self.bounds_min + sample * (self.bounds_max - self.bounds_min)
                }
            };

            let direction = match self.direction {
                SpawnDirection::Random => {
                    (random_unit_cube(rng) - Vec3::splat(0.5)).normalize_or_zero()
                }
                SpawnDirection::Inward => (center - position).normalize_or_zero(),
                SpawnDirection::Outward => (position - center).normalize_or_zero(),
                SpawnDirection::Forward => Vec3::Z,
            };

            let entity = world.spawn();
            world.add_component(
                entity,
                Transform {
                    translation: position,
                    rotation: look_rotation(direction, Vec3::Y),
                    scale: 1.0,
                },
            );
            world.add_component(
                entity,
                SwarmAgent::new(
                    self.species,
                    direction * species.min_speed,
                    species.default_tag,
                ),
            );
            spawned.push(entity);
        }

        Ok(spawned)
    }
}

fn random_unit_cube<R: Rng>(rng: &mut R) -> Vec3 {
    Vec3::new(rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>())
}
