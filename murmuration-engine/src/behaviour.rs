//! The per-agent behaviour accumulator. One `SwarmBehaviour` is created
//! per agent per frame: `observe` is called for every candidate
//! neighbour from the adjacent spatial cells, then `finish` folds the
//! accumulated terms, the environmental-node scan, the physics result
//! and gravity/drag into the agent's new velocity and position.

use crate::math::{clamp_magnitude_between, steer_towards};
use crate::species::{MovementMode, NodeTag, SwarmSpecies, SwarmTag};
use glam::Vec3;

/// Frame spikes above this timestep would destabilize the integration.
const MAX_TIMESTEP: f32 = 0.05;

/// Flee bias applied when prey sees a predator; deliberately stronger
/// than any distance-weighted separation term.
const FLEE_GAIN: f32 = 10.0;

/// Transient per-agent state, discarded after `finish`. Never shared
/// across agents or frames.
pub struct SwarmBehaviour<'a> {
    species: &'a SwarmSpecies,

    /// Read after `finish` to update the agent.
    pub position: Vec3,
    pub velocity: Vec3,
    pub tag: SwarmTag,

    separation: Vec3,
    sum_position: Vec3,
    sum_velocity: Vec3,
    in_vision_count: u32,
}

impl<'a> SwarmBehaviour<'a> {
    pub fn new(species: &'a SwarmSpecies, position: Vec3, velocity: Vec3, tag: SwarmTag) -> Self {
        Self {
            species,
            position,
            velocity,
            tag,
            separation: Vec3::ZERO,
            sum_position: Vec3::ZERO,
            sum_velocity: Vec3::ZERO,
            in_vision_count: 0,
        }
    }

    /// Called once for every other agent in the adjacent spatial cells.
    /// The caller is responsible for skipping the agent itself.
    pub fn observe(&mut self, other_position: Vec3, other_velocity: Vec3, other_tag: SwarmTag) {
        let difference = self.position - other_position;
        let distance = difference.length();

        // Angular offset between our heading and the direction to the
        // other agent. Safe-normalized so a zero velocity or coincident
        // position yields a 90 degree offset instead of NaN.
        let cosine = self
            .velocity
            .normalize_or_zero()
            .dot((-difference).normalize_or_zero())
            .clamp(-1.0, 1.0);
        let angle = cosine.acos();

        if distance >= self.species.vision_distance || angle >= self.species.vision_angle_radians {
            return;
        }

        let vision_distance = self.species.vision_distance;
        match (self.tag, other_tag) {
            (SwarmTag::Predator, SwarmTag::Prey) => {
                // Chase: bias separation towards the prey, harder when
                // the prey is further out of reach
                self.separation -=
                    difference.normalize_or_zero() * (distance / vision_distance);
            }
            (SwarmTag::Prey, SwarmTag::Predator) => {
                self.separation += difference.normalize_or_zero() * FLEE_GAIN;
            }
            _ => {
                self.separation += difference.normalize_or_zero()
                    * ((vision_distance - distance) / vision_distance);
                self.sum_position += other_position;
                self.sum_velocity += other_velocity;
                self.in_vision_count += 1;
            }
        }
    }

    /// Called after the last `observe`. Finalizes the velocity and
    /// position; the caller then derives orientation from the velocity.
    pub fn finish(
        &mut self,
        dt: f32,
        physics_result: Vec3,
        force_physics: bool,
        node_positions: &[Vec3],
        node_tags: &[NodeTag],
    ) {
        let dt = dt.min(MAX_TIMESTEP);
        let species = self.species;

        let mut acceleration = Vec3::ZERO;

        if !force_physics {
            if !node_positions.is_empty() {
                acceleration += self.node_acceleration(node_positions, node_tags);
            }

            if self.in_vision_count > 0 {
                let count = self.in_vision_count as f32;

                let separation = match species.separation_mode {
                    MovementMode::Force => self.separation,
                    MovementMode::Steering => self.steer(self.separation),
                };
                let alignment = self.steer(self.sum_velocity);
                let cohesion = match species.cohesion_mode {
                    MovementMode::Force => self.sum_position / count - self.position,
                    MovementMode::Steering => {
                        self.steer(self.sum_position - self.position * count)
                    }
                };

                acceleration += separation * species.separation_weight
                    + alignment * species.alignment_weight
                    + cohesion * species.cohesion_weight;
            }
        }

        // The physics result applies even under override; override only
        // suppresses the non-physics behaviours above.
        if species.needs_physics() {
            acceleration += physics_result;
        }

        let drag = self.velocity.normalize_or_zero() * species.drag;
        self.velocity = clamp_magnitude_between(
            self.velocity + (acceleration + species.gravity - drag) * dt,
            species.min_speed,
            species.max_speed,
        );
        self.position += self.velocity * dt;
    }

    /// Single pass over all environmental nodes: nearest target beyond
    /// the minimum distance and nearest obstacle within the maximum
    /// distance, by squared distance, no sorting.
    fn node_acceleration(&self, node_positions: &[Vec3], node_tags: &[NodeTag]) -> Vec3 {
        let species = self.species;

        let mut target_vector = Vec3::ZERO;
        let mut obstacle_vector = Vec3::ZERO;
        let mut closest_target = f32::INFINITY;
        let mut closest_obstacle = f32::INFINITY;

        let min_target_sq = species.minimum_target_distance * species.minimum_target_distance;
        let max_obstacle_sq =
            species.maximum_obstacle_distance * species.maximum_obstacle_distance;

        for (index, &node_position) in node_positions.iter().enumerate() {
            match node_tags[index] {
                NodeTag::Target => {
                    let difference = node_position - self.position;
                    let distance_sq = difference.length_squared();
                    if distance_sq > min_target_sq && distance_sq < closest_target {
                        closest_target = distance_sq;
                        target_vector = difference;
                    }
                }
                NodeTag::Obstacle => {
                    let difference = self.position - node_position;
                    let distance_sq = difference.length_squared();
                    if distance_sq < max_obstacle_sq && distance_sq < closest_obstacle {
                        closest_obstacle = distance_sq;
                        obstacle_vector = difference;
                    }
                }
            }
        }

        let mut acceleration = Vec3::ZERO;
        if target_vector != Vec3::ZERO {
            let term = match species.target_mode {
                MovementMode::Force => target_vector.normalize_or_zero(),
                MovementMode::Steering => self.steer(target_vector),
            };
            acceleration += term * species.target_weight;
        }
        if obstacle_vector != Vec3::ZERO {
            let term = match species.obstacle_mode {
                MovementMode::Force => obstacle_vector.normalize_or_zero(),
                MovementMode::Steering => self.steer(obstacle_vector),
            };
            acceleration += term * species.obstacle_weight;
        }
        acceleration
    }

    fn steer(&self, vector: Vec3) -> Vec3 {
        steer_towards(
            self.velocity,
            vector,
            self.species.max_speed,
            self.species.acceleration,
        )
    }

    #[cfg(test)]
    pub(crate) fn separation(&self) -> Vec3 {
        self.separation
    }

    #[cfg(test)]
    pub(crate) fn in_vision_count(&self) -> u32 {
        self.in_vision_count
    }
}
