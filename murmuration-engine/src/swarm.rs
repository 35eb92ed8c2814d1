//! The swarm update orchestrator. Drives one frame: snapshot agent and
//! node state into flat arrays, build the spatial grid, run the physics
//! queries serialized against the collision world, then run the
//! parallel per-agent behaviour update and write the results back.

use crate::behaviour::SwarmBehaviour;
use crate::grid::SpatialGrid;
use crate::math::{look_rotation, steer_towards};
use crate::physics::{self, CollisionWorld};
use crate::species::{MovementMode, NodeTag, SpeciesId, SpeciesTable, SwarmTag};
use crate::{DeltaTime, SwarmAgent, SwarmNode, Transform};
use glam::{Quat, Vec3};
use murmuration_core::{System, World};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;

/// Summary of the last completed frame, for logging and assertions.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameStats {
    pub agents: usize,
    pub nodes: usize,
    pub occupied_cells: usize,
    pub batches: usize,
}

/// Read-only copy of the frame's agent and node state. All later phases
/// index into these arrays; no phase ever reads the live store. The
/// buffers are owned by the system and recycled every frame to avoid
/// allocator churn under high agent counts.
#[derive(Default)]
struct FrameSnapshot {
    slots: Vec<u32>,
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    rotations: Vec<Quat>,
    tags: Vec<SwarmTag>,
    species_ids: Vec<SpeciesId>,
    node_positions: Vec<Vec3>,
    node_tags: Vec<NodeTag>,
}

impl FrameSnapshot {
    /// Empty the buffers, keeping their capacity.
    fn clear(&mut self) {
        self.slots.clear();
        self.positions.clear();
        self.velocities.clear();
        self.rotations.clear();
        self.tags.clear();
        self.species_ids.clear();
        self.node_positions.clear();
        self.node_tags.clear();
    }
}

/// One agent's finished frame, written back into its exclusive slot.
struct AgentUpdate {
    slot: u32,
    position: Vec3,
    velocity: Vec3,
    tag: SwarmTag,
    rotation: Quat,
    physics_result: Vec3,
    force_physics: bool,
}

pub struct SwarmSystem {
    species: Arc<SpeciesTable>,
    physics: Option<Arc<dyn CollisionWorld>>,
    last_frame: FrameStats,
    warned_missing_physics: bool,
    // Per-frame scratch, recycled between frames
    scratch: FrameSnapshot,
    batches: Vec<Vec<usize>>,
    physics_results: Vec<Vec3>,
    physics_flags: Vec<bool>,
}

impl SwarmSystem {
    pub fn new(species: Arc<SpeciesTable>, physics: Option<Arc<dyn CollisionWorld>>) -> Self {
        Self {
            species,
            physics,
            last_frame: FrameStats::default(),
            warned_missing_physics: false,
            scratch: FrameSnapshot::default(),
            batches: Vec::new(),
            physics_results: Vec::new(),
            physics_flags: Vec::new(),
        }
    }

    pub fn last_frame(&self) -> FrameStats {
        self.last_frame
    }

    /// Advance the whole swarm by `dt` seconds.
    pub fn update(&mut self, world: &mut World, dt: f32) {
        let started = Instant::now();

        // Take the scratch buffers out of self so the phases below can
        // borrow them alongside the species table
        let mut snapshot = std::mem::take(&mut self.scratch);
        snapshot.clear();

        if !self.snapshot(world, &mut snapshot) {
            self.scratch = snapshot;
            self.last_frame = FrameStats::default();
            return; // no agents at all, just stop
        }
        let agent_count = snapshot.slots.len();

        // Group agents into settings batches, in registration order
        let mut batches = std::mem::take(&mut self.batches);
        batches.iter_mut().for_each(Vec::clear);
        batches.resize(self.species.len(), Vec::new());
        for (index, id) in snapshot.species_ids.iter().enumerate() {
            debug_assert!(id.index() < batches.len(), "unregistered species id");
            if let Some(batch) = batches.get_mut(id.index()) {
                batch.push(index);
            }
        }

        // One shared cell size: the widest vision of any batch present
        // this frame. Coarser than a per-species grid but built once.
        let mut cell_size = 0.0_f32;
        for (id, species) in self.species.iter() {
            if !batches[id.index()].is_empty() {
                cell_size = cell_size.max(species.vision_distance);
            }
        }
        if cell_size <= 0.0 {
            log::error!("no registered species for {agent_count} live agents; frame dropped");
            self.scratch = snapshot;
            self.batches = batches;
            return;
        }

        // Grid build completes before any neighbour lookup below
        let grid = SpatialGrid::build(cell_size, &snapshot.positions);

        let mut physics_results = std::mem::take(&mut self.physics_results);
        let mut physics_flags = std::mem::take(&mut self.physics_flags);
        self.physics_phase(&snapshot, &batches, &mut physics_results, &mut physics_flags);

        // Per-batch behaviour update against the read-only snapshot.
        // Every agent owns exclusive write access to its own slot.
        for (id, species) in self.species.iter() {
            let batch = &batches[id.index()];
            if batch.is_empty() {
                continue;
            }

            let updates: Vec<AgentUpdate> = batch
                .par_iter()
                .map(|&index| {
                    let mut behaviour = SwarmBehaviour::new(
                        species,
                        snapshot.positions[index],
                        snapshot.velocities[index],
                        snapshot.tags[index],
                    );

                    let key = grid.key_of(snapshot.positions[index]);
                    grid.for_each_adjacent(key, |other| {
                        let other = other as usize;
                        if other != index {
                            behaviour.observe(
                                snapshot.positions[other],
                                snapshot.velocities[other],
                                snapshot.tags[other],
                            );
                        }
                    });

                    behaviour.finish(
                        dt,
                        physics_results[index],
                        physics_flags[index],
                        &snapshot.node_positions,
                        &snapshot.node_tags,
                    );

                    let up = if species.global_up {
                        Vec3::Y
                    } else {
                        snapshot.rotations[index] * Vec3::Y
                    };

                    AgentUpdate {
                        slot: snapshot.slots[index],
                        position: behaviour.position,
                        velocity: behaviour.velocity,
                        tag: behaviour.tag,
                        rotation: look_rotation(behaviour.velocity, up),
                        physics_result: physics_results[index],
                        force_physics: physics_flags[index],
                    }
                })
                .collect();

            self.write_back(world, &updates);
        }

        self.last_frame = FrameStats {
            agents: agent_count,
            nodes: snapshot.node_positions.len(),
            occupied_cells: grid.occupied_cells(),
            batches: batches.iter().filter(|batch| !batch.is_empty()).count(),
        };

        // Hand the scratch buffers back for the next frame
        self.scratch = snapshot;
        self.batches = batches;
        self.physics_results = physics_results;
        self.physics_flags = physics_flags;

        log::debug!(
            "swarm update: {} agents, {} nodes, {} cells, {} batches in {:?}",
            self.last_frame.agents,
            self.last_frame.nodes,
            self.last_frame.occupied_cells,
            self.last_frame.batches,
            started.elapsed()
        );
    }

    /// Copy agent and node state into the flat scratch arrays. Returns
    /// false when there is nothing to simulate.
    fn snapshot(&self, world: &World, snapshot: &mut FrameSnapshot) -> bool {
        let (Some(agent_storage), Some(transform_storage)) =
            (world.storage::<SwarmAgent>(), world.storage::<Transform>())
        else {
            return false;
        };

        for (slot, agent) in agent_storage.iter() {
            let Some(transform) = transform_storage.get_index(slot) else {
                continue; // an agent without a transform cannot move
            };
            snapshot.slots.push(slot);
            snapshot.positions.push(transform.translation);
            snapshot.rotations.push(transform.rotation);
            snapshot.velocities.push(agent.velocity);
            snapshot.tags.push(agent.tag);
            snapshot.species_ids.push(agent.species);
        }
        if snapshot.slots.is_empty() {
            return false;
        }

        if let Some(node_storage) = world.storage::<SwarmNode>() {
            for (slot, node) in node_storage.iter() {
                if let Some(transform) = transform_storage.get_index(slot) {
                    snapshot.node_positions.push(transform.translation);
                    snapshot.node_tags.push(node.tag);
                }
            }
        }

        true
    }

    /// Run avoidance and hover casts for every batch that needs them.
    /// The collision world is a shared external resource: this phase
    /// fully completes before any behaviour update reads its results.
    fn physics_phase(
        &mut self,
        snapshot: &FrameSnapshot,
        batches: &[Vec<usize>],
        results: &mut Vec<Vec3>,
        flags: &mut Vec<bool>,
    ) {
        let agent_count = snapshot.slots.len();
        results.clear();
        results.resize(agent_count, Vec3::ZERO);
        flags.clear();
        flags.resize(agent_count, false);

        let Some(collision_world) = &self.physics else {
            let needs_physics = self
                .species
                .iter()
                .any(|(id, species)| species.needs_physics() && !batches[id.index()].is_empty());
            if needs_physics && !self.warned_missing_physics {
                log::warn!("species with avoidance/hover enabled but no collision world attached");
                self.warned_missing_physics = true;
            }
            return;
        };

        for (id, species) in self.species.iter() {
            let batch = &batches[id.index()];
            if batch.is_empty() || !species.needs_physics() {
                continue;
            }

            let batch_results: Vec<(Vec3, bool)> = batch
                .par_iter()
                .map(|&index| {
                    let mut result = Vec3::ZERO;
                    let mut force = false;

                    if let Some(avoidance) = &species.avoidance {
                        let (correction, should_force) = physics::avoid(
                            collision_world.as_ref(),
                            species,
                            snapshot.rotations[index],
                            snapshot.positions[index],
                        );
                        // A zero correction means a clear path; steering
                        // towards it would brake for no reason
                        if correction != Vec3::ZERO {
                            let term = match avoidance.mode {
                                MovementMode::Force => correction,
                                MovementMode::Steering => steer_towards(
                                    snapshot.velocities[index],
                                    correction,
                                    species.max_speed,
                                    species.acceleration,
                                ),
                            };
                            result += term * avoidance.weight;
                        }
                        force |= should_force;
                    }

                    if let Some(hover) = &species.hover {
                        let (correction, should_force) = physics::hover(
                            collision_world.as_ref(),
                            species,
                            snapshot.positions[index],
                        );
                        if correction != Vec3::ZERO {
                            let term = match hover.mode {
                                MovementMode::Force => correction,
                                MovementMode::Steering => steer_towards(
                                    snapshot.velocities[index],
                                    correction,
                                    species.max_speed,
                                    species.acceleration,
                                ),
                            };
                            result += term * hover.weight;
                        }
                        force |= should_force;
                    }

                    (result, force)
                })
                .collect();

            for (&index, (result, force)) in batch.iter().zip(batch_results) {
                results[index] = result;
                flags[index] = force;
            }
        }
    }

    fn write_back(&self, world: &mut World, updates: &[AgentUpdate]) {
        let agents = world.storage_mut::<SwarmAgent>();
        for update in updates {
            if let Some(agent) = agents.get_index_mut(update.slot) {
                agent.velocity = update.velocity;
                agent.tag = update.tag;
                agent.physics_result = update.physics_result;
                agent.force_physics = update.force_physics;
            }
        }

        let transforms = world.storage_mut::<Transform>();
        for update in updates {
            if let Some(transform) = transforms.get_index_mut(update.slot) {
                transform.translation = update.position;
                transform.rotation = update.rotation;
            }
        }
    }
}

impl System for SwarmSystem {
    fn run(&mut self, world: &mut World) {
        let dt = world
            .get_resource::<DeltaTime>()
            .map_or(1.0 / 60.0, |delta| delta.0);
        self.update(world, dt);
    }

    fn name(&self) -> &str {
        "SwarmSystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::CollisionFilter;
    use crate::species::{AvoidanceSettings, SwarmSpecies};
    use std::f32::consts::PI;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Collision world that never hits anything but counts every cast.
    struct CountingWorld {
        casts: AtomicUsize,
    }

    impl CountingWorld {
        fn new() -> Self {
            Self {
                casts: AtomicUsize::new(0),
            }
        }
    }

    impl CollisionWorld for CountingWorld {
        fn sphere_cast(
            &self,
            _origin: Vec3,
            _radius: f32,
            _direction: Vec3,
            _max_distance: f32,
            _filter: CollisionFilter,
        ) -> Option<f32> {
            self.casts.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    fn plain_species() -> SwarmSpecies {
        SwarmSpecies {
            vision_distance: 10.0,
            vision_angle_radians: PI,
            ..Default::default()
        }
    }

    fn spawn_agent(world: &mut World, species: SpeciesId, position: Vec3, velocity: Vec3) {
        let entity = world.spawn();
        world.add_component(entity, Transform::from_translation(position));
        world.add_component(entity, SwarmAgent::new(species, velocity, SwarmTag::Default));
    }

    #[test]
    fn empty_world_short_circuits() {
        let mut table = SpeciesTable::new();
        table.register(plain_species()).unwrap();
        let mut system = SwarmSystem::new(Arc::new(table), None);

        let mut world = World::new();
        system.update(&mut world, 0.016);
        assert_eq!(system.last_frame().agents, 0);
    }

    #[test]
    fn empty_species_batch_is_skipped_entirely() {
        let mut table = SpeciesTable::new();
        let boids = table.register(plain_species()).unwrap();
        // Second species wants physics queries but has no agents
        table
            .register(SwarmSpecies {
                avoidance: Some(AvoidanceSettings::default()),
                ..plain_species()
            })
            .unwrap();

        let physics = Arc::new(CountingWorld::new());
        let mut system = SwarmSystem::new(Arc::new(table), Some(physics.clone()));

        let mut world = World::new();
        for i in 0..3 {
            spawn_agent(
                &mut world,
                boids,
                Vec3::new(i as f32, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 2.0),
            );
        }

        system.update(&mut world, 0.016);

        // No casts for the agentless species, and only the live batch ran
        assert_eq!(physics.casts.load(Ordering::SeqCst), 0);
        assert_eq!(system.last_frame().agents, 3);
        assert_eq!(system.last_frame().batches, 1);
    }

    #[test]
    fn agents_move_and_stay_inside_speed_bounds() {
        let mut table = SpeciesTable::new();
        let species = table.register(plain_species()).unwrap();
        let settings = plain_species();
        let mut system = SwarmSystem::new(Arc::new(table), None);

        let mut world = World::new();
        spawn_agent(&mut world, species, Vec3::ZERO, Vec3::new(0.0, 0.0, 3.0));
        spawn_agent(
            &mut world,
            species,
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 3.0),
        );

        for _ in 0..10 {
            system.update(&mut world, 0.016);
        }

        let agents = world.storage::<SwarmAgent>().unwrap();
        let transforms = world.storage::<Transform>().unwrap();
        for (slot, agent) in agents.iter() {
            let speed = agent.velocity.length();
            assert!(speed >= settings.min_speed - 1e-4);
            assert!(speed <= settings.max_speed + 1e-4);

            // Transform moved off its spawn point and faces the velocity
            let transform = transforms.get_index(slot).unwrap();
            assert!(transform.translation.z > 0.0);
            let forward = transform.forward();
            assert!(forward.dot(agent.velocity.normalize()) > 0.99);
        }
    }

    #[test]
    fn flock_pair_attracts_towards_each_other() {
        let mut table = SpeciesTable::new();
        // Cohesion only, force mode, no separation/alignment
        let species = table
            .register(SwarmSpecies {
                separation_weight: 0.0,
                alignment_weight: 0.0,
                cohesion_mode: MovementMode::Force,
                cohesion_weight: 5.0,
                min_speed: 0.0,
                max_speed: 50.0,
                ..plain_species()
            })
            .unwrap();
        let mut system = SwarmSystem::new(Arc::new(table), None);

        let mut world = World::new();
        // Both face each other so the vision cone contains the other
        spawn_agent(
            &mut world,
            species,
            Vec3::new(-3.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
        );
        spawn_agent(
            &mut world,
            species,
            Vec3::new(3.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
        );

        system.update(&mut world, 0.016);

        let agents = world.storage::<SwarmAgent>().unwrap();
        let velocities: Vec<Vec3> = agents.iter().map(|(_, agent)| agent.velocity).collect();
        // Left agent accelerates further +x, right agent further -x
        assert!(velocities[0].x > 1.0);
        assert!(velocities[1].x < -1.0);
    }

    #[test]
    fn target_node_pulls_lone_agent() {
        let mut table = SpeciesTable::new();
        let species = table
            .register(SwarmSpecies {
                target_mode: MovementMode::Force,
                target_weight: 20.0,
                minimum_target_distance: 1.0,
                min_speed: 0.0,
                max_speed: 50.0,
                ..plain_species()
            })
            .unwrap();
        let mut system = SwarmSystem::new(Arc::new(table), None);

        let mut world = World::new();
        spawn_agent(&mut world, species, Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0));
        let node = world.spawn();
        world.add_component(node, Transform::from_translation(Vec3::new(50.0, 0.0, 0.0)));
        world.add_component(
            node,
            SwarmNode {
                tag: NodeTag::Target,
            },
        );

        system.update(&mut world, 0.016);

        let agents = world.storage::<SwarmAgent>().unwrap();
        let (_, agent) = agents.iter().next().unwrap();
        assert!(agent.velocity.x > 0.0, "agent should drift towards the target");
        assert_eq!(system.last_frame().nodes, 1);
    }
}
