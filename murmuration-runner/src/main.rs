mod collision;

use clap::Parser;
use collision::StaticCollisionWorld;
use log::{info, warn};
use murmuration_config::{load_config, SimulationConfig};
use murmuration_core::{Scheduler, World};
use murmuration_engine::{
    CollisionWorld, DeltaTime, SpeciesId, SpeciesTable, SwarmNode, SwarmSpawner, SwarmSystem,
    Transform,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about = "Murmuration swarm simulation runner", long_about = None)]
struct Args {
    /// Path to the simulation configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

fn main() {
    env_logger::init();

    let args = Args::parse();
    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Failed to load config: {error}");
            process::exit(1);
        }
    };
    info!("using configuration from {}", args.config.display());

    // Registration order follows the config order, so config indices
    // map one-to-one onto species ids
    let mut species_table = SpeciesTable::new();
    let mut species_ids = Vec::with_capacity(config.species.len());
    for species in &config.species {
        match species_table.register(species.settings.clone()) {
            Ok(id) => species_ids.push(id),
            Err(error) => {
                eprintln!("Invalid settings for species '{}': {error}", species.name);
                process::exit(1);
            }
        }
    }
    let species_table = Arc::new(species_table);

    let mut world = World::new();
    initialize_world(&mut world, &config, &species_table, &species_ids);

    let collision_world = StaticCollisionWorld::from_config(&config.colliders);
    let physics: Option<Arc<dyn CollisionWorld>> = if collision_world.is_empty() {
        None
    } else {
        Some(Arc::new(collision_world))
    };

    let frame_duration = Duration::from_secs_f64(1.0 / f64::from(config.framerate));
    world.add_resource(DeltaTime(frame_duration.as_secs_f32()));

    let mut scheduler = Scheduler::new();
    scheduler.with_fixed_timestep(frame_duration);
    scheduler.add_system(SwarmSystem::new(species_table, physics));

    info!(
        "running at {} fps with {} entities",
        config.framerate,
        world.entity_count()
    );

    let mut frame: u64 = 0;
    let mut last_report = Instant::now();
    loop {
        if let Some(frames) = config.frames {
            if frame >= frames {
                break;
            }
        }

        let busy = scheduler.execute_once(&mut world);
        if busy > frame_duration && config.framerate > 10 {
            warn!("frame time exceeded budget: {busy:?} > {frame_duration:?}");
        }

        frame += 1;
        if frame % 60 == 0 {
            let elapsed = last_report.elapsed().as_secs_f64();
            info!("frame {frame}: {:.1} fps average", 60.0 / elapsed);
            last_report = Instant::now();
        }
    }

    info!("simulation finished after {frame} frames");
}

/// Spawn environmental nodes and the configured agent populations.
fn initialize_world(
    world: &mut World,
    config: &SimulationConfig,
    species_table: &SpeciesTable,
    species_ids: &[SpeciesId],
) {
    for node in &config.nodes {
        let entity = world.spawn();
        world.add_component(entity, Transform::from_translation(node.position));
        world.add_component(entity, SwarmNode { tag: node.tag });
    }

    let mut rng = rand::thread_rng();
    for spawner_config in &config.spawners {
        let species_index = config
            .species_index(&spawner_config.species)
            .expect("spawner species validated at load time");

        let spawner = SwarmSpawner {
            species: species_ids[species_index],
            count: spawner_config.count,
            bounds_min: spawner_config.bounds_min,
            bounds_max: spawner_config.bounds_max,
            shape: spawner_config.shape,
            direction: spawner_config.direction,
        };

        match spawner.spawn(world, species_table, &mut rng) {
            Ok(spawned) => info!(
                "spawned {} '{}' agents",
                spawned.len(),
                spawner_config.species
            ),
            Err(error) => {
                eprintln!(
                    "Failed to spawn '{}' agents: {error}",
                    spawner_config.species
                );
                process::exit(1);
            }
        }
    }
}
