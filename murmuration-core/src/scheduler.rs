use crate::World;
use std::time::{Duration, Instant};

/// Core trait that all systems must implement.
pub trait System: Send + Sync {
    /// Executes the system logic.
    fn run(&mut self, world: &mut World);

    /// Optional name for debugging and profiling.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Simple scheduler for executing systems in registration order with
/// optional fixed-timestep pacing.
#[derive(Default)]
pub struct Scheduler {
    systems: Vec<Box<dyn System>>,
    fixed_timestep: Option<Duration>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a system to the scheduler.
    pub fn add_system<T: System + 'static>(&mut self, system: T) {
        self.systems.push(Box::new(system));
    }

    /// Set a fixed timestep for deterministic simulation.
    pub fn with_fixed_timestep(&mut self, timestep: Duration) -> &mut Self {
        self.fixed_timestep = Some(timestep);
        self
    }

    /// Execute all systems once. Returns the wall-clock time the systems took,
    /// before any fixed-timestep sleep.
    pub fn execute_once(&mut self, world: &mut World) -> Duration {
        let start = Instant::now();

        for system in &mut self.systems {
            system.run(world);
        }

        let total_duration = start.elapsed();

        // If using fixed timestep, sleep if we finished early
        if let Some(target_duration) = self.fixed_timestep {
            if total_duration < target_duration {
                std::thread::sleep(target_duration - total_duration);
            }
        }

        total_duration
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }
}
