//! File configuration for a murmuration simulation: species settings,
//! spawn requests, environmental nodes and the static collision
//! geometry the runner builds its collision world from. All fatal
//! precondition checks happen here or at species registration, never
//! inside the per-frame loop.

use glam::Vec3;
use murmuration_engine::{
    CollisionFilter, NodeTag, SpawnDirection, SpawnShape, SwarmSpecies,
};
use serde::Deserialize;
use std::path::Path;
use std::{fs, io};
use thiserror::Error;

// --- Error Type ---

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Validation(String),
}

// --- Configuration Sections ---

/// One named species settings batch.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeciesConfig {
    pub name: String,
    #[serde(flatten)]
    pub settings: SwarmSpecies,
}

/// A spawn request, referencing a species by name.
#[derive(Debug, Clone, Deserialize)]
pub struct SpawnerConfig {
    pub species: String,
    pub count: u32,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    #[serde(default)]
    pub shape: SpawnShape,
    #[serde(default)]
    pub direction: SpawnDirection,
}

/// A fixed environmental node.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub position: Vec3,
    pub tag: NodeTag,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SphereColliderConfig {
    pub center: Vec3,
    pub radius: f32,
    #[serde(default)]
    pub filter: CollisionFilter,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaneColliderConfig {
    /// Plane normal; need not be pre-normalized.
    pub normal: Vec3,
    /// Signed distance of the plane from the origin along the normal.
    pub offset: f32,
    #[serde(default)]
    pub filter: CollisionFilter,
}

/// Static geometry for the runner's analytic collision world.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ColliderConfig {
    pub spheres: Vec<SphereColliderConfig>,
    pub planes: Vec<PlaneColliderConfig>,
}

// --- Top-Level Config Struct ---

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_framerate")]
    pub framerate: u32,
    /// Stop after this many frames; `None` runs until interrupted.
    #[serde(default)]
    pub frames: Option<u64>,
    pub species: Vec<SpeciesConfig>,
    #[serde(default)]
    pub spawners: Vec<SpawnerConfig>,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub colliders: ColliderConfig,
}

fn default_framerate() -> u32 {
    60
}

impl SimulationConfig {
    /// Index of the named species in the `species` list.
    pub fn species_index(&self, name: &str) -> Option<usize> {
        self.species.iter().position(|species| species.name == name)
    }
}

// --- Loading Function ---

/// Load and validate a config file. The format is chosen by extension:
/// `.toml` parses as TOML, anything else as JSON.
pub fn load_config(path: &Path) -> Result<SimulationConfig, ConfigError> {
    let content = fs::read_to_string(path)?;

    let config: SimulationConfig = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };

    validate(&config)?;
    Ok(config)
}

fn validate(config: &SimulationConfig) -> Result<(), ConfigError> {
    if config.framerate == 0 {
        return Err(ConfigError::Validation("framerate cannot be zero".into()));
    }
    if config.species.is_empty() {
        return Err(ConfigError::Validation(
            "at least one species must be defined".into(),
        ));
    }

    for (index, species) in config.species.iter().enumerate() {
        if config
            .species
            .iter()
            .skip(index + 1)
            .any(|other| other.name == species.name)
        {
            return Err(ConfigError::Validation(format!(
                "duplicate species name '{}'",
                species.name
            )));
        }
    }

    for spawner in &config.spawners {
        if config.species_index(&spawner.species).is_none() {
            return Err(ConfigError::Validation(format!(
                "spawner references unknown species '{}'",
                spawner.species
            )));
        }
        if spawner.bounds_min.cmpgt(spawner.bounds_max).any() {
            return Err(ConfigError::Validation(format!(
                "spawner for '{}' has inverted bounds",
                spawner.species
            )));
        }
    }

    for sphere in &config.colliders.spheres {
        if !(sphere.radius > 0.0) {
            return Err(ConfigError::Validation(
                "sphere collider radius must be positive".into(),
            ));
        }
    }
    for plane in &config.colliders.planes {
        if plane.normal.length_squared() < 1e-12 {
            return Err(ConfigError::Validation(
                "plane collider normal must be non-zero".into(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmuration_engine::SwarmTag;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_named(content: &str, suffix: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    #[test]
    fn load_valid_json_config() {
        let content = r#"{
          "framerate": 30,
          "frames": 100,
          "species": [
            { "name": "starlings", "max_speed": 9.0, "default_tag": "prey" },
            { "name": "hawks", "default_tag": "predator" }
          ],
          "spawners": [
            {
              "species": "starlings",
              "count": 500,
              "bounds_min": [-20.0, 0.0, -20.0],
              "bounds_max": [20.0, 10.0, 20.0],
              "shape": "ellipsoid",
              "direction": "inward"
            }
          ],
          "nodes": [ { "position": [0.0, 5.0, 0.0], "tag": "target" } ]
        }"#;
        let file = write_named(content, ".json");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.framerate, 30);
        assert_eq!(config.frames, Some(100));
        assert_eq!(config.species.len(), 2);
        assert_eq!(config.species[0].settings.max_speed, 9.0);
        assert_eq!(config.species[0].settings.default_tag, SwarmTag::Prey);
        assert_eq!(config.species_index("hawks"), Some(1));
        assert_eq!(config.spawners[0].count, 500);
        assert_eq!(config.spawners[0].shape, SpawnShape::Ellipsoid);
        assert_eq!(config.nodes[0].tag, NodeTag::Target);
        assert!(config.colliders.spheres.is_empty());
    }

    #[test]
    fn load_valid_toml_config() {
        let content = r#"
            framerate = 120

            [[species]]
            name = "gnats"
            vision_distance = 4.0

            [[spawners]]
            species = "gnats"
            count = 50
            bounds_min = [-5.0, -5.0, -5.0]
            bounds_max = [5.0, 5.0, 5.0]

            [[colliders.planes]]
            normal = [0.0, 1.0, 0.0]
            offset = 0.0
        "#;
        let file = write_named(content, ".toml");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.framerate, 120);
        assert_eq!(config.species[0].settings.vision_distance, 4.0);
        assert_eq!(config.colliders.planes.len(), 1);
    }

    #[test]
    fn zero_framerate_is_rejected() {
        let content = r#"{ "framerate": 0, "species": [ { "name": "a" } ] }"#;
        let file = write_named(content, ".json");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn unknown_spawner_species_is_rejected() {
        let content = r#"{
          "species": [ { "name": "a" } ],
          "spawners": [ {
            "species": "missing", "count": 1,
            "bounds_min": [0.0, 0.0, 0.0], "bounds_max": [1.0, 1.0, 1.0]
          } ]
        }"#;
        let file = write_named(content, ".json");
        let error = load_config(file.path()).unwrap_err();
        assert!(error.to_string().contains("unknown species"));
    }

    #[test]
    fn duplicate_species_names_are_rejected() {
        let content = r#"{ "species": [ { "name": "a" }, { "name": "a" } ] }"#;
        let file = write_named(content, ".json");
        let error = load_config(file.path()).unwrap_err();
        assert!(error.to_string().contains("duplicate"));
    }

    #[test]
    fn inverted_spawner_bounds_are_rejected() {
        let content = r#"{
          "species": [ { "name": "a" } ],
          "spawners": [ {
            "species": "a", "count": 1,
            "bounds_min": [1.0, 0.0, 0.0], "bounds_max": [0.0, 1.0, 1.0]
          } ]
        }"#;
        let file = write_named(content, ".json");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }
}
