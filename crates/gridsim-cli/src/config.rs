//! Run configuration, loaded from a YAML file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gridsim_world::WorldConfig;
use serde::{Deserialize, Serialize};

/// Everything `gridsim run` needs besides the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Text map to load
    #[serde(default = "default_map")]
    pub map: PathBuf,

    /// Cells per map character, in each direction
    #[serde(default = "default_scale")]
    pub scale: u32,

    /// Trees scattered in each `T` block
    #[serde(default = "default_trees_per_block")]
    pub trees_per_block: u32,

    /// Simulated hours per tick
    #[serde(default = "default_step")]
    pub step: f32,

    /// Ticks to run
    #[serde(default = "default_steps")]
    pub steps: u64,

    #[serde(default = "default_explorers")]
    pub explorers: usize,

    #[serde(default = "default_loggers")]
    pub loggers: usize,

    /// Hour of day at which the manager takes its census
    #[serde(default = "default_census_hour")]
    pub census_hour: f64,

    /// Hours needed to fell one tree
    #[serde(default = "default_chop_hours")]
    pub chop_hours: f32,

    #[serde(default)]
    pub world: WorldConfig,
}

fn default_map() -> PathBuf {
    PathBuf::from("map.txt")
}
fn default_scale() -> u32 {
    1
}
fn default_trees_per_block() -> u32 {
    5
}
fn default_step() -> f32 {
    0.25
}
fn default_steps() -> u64 {
    1_000
}
fn default_explorers() -> usize {
    3
}
fn default_loggers() -> usize {
    4
}
fn default_census_hour() -> f64 {
    6.0
}
fn default_chop_hours() -> f32 {
    2.0
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            map: default_map(),
            scale: default_scale(),
            trees_per_block: default_trees_per_block(),
            step: default_step(),
            steps: default_steps(),
            explorers: default_explorers(),
            loggers: default_loggers(),
            census_hour: default_census_hour(),
            chop_hours: default_chop_hours(),
            world: WorldConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let mut config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.resolve_paths(path.parent().unwrap_or_else(|| Path::new("")));
        Ok(config)
    }

    /// Load `path` if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Map paths in a config file are relative to that file
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.map.is_relative() {
            self.map = base.join(&self.map);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use gridsim_nav::Adjacency;

    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let config: SimConfig = serde_yaml::from_str("explorers: 7\n").unwrap();
        assert_eq!(config.explorers, 7);
        assert_eq!(config.loggers, default_loggers());
        assert_eq!(config.scale, 1);
        assert_eq!(config.world, WorldConfig::default());
    }

    #[test]
    fn nested_world_config() {
        let yaml = "world:\n  adjacency: four\n  fog: true\n  path_workers: 0\n";
        let config: SimConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.world.adjacency, Adjacency::Four);
        assert!(config.world.fog);
        assert_eq!(config.world.path_workers, 0);
        assert_eq!(config.world.hours_per_day, 24.0);
    }

    #[test]
    fn unknown_world_keys_are_rejected() {
        let yaml = "world:\n  fogg: true\n";
        assert!(serde_yaml::from_str::<SimConfig>(yaml).is_err());
    }

    #[test]
    fn map_path_is_relative_to_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "map: maps/forest.txt\nsteps: 12").unwrap();

        let config = SimConfig::load(&path).unwrap();
        assert_eq!(config.steps, 12);
        assert_eq!(config.map, dir.path().join("maps/forest.txt"));
    }

    #[test]
    fn unreadable_config_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let err = SimConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("absent.yaml"));
    }

    #[test]
    fn no_path_means_defaults() {
        let config = SimConfig::load_or_default(None).unwrap();
        assert_eq!(config.steps, default_steps());
    }
}
