//! gridsim CLI - headless driver for grid simulation worlds.
//!
//! - `gridsim run` - load a map, spawn the demo crew and run the simulation loop
//! - `gridsim map` - inspect a map file

mod config;
mod demo;
mod map;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gridsim_world::World;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::SimConfig;
use crate::demo::Summary;
use crate::map::{load_map, terrain_counts, MapOptions};

#[derive(Parser)]
#[command(name = "gridsim")]
#[command(about = "Discrete-time grid simulation", version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation
    Run {
        /// YAML run configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Map file, overriding the configuration
        #[arg(short, long)]
        map: Option<PathBuf>,

        /// Number of ticks, overriding the configuration
        #[arg(long)]
        steps: Option<u64>,
    },

    /// Load a map and print its dimensions and terrain
    Map {
        #[arg(short, long)]
        map: PathBuf,

        /// Cells per map character
        #[arg(long, default_value_t = 1)]
        scale: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Run { config, map, steps } => run(config.as_deref(), map, steps),
        Commands::Map { map, scale } => show_map(&map, scale),
    }
}

fn run(config_path: Option<&Path>, map: Option<PathBuf>, steps: Option<u64>) -> Result<()> {
    let mut config = SimConfig::load_or_default(config_path)?;
    if let Some(map) = map {
        config.map = map;
    }
    if let Some(steps) = steps {
        config.steps = steps;
    }

    let options = MapOptions {
        scale: config.scale,
        trees_per_block: config.trees_per_block,
        seed: config.world.seed,
    };
    let grid = load_map(&config.map, options)
        .with_context(|| format!("Failed to load map from {}", config.map.display()))?;
    let mut world = World::new(grid, config.world.clone()).context("Failed to create world")?;
    let roster = demo::populate(&mut world, &config)?;

    info!(
        camp = %roster.camp,
        manager = roster.manager,
        explorers = roster.explorers.len(),
        loggers = roster.loggers.len(),
        steps = config.steps,
        step = config.step,
        workers = config.world.path_workers,
        "Starting simulation"
    );
    let started = Instant::now();
    for _ in 0..config.steps {
        world.tick(config.step);
    }
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        pending_paths = world.pending_paths(),
        "Simulation finished"
    );

    println!("{}", Summary::collect(&world));
    Ok(())
}

fn show_map(path: &Path, scale: u32) -> Result<()> {
    let options = MapOptions {
        scale,
        ..MapOptions::default()
    };
    let grid = load_map(path, options)
        .with_context(|| format!("Failed to load map from {}", path.display()))?;

    println!("Map: {}", path.display());
    println!("Size: {} x {} cells", grid.width(), grid.height());
    println!();
    println!("Terrain:");
    for (terrain, count) in terrain_counts(&grid) {
        println!("  {terrain:<10} {count}");
    }
    Ok(())
}
