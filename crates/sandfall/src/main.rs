mod config;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use web_time::Instant;

use sandfall_core::world::{
    CountingStats, TickDriver, World, WorldEvent, WorldEventSink, delete_world,
};
use sandfall_simulation::Materials;

use crate::config::DriverConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// World name under the world directory
    #[arg(long)]
    world: Option<String>,

    /// Number of ticks to run before saving
    #[arg(long)]
    ticks: Option<u64>,

    /// Delete existing world and generate fresh
    #[arg(long)]
    regenerate: bool,

    /// Seed for a newly created world
    #[arg(long)]
    seed: Option<u64>,

    /// Grid width in tiles (multiple of 64)
    #[arg(long)]
    width: Option<usize>,

    /// Grid height in tiles (multiple of 64)
    #[arg(long)]
    height: Option<usize>,

    /// RON config file (default: sandfall.ron if present)
    #[arg(long)]
    config: Option<String>,
}

/// Tallies events by kind for the run summary
#[derive(Debug, Default)]
struct EventCounter {
    tiles_changed: u64,
    bodies_created: u64,
    bodies_removed: u64,
    particles_settled: u64,
    chunks_merged: u64,
    chunks_unloaded: u64,
    explosions: u64,
}

impl WorldEventSink for EventCounter {
    fn handle(&mut self, event: &WorldEvent) {
        match event {
            WorldEvent::TileChanged { .. } => self.tiles_changed += 1,
            WorldEvent::BodyCreated { .. } => self.bodies_created += 1,
            WorldEvent::BodyRemoved { .. } => self.bodies_removed += 1,
            WorldEvent::ParticleSettled { .. } => self.particles_settled += 1,
            WorldEvent::ChunkMerged { .. } => self.chunks_merged += 1,
            WorldEvent::ChunkUnloaded { .. } => self.chunks_unloaded += 1,
            WorldEvent::Explosion { .. } => self.explosions += 1,
            WorldEvent::ParticleKilled { .. } => {}
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command-line arguments
    let args = Args::parse();

    let mut config = DriverConfig::load(args.config.as_deref())?;
    if let Some(world) = args.world {
        config.world.world_name = world;
    }
    if let Some(seed) = args.seed {
        config.world.seed = seed;
    }
    if let Some(width) = args.width {
        config.world.width = width;
    }
    if let Some(height) = args.height {
        config.world.height = height;
    }
    if let Some(ticks) = args.ticks {
        config.simulation.ticks = ticks;
    }

    // Handle --regenerate flag
    if args.regenerate {
        log::info!("--regenerate flag detected, deleting existing world");
        delete_world(&config.world.world_dir, &config.world.world_name)?;
    }

    log::info!("Starting Sandfall");
    run(&config)
}

fn run(config: &DriverConfig) -> anyhow::Result<()> {
    let mut world = World::open(config.world_config(), Materials::new())
        .context("Failed to open world")?;
    let initial = world.load_initial();
    log::info!(
        "World '{}' (seed {}) ready: {} chunks merged, {} resident",
        config.world.world_name,
        world.seed(),
        initial.merged.len(),
        world.chunk_manager().resident_count()
    );

    let mut driver = TickDriver::new(config.simulation.ms_per_tick);
    let mut stats = CountingStats::default();
    let mut events = EventCounter::default();
    let mut view_x = 0;
    let mut last_update = Instant::now();
    let started = Instant::now();

    while driver.ticks() < config.simulation.ticks {
        world.frame();

        let due = if config.simulation.unthrottled {
            driver.update(driver.tick_length())
        } else {
            let now = Instant::now();
            let elapsed = now - last_update;
            last_update = now;
            driver.update(elapsed)
        };

        for _ in 0..due {
            world.tick_with_stats(&mut stats);
            if config.streaming.pan_speed != 0 {
                view_x += config.streaming.pan_speed;
                world.set_view(view_x, 0);
            }
            let autosave = config.streaming.autosave_ticks;
            if autosave > 0 && world.tick_count() % autosave == 0 {
                let saved = world.save()?;
                log::info!("[SAVE] Autosave at tick {}: {} chunks", world.tick_count(), saved);
            }
        }

        world.refresh_frame();
        world.dispatch_events(&mut events);

        if due == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    let elapsed = started.elapsed();
    log::info!(
        "Ran {} ticks in {:.2}s ({:.1} ticks/s)",
        driver.ticks(),
        elapsed.as_secs_f64(),
        driver.ticks() as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    log::info!(
        "Activity: {} tiles moved, {} interactions, {} particles settled",
        stats.tiles_moved,
        stats.interactions,
        stats.particles_settled
    );
    log::info!("Events: {:?}", events);
    log::info!(
        "Bodies: {}, particles in flight: {}",
        world.bodies().body_count(),
        world.particles().len()
    );

    let saved = world.save().context("Failed to save world")?;
    log::info!("[SAVE] Saved {} chunks on exit", saved);
    Ok(())
}
