use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};

use tileworld::{
    logging,
    save::SaveStore,
    scenario::{Scenario, ScenarioLoader},
    world::World,
    Engine,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Procedural tile-world generator")]
struct Cli {
    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a world from a scenario's anchors
    Generate {
        /// Path to the scenario YAML file
        #[arg(long, default_value = "scenarios/small_town.yaml")]
        scenario: PathBuf,

        /// Override the scenario seed
        #[arg(long)]
        seed: Option<u64>,

        /// Write the result to the saves directory
        #[arg(long)]
        save: bool,

        /// Print an ASCII preview of the map
        #[arg(long)]
        preview: bool,
    },
    /// Load a numbered save, regenerating randomly if it cannot be read
    Load {
        #[arg(long, default_value = "scenarios/small_town.yaml")]
        scenario: PathBuf,

        /// Map number of the save to load
        #[arg(long)]
        map: u32,

        #[arg(long)]
        preview: bool,
    },
    /// List saved maps
    List {
        #[arg(long, default_value = "saves")]
        saves_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level)?;

    match cli.command {
        Command::Generate {
            scenario,
            seed,
            save,
            preview,
        } => {
            let scenario = load_scenario(&scenario)?;
            let seed = scenario.seed(seed);
            let mut engine = scenario.engine_builder(seed).build();
            engine
                .generate(&scenario.anchors)
                .context("World generation failed")?;
            report(&scenario, &engine, preview);
            if save {
                let path = engine.save().context("Failed to save world")?;
                println!("Saved to {}", path.display());
            }
        }
        Command::Load {
            scenario,
            map,
            preview,
        } => {
            let scenario = load_scenario(&scenario)?;
            let seed = scenario.seed(None);
            let mut engine = scenario.engine_builder(seed).build();
            if let Err(err) = engine.load_by_number(map) {
                warn!(map, error = %err, "load failed, generating a random world instead");
                engine
                    .generate(&[])
                    .context("Fallback generation failed")?;
            }
            report(&scenario, &engine, preview);
        }
        Command::List { saves_dir } => {
            let saves = SaveStore::new(&saves_dir).list()?;
            if saves.is_empty() {
                println!("No saves in {}", saves_dir.display());
            }
            for save in saves {
                println!(
                    "#{:<4} {}x{} {:<8} {}",
                    save.map_number, save.width, save.height, save.generation_mode, save.save_time
                );
            }
        }
    }
    Ok(())
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let scenario = ScenarioLoader::new(".").load(path)?;
    info!(scenario = %scenario.name, "scenario loaded");
    Ok(scenario)
}

fn report(scenario: &Scenario, engine: &Engine, preview: bool) {
    let world: &World = engine.world();
    let stats = world.stats();
    println!(
        "World '{}' ({}x{}, {} mode): {} city, {} road, {} nature tiles, {} road networks",
        scenario.name,
        world.grid().width(),
        world.grid().height(),
        world.mode().tag(),
        stats.city_tiles,
        stats.road_tiles,
        stats.nature_tiles,
        stats.num_paths
    );
    let zones = world.interaction_zones(
        scenario.interaction.padding,
        scenario.interaction.footprint_cells,
    );
    for zone in zones {
        let center = zone.center();
        println!(
            "  zone at ({}, {}) size {}x{}",
            center.x, center.y, zone.width, zone.height
        );
    }
    if preview {
        print!("{}", world.render_ascii());
    }
}
