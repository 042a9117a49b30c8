use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::{
    engine::{EngineBuilder, EngineSettings, FallbackSettings},
    phases::{AutoTilePhase, CityPhase, DecorationConfig, DecorationPhase, RoadPhase},
    world::PixelAnchor,
};

fn default_tile_size() -> u32 {
    32
}

fn default_city_side() -> u32 {
    30
}

fn default_road_thickness() -> u32 {
    3
}

fn default_anchor_count() -> usize {
    5
}

fn default_fallback_margin() -> u32 {
    20
}

fn default_padding() -> u32 {
    20
}

fn default_footprint_cells() -> u32 {
    3
}

fn default_saves_dir() -> PathBuf {
    PathBuf::from("saves")
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    /// Absent means a fresh random seed per run.
    #[serde(default)]
    pub seed: Option<u64>,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    #[serde(default)]
    pub city: CityConfig,
    #[serde(default)]
    pub roads: RoadConfig,
    #[serde(default)]
    pub decoration: DecorationConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub interaction: InteractionConfig,
    #[serde(default = "default_saves_dir")]
    pub saves_dir: PathBuf,
    #[serde(default)]
    pub anchors: Vec<PixelAnchor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CityConfig {
    #[serde(default = "default_city_side")]
    pub width: u32,
    #[serde(default = "default_city_side")]
    pub height: u32,
    #[serde(default)]
    pub building_footprint: Option<u32>,
}

impl Default for CityConfig {
    fn default() -> Self {
        Self {
            width: default_city_side(),
            height: default_city_side(),
            building_footprint: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoadConfig {
    #[serde(default = "default_road_thickness")]
    pub thickness: u32,
    #[serde(default)]
    pub highway_width: Option<u32>,
    #[serde(default)]
    pub prune_isolated: bool,
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            thickness: default_road_thickness(),
            highway_width: None,
            prune_isolated: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_anchor_count")]
    pub anchor_count: usize,
    #[serde(default = "default_fallback_margin")]
    pub margin: u32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            anchor_count: default_anchor_count(),
            margin: default_fallback_margin(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractionConfig {
    #[serde(default = "default_padding")]
    pub padding: u32,
    #[serde(default = "default_footprint_cells")]
    pub footprint_cells: u32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            padding: default_padding(),
            footprint_cells: default_footprint_cells(),
        }
    }
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        scenario
            .validate()
            .with_context(|| format!("Invalid scenario {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("world size {}x{} has no cells", self.width, self.height);
        }
        if self.tile_size == 0 {
            bail!("tile_size must be positive");
        }
        Ok(())
    }

    pub fn settings(&self, seed: u64) -> EngineSettings {
        EngineSettings {
            world_name: self.name.clone(),
            seed,
            width: self.width,
            height: self.height,
            tile_size: self.tile_size,
            fallback: FallbackSettings {
                anchor_count: self.fallback.anchor_count,
                margin: self.fallback.margin,
            },
            saves_dir: self.saves_dir.clone(),
        }
    }

    /// Seed for this run: the override, else the scenario seed, else random.
    pub fn seed(&self, override_seed: Option<u64>) -> u64 {
        override_seed.or(self.seed).unwrap_or_else(rand::random)
    }

    /// Builder with the standard four phases configured from this scenario.
    pub fn engine_builder(&self, seed: u64) -> EngineBuilder {
        EngineBuilder::new(self.settings(seed))
            .with_phase(
                CityPhase::new(self.city.width, self.city.height)
                    .with_building_footprint(self.city.building_footprint),
            )
            .with_phase(
                RoadPhase::new(self.roads.thickness)
                    .with_highway(self.roads.highway_width)
                    .with_pruning(self.roads.prune_isolated),
            )
            .with_phase(AutoTilePhase::new())
            .with_phase(DecorationPhase::new(self.decoration.clone()))
    }
}
