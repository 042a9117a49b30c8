use std::any::Any;

use anyhow::Result;
use rand::{seq::SliceRandom, Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    engine::{GenerationStage, Phase, PhaseContext},
    grid::{CellPos, Grid},
    rng::{hash_coords, noise01, PhaseRng},
    tile::TileKind,
};

const CLUSTER_SIZE: std::ops::RangeInclusive<usize> = 3..=6;
const ATTEMPTS_PER_CLUSTER: usize = 10;
const SEED_MARGIN: i32 = 2;
const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];
// Decorrelates the flower colour hash from the band hash.
const COLOUR_SALT: u64 = 0x5bd1_e995;

fn default_clusters() -> usize {
    8
}

fn default_flower_chance() -> f64 {
    0.03
}

fn default_log_chance() -> f64 {
    0.003
}

fn default_rock_chance() -> f64 {
    0.003
}

fn default_bush_chance() -> f64 {
    0.002
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecorationConfig {
    #[serde(default = "default_clusters")]
    pub clusters: usize,
    #[serde(default = "default_flower_chance")]
    pub flower_chance: f64,
    #[serde(default = "default_log_chance")]
    pub log_chance: f64,
    #[serde(default = "default_rock_chance")]
    pub rock_chance: f64,
    #[serde(default = "default_bush_chance")]
    pub bush_chance: f64,
}

impl Default for DecorationConfig {
    fn default() -> Self {
        Self {
            clusters: default_clusters(),
            flower_chance: default_flower_chance(),
            log_chance: default_log_chance(),
            rock_chance: default_rock_chance(),
            bush_chance: default_bush_chance(),
        }
    }
}

impl DecorationConfig {
    /// Kind for a scatter draw in `[0, 1)`, using cumulative bands.
    fn scatter_kind(&self, roll: f64, red: bool) -> Option<TileKind> {
        let mut threshold = self.flower_chance;
        if roll < threshold {
            return Some(flower(red));
        }
        threshold += self.log_chance;
        if roll < threshold {
            return Some(TileKind::NatureLog);
        }
        threshold += self.rock_chance;
        if roll < threshold {
            return Some(TileKind::NatureRock);
        }
        threshold += self.bush_chance;
        if roll < threshold {
            return Some(TileKind::NatureBush);
        }
        None
    }
}

fn flower(red: bool) -> TileKind {
    if red {
        TileKind::NatureFlowerRed
    } else {
        TileKind::NatureFlower
    }
}

/// Places up to `config.clusters` flower clusters. A cluster is only placed
/// whole; seeds without enough free nature around them are abandoned.
/// Returns the number of clusters placed.
pub fn place_flower_clusters<R: RngCore>(
    grid: &mut Grid,
    config: &DecorationConfig,
    rng: &mut R,
) -> usize {
    let width = grid.width() as i32;
    let height = grid.height() as i32;
    if width <= SEED_MARGIN * 2 || height <= SEED_MARGIN * 2 {
        return 0;
    }

    let max_attempts = config.clusters * ATTEMPTS_PER_CLUSTER;
    let mut placed = 0;
    let mut attempts = 0;
    while placed < config.clusters && attempts < max_attempts {
        attempts += 1;
        let seed = CellPos::new(
            rng.gen_range(SEED_MARGIN..width - SEED_MARGIN),
            rng.gen_range(SEED_MARGIN..height - SEED_MARGIN),
        );
        if grid.get_at(seed) != TileKind::Nature {
            continue;
        }

        let target = rng.gen_range(CLUSTER_SIZE);
        let mut offsets = NEIGHBOR_OFFSETS;
        offsets.shuffle(rng);
        let mut cluster = vec![seed];
        for (dx, dy) in offsets {
            if cluster.len() >= target {
                break;
            }
            let cell = seed.offset(dx, dy);
            if grid.get_at(cell) == TileKind::Nature && grid.in_bounds(cell.x, cell.y) {
                cluster.push(cell);
            }
        }
        if cluster.len() < target {
            continue;
        }

        for cell in cluster {
            let red = rng.gen_bool(0.5);
            grid.set_at(cell, flower(red));
        }
        placed += 1;
    }
    placed
}

/// Sparse per-cell decoration driven by the coordinate hash. Returns the
/// number of cells changed.
pub fn scatter_decorations(grid: &mut Grid, config: &DecorationConfig, seed: u64) -> usize {
    let candidates: Vec<CellPos> = grid
        .cells()
        .filter(|p| grid.get_at(*p) == TileKind::Nature)
        .collect();
    let mut changed = 0;
    for pos in candidates {
        let roll = noise01(pos.x, pos.y, seed);
        let red = hash_coords(pos.x, pos.y, seed ^ COLOUR_SALT) & 1 == 1;
        if let Some(kind) = config.scatter_kind(roll, red) {
            grid.set_at(pos, kind);
            changed += 1;
        }
    }
    changed
}

pub struct DecorationPhase {
    config: DecorationConfig,
}

impl DecorationPhase {
    pub fn new(config: DecorationConfig) -> Self {
        Self { config }
    }
}

impl Default for DecorationPhase {
    fn default() -> Self {
        Self::new(DecorationConfig::default())
    }
}

impl Phase for DecorationPhase {
    fn name(&self) -> &str {
        "decoration"
    }

    fn completes(&self) -> GenerationStage {
        GenerationStage::Decorated
    }

    fn run(&mut self, ctx: &PhaseContext, grid: &mut Grid, rng: &mut PhaseRng<'_>) -> Result<()> {
        let clusters = place_flower_clusters(grid, &self.config, rng);
        let scattered = scatter_decorations(grid, &self.config, ctx.seed);
        debug!(clusters, scattered, "nature decorated");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
