use std::any::Any;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    engine::{GenerationStage, Phase, PhaseContext},
    grid::{CellPos, Grid},
    rng::PhaseRng,
    tile::TileKind,
};

/// City footprint preset attached to an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum District {
    /// Uses the configured default city size.
    #[default]
    Standard,
    Residential,
    Commercial,
    Industrial,
}

impl District {
    pub fn size(self, default: (u32, u32)) -> (u32, u32) {
        match self {
            District::Standard => default,
            District::Residential => (30, 25),
            District::Commercial => (40, 35),
            District::Industrial => (50, 45),
        }
    }
}

/// Stamps a solid `City` rectangle of `width × height` whose top-left corner
/// is `center - size / 2`. Cells outside the grid are skipped.
pub fn fill_rectangle(grid: &mut Grid, center: CellPos, width: u32, height: u32) {
    stamp_rectangle(grid, center, width, height, TileKind::City);
}

/// Marks a square building footprint centered on `center`.
pub fn place_footprint(grid: &mut Grid, center: CellPos, size: u32) {
    stamp_rectangle(grid, center, size, size, TileKind::Building);
}

fn stamp_rectangle(grid: &mut Grid, center: CellPos, width: u32, height: u32, kind: TileKind) {
    let x0 = i64::from(center.x) - i64::from(width / 2);
    let y0 = i64::from(center.y) - i64::from(height / 2);
    // Clip to the grid up front so huge rectangles cost nothing off-map.
    let x_start = x0.max(0);
    let y_start = y0.max(0);
    let x_end = (x0 + i64::from(width)).min(i64::from(grid.width()));
    let y_end = (y0 + i64::from(height)).min(i64::from(grid.height()));
    for y in y_start..y_end {
        for x in x_start..x_end {
            grid.set(x as i32, y as i32, kind);
        }
    }
}

pub struct CityPhase {
    city_size: (u32, u32),
    building_footprint: Option<u32>,
}

impl CityPhase {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            city_size: (width, height),
            building_footprint: None,
        }
    }

    pub fn with_building_footprint(mut self, size: Option<u32>) -> Self {
        self.building_footprint = size.filter(|s| *s > 0);
        self
    }
}

impl Default for CityPhase {
    fn default() -> Self {
        Self::new(30, 30)
    }
}

impl Phase for CityPhase {
    fn name(&self) -> &str {
        "city"
    }

    fn completes(&self) -> GenerationStage {
        GenerationStage::CitiesPlaced
    }

    fn run(&mut self, ctx: &PhaseContext, grid: &mut Grid, _rng: &mut PhaseRng<'_>) -> Result<()> {
        for anchor in ctx.anchors {
            let (width, height) = anchor.district.size(self.city_size);
            fill_rectangle(grid, anchor.pos, width, height);
        }
        if let Some(size) = self.building_footprint {
            for anchor in ctx.anchors {
                place_footprint(grid, anchor.pos, size);
            }
        }
        debug!(
            cities = ctx.anchors.len(),
            city_cells = grid.count(TileKind::City),
            "city rectangles stamped"
        );
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
