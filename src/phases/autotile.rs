use std::any::Any;

use anyhow::Result;
use tracing::debug;

use crate::{
    engine::{GenerationStage, Phase, PhaseContext},
    grid::{Grid, EAST, NORTH, SOUTH, WEST},
    rng::PhaseRng,
    tile::{RoadVariant, TileKind, CITY_INTERIOR},
};

/// Road variant for every 4-neighbor mask, indexed by `N | E | S | W` bits.
///
/// Dead ends face away from their single neighbor. Straight runs, T-junctions
/// and crossings have no dedicated art and use the base tile.
const ROAD_VARIANTS: [RoadVariant; 16] = [
    RoadVariant::Base,            // none
    RoadVariant::SouthSide,       // N
    RoadVariant::WestSide,        // E
    RoadVariant::SouthWestCorner, // N E
    RoadVariant::NorthSide,       // S
    RoadVariant::Base,            // N S
    RoadVariant::NorthWestCorner, // E S
    RoadVariant::Base,            // N E S
    RoadVariant::EastSide,        // W
    RoadVariant::SouthEastCorner, // N W
    RoadVariant::Base,            // E W
    RoadVariant::Base,            // N E W
    RoadVariant::NorthEastCorner, // S W
    RoadVariant::Base,            // N S W
    RoadVariant::Base,            // E S W
    RoadVariant::Base,            // N E S W
];

pub fn road_variant_for_mask(mask: u8) -> RoadVariant {
    ROAD_VARIANTS[usize::from(mask & (NORTH | EAST | SOUTH | WEST))]
}

/// Recomputes the road variant of every road cell from its neighborhood.
/// Returns the number of road cells tiled.
pub fn auto_tile_roads(grid: &mut Grid) -> usize {
    let roads: Vec<_> = grid
        .cells()
        .filter(|p| grid.get_at(*p) == TileKind::Road)
        .collect();
    for pos in &roads {
        let mask = grid.neighbor_mask(pos.x, pos.y, TileKind::Road);
        grid.set_road_variant(pos.x, pos.y, road_variant_for_mask(mask));
    }
    roads.len()
}

/// Every city cell gets the interior variant. Edge and corner variants are
/// reserved but not assigned.
pub fn auto_tile_cities(grid: &mut Grid) -> usize {
    let cities: Vec<_> = grid
        .cells()
        .filter(|p| grid.get_at(*p) == TileKind::City)
        .collect();
    for pos in &cities {
        grid.set_city_variant(pos.x, pos.y, CITY_INTERIOR);
    }
    cities.len()
}

pub struct AutoTilePhase;

impl AutoTilePhase {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AutoTilePhase {
    fn default() -> Self {
        Self::new()
    }
}

impl Phase for AutoTilePhase {
    fn name(&self) -> &str {
        "autotile"
    }

    fn completes(&self) -> GenerationStage {
        GenerationStage::AutoTiled
    }

    fn run(&mut self, _ctx: &PhaseContext, grid: &mut Grid, _rng: &mut PhaseRng<'_>) -> Result<()> {
        let cities = auto_tile_cities(grid);
        let roads = auto_tile_roads(grid);
        debug!(cities, roads, "variants assigned");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellPos;
    use crate::phases::roads::build_roads;

    #[test]
    fn mask_table_follows_tie_break_rules() {
        assert_eq!(road_variant_for_mask(0), RoadVariant::Base);

        assert_eq!(road_variant_for_mask(SOUTH), RoadVariant::NorthSide);
        assert_eq!(road_variant_for_mask(NORTH), RoadVariant::SouthSide);
        assert_eq!(road_variant_for_mask(EAST), RoadVariant::WestSide);
        assert_eq!(road_variant_for_mask(WEST), RoadVariant::EastSide);

        assert_eq!(road_variant_for_mask(NORTH | SOUTH), RoadVariant::Base);
        assert_eq!(road_variant_for_mask(EAST | WEST), RoadVariant::Base);

        assert_eq!(road_variant_for_mask(NORTH | EAST), RoadVariant::SouthWestCorner);
        assert_eq!(road_variant_for_mask(NORTH | WEST), RoadVariant::SouthEastCorner);
        assert_eq!(road_variant_for_mask(SOUTH | EAST), RoadVariant::NorthWestCorner);
        assert_eq!(road_variant_for_mask(SOUTH | WEST), RoadVariant::NorthEastCorner);

        for mask in [
            NORTH | EAST | SOUTH,
            NORTH | EAST | WEST,
            NORTH | SOUTH | WEST,
            EAST | SOUTH | WEST,
            NORTH | EAST | SOUTH | WEST,
        ] {
            assert_eq!(road_variant_for_mask(mask), RoadVariant::Base);
        }
    }

    #[test]
    fn corner_of_an_l_shaped_road() {
        let mut grid = Grid::new(5, 5);
        // Horizontal arm along y = 1, vertical arm down x = 1.
        for x in 1..4 {
            grid.set(x, 1, TileKind::Road);
        }
        for y in 2..4 {
            grid.set(1, y, TileKind::Road);
        }
        auto_tile_roads(&mut grid);

        assert_eq!(grid.road_variant(1, 1), RoadVariant::NorthWestCorner);
        assert_eq!(grid.road_variant(3, 1), RoadVariant::EastSide);
        assert_eq!(grid.road_variant(1, 3), RoadVariant::SouthSide);
        assert_eq!(grid.road_variant(2, 1), RoadVariant::Base);
    }

    #[test]
    fn isolated_road_is_base() {
        let mut grid = Grid::new(3, 3);
        grid.set(1, 1, TileKind::Road);
        grid.set_road_variant(1, 1, RoadVariant::EastSide);
        auto_tile_roads(&mut grid);
        assert_eq!(grid.road_variant(1, 1), RoadVariant::Base);
    }

    #[test]
    fn tiling_is_idempotent() {
        let mut grid = Grid::new(40, 40);
        build_roads(
            &mut grid,
            &[CellPos::new(2, 2), CellPos::new(35, 8), CellPos::new(12, 37)],
            3,
        );
        grid.set(20, 20, TileKind::City);

        auto_tile_cities(&mut grid);
        auto_tile_roads(&mut grid);
        let first = grid.clone();
        auto_tile_cities(&mut grid);
        auto_tile_roads(&mut grid);
        assert_eq!(first, grid);
    }

    #[test]
    fn every_city_cell_gets_interior() {
        let mut grid = Grid::new(4, 4);
        for pos in grid.cells().collect::<Vec<_>>() {
            grid.set_at(pos, TileKind::City);
            grid.set_city_variant(pos.x, pos.y, 9);
        }
        assert_eq!(auto_tile_cities(&mut grid), 16);
        assert!(grid
            .cells()
            .all(|p| grid.city_variant(p.x, p.y) == CITY_INTERIOR));
    }
}
