//! Spatial model - the tile grid and its per-cell rendering metadata

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tile::{CityVariant, RoadVariant, TileKind, CITY_INTERIOR};

/// Cell position in the grid. Signed so callers may address cells outside the
/// map without wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellPos {
    pub x: i32,
    pub y: i32,
}

impl CellPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

/// Cardinal neighbor bits used by [`Grid::neighbor_mask`].
pub const NORTH: u8 = 1;
pub const EAST: u8 = 2;
pub const SOUTH: u8 = 4;
pub const WEST: u8 = 8;

/// Tile grid representing the world. Kinds and both variant layers are flat
/// row-major arrays sharing one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: u32,
    height: u32,
    kinds: Vec<TileKind>,
    city_variants: Vec<CityVariant>,
    road_variants: Vec<RoadVariant>,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            kinds: vec![TileKind::Nature; len],
            city_variants: vec![CITY_INTERIOR; len],
            road_variants: vec![RoadVariant::Base; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_count(&self) -> usize {
        self.kinds.len()
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some()
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let x = u32::try_from(x).ok()?;
        let y = u32::try_from(y).ok()?;
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    /// Kind at `(x, y)`; `Nature` when out of bounds.
    pub fn get(&self, x: i32, y: i32) -> TileKind {
        self.index(x, y)
            .map(|idx| self.kinds[idx])
            .unwrap_or(TileKind::Nature)
    }

    /// Sets the kind at `(x, y)`; out-of-bounds writes are ignored.
    pub fn set(&mut self, x: i32, y: i32, kind: TileKind) {
        if let Some(idx) = self.index(x, y) {
            self.kinds[idx] = kind;
        }
    }

    pub fn get_at(&self, pos: CellPos) -> TileKind {
        self.get(pos.x, pos.y)
    }

    pub fn set_at(&mut self, pos: CellPos, kind: TileKind) {
        self.set(pos.x, pos.y, kind);
    }

    pub fn city_variant(&self, x: i32, y: i32) -> CityVariant {
        self.index(x, y)
            .map(|idx| self.city_variants[idx])
            .unwrap_or(CITY_INTERIOR)
    }

    pub fn set_city_variant(&mut self, x: i32, y: i32, variant: CityVariant) {
        if let Some(idx) = self.index(x, y) {
            self.city_variants[idx] = variant;
        }
    }

    pub fn road_variant(&self, x: i32, y: i32) -> RoadVariant {
        self.index(x, y)
            .map(|idx| self.road_variants[idx])
            .unwrap_or(RoadVariant::Base)
    }

    pub fn set_road_variant(&mut self, x: i32, y: i32, variant: RoadVariant) {
        if let Some(idx) = self.index(x, y) {
            self.road_variants[idx] = variant;
        }
    }

    /// Every in-bounds cell position in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellPos> {
        let width = self.width as i32;
        let height = self.height as i32;
        (0..height).flat_map(move |y| (0..width).map(move |x| CellPos::new(x, y)))
    }

    pub fn count(&self, kind: TileKind) -> usize {
        self.kinds.iter().filter(|k| **k == kind).count()
    }

    /// Per-kind cell counts keyed by kind, omitting kinds that do not occur.
    pub fn tile_counts(&self) -> BTreeMap<TileKind, usize> {
        let mut counts = BTreeMap::new();
        for kind in &self.kinds {
            *counts.entry(*kind).or_insert(0) += 1;
        }
        counts
    }

    /// 4-neighborhood bitmask of neighbors holding `kind`.
    pub fn neighbor_mask(&self, x: i32, y: i32, kind: TileKind) -> u8 {
        let pos = CellPos::new(x, y);
        [(NORTH, 0, -1), (EAST, 1, 0), (SOUTH, 0, 1), (WEST, -1, 0)]
            .into_iter()
            .filter(|(_, dx, dy)| self.get_at(pos.offset(*dx, *dy)) == kind)
            .fold(0, |mask, (bit, _, _)| mask | bit)
    }

    /// Neighboring in-bounds cells (4-connectivity).
    pub fn neighbors(&self, pos: CellPos) -> Vec<CellPos> {
        [(0, -1), (1, 0), (0, 1), (-1, 0)]
            .into_iter()
            .map(|(dx, dy)| pos.offset(dx, dy))
            .filter(|p| self.in_bounds(p.x, p.y))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_defaults() {
        let grid = Grid::new(10, 5);

        assert_eq!(grid.width(), 10);
        assert_eq!(grid.height(), 5);
        assert_eq!(grid.tile_count(), 50);
        assert!(grid.cells().all(|p| grid.get_at(p) == TileKind::Nature));
        assert_eq!(grid.count(TileKind::Nature), 50);
    }

    #[test]
    fn test_out_of_bounds_access_is_absorbed() {
        let mut grid = Grid::new(4, 4);
        let probes = [
            (-1, 0),
            (0, -1),
            (4, 0),
            (0, 4),
            (i32::MIN, i32::MIN),
            (i32::MAX, i32::MAX),
            (i32::MAX, 0),
        ];
        for (x, y) in probes {
            grid.set(x, y, TileKind::Road);
            grid.set_city_variant(x, y, 7);
            grid.set_road_variant(x, y, RoadVariant::EastSide);
            assert_eq!(grid.get(x, y), TileKind::Nature);
            assert_eq!(grid.city_variant(x, y), CITY_INTERIOR);
            assert_eq!(grid.road_variant(x, y), RoadVariant::Base);
        }
        assert_eq!(grid.count(TileKind::Nature), 16);
    }

    #[test]
    fn test_set_touches_only_target_cell() {
        let mut grid = Grid::new(3, 3);
        grid.set(1, 2, TileKind::City);

        for pos in grid.cells() {
            let expected = if pos == CellPos::new(1, 2) {
                TileKind::City
            } else {
                TileKind::Nature
            };
            assert_eq!(grid.get_at(pos), expected);
        }
    }

    #[test]
    fn test_neighbor_mask() {
        let mut grid = Grid::new(3, 3);
        grid.set(1, 0, TileKind::Road);
        grid.set(2, 1, TileKind::Road);

        assert_eq!(grid.neighbor_mask(1, 1, TileKind::Road), NORTH | EAST);
        // Edges see out-of-bounds neighbors as nature.
        assert_eq!(
            grid.neighbor_mask(0, 0, TileKind::Nature),
            NORTH | SOUTH | WEST
        );
    }

    #[test]
    fn test_neighbors() {
        let grid = Grid::new(10, 5);

        assert_eq!(grid.neighbors(CellPos::new(0, 0)).len(), 2);
        assert_eq!(grid.neighbors(CellPos::new(5, 2)).len(), 4);
    }
}
