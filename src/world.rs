use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::{
    engine::GenerationStage,
    grid::{CellPos, Grid},
    phases::{roads::trace_road_paths, District},
    tile::{CityVariant, RoadVariant, TileKind},
};

/// Position in pixel units, as supplied by the game and stored in saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelPos {
    pub x: i32,
    pub y: i32,
}

impl PixelPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Building location seeding one city, in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelAnchor {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub district: District,
}

impl PixelAnchor {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            district: District::Standard,
        }
    }
}

/// Building location in cell coordinates, fixed for one generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub pos: CellPos,
    pub district: District,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Cities grown from caller-supplied anchors.
    Anchored,
    /// Anchors synthesized because none were supplied.
    Random,
}

impl GenerationMode {
    pub fn tag(self) -> &'static str {
        match self {
            GenerationMode::Anchored => "anchored",
            GenerationMode::Random => "random",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "anchored" => Some(GenerationMode::Anchored),
            "random" => Some(GenerationMode::Random),
            _ => None,
        }
    }
}

/// Variant tag for a cell, meaningful only for the kind it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderVariant {
    City(CityVariant),
    Road(RoadVariant),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellView {
    pub kind: TileKind,
    pub variant: RenderVariant,
}

/// Axis-aligned rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoneRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ZoneRect {
    pub fn center(&self) -> PixelPos {
        PixelPos::new(
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }

    pub fn contains(&self, point: PixelPos) -> bool {
        let x = i64::from(point.x) - i64::from(self.x);
        let y = i64::from(point.y) - i64::from(self.y);
        (0..i64::from(self.width)).contains(&x) && (0..i64::from(self.height)).contains(&y)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorldStats {
    pub total_tiles: usize,
    pub city_tiles: usize,
    pub road_tiles: usize,
    pub nature_tiles: usize,
    pub city_percentage: f64,
    pub road_percentage: f64,
    pub nature_percentage: f64,
    pub num_anchors: usize,
    pub num_paths: usize,
}

/// Everything one generation run produces. Owned by the [`crate::Engine`].
#[derive(Debug, Clone)]
pub struct World {
    pub(crate) grid: Grid,
    pub(crate) anchors: Vec<Anchor>,
    pub(crate) mode: GenerationMode,
    pub(crate) stage: GenerationStage,
    tile_size: u32,
}

impl World {
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        Self {
            grid: Grid::new(width, height),
            anchors: Vec::new(),
            mode: GenerationMode::Anchored,
            stage: GenerationStage::Idle,
            tile_size: tile_size.max(1),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    pub fn stage(&self) -> GenerationStage {
        self.stage
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn to_cell(&self, pixel: PixelPos) -> CellPos {
        let size = self.tile_size as i32;
        CellPos::new(pixel.x.div_euclid(size), pixel.y.div_euclid(size))
    }

    pub fn to_pixel(&self, cell: CellPos) -> PixelPos {
        let size = self.tile_size as i32;
        PixelPos::new(cell.x.saturating_mul(size), cell.y.saturating_mul(size))
    }

    pub fn cell_at(&self, x: i32, y: i32) -> CellView {
        let kind = self.grid.get(x, y);
        let variant = match kind {
            TileKind::City => RenderVariant::City(self.grid.city_variant(x, y)),
            TileKind::Road => RenderVariant::Road(self.grid.road_variant(x, y)),
            _ => RenderVariant::None,
        };
        CellView { kind, variant }
    }

    pub fn cell_at_pixel(&self, pixel: PixelPos) -> CellView {
        let cell = self.to_cell(pixel);
        self.cell_at(cell.x, cell.y)
    }

    /// One rectangle per anchor, centered on it: a `footprint_cells` square
    /// footprint grown by `padding` pixels on every side.
    pub fn interaction_zones(&self, padding: u32, footprint_cells: u32) -> Vec<ZoneRect> {
        let side = footprint_cells
            .saturating_mul(self.tile_size)
            .saturating_add(padding.saturating_mul(2));
        self.anchors
            .iter()
            .map(|anchor| {
                let center = self.to_pixel(anchor.pos);
                ZoneRect {
                    x: center.x.saturating_sub((side / 2) as i32),
                    y: center.y.saturating_sub((side / 2) as i32),
                    width: side,
                    height: side,
                }
            })
            .collect()
    }

    pub fn stats(&self) -> WorldStats {
        let total_tiles = self.grid.tile_count();
        let city_tiles = self.grid.count(TileKind::City);
        let road_tiles = self.grid.count(TileKind::Road);
        let nature_tiles = self.grid.count(TileKind::Nature);
        let pct = |count: usize| {
            if total_tiles == 0 {
                0.0
            } else {
                count as f64 / total_tiles as f64 * 100.0
            }
        };
        WorldStats {
            total_tiles,
            city_tiles,
            road_tiles,
            nature_tiles,
            city_percentage: pct(city_tiles),
            road_percentage: pct(road_tiles),
            nature_percentage: pct(nature_tiles),
            num_anchors: self.anchors.len(),
            num_paths: trace_road_paths(&self.grid).len(),
        }
    }

    /// One character per cell, rows separated by newlines.
    pub fn render_ascii(&self) -> String {
        let width = self.grid.width() as usize;
        let mut out = String::with_capacity((width + 1) * self.grid.height() as usize);
        for y in 0..self.grid.height() as i32 {
            for x in 0..self.grid.width() as i32 {
                let _ = out.write_char(self.grid.get(x, y).glyph());
            }
            out.push('\n');
        }
        out
    }
}
