//! JSON persistence for generated worlds, one numbered file per save.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    engine::GenerationStage,
    grid::CellPos,
    tile::{RoadVariant, TileKind, CITY_INTERIOR, CITY_VARIANT_MAX},
    world::{Anchor, GenerationMode, PixelAnchor, World},
};

const FILE_PREFIX: &str = "map_";
const FILE_EXTENSION: &str = "json";

/// Falls back to `T::default()` for `null` or a value of the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("i/o error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed save file {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("save file has no tilemap")]
    MissingTilemap,
    #[error("saved map is {found_width}x{found_height}, expected {width}x{height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        found_width: usize,
        found_height: usize,
    },
    #[error("no save numbered {0}")]
    NotFound(u32),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveMetadata {
    #[serde(default, deserialize_with = "lenient")]
    pub save_time: String,
    #[serde(default, deserialize_with = "lenient")]
    pub version: String,
    #[serde(default, deserialize_with = "lenient")]
    pub map_number: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub generation_mode: String,
    #[serde(default, deserialize_with = "lenient")]
    pub tile_counts: BTreeMap<String, usize>,
    #[serde(default, deserialize_with = "lenient")]
    pub total_tiles: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapInfo {
    #[serde(default, deserialize_with = "lenient")]
    pub width: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub height: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub tile_size: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub pixel_width: u64,
    #[serde(default, deserialize_with = "lenient")]
    pub pixel_height: u64,
}

/// On-disk form of a world. Everything except `tilemap` is optional when
/// reading, and a malformed optional section reads as its default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveDocument {
    #[serde(default, deserialize_with = "lenient")]
    pub metadata: SaveMetadata,
    #[serde(default, deserialize_with = "lenient")]
    pub map_info: MapInfo,
    #[serde(default, deserialize_with = "lenient")]
    pub building_positions: Vec<Value>,
    #[serde(default)]
    pub tilemap: Option<Vec<Vec<Value>>>,
    /// Row-major city variants, kept raw so bad rows or cells degrade alone.
    #[serde(default)]
    pub city_tile_data: Value,
    #[serde(default)]
    pub path_tile_data: Value,
    #[serde(default, deserialize_with = "lenient")]
    pub tile_legend: BTreeMap<String, String>,
}

impl SaveDocument {
    pub fn capture(world: &World, map_number: u32) -> Self {
        let grid = world.grid();
        let tile_size = world.tile_size();

        let mut tilemap = Vec::with_capacity(grid.height() as usize);
        let mut city_tile_data = Vec::with_capacity(grid.height() as usize);
        let mut path_tile_data = Vec::with_capacity(grid.height() as usize);
        for y in 0..grid.height() as i32 {
            let mut kinds = Vec::with_capacity(grid.width() as usize);
            let mut cities = Vec::with_capacity(grid.width() as usize);
            let mut paths = Vec::with_capacity(grid.width() as usize);
            for x in 0..grid.width() as i32 {
                let kind = grid.get(x, y);
                kinds.push(Value::from(kind.index()));
                cities.push(match kind {
                    TileKind::City => Value::from(grid.city_variant(x, y)),
                    _ => Value::Null,
                });
                paths.push(match kind {
                    TileKind::Road => Value::from(grid.road_variant(x, y).tag()),
                    _ => Value::Null,
                });
            }
            tilemap.push(kinds);
            city_tile_data.push(cities);
            path_tile_data.push(paths);
        }

        let building_positions = world
            .anchors()
            .iter()
            .map(|anchor| {
                let pixel = world.to_pixel(anchor.pos);
                let anchor = PixelAnchor {
                    x: pixel.x,
                    y: pixel.y,
                    district: anchor.district,
                };
                serde_json::to_value(anchor).unwrap_or(Value::Null)
            })
            .collect();

        let tile_counts = grid
            .tile_counts()
            .into_iter()
            .map(|(kind, count)| (kind.name().to_string(), count))
            .collect();

        Self {
            metadata: SaveMetadata {
                save_time: chrono::Local::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                map_number,
                generation_mode: world.mode().tag().to_string(),
                tile_counts,
                total_tiles: grid.tile_count(),
            },
            map_info: MapInfo {
                width: grid.width(),
                height: grid.height(),
                tile_size,
                pixel_width: u64::from(grid.width()) * u64::from(tile_size),
                pixel_height: u64::from(grid.height()) * u64::from(tile_size),
            },
            building_positions,
            tilemap: Some(tilemap),
            city_tile_data: Value::from(city_tile_data),
            path_tile_data: Value::from(path_tile_data),
            tile_legend: TileKind::ALL
                .iter()
                .map(|kind| (kind.index().to_string(), kind.name().to_string()))
                .collect(),
        }
    }

    /// Rebuilds a world of exactly `width` x `height` cells. Only the
    /// dimensions are strict; bad cell values fall back to nature, the
    /// interior city tile and the base road tile.
    pub(crate) fn into_world(
        self,
        width: u32,
        height: u32,
        tile_size: u32,
    ) -> Result<World, SaveError> {
        let tilemap = self.tilemap.ok_or(SaveError::MissingTilemap)?;
        let mismatch = |found_width: usize| SaveError::DimensionMismatch {
            width,
            height,
            found_width,
            found_height: tilemap.len(),
        };
        if tilemap.len() != height as usize {
            return Err(mismatch(tilemap.first().map_or(0, Vec::len)));
        }
        if let Some(row) = tilemap.iter().find(|row| row.len() != width as usize) {
            return Err(mismatch(row.len()));
        }

        let mut world = World::new(width, height, tile_size);
        let grid = &mut world.grid;
        for (y, row) in tilemap.iter().enumerate() {
            for (x, value) in row.iter().enumerate() {
                let (x, y) = (x as i32, y as i32);
                let kind = value
                    .as_i64()
                    .and_then(TileKind::from_index)
                    .unwrap_or(TileKind::Nature);
                grid.set(x, y, kind);
                match kind {
                    TileKind::City => {
                        let variant = cell(&self.city_tile_data, x, y)
                            .and_then(Value::as_u64)
                            .filter(|v| *v <= u64::from(CITY_VARIANT_MAX))
                            .map_or(CITY_INTERIOR, |v| v as u8);
                        grid.set_city_variant(x, y, variant);
                    }
                    TileKind::Road => {
                        let variant = cell(&self.path_tile_data, x, y)
                            .and_then(Value::as_str)
                            .and_then(RoadVariant::from_tag)
                            .unwrap_or_default();
                        grid.set_road_variant(x, y, variant);
                    }
                    _ => {}
                }
            }
        }

        // Anchor pixels are in the tile size they were saved with.
        let saved_tile = match self.map_info.tile_size {
            0 => tile_size.max(1),
            size => size,
        } as i32;
        let anchors: Vec<Anchor> = self
            .building_positions
            .into_iter()
            .filter_map(|value| serde_json::from_value::<PixelAnchor>(value).ok())
            .map(|anchor| Anchor {
                pos: CellPos::new(anchor.x.div_euclid(saved_tile), anchor.y.div_euclid(saved_tile)),
                district: anchor.district,
            })
            .collect();
        world.anchors = anchors;
        world.mode =
            GenerationMode::from_tag(&self.metadata.generation_mode).unwrap_or(GenerationMode::Anchored);
        world.stage = GenerationStage::Ready;
        Ok(world)
    }
}

fn cell(rows: &Value, x: i32, y: i32) -> Option<&Value> {
    rows.get(y as usize)?.get(x as usize)
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveSummary {
    pub map_number: u32,
    pub path: PathBuf,
    pub save_time: String,
    pub generation_mode: String,
    pub width: u32,
    pub height: u32,
}

/// Directory of `map_{n}.json` files.
#[derive(Debug, Clone)]
pub struct SaveStore {
    dir: PathBuf,
}

impl SaveStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, map_number: u32) -> PathBuf {
        self.dir
            .join(format!("{FILE_PREFIX}{map_number}.{FILE_EXTENSION}"))
    }

    /// One past the highest existing map number; 1 for an empty or missing
    /// directory.
    pub fn next_map_number(&self) -> Result<u32, SaveError> {
        Ok(self
            .numbered_files()?
            .into_iter()
            .map(|(n, _)| n)
            .max()
            .map_or(1, |n| n.saturating_add(1)))
    }

    pub fn write(&self, document: &SaveDocument) -> Result<PathBuf, SaveError> {
        fs::create_dir_all(&self.dir).map_err(|source| SaveError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(document.metadata.map_number);
        let json = serde_json::to_string_pretty(document).map_err(|source| SaveError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| SaveError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    pub fn read(&self, path: &Path) -> Result<SaveDocument, SaveError> {
        let data = fs::read_to_string(path).map_err(|source| SaveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| SaveError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read_by_number(&self, map_number: u32) -> Result<SaveDocument, SaveError> {
        let path = self.path_for(map_number);
        if !path.is_file() {
            return Err(SaveError::NotFound(map_number));
        }
        self.read(&path)
    }

    /// Summaries of every readable save, ordered by map number.
    pub fn list(&self) -> Result<Vec<SaveSummary>, SaveError> {
        let mut summaries = Vec::new();
        for (map_number, path) in self.numbered_files()? {
            match self.read(&path) {
                Ok(document) => summaries.push(SaveSummary {
                    map_number,
                    path,
                    save_time: document.metadata.save_time,
                    generation_mode: document.metadata.generation_mode,
                    width: document.map_info.width,
                    height: document.map_info.height,
                }),
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable save"),
            }
        }
        Ok(summaries)
    }

    fn numbered_files(&self) -> Result<Vec<(u32, PathBuf)>, SaveError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir).map_err(|source| SaveError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut files: Vec<(u32, PathBuf)> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter_map(|path| map_number_of(&path).map(|n| (n, path)))
            .collect();
        files.sort_by_key(|(n, _)| *n);
        debug!(dir = %self.dir.display(), count = files.len(), "scanned saves");
        Ok(files)
    }
}

fn map_number_of(path: &Path) -> Option<u32> {
    if path.extension()? != FILE_EXTENSION {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(FILE_PREFIX)?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::phases::District;

    fn sample_world() -> World {
        let mut world = World::new(4, 3, 16);
        world.grid.set(0, 0, TileKind::City);
        world.grid.set_city_variant(0, 0, 5);
        world.grid.set(1, 0, TileKind::Road);
        world.grid.set_road_variant(1, 0, RoadVariant::NorthWestCorner);
        world.grid.set(3, 2, TileKind::NatureRock);
        world.anchors.push(Anchor {
            pos: CellPos::new(2, 1),
            district: District::Commercial,
        });
        world.mode = GenerationMode::Random;
        world
    }

    #[test]
    fn capture_then_restore_keeps_every_layer() {
        let world = sample_world();
        let document = SaveDocument::capture(&world, 3);
        assert_eq!(document.metadata.map_number, 3);
        assert_eq!(document.metadata.total_tiles, 12);
        assert_eq!(document.metadata.generation_mode, "random");
        assert_eq!(document.map_info.pixel_width, 64);
        assert_eq!(document.tile_legend["8"], "Building");
        assert_eq!(
            document.building_positions[0],
            json!({"x": 32, "y": 16, "district": "commercial"})
        );

        let restored = document.into_world(4, 3, 16).unwrap();
        assert_eq!(restored.grid(), world.grid());
        assert_eq!(restored.anchors(), world.anchors());
        assert_eq!(restored.mode(), GenerationMode::Random);
        assert_eq!(restored.stage(), GenerationStage::Ready);
    }

    #[test]
    fn bad_cells_degrade() {
        let document: SaveDocument = serde_json::from_value(json!({
            "tilemap": [[99, "x", 1, 2], [-1, 1.5, 8, 0]],
            "city_tile_data": [[null, null, 42, null]],
            "path_tile_data": [[null, null, null, "no-such-tag"]],
        }))
        .unwrap();
        let world = document.into_world(4, 2, 32).unwrap();
        let grid = world.grid();

        assert_eq!(grid.get(0, 0), TileKind::Nature);
        assert_eq!(grid.get(1, 0), TileKind::Nature);
        assert_eq!(grid.get(0, 1), TileKind::Nature);
        assert_eq!(grid.get(1, 1), TileKind::Nature);
        assert_eq!(grid.get(2, 1), TileKind::Building);
        assert_eq!(grid.get(2, 0), TileKind::City);
        assert_eq!(grid.city_variant(2, 0), CITY_INTERIOR);
        assert_eq!(grid.get(3, 0), TileKind::Road);
        assert_eq!(grid.road_variant(3, 0), RoadVariant::Base);
        assert!(world.anchors().is_empty());
        assert_eq!(world.mode(), GenerationMode::Anchored);
    }

    #[test]
    fn malformed_optional_sections_read_as_defaults() {
        let document: SaveDocument = serde_json::from_value(json!({
            "metadata": {"generation_mode": null, "map_number": "seven", "save_time": 5},
            "map_info": "wide",
            "building_positions": null,
            "tilemap": [[1, 2]],
            "city_tile_data": "garbage",
            "path_tile_data": ["a", "b"],
            "tile_legend": {"0": 0},
        }))
        .unwrap();
        assert_eq!(document.metadata.map_number, 0);
        assert!(document.metadata.generation_mode.is_empty());
        assert!(document.tile_legend.is_empty());
        assert!(document.building_positions.is_empty());

        let world = document.into_world(2, 1, 32).unwrap();
        assert_eq!(world.grid().get(0, 0), TileKind::City);
        assert_eq!(world.grid().city_variant(0, 0), CITY_INTERIOR);
        assert_eq!(world.grid().get(1, 0), TileKind::Road);
        assert_eq!(world.grid().road_variant(1, 0), RoadVariant::Base);
        assert_eq!(world.mode(), GenerationMode::Anchored);

        let whole_metadata_bad: SaveDocument =
            serde_json::from_value(json!({"metadata": "bad", "tilemap": [[0]]})).unwrap();
        assert_eq!(whole_metadata_bad.metadata.total_tiles, 0);
    }

    #[test]
    fn anchors_use_the_saved_tile_size() {
        let world = sample_world();
        let document = SaveDocument::capture(&world, 1);

        let restored = document.clone().into_world(4, 3, 32).unwrap();
        assert_eq!(restored.anchors(), world.anchors());
        assert_eq!(restored.tile_size(), 32);

        // Without map_info the target tile size is assumed.
        let bare = SaveDocument {
            map_info: MapInfo::default(),
            ..document
        };
        let restored = bare.into_world(4, 3, 8).unwrap();
        assert_eq!(restored.anchors()[0].pos, CellPos::new(4, 2));
    }

    #[test]
    fn dimensions_must_match() {
        let ragged: SaveDocument =
            serde_json::from_value(json!({"tilemap": [[0, 0], [0]]})).unwrap();
        assert!(matches!(
            ragged.into_world(2, 2, 32),
            Err(SaveError::DimensionMismatch { found_width: 1, .. })
        ));

        let short: SaveDocument = serde_json::from_value(json!({"tilemap": [[0, 0]]})).unwrap();
        assert!(matches!(
            short.into_world(2, 2, 32),
            Err(SaveError::DimensionMismatch { found_height: 1, .. })
        ));

        let missing: SaveDocument = serde_json::from_value(json!({"metadata": {}})).unwrap();
        assert!(matches!(
            missing.into_world(2, 2, 32),
            Err(SaveError::MissingTilemap)
        ));
    }

    #[test]
    fn store_numbers_and_lists_saves() {
        let temp = tempfile::tempdir().unwrap();
        let store = SaveStore::new(temp.path().join("saves"));
        assert_eq!(store.next_map_number().unwrap(), 1);
        assert!(store.list().unwrap().is_empty());

        let world = sample_world();
        store.write(&SaveDocument::capture(&world, 1)).unwrap();
        store.write(&SaveDocument::capture(&world, 7)).unwrap();
        fs::write(store.dir().join("map_9.json"), "{ not json").unwrap();
        fs::write(store.dir().join("notes.txt"), "ignored").unwrap();

        assert_eq!(store.next_map_number().unwrap(), 10);
        let numbers: Vec<u32> = store.list().unwrap().iter().map(|s| s.map_number).collect();
        assert_eq!(numbers, vec![1, 7]);

        assert!(matches!(
            store.read_by_number(2),
            Err(SaveError::NotFound(2))
        ));
        assert!(matches!(
            store.read_by_number(9),
            Err(SaveError::Json { .. })
        ));
        assert_eq!(store.read_by_number(7).unwrap().metadata.map_number, 7);
    }
}
