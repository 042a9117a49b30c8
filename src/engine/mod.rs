use std::{
    any::Any,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use anyhow::Result;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    grid::{CellPos, Grid},
    rng::{PhaseRng, RngManager},
    save::{SaveDocument, SaveError, SaveStore, SaveSummary},
    world::{Anchor, GenerationMode, PixelAnchor, PixelPos, World},
};

/// Progress of one generation run. Each phase moves the world forward by
/// exactly one stage; `Ready` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GenerationStage {
    Idle,
    CitiesPlaced,
    RoadsPlaced,
    AutoTiled,
    Decorated,
    Ready,
}

pub struct PhaseContext<'a> {
    pub anchors: &'a [Anchor],
    pub seed: u64,
}

pub trait Phase {
    fn name(&self) -> &str;
    /// Stage the world is in once this phase has run.
    fn completes(&self) -> GenerationStage;
    fn run(&mut self, ctx: &PhaseContext, grid: &mut Grid, rng: &mut PhaseRng<'_>) -> Result<()>;
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("phase '{phase}' cannot run at stage {stage:?}")]
    OutOfOrder {
        phase: String,
        stage: GenerationStage,
    },
    #[error("phase '{phase}' failed")]
    Phase {
        phase: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("generation cancelled at stage {0:?}")]
    Cancelled(GenerationStage),
}

/// Cooperative cancellation flag, checked between phases.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct FallbackSettings {
    pub anchor_count: usize,
    /// Minimum distance in cells between a synthetic anchor and the map edge.
    pub margin: u32,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            anchor_count: 5,
            margin: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub world_name: String,
    pub seed: u64,
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub fallback: FallbackSettings,
    pub saves_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct PhaseReport {
    pub name: String,
    pub stage: GenerationStage,
    pub duration_ms: f64,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    phases: Vec<Box<dyn Phase>>,
    cancel: Option<CancelToken>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            phases: Vec::new(),
            cancel: None,
        }
    }

    pub fn with_phase(mut self, phase: impl Phase + 'static) -> Self {
        self.phases.push(Box::new(phase));
        self
    }

    pub fn push_phase(&mut self, phase: impl Phase + 'static) {
        self.phases.push(Box::new(phase));
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            world: World::new(
                self.settings.width,
                self.settings.height,
                self.settings.tile_size,
            ),
            saves: SaveStore::new(&self.settings.saves_dir),
            phases: self.phases,
            cancel: self.cancel,
            reports: Vec::new(),
            settings: self.settings,
        }
    }
}

/// Owns the world and runs the generation pipeline over it.
pub struct Engine {
    world: World,
    saves: SaveStore,
    phases: Vec<Box<dyn Phase>>,
    cancel: Option<CancelToken>,
    reports: Vec<PhaseReport>,
    settings: EngineSettings,
}

impl Engine {
    /// Runs every phase over a fresh grid. Empty `anchors` switch to
    /// randomized generation with synthetic anchors.
    pub fn generate(&mut self, anchors: &[PixelAnchor]) -> Result<&World, GenerationError> {
        let mut world = World::new(
            self.settings.width,
            self.settings.height,
            self.settings.tile_size,
        );
        let mut rng = RngManager::new(self.settings.seed);

        if anchors.is_empty() {
            world.anchors = fallback_anchors(
                &mut rng.stream("fallback"),
                world.grid().width(),
                world.grid().height(),
                &self.settings.fallback,
            );
            world.mode = GenerationMode::Random;
            warn!(
                world = %self.settings.world_name,
                synthetic = world.anchors.len(),
                "no anchors supplied, using randomized fallback"
            );
        } else {
            world.anchors = anchors
                .iter()
                .map(|a| Anchor {
                    pos: world.to_cell(PixelPos::new(a.x, a.y)),
                    district: a.district,
                })
                .collect();
            world.mode = GenerationMode::Anchored;
        }

        info!(
            world = %self.settings.world_name,
            seed = self.settings.seed,
            width = world.grid().width(),
            height = world.grid().height(),
            anchors = world.anchors.len(),
            mode = world.mode.tag(),
            "generation started"
        );

        self.reports.clear();
        for phase in &mut self.phases {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                self.world = world;
                return Err(GenerationError::Cancelled(self.world.stage));
            }
            if phase.completes() <= world.stage {
                return Err(GenerationError::OutOfOrder {
                    phase: phase.name().to_string(),
                    stage: world.stage,
                });
            }

            let start = Instant::now();
            let ctx = PhaseContext {
                anchors: &world.anchors,
                seed: self.settings.seed,
            };
            let mut stream = rng.stream(phase.name());
            phase
                .run(&ctx, &mut world.grid, &mut stream)
                .map_err(|source| GenerationError::Phase {
                    phase: phase.name().to_string(),
                    source,
                })?;
            world.stage = phase.completes();

            let duration_ms = start.elapsed().as_secs_f64() * 1_000.0;
            debug!(phase = phase.name(), stage = ?world.stage, duration_ms, "phase finished");
            self.reports.push(PhaseReport {
                name: phase.name().to_string(),
                stage: world.stage,
                duration_ms,
            });
        }
        world.stage = GenerationStage::Ready;
        self.world = world;

        let stats = self.world.stats();
        info!(
            city = stats.city_tiles,
            road = stats.road_tiles,
            nature = stats.nature_tiles,
            paths = stats.num_paths,
            "generation finished"
        );
        Ok(&self.world)
    }

    /// Writes the current world to the next free save slot.
    pub fn save(&self) -> Result<PathBuf, SaveError> {
        let map_number = self.saves.next_map_number()?;
        let document = SaveDocument::capture(&self.world, map_number);
        let path = self.saves.write(&document)?;
        info!(map_number, path = %path.display(), "world saved");
        Ok(path)
    }

    /// Replaces the world with a saved one. On error the current world is
    /// left untouched.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<&World, SaveError> {
        let document = self.saves.read(path.as_ref())?;
        self.restore(document)
    }

    pub fn load_by_number(&mut self, map_number: u32) -> Result<&World, SaveError> {
        let document = self.saves.read_by_number(map_number)?;
        self.restore(document)
    }

    fn restore(&mut self, document: SaveDocument) -> Result<&World, SaveError> {
        let world = document.into_world(
            self.settings.width,
            self.settings.height,
            self.settings.tile_size,
        )?;
        info!(
            width = world.grid().width(),
            height = world.grid().height(),
            anchors = world.anchors().len(),
            mode = world.mode().tag(),
            "world loaded"
        );
        self.world = world;
        self.reports.clear();
        Ok(&self.world)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn stage(&self) -> GenerationStage {
        self.world.stage()
    }

    pub fn saves(&self) -> &SaveStore {
        &self.saves
    }

    pub fn list_saves(&self) -> Result<Vec<SaveSummary>, SaveError> {
        self.saves.list()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Timings of the most recent generation run.
    pub fn reports(&self) -> &[PhaseReport] {
        &self.reports
    }

    pub fn get_phase<T: 'static>(&self) -> Option<&T> {
        self.phases
            .iter()
            .find_map(|phase| phase.as_any().downcast_ref::<T>())
    }
}

/// Synthetic anchors placed uniformly inside the map, `margin` cells away from
/// the edges where the map is large enough.
pub fn fallback_anchors<R: Rng>(
    rng: &mut R,
    width: u32,
    height: u32,
    settings: &FallbackSettings,
) -> Vec<Anchor> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let axis = |len: u32| {
        let margin = settings.margin.min((len - 1) / 2);
        (margin as i32, (len - 1 - margin) as i32)
    };
    let (x_min, x_max) = axis(width);
    let (y_min, y_max) = axis(height);
    (0..settings.anchor_count)
        .map(|_| Anchor {
            pos: CellPos::new(rng.gen_range(x_min..=x_max), rng.gen_range(y_min..=y_max)),
            district: Default::default(),
        })
        .collect()
}
