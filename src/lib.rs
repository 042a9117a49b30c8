pub mod engine;
pub mod geometry;
pub mod grid;
pub mod logging;
pub mod phases;
pub mod rng;
pub mod save;
pub mod scenario;
pub mod tile;
pub mod world;

pub use engine::{CancelToken, Engine, EngineBuilder, EngineSettings, GenerationError, GenerationStage};
pub use grid::{CellPos, Grid};
pub use save::SaveError;
pub use scenario::{Scenario, ScenarioLoader};
pub use tile::{RoadVariant, TileKind};
pub use world::{PixelAnchor, PixelPos, World};
