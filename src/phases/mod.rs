pub mod autotile;
pub mod city;
pub mod decoration;
pub mod roads;

pub use autotile::AutoTilePhase;
pub use city::{CityPhase, District};
pub use decoration::{DecorationConfig, DecorationPhase};
pub use roads::{RoadEdge, RoadPhase};
