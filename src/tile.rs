//! Tile kinds and the rendering-variant tags stored alongside them.

use serde::{Deserialize, Serialize};

/// Primary classification of a grid cell. The discriminants are the persisted
/// integer encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum TileKind {
    #[default]
    Nature = 0,
    City = 1,
    Road = 2,
    NatureFlower = 3,
    NatureFlowerRed = 4,
    NatureLog = 5,
    NatureBush = 6,
    NatureRock = 7,
    Building = 8,
}

impl TileKind {
    pub const ALL: [TileKind; 9] = [
        TileKind::Nature,
        TileKind::City,
        TileKind::Road,
        TileKind::NatureFlower,
        TileKind::NatureFlowerRed,
        TileKind::NatureLog,
        TileKind::NatureBush,
        TileKind::NatureRock,
        TileKind::Building,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Decode a persisted integer. Values outside the legend yield `None`.
    pub fn from_index(value: i64) -> Option<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    pub fn name(self) -> &'static str {
        match self {
            TileKind::Nature => "Nature",
            TileKind::City => "City",
            TileKind::Road => "Road",
            TileKind::NatureFlower => "NatureFlower",
            TileKind::NatureFlowerRed => "NatureFlowerRed",
            TileKind::NatureLog => "NatureLog",
            TileKind::NatureBush => "NatureBush",
            TileKind::NatureRock => "NatureRock",
            TileKind::Building => "Building",
        }
    }

    /// Plain nature or one of its decoration sub-kinds.
    pub fn is_nature(self) -> bool {
        matches!(
            self,
            TileKind::Nature
                | TileKind::NatureFlower
                | TileKind::NatureFlowerRed
                | TileKind::NatureLog
                | TileKind::NatureBush
                | TileKind::NatureRock
        )
    }

    /// Single character used by the ASCII preview.
    pub fn glyph(self) -> char {
        match self {
            TileKind::Nature => '.',
            TileKind::City => '#',
            TileKind::Road => '=',
            TileKind::NatureFlower => '*',
            TileKind::NatureFlowerRed => '%',
            TileKind::NatureLog => '~',
            TileKind::NatureBush => '&',
            TileKind::NatureRock => 'o',
            TileKind::Building => 'B',
        }
    }
}

/// City rendering variant index. Only the interior tile is assigned today;
/// indices up to [`CITY_VARIANT_MAX`] are reserved for edge and corner art.
pub type CityVariant = u8;

pub const CITY_INTERIOR: CityVariant = 0;
pub const CITY_VARIANT_MAX: CityVariant = 13;

/// Road rendering variant. Serialized as the sprite tag the renderer looks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoadVariant {
    #[default]
    #[serde(rename = "base-city-tile-path")]
    Base,
    #[serde(rename = "city-tile-path-west-side")]
    WestSide,
    #[serde(rename = "city-tile-path-east-side")]
    EastSide,
    #[serde(rename = "city-tile-path-south-side")]
    SouthSide,
    #[serde(rename = "city-tile-path-north-side")]
    NorthSide,
    #[serde(rename = "city-tile-path-north-west-corner")]
    NorthWestCorner,
    #[serde(rename = "city-tile-path-north-east-corner")]
    NorthEastCorner,
    #[serde(rename = "city-tile-path-south-west-corner")]
    SouthWestCorner,
    #[serde(rename = "city-tile-path-south-east-corner")]
    SouthEastCorner,
}

impl RoadVariant {
    pub const ALL: [RoadVariant; 9] = [
        RoadVariant::Base,
        RoadVariant::WestSide,
        RoadVariant::EastSide,
        RoadVariant::SouthSide,
        RoadVariant::NorthSide,
        RoadVariant::NorthWestCorner,
        RoadVariant::NorthEastCorner,
        RoadVariant::SouthWestCorner,
        RoadVariant::SouthEastCorner,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            RoadVariant::Base => "base-city-tile-path",
            RoadVariant::WestSide => "city-tile-path-west-side",
            RoadVariant::EastSide => "city-tile-path-east-side",
            RoadVariant::SouthSide => "city-tile-path-south-side",
            RoadVariant::NorthSide => "city-tile-path-north-side",
            RoadVariant::NorthWestCorner => "city-tile-path-north-west-corner",
            RoadVariant::NorthEastCorner => "city-tile-path-north-east-corner",
            RoadVariant::SouthWestCorner => "city-tile-path-south-west-corner",
            RoadVariant::SouthEastCorner => "city-tile-path-south-east-corner",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|variant| variant.tag() == tag)
    }
}
