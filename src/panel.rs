//! Panel taxonomy — the closed set of panels a sheet can contain
//!
//! Variant declaration order is the sheet reading order: overview views
//! first, then plans bottom level up, then elevations in compass order
//! (N, S, E, W), then sections, then details. `Ord` is derived from it, so
//! sorting a list of panels yields reading order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storey a floor plan depicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FloorLevel {
    Ground,
    /// Level above ground, starting at 1
    Upper(u32),
}

impl FloorLevel {
    pub fn from_index(index: u32) -> Self {
        if index == 0 {
            FloorLevel::Ground
        } else {
            FloorLevel::Upper(index)
        }
    }

    pub fn index(&self) -> u32 {
        match self {
            FloorLevel::Ground => 0,
            FloorLevel::Upper(n) => *n,
        }
    }

    pub fn label(&self) -> String {
        match self {
            FloorLevel::Ground => "ground floor".to_string(),
            FloorLevel::Upper(1) => "first floor".to_string(),
            FloorLevel::Upper(2) => "second floor".to_string(),
            FloorLevel::Upper(3) => "third floor".to_string(),
            FloorLevel::Upper(n) => format!("level {} floor", n),
        }
    }
}

/// Facade orientation of an elevation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Orientation {
    North,
    South,
    East,
    West,
}

impl Orientation {
    pub const ALL: [Orientation; 4] =
        [Orientation::North, Orientation::South, Orientation::East, Orientation::West];

    pub fn name(&self) -> &'static str {
        match self {
            Orientation::North => "north",
            Orientation::South => "south",
            Orientation::East => "east",
            Orientation::West => "west",
        }
    }

    /// Compass bearing of the facade normal
    pub fn azimuth_deg(&self) -> f64 {
        match self {
            Orientation::North => 0.0,
            Orientation::East => 90.0,
            Orientation::South => 180.0,
            Orientation::West => 270.0,
        }
    }
}

/// Cut direction of a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SectionAxis {
    /// A-A, along the building length
    Longitudinal,
    /// B-B, across the building width
    Transverse,
}

impl SectionAxis {
    pub const ALL: [SectionAxis; 2] = [SectionAxis::Longitudinal, SectionAxis::Transverse];

    pub fn mark(&self) -> &'static str {
        match self {
            SectionAxis::Longitudinal => "A-A",
            SectionAxis::Transverse => "B-B",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DetailKind {
    Construction,
    MaterialPalette,
    ClimateCard,
}

/// Broad grouping used by layout templates and prompt framing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PanelFamily {
    Overview,
    Plan,
    Elevation,
    Section,
    Detail,
}

/// One panel of a sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PanelType {
    Hero3d,
    Axonometric,
    Interior3d,
    SiteDiagram,
    FloorPlan(FloorLevel),
    RoofPlan,
    Elevation(Orientation),
    Section(SectionAxis),
    Detail(DetailKind),
}

impl PanelType {
    pub const ELEVATIONS: [PanelType; 4] = [
        PanelType::Elevation(Orientation::North),
        PanelType::Elevation(Orientation::South),
        PanelType::Elevation(Orientation::East),
        PanelType::Elevation(Orientation::West),
    ];

    pub const SECTIONS: [PanelType; 2] = [
        PanelType::Section(SectionAxis::Longitudinal),
        PanelType::Section(SectionAxis::Transverse),
    ];

    /// Stable identifier, used for seeds, serde and logs
    pub fn id(&self) -> String {
        match self {
            PanelType::Hero3d => "hero_3d".to_string(),
            PanelType::Axonometric => "axonometric".to_string(),
            PanelType::Interior3d => "interior_3d".to_string(),
            PanelType::SiteDiagram => "site_diagram".to_string(),
            PanelType::FloorPlan(FloorLevel::Ground) => "floor_plan_ground".to_string(),
            PanelType::FloorPlan(FloorLevel::Upper(1)) => "floor_plan_upper".to_string(),
            PanelType::FloorPlan(FloorLevel::Upper(n)) => format!("floor_plan_upper_{}", n),
            PanelType::RoofPlan => "roof_plan".to_string(),
            PanelType::Elevation(o) => format!("elevation_{}", o.name()),
            PanelType::Section(SectionAxis::Longitudinal) => "section_aa".to_string(),
            PanelType::Section(SectionAxis::Transverse) => "section_bb".to_string(),
            PanelType::Detail(DetailKind::Construction) => "detail_construction".to_string(),
            PanelType::Detail(DetailKind::MaterialPalette) => "material_palette".to_string(),
            PanelType::Detail(DetailKind::ClimateCard) => "climate_card".to_string(),
        }
    }

    /// Human-readable title for sheet annotations
    pub fn title(&self) -> String {
        match self {
            PanelType::Hero3d => "Hero Perspective".to_string(),
            PanelType::Axonometric => "Axonometric".to_string(),
            PanelType::Interior3d => "Interior View".to_string(),
            PanelType::SiteDiagram => "Site Plan".to_string(),
            PanelType::FloorPlan(level) => {
                let words: Vec<String> = level
                    .label()
                    .split(' ')
                    .map(|word| {
                        let mut chars = word.chars();
                        match chars.next() {
                            Some(first) => first.to_uppercase().chain(chars).collect(),
                            None => String::new(),
                        }
                    })
                    .collect();
                format!("{} Plan", words.join(" "))
            }
            PanelType::RoofPlan => "Roof Plan".to_string(),
            PanelType::Elevation(o) => match o {
                Orientation::North => "North Elevation".to_string(),
                Orientation::South => "South Elevation".to_string(),
                Orientation::East => "East Elevation".to_string(),
                Orientation::West => "West Elevation".to_string(),
            },
            PanelType::Section(axis) => format!("Section {}", axis.mark()),
            PanelType::Detail(DetailKind::Construction) => "Construction Detail".to_string(),
            PanelType::Detail(DetailKind::MaterialPalette) => "Material Palette".to_string(),
            PanelType::Detail(DetailKind::ClimateCard) => "Climate Card".to_string(),
        }
    }

    pub fn family(&self) -> PanelFamily {
        match self {
            PanelType::Hero3d
            | PanelType::Axonometric
            | PanelType::Interior3d
            | PanelType::SiteDiagram => PanelFamily::Overview,
            PanelType::FloorPlan(_) | PanelType::RoofPlan => PanelFamily::Plan,
            PanelType::Elevation(_) => PanelFamily::Elevation,
            PanelType::Section(_) => PanelFamily::Section,
            PanelType::Detail(_) => PanelFamily::Detail,
        }
    }

    /// Details may drift without compromising the design record
    pub fn is_critical(&self) -> bool {
        self.family() != PanelFamily::Detail
    }
}

impl fmt::Display for PanelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl FromStr for PanelType {
    type Err = PanelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let panel = match s {
            "hero_3d" => PanelType::Hero3d,
            "axonometric" => PanelType::Axonometric,
            "interior_3d" => PanelType::Interior3d,
            "site_diagram" => PanelType::SiteDiagram,
            "floor_plan_ground" => PanelType::FloorPlan(FloorLevel::Ground),
            "floor_plan_upper" => PanelType::FloorPlan(FloorLevel::Upper(1)),
            "roof_plan" => PanelType::RoofPlan,
            "elevation_north" => PanelType::Elevation(Orientation::North),
            "elevation_south" => PanelType::Elevation(Orientation::South),
            "elevation_east" => PanelType::Elevation(Orientation::East),
            "elevation_west" => PanelType::Elevation(Orientation::West),
            "section_aa" => PanelType::Section(SectionAxis::Longitudinal),
            "section_bb" => PanelType::Section(SectionAxis::Transverse),
            "detail_construction" => PanelType::Detail(DetailKind::Construction),
            "material_palette" => PanelType::Detail(DetailKind::MaterialPalette),
            "climate_card" => PanelType::Detail(DetailKind::ClimateCard),
            other => {
                let level = other
                    .strip_prefix("floor_plan_upper_")
                    .and_then(|n| n.parse::<u32>().ok())
                    .filter(|n| *n >= 2)
                    .ok_or_else(|| PanelParseError::UnknownPanel(other.to_string()))?;
                PanelType::FloorPlan(FloorLevel::Upper(level))
            }
        };
        Ok(panel)
    }
}

impl From<PanelType> for String {
    fn from(panel: PanelType) -> Self {
        panel.id()
    }
}

impl TryFrom<String> for PanelType {
    type Error = PanelParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Kind of sheet being composed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SheetType {
    /// Full architectural presentation sheet
    #[serde(rename = "ARCH")]
    Arch,
    /// Early concept board
    #[serde(rename = "CONCEPT")]
    Concept,
    /// Drawing-set style technical sheet
    #[serde(rename = "TECHNICAL")]
    Technical,
}

impl SheetType {
    pub const ALL: [SheetType; 3] = [SheetType::Arch, SheetType::Concept, SheetType::Technical];

    pub fn id(&self) -> &'static str {
        match self {
            SheetType::Arch => "ARCH",
            SheetType::Concept => "CONCEPT",
            SheetType::Technical => "TECHNICAL",
        }
    }
}

impl fmt::Display for SheetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for SheetType {
    type Err = PanelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ARCH" => Ok(SheetType::Arch),
            "CONCEPT" => Ok(SheetType::Concept),
            "TECHNICAL" => Ok(SheetType::Technical),
            _ => Err(PanelParseError::UnknownSheetType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PanelParseError {
    #[error("unknown panel type: {0}")]
    UnknownPanel(String),

    #[error("unknown sheet type: {0}")]
    UnknownSheetType(String),
}
