//! Layout templates, keyed by (sheet type, layout key)

use crate::panel::{DetailKind, FloorLevel, PanelType, SheetType};
use crate::planner::PanelCatalog;

/// Row-based presentation template modelled on a RIBA-style A1 board
pub const UK_RIBA_STANDARD: &str = "uk-riba-standard";
/// Near-square grid over the sheet catalog
pub const GRID: &str = "grid";

/// Floor plans reserved by templates; taller buildings get warnings for the rest
pub const TEMPLATE_FLOOR_CAPACITY: u32 = 3;

/// One row of a row template: relative height and weighted cells
#[derive(Debug, Clone, PartialEq)]
pub struct RowSpec {
    pub weight: u32,
    pub cells: Vec<(PanelType, u32)>,
}

impl RowSpec {
    fn new(weight: u32, cells: Vec<(PanelType, u32)>) -> Self {
        Self { weight, cells }
    }

    fn even(weight: u32, panels: &[PanelType]) -> Self {
        Self::new(weight, panels.iter().map(|p| (*p, 1)).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    Rows(Vec<RowSpec>),
    Grid(Vec<PanelType>),
}

pub fn template_for(sheet: SheetType, key: &str, catalog: &PanelCatalog) -> Option<Template> {
    match key {
        UK_RIBA_STANDARD => Some(Template::Rows(riba_rows(sheet))),
        GRID => {
            let panels = catalog.expand(sheet, TEMPLATE_FLOOR_CAPACITY);
            if panels.is_empty() {
                None
            } else {
                Some(Template::Grid(panels))
            }
        }
        _ => None,
    }
}

fn riba_rows(sheet: SheetType) -> Vec<RowSpec> {
    let ground = PanelType::FloorPlan(FloorLevel::Ground);
    let first = PanelType::FloorPlan(FloorLevel::Upper(1));
    let second = PanelType::FloorPlan(FloorLevel::Upper(2));
    let [aa, bb] = PanelType::SECTIONS;

    match sheet {
        SheetType::Arch => vec![
            RowSpec::new(
                30,
                vec![
                    (PanelType::SiteDiagram, 1),
                    (PanelType::Hero3d, 2),
                    (PanelType::Interior3d, 1),
                ],
            ),
            RowSpec::even(26, &[ground, first, second]),
            RowSpec::even(22, &PanelType::ELEVATIONS),
            RowSpec::new(
                22,
                vec![
                    (aa, 3),
                    (bb, 3),
                    (PanelType::Detail(DetailKind::MaterialPalette), 2),
                    (PanelType::Detail(DetailKind::ClimateCard), 2),
                ],
            ),
        ],
        SheetType::Concept => vec![
            RowSpec::new(55, vec![(PanelType::Hero3d, 2), (PanelType::Axonometric, 1)]),
            RowSpec::even(
                45,
                &[
                    PanelType::SiteDiagram,
                    ground,
                    PanelType::ELEVATIONS[0],
                    PanelType::ELEVATIONS[1],
                    PanelType::Detail(DetailKind::MaterialPalette),
                ],
            ),
        ],
        SheetType::Technical => vec![
            RowSpec::even(34, &[ground, first, second, PanelType::RoofPlan]),
            RowSpec::even(30, &PanelType::ELEVATIONS),
            RowSpec::new(
                36,
                vec![(aa, 2), (bb, 2), (PanelType::Detail(DetailKind::Construction), 1)],
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_riba_rows_have_unique_panels() {
        for sheet in SheetType::ALL {
            let rows = riba_rows(sheet);
            let all: Vec<PanelType> =
                rows.iter().flat_map(|r| r.cells.iter().map(|c| c.0)).collect();
            let unique: BTreeSet<PanelType> = all.iter().copied().collect();
            assert_eq!(all.len(), unique.len(), "{}", sheet);
        }
    }

    #[test]
    fn test_riba_covers_default_catalog() {
        let catalog = PanelCatalog::default();
        for sheet in SheetType::ALL {
            let slots: BTreeSet<PanelType> = riba_rows(sheet)
                .iter()
                .flat_map(|r| r.cells.iter().map(|c| c.0))
                .collect();
            for panel in catalog.expand(sheet, TEMPLATE_FLOOR_CAPACITY) {
                assert!(slots.contains(&panel), "{} missing {}", sheet, panel);
            }
        }
    }

    #[test]
    fn test_unknown_key() {
        assert!(template_for(SheetType::Arch, "a0-portrait", &PanelCatalog::default()).is_none());
        assert!(template_for(SheetType::Arch, GRID, &PanelCatalog::empty()).is_none());
    }
}
