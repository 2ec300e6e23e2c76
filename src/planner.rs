//! Panel Planner — expands a DNA and site context into ordered panel jobs
//!
//! Each sheet type owns a catalog of required panels. Floor plans are
//! expanded from the DNA floor count; everything else is unconditional.
//! Jobs come out in reading order with their derived seeds attached.

use crate::dna::{normalize, DesignDna, DnaError, DnaFingerprint, NormalizedDna};
use crate::panel::{DetailKind, FloorLevel, PanelType, SheetType};
use crate::seed::{derive_seed, derive_sheet_seed};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Read-only site information supplied by the site collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteContext {
    /// Site boundary polygon in local metres
    #[serde(default)]
    pub boundary: Vec<[f64; 2]>,
    /// Climate classification (e.g. Köppen "Cfb")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub climate: Option<String>,
    /// Rotation of the building's front facade from true north, degrees
    #[serde(default)]
    pub orientation_deg: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl SiteContext {
    /// Boundary area by the shoelace formula
    pub fn boundary_area_m2(&self) -> f64 {
        let n = self.boundary.len();
        if n < 3 {
            return 0.0;
        }
        let twice: f64 = (0..n)
            .map(|i| {
                let [x1, y1] = self.boundary[i];
                let [x2, y2] = self.boundary[(i + 1) % n];
                x1 * y2 - x2 * y1
            })
            .sum();
        twice.abs() / 2.0
    }
}

/// Named feature switch on a modify request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickToggle {
    AddSections,
    AddDetails,
    AddInterior,
    AddSiteContext,
    AddMaterialPalette,
}

impl QuickToggle {
    /// Panels the sheet must contain once this toggle is on
    pub fn panels(&self) -> Vec<PanelType> {
        match self {
            QuickToggle::AddSections => PanelType::SECTIONS.to_vec(),
            QuickToggle::AddDetails => vec![PanelType::Detail(DetailKind::Construction)],
            QuickToggle::AddInterior => vec![PanelType::Interior3d],
            QuickToggle::AddSiteContext => vec![PanelType::SiteDiagram],
            QuickToggle::AddMaterialPalette => vec![PanelType::Detail(DetailKind::MaterialPalette)],
        }
    }

    pub fn phrase(&self) -> &'static str {
        match self {
            QuickToggle::AddSections => "add building sections A-A and B-B",
            QuickToggle::AddDetails => "add a construction detail",
            QuickToggle::AddInterior => "add an interior view",
            QuickToggle::AddSiteContext => "add the site context plan",
            QuickToggle::AddMaterialPalette => "add the material palette",
        }
    }
}

/// One entry of a sheet catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "panel", rename_all = "snake_case")]
pub enum CatalogEntry {
    /// A fixed panel, always planned
    Panel(PanelType),
    /// One floor plan per storey of the DNA
    FloorPlans,
}

/// Required panels per sheet type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PanelCatalog {
    sheets: BTreeMap<SheetType, Vec<CatalogEntry>>,
}

impl Default for PanelCatalog {
    fn default() -> Self {
        use CatalogEntry::{FloorPlans, Panel};
        let mut sheets = BTreeMap::new();

        let mut arch = vec![
            Panel(PanelType::Hero3d),
            Panel(PanelType::Interior3d),
            Panel(PanelType::SiteDiagram),
            FloorPlans,
        ];
        arch.extend(PanelType::ELEVATIONS.into_iter().map(Panel));
        arch.extend(PanelType::SECTIONS.into_iter().map(Panel));
        arch.push(Panel(PanelType::Detail(DetailKind::MaterialPalette)));
        arch.push(Panel(PanelType::Detail(DetailKind::ClimateCard)));
        sheets.insert(SheetType::Arch, arch);

        sheets.insert(
            SheetType::Concept,
            vec![
                Panel(PanelType::Hero3d),
                Panel(PanelType::Axonometric),
                Panel(PanelType::SiteDiagram),
                Panel(PanelType::FloorPlan(FloorLevel::Ground)),
                Panel(PanelType::ELEVATIONS[0]),
                Panel(PanelType::ELEVATIONS[1]),
                Panel(PanelType::Detail(DetailKind::MaterialPalette)),
            ],
        );

        let mut technical = vec![FloorPlans, Panel(PanelType::RoofPlan)];
        technical.extend(PanelType::ELEVATIONS.into_iter().map(Panel));
        technical.extend(PanelType::SECTIONS.into_iter().map(Panel));
        technical.push(Panel(PanelType::Detail(DetailKind::Construction)));
        sheets.insert(SheetType::Technical, technical);

        Self { sheets }
    }
}

impl PanelCatalog {
    pub fn empty() -> Self {
        Self { sheets: BTreeMap::new() }
    }

    pub fn with_sheet(mut self, sheet: SheetType, entries: Vec<CatalogEntry>) -> Self {
        self.sheets.insert(sheet, entries);
        self
    }

    pub fn entries(&self, sheet: SheetType) -> &[CatalogEntry] {
        self.sheets.get(&sheet).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Concrete panels for `floor_count` storeys, in reading order, no duplicates
    pub fn expand(&self, sheet: SheetType, floor_count: u32) -> Vec<PanelType> {
        let mut panels = BTreeSet::new();
        for entry in self.entries(sheet) {
            match entry {
                CatalogEntry::Panel(panel) => {
                    panels.insert(*panel);
                }
                CatalogEntry::FloorPlans => {
                    // a ground plan is always required, even for floor_count 0
                    for level in 0..floor_count.max(1) {
                        panels.insert(PanelType::FloorPlan(FloorLevel::from_index(level)));
                    }
                }
            }
        }
        panels.into_iter().collect()
    }
}

/// One unit of generation work. Immutable once planned.
#[derive(Debug, Clone)]
pub struct PanelJob {
    pub panel: PanelType,
    pub seed: u64,
    pub fingerprint: DnaFingerprint,
    pub dna: Arc<NormalizedDna>,
    pub site: Arc<SiteContext>,
}

/// The ordered jobs of one sheet request
#[derive(Debug, Clone)]
pub struct SheetPlan {
    pub sheet_type: SheetType,
    pub fingerprint: DnaFingerprint,
    pub sheet_seed: u64,
    pub dna: Arc<NormalizedDna>,
    pub site: Arc<SiteContext>,
    pub jobs: Vec<PanelJob>,
}

impl SheetPlan {
    pub fn panels(&self) -> Vec<PanelType> {
        self.jobs.iter().map(|j| j.panel).collect()
    }

    pub fn job(&self, panel: PanelType) -> Option<&PanelJob> {
        self.jobs.iter().find(|j| j.panel == panel)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Plans sheets against a panel catalog
#[derive(Debug, Clone, Default)]
pub struct Planner {
    catalog: PanelCatalog,
}

impl Planner {
    pub fn new(catalog: PanelCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &PanelCatalog {
        &self.catalog
    }

    pub fn plan(
        &self,
        dna: &DesignDna,
        site: &SiteContext,
        sheet: SheetType,
    ) -> Result<SheetPlan, PlanError> {
        self.plan_with_toggles(dna, site, sheet, &BTreeSet::new())
    }

    /// Plan, adding every panel the given quick toggles require
    pub fn plan_with_toggles(
        &self,
        dna: &DesignDna,
        site: &SiteContext,
        sheet: SheetType,
        toggles: &BTreeSet<QuickToggle>,
    ) -> Result<SheetPlan, PlanError> {
        dna.validate()?;
        if self.catalog.entries(sheet).is_empty() {
            return Err(PlanError::EmptyCatalog(sheet));
        }

        let normalized = Arc::new(normalize(dna));
        let fingerprint = normalized.fingerprint();
        let site = Arc::new(site.clone());

        let mut panels: BTreeSet<PanelType> = self
            .catalog
            .expand(sheet, normalized.floor_count())
            .into_iter()
            .collect();
        for toggle in toggles {
            panels.extend(toggle.panels());
        }

        let jobs: Vec<PanelJob> = panels
            .into_iter()
            .map(|panel| {
                let seed = derive_seed(&fingerprint, panel);
                debug!("Planned {} seed={}", panel, seed);
                PanelJob {
                    panel,
                    seed,
                    fingerprint,
                    dna: Arc::clone(&normalized),
                    site: Arc::clone(&site),
                }
            })
            .collect();

        info!(
            "Planned {} panels for {} sheet (dna {})",
            jobs.len(),
            sheet,
            fingerprint.short()
        );

        Ok(SheetPlan {
            sheet_type: sheet,
            fingerprint,
            sheet_seed: derive_sheet_seed(&fingerprint, sheet),
            dna: normalized,
            site,
            jobs,
        })
    }
}

/// Plan a sheet against the default catalog
pub fn plan_panels(
    dna: &DesignDna,
    site: &SiteContext,
    sheet: SheetType,
) -> Result<SheetPlan, PlanError> {
    Planner::default().plan(dna, site, sheet)
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("invalid design DNA: {0}")]
    InvalidDna(#[from] DnaError),

    #[error("no panel catalog configured for sheet type {0}")]
    EmptyCatalog(SheetType),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dna::Material;
    use crate::panel::{Orientation, SectionAxis};

    fn two_storey() -> DesignDna {
        DesignDna::new(15.0, 12.0, 7.0, 2)
            .with_material(Material::new("Brick"))
            .with_style("Contemporary")
    }

    #[test]
    fn test_arch_plan_contents() {
        let plan = plan_panels(&two_storey(), &SiteContext::default(), SheetType::Arch).unwrap();
        let panels = plan.panels();
        for required in [
            PanelType::Hero3d,
            PanelType::FloorPlan(FloorLevel::Ground),
            PanelType::FloorPlan(FloorLevel::Upper(1)),
            PanelType::Elevation(Orientation::North),
            PanelType::Elevation(Orientation::South),
            PanelType::Elevation(Orientation::East),
            PanelType::Elevation(Orientation::West),
            PanelType::Section(SectionAxis::Longitudinal),
            PanelType::Section(SectionAxis::Transverse),
        ] {
            assert!(panels.contains(&required), "missing {}", required);
        }
        assert!(!panels.contains(&PanelType::FloorPlan(FloorLevel::Upper(2))));
        let seeds: BTreeSet<u64> = plan.jobs.iter().map(|j| j.seed).collect();
        assert_eq!(seeds.len(), plan.len());
        assert!(plan.jobs.iter().all(|j| j.seed != 0));
    }

    #[test]
    fn test_order_is_reading_order() {
        let plan = plan_panels(&two_storey(), &SiteContext::default(), SheetType::Arch).unwrap();
        let panels = plan.panels();
        let mut sorted = panels.clone();
        sorted.sort();
        assert_eq!(panels, sorted);
        assert_eq!(panels[0], PanelType::Hero3d);
    }

    #[test]
    fn test_single_storey_keeps_ground_plan() {
        let dna = DesignDna::new(10.0, 8.0, 3.5, 1);
        let plan = plan_panels(&dna, &SiteContext::default(), SheetType::Technical).unwrap();
        let plans: Vec<PanelType> = plan
            .panels()
            .into_iter()
            .filter(|p| matches!(p, PanelType::FloorPlan(_)))
            .collect();
        assert_eq!(plans, vec![PanelType::FloorPlan(FloorLevel::Ground)]);
    }

    #[test]
    fn test_floor_plans_follow_floor_count() {
        let dna = DesignDna::new(20.0, 14.0, 13.0, 4);
        let plan = plan_panels(&dna, &SiteContext::default(), SheetType::Arch).unwrap();
        assert!(plan.job(PanelType::FloorPlan(FloorLevel::Upper(3))).is_some());
        assert!(plan.job(PanelType::FloorPlan(FloorLevel::Upper(4))).is_none());
    }

    #[test]
    fn test_invalid_dna_fails_fast() {
        let dna = DesignDna::new(10.0, 8.0, 3.5, 0);
        let err = plan_panels(&dna, &SiteContext::default(), SheetType::Arch).unwrap_err();
        assert!(matches!(err, PlanError::InvalidDna(DnaError::InvalidFloorCount(0))));

        let tower = DesignDna::new(10.0, 8.0, 3.5, 4_000_000_000);
        let err = plan_panels(&tower, &SiteContext::default(), SheetType::Arch).unwrap_err();
        assert!(matches!(err, PlanError::InvalidDna(DnaError::InvalidFloorCount(4_000_000_000))));
    }

    #[test]
    fn test_empty_catalog_is_an_error() {
        let planner = Planner::new(PanelCatalog::empty());
        let err = planner
            .plan(&two_storey(), &SiteContext::default(), SheetType::Arch)
            .unwrap_err();
        assert!(matches!(err, PlanError::EmptyCatalog(SheetType::Arch)));
    }

    #[test]
    fn test_toggles_add_panels() {
        let toggles: BTreeSet<QuickToggle> =
            [QuickToggle::AddSections, QuickToggle::AddDetails].into_iter().collect();
        let plan = Planner::default()
            .plan_with_toggles(&two_storey(), &SiteContext::default(), SheetType::Concept, &toggles)
            .unwrap();
        assert!(plan.job(PanelType::Section(SectionAxis::Transverse)).is_some());
        assert!(plan.job(PanelType::Detail(DetailKind::Construction)).is_some());
    }

    #[test]
    fn test_catalog_serde_roundtrip_shape() {
        let catalog = PanelCatalog::empty().with_sheet(
            SheetType::Concept,
            vec![CatalogEntry::Panel(PanelType::Hero3d), CatalogEntry::FloorPlans],
        );
        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"CONCEPT": [
                {"kind": "panel", "panel": "hero_3d"},
                {"kind": "floor_plans"}
            ]})
        );
        let back: PanelCatalog = serde_json::from_value(json).unwrap();
        assert_eq!(back, catalog);
    }

    #[test]
    fn test_site_area() {
        let site = SiteContext {
            boundary: vec![[0.0, 0.0], [20.0, 0.0], [20.0, 30.0], [0.0, 30.0]],
            ..SiteContext::default()
        };
        assert!((site.boundary_area_m2() - 600.0).abs() < 1e-9);
    }
}
