//! Per-panel prompt builders
//!
//! Each builder owns one panel family's visual conventions and nothing
//! else. Builders are stateless unit-like values.

use crate::dna::NormalizedDna;
use crate::panel::{DetailKind, FloorLevel, Orientation, PanelType, SectionAxis};
use crate::planner::SiteContext;

const COMMON_NEGATIVES: &[&str] = &["watermark", "illegible text", "blurry", "low resolution"];

const DRAWING_NEGATIVES: &[&str] = &[
    "perspective",
    "vanishing points",
    "3D render",
    "isometric",
    "photographic shading",
    "people",
];

/// Visual conventions of one panel family
pub trait PanelPromptBuilder {
    /// Camera / projection framing
    fn framing(&self) -> String;

    /// What the panel depicts
    fn subject(&self, dna: &NormalizedDna, site: &SiteContext) -> String;

    /// Panel-specific negatives, appended after the common ones
    fn negatives(&self) -> &'static [&'static str];

    fn all_negatives(&self) -> Vec<&'static str> {
        let mut all = COMMON_NEGATIVES.to_vec();
        all.extend_from_slice(self.negatives());
        all
    }
}

/// Builder responsible for `panel`
pub fn builder_for(panel: PanelType) -> Box<dyn PanelPromptBuilder> {
    match panel {
        PanelType::Hero3d => Box::new(HeroBuilder),
        PanelType::Axonometric => Box::new(AxonometricBuilder),
        PanelType::Interior3d => Box::new(InteriorBuilder),
        PanelType::SiteDiagram => Box::new(SiteBuilder),
        PanelType::FloorPlan(level) => Box::new(FloorPlanBuilder { level }),
        PanelType::RoofPlan => Box::new(RoofPlanBuilder),
        PanelType::Elevation(orientation) => Box::new(ElevationBuilder { orientation }),
        PanelType::Section(axis) => Box::new(SectionBuilder { axis }),
        PanelType::Detail(kind) => Box::new(DetailBuilder { kind }),
    }
}

fn m(value: f64) -> String {
    format!("{:.2}m", value)
}

fn primary_material(dna: &NormalizedDna) -> String {
    dna.materials()
        .first()
        .map(|mat| mat.name.clone())
        .unwrap_or_else(|| "neutral render".to_string())
}

struct HeroBuilder;

impl PanelPromptBuilder for HeroBuilder {
    fn framing(&self) -> String {
        "Photorealistic exterior 3D hero perspective, eye-level two-point view from the front-left \
         corner, soft daylight"
            .to_string()
    }

    fn subject(&self, dna: &NormalizedDna, _site: &SiteContext) -> String {
        format!(
            "{}-storey {} building clad in {}",
            dna.floor_count(),
            dna.style().unwrap_or("contemporary"),
            primary_material(dna)
        )
    }

    fn negatives(&self) -> &'static [&'static str] {
        &["cartoon", "distorted proportions", "extra floors", "fisheye"]
    }
}

struct AxonometricBuilder;

impl PanelPromptBuilder for AxonometricBuilder {
    fn framing(&self) -> String {
        "Axonometric projection at 30 degrees, parallel lines, no perspective convergence, \
         white background"
            .to_string()
    }

    fn subject(&self, dna: &NormalizedDna, _site: &SiteContext) -> String {
        format!("massing of the whole building, {} storeys, roof visible", dna.floor_count())
    }

    fn negatives(&self) -> &'static [&'static str] {
        &["vanishing points", "fisheye", "photographic background"]
    }
}

struct InteriorBuilder;

impl PanelPromptBuilder for InteriorBuilder {
    fn framing(&self) -> String {
        "Interior 3D perspective at standing eye height, natural light from the main glazing"
            .to_string()
    }

    fn subject(&self, dna: &NormalizedDna, _site: &SiteContext) -> String {
        format!(
            "main living space of a {} {}, ceiling height about {}",
            dna.style().unwrap_or("contemporary"),
            dna.project_type().unwrap_or("building"),
            m(dna.dimensions().storey_height_m())
        )
    }

    fn negatives(&self) -> &'static [&'static str] {
        &["exterior view", "distorted furniture", "fisheye"]
    }
}

struct SiteBuilder;

impl PanelPromptBuilder for SiteBuilder {
    fn framing(&self) -> String {
        "Orthographic top-down site plan, north arrow up, scale bar, architectural line drawing"
            .to_string()
    }

    fn subject(&self, dna: &NormalizedDna, site: &SiteContext) -> String {
        let d = dna.dimensions();
        let mut subject = format!(
            "building footprint {} x {} rotated {:.0} degrees from north",
            m(d.length_m()),
            m(d.width_m()),
            site.orientation_deg
        );
        if site.boundary.len() >= 3 {
            subject.push_str(&format!(
                " within a site boundary of {:.0} square metres",
                site.boundary_area_m2()
            ));
        }
        subject
    }

    fn negatives(&self) -> &'static [&'static str] {
        DRAWING_NEGATIVES
    }
}

struct FloorPlanBuilder {
    level: FloorLevel,
}

impl PanelPromptBuilder for FloorPlanBuilder {
    fn framing(&self) -> String {
        "Strict orthographic top-down architectural floor plan, black linework on white, \
         wall poché, door swings, dimension strings"
            .to_string()
    }

    fn subject(&self, dna: &NormalizedDna, _site: &SiteContext) -> String {
        let d = dna.dimensions();
        let mut subject = format!(
            "{} plan, overall {} x {}",
            self.level.label(),
            m(d.length_m()),
            m(d.width_m())
        );
        if self.level == FloorLevel::Ground {
            subject.push_str(", main entrance and external steps shown");
        } else {
            subject.push_str(", stair aligned with the floor below");
        }
        subject
    }

    fn negatives(&self) -> &'static [&'static str] {
        DRAWING_NEGATIVES
    }
}

struct RoofPlanBuilder;

impl PanelPromptBuilder for RoofPlanBuilder {
    fn framing(&self) -> String {
        "Strict orthographic top-down roof plan, line drawing with fall arrows".to_string()
    }

    fn subject(&self, dna: &NormalizedDna, _site: &SiteContext) -> String {
        let d = dna.dimensions();
        format!("roof over a {} x {} footprint", m(d.length_m()), m(d.width_m()))
    }

    fn negatives(&self) -> &'static [&'static str] {
        DRAWING_NEGATIVES
    }
}

struct ElevationBuilder {
    orientation: Orientation,
}

impl PanelPromptBuilder for ElevationBuilder {
    fn framing(&self) -> String {
        "Flat 2D orthographic elevation, facade parallel to the picture plane, ground line, \
         level markers"
            .to_string()
    }

    fn subject(&self, dna: &NormalizedDna, _site: &SiteContext) -> String {
        let d = dna.dimensions();
        let facade_width = match self.orientation {
            Orientation::North | Orientation::South => d.length_m(),
            Orientation::East | Orientation::West => d.width_m(),
        };
        format!(
            "{} facade, {} wide and {} tall, {} floor levels, finished in {}",
            self.orientation.name(),
            m(facade_width),
            m(d.height_m()),
            d.floor_count,
            primary_material(dna)
        )
    }

    fn negatives(&self) -> &'static [&'static str] {
        DRAWING_NEGATIVES
    }
}

struct SectionBuilder {
    axis: SectionAxis,
}

impl PanelPromptBuilder for SectionBuilder {
    fn framing(&self) -> String {
        "Flat 2D orthographic building section, cut elements in solid poché, level datums"
            .to_string()
    }

    fn subject(&self, dna: &NormalizedDna, _site: &SiteContext) -> String {
        let d = dna.dimensions();
        let span = match self.axis {
            SectionAxis::Longitudinal => d.length_m(),
            SectionAxis::Transverse => d.width_m(),
        };
        format!(
            "section {} through {}, {} floors of {} each",
            self.axis.mark(),
            m(span),
            d.floor_count,
            m(d.storey_height_m())
        )
    }

    fn negatives(&self) -> &'static [&'static str] {
        DRAWING_NEGATIVES
    }
}

struct DetailBuilder {
    kind: DetailKind,
}

impl PanelPromptBuilder for DetailBuilder {
    fn framing(&self) -> String {
        match self.kind {
            DetailKind::Construction => {
                "Technical construction detail at 1:20, hatched layers, annotated".to_string()
            }
            DetailKind::MaterialPalette => {
                "Flat material swatch board, evenly lit square samples".to_string()
            }
            DetailKind::ClimateCard => {
                "Clean infographic card, sun path and prevailing wind diagram".to_string()
            }
        }
    }

    fn subject(&self, dna: &NormalizedDna, site: &SiteContext) -> String {
        match self.kind {
            DetailKind::Construction => {
                format!("external wall build-up in {}", primary_material(dna))
            }
            DetailKind::MaterialPalette => {
                let swatches: Vec<String> = dna
                    .materials()
                    .iter()
                    .map(|mat| match &mat.color {
                        Some(c) => format!("{} {}", mat.name, c),
                        None => mat.name.clone(),
                    })
                    .collect();
                if swatches.is_empty() {
                    "neutral palette".to_string()
                } else {
                    format!("swatches: {}", swatches.join(", "))
                }
            }
            DetailKind::ClimateCard => format!(
                "climate {} at {}",
                site.climate.as_deref().unwrap_or("temperate"),
                site.location.as_deref().unwrap_or("the site")
            ),
        }
    }

    fn negatives(&self) -> &'static [&'static str] {
        &["photographic scene", "people"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dna::{normalize, DesignDna, Material};

    #[test]
    fn test_plan_framing_is_orthographic() {
        let b = builder_for(PanelType::FloorPlan(FloorLevel::Ground));
        assert!(b.framing().contains("orthographic top-down"));
        assert!(b.all_negatives().contains(&"perspective"));
    }

    #[test]
    fn test_elevation_uses_facade_width() {
        let dna =
            normalize(&DesignDna::new(15.0, 12.0, 7.0, 2).with_material(Material::new("Brick")));
        let site = SiteContext::default();
        let north = builder_for(PanelType::Elevation(Orientation::North)).subject(&dna, &site);
        let east = builder_for(PanelType::Elevation(Orientation::East)).subject(&dna, &site);
        assert!(north.contains("15.00m wide"));
        assert!(east.contains("12.00m wide"));
        assert!(builder_for(PanelType::Elevation(Orientation::East)).framing().contains("Flat 2D"));
    }

    #[test]
    fn test_palette_lists_materials() {
        let dna = normalize(
            &DesignDna::new(10.0, 8.0, 6.0, 1)
                .with_material(Material::with_color("Zinc", "#7A7F80"))
                .with_material(Material::new("Oak")),
        );
        let subject = builder_for(PanelType::Detail(DetailKind::MaterialPalette))
            .subject(&dna, &SiteContext::default());
        assert_eq!(subject, "swatches: Oak, Zinc #7a7f80");
    }
}
