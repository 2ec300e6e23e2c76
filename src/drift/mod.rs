//! Drift Validator — classifies a candidate against its baseline
//!
//! Structural drift comes from the DNA comparison, visual drift from an
//! external similarity measure. Thresholds are an explicit value passed
//! in by the caller. The validator only classifies; it never repairs.

mod compare;
mod ssim;

pub use compare::{compare_dna, flatten, AttributeChange, DnaComparison};
pub use ssim::{ImageSimilarity, Luma, SimilarityMeasure, Ssim};

use crate::dna::NormalizedDna;
use crate::panel::PanelType;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Versioned tolerance set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriftThresholds {
    pub version: u32,
    /// Largest fraction of DNA attributes allowed to change
    pub dna_overall_tolerance: f64,
    /// Tighter DNA tolerance applied under strict lock
    pub strict_dna_tolerance: f64,
    /// Whole-sheet similarity floor
    pub ssim_whole: f64,
    /// Per-panel similarity floor
    pub ssim_panel: f64,
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self {
            version: 1,
            dna_overall_tolerance: 0.10,
            strict_dna_tolerance: 0.05,
            ssim_whole: 0.92,
            ssim_panel: 0.95,
        }
    }
}

impl DriftThresholds {
    /// First field outside [0, 1], if any
    pub fn out_of_range(&self) -> Option<(&'static str, f64)> {
        [
            ("dnaOverallTolerance", self.dna_overall_tolerance),
            ("strictDnaTolerance", self.strict_dna_tolerance),
            ("ssimWhole", self.ssim_whole),
            ("ssimPanel", self.ssim_panel),
        ]
        .into_iter()
        .find(|(_, v)| !(0.0..=1.0).contains(v))
    }

    pub fn dna_tolerance(&self, strict_lock: bool) -> f64 {
        if strict_lock {
            self.dna_overall_tolerance.min(self.strict_dna_tolerance)
        } else {
            self.dna_overall_tolerance
        }
    }

    pub fn whole_floor(&self, strict_lock: bool) -> f64 {
        if strict_lock {
            self.ssim_whole.max(self.ssim_panel)
        } else {
            self.ssim_whole
        }
    }
}

/// What to do when only non-critical panels miss the per-panel floor
/// outside strict lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NonCriticalPolicy {
    #[default]
    Flag,
    Tolerate,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftVerdict {
    Accepted,
    Flagged,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub verdict: DriftVerdict,
    pub reasons: Vec<String>,
    pub flagged_panels: Vec<PanelType>,
    pub tolerated_panels: Vec<PanelType>,
    /// Panels whose provider reported a different seed than requested
    #[serde(default)]
    pub seed_mismatches: Vec<PanelType>,
    pub changes: Vec<AttributeChange>,
    pub dna_drift: f64,
    pub strict_lock: bool,
    pub thresholds_version: u32,
}

impl DriftReport {
    pub fn is_accepted(&self) -> bool {
        self.verdict == DriftVerdict::Accepted
    }

    /// Record provider seed discrepancies. They are reported, never a verdict change.
    pub fn with_seed_mismatches(mut self, panels: Vec<PanelType>) -> Self {
        if !panels.is_empty() {
            let ids: Vec<String> = panels.iter().map(PanelType::id).collect();
            self.reasons.push(format!("provider seed differs from requested: {}", ids.join(", ")));
        }
        self.seed_mismatches = panels;
        self
    }
}

/// Non-finite scores never clear a floor
fn below_floor(score: f64, floor: f64) -> bool {
    !score.is_finite() || score < floor
}

/// Classify a comparison and optional image similarity
pub fn validate_drift(
    comparison: &DnaComparison,
    similarity: Option<&ImageSimilarity>,
    thresholds: &DriftThresholds,
    policy: NonCriticalPolicy,
    strict_lock: bool,
) -> DriftReport {
    let mut reasons = Vec::new();
    let mut rejected = false;
    let mut flagged_panels = Vec::new();
    let mut tolerated_panels = Vec::new();

    let tolerance = thresholds.dna_tolerance(strict_lock);
    if !comparison.drift.is_finite() || comparison.drift > tolerance {
        rejected = true;
        reasons.push(format!(
            "DNA drift {:.3} exceeds tolerance {:.3} ({} of {} attributes changed)",
            comparison.drift,
            tolerance,
            comparison.changes.len(),
            comparison.compared
        ));
    }

    if let Some(sim) = similarity {
        let floor = thresholds.whole_floor(strict_lock);
        if let Some(whole) = sim.whole {
            if below_floor(whole, floor) {
                rejected = true;
                reasons.push(format!(
                    "whole-sheet similarity {:.3} below floor {:.3}",
                    whole, floor
                ));
            }
        }

        let failing: Vec<PanelType> = sim
            .panels
            .iter()
            .filter(|(_, score)| below_floor(**score, thresholds.ssim_panel))
            .map(|(panel, _)| *panel)
            .collect();

        if !failing.is_empty() {
            let ids: Vec<String> = failing.iter().map(PanelType::id).collect();
            let listed = ids.join(", ");
            let all_non_critical = failing.iter().all(|p| !p.is_critical());

            if strict_lock {
                rejected = true;
                reasons.push(format!(
                    "strict lock: panels below similarity floor {:.3}: {}",
                    thresholds.ssim_panel, listed
                ));
                flagged_panels = failing;
            } else if all_non_critical {
                match policy {
                    NonCriticalPolicy::Flag => {
                        reasons.push(format!("non-critical panels below floor: {}", listed));
                        flagged_panels = failing;
                    }
                    NonCriticalPolicy::Tolerate => {
                        reasons.push(format!("tolerated non-critical panels: {}", listed));
                        tolerated_panels = failing;
                    }
                    NonCriticalPolicy::Reject => {
                        rejected = true;
                        reasons.push(format!("non-critical panels below floor: {}", listed));
                        flagged_panels = failing;
                    }
                }
            } else {
                reasons.push(format!(
                    "panels below similarity floor {:.3}: {}",
                    thresholds.ssim_panel, listed
                ));
                flagged_panels = failing;
            }
        }
    }

    let verdict = if rejected {
        DriftVerdict::Rejected
    } else if !flagged_panels.is_empty() {
        DriftVerdict::Flagged
    } else {
        DriftVerdict::Accepted
    };

    DriftReport {
        verdict,
        reasons,
        flagged_panels,
        tolerated_panels,
        seed_mismatches: Vec::new(),
        changes: comparison.changes.clone(),
        dna_drift: comparison.drift,
        strict_lock,
        thresholds_version: thresholds.version,
    }
}

/// Drift configuration bundled for the modify path
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriftValidator {
    pub thresholds: DriftThresholds,
    pub non_critical: NonCriticalPolicy,
}

impl DriftValidator {
    pub fn new(thresholds: DriftThresholds, non_critical: NonCriticalPolicy) -> Self {
        Self { thresholds, non_critical }
    }

    pub fn validate(
        &self,
        baseline: &NormalizedDna,
        candidate: &NormalizedDna,
        similarity: Option<&ImageSimilarity>,
        strict_lock: bool,
    ) -> DriftReport {
        let comparison = compare_dna(baseline, candidate);
        let report = validate_drift(
            &comparison,
            similarity,
            &self.thresholds,
            self.non_critical,
            strict_lock,
        );
        match report.verdict {
            DriftVerdict::Accepted => info!(
                "Drift accepted: dna drift {:.3}, {} changes, strict={}",
                report.dna_drift,
                report.changes.len(),
                strict_lock
            ),
            verdict => warn!(
                "Drift {:?}: {}",
                verdict,
                report.reasons.join("; ")
            ),
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dna::{normalize, DesignDna, Material};
    use crate::panel::{DetailKind, FloorLevel, Orientation};
    use serde_json::json;

    /// 4 dimensions + style + project type + 4 materials + 10 extended leaves
    fn twenty_attributes() -> DesignDna {
        let mut dna = DesignDna::new(15.0, 12.0, 7.0, 2)
            .with_style("Contemporary")
            .with_project_type("residential")
            .with_material(Material::with_color("Brick", "#b5651d"))
            .with_material(Material::new("Glass"))
            .with_material(Material::new("Oak"))
            .with_material(Material::with_color("Zinc", "#7a7f80"));
        for i in 0..10 {
            dna = dna.with_attribute(format!("attr{}", i), json!(i + 1));
        }
        dna
    }

    fn comparison(changed: usize, compared: usize) -> DnaComparison {
        DnaComparison {
            drift: changed as f64 / compared as f64,
            compared,
            changes: Vec::new(),
        }
    }

    #[test]
    fn test_fifteen_percent_drift_rejected_under_strict_lock() {
        let base = normalize(&twenty_attributes());
        let mut changed = twenty_attributes();
        changed.dimensions.length = 16.0;
        changed.dimensions.width = 13.0;
        changed.style = Some("Brutalist".to_string());
        let cmp = compare_dna(&base, &normalize(&changed));
        assert_eq!(cmp.compared, 20);
        assert!((cmp.drift - 0.15).abs() < 1e-12);

        let t = DriftThresholds::default();
        let report = validate_drift(&cmp, None, &t, NonCriticalPolicy::Flag, true);
        assert_eq!(report.verdict, DriftVerdict::Rejected);
        assert_eq!(report.changes.len(), 3);
    }

    #[test]
    fn test_strict_lock_tightens_dna_tolerance() {
        let t = DriftThresholds::default();
        let cmp = comparison(2, 25); // 0.08
        assert!(validate_drift(&cmp, None, &t, NonCriticalPolicy::Flag, false).is_accepted());
        assert_eq!(
            validate_drift(&cmp, None, &t, NonCriticalPolicy::Flag, true).verdict,
            DriftVerdict::Rejected
        );
    }

    #[test]
    fn test_tolerance_boundary_is_inclusive() {
        let cmp = comparison(1, 10);
        let t = DriftThresholds::default();
        assert!(validate_drift(&cmp, None, &t, NonCriticalPolicy::Flag, false).is_accepted());
    }

    #[test]
    fn test_whole_floor() {
        let t = DriftThresholds::default();
        let cmp = comparison(0, 10);
        let sim = ImageSimilarity::default().with_whole(0.93);
        assert!(validate_drift(&cmp, Some(&sim), &t, NonCriticalPolicy::Flag, false).is_accepted());
        // strict raises the whole floor to 0.95
        assert_eq!(
            validate_drift(&cmp, Some(&sim), &t, NonCriticalPolicy::Flag, true).verdict,
            DriftVerdict::Rejected
        );
        let low = ImageSimilarity::default().with_whole(0.80);
        assert_eq!(
            validate_drift(&cmp, Some(&low), &t, NonCriticalPolicy::Flag, false).verdict,
            DriftVerdict::Rejected
        );
    }

    #[test]
    fn test_non_finite_scores_fail_closed() {
        let t = DriftThresholds::default();
        let cmp = comparison(0, 10);
        let sim = ImageSimilarity::default()
            .with_whole(f64::NAN)
            .with_panel(PanelType::Hero3d, f64::NAN);
        for strict in [false, true] {
            let report = validate_drift(&cmp, Some(&sim), &t, NonCriticalPolicy::Tolerate, strict);
            assert_eq!(report.verdict, DriftVerdict::Rejected, "strict={}", strict);
            assert_eq!(report.flagged_panels, vec![PanelType::Hero3d]);
        }

        let nan_drift = DnaComparison { drift: f64::NAN, compared: 0, changes: Vec::new() };
        let report = validate_drift(&nan_drift, None, &t, NonCriticalPolicy::Flag, false);
        assert_eq!(report.verdict, DriftVerdict::Rejected);
    }

    #[test]
    fn test_critical_panel_flagged_outside_strict() {
        let t = DriftThresholds::default();
        let cmp = comparison(0, 10);
        let sim = ImageSimilarity::default()
            .with_panel(PanelType::FloorPlan(FloorLevel::Ground), 0.90)
            .with_panel(PanelType::Hero3d, 0.99);
        let report = validate_drift(&cmp, Some(&sim), &t, NonCriticalPolicy::Tolerate, false);
        assert_eq!(report.verdict, DriftVerdict::Flagged);
        assert_eq!(report.flagged_panels, vec![PanelType::FloorPlan(FloorLevel::Ground)]);

        let strict = validate_drift(&cmp, Some(&sim), &t, NonCriticalPolicy::Tolerate, true);
        assert_eq!(strict.verdict, DriftVerdict::Rejected);
    }

    #[test]
    fn test_non_critical_policy() {
        let t = DriftThresholds::default();
        let cmp = comparison(0, 10);
        let palette = PanelType::Detail(DetailKind::MaterialPalette);
        let sim = ImageSimilarity::default()
            .with_panel(palette, 0.90)
            .with_panel(PanelType::Elevation(Orientation::North), 0.97);

        let flag = validate_drift(&cmp, Some(&sim), &t, NonCriticalPolicy::Flag, false);
        assert_eq!(flag.verdict, DriftVerdict::Flagged);

        let tolerate = validate_drift(&cmp, Some(&sim), &t, NonCriticalPolicy::Tolerate, false);
        assert_eq!(tolerate.verdict, DriftVerdict::Accepted);
        assert_eq!(tolerate.tolerated_panels, vec![palette]);
        assert!(tolerate.flagged_panels.is_empty());

        let reject = validate_drift(&cmp, Some(&sim), &t, NonCriticalPolicy::Reject, false);
        assert_eq!(reject.verdict, DriftVerdict::Rejected);
    }

    #[test]
    fn test_seed_mismatches_reported_without_verdict_change() {
        let t = DriftThresholds::default();
        let report = validate_drift(&comparison(0, 10), None, &t, NonCriticalPolicy::Flag, true)
            .with_seed_mismatches(vec![PanelType::Hero3d]);
        assert!(report.is_accepted());
        assert_eq!(report.seed_mismatches, vec![PanelType::Hero3d]);
        assert!(report.reasons[0].contains("hero_3d"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["seedMismatches"][0], "hero_3d");
    }

    #[test]
    fn test_thresholds_serde_and_range() {
        let t: DriftThresholds = serde_json::from_str(r#"{"dnaOverallTolerance":0.2}"#).unwrap();
        assert_eq!(t.dna_overall_tolerance, 0.2);
        assert_eq!(t.ssim_panel, 0.95);
        assert!(t.out_of_range().is_none());
        let bad = DriftThresholds { ssim_whole: 1.5, ..t };
        assert_eq!(bad.out_of_range(), Some(("ssimWhole", 1.5)));
    }

    #[test]
    fn test_validator_identical_dna() {
        let dna = normalize(&twenty_attributes());
        let report = DriftValidator::default().validate(&dna, &dna, None, true);
        assert!(report.is_accepted());
        assert_eq!(report.dna_drift, 0.0);
    }
}
