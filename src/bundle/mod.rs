//! Bundle Manager — immutable baselines and drift-gated modify
//!
//! A baseline bundle is the accepted state of one design sheet. Modify
//! never mutates a bundle; an accepted candidate produces a new version
//! with the same design and sheet ids and a chained lineage.

mod lineage;
mod store;

pub use lineage::{BundleLineage, LineageEvent, LineageEventKind};
pub use store::{
    BundleKey, BundleStore, FileBundleStore, MemoryBundleStore, StoreError, StoredBundleMeta,
};

use crate::dna::{normalize, DesignDna, DnaError, DnaFingerprint, NormalizedDna};
use crate::drift::{AttributeChange, DriftReport, DriftValidator, ImageSimilarity};
use crate::layout::SheetLayout;
use crate::panel::{PanelType, SheetType};
use crate::planner::{QuickToggle, SheetPlan};
use crate::prompt::{describe_dna, GenerationMode, ModifyContext, PanelPrompt};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// One generated panel, as accepted into a bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelArtifact {
    pub panel: PanelType,
    pub image_reference: String,
    /// Seed the pipeline asked for
    pub seed: u64,
    /// Seed the provider reports having used, when it differs or is echoed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_used: Option<u64>,
    pub prompt: PanelPrompt,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl PanelArtifact {
    pub fn seed_mismatch(&self) -> bool {
        self.seed_used.is_some_and(|used| used != self.seed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMetadata {
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_version: Option<u32>,
    pub lineage: BundleLineage,
    /// Request and drift report that produced this version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modify: Option<ModifyRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyRecord {
    pub request: ModifyRequest,
    pub report: DriftReport,
}

/// Accepted state of one design sheet at one version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineBundle {
    pub bundle_id: Uuid,
    pub design_id: String,
    pub sheet_id: String,
    pub version: u32,
    pub sheet_type: SheetType,
    pub dna: NormalizedDna,
    pub fingerprint: DnaFingerprint,
    pub sheet_seed: u64,
    pub layout: SheetLayout,
    pub panels: BTreeMap<PanelType, PanelArtifact>,
    /// Composed sheet image, when one was rendered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_image: Option<String>,
    pub metadata: BundleMetadata,
}

impl BaselineBundle {
    pub fn key(&self) -> BundleKey {
        BundleKey::new(&self.design_id, &self.sheet_id)
    }

    pub fn panel(&self, panel: PanelType) -> Option<&PanelArtifact> {
        self.panels.get(&panel)
    }

    /// Baseline description handed to modify-mode prompts
    pub fn describe(&self) -> String {
        format!("{} sheet v{}: {}", self.sheet_type, self.version, describe_dna(&self.dna))
    }

    /// Generation mode for a modify request against this bundle
    pub fn modify_mode(&self, request: &ModifyRequest) -> GenerationMode {
        GenerationMode::Modify(ModifyContext {
            baseline_description: self.describe(),
            toggles: request.toggles.clone(),
            instruction: request.instruction.clone(),
            strict_lock: request.strict_lock,
        })
    }

    /// Panels a modify candidate must deliver
    pub fn required_panels(&self, request: &ModifyRequest) -> BTreeSet<PanelType> {
        let mut required: BTreeSet<PanelType> = self.panels.keys().copied().collect();
        for toggle in &request.toggles {
            required.extend(toggle.panels());
        }
        required
    }
}

fn content_hash(
    fingerprint: &DnaFingerprint,
    panels: &BTreeMap<PanelType, PanelArtifact>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fingerprint.as_bytes());
    for (panel, artifact) in panels {
        hasher.update(panel.id().as_bytes());
        hasher.update([0u8]);
        hasher.update(artifact.image_reference.as_bytes());
        hasher.update([0u8]);
        hasher.update(artifact.seed.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Inputs to a new baseline
#[derive(Debug, Clone)]
pub struct BaselineDraft {
    pub design_id: String,
    pub sheet_id: String,
    pub sheet_type: SheetType,
    pub dna: NormalizedDna,
    pub sheet_seed: u64,
    /// Panels the plan called for
    pub planned: Vec<PanelType>,
    pub layout: SheetLayout,
    pub panels: BTreeMap<PanelType, PanelArtifact>,
    pub sheet_image: Option<String>,
}

impl BaselineDraft {
    pub fn from_plan(
        design_id: impl Into<String>,
        sheet_id: impl Into<String>,
        plan: &SheetPlan,
        layout: SheetLayout,
        panels: BTreeMap<PanelType, PanelArtifact>,
    ) -> Self {
        Self {
            design_id: design_id.into(),
            sheet_id: sheet_id.into(),
            sheet_type: plan.sheet_type,
            dna: plan.dna.as_ref().clone(),
            sheet_seed: plan.sheet_seed,
            planned: plan.panels(),
            layout,
            panels,
            sheet_image: None,
        }
    }

    pub fn with_sheet_image(mut self, reference: impl Into<String>) -> Self {
        self.sheet_image = Some(reference.into());
        self
    }
}

/// Stamp a new version-1 bundle. Every planned panel must have an artifact.
pub fn create_baseline(draft: BaselineDraft) -> Result<BaselineBundle, BundleError> {
    if draft.design_id.trim().is_empty() {
        return Err(BundleError::EmptyIdentifier("design_id"));
    }
    if draft.sheet_id.trim().is_empty() {
        return Err(BundleError::EmptyIdentifier("sheet_id"));
    }
    let missing: Vec<PanelType> = draft
        .planned
        .iter()
        .filter(|p| !draft.panels.contains_key(*p))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(BundleError::MissingPanels { missing });
    }
    if let Some(empty) = draft.panels.values().find(|a| a.image_reference.is_empty()) {
        return Err(BundleError::MissingImage(empty.panel));
    }

    let now = Utc::now();
    let fingerprint = draft.dna.fingerprint();
    let lineage =
        BundleLineage::genesis(fingerprint, &content_hash(&fingerprint, &draft.panels), now);

    let bundle = BaselineBundle {
        bundle_id: Uuid::new_v4(),
        design_id: draft.design_id,
        sheet_id: draft.sheet_id,
        version: 1,
        sheet_type: draft.sheet_type,
        dna: draft.dna,
        fingerprint,
        sheet_seed: draft.sheet_seed,
        layout: draft.layout,
        panels: draft.panels,
        sheet_image: draft.sheet_image,
        metadata: BundleMetadata {
            created_at: now,
            parent_version: None,
            lineage,
            modify: None,
        },
    };
    info!(
        "Created baseline {}/{} v1 ({} panels, dna {})",
        bundle.design_id,
        bundle.sheet_id,
        bundle.panels.len(),
        fingerprint.short()
    );
    Ok(bundle)
}

/// Bounded change request against an existing bundle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyRequest {
    pub design_id: String,
    pub sheet_id: String,
    #[serde(default)]
    pub toggles: BTreeSet<QuickToggle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default)]
    pub strict_lock: bool,
}

impl ModifyRequest {
    pub fn new(design_id: impl Into<String>, sheet_id: impl Into<String>) -> Self {
        Self {
            design_id: design_id.into(),
            sheet_id: sheet_id.into(),
            ..Self::default()
        }
    }

    pub fn with_toggle(mut self, toggle: QuickToggle) -> Self {
        self.toggles.insert(toggle);
        self
    }

    pub fn with_instruction(mut self, text: impl Into<String>) -> Self {
        self.instruction = Some(text.into());
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict_lock = true;
        self
    }
}

/// Freshly generated artifacts proposed as the next version
#[derive(Debug, Clone)]
pub struct CandidateArtifacts {
    pub dna: DesignDna,
    pub panels: BTreeMap<PanelType, PanelArtifact>,
    pub similarity: Option<ImageSimilarity>,
    pub sheet_image: Option<String>,
}

impl CandidateArtifacts {
    pub fn new(dna: DesignDna, panels: BTreeMap<PanelType, PanelArtifact>) -> Self {
        Self {
            dna,
            panels,
            similarity: None,
            sheet_image: None,
        }
    }

    pub fn with_similarity(mut self, similarity: ImageSimilarity) -> Self {
        self.similarity = Some(similarity);
        self
    }
}

/// Validate a candidate against `bundle` and produce the next version
pub fn apply_modify(
    bundle: &BaselineBundle,
    request: &ModifyRequest,
    candidate: CandidateArtifacts,
    validator: &DriftValidator,
) -> Result<BaselineBundle, ModifyRejection> {
    if request.design_id != bundle.design_id || request.sheet_id != bundle.sheet_id {
        return Err(ModifyRejection::TargetMismatch {
            expected: bundle.key(),
            requested: BundleKey::new(&request.design_id, &request.sheet_id),
        });
    }

    let missing: Vec<PanelType> = bundle
        .required_panels(request)
        .into_iter()
        .filter(|p| !candidate.panels.contains_key(p))
        .collect();
    if !missing.is_empty() {
        warn!(
            "Modify of {}/{} v{} incomplete: missing {}",
            bundle.design_id,
            bundle.sheet_id,
            bundle.version,
            panel_ids(&missing)
        );
        return Err(ModifyRejection::Incomplete { missing });
    }
    if let Some(empty) = candidate.panels.values().find(|a| a.image_reference.is_empty()) {
        return Err(ModifyRejection::MissingImage(empty.panel));
    }

    candidate.dna.validate()?;
    let dna = normalize(&candidate.dna);

    let mismatched: Vec<PanelType> = candidate
        .panels
        .values()
        .filter(|a| a.seed_mismatch())
        .map(|a| a.panel)
        .collect();
    if !mismatched.is_empty() {
        warn!("Modify candidate seed mismatch on {}", panel_ids(&mismatched));
    }
    let report = validator
        .validate(&bundle.dna, &dna, candidate.similarity.as_ref(), request.strict_lock)
        .with_seed_mismatches(mismatched);
    if !report.is_accepted() {
        return Err(ModifyRejection::Drift {
            report: Box::new(report),
        });
    }

    let now = Utc::now();
    let version = bundle.version + 1;
    let fingerprint = dna.fingerprint();
    let lineage = bundle.metadata.lineage.extend(
        version,
        fingerprint,
        &content_hash(&fingerprint, &candidate.panels),
        report.dna_drift,
        now,
    );

    info!(
        "Accepted modify of {}/{}: v{} -> v{} (drift {:.3})",
        bundle.design_id, bundle.sheet_id, bundle.version, version, report.dna_drift
    );

    Ok(BaselineBundle {
        bundle_id: Uuid::new_v4(),
        design_id: bundle.design_id.clone(),
        sheet_id: bundle.sheet_id.clone(),
        version,
        sheet_type: bundle.sheet_type,
        dna,
        fingerprint,
        sheet_seed: bundle.sheet_seed,
        layout: bundle.layout.clone(),
        panels: candidate.panels,
        sheet_image: candidate.sheet_image.or_else(|| bundle.sheet_image.clone()),
        metadata: BundleMetadata {
            created_at: now,
            parent_version: Some(bundle.version),
            lineage,
            modify: Some(ModifyRecord {
                request: request.clone(),
                report,
            }),
        },
    })
}

fn panel_ids(panels: &[PanelType]) -> String {
    panels.iter().map(PanelType::id).collect::<Vec<_>>().join(", ")
}

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("baseline is missing planned panels: {}", panel_ids(.missing))]
    MissingPanels { missing: Vec<PanelType> },

    #[error("panel {0} has no image reference")]
    MissingImage(PanelType),

    #[error("empty identifier: {0}")]
    EmptyIdentifier(&'static str),
}

/// Why a modify produced no new version
#[derive(Debug, thiserror::Error)]
pub enum ModifyRejection {
    #[error("modify targets {requested} but bundle is {expected}")]
    TargetMismatch { expected: BundleKey, requested: BundleKey },

    #[error("candidate is missing panels: {}", panel_ids(.missing))]
    Incomplete { missing: Vec<PanelType> },

    #[error("candidate panel {0} has no image reference")]
    MissingImage(PanelType),

    #[error("candidate DNA is invalid: {0}")]
    InvalidDna(#[from] DnaError),

    #[error("candidate drifted from baseline: {}", .report.reasons.join("; "))]
    Drift { report: Box<DriftReport> },
}

impl ModifyRejection {
    /// Attribute changes that caused a drift rejection
    pub fn changes(&self) -> &[AttributeChange] {
        match self {
            ModifyRejection::Drift { report } => &report.changes,
            _ => &[],
        }
    }
}
