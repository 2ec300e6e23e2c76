//! SheetDNA — deterministic planning and drift validation for
//! multi-panel architectural sheets
//!
//! A canonical Design DNA drives everything downstream: per-panel seeds,
//! the planned panel set, the sheet layout and the generation prompts.
//! Modify requests are gated by a drift validator against an immutable
//! baseline bundle.

pub mod bundle;
pub mod config;
pub mod dna;
pub mod drift;
pub mod layout;
pub mod panel;
pub mod planner;
pub mod prompt;
pub mod provider;
pub mod seed;

pub use bundle::{
    apply_modify, create_baseline, BaselineBundle, BundleStore, ModifyRejection, ModifyRequest,
};
pub use config::PipelineConfig;
pub use dna::{fingerprint, normalize, DesignDna, DnaFingerprint, NormalizedDna};
pub use drift::{
    compare_dna, validate_drift, DriftReport, DriftThresholds, DriftValidator, DriftVerdict,
};
pub use layout::{compute_layout, validate_layout, SheetLayout};
pub use panel::{PanelType, SheetType};
pub use planner::{plan_panels, Planner, SheetPlan, SiteContext};
pub use prompt::{build_panel_prompt, GenerationMode, PanelPrompt, PromptSet};
pub use provider::{generate_sheet, ImageProvider, SheetRun};
pub use seed::derive_seed;
