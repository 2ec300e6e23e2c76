//! Prompt Builder — deterministic per-panel generation instructions
//!
//! A prompt is a pure function of (panel, normalized DNA, site, mode,
//! seed). Identical inputs give byte-identical instructions and metadata,
//! which is what lets a baseline be regenerated or audited later.

pub mod builders;

pub use builders::{builder_for, PanelPromptBuilder};

use crate::dna::{DnaFingerprint, NormalizedDna};
use crate::panel::PanelType;
use crate::planner::{QuickToggle, SheetPlan, SiteContext};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Bumped whenever builder output changes for the same input
pub const BUILDER_VERSION: u32 = 1;

/// Context of a modify request against an existing baseline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyContext {
    /// Short textual description of the baseline being modified
    pub baseline_description: String,
    #[serde(default)]
    pub toggles: BTreeSet<QuickToggle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default)]
    pub strict_lock: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "context", rename_all = "snake_case")]
pub enum GenerationMode {
    #[default]
    Generate,
    Modify(ModifyContext),
}

impl GenerationMode {
    pub fn label(&self) -> &'static str {
        match self {
            GenerationMode::Generate => "generate",
            GenerationMode::Modify(_) => "modify",
        }
    }

    pub fn strict_lock(&self) -> bool {
        matches!(self, GenerationMode::Modify(ctx) if ctx.strict_lock)
    }
}

/// Everything a prompt depends on
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub dna: &'a NormalizedDna,
    pub site: &'a SiteContext,
    pub mode: &'a GenerationMode,
    pub seed: u64,
    pub fingerprint: DnaFingerprint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptMetadata {
    pub panel: PanelType,
    pub seed: u64,
    pub fingerprint: DnaFingerprint,
    pub mode: String,
    pub strict_lock: bool,
    pub builder_version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelPrompt {
    pub instructions: String,
    pub negative_instructions: String,
    pub metadata: PromptMetadata,
}

/// One-line description of a normalized DNA, used for baselines and prompts
pub fn describe_dna(dna: &NormalizedDna) -> String {
    let d = dna.dimensions();
    let mut parts = vec![format!(
        "{:.2}m x {:.2}m footprint, {:.2}m tall, {} floors",
        d.length_m(),
        d.width_m(),
        d.height_m(),
        d.floor_count
    )];
    if !dna.materials().is_empty() {
        let materials: Vec<String> = dna
            .materials()
            .iter()
            .map(|mat| match &mat.color {
                Some(c) => format!("{} ({})", mat.name, c),
                None => mat.name.clone(),
            })
            .collect();
        parts.push(format!("materials: {}", materials.join(", ")));
    }
    if let Some(style) = dna.style() {
        parts.push(format!("style: {}", style));
    }
    if let Some(project_type) = dna.project_type() {
        parts.push(format!("program: {}", project_type));
    }
    for (key, value) in dna.extended() {
        parts.push(format!("{}: {}", key, value));
    }
    parts.join("; ")
}

fn describe_site(site: &SiteContext) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(location) = &site.location {
        parts.push(location.clone());
    }
    if let Some(climate) = &site.climate {
        parts.push(format!("climate {}", climate));
    }
    if site.orientation_deg != 0.0 {
        parts.push(format!("front facade at {:.0} degrees", site.orientation_deg));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

fn preservation_clause(dna: &NormalizedDna) -> String {
    let d = dna.dimensions();
    let materials: Vec<&str> = dna.materials().iter().map(|m| m.name.as_str()).collect();
    format!(
        "Preserve exactly: footprint {:.2}m x {:.2}m, height {:.2}m, {} floors, \
         materials [{}], style {}.",
        d.length_m(),
        d.width_m(),
        d.height_m(),
        d.floor_count,
        materials.join(", "),
        dna.style().unwrap_or("unchanged")
    )
}

/// Compose the prompt for one panel
pub fn build_panel_prompt(panel: PanelType, inputs: &PromptInputs<'_>) -> PanelPrompt {
    let builder = builder_for(panel);

    let mut lines = vec![
        format!("{}.", builder.framing()),
        format!("{}: {}.", panel.title(), builder.subject(inputs.dna, inputs.site)),
        format!("Design: {}.", describe_dna(inputs.dna)),
    ];
    if let Some(site) = describe_site(inputs.site) {
        lines.push(format!("Site: {}.", site));
    }

    if let GenerationMode::Modify(ctx) = inputs.mode {
        lines.push(format!("Modify the baseline: {}.", ctx.baseline_description));
        let mut changes: Vec<String> = ctx.toggles.iter().map(|t| t.phrase().to_string()).collect();
        if let Some(text) = ctx.instruction.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            changes.push(text.to_string());
        }
        if !changes.is_empty() {
            lines.push(format!("Requested changes: {}.", changes.join("; ")));
        }
        lines.push(preservation_clause(inputs.dna));
        if ctx.strict_lock {
            lines.push("Strict lock: make no other changes of any kind.".to_string());
        }
    }

    PanelPrompt {
        instructions: lines.join("\n"),
        negative_instructions: builder.all_negatives().join(", "),
        metadata: PromptMetadata {
            panel,
            seed: inputs.seed,
            fingerprint: inputs.fingerprint,
            mode: inputs.mode.label().to_string(),
            strict_lock: inputs.mode.strict_lock(),
            builder_version: BUILDER_VERSION,
        },
    }
}

/// Prompts for every job of a plan, keyed by panel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptSet {
    prompts: BTreeMap<PanelType, PanelPrompt>,
}

impl PromptSet {
    pub fn build(plan: &SheetPlan, mode: &GenerationMode) -> Self {
        let prompts = plan
            .jobs
            .iter()
            .map(|job| {
                let inputs = PromptInputs {
                    dna: &job.dna,
                    site: &job.site,
                    mode,
                    seed: job.seed,
                    fingerprint: job.fingerprint,
                };
                (job.panel, build_panel_prompt(job.panel, &inputs))
            })
            .collect();
        Self { prompts }
    }

    pub fn get(&self, panel: PanelType) -> Option<&PanelPrompt> {
        self.prompts.get(&panel)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PanelType, &PanelPrompt)> {
        self.prompts.iter()
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}
