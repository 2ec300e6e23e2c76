//! Provider contract — per-panel calls to an external image generator
//!
//! The pipeline only defines the request/response shapes and how a sheet's
//! panels fan out. Each panel succeeds or fails on its own; a failed
//! sibling never cancels the others. Partial sheets are never promoted.

use crate::bundle::PanelArtifact;
use crate::dna::DnaFingerprint;
use crate::layout::SheetLayout;
use crate::panel::{PanelType, SheetType};
use crate::planner::{PanelJob, SheetPlan};
use crate::prompt::PromptSet;
use futures::future::join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub panel: PanelType,
    pub instructions: String,
    pub negative_instructions: String,
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    pub steps: u32,
    pub guidance_scale: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    #[serde(default)]
    pub image_references: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_used: Option<u64>,
    pub provider_model: String,
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// Sampling and retry knobs shared by every panel of a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationSettings {
    pub steps: u32,
    pub guidance_scale: f64,
    /// Attempts per panel, counting the first
    pub max_attempts: u32,
    /// Linear backoff between attempts; needs a tokio runtime when non-zero
    pub retry_backoff_ms: u64,
    /// Request sizes are rounded up to a multiple of this
    pub size_multiple: u32,
    /// Size used for panels without a layout slot
    pub fallback_size: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            steps: 30,
            guidance_scale: 7.5,
            max_attempts: 2,
            retry_backoff_ms: 0,
            size_multiple: 8,
            fallback_size: 1024,
        }
    }
}

/// External image generator
pub trait ImageProvider: Sync {
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> impl Future<Output = Result<GenerationResponse, ProviderError>> + Send;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rate limited")]
    RateLimited,

    #[error("request timed out")]
    Timeout,

    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::Rejected(_))
    }
}

/// Unexpected shape of an otherwise successful response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderAnomaly {
    SeedNotEchoed,
    MissingImageReference,
    /// Provider used a different seed; recorded, artifact kept
    SeedMismatch { requested: u64, used: u64 },
}

impl ProviderAnomaly {
    /// Whether the anomaly fails the panel
    pub fn is_failure(&self) -> bool {
        !matches!(self, ProviderAnomaly::SeedMismatch { .. })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PanelFailure {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("provider anomaly: {0:?}")]
    Anomaly(ProviderAnomaly),

    #[error("no prompt built for panel")]
    MissingPrompt,
}

impl PanelFailure {
    pub fn is_retryable(&self) -> bool {
        match self {
            PanelFailure::Provider(e) => e.is_retryable(),
            PanelFailure::Anomaly(_) => true,
            PanelFailure::MissingPrompt => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelOutcome {
    pub panel: PanelType,
    pub result: Result<PanelArtifact, PanelFailure>,
    /// Every anomaly seen across attempts
    pub anomalies: Vec<ProviderAnomaly>,
    pub attempts: u32,
    pub latency_ms: u64,
}

impl PanelOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of one sheet generation pass
#[derive(Debug, Clone)]
pub struct SheetRun {
    pub sheet_type: SheetType,
    pub fingerprint: DnaFingerprint,
    pub outcomes: BTreeMap<PanelType, PanelOutcome>,
}

impl SheetRun {
    pub fn failed(&self) -> Vec<PanelType> {
        self.outcomes
            .values()
            .filter(|o| !o.is_success())
            .map(|o| o.panel)
            .collect()
    }

    /// Failed panels worth another attempt
    pub fn retryable(&self) -> Vec<PanelType> {
        self.outcomes
            .values()
            .filter(|o| matches!(&o.result, Err(f) if f.is_retryable()))
            .map(|o| o.panel)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.outcomes.values().all(PanelOutcome::is_success)
    }

    /// All artifacts, or the failed panels when any panel failed
    pub fn into_artifacts(self) -> Result<BTreeMap<PanelType, PanelArtifact>, IncompleteSheet> {
        let failed = self.failed();
        if !failed.is_empty() {
            return Err(IncompleteSheet { failed });
        }
        Ok(self
            .outcomes
            .into_iter()
            .filter_map(|(panel, outcome)| outcome.result.ok().map(|a| (panel, a)))
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("sheet incomplete: {} panels failed", .failed.len())]
pub struct IncompleteSheet {
    pub failed: Vec<PanelType>,
}

fn round_up(value: u32, multiple: u32) -> u32 {
    if multiple <= 1 {
        return value.max(1);
    }
    value.max(1).div_ceil(multiple) * multiple
}

/// Provider request size for a panel: its slot, rounded up
pub fn request_size(
    layout: &SheetLayout,
    panel: PanelType,
    settings: &GenerationSettings,
) -> (u32, u32) {
    match layout.slot(panel) {
        Some(slot) => (
            round_up(slot.rect.width, settings.size_multiple),
            round_up(slot.rect.height, settings.size_multiple),
        ),
        None => (settings.fallback_size, settings.fallback_size),
    }
}

fn classify(request: &GenerationRequest, response: &GenerationResponse) -> Vec<ProviderAnomaly> {
    let mut anomalies = Vec::new();
    if !response.image_references.iter().any(|r| !r.is_empty()) {
        anomalies.push(ProviderAnomaly::MissingImageReference);
    }
    match response.seed_used {
        None => anomalies.push(ProviderAnomaly::SeedNotEchoed),
        Some(used) if used != request.seed => anomalies.push(ProviderAnomaly::SeedMismatch {
            requested: request.seed,
            used,
        }),
        Some(_) => {}
    }
    anomalies
}

async fn generate_panel<P: ImageProvider>(
    provider: &P,
    job: &PanelJob,
    layout: &SheetLayout,
    prompts: &PromptSet,
    settings: &GenerationSettings,
) -> PanelOutcome {
    let Some(prompt) = prompts.get(job.panel) else {
        return PanelOutcome {
            panel: job.panel,
            result: Err(PanelFailure::MissingPrompt),
            anomalies: Vec::new(),
            attempts: 0,
            latency_ms: 0,
        };
    };
    let (width, height) = request_size(layout, job.panel, settings);
    let request = GenerationRequest {
        panel: job.panel,
        instructions: prompt.instructions.clone(),
        negative_instructions: prompt.negative_instructions.clone(),
        width,
        height,
        seed: job.seed,
        steps: settings.steps,
        guidance_scale: settings.guidance_scale,
    };

    let mut anomalies = Vec::new();
    let mut latency_ms = 0;
    let mut attempts = 0;
    let max_attempts = settings.max_attempts.max(1);

    loop {
        attempts += 1;
        let failure = match provider.generate(request.clone()).await {
            Ok(response) => {
                latency_ms += response.latency_ms;
                let found = classify(&request, &response);
                let fatal = found.iter().find(|a| a.is_failure()).cloned();
                anomalies.extend(found);
                match fatal {
                    Some(anomaly) => PanelFailure::Anomaly(anomaly),
                    None => {
                        let image_reference = response
                            .image_references
                            .into_iter()
                            .find(|r| !r.is_empty())
                            .unwrap_or_default();
                        debug!("Generated {} in {} attempt(s)", job.panel, attempts);
                        return PanelOutcome {
                            panel: job.panel,
                            result: Ok(PanelArtifact {
                                panel: job.panel,
                                image_reference,
                                seed: job.seed,
                                seed_used: response.seed_used,
                                prompt: prompt.clone(),
                                provider_model: Some(response.provider_model),
                                trace_id: response.trace_id,
                            }),
                            anomalies,
                            attempts,
                            latency_ms,
                        };
                    }
                }
            }
            Err(e) => PanelFailure::Provider(e),
        };

        if !failure.is_retryable() || attempts >= max_attempts {
            warn!("Panel {} failed after {} attempt(s): {}", job.panel, attempts, failure);
            return PanelOutcome {
                panel: job.panel,
                result: Err(failure),
                anomalies,
                attempts,
                latency_ms,
            };
        }
        debug!("Retrying {} after: {}", job.panel, failure);
        if settings.retry_backoff_ms > 0 {
            let backoff = settings.retry_backoff_ms.saturating_mul(u64::from(attempts));
            tokio::time::sleep(Duration::from_millis(backoff)).await;
        }
    }
}

/// Generate every panel of `plan` concurrently. Dropping the returned
/// future cancels all in-flight panels.
pub async fn generate_sheet<P: ImageProvider>(
    provider: &P,
    plan: &SheetPlan,
    layout: &SheetLayout,
    prompts: &PromptSet,
    settings: &GenerationSettings,
) -> SheetRun {
    info!(
        "Generating {} panels for {} sheet (dna {})",
        plan.len(),
        plan.sheet_type,
        plan.fingerprint.short()
    );
    let outcomes = join_all(
        plan.jobs
            .iter()
            .map(|job| generate_panel(provider, job, layout, prompts, settings)),
    )
    .await;

    let run = SheetRun {
        sheet_type: plan.sheet_type,
        fingerprint: plan.fingerprint,
        outcomes: outcomes.into_iter().map(|o| (o.panel, o)).collect(),
    };
    let failed = run.failed();
    if failed.is_empty() {
        info!("Sheet run complete: {} panels", run.outcomes.len());
    } else {
        warn!("Sheet run incomplete: {} of {} panels failed", failed.len(), run.outcomes.len());
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dna::DesignDna;
    use crate::layout::compute_layout;
    use crate::planner::{plan_panels, SiteContext};
    use crate::prompt::GenerationMode;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Echoes the seed; the hero panel fails on its first `flaky` calls
    struct FlakyProvider {
        flaky: u32,
        calls: AtomicU32,
    }

    impl ImageProvider for FlakyProvider {
        fn generate(
            &self,
            request: GenerationRequest,
        ) -> impl Future<Output = Result<GenerationResponse, ProviderError>> + Send {
            let result = if request.panel == PanelType::Hero3d
                && self.calls.fetch_add(1, Ordering::SeqCst) < self.flaky
            {
                Err(ProviderError::Timeout)
            } else {
                Ok(GenerationResponse {
                    image_references: vec![format!("mem://{}", request.panel)],
                    seed_used: Some(request.seed),
                    provider_model: "mock-v1".to_string(),
                    latency_ms: 5,
                    trace_id: None,
                })
            };
            async move { result }
        }
    }

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(1001, 8), 1008);
        assert_eq!(round_up(1000, 8), 1000);
        assert_eq!(round_up(0, 8), 8);
        assert_eq!(round_up(13, 1), 13);
    }

    #[test]
    fn test_classify() {
        let req = GenerationRequest {
            panel: PanelType::Hero3d,
            instructions: String::new(),
            negative_instructions: String::new(),
            width: 8,
            height: 8,
            seed: 10,
            steps: 1,
            guidance_scale: 1.0,
        };
        let resp = GenerationResponse {
            image_references: vec!["a".into()],
            seed_used: Some(11),
            ..Default::default()
        };
        assert_eq!(
            classify(&req, &resp),
            vec![ProviderAnomaly::SeedMismatch { requested: 10, used: 11 }]
        );
        let empty = GenerationResponse::default();
        assert_eq!(
            classify(&req, &empty),
            vec![ProviderAnomaly::MissingImageReference, ProviderAnomaly::SeedNotEchoed]
        );
    }

    fn run_with(provider: &FlakyProvider, settings: GenerationSettings) -> SheetRun {
        let dna = DesignDna::new(12.0, 9.0, 6.0, 2);
        let plan = plan_panels(&dna, &SiteContext::default(), SheetType::Concept).unwrap();
        let layout = compute_layout(1792, 1269, SheetType::Concept, "uk-riba-standard").unwrap();
        let prompts = PromptSet::build(&plan, &GenerationMode::Generate);
        futures::executor::block_on(generate_sheet(provider, &plan, &layout, &prompts, &settings))
    }

    #[test]
    fn test_retry_recovers_transient_failure() {
        let provider = FlakyProvider { flaky: 1, calls: AtomicU32::new(0) };
        let run = run_with(&provider, GenerationSettings::default());
        assert!(run.is_complete());
        assert_eq!(run.outcomes[&PanelType::Hero3d].attempts, 2);
    }

    #[test]
    fn test_partial_run_not_promoted() {
        let provider = FlakyProvider { flaky: 5, calls: AtomicU32::new(0) };
        let run = run_with(&provider, GenerationSettings { max_attempts: 1, ..Default::default() });
        assert_eq!(run.failed(), vec![PanelType::Hero3d]);
        assert_eq!(run.retryable(), vec![PanelType::Hero3d]);
        // siblings still succeeded
        assert!(run.outcomes.len() > 1);
        let succeeded = run.outcomes.values().filter(|o| o.is_success()).count();
        assert_eq!(succeeded, run.outcomes.len() - 1);
        let err = run.into_artifacts().unwrap_err();
        assert_eq!(err.failed, vec![PanelType::Hero3d]);
    }
}
