//! Pipeline configuration — an explicit value threaded through the pipeline
//!
//! Nothing in the crate reads configuration from a global. Callers load a
//! `PipelineConfig` once and pass its parts to the planner, layout
//! composer, drift validator and provider fan-out.

use crate::drift::{DriftThresholds, DriftValidator, NonCriticalPolicy};
use crate::layout::{Canvas, MissingSlotPolicy, UK_RIBA_STANDARD};
use crate::planner::{PanelCatalog, Planner};
use crate::provider::GenerationSettings;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub thresholds: DriftThresholds,
    pub catalog: PanelCatalog,
    pub layout_key: String,
    pub canvas: Canvas,
    pub generation: GenerationSettings,
    pub non_critical_policy: NonCriticalPolicy,
    pub missing_slot_policy: MissingSlotPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            thresholds: DriftThresholds::default(),
            catalog: PanelCatalog::default(),
            layout_key: UK_RIBA_STANDARD.to_string(),
            canvas: Canvas::default(),
            generation: GenerationSettings::default(),
            non_critical_policy: NonCriticalPolicy::default(),
            missing_slot_policy: MissingSlotPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        info!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    /// Defaults when `path` does not exist; a present but broken file is an error
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some((field, value)) = self.thresholds.out_of_range() {
            return Err(ConfigError::OutOfRange { field, value });
        }
        if self.layout_key.trim().is_empty() {
            return Err(ConfigError::Invalid("layoutKey must not be empty".to_string()));
        }
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ConfigError::Invalid("canvas must have a non-zero size".to_string()));
        }
        if self.generation.steps == 0 {
            return Err(ConfigError::Invalid("generation.steps must be positive".to_string()));
        }
        if !self.generation.guidance_scale.is_finite() || self.generation.guidance_scale < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "generation.guidanceScale must be a non-negative number, got {}",
                self.generation.guidance_scale
            )));
        }
        Ok(())
    }

    pub fn planner(&self) -> Planner {
        Planner::new(self.catalog.clone())
    }

    pub fn validator(&self) -> DriftValidator {
        DriftValidator::new(self.thresholds, self.non_critical_policy)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
