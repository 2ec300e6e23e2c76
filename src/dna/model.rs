//! DesignDna — the structured description of one building design
//!
//! Every panel of a sheet is derived from this value. It is the wire shape:
//! camelCase keys, optional fields tolerated as missing, `null` or empty.
//! Unknown top-level keys (spatial program, site response, ...) are kept in
//! `extended` so they still take part in hashing and drift comparison.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Largest accepted dimension in metres
pub const MAX_DIMENSION_M: f64 = 10_000.0;

/// Most storeys a design may declare; each one becomes a floor plan panel
pub const MAX_FLOOR_COUNT: u32 = 200;

/// Building envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimensions {
    /// Footprint length in metres
    pub length: f64,
    /// Footprint width in metres
    pub width: f64,
    /// Overall height in metres
    pub height: f64,
    /// Number of storeys, ground floor included
    #[serde(alias = "floors", alias = "floor_count")]
    pub floor_count: u32,
}

/// A facade / finish material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    #[serde(default, alias = "hex", alias = "colour", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), color: None }
    }

    pub fn with_color(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self { name: name.into(), color: Some(color.into()) }
    }
}

/// The Design DNA of one building
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignDna {
    pub dimensions: Dimensions,
    #[serde(default, deserialize_with = "null_as_default")]
    pub materials: Vec<Material>,
    #[serde(default, alias = "architecturalStyle", skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, alias = "program", skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
    /// Optional extended attributes, keyed by attribute name
    #[serde(flatten)]
    pub extended: Map<String, Value>,
}

impl DesignDna {
    pub fn new(length: f64, width: f64, height: f64, floor_count: u32) -> Self {
        Self {
            dimensions: Dimensions { length, width, height, floor_count },
            materials: Vec::new(),
            style: None,
            project_type: None,
            extended: Map::new(),
        }
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.materials.push(material);
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_project_type(mut self, project_type: impl Into<String>) -> Self {
        self.project_type = Some(project_type.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extended.insert(key.into(), value);
        self
    }

    /// Parse a DNA document from JSON
    pub fn from_json_str(json: &str) -> Result<Self, DnaError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Input validation. Runs before any seed derivation or provider call.
    pub fn validate(&self) -> Result<(), DnaError> {
        let d = &self.dimensions;
        if !(1..=MAX_FLOOR_COUNT).contains(&d.floor_count) {
            return Err(DnaError::InvalidFloorCount(d.floor_count));
        }
        for (field, value) in [("length", d.length), ("width", d.width), ("height", d.height)] {
            if !value.is_finite() || value <= 0.0 || value > MAX_DIMENSION_M {
                return Err(DnaError::InvalidDimension { field, value });
            }
        }
        if let Some(index) = self.materials.iter().position(|m| m.name.trim().is_empty()) {
            return Err(DnaError::EmptyMaterialName { index });
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        let d = &self.dimensions;
        format!(
            "DesignDna {}x{}x{}m | floors={} | materials={} | style={}",
            d.length,
            d.width,
            d.height,
            d.floor_count,
            self.materials.len(),
            self.style.as_deref().unwrap_or("-"),
        )
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// DNA input validation errors
#[derive(Debug, thiserror::Error)]
pub enum DnaError {
    #[error("floor count must be between 1 and {}, got {}", MAX_FLOOR_COUNT, .0)]
    InvalidFloorCount(u32),

    #[error("dimension '{field}' must be a positive finite number of metres, got {value}")]
    InvalidDimension { field: &'static str, value: f64 },

    #[error("material #{index} has an empty name")]
    EmptyMaterialName { index: usize },

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("malformed DNA document: {0}")]
    Parse(#[from] serde_json::Error),
}
