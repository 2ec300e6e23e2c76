//! Canonical form and content fingerprint of a DesignDna
//!
//! `normalize` is pure, total and idempotent. Dimensions become integer
//! millimetres, materials are sorted and de-duplicated, absent / null / empty
//! optional values collapse to "absent", and extended attributes are stored
//! with sorted keys. The fingerprint hashes only this canonical form, field by
//! field with length prefixes, so it never depends on insertion order.

use super::model::{DesignDna, Dimensions, DnaError, Material};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

const FINGERPRINT_TAG: &[u8] = b"sheetdna-fingerprint-v1";

/// Dimensions in integer millimetres
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedDimensions {
    pub length_mm: i64,
    pub width_mm: i64,
    pub height_mm: i64,
    pub floor_count: u32,
}

impl NormalizedDimensions {
    pub fn length_m(&self) -> f64 {
        mm_to_m(self.length_mm)
    }

    pub fn width_m(&self) -> f64 {
        mm_to_m(self.width_mm)
    }

    pub fn height_m(&self) -> f64 {
        mm_to_m(self.height_mm)
    }

    /// Height of a single storey, evenly split
    pub fn storey_height_m(&self) -> f64 {
        self.height_m() / f64::from(self.floor_count.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedMaterial {
    pub name: String,
    pub color: Option<String>,
}

impl NormalizedMaterial {
    fn sort_key(&self) -> (String, &str, Option<&str>) {
        (self.name.to_lowercase(), self.name.as_str(), self.color.as_deref())
    }
}

/// Canonical, immutable DesignDna. Only `normalize` produces one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedDna {
    dimensions: NormalizedDimensions,
    materials: Vec<NormalizedMaterial>,
    style: Option<String>,
    project_type: Option<String>,
    extended: BTreeMap<String, Value>,
}

impl NormalizedDna {
    pub fn dimensions(&self) -> &NormalizedDimensions {
        &self.dimensions
    }

    pub fn materials(&self) -> &[NormalizedMaterial] {
        &self.materials
    }

    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    pub fn project_type(&self) -> Option<&str> {
        self.project_type.as_deref()
    }

    pub fn extended(&self) -> &BTreeMap<String, Value> {
        &self.extended
    }

    pub fn floor_count(&self) -> u32 {
        self.dimensions.floor_count
    }

    /// SHA-256 over the canonical encoding
    pub fn fingerprint(&self) -> DnaFingerprint {
        let mut hasher = Sha256::new();
        hasher.update(FINGERPRINT_TAG);
        let d = &self.dimensions;
        hasher.update(d.length_mm.to_le_bytes());
        hasher.update(d.width_mm.to_le_bytes());
        hasher.update(d.height_mm.to_le_bytes());
        hasher.update(d.floor_count.to_le_bytes());

        hasher.update((self.materials.len() as u64).to_le_bytes());
        for m in &self.materials {
            update_str(&mut hasher, &m.name);
            update_opt(&mut hasher, m.color.as_deref());
        }
        update_opt(&mut hasher, self.style.as_deref());
        update_opt(&mut hasher, self.project_type.as_deref());

        hasher.update((self.extended.len() as u64).to_le_bytes());
        for (key, value) in &self.extended {
            update_str(&mut hasher, key);
            update_str(&mut hasher, &value.to_string());
        }

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        DnaFingerprint(bytes)
    }

    /// Back to the wire shape. `normalize(&n.to_dna()) == n`.
    pub fn to_dna(&self) -> DesignDna {
        DesignDna {
            dimensions: Dimensions {
                length: self.dimensions.length_m(),
                width: self.dimensions.width_m(),
                height: self.dimensions.height_m(),
                floor_count: self.dimensions.floor_count,
            },
            materials: self
                .materials
                .iter()
                .map(|m| Material { name: m.name.clone(), color: m.color.clone() })
                .collect(),
            style: self.style.clone(),
            project_type: self.project_type.clone(),
            extended: self.extended.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }
}

fn update_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn update_opt(hasher: &mut Sha256, s: Option<&str>) {
    match s {
        None => hasher.update([0u8]),
        Some(s) => {
            hasher.update([1u8]);
            update_str(hasher, s);
        }
    }
}

/// Canonicalize a DesignDna
pub fn normalize(dna: &DesignDna) -> NormalizedDna {
    let d = &dna.dimensions;
    let dimensions = NormalizedDimensions {
        length_mm: m_to_mm(d.length),
        width_mm: m_to_mm(d.width),
        height_mm: m_to_mm(d.height),
        floor_count: d.floor_count,
    };

    let mut materials: Vec<NormalizedMaterial> = dna
        .materials
        .iter()
        .filter_map(|m| {
            let name = normalize_text(&m.name)?;
            let color = m.color.as_deref().and_then(normalize_text).map(|c| c.to_lowercase());
            Some(NormalizedMaterial { name, color })
        })
        .collect();
    materials.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    materials.dedup();

    let extended = dna
        .extended
        .iter()
        .filter_map(|(key, value)| {
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            canonical_value(value).map(|v| (key.to_string(), v))
        })
        .collect();

    NormalizedDna {
        dimensions,
        materials,
        style: dna.style.as_deref().and_then(normalize_text),
        project_type: dna.project_type.as_deref().and_then(normalize_text),
        extended,
    }
}

/// Fingerprint of the canonical form of `dna`
pub fn fingerprint(dna: &DesignDna) -> DnaFingerprint {
    normalize(dna).fingerprint()
}

fn m_to_mm(metres: f64) -> i64 {
    if metres.is_finite() {
        (metres * 1000.0).round() as i64
    } else {
        0
    }
}

fn mm_to_m(mm: i64) -> f64 {
    mm as f64 / 1000.0
}

/// Trim and collapse inner whitespace; blank text is absent
fn normalize_text(s: &str) -> Option<String> {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Canonical JSON value, or `None` when the value carries no information
fn canonical_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(Value::Bool(*b)),
        Value::String(s) => normalize_text(s).map(Value::String),
        Value::Number(n) => canonical_number(n).map(Value::Number),
        Value::Array(items) => {
            let items: Vec<Value> = items.iter().filter_map(canonical_value).collect();
            if items.is_empty() {
                None
            } else {
                Some(Value::Array(items))
            }
        }
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map
                .iter()
                .filter_map(|(k, v)| {
                    let k = k.trim();
                    if k.is_empty() {
                        return None;
                    }
                    canonical_value(v).map(|v| (k.to_string(), v))
                })
                .collect();
            if entries.is_empty() {
                return None;
            }
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = Map::new();
            for (k, v) in entries {
                out.insert(k, v);
            }
            Some(Value::Object(out))
        }
    }
}

/// Integers stay integers; floats round to 1e-3 and whole floats become integers
fn canonical_number(n: &Number) -> Option<Number> {
    if n.is_i64() || n.is_u64() {
        return Some(n.clone());
    }
    let x = n.as_f64()?;
    if !x.is_finite() {
        return None;
    }
    let rounded = (x * 1000.0).round() / 1000.0;
    if rounded.fract() == 0.0 && rounded.abs() < 9.0e15 {
        return Some(Number::from(rounded as i64));
    }
    Number::from_f64(rounded)
}

/// Content fingerprint of a normalized DesignDna
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DnaFingerprint([u8; 32]);

impl DnaFingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// 12-character prefix for logs
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }

    pub fn from_hex(s: &str) -> Result<Self, DnaError> {
        let raw = hex::decode(s).map_err(|e| DnaError::InvalidFingerprint(e.to_string()))?;
        if raw.len() != 32 {
            return Err(DnaError::InvalidFingerprint(format!(
                "expected 32 bytes, got {}",
                raw.len()
            )));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }
}

impl fmt::Display for DnaFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for DnaFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DnaFingerprint({})", self.short())
    }
}

impl From<DnaFingerprint> for String {
    fn from(fp: DnaFingerprint) -> Self {
        fp.to_hex()
    }
}

impl TryFrom<String> for DnaFingerprint {
    type Error = DnaError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}
