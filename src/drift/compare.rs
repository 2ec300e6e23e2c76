//! Structural DNA comparison over a flattened attribute map

use crate::dna::NormalizedDna;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// One attribute that differs between baseline and candidate.
/// `None` means the attribute is absent on that side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnaComparison {
    /// Changed attributes over the union of compared attributes, in [0, 1]
    pub drift: f64,
    /// Size of the attribute union
    pub compared: usize,
    pub changes: Vec<AttributeChange>,
}

impl DnaComparison {
    pub fn is_identical(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changed_paths(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.path.as_str()).collect()
    }
}

/// Flatten a normalized DNA into dotted attribute paths.
///
/// Dimensions are compared in millimetres. Materials are keyed by name so
/// reordering never counts as drift; a material without a colour maps to
/// `true`, and repeated names get an occurrence suffix (`materials.Brick[1]`).
/// Extended attributes live under `extended.` and recurse through objects;
/// arrays are leaves.
pub fn flatten(dna: &NormalizedDna) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    let d = dna.dimensions();
    out.insert("dimensions.length".to_string(), Value::from(d.length_mm));
    out.insert("dimensions.width".to_string(), Value::from(d.width_mm));
    out.insert("dimensions.height".to_string(), Value::from(d.height_mm));
    out.insert("dimensions.floor_count".to_string(), Value::from(d.floor_count));

    if let Some(style) = dna.style() {
        out.insert("style".to_string(), Value::from(style));
    }
    if let Some(project_type) = dna.project_type() {
        out.insert("project_type".to_string(), Value::from(project_type));
    }

    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    for material in dna.materials() {
        let value = match &material.color {
            Some(c) => Value::from(c.as_str()),
            None => Value::Bool(true),
        };
        let occurrence = seen.entry(material.name.as_str()).or_insert(0);
        let path = match *occurrence {
            0 => format!("materials.{}", material.name),
            n => format!("materials.{}[{}]", material.name, n),
        };
        *occurrence += 1;
        out.insert(path, value);
    }

    for (key, value) in dna.extended() {
        flatten_value(format!("extended.{}", key), value, &mut out);
    }
    out
}

fn flatten_value(path: String, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_value(format!("{}.{}", path, key), child, out);
            }
        }
        leaf => {
            out.insert(path, leaf.clone());
        }
    }
}

/// Compare a candidate DNA against its baseline
pub fn compare_dna(baseline: &NormalizedDna, candidate: &NormalizedDna) -> DnaComparison {
    let old = flatten(baseline);
    let new = flatten(candidate);

    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    let changes: Vec<AttributeChange> = keys
        .iter()
        .filter_map(|key| {
            let (a, b) = (old.get(*key), new.get(*key));
            if a == b {
                None
            } else {
                Some(AttributeChange {
                    path: (*key).clone(),
                    old: a.cloned(),
                    new: b.cloned(),
                })
            }
        })
        .collect();

    let compared = keys.len();
    let drift = if compared == 0 {
        0.0
    } else {
        changes.len() as f64 / compared as f64
    };

    DnaComparison { drift, compared, changes }
}
