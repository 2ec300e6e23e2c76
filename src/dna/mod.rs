//! Design DNA — schema, canonical form and content fingerprint
//!
//! A DesignDna is parsed from its wire shape, validated, then normalized.
//! The normalized form is the only thing seeds, prompts and drift checks
//! ever look at.

mod canonical;
mod model;

pub use canonical::{
    fingerprint, normalize, DnaFingerprint, NormalizedDimensions, NormalizedDna,
    NormalizedMaterial,
};
pub use model::{DesignDna, Dimensions, DnaError, Material, MAX_DIMENSION_M, MAX_FLOOR_COUNT};
