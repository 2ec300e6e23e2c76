//! Lineage — hash chain over a bundle's versions
//!
//! Every version carries the chain head of its parent. Verification
//! recomputes the whole chain, so a rewritten event is detected.

use crate::dna::DnaFingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineageEventKind {
    Baseline,
    Modify { parent_version: u32 },
}

impl LineageEventKind {
    fn tag(&self) -> &'static str {
        match self {
            LineageEventKind::Baseline => "baseline",
            LineageEventKind::Modify { .. } => "modify",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageEvent {
    pub version: u32,
    pub kind: LineageEventKind,
    pub fingerprint: DnaFingerprint,
    /// Hash of the panel artifacts of this version
    pub content_hash: String,
    /// DNA drift against the parent, 0 for the baseline
    pub dna_drift: f64,
    pub timestamp: DateTime<Utc>,
    pub state_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleLineage {
    pub root_hash: String,
    pub events: Vec<LineageEvent>,
}

impl BundleLineage {
    pub fn genesis(fingerprint: DnaFingerprint, content_hash: &str, at: DateTime<Utc>) -> Self {
        let kind = LineageEventKind::Baseline;
        let state_hash = Self::chain_hash("", &kind, 1, &fingerprint, content_hash, 0.0);
        Self {
            root_hash: state_hash.clone(),
            events: vec![LineageEvent {
                version: 1,
                kind,
                fingerprint,
                content_hash: content_hash.to_string(),
                dna_drift: 0.0,
                timestamp: at,
                state_hash,
            }],
        }
    }

    /// Lineage of the next version; `self` is left untouched
    pub fn extend(
        &self,
        version: u32,
        fingerprint: DnaFingerprint,
        content_hash: &str,
        dna_drift: f64,
        at: DateTime<Utc>,
    ) -> Self {
        let kind = LineageEventKind::Modify {
            parent_version: self.head_version(),
        };
        let state_hash =
            Self::chain_hash(
                &self.root_hash,
                &kind,
                version,
                &fingerprint,
                content_hash,
                dna_drift,
            );
        let mut events = self.events.clone();
        events.push(LineageEvent {
            version,
            kind,
            fingerprint,
            content_hash: content_hash.to_string(),
            dna_drift,
            timestamp: at,
            state_hash: state_hash.clone(),
        });
        Self { root_hash: state_hash, events }
    }

    pub fn head_version(&self) -> u32 {
        self.events.last().map(|e| e.version).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Recompute every link and compare against the stored hashes
    pub fn verify_chain(&self) -> bool {
        if self.events.is_empty() {
            return false;
        }
        let mut prev = String::new();
        for event in &self.events {
            let expected = Self::chain_hash(
                &prev,
                &event.kind,
                event.version,
                &event.fingerprint,
                &event.content_hash,
                event.dna_drift,
            );
            if expected != event.state_hash {
                return false;
            }
            prev = expected;
        }
        prev == self.root_hash
    }

    fn chain_hash(
        prev_hash: &str,
        kind: &LineageEventKind,
        version: u32,
        fingerprint: &DnaFingerprint,
        content_hash: &str,
        dna_drift: f64,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(prev_hash.as_bytes());
        hasher.update(kind.tag().as_bytes());
        if let LineageEventKind::Modify { parent_version } = kind {
            hasher.update(parent_version.to_le_bytes());
        }
        hasher.update(version.to_le_bytes());
        hasher.update(fingerprint.as_bytes());
        hasher.update(content_hash.as_bytes());
        hasher.update(dna_drift.to_le_bytes());
        hex::encode(hasher.finalize())
    }
}
