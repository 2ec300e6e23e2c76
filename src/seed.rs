//! Seed derivation — reproducible per-panel seeds from a DNA fingerprint
//!
//! seed = SHA256(tag ‖ fingerprint ‖ panel id) reduced into the provider seed
//! range `[1, SEED_MAX]`. Changing any normalized DNA attribute changes the
//! fingerprint and therefore every derived seed. Not a security boundary.

use crate::dna::DnaFingerprint;
use crate::panel::{PanelType, SheetType};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Largest seed accepted by image providers (signed 32-bit range)
pub const SEED_MAX: u64 = 2_147_483_647;

const PANEL_SEED_TAG: &[u8] = b"sheetdna-panel-seed-v1";
const SHEET_SEED_TAG: &[u8] = b"sheetdna-sheet-seed-v1";

/// Seed for one panel of the design identified by `fingerprint`
pub fn derive_seed(fingerprint: &DnaFingerprint, panel: PanelType) -> u64 {
    reduce(PANEL_SEED_TAG, fingerprint, &panel.id())
}

/// Sheet-level seed recorded on baseline bundles
pub fn derive_sheet_seed(fingerprint: &DnaFingerprint, sheet: SheetType) -> u64 {
    reduce(SHEET_SEED_TAG, fingerprint, sheet.id())
}

/// Seeds for a set of panels, keyed in reading order
pub fn derive_seeds(
    fingerprint: &DnaFingerprint,
    panels: impl IntoIterator<Item = PanelType>,
) -> BTreeMap<PanelType, u64> {
    panels
        .into_iter()
        .map(|panel| (panel, derive_seed(fingerprint, panel)))
        .collect()
}

fn reduce(tag: &[u8], fingerprint: &DnaFingerprint, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(tag);
    hasher.update(fingerprint.as_bytes());
    hasher.update((label.len() as u64).to_le_bytes());
    hasher.update(label.as_bytes());
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    // never zero: providers treat 0 as "random"
    u64::from_le_bytes(head) % SEED_MAX + 1
}
