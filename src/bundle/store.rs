//! Bundle Store — append-only versioned bundle persistence
//!
//! Provides:
//! - In-memory store for a single process (whole-bundle reads under RwLock)
//! - File store with a JSON manifest and SHA-256 checksum per version
//! - Integrity verification of every stored version

use super::BaselineBundle;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

const MANIFEST_FILE: &str = "manifest.json";

/// (design id, sheet id) pair that owns a version history
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleKey {
    pub design_id: String,
    pub sheet_id: String,
}

impl BundleKey {
    pub fn new(design_id: &str, sheet_id: &str) -> Self {
        Self {
            design_id: design_id.to_string(),
            sheet_id: sheet_id.to_string(),
        }
    }

    /// Filesystem-safe stem, stable for a given key
    fn file_stem(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.design_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.sheet_id.as_bytes());
        let digest = hex::encode(hasher.finalize());
        let readable: String = self
            .design_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .take(32)
            .collect();
        format!("{}_{}", readable, &digest[..12])
    }
}

impl fmt::Display for BundleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.design_id, self.sheet_id)
    }
}

/// Versioned bundle persistence. `put` never overwrites.
pub trait BundleStore: Send + Sync {
    /// Append the next version of a bundle
    fn put(&self, bundle: BaselineBundle) -> Result<Arc<BaselineBundle>, StoreError>;

    fn get(&self, key: &BundleKey, version: u32) -> Result<Arc<BaselineBundle>, StoreError>;

    fn latest(&self, key: &BundleKey) -> Result<Arc<BaselineBundle>, StoreError>;

    /// Stored versions, ascending
    fn versions(&self, key: &BundleKey) -> Result<Vec<u32>, StoreError>;
}

fn check_append(key: &BundleKey, existing: &[u32], version: u32) -> Result<(), StoreError> {
    if existing.contains(&version) {
        return Err(StoreError::VersionExists { key: key.clone(), version });
    }
    let expected = existing.iter().max().map(|v| v + 1).unwrap_or(1);
    if version != expected {
        return Err(StoreError::VersionGap { key: key.clone(), expected, got: version });
    }
    Ok(())
}

/// Process-local store; readers always observe whole bundles
#[derive(Debug, Default)]
pub struct MemoryBundleStore {
    bundles: RwLock<BTreeMap<BundleKey, BTreeMap<u32, Arc<BaselineBundle>>>>,
}

impl MemoryBundleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bundles
            .read()
            .map(|b| b.values().map(BTreeMap::len).sum::<usize>())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BundleStore for MemoryBundleStore {
    fn put(&self, bundle: BaselineBundle) -> Result<Arc<BaselineBundle>, StoreError> {
        let key = bundle.key();
        let mut bundles = self.bundles.write().map_err(|_| StoreError::Poisoned)?;
        let history = bundles.entry(key.clone()).or_default();
        let existing: Vec<u32> = history.keys().copied().collect();
        check_append(&key, &existing, bundle.version)?;

        let version = bundle.version;
        let stored = Arc::new(bundle);
        history.insert(version, Arc::clone(&stored));
        debug!("Stored {} v{} in memory", key, version);
        Ok(stored)
    }

    fn get(&self, key: &BundleKey, version: u32) -> Result<Arc<BaselineBundle>, StoreError> {
        let bundles = self.bundles.read().map_err(|_| StoreError::Poisoned)?;
        bundles
            .get(key)
            .and_then(|h| h.get(&version))
            .cloned()
            .ok_or_else(|| StoreError::NotFound { key: key.clone(), version: Some(version) })
    }

    fn latest(&self, key: &BundleKey) -> Result<Arc<BaselineBundle>, StoreError> {
        let bundles = self.bundles.read().map_err(|_| StoreError::Poisoned)?;
        bundles
            .get(key)
            .and_then(|h| h.values().next_back())
            .cloned()
            .ok_or_else(|| StoreError::NotFound { key: key.clone(), version: None })
    }

    fn versions(&self, key: &BundleKey) -> Result<Vec<u32>, StoreError> {
        let bundles = self.bundles.read().map_err(|_| StoreError::Poisoned)?;
        Ok(bundles.get(key).map(|h| h.keys().copied().collect()).unwrap_or_default())
    }
}

/// Manifest entry for one stored bundle version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBundleMeta {
    pub key: BundleKey,
    pub version: u32,
    pub filename: String,
    pub checksum: String,
    pub size_bytes: u64,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreManifest {
    entries: Vec<StoredBundleMeta>,
}

/// Directory-backed store: one JSON file per version plus a manifest
#[derive(Debug)]
pub struct FileBundleStore {
    dir: PathBuf,
    manifest: Mutex<StoreManifest>,
}

impl FileBundleStore {
    /// Open (or initialise) a store rooted at `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = if manifest_path.exists() {
            let json = std::fs::read_to_string(&manifest_path)?;
            let manifest: StoreManifest = serde_json::from_str(&json)?;
            info!("Loaded bundle manifest with {} entries", manifest.entries.len());
            manifest
        } else {
            StoreManifest::default()
        };
        Ok(Self {
            dir,
            manifest: Mutex::new(manifest),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stored entries in insertion order
    pub fn entries(&self) -> Result<Vec<StoredBundleMeta>, StoreError> {
        Ok(self.manifest.lock().map_err(|_| StoreError::Poisoned)?.entries.clone())
    }

    /// Checksum check of every stored version
    pub fn verify_all(&self) -> Result<Vec<(BundleKey, u32, bool)>, StoreError> {
        let manifest = self.manifest.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(manifest
            .entries
            .iter()
            .map(|meta| {
                let ok = std::fs::read(self.dir.join(&meta.filename))
                    .map(|data| checksum(&data) == meta.checksum)
                    .unwrap_or(false);
                if !ok {
                    warn!("Integrity check failed for {} v{}", meta.key, meta.version);
                }
                (meta.key.clone(), meta.version, ok)
            })
            .collect())
    }

    fn load(&self, meta: &StoredBundleMeta) -> Result<Arc<BaselineBundle>, StoreError> {
        let data = std::fs::read(self.dir.join(&meta.filename))?;
        let actual = checksum(&data);
        if actual != meta.checksum {
            return Err(StoreError::ChecksumMismatch {
                key: meta.key.clone(),
                version: meta.version,
                expected: meta.checksum.clone(),
                actual,
            });
        }
        let bundle: BaselineBundle = serde_json::from_slice(&data)?;
        debug!("Loaded {} v{} ({} bytes, checksum OK)", meta.key, meta.version, data.len());
        Ok(Arc::new(bundle))
    }

    fn write_atomic(&self, filename: &str, data: &[u8]) -> Result<(), StoreError> {
        let tmp = self.dir.join(format!("{}.tmp", filename));
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, self.dir.join(filename))?;
        Ok(())
    }
}

fn checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

impl BundleStore for FileBundleStore {
    fn put(&self, bundle: BaselineBundle) -> Result<Arc<BaselineBundle>, StoreError> {
        let key = bundle.key();
        let mut manifest = self.manifest.lock().map_err(|_| StoreError::Poisoned)?;
        let existing: Vec<u32> = manifest
            .entries
            .iter()
            .filter(|m| m.key == key)
            .map(|m| m.version)
            .collect();
        check_append(&key, &existing, bundle.version)?;

        let data = serde_json::to_vec_pretty(&bundle)?;
        let filename = format!("{}_v{:04}.json", key.file_stem(), bundle.version);
        self.write_atomic(&filename, &data)?;

        let meta = StoredBundleMeta {
            key: key.clone(),
            version: bundle.version,
            filename,
            checksum: checksum(&data),
            size_bytes: data.len() as u64,
            stored_at: Utc::now(),
        };
        manifest.entries.push(meta);
        let manifest_json = serde_json::to_vec_pretty(&*manifest)?;
        if let Err(e) = self.write_atomic(MANIFEST_FILE, &manifest_json) {
            manifest.entries.pop();
            return Err(e);
        }

        info!("Stored {} v{} ({} bytes)", key, bundle.version, data.len());
        Ok(Arc::new(bundle))
    }

    fn get(&self, key: &BundleKey, version: u32) -> Result<Arc<BaselineBundle>, StoreError> {
        let meta = {
            let manifest = self.manifest.lock().map_err(|_| StoreError::Poisoned)?;
            manifest
                .entries
                .iter()
                .find(|m| &m.key == key && m.version == version)
                .cloned()
        };
        let meta = meta.ok_or_else(|| StoreError::NotFound {
            key: key.clone(),
            version: Some(version),
        })?;
        self.load(&meta)
    }

    fn latest(&self, key: &BundleKey) -> Result<Arc<BaselineBundle>, StoreError> {
        let latest = self.versions(key)?.last().copied();
        match latest {
            Some(version) => self.get(key, version),
            None => Err(StoreError::NotFound { key: key.clone(), version: None }),
        }
    }

    fn versions(&self, key: &BundleKey) -> Result<Vec<u32>, StoreError> {
        let manifest = self.manifest.lock().map_err(|_| StoreError::Poisoned)?;
        let mut versions: Vec<u32> = manifest
            .entries
            .iter()
            .filter(|m| &m.key == key)
            .map(|m| m.version)
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }
}

fn version_label(version: &Option<u32>) -> String {
    version.map(|v| format!(" v{}", v)).unwrap_or_default()
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{key} v{version} already stored")]
    VersionExists { key: BundleKey, version: u32 },

    #[error("{key}: expected version {expected}, got {got}")]
    VersionGap { key: BundleKey, expected: u32, got: u32 },

    #[error("bundle not found: {key}{}", version_label(.version))]
    NotFound { key: BundleKey, version: Option<u32> },

    #[error("checksum mismatch for {key} v{version}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        key: BundleKey,
        version: u32,
        expected: String,
        actual: String,
    },

    #[error("store lock poisoned")]
    Poisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
