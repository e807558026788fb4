//! Content-addressed cache of prior mapping results
//!
//! Keys are SHA-256 digests over the JSON-canonical (sorted-key) serialization
//! of the row's stringified column map plus the ruleset version. For a fixed
//! ruleset version, a cached result is byte-equal to a fresh computation.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::source::RawRow;

use super::MappedComponent;

/// Bumped whenever the built-in rule tables change
pub const RULESET_VERSION: &str = "1";

#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Shared mapping cache: in-memory map behind a reader-writer lock, plus an
/// optional one-file-per-digest JSON disk layer.
pub struct MappingCache {
    memory: RwLock<HashMap<String, MappedComponent>>,
    disk_dir: Option<PathBuf>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MappingCache {
    pub fn new(disk_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = &disk_dir {
            if let Err(e) = std::fs::create_dir_all(dir) {
                tracing::warn!(dir = %dir.display(), error = %e, "cache directory unavailable, disk layer disabled");
            }
        }
        MappingCache {
            memory: RwLock::new(HashMap::new()),
            disk_dir,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Stable content hash of a row under the current ruleset
    pub fn key_for(row: &RawRow) -> String {
        let canonical: BTreeMap<&str, String> = row
            .columns
            .iter()
            .map(|(name, value)| (name.as_str(), value.to_text()))
            .collect();
        let json = serde_json::to_string(&canonical).expect("string map serializes");
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hasher.update(b"|ruleset=");
        hasher.update(RULESET_VERSION.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<MappedComponent> {
        if let Some(hit) = self.memory.read().get(key).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(hit);
        }
        if let Some(component) = self.read_disk(key) {
            self.memory
                .write()
                .insert(key.to_string(), component.clone());
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(component);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, key: String, component: &MappedComponent) {
        self.write_disk(&key, component);
        self.memory.write().insert(key, component.clone());
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn entry_path(&self, key: &str) -> Option<PathBuf> {
        self.disk_dir.as_ref().map(|dir| dir.join(format!("{}.json", key)))
    }

    fn read_disk(&self, key: &str) -> Option<MappedComponent> {
        let path = self.entry_path(key)?;
        let bytes = std::fs::read(&path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(component) => Some(component),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "discarding unreadable cache entry");
                None
            }
        }
    }

    fn write_disk(&self, key: &str, component: &MappedComponent) {
        let Some(path) = self.entry_path(key) else {
            return;
        };
        match serde_json::to_vec(component) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&path, bytes) {
                    tracing::warn!(path = %path.display(), error = %e, "cache write failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "cache entry serialization failed"),
        }
    }
}
