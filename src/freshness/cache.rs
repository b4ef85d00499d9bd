//! Change-detection cache keyed by file path.
//!
//! A path maps to the key of the content last committed for it. The caller
//! commits only after a successful write, so a failed write is retried the next
//! time the file is seen.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::{CacheKey, cache_key};
use crate::debug;

/// Format version of the persisted cache file.
const CACHE_VERSION: u32 = 1;

/// What the cache knows about one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub processed: bool,
}

/// Decides whether a file needs reprocessing.
pub struct ChangeDetector {
    enabled: bool,
    entries: DashMap<PathBuf, CacheEntry>,
}

#[derive(Serialize, Deserialize)]
struct PersistedCache {
    version: u32,
    entries: BTreeMap<String, String>,
}

impl ChangeDetector {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Return the file's key when it needs processing, `None` to skip it.
    ///
    /// Never mutates the cache. With the cache disabled every file is processed.
    pub fn check(&self, path: &Path, content: &[u8], mtime_ms: Option<u64>) -> Option<CacheKey> {
        let key = cache_key(content, mtime_ms);
        if !self.enabled {
            return Some(key);
        }
        match self.entries.get(path) {
            Some(entry) if entry.value().processed && entry.value().key == key => None,
            _ => Some(key),
        }
    }

    pub fn should_process(&self, path: &Path, content: &[u8], mtime_ms: Option<u64>) -> bool {
        self.check(path, content, mtime_ms).is_some()
    }

    /// Record `key` as the processed state of `path`.
    pub fn commit(&self, path: &Path, key: CacheKey) {
        if self.enabled {
            self.entries.insert(
                path.to_path_buf(),
                CacheEntry {
                    key,
                    processed: true,
                },
            );
        }
    }

    pub fn get(&self, path: &Path) -> Option<CacheEntry> {
        self.entries.get(path).map(|r| *r)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a persisted cache. A missing or unreadable file yields an empty cache.
    pub fn load(file: &Path, enabled: bool) -> Self {
        let detector = Self::new(enabled);
        if !enabled {
            return detector;
        }

        let persisted = fs::read_to_string(file)
            .ok()
            .and_then(|s| serde_json::from_str::<PersistedCache>(&s).ok())
            .filter(|p| p.version == CACHE_VERSION);
        let Some(persisted) = persisted else {
            debug!("cache"; "no usable cache at {}", file.display());
            return detector;
        };

        for (path, hex) in persisted.entries {
            if let Some(key) = CacheKey::from_hex(&hex) {
                detector.commit(Path::new(&path), key);
            }
        }
        debug!("cache"; "loaded {} entries", detector.len());
        detector
    }

    /// Write all committed entries to `file`.
    pub fn persist(&self, file: &Path) -> Result<()> {
        let entries = self
            .entries
            .iter()
            .filter(|e| e.value().processed)
            .map(|e| (e.key().to_string_lossy().into_owned(), e.value().key.to_hex()))
            .collect();
        let persisted = PersistedCache {
            version: CACHE_VERSION,
            entries,
        };

        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&persisted)?;
        fs::write(file, json).with_context(|| format!("failed to write {}", file.display()))?;
        Ok(())
    }
}
