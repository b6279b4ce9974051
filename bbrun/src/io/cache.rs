//! Persistent cache directories and the cache index (`.bbrun/caches.json`).
//!
//! A cache name is bound to one host directory the first time it is used and
//! keeps that directory for as long as the index exists. Concurrent runs
//! against the same cache root are unsupported; nothing here takes a lock.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::core::cache_paths::{CacheSpec, path_slug};
use crate::core::types::Mount;

/// Cache name → host directory identifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct CacheIndex {
    entries: BTreeMap<String, String>,
}

impl CacheIndex {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the identifier for `name`, allocating a fresh one if absent.
    /// Existing entries are never replaced.
    fn get_or_insert(&mut self, name: &str) -> (String, bool) {
        if let Some(id) = self.entries.get(name) {
            return (id.clone(), false);
        }
        let id = Uuid::new_v4().simple().to_string();
        self.entries.insert(name.to_string(), id.clone());
        (id, true)
    }
}

/// Load the cache index; a missing file is an empty index.
pub fn load_cache_index(path: &Path) -> Result<CacheIndex> {
    if !path.exists() {
        return Ok(CacheIndex::default());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read cache index {}", path.display()))?;
    let index: CacheIndex = serde_json::from_str(&contents)
        .with_context(|| format!("parse cache index {}", path.display()))?;
    debug!(path = %path.display(), entries = index.len(), "cache index loaded");
    Ok(index)
}

/// Atomically write the cache index (temp file + rename).
pub fn write_cache_index(path: &Path, index: &CacheIndex) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(index).context("serialize cache index")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("cache index path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp cache index {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace cache index {}", path.display()))?;
    Ok(())
}

/// Maps resolved caches to host directories under `cache_root`.
#[derive(Debug, Clone)]
pub struct CacheStore {
    pub index_path: PathBuf,
    pub cache_root: PathBuf,
}

impl CacheStore {
    pub fn new(index_path: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            cache_root: cache_root.into(),
        }
    }

    /// Produce bind mounts for `caches`, creating host directories on first
    /// use and persisting any new index entries.
    ///
    /// A single-path cache mounts its directory directly; a multi-path cache
    /// mounts one subdirectory per container path.
    #[instrument(skip_all, fields(caches = caches.len()))]
    pub fn mounts(&self, caches: &[CacheSpec]) -> Result<Vec<Mount>> {
        if caches.is_empty() {
            return Ok(Vec::new());
        }
        let mut index = load_cache_index(&self.index_path)?;
        let mut changed = false;
        let mut mounts = Vec::new();

        for cache in caches {
            let (id, created) = index.get_or_insert(&cache.name);
            if created {
                info!(cache = %cache.name, id = %id, "allocated cache directory");
                changed = true;
            }
            let dir = self.cache_root.join(&id);
            for path in &cache.paths {
                let host = if cache.paths.len() == 1 {
                    dir.clone()
                } else {
                    dir.join(path_slug(path))
                };
                fs::create_dir_all(&host)
                    .with_context(|| format!("create cache directory {}", host.display()))?;
                mounts.push(Mount {
                    host,
                    container: path.clone(),
                });
            }
        }

        if changed {
            write_cache_index(&self.index_path, &index)?;
        }
        Ok(mounts)
    }
}
