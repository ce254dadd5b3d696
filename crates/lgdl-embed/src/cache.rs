//! Versioned, disk-backed vector cache.
//!
//! Keyed by `(text_hash, model_name, model_version)` so that swapping the
//! embedding provider never returns a vector produced by a different one:
//! a lookup under a model/version the cache wasn't built with is a clean
//! miss, not a corrupted hit. Fails closed on version mismatch rather
//! than ever serving a stale vector.
//!
//! Writes are appended as one JSON object per line and fsynced before the
//! call returns, the same write-ahead-then-apply style as
//! `ob-workflow::engine` (persist the transition before acting on it): a
//! crash mid-write leaves the file with a trailing partial line, which the
//! loader simply discards, never a torn entry mistaken for a whole one.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub text_hash: String,
    pub model_name: String,
    pub model_version: u32,
}

impl CacheKey {
    pub fn new(text: &str, model_name: &str, model_version: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Self {
            text_hash: hex::encode(hasher.finalize()),
            model_name: model_name.to_string(),
            model_version,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    key: CacheKey,
    vector: Vec<f32>,
}

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("failed to open cache file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write cache entry: {0}")]
    Write(#[source] std::io::Error),
}

pub struct VectorCache {
    path: Option<PathBuf>,
    entries: Mutex<HashMap<CacheKey, Vec<f32>>>,
}

impl VectorCache {
    /// An in-memory-only cache, useful for tests and for callers that
    /// don't want cross-process persistence.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Load (or create) a durable cache backed by a JSON-lines file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let mut entries = HashMap::new();

        if path.exists() {
            let file = File::open(&path).map_err(|source| CacheError::Open {
                path: path.clone(),
                source,
            })?;
            for line in BufReader::new(file).lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                // A truncated trailing line from a crashed write is simply
                // not valid JSON; skip it rather than fail the whole load.
                if let Ok(record) = serde_json::from_str::<CacheRecord>(&line) {
                    entries.insert(record.key, record.vector);
                }
            }
        }

        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<f32>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: CacheKey, vector: Vec<f32>) -> Result<(), CacheError> {
        if let Some(path) = &self.path {
            let record = CacheRecord {
                key: key.clone(),
                vector: vector.clone(),
            };
            let line = serde_json::to_string(&record).expect("CacheRecord always serializes");
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| CacheError::Open {
                    path: path.clone(),
                    source,
                })?;
            writeln!(file, "{line}").map_err(CacheError::Write)?;
            file.sync_data().map_err(CacheError::Write)?;
        }
        self.entries.lock().unwrap().insert(key, vector);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
