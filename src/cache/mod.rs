//! Local response cache (edge mode only).
//!
//! Stores response bodies on disk, keyed by request path, with an in-memory
//! index for lookups. The proxy stores successful GET responses and serves
//! them back when no remote endpoint is reachable; the GC manager sweeps
//! entries past their age limit.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use thiserror::Error;

use crate::config::CacheConfig;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to prepare cache root {root}: {source}")]
    Root {
        root: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write cache entry {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
struct CacheEntry {
    path: PathBuf,
    stored_at: SystemTime,
}

/// Disk-backed response cache with an in-memory index.
pub struct CacheManager {
    root: PathBuf,
    index: DashMap<String, CacheEntry>,
    max_entry_bytes: usize,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("root", &self.root)
            .field("max_entry_bytes", &self.max_entry_bytes)
            .finish_non_exhaustive()
    }
}

impl CacheManager {
    /// Open the cache, creating the root directory and rebuilding the index
    /// from entries that survived a previous run.
    pub fn open(config: &CacheConfig) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&config.root_dir).map_err(|source| CacheError::Root {
            root: config.root_dir.display().to_string(),
            source,
        })?;

        let index = DashMap::new();
        let entries = std::fs::read_dir(&config.root_dir).map_err(|source| CacheError::Root {
            root: config.root_dir.display().to_string(),
            source,
        })?;
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(key) = decode_key(name) else {
                continue;
            };
            let stored_at = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or_else(|_| SystemTime::now());
            index.insert(
                key,
                CacheEntry {
                    path: entry.path(),
                    stored_at,
                },
            );
        }

        let manager = Self {
            root: config.root_dir.clone(),
            index,
            max_entry_bytes: config.max_entry_bytes,
        };
        tracing::info!(
            root = %manager.root.display(),
            entries = manager.len(),
            "local cache opened"
        );
        Ok(manager)
    }

    /// Largest body this cache accepts.
    pub fn max_entry_bytes(&self) -> usize {
        self.max_entry_bytes
    }

    /// Store one response body. Oversized bodies are rejected by callers
    /// before reaching this point.
    pub async fn store(&self, key: &str, body: &[u8]) -> Result<(), CacheError> {
        let path = self.root.join(encode_key(key));
        tokio::fs::write(&path, body)
            .await
            .map_err(|source| CacheError::Write {
                key: key.to_string(),
                source,
            })?;
        self.index.insert(
            key.to_string(),
            CacheEntry {
                path,
                stored_at: SystemTime::now(),
            },
        );
        metrics::record_cache_entries(self.len());
        Ok(())
    }

    /// Load a cached body, dropping the index entry if the file is gone.
    pub async fn load(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.index.get(key)?.path.clone();
        match tokio::fs::read(&path).await {
            Ok(body) => Some(body),
            Err(_) => {
                self.index.remove(key);
                None
            }
        }
    }

    /// Remove one entry. Returns whether it existed in the index.
    pub async fn remove(&self, key: &str) -> bool {
        let Some((_, entry)) = self.index.remove(key) else {
            return false;
        };
        if let Err(e) = tokio::fs::remove_file(&entry.path).await {
            tracing::debug!(key, error = %e, "cache file already gone");
        }
        metrics::record_cache_entries(self.len());
        true
    }

    /// Keys of entries stored longer ago than `age`.
    pub fn keys_older_than(&self, age: Duration) -> Vec<String> {
        let now = SystemTime::now();
        self.index
            .iter()
            .filter(|entry| {
                now.duration_since(entry.value().stored_at)
                    .map(|elapsed| elapsed >= age)
                    .unwrap_or(false)
            })
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Keys are arbitrary request paths; file names are their hex form.
fn encode_key(key: &str) -> String {
    key.bytes().fold(String::new(), |mut out, b| {
        out.push_str(&format!("{b:02x}"));
        out
    })
}

fn decode_key(name: &str) -> Option<String> {
    if name.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(name.len() / 2);
    for chunk in name.as_bytes().chunks(2) {
        let pair = std::str::from_utf8(chunk).ok()?;
        bytes.push(u8::from_str_radix(pair, 16).ok()?);
    }
    String::from_utf8(bytes).ok()
}
