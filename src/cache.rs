//! Persistent response cache keyed by (model, prompt), avoiding repeat paid
//! API calls. One JSON store file, read fully and rewritten fully per
//! operation; the load profile is a single-user CLI, so no index or locking.

use chrono::{DateTime, Duration, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub response: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// File-backed cache of model responses with a fixed per-instance TTL.
///
/// The store file is owned exclusively by this type. A corrupt or unreadable
/// store is treated as empty; write failures are reported on stderr but never
/// propagated, since a failed cache write must not block the answer.
pub struct ResponseCache {
    store_path: PathBuf,
    expiration_seconds: i64,
}

impl ResponseCache {
    pub fn new(store_path: impl Into<PathBuf>, expiration_seconds: i64) -> Self {
        Self {
            store_path: store_path.into(),
            expiration_seconds,
        }
    }

    /// Default store location under the platform cache dir.
    pub fn default_store_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("repoagent")
            .join("responses.json")
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Cached response for this (prompt, model) pair, if present and not past
    /// its expiry. Read-only: expired entries stay on disk until
    /// [`cleanup_expired`](Self::cleanup_expired) runs.
    pub fn get(&self, prompt: &str, model: &str) -> Option<String> {
        let entries = self.load_entries();
        let entry = entries.get(&cache_key(prompt, model))?;
        if Utc::now() > entry.expires_at {
            return None;
        }
        Some(entry.response.clone())
    }

    /// Store a response, overwriting any previous entry for the same key.
    pub fn set(&self, prompt: &str, model: &str, response: &str) {
        let mut entries = self.load_entries();
        let now = Utc::now();
        entries.insert(
            cache_key(prompt, model),
            CacheEntry {
                response: response.to_string(),
                model: model.to_string(),
                created_at: now,
                expires_at: now + Duration::seconds(self.expiration_seconds),
            },
        );
        self.write_entries(&entries);
    }

    /// Delete every entry. Idempotent.
    pub fn clear(&self) {
        if self.store_path.exists() {
            if let Err(err) = fs::remove_file(&self.store_path) {
                eprintln!(
                    "{} {}: {}",
                    "could not clear cache".yellow(),
                    self.store_path.display(),
                    err
                );
            }
        }
    }

    /// Drop exactly the entries whose expiry has passed; valid entries are
    /// carried over untouched.
    pub fn cleanup_expired(&self) {
        if !self.store_path.exists() {
            return;
        }
        let mut entries = self.load_entries();
        let now = Utc::now();
        entries.retain(|_, entry| now <= entry.expires_at);
        self.write_entries(&entries);
    }

    /// Number of live (unexpired) entries.
    pub fn live_entries(&self) -> usize {
        let now = Utc::now();
        self.load_entries()
            .values()
            .filter(|e| now <= e.expires_at)
            .count()
    }

    fn load_entries(&self) -> BTreeMap<String, CacheEntry> {
        let raw = match fs::read_to_string(&self.store_path) {
            Ok(raw) => raw,
            Err(_) => return BTreeMap::new(),
        };
        // Corrupt store = empty cache, never an error.
        serde_json::from_str(&raw).unwrap_or_default()
    }

    fn write_entries(&self, entries: &BTreeMap<String, CacheEntry>) {
        let Some(dir) = self.store_path.parent() else {
            return;
        };
        if fs::create_dir_all(dir).is_err() {
            return;
        }
        let serialized = match serde_json::to_string_pretty(entries) {
            Ok(value) => value,
            Err(_) => return,
        };
        let tmp_name = format!(
            ".tmp-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        );
        let tmp_path = dir.join(tmp_name);
        match fs::write(&tmp_path, serialized) {
            Ok(()) => {
                if let Err(err) = fs::rename(&tmp_path, &self.store_path) {
                    eprintln!(
                        "{} {}: {}",
                        "could not write cache".yellow(),
                        self.store_path.display(),
                        err
                    );
                    let _ = fs::remove_file(&tmp_path);
                }
            }
            Err(err) => {
                eprintln!(
                    "{} {}: {}",
                    "could not write cache".yellow(),
                    self.store_path.display(),
                    err
                );
            }
        }
    }
}

/// Deterministic key for a (model, prompt) pair: SHA-256 over the two joined
/// with a separator, rendered as lowercase hex.
fn cache_key(prompt: &str, model: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update(b":");
    hasher.update(prompt.as_bytes());
    format!("{:x}", hasher.finalize())
}
