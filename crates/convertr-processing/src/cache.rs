//! In-memory cache of conversion results
//!
//! Keyed by a SHA-256 over the source bytes, both formats and the options,
//! so identical requests skip the converter entirely. Entries expire after a
//! TTL and the least recently used entry is evicted once the cache is full.

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::traits::ConversionInput;

struct CacheEntry {
    data: Bytes,
    inserted_at: Instant,
}

struct CacheState {
    entries: LruCache<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub total_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub ttl_secs: u64,
}

#[derive(Clone)]
pub struct ConversionCache {
    state: Arc<Mutex<CacheState>>,
    ttl: Duration,
}

impl ConversionCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            })),
            ttl,
        }
    }

    /// Cache key for a conversion request
    pub fn key(input: &ConversionInput) -> String {
        let content_hash = Sha256::digest(&input.data);
        let options = serde_json::to_string(&input.options).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(input.source.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(input.target.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(options.as_bytes());
        hasher.update([0u8]);
        hasher.update(content_hash);
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let lookup = state
            .entries
            .get(key)
            .map(|entry| (entry.data.clone(), entry.inserted_at.elapsed() <= self.ttl));

        match lookup {
            Some((data, true)) => {
                state.hits += 1;
                Some(data)
            }
            Some((_, false)) => {
                state.entries.pop(key);
                state.misses += 1;
                None
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    pub fn insert(&self, key: String, data: Bytes) {
        let mut state = self.state.lock();
        state.entries.put(
            key,
            CacheEntry {
                data,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut state = self.state.lock();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() > self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.entries.pop(key);
        }
        expired.len()
    }

    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.entries.len(),
            max_entries: state.entries.cap().get(),
            total_bytes: state
                .entries
                .iter()
                .map(|(_, entry)| entry.data.len() as u64)
                .sum(),
            hits: state.hits,
            misses: state.misses,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}
