//! Analysis result cache
//!
//! In-memory cache keyed by image content and settings fingerprints so
//! repeated analyses of the same bytes under the same configuration are
//! free. Content hashing reads only a bounded prefix of the bytes; the
//! length and format are mixed in to keep prefix collisions honest.

use crate::pipeline::AnalysisResult;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::collections::VecDeque;
use tracing::debug;

/// Bytes of the image hashed for the content fingerprint.
const FINGERPRINT_PREFIX: usize = 64 * 1024;

/// Default number of cached analyses before the oldest is evicted.
const DEFAULT_CAPACITY: usize = 100;

/// Fingerprint of image bytes for cache keying.
pub fn content_fingerprint(bytes: &[u8], format: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(&bytes[..bytes.len().min(FINGERPRINT_PREFIX)]);
    hasher.update(bytes.len().to_le_bytes());
    hasher.update(format.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    content: String,
    config: String,
}

/// Bounded insertion-order cache of analysis results.
pub struct AnalysisCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    map: HashMap<CacheKey, AnalysisResult>,
    order: VecDeque<CacheKey>,
    capacity: usize,
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache holding at most `capacity` results, oldest evicted first.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                order: VecDeque::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Look up a result for this content and configuration.
    pub fn get(&self, content: &str, config: &str) -> Option<AnalysisResult> {
        let key = CacheKey {
            content: content.to_string(),
            config: config.to_string(),
        };
        let inner = self.inner.lock();
        let hit = inner.map.get(&key).cloned();
        if hit.is_some() {
            debug!(content = %&content[..content.len().min(12)], "analysis cache hit");
        }
        hit
    }

    /// Store a result, evicting the oldest entry when full.
    pub fn put(&self, content: &str, config: &str, result: AnalysisResult) {
        let key = CacheKey {
            content: content.to_string(),
            config: config.to_string(),
        };
        let mut inner = self.inner.lock();
        if inner.map.insert(key.clone(), result).is_none() {
            inner.order.push_back(key);
            while inner.order.len() > inner.capacity {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.map.remove(&oldest);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all cached results.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.order.clear();
    }
}
