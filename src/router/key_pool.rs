//! API Key Pool Management
//!
//! Round-robin rotation over a fixed set of keys, skipping keys that
//! upstream recently rejected.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{RelayError, Result};

/// A single API key with usage tracking
pub struct ApiKey {
    /// Position in the pool, used to refer to the key in logs
    index: usize,

    /// The actual API key value
    value: String,

    /// Number of times this key was handed out
    selections: AtomicU64,
}

impl ApiKey {
    fn new(index: usize, value: String) -> Self {
        Self {
            index,
            value,
            selections: AtomicU64::new(0),
        }
    }

    /// Position of the key in the pool
    pub fn index(&self) -> usize {
        self.index
    }

    /// Get the key value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Number of times this key was selected
    pub fn selections(&self) -> u64 {
        self.selections.load(Ordering::Relaxed)
    }

    fn record_selection(&self) {
        self.selections.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("index", &self.index)
            .field("value", &"[REDACTED]")
            .field("selections", &self.selections())
            .finish()
    }
}

/// Mutable rotation state, only touched under the pool's lock
#[derive(Default)]
struct RotationState {
    /// Next candidate index, always in `[0, keys.len())`
    cursor: usize,

    /// Key values upstream rejected with 401/403
    failed: HashSet<String>,
}

impl fmt::Debug for RotationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotationState")
            .field("cursor", &self.cursor)
            .field("failed", &self.failed.len())
            .finish()
    }
}

/// Pool of API keys with rotation support
#[derive(Debug)]
pub struct KeyPool {
    /// Available keys, fixed after construction
    keys: Vec<ApiKey>,

    state: Mutex<RotationState>,
}

impl KeyPool {
    /// Create a new key pool. Fails if `keys` is empty.
    pub fn new(keys: Vec<String>) -> Result<Self> {
        if keys.is_empty() {
            return Err(RelayError::NoKeysConfigured);
        }

        Ok(Self {
            keys: keys
                .into_iter()
                .enumerate()
                .map(|(i, k)| ApiKey::new(i, k))
                .collect(),
            state: Mutex::new(RotationState::default()),
        })
    }

    /// Get the number of keys in the pool
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false; an empty pool cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Get the next usable key.
    ///
    /// Always returns a key: a fully failed pool is reset before the scan,
    /// and a scan that still finds nothing falls back to the first key.
    pub fn select_key(&self) -> &ApiKey {
        let len = self.keys.len();
        let mut state = self.state.lock();

        if state.failed.len() >= len {
            tracing::debug!(keys = len, "All keys marked failed, resetting");
            state.failed.clear();
        }

        for _ in 0..len {
            let key = &self.keys[state.cursor];
            state.cursor = (state.cursor + 1) % len;

            if !state.failed.contains(key.value()) {
                key.record_selection();
                return key;
            }
        }

        state.failed.clear();
        let key = &self.keys[0];
        key.record_selection();
        key
    }

    /// Exclude a key from selection after an authorization failure
    pub fn mark_failed(&self, key: &ApiKey) {
        let mut state = self.state.lock();
        if state.failed.insert(key.value().to_string()) {
            tracing::warn!(
                key_index = key.index(),
                failed = state.failed.len(),
                total = self.keys.len(),
                "API key rejected by upstream"
            );
        }
    }

    #[cfg(test)]
    fn is_failed(&self, value: &str) -> bool {
        self.state.lock().failed.contains(value)
    }

    /// Get statistics about the pool
    pub fn stats(&self) -> KeyPoolStats {
        let state = self.state.lock();
        KeyPoolStats {
            total_keys: self.keys.len(),
            failed_keys: state.failed.len(),
            cursor: state.cursor,
            total_selections: self.keys.iter().map(|k| k.selections()).sum(),
        }
    }
}

/// Statistics about a key pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPoolStats {
    pub total_keys: usize,
    pub failed_keys: usize,
    pub cursor: usize,
    pub total_selections: u64,
}
