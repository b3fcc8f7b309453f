//! In-memory backend.
//!
//! Every store is guarded by a `parking_lot` lock, which makes each
//! operation linearizable per key. Nothing is persisted across restarts.

use super::traits::{
    Backend, CodeConsumption, KeyValueStore, ScoredSet, StoreError, StoreResult,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// In-memory key-value store.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn set(&self, key: &[u8], value: Vec<u8>) -> StoreResult<()> {
        self.entries.write().insert(key.to_vec(), value);
        Ok(())
    }
}

/// In-memory scored set.
#[derive(Default)]
pub struct MemoryScoredSet {
    scores: Mutex<HashMap<Vec<u8>, i64>>,
}

impl MemoryScoredSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a token with score 0.
    ///
    /// Codes are issued outside the submission protocol; this is the hook
    /// operators and tests use to seed them. An existing token keeps its score.
    pub fn insert(&self, token: &[u8]) {
        self.scores.lock().entry(token.to_vec()).or_insert(0);
    }

    /// Number of live tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.lock().len()
    }

    /// Check if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.lock().is_empty()
    }
}

#[async_trait]
impl ScoredSet for MemoryScoredSet {
    async fn has(&self, token: &[u8]) -> StoreResult<bool> {
        Ok(self.scores.lock().contains_key(token))
    }

    async fn score(&self, token: &[u8]) -> StoreResult<i64> {
        self.scores
            .lock()
            .get(token)
            .copied()
            .ok_or(StoreError::NotFound)
    }

    async fn add_to_score(&self, token: &[u8], delta: i64) -> StoreResult<()> {
        let mut scores = self.scores.lock();
        let score = scores.get_mut(token).ok_or(StoreError::NotFound)?;
        *score = score.saturating_add(delta);
        Ok(())
    }

    async fn del(&self, token: &[u8]) -> StoreResult<()> {
        self.scores.lock().remove(token);
        Ok(())
    }

    /// Atomic under the set lock, so concurrent uses never overshoot `limit`.
    ///
    /// A token deleted by a concurrent consumer is reported as retired and is
    /// not re-created.
    async fn consume(&self, token: &[u8], limit: i64) -> StoreResult<CodeConsumption> {
        let mut scores = self.scores.lock();

        let Some(current) = scores.get(token).copied() else {
            debug!("Code already retired by a concurrent submission");
            return Ok(CodeConsumption {
                score: limit.saturating_add(1),
                retired: true,
            });
        };

        let score = current + 1;
        if score > limit {
            scores.remove(token);
            Ok(CodeConsumption {
                score,
                retired: true,
            })
        } else {
            scores.insert(token.to_vec(), score);
            Ok(CodeConsumption {
                score,
                retired: false,
            })
        }
    }
}

/// Backend holding every logical store in memory.
#[derive(Default)]
pub struct MemoryBackend {
    verified: Arc<MemoryStore>,
    unverified: Arc<MemoryStore>,
    codes: Mutex<HashMap<String, Arc<MemoryScoredSet>>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete handle to the verified store.
    #[must_use]
    pub fn verified_store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.verified)
    }

    /// Concrete handle to the unverified store.
    #[must_use]
    pub fn unverified_store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.unverified)
    }

    /// Concrete handle to a code namespace, created on first use.
    #[must_use]
    pub fn code_set(&self, namespace: &str) -> Arc<MemoryScoredSet> {
        let mut codes = self.codes.lock();
        Arc::clone(codes.entry(namespace.to_string()).or_default())
    }
}

impl Backend for MemoryBackend {
    fn verified_provider_data(&self) -> Arc<dyn KeyValueStore> {
        self.verified_store()
    }

    fn unverified_provider_data(&self) -> Arc<dyn KeyValueStore> {
        self.unverified_store()
    }

    fn codes(&self, namespace: &str) -> Arc<dyn ScoredSet> {
        self.code_set(namespace)
    }
}
