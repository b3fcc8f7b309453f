//! Store traits shared by every backend.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors returned by backend stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The key or token has no entry. This is a normal outcome, not a failure.
    #[error("not found")]
    NotFound,

    /// The backend failed for a reason unrelated to the caller's input.
    #[error("backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns true for the distinguished "not found" outcome.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Outcome of consuming one use of a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeConsumption {
    /// Score after this use was counted.
    pub score: i64,
    /// The code exceeded its reuse limit and was deleted.
    pub retired: bool,
}

/// Key-value store with an explicit "not found" outcome.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns [`StoreError::NotFound`] when the key is absent.
    async fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>>;

    /// Write `value` under `key`, replacing any previous value.
    async fn set(&self, key: &[u8], value: Vec<u8>) -> StoreResult<()>;
}

/// A set of tokens, each carrying an integer score.
#[async_trait]
pub trait ScoredSet: Send + Sync {
    /// Membership test.
    async fn has(&self, token: &[u8]) -> StoreResult<bool>;

    /// Current score of `token`, or [`StoreError::NotFound`].
    async fn score(&self, token: &[u8]) -> StoreResult<i64>;

    /// Add `delta` to the score of `token`.
    ///
    /// Returns [`StoreError::NotFound`] when the token is absent; a deleted
    /// token is never re-created.
    async fn add_to_score(&self, token: &[u8], delta: i64) -> StoreResult<()>;

    /// Remove `token` from the set.
    async fn del(&self, token: &[u8]) -> StoreResult<()>;

    /// Count one use of `token`, deleting it once its score exceeds `limit`.
    ///
    /// The provided implementation issues independent round-trips (score,
    /// then delete or increment). A token without a score counts as 0. Two
    /// concurrent callers can both read the same score, so the limit may be
    /// overshot. If the token is deleted before the increment lands, it was
    /// retired by a concurrent use and is reported as retired. Backends with
    /// an atomic compare-and-increment should override this.
    async fn consume(&self, token: &[u8], limit: i64) -> StoreResult<CodeConsumption> {
        let current = match self.score(token).await {
            Ok(score) => score,
            Err(StoreError::NotFound) => 0,
            Err(e) => return Err(e),
        };

        let score = current.saturating_add(1);

        if score > limit {
            self.del(token).await?;
            return Ok(CodeConsumption {
                score,
                retired: true,
            });
        }

        match self.add_to_score(token, 1).await {
            Ok(()) => Ok(CodeConsumption {
                score,
                retired: false,
            }),
            Err(StoreError::NotFound) => Ok(CodeConsumption {
                score: limit.saturating_add(1),
                retired: true,
            }),
            Err(e) => Err(e),
        }
    }
}

/// The logical stores the submission protocol depends on.
pub trait Backend: Send + Sync {
    /// Provider data promoted by the external verification pipeline.
    fn verified_provider_data(&self) -> Arc<dyn KeyValueStore>;

    /// Provider data as submitted, awaiting verification.
    fn unverified_provider_data(&self) -> Arc<dyn KeyValueStore>;

    /// Scored set of codes for the given namespace (e.g. `"provider"`).
    fn codes(&self, namespace: &str) -> Arc<dyn ScoredSet>;
}
