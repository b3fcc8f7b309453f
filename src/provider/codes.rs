//! Invitation-code authorization and consumption.
//!
//! A provider without verified data must present a code that exists in the
//! `"provider"` scored set. Each successful submission counts one use; the
//! code is deleted on the use that takes its score past the reuse limit,
//! and that submission still succeeds.
//!
//! ```text
//! has(code)?  ── no ──▶ 401 not authorized
//!     │
//!    yes
//!     ▼
//! write provider data
//!     ▼
//! score + 1 > limit ── yes ──▶ delete code
//!     │
//!     no ──▶ persist score
//! ```

use super::outcome::SubmissionError;
use crate::storage::{CodeConsumption, ScoredSet};
use std::sync::Arc;
use tracing::debug;

/// Namespace of the codes that admit new providers.
pub const PROVIDER_CODES_NAMESPACE: &str = "provider";

/// Authorizes and consumes codes from one scored set.
pub struct CodeGate {
    codes: Arc<dyn ScoredSet>,
    reuse_limit: i64,
}

impl CodeGate {
    /// Create a gate over `codes` with the given reuse limit.
    #[must_use]
    pub fn new(codes: Arc<dyn ScoredSet>, reuse_limit: i64) -> Self {
        Self { codes, reuse_limit }
    }

    /// Check that `code` is present and still live.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError::NotAuthorized`] if the code is missing or
    /// unknown, and [`SubmissionError::Internal`] if the store fails.
    pub async fn authorize<'a>(&self, code: Option<&'a [u8]>) -> Result<&'a [u8], SubmissionError> {
        let Some(code) = code else {
            debug!("Submission carries no code");
            return Err(SubmissionError::NotAuthorized);
        };

        if self.codes.has(code).await? {
            Ok(code)
        } else {
            debug!("Submission carries an unknown code");
            Err(SubmissionError::NotAuthorized)
        }
    }

    /// Count one use of an authorized code.
    ///
    /// Membership was tested in a separate round-trip by [`Self::authorize`];
    /// unless the store overrides [`ScoredSet::consume`] atomically,
    /// concurrent submissions with the same code can overshoot the limit.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError::Internal`] if the store fails.
    pub async fn consume(&self, code: &[u8]) -> Result<CodeConsumption, SubmissionError> {
        let consumption = self.codes.consume(code, self.reuse_limit).await?;
        debug!(
            "Code use recorded (score={}, retired={})",
            consumption.score, consumption.retired
        );
        Ok(consumption)
    }

    /// Configured reuse limit.
    #[must_use]
    pub fn reuse_limit(&self) -> i64 {
        self.reuse_limit
    }
}
