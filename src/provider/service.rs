//! Provider data submission service.
//!
//! Runs one signed submission through a strictly linear sequence and stops
//! at the first failing check:
//!
//! ```text
//! verify signature ─▶ decode payload ─▶ check expiry ─▶ derive identity
//!        │                 │                 │
//!       400               400               410
//!
//! ─▶ verified data exists? ── yes ──────────────────────┐
//!        │ no, codes enabled                            │
//!        ▼                                              ▼
//!    authorize code ── 401                     write unverified data
//!        │                                              │
//!        └──────────────▶ write unverified data ─▶ consume code ─▶ ack
//! ```
//!
//! The service holds no locks and does not coordinate between requests.
//! Every store call is an independent round-trip; a store failure at any
//! step aborts the request with an internal error and earlier writes are
//! not rolled back.

use super::cache::KnownProviderCache;
use super::codes::{CodeGate, PROVIDER_CODES_NAMESPACE};
use super::expiry::{is_expired, DEFAULT_MAX_AGE_SECS};
use super::outcome::{Acknowledgement, SubmissionError};
use super::signature;
use super::types::{ProviderDataRecord, ProviderId, SignedSubmission, SubmissionData};
use crate::event::{NodeEvent, NodeEventsSender};
use crate::storage::{Backend, KeyValueStore, StoreError};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Settings for the submission protocol, fixed for the service's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Require a code from providers without verified data.
    pub codes_enabled: bool,
    /// Uses a code tolerates before it is deleted.
    pub codes_reuse_limit: i64,
    /// Maximum age of a signed request.
    pub max_age: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            codes_enabled: false,
            codes_reuse_limit: 0,
            max_age: Duration::seconds(DEFAULT_MAX_AGE_SECS as i64),
        }
    }
}

/// Accepts signed provider data submissions.
pub struct ProviderDataService {
    verified: Arc<dyn KeyValueStore>,
    unverified: Arc<dyn KeyValueStore>,
    codes: CodeGate,
    known: KnownProviderCache,
    settings: ProviderSettings,
    events: Option<NodeEventsSender>,
}

impl ProviderDataService {
    /// Create a service over the stores of `backend`.
    #[must_use]
    pub fn new(backend: &dyn Backend, settings: ProviderSettings) -> Self {
        info!(
            "Provider data service initialized (codes_enabled={}, reuse_limit={}, max_age={}s)",
            settings.codes_enabled,
            settings.codes_reuse_limit,
            settings.max_age.num_seconds()
        );

        Self {
            verified: backend.verified_provider_data(),
            unverified: backend.unverified_provider_data(),
            codes: CodeGate::new(
                backend.codes(PROVIDER_CODES_NAMESPACE),
                settings.codes_reuse_limit,
            ),
            known: KnownProviderCache::new(),
            settings,
            events: None,
        }
    }

    /// Replace the known-provider cache.
    #[must_use]
    pub fn with_cache(mut self, cache: KnownProviderCache) -> Self {
        self.known = cache;
        self
    }

    /// Emit [`NodeEvent`]s for stored data and retired codes.
    #[must_use]
    pub fn with_events(mut self, events: NodeEventsSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Protocol settings.
    #[must_use]
    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Known-provider cache.
    #[must_use]
    pub fn cache(&self) -> &KnownProviderCache {
        &self.known
    }

    /// Store provider data from a signed submission, checked against the
    /// current time.
    ///
    /// # Errors
    ///
    /// Returns the [`SubmissionError`] for the first check that fails.
    /// Internal errors are logged here before being returned.
    pub async fn store_provider_data(
        &self,
        submission: &SignedSubmission,
    ) -> Result<Acknowledgement, SubmissionError> {
        self.store_provider_data_at(submission, Utc::now()).await
    }

    /// Store provider data, checking expiry against `now`.
    ///
    /// # Errors
    ///
    /// Returns the [`SubmissionError`] for the first check that fails.
    pub async fn store_provider_data_at(
        &self,
        submission: &SignedSubmission,
        now: DateTime<Utc>,
    ) -> Result<Acknowledgement, SubmissionError> {
        let result = self.process(submission, now).await;

        if let Err(SubmissionError::Internal(e)) = &result {
            error!("Provider data submission failed: {e}");
            if let Some(events) = &self.events {
                let _ = events.send(NodeEvent::Error {
                    message: "provider data submission failed".to_string(),
                });
            }
        }

        result
    }

    async fn process(
        &self,
        submission: &SignedSubmission,
        now: DateTime<Utc>,
    ) -> Result<Acknowledgement, SubmissionError> {
        // Only possession of the key is proven here, which is what makes the
        // key hash usable as the storage identity.
        let valid = signature::verify(
            submission.payload_bytes(),
            &submission.signature,
            &submission.public_key,
        )?;
        if !valid {
            debug!("Rejecting submission with invalid signature");
            return Err(SubmissionError::InvalidSignature);
        }

        let SubmissionData {
            timestamp,
            code,
            encrypted_data,
        } = submission.decode_data().map_err(|e| {
            debug!("Rejecting undecodable payload: {e}");
            SubmissionError::InvalidData
        })?;

        if is_expired(timestamp, now, self.settings.max_age) {
            debug!("Rejecting expired submission (timestamp={timestamp})");
            return Err(SubmissionError::Expired);
        }

        let provider = ProviderId::from_public_key(&submission.public_key);

        let verified = self.is_verified(&provider).await?;
        let authorized_code = if self.settings.codes_enabled && !verified {
            Some(self.codes.authorize(code.as_deref()).await?)
        } else {
            None
        };

        let record = ProviderDataRecord { encrypted_data };
        self.unverified
            .set(provider.as_bytes(), record.to_bytes()?)
            .await?;
        debug!("Stored unverified data for provider {provider}");

        let consumption = match authorized_code {
            Some(code) => Some(self.codes.consume(code).await?),
            None => None,
        };

        if let Some(events) = &self.events {
            if consumption.is_some_and(|c| c.retired) {
                let _ = events.send(NodeEvent::CodeRetired {
                    namespace: PROVIDER_CODES_NAMESPACE.to_string(),
                });
            }
            let _ = events.send(NodeEvent::ProviderDataStored {
                provider: provider.to_string(),
            });
        }

        Ok(Acknowledgement {
            provider,
            code: consumption,
        })
    }

    /// Whether the provider already has verified data.
    async fn is_verified(&self, provider: &ProviderId) -> Result<bool, SubmissionError> {
        if self.known.contains(provider) {
            return Ok(true);
        }

        match self.verified.get(provider.as_bytes()).await {
            Ok(_) => {
                self.known.insert(*provider);
                Ok(true)
            }
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
