//! Signed provider-data submissions.
//!
//! A provider proves possession of an ML-DSA-65 key by signing its payload.
//! The SHA-256 of that key is the provider's identity and the key under which
//! its encrypted data is stored. Providers that have not yet been verified
//! need a limited-use invitation code to submit.
//!
//! # Architecture
//!
//! ```text
//! SignedSubmission
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ signature + expiry  │── 400 / 410
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ verified provider?  │── cache, then verified store
//! └─────────┬───────────┘
//!      ┌────┴────┐
//!     YES        NO
//!      │         ▼
//!      │   ┌───────────┐
//!      │   │ code gate │── 401
//!      │   └─────┬─────┘
//!      ▼         ▼
//!   write unverified data ─▶ consume code ─▶ ack
//! ```

mod cache;
mod codes;
mod expiry;
mod outcome;
mod service;
pub mod signature;
mod types;

pub use cache::{CacheStats, KnownProviderCache, DEFAULT_CACHE_CAPACITY};
pub use codes::{CodeGate, PROVIDER_CODES_NAMESPACE};
pub use expiry::{is_expired, DEFAULT_MAX_AGE_SECS};
pub use outcome::{Acknowledgement, Response, SubmissionError};
pub use service::{ProviderDataService, ProviderSettings};
pub use types::{ProviderDataRecord, ProviderId, SignedSubmission, SubmissionData};
