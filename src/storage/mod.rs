//! Backend store abstraction.
//!
//! The submission protocol talks to three logical stores:
//!
//! ```text
//! verified_provider_data[provider_id]   -> record   (read-only here)
//! unverified_provider_data[provider_id] -> record   (written on submit)
//! codes("provider")[token]              -> score    (scored set)
//! ```
//!
//! There is no transactional scope across keys. Every call is an independent
//! round-trip, and callers must treat [`StoreError::NotFound`] as an expected
//! outcome rather than a failure.

mod memory;
mod traits;

pub use memory::{MemoryBackend, MemoryScoredSet, MemoryStore};
pub use traits::{Backend, CodeConsumption, KeyValueStore, ScoredSet, StoreError, StoreResult};
