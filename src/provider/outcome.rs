//! Caller-visible outcomes of a submission.

use super::types::ProviderId;
use crate::error::Error;
use crate::storage::{CodeConsumption, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    /// Identity the data was stored under.
    pub provider: ProviderId,
    /// Code use recorded by this submission, if a code was required.
    pub code: Option<CodeConsumption>,
}

/// Reasons a submission is refused.
///
/// Every variant except [`SubmissionError::Internal`] describes a problem
/// with the request itself. Internal failures display a generic message so
/// no detail reaches the caller; the wrapped error is for server-side logs.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// The signature does not match the payload and public key.
    #[error("invalid signature")]
    InvalidSignature,

    /// The signed payload could not be decoded.
    #[error("invalid data")]
    InvalidData,

    /// The signed timestamp is outside the replay window.
    #[error("signature expired")]
    Expired,

    /// A code was required and was missing or unknown.
    #[error("not authorized")]
    NotAuthorized,

    /// Store or crypto library failure.
    #[error("internal server error")]
    Internal(#[source] Error),
}

impl SubmissionError {
    /// Status code reported to the caller.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidSignature | Self::InvalidData => 400,
            Self::Expired => 410,
            Self::NotAuthorized => 401,
            Self::Internal(_) => 500,
        }
    }
}

impl From<Error> for SubmissionError {
    fn from(e: Error) -> Self {
        Self::Internal(e)
    }
}

impl From<StoreError> for SubmissionError {
    fn from(e: StoreError) -> Self {
        Self::Internal(Error::Store(e))
    }
}

/// Response line written back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// HTTP-style status code.
    pub status: u16,
    /// Short human-readable message.
    pub message: String,
}

impl Response {
    /// Acknowledgement response.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: 200,
            message: "ok".to_string(),
        }
    }

    /// Response for a request that could not be parsed at all.
    #[must_use]
    pub fn invalid_request() -> Self {
        Self {
            status: 400,
            message: "invalid request".to_string(),
        }
    }

    /// Returns true for the acknowledgement response.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

impl From<&SubmissionError> for Response {
    fn from(e: &SubmissionError) -> Self {
        Self {
            status: e.status(),
            message: e.to_string(),
        }
    }
}

impl From<&std::result::Result<Acknowledgement, SubmissionError>> for Response {
    fn from(result: &std::result::Result<Acknowledgement, SubmissionError>) -> Self {
        match result {
            Ok(_) => Self::ok(),
            Err(e) => e.into(),
        }
    }
}
