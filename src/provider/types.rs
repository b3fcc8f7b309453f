//! Wire and storage types for provider-data submissions.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Provider identity: SHA-256 of the provider's public key bytes.
///
/// The identity names a provider; it proves nothing about who holds the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderId([u8; 32]);

impl ProviderId {
    /// Derive the identity for a public key.
    #[must_use]
    pub fn from_public_key(public_key: &[u8]) -> Self {
        Self(Sha256::digest(public_key).into())
    }

    /// Raw identity bytes, used as the storage key.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Signed envelope as received from a provider.
///
/// `data` is the exact JSON text the signature covers; it is only decoded
/// once the signature has been checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedSubmission {
    /// Canonical payload text.
    pub data: String,
    /// Detached ML-DSA-65 signature over `data`.
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
    /// Provider public key.
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
}

impl SignedSubmission {
    /// Sign `data` with a provider key pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized or the secret key
    /// is invalid.
    pub fn sign(data: &SubmissionData, public_key: &[u8], secret_key: &[u8]) -> Result<Self> {
        let data = data.to_canonical()?;
        let signature = super::signature::sign(data.as_bytes(), secret_key)?;
        Ok(Self {
            data,
            signature,
            public_key: public_key.to_vec(),
        })
    }

    /// Bytes covered by the signature.
    #[must_use]
    pub fn payload_bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }

    /// Decode the signed payload.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is not a valid [`SubmissionData`] document.
    pub fn decode_data(&self) -> Result<SubmissionData> {
        serde_json::from_str(&self.data).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Decoded submission payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionData {
    /// Unix timestamp (seconds) at which the provider signed the request.
    pub timestamp: i64,
    /// Invitation code, required for providers not yet verified.
    #[serde(default, with = "hex_bytes::option", skip_serializing_if = "Option::is_none")]
    pub code: Option<Vec<u8>>,
    /// Provider data ciphertext. Never inspected by this node.
    #[serde(with = "hex_bytes")]
    pub encrypted_data: Vec<u8>,
}

impl SubmissionData {
    /// Serialize to the canonical JSON text that gets signed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_canonical(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Provider data record as held in the provider data stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDataRecord {
    /// Provider data ciphertext.
    pub encrypted_data: Vec<u8>,
}

impl ProviderDataRecord {
    /// Encode for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if MessagePack encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode from storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Hex (de)serialization for byte fields.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(b) => serializer.serialize_str(&hex::encode(b)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
