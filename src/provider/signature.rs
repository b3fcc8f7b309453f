//! ML-DSA signature verification for provider submissions.
//!
//! Providers sign the canonical payload with FIPS 204 ML-DSA-65. Only
//! possession of the private key is checked; there is no certificate chain
//! or other binding of the key to an external identity.

use crate::error::{Error, Result};
use saorsa_pqc::api::sig::{ml_dsa_65, MlDsaPublicKey, MlDsaSecretKey, MlDsaSignature, MlDsaVariant};
use tracing::debug;

/// Signing context for domain separation (prevents cross-protocol attacks).
pub const SIGNING_CONTEXT: &[u8] = b"appointments-provider-data-v1";

/// ML-DSA-65 signature size in bytes.
pub const SIGNATURE_SIZE: usize = 3309;

/// ML-DSA-65 public key size in bytes.
pub const PUBLIC_KEY_SIZE: usize = 1952;

/// Verify a detached signature over `payload`.
///
/// A well-formed signature that does not match, or a signature that cannot be
/// parsed, yields `Ok(false)`.
///
/// # Errors
///
/// Returns an error if the public key is malformed.
pub fn verify(payload: &[u8], signature: &[u8], public_key: &[u8]) -> Result<bool> {
    if public_key.len() != PUBLIC_KEY_SIZE {
        return Err(Error::Crypto(format!(
            "Invalid public key size: expected {PUBLIC_KEY_SIZE}, got {}",
            public_key.len()
        )));
    }

    let public_key = MlDsaPublicKey::from_bytes(MlDsaVariant::MlDsa65, public_key)
        .map_err(|e| Error::Crypto(format!("Invalid public key: {e}")))?;

    if signature.len() != SIGNATURE_SIZE {
        debug!(
            "Rejecting signature of size {} (expected {SIGNATURE_SIZE})",
            signature.len()
        );
        return Ok(false);
    }

    let Ok(sig) = MlDsaSignature::from_bytes(MlDsaVariant::MlDsa65, signature) else {
        debug!("Rejecting unparseable signature");
        return Ok(false);
    };

    match ml_dsa_65().verify_with_context(&public_key, payload, &sig, SIGNING_CONTEXT) {
        Ok(valid) => Ok(valid),
        Err(e) => {
            debug!("Signature verification error: {e}");
            Ok(false)
        }
    }
}

/// Sign `payload` with a provider secret key.
///
/// Used by provider tooling; the node itself never signs.
///
/// # Errors
///
/// Returns an error if the secret key is malformed or signing fails.
pub fn sign(payload: &[u8], secret_key: &[u8]) -> Result<Vec<u8>> {
    let secret_key = MlDsaSecretKey::from_bytes(MlDsaVariant::MlDsa65, secret_key)
        .map_err(|e| Error::Crypto(format!("Invalid secret key: {e}")))?;

    let signature = ml_dsa_65()
        .sign_with_context(&secret_key, payload, SIGNING_CONTEXT)
        .map_err(|e| Error::Crypto(format!("Signing failed: {e}")))?;

    Ok(signature.to_bytes())
}

/// Generate a fresh provider key pair, returned as `(public, secret)` bytes.
///
/// # Errors
///
/// Returns an error if key generation fails.
pub fn generate_keypair() -> Result<(Vec<u8>, Vec<u8>)> {
    let (public_key, secret_key) = ml_dsa_65()
        .generate_keypair()
        .map_err(|e| Error::Crypto(format!("Key generation failed: {e}")))?;

    Ok((public_key.to_bytes(), secret_key.to_bytes()))
}
