//! Configuration for appointments-node.

use crate::error::{Error, Result};
use crate::provider::{ProviderSettings, DEFAULT_CACHE_CAPACITY, DEFAULT_MAX_AGE_SECS};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address the submission listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Capacity of the known-provider cache (0 disables it).
    #[serde(default = "default_cache_capacity")]
    pub verified_cache_capacity: usize,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Mutual TLS material. Required to serve submissions.
    #[serde(default)]
    pub tls: Option<TlsSettings>,

    /// Provider code configuration.
    #[serde(default)]
    pub provider_codes: ProviderCodesConfig,

    /// Signature freshness configuration.
    #[serde(default)]
    pub signature: SignatureConfig,
}

/// Certificate material for the mutual TLS channel (PEM files).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsSettings {
    /// Certificate chain presented by this node.
    pub certificate_file: PathBuf,
    /// Private key matching `certificate_file`.
    pub key_file: PathBuf,
    /// CA bundle trusted for client certificates and as the root for peers.
    pub ca_certificate_file: PathBuf,
}

/// Provider code configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCodesConfig {
    /// Require an invitation code from unverified providers.
    #[serde(default)]
    pub enabled: bool,

    /// Uses a code tolerates before it is deleted.
    #[serde(default)]
    pub reuse_limit: u32,

    /// Hex-encoded codes, one per line, loaded into the code set at startup.
    #[serde(default)]
    pub codes_file: Option<PathBuf>,
}

/// Signature freshness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureConfig {
    /// Maximum age of a signed request in seconds.
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            tls: None,
            provider_codes: ProviderCodesConfig::default(),
            signature: SignatureConfig::default(),
            verified_cache_capacity: default_cache_capacity(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9443))
}

const fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_max_age() -> u64 {
    DEFAULT_MAX_AGE_SECS
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Settings for the submission protocol.
    ///
    /// # Errors
    ///
    /// Returns an error if the maximum signature age is out of range, i.e.
    /// subtracting it from the current time leaves the representable dates.
    pub fn provider_settings(&self) -> Result<ProviderSettings> {
        let max_age = i64::try_from(self.signature.max_age_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .filter(|age| chrono::Utc::now().checked_sub_signed(*age).is_some())
            .ok_or_else(|| {
                Error::Config(format!(
                    "signature.max_age_secs out of range: {}",
                    self.signature.max_age_secs
                ))
            })?;

        Ok(ProviderSettings {
            codes_enabled: self.provider_codes.enabled,
            codes_reuse_limit: i64::from(self.provider_codes.reuse_limit),
            max_age,
        })
    }
}
