//! Command-line interface definition.

use appointments_node::config::{NodeConfig, TlsSettings};
use clap::Parser;
use color_eyre::eyre::bail;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Accepts signed, encrypted provider data over mutual TLS.
#[derive(Parser, Debug)]
#[command(name = "appointments-node")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address the submission listener binds to.
    #[arg(long, short, env = "APPOINTMENTS_LISTEN_ADDR")]
    pub listen_addr: Option<SocketAddr>,

    /// Certificate chain presented by the node (PEM).
    #[arg(long, env = "APPOINTMENTS_TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    /// Private key for the node certificate (PEM).
    #[arg(long, env = "APPOINTMENTS_TLS_KEY")]
    pub tls_key: Option<PathBuf>,

    /// CA bundle trusted for client certificates (PEM).
    #[arg(long, env = "APPOINTMENTS_TLS_CA")]
    pub tls_ca: Option<PathBuf>,

    /// Require an invitation code from unverified providers.
    #[arg(long, env = "APPOINTMENTS_PROVIDER_CODES")]
    pub provider_codes: bool,

    /// Uses a provider code tolerates before it is deleted.
    #[arg(long, env = "APPOINTMENTS_REUSE_LIMIT")]
    pub reuse_limit: Option<u32>,

    /// File of hex provider codes to load at startup.
    #[arg(long, env = "APPOINTMENTS_CODES_FILE")]
    pub codes_file: Option<PathBuf>,

    /// Maximum age of a signed request in seconds.
    #[arg(long, env = "APPOINTMENTS_MAX_AGE")]
    pub max_age: Option<u64>,

    /// Log level. Overrides `log_level` from the config file; `RUST_LOG`
    /// overrides both.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "APPOINTMENTS_JSON_LOGS")]
    pub json_logs: bool,

    /// Path to configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Convert CLI arguments into a NodeConfig.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded,
    /// or if only some of the TLS paths are given.
    pub fn into_config(self) -> color_eyre::Result<NodeConfig> {
        let mut config = if let Some(ref path) = self.config {
            NodeConfig::from_file(path)?
        } else {
            NodeConfig::default()
        };

        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }

        match (self.tls_cert, self.tls_key, self.tls_ca) {
            (Some(certificate_file), Some(key_file), Some(ca_certificate_file)) => {
                config.tls = Some(TlsSettings {
                    certificate_file,
                    key_file,
                    ca_certificate_file,
                });
            }
            (None, None, None) => {}
            _ => bail!("--tls-cert, --tls-key and --tls-ca must be given together"),
        }

        if self.provider_codes {
            config.provider_codes.enabled = true;
        }
        if let Some(limit) = self.reuse_limit {
            config.provider_codes.reuse_limit = limit;
        }
        if self.codes_file.is_some() {
            config.provider_codes.codes_file = self.codes_file;
        }
        if let Some(secs) = self.max_age {
            config.signature.max_age_secs = secs;
        }

        Ok(config)
    }
}
