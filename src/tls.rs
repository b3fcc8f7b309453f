//! Mutual TLS configuration for the submission channel.
//!
//! Both sides load the same three PEM files: a certificate chain, its private
//! key, and a CA bundle. The CA bundle verifies client certificates on the
//! server and is the trust root for the server's certificate on the client.
//! Cipher suites are restricted to AES-128-GCM with forward secrecy.

use crate::config::TlsSettings;
use crate::error::{Error, Result};
use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig, SupportedProtocolVersion};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Protocol versions offered on the submission channel.
pub const PROTOCOL_VERSIONS: &[&SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];

/// Crypto provider limited to the allowed cipher suites.
#[must_use]
pub fn crypto_provider() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: vec![
            ring::cipher_suite::TLS13_AES_128_GCM_SHA256,
            ring::cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            ring::cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
        ],
        ..ring::default_provider()
    }
}

/// Server configuration that requires and verifies client certificates.
///
/// # Errors
///
/// Returns an error if any PEM file cannot be loaded or the key does not
/// match the certificate.
pub fn server_config(settings: &TlsSettings) -> Result<Arc<ServerConfig>> {
    let provider = Arc::new(crypto_provider());
    let roots = Arc::new(load_ca(&settings.ca_certificate_file)?);

    let verifier = WebPkiClientVerifier::builder_with_provider(roots, Arc::clone(&provider))
        .build()
        .map_err(|e| Error::Tls(format!("Invalid client verifier: {e}")))?;

    let mut config = ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(PROTOCOL_VERSIONS)?
        .with_client_cert_verifier(verifier)
        .with_single_cert(
            load_certificates(&settings.certificate_file)?,
            load_private_key(&settings.key_file)?,
        )?;
    config.ignore_client_order = true;

    debug!(
        "TLS server config loaded from {}",
        settings.certificate_file.display()
    );
    Ok(Arc::new(config))
}

/// Client side of the channel, with the expected server name.
#[derive(Clone)]
pub struct TlsClient {
    config: Arc<ClientConfig>,
    server_name: ServerName<'static>,
}

impl TlsClient {
    /// Build a client that presents its certificate and expects the server
    /// to identify as `server_name`, regardless of the address dialled.
    ///
    /// # Errors
    ///
    /// Returns an error if any PEM file cannot be loaded or `server_name` is
    /// not a valid DNS name or IP address.
    pub fn new(settings: &TlsSettings, server_name: &str) -> Result<Self> {
        let roots = load_ca(&settings.ca_certificate_file)?;

        let config = ClientConfig::builder_with_provider(Arc::new(crypto_provider()))
            .with_protocol_versions(PROTOCOL_VERSIONS)?
            .with_root_certificates(roots)
            .with_client_auth_cert(
                load_certificates(&settings.certificate_file)?,
                load_private_key(&settings.key_file)?,
            )?;

        let server_name = ServerName::try_from(server_name.to_string())
            .map_err(|e| Error::Tls(format!("Invalid server name '{server_name}': {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            server_name,
        })
    }

    /// Expected server name.
    #[must_use]
    pub fn server_name(&self) -> &ServerName<'static> {
        &self.server_name
    }

    /// Underlying rustls configuration.
    #[must_use]
    pub fn config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.config)
    }

    /// Open a TLS connection to `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection or the handshake fails.
    pub async fn connect(&self, addr: SocketAddr) -> Result<TlsStream<TcpStream>> {
        let stream = TcpStream::connect(addr).await?;
        let connector = TlsConnector::from(Arc::clone(&self.config));
        Ok(connector.connect(self.server_name.clone(), stream).await?)
    }
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|e| Error::Tls(format!("Cannot read {}: {e}", path.display())))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Tls(format!("Invalid certificate in {}: {e}", path.display())))?;

    if certs.is_empty() {
        return Err(Error::Tls(format!(
            "No certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    PrivateKeyDer::from_pem_file(path)
        .map_err(|e| Error::Tls(format!("Cannot read private key {}: {e}", path.display())))
}

fn load_ca(path: &Path) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    for cert in load_certificates(path)? {
        roots
            .add(cert)
            .map_err(|e| Error::Tls(format!("Cannot import CA certificate: {e}")))?;
    }
    Ok(roots)
}
