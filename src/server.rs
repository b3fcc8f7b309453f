//! Submission listener.
//!
//! Accepts TCP connections, completes the mutual TLS handshake and then reads
//! one JSON [`SignedSubmission`] per line, answering each with one JSON
//! [`Response`] line. Every connection runs in its own task; requests on
//! different connections are processed concurrently.

use crate::error::{Error, Result};
use crate::provider::{ProviderDataService, Response, SignedSubmission};
use rustls::ServerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

/// TLS listener serving provider data submissions.
pub struct SubmissionServer {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    service: Arc<ProviderDataService>,
}

impl SubmissionServer {
    /// Bind the listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        tls: Arc<ServerConfig>,
        service: Arc<ProviderDataService>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Submission listener bound to {}", listener.local_addr()?);

        Ok(Self {
            listener,
            acceptor: TlsAcceptor::from(tls),
            service,
        })
    }

    /// Address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` flips to true or its sender is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok`; accept failures are logged and skipped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Submission listener stopping");
                        break;
                    }
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let acceptor = self.acceptor.clone();
                            let service = Arc::clone(&self.service);
                            tokio::spawn(async move {
                                handle_connection(acceptor, service, stream, peer).await;
                            });
                        }
                        Err(e) => warn!("Failed to accept connection: {e}"),
                    }
                }
            }
        }

        Ok(())
    }
}

async fn handle_connection(
    acceptor: TlsAcceptor,
    service: Arc<ProviderDataService>,
    stream: TcpStream,
    peer: SocketAddr,
) {
    let tls = match acceptor.accept(stream).await {
        Ok(tls) => tls,
        Err(e) => {
            warn!("TLS handshake with {peer} failed: {e}");
            return;
        }
    };
    debug!("Accepted connection from {peer}");

    if let Err(e) = serve(&service, tls).await {
        debug!("Connection from {peer} closed: {e}");
    }
}

/// Largest request line accepted, excluding the newline.
pub const MAX_REQUEST_BYTES: usize = 1 << 20;

/// Serve newline-delimited submissions on an established stream.
///
/// # Errors
///
/// Returns an error if reading from or writing to the stream fails.
pub async fn serve<S>(service: &ProviderDataService, stream: S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    serve_bounded(service, stream, MAX_REQUEST_BYTES).await
}

/// Like [`serve`], with an explicit line limit. A line longer than
/// `max_line` is answered with an invalid request response and the
/// connection is closed.
///
/// # Errors
///
/// Returns an error if reading from or writing to the stream fails.
pub async fn serve_bounded<S>(
    service: &ProviderDataService,
    stream: S,
    max_line: usize,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let read_limit = u64::try_from(max_line).unwrap_or(u64::MAX).saturating_add(1);

    loop {
        buf.clear();
        if (&mut reader).take(read_limit).read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = buf.strip_suffix(b"\n").unwrap_or(buf.as_slice());
        if line.len() > max_line {
            warn!("Closing connection after request line over {max_line} bytes");
            respond(&mut writer, &Response::invalid_request()).await?;
            break;
        }

        let response = match std::str::from_utf8(line) {
            Ok(text) if text.trim().is_empty() => continue,
            Ok(text) => handle_request(service, text.trim()).await,
            Err(e) => {
                debug!("Rejecting non UTF-8 request: {e}");
                Response::invalid_request()
            }
        };
        respond(&mut writer, &response).await?;
    }

    Ok(())
}

async fn respond<W>(writer: &mut W, response: &Response) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut out = serde_json::to_vec(response).map_err(|e| Error::Serialization(e.to_string()))?;
    out.push(b'\n');
    writer.write_all(&out).await?;
    writer.flush().await?;
    Ok(())
}

/// Process one request line.
pub async fn handle_request(service: &ProviderDataService, line: &str) -> Response {
    match serde_json::from_str::<SignedSubmission>(line) {
        Ok(submission) => Response::from(&service.store_provider_data(&submission).await),
        Err(e) => {
            debug!("Rejecting malformed request: {e}");
            Response::invalid_request()
        }
    }
}
