//! Client for the submission channel.

use crate::error::{Error, Result};
use crate::provider::{Response, SignedSubmission};
use crate::tls::TlsClient;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

/// An open connection to a node's submission listener.
pub struct SubmissionClient {
    stream: BufReader<TlsStream<TcpStream>>,
}

impl SubmissionClient {
    /// Connect to the node at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection or TLS handshake fails.
    pub async fn connect(tls: &TlsClient, addr: SocketAddr) -> Result<Self> {
        let stream = tls.connect(addr).await?;
        Ok(Self {
            stream: BufReader::new(stream),
        })
    }

    /// Send one submission and wait for its response.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or the node closes it
    /// without answering.
    pub async fn submit(&mut self, submission: &SignedSubmission) -> Result<Response> {
        let mut line =
            serde_json::to_string(submission).map_err(|e| Error::Serialization(e.to_string()))?;
        line.push('\n');

        let stream = self.stream.get_mut();
        stream.write_all(line.as_bytes()).await?;
        stream.flush().await?;

        let mut answer = String::new();
        if self.stream.read_line(&mut answer).await? == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before response",
            )));
        }

        serde_json::from_str(&answer).map_err(|e| Error::Serialization(e.to_string()))
    }
}
