//! Node implementation - wires the backend, submission service and TLS
//! listener together.

use crate::config::NodeConfig;
use crate::error::{Error, Result};
use crate::event::{create_event_channel, NodeEvent, NodeEventsChannel, NodeEventsSender};
use crate::provider::{KnownProviderCache, ProviderDataService, PROVIDER_CODES_NAMESPACE};
use crate::server::SubmissionServer;
use crate::storage::MemoryBackend;
use crate::tls;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Builder for constructing an appointments node.
pub struct NodeBuilder {
    config: NodeConfig,
    backend: Option<Arc<MemoryBackend>>,
}

impl NodeBuilder {
    /// Create a new node builder with the given configuration.
    #[must_use]
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            backend: None,
        }
    }

    /// Use an existing backend instead of an empty one.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<MemoryBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Build the node and bind its listener.
    ///
    /// # Errors
    ///
    /// Returns an error if TLS material is missing or invalid, the codes file
    /// cannot be loaded, or the listen address cannot be bound.
    pub async fn build(self) -> Result<RunningNode> {
        info!("Building appointments-node with config: {:?}", self.config);

        let tls_settings = self
            .config
            .tls
            .as_ref()
            .ok_or_else(|| Error::Config("tls section is required".to_string()))?;
        let tls_config = tls::server_config(tls_settings)?;

        let backend = self.backend.unwrap_or_default();
        if let Some(ref path) = self.config.provider_codes.codes_file {
            let codes = load_codes(path)?;
            let set = backend.code_set(PROVIDER_CODES_NAMESPACE);
            for code in &codes {
                set.insert(code);
            }
            info!("Loaded {} provider codes from {}", codes.len(), path.display());
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events_tx, events_rx) = create_event_channel();

        let service = ProviderDataService::new(&*backend, self.config.provider_settings()?)
            .with_cache(KnownProviderCache::with_capacity(
                self.config.verified_cache_capacity,
            ))
            .with_events(events_tx.clone());
        let service = Arc::new(service);

        let server =
            SubmissionServer::bind(self.config.listen_addr, tls_config, Arc::clone(&service))
                .await?;
        let local_addr = server.local_addr()?;

        Ok(RunningNode {
            config: self.config,
            local_addr,
            backend,
            service,
            server: Some(server),
            shutdown_tx,
            shutdown_rx,
            events_tx,
            events_rx: Some(events_rx),
        })
    }
}

/// A running appointments node.
pub struct RunningNode {
    config: NodeConfig,
    local_addr: SocketAddr,
    backend: Arc<MemoryBackend>,
    service: Arc<ProviderDataService>,
    server: Option<SubmissionServer>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    events_tx: NodeEventsSender,
    events_rx: Option<NodeEventsChannel>,
}

impl RunningNode {
    /// Configuration the node was built with.
    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Address the submission listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Backend holding provider data and codes.
    #[must_use]
    pub fn backend(&self) -> Arc<MemoryBackend> {
        Arc::clone(&self.backend)
    }

    /// Submission service.
    #[must_use]
    pub fn service(&self) -> Arc<ProviderDataService> {
        Arc::clone(&self.service)
    }

    /// Get a receiver for node events.
    ///
    /// Note: Can only be called once. Subsequent calls return None.
    pub fn events(&mut self) -> Option<NodeEventsChannel> {
        self.events_rx.take()
    }

    /// Subscribe to node events.
    #[must_use]
    pub fn subscribe_events(&self) -> NodeEventsChannel {
        self.events_tx.subscribe()
    }

    /// A handle that stops the node when it sends `true`.
    #[must_use]
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    /// Serve submissions until shutdown is requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the node was already run.
    pub async fn run(&mut self) -> Result<()> {
        let server = self
            .server
            .take()
            .ok_or_else(|| Error::Config("node is already running".to_string()))?;

        info!("Starting appointments-node on {}", self.local_addr);
        let _ = self.events_tx.send(NodeEvent::Started);

        let listener = tokio::spawn(server.run(self.shutdown_rx.clone()));
        let _ = self.events_tx.send(NodeEvent::Listening {
            address: self.local_addr.to_string(),
        });

        loop {
            tokio::select! {
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, initiating shutdown");
                    self.shutdown();
                    break;
                }
            }
        }

        let _ = self.events_tx.send(NodeEvent::ShuttingDown);
        match listener.await {
            Ok(Err(e)) => warn!("Submission listener failed: {e}"),
            Err(e) => warn!("Submission listener task failed: {e}"),
            Ok(Ok(())) => {}
        }

        info!("Node shutdown complete");
        Ok(())
    }

    /// Request the node to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Read hex-encoded codes, one per line. Blank lines and `#` comments are
/// skipped.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a line is not valid hex.
pub fn load_codes(path: &Path) -> Result<Vec<Vec<u8>>> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .map(str::trim)
        .enumerate()
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| {
            hex::decode(line).map_err(|e| {
                Error::Config(format!("{}:{}: invalid code: {e}", path.display(), n + 1))
            })
        })
        .collect()
}
