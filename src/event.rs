//! Node event system.

use tokio::sync::broadcast;

/// Events emitted by the node.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// Node has started successfully.
    Started,

    /// Node is shutting down.
    ShuttingDown,

    /// Listener bound and accepting connections.
    Listening {
        /// Bound socket address.
        address: String,
    },

    /// Provider data accepted into the unverified store.
    ProviderDataStored {
        /// Hex provider identity.
        provider: String,
    },

    /// A code passed its reuse limit and was deleted.
    CodeRetired {
        /// Code namespace.
        namespace: String,
    },

    /// Error occurred.
    Error {
        /// Error message.
        message: String,
    },
}

/// Channel for receiving node events.
pub type NodeEventsChannel = broadcast::Receiver<NodeEvent>;

/// Sender for node events.
pub type NodeEventsSender = broadcast::Sender<NodeEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (NodeEventsSender, NodeEventsChannel) {
    broadcast::channel(256)
}
