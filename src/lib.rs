//! # appointments-node
//!
//! Accepts encrypted provider data for an appointment scheduling service.
//!
//! Providers sign their submissions with an ML-DSA-65 key. The hash of that
//! key is the provider's identity and the key under which its data is stored.
//! Providers whose data has not been verified yet must present a limited-use
//! invitation code. Submissions arrive over a mutually authenticated TLS
//! channel.
//!
//! ## Modules
//!
//! - [`provider`]: the signed submission protocol
//! - [`storage`]: key-value and scored-set backend abstraction
//! - [`tls`]: mutual TLS configuration
//! - [`server`] / [`client`]: newline-delimited JSON transport
//! - [`node`]: wiring and lifecycle

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod node;
pub mod provider;
pub mod server;
pub mod storage;
pub mod tls;

pub use config::NodeConfig;
pub use error::{Error, Result};
pub use node::{NodeBuilder, RunningNode};
