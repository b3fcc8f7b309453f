//! Full node tests: submissions over the mutual TLS listener.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::{memory_backend_with_codes, TestPki, TestProvider};
use appointments_node::client::SubmissionClient;
use appointments_node::event::NodeEvent;
use appointments_node::provider::{ProviderDataRecord, Response, PROVIDER_CODES_NAMESPACE};
use appointments_node::storage::{KeyValueStore, ScoredSet};
use appointments_node::tls::TlsClient;
use appointments_node::{NodeBuilder, NodeConfig};
use std::net::SocketAddr;
use std::time::Duration;

const CODE: &[u8] = b"\xc0\xde";

fn node_config(pki: &TestPki) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.listen_addr = SocketAddr::from(([127, 0, 0, 1], 0));
    config.tls = Some(pki.node.clone());
    config.provider_codes.enabled = true;
    config.provider_codes.reuse_limit = 1;
    config
}

fn timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

#[tokio::test]
async fn test_submission_round_trip() {
    let pki = TestPki::new();
    let backend = memory_backend_with_codes(&[CODE]);
    let mut node = NodeBuilder::new(node_config(&pki))
        .with_backend(backend.clone())
        .build()
        .await
        .unwrap();
    let addr = node.local_addr();
    let mut events = node.subscribe_events();
    let shutdown = node.shutdown_handle();
    let running = tokio::spawn(async move { node.run().await });

    let tls = TlsClient::new(&pki.client, "localhost").unwrap();
    let mut client = SubmissionClient::connect(&tls, addr).await.unwrap();
    let provider = TestProvider::new();

    let first = client
        .submit(&provider.submission(timestamp(), Some(CODE), b"first"))
        .await
        .unwrap();
    assert_eq!(first, Response::ok());

    let unauthorized = client
        .submit(&provider.submission(timestamp(), None, b"no code"))
        .await
        .unwrap();
    assert_eq!(unauthorized.status, 401);

    let expired = client
        .submit(&provider.submission(timestamp() - 3600, Some(CODE), b"old"))
        .await
        .unwrap();
    assert_eq!(expired.status, 410);

    let second = client
        .submit(&provider.submission(timestamp(), Some(CODE), b"second"))
        .await
        .unwrap();
    assert!(second.is_ok());

    let stored = backend
        .unverified_store()
        .get(provider.id().as_bytes())
        .await
        .unwrap();
    assert_eq!(
        ProviderDataRecord::from_bytes(&stored).unwrap().encrypted_data,
        b"second"
    );
    assert!(!backend
        .code_set(PROVIDER_CODES_NAMESPACE)
        .has(CODE)
        .await
        .unwrap());

    let mut seen_retired = false;
    while let Ok(Ok(event)) = tokio::time::timeout(Duration::from_millis(100), events.recv()).await
    {
        if matches!(event, NodeEvent::CodeRetired { .. }) {
            seen_retired = true;
        }
    }
    assert!(seen_retired);

    shutdown.send(true).unwrap();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_client_from_other_ca_rejected() {
    let pki = TestPki::new();
    let stranger = TestPki::new();
    let mut node = NodeBuilder::new(node_config(&pki)).build().await.unwrap();
    let addr = node.local_addr();
    let shutdown = node.shutdown_handle();
    let running = tokio::spawn(async move { node.run().await });

    // The stranger trusts our node's CA but presents a certificate we never
    // issued.
    let mut settings = stranger.client.clone();
    settings.ca_certificate_file = pki.client.ca_certificate_file.clone();
    let tls = TlsClient::new(&settings, "localhost").unwrap();

    let provider = TestProvider::new();
    let outcome = match SubmissionClient::connect(&tls, addr).await {
        Ok(mut client) => {
            client
                .submit(&provider.submission(timestamp(), Some(CODE), b"x"))
                .await
        }
        Err(e) => Err(e),
    };
    assert!(outcome.is_err());

    shutdown.send(true).unwrap();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_codes_file_loaded_at_build() {
    let pki = TestPki::new();
    let codes_file = pki.dir.path().join("codes.txt");
    std::fs::write(&codes_file, "# issued 2026-10\nc0de\n").unwrap();

    let mut config = node_config(&pki);
    config.provider_codes.codes_file = Some(codes_file);
    let node = NodeBuilder::new(config).build().await.unwrap();

    let codes = node.backend().code_set(PROVIDER_CODES_NAMESPACE);
    assert!(codes.has(CODE).await.unwrap());
    assert_eq!(codes.len(), 1);
}
