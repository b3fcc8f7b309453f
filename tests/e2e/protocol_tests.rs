//! Submission protocol properties, exercised against counting stores.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::{now, random_code, TestHarness, TestProvider, NOW};
use appointments_node::provider::{
    ProviderDataService, ProviderSettings, Response, SubmissionError, PROVIDER_CODES_NAMESPACE,
};
use appointments_node::storage::{MemoryBackend, ScoredSet};
use std::sync::Arc;

const CODE: &[u8] = b"\x01\x02\x03\x04";

#[tokio::test]
async fn test_tampered_payload_writes_nothing() {
    let harness = TestHarness::with_codes(3);
    harness.backend.codes.insert(CODE);
    let provider = TestProvider::new();

    let mut submission = provider.submission(NOW, Some(CODE), b"ciphertext");
    submission.data = submission.data.replace("636970686572", "636970686573");

    let err = harness
        .service
        .store_provider_data_at(&submission, now())
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::InvalidSignature));
    assert_eq!(err.status(), 400);
    assert_eq!(harness.backend.total_calls(), 0);
}

#[tokio::test]
async fn test_signature_from_other_key_rejected() {
    let harness = TestHarness::new(ProviderSettings::default());
    let alice = TestProvider::new();
    let mallory = TestProvider::new();

    let mut submission = alice.submission(NOW, None, b"ciphertext");
    submission.public_key = mallory.submission(NOW, None, b"x").public_key;

    let err = harness
        .service
        .store_provider_data_at(&submission, now())
        .await
        .unwrap_err();

    assert_eq!(err.status(), 400);
    assert_eq!(harness.backend.unverified.writes(), 0);
}

#[tokio::test]
async fn test_signed_garbage_payload_is_invalid_data() {
    let harness = TestHarness::with_codes(3);
    harness.backend.codes.insert(CODE);
    let provider = TestProvider::new();

    let submission = provider.sign_raw("not a submission");
    let err = harness
        .service
        .store_provider_data_at(&submission, now())
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::InvalidData));
    assert_eq!(err.status(), 400);
    assert_eq!(Response::from(&err).message, "invalid data");
    assert_eq!(harness.backend.total_calls(), 0);
}

#[tokio::test]
async fn test_malformed_public_key_is_internal_error() {
    let harness = TestHarness::new(ProviderSettings::default());
    let provider = TestProvider::new();

    let mut submission = provider.submission(NOW, None, b"ciphertext");
    submission.public_key = vec![0u8; 10];

    let err = harness
        .service
        .store_provider_data_at(&submission, now())
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::Internal(_)));
    assert_eq!(err.status(), 500);
    assert_eq!(Response::from(&err).message, "internal server error");
    assert_eq!(harness.backend.total_calls(), 0);
}

#[tokio::test]
async fn test_expired_rejected_before_store_access() {
    let harness = TestHarness::with_codes(3);
    harness.backend.codes.insert(CODE);
    let provider = TestProvider::new();

    let submission = provider.submission(NOW - 61, Some(CODE), b"ciphertext");
    let err = harness
        .service
        .store_provider_data_at(&submission, now())
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::Expired));
    assert_eq!(err.status(), 410);
    assert_eq!(harness.backend.total_calls(), 0);
}

#[tokio::test]
async fn test_timestamp_at_window_edge_accepted() {
    let harness = TestHarness::new(ProviderSettings::default());
    let provider = TestProvider::new();

    harness
        .service
        .store_provider_data_at(&provider.submission(NOW - 60, None, b"edge"), now())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_missing_code_is_unauthorized() {
    let harness = TestHarness::with_codes(3);
    let provider = TestProvider::new();

    let err = harness
        .service
        .store_provider_data_at(&provider.submission(NOW, None, b"ciphertext"), now())
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::NotAuthorized));
    assert_eq!(err.status(), 401);
    assert_eq!(harness.backend.unverified.writes(), 0);
}

#[tokio::test]
async fn test_unknown_code_is_unauthorized() {
    let harness = TestHarness::with_codes(3);
    harness.backend.codes.insert(CODE);
    let provider = TestProvider::new();

    let err = harness
        .service
        .store_provider_data_at(&provider.submission(NOW, Some(b"\xff"), b"ciphertext"), now())
        .await
        .unwrap_err();

    assert_eq!(err.status(), 401);
    assert_eq!(harness.backend.unverified.writes(), 0);
    assert_eq!(harness.backend.codes.score(CODE).await.unwrap(), 0);
}

#[tokio::test]
async fn test_verified_provider_needs_no_code() {
    let harness = TestHarness::with_codes(3);
    let provider = TestProvider::new();
    harness.backend.promote(&provider.id()).await;

    let ack = harness
        .service
        .store_provider_data_at(&provider.submission(NOW, None, b"update"), now())
        .await
        .unwrap();

    assert_eq!(ack.code, None);
    assert_eq!(
        harness
            .backend
            .unverified_record(&provider.id())
            .await
            .unwrap()
            .encrypted_data,
        b"update"
    );
}

#[tokio::test]
async fn test_verified_lookup_is_cached() {
    let harness = TestHarness::with_codes(3);
    let provider = TestProvider::new();
    harness.backend.promote(&provider.id()).await;

    for i in 0..3 {
        harness
            .service
            .store_provider_data_at(&provider.submission(NOW, None, &[i]), now())
            .await
            .unwrap();
    }

    assert_eq!(harness.backend.verified.reads(), 1);
    assert_eq!(harness.service.cache().stats().hits, 2);
}

#[tokio::test]
async fn test_code_with_limit_one() {
    let harness = TestHarness::with_codes(1);
    harness.backend.codes.insert(CODE);
    let provider = TestProvider::new();
    let submit = |n: u8| provider.submission(NOW, Some(CODE), &[n]);

    let first = harness
        .service
        .store_provider_data_at(&submit(1), now())
        .await
        .unwrap();
    let code = first.code.unwrap();
    assert_eq!(code.score, 1);
    assert!(!code.retired);
    assert_eq!(harness.backend.codes.score(CODE).await.unwrap(), 1);

    let second = harness
        .service
        .store_provider_data_at(&submit(2), now())
        .await
        .unwrap();
    assert!(second.code.unwrap().retired);
    assert!(!harness.backend.codes.has(CODE).await.unwrap());

    let third = harness
        .service
        .store_provider_data_at(&submit(3), now())
        .await
        .unwrap_err();
    assert_eq!(third.status(), 401);

    let stored = harness.backend.unverified_record(&provider.id()).await.unwrap();
    assert_eq!(stored.encrypted_data, vec![2]);
}

#[tokio::test]
async fn test_code_survives_until_limit_exceeded() {
    let limit = 4;
    let harness = TestHarness::with_codes(limit);
    harness.backend.codes.insert(CODE);

    for expected in 1..=limit {
        let provider = TestProvider::new();
        let ack = harness
            .service
            .store_provider_data_at(&provider.submission(NOW, Some(CODE), b"x"), now())
            .await
            .unwrap();
        assert_eq!(ack.code.unwrap().score, expected);
        assert!(harness.backend.codes.has(CODE).await.unwrap());
    }

    let provider = TestProvider::new();
    let ack = harness
        .service
        .store_provider_data_at(&provider.submission(NOW, Some(CODE), b"x"), now())
        .await
        .unwrap();
    assert_eq!(ack.code.unwrap().score, limit + 1);
    assert!(!harness.backend.codes.has(CODE).await.unwrap());
}

#[tokio::test]
async fn test_resubmission_overwrites() {
    let harness = TestHarness::new(ProviderSettings::default());
    let provider = TestProvider::new();

    for payload in [b"first".as_slice(), b"second".as_slice()] {
        harness
            .service
            .store_provider_data_at(&provider.submission(NOW, None, payload), now())
            .await
            .unwrap();
    }

    let stored = harness.backend.unverified_record(&provider.id()).await.unwrap();
    assert_eq!(stored.encrypted_data, b"second");
}

#[tokio::test]
async fn test_store_failure_is_opaque() {
    let harness = TestHarness::new(ProviderSettings::default());
    harness.backend.unverified.fail();
    let provider = TestProvider::new();

    let err = harness
        .service
        .store_provider_data_at(&provider.submission(NOW, None, b"x"), now())
        .await
        .unwrap_err();

    assert_eq!(err.status(), 500);
    let response = Response::from(&err);
    assert_eq!(response.message, "internal server error");
    assert!(!response.message.contains("injected"));
}

#[tokio::test]
async fn test_verified_store_failure_leaves_code_unused() {
    let harness = TestHarness::with_codes(3);
    harness.backend.codes.insert(CODE);
    harness.backend.verified.fail();
    let provider = TestProvider::new();

    let err = harness
        .service
        .store_provider_data_at(&provider.submission(NOW, Some(CODE), b"x"), now())
        .await
        .unwrap_err();

    assert_eq!(err.status(), 500);
    assert_eq!(harness.backend.unverified.writes(), 0);
    assert_eq!(harness.backend.codes.score(CODE).await.unwrap(), 0);
}

#[tokio::test]
async fn test_verified_store_failure_without_codes() {
    let harness = TestHarness::new(ProviderSettings::default());
    harness.backend.verified.fail();
    let provider = TestProvider::new();

    let err = harness
        .service
        .store_provider_data_at(&provider.submission(NOW, None, b"x"), now())
        .await
        .unwrap_err();

    assert_eq!(err.status(), 500);
    assert_eq!(harness.backend.verified.reads(), 1);
    assert_eq!(harness.backend.unverified.writes(), 0);
}

#[tokio::test]
async fn test_late_use_of_retired_code_not_recreated() {
    let harness = TestHarness::with_codes(1);
    harness.backend.codes.insert(CODE);

    for _ in 0..2 {
        let provider = TestProvider::new();
        harness
            .service
            .store_provider_data_at(&provider.submission(NOW, Some(CODE), b"x"), now())
            .await
            .unwrap();
    }
    assert!(!harness.backend.codes.has(CODE).await.unwrap());

    let late = harness.backend.codes.consume(CODE, 1).await.unwrap();
    assert!(late.retired);
    assert!(!harness.backend.codes.has(CODE).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_uses_never_overshoot_limit() {
    let limit = 5;
    let backend = MemoryBackend::new();
    let codes = backend.code_set(PROVIDER_CODES_NAMESPACE);
    let code = random_code();
    codes.insert(&code);

    let service = Arc::new(ProviderDataService::new(
        &backend,
        ProviderSettings {
            codes_enabled: true,
            codes_reuse_limit: limit,
            ..ProviderSettings::default()
        },
    ));

    let providers: Vec<TestProvider> = (0..16).map(|_| TestProvider::new()).collect();
    let tasks = providers.iter().map(|provider| {
        let service = Arc::clone(&service);
        let submission = provider.submission(NOW, Some(&code), b"x");
        tokio::spawn(async move { service.store_provider_data_at(&submission, now()).await })
    });

    let results = futures::future::join_all(tasks).await;
    let accepted: Vec<_> = results
        .into_iter()
        .map(|joined| joined.unwrap())
        .filter_map(Result::ok)
        .collect();

    // Every accepted submission counted one use; only the first `limit`
    // leave the code alive.
    let mut live_scores: Vec<i64> = accepted
        .iter()
        .filter_map(|ack| ack.code)
        .filter(|c| !c.retired)
        .map(|c| c.score)
        .collect();
    live_scores.sort_unstable();
    assert_eq!(live_scores, (1..=limit).collect::<Vec<_>>());

    assert!(accepted.len() > usize::try_from(limit).unwrap());
    assert!(!codes.has(&code).await.unwrap());
    assert_eq!(backend.unverified_store().len(), accepted.len());
}
