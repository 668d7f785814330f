mod support;

use std::sync::Arc;
use std::time::Duration;

use bridge_test_support::idp::{jwks_bytes, SigningKey, PRIMARY_KID, ROTATED_KID};
use futures_util::future::join_all;
use httpmock::prelude::*;
use identity_bridge::auth::jwks::{HttpKeySource, KeyFetchError, KeySource, KeyStore};
use support::app::fast_settings;

const DEFAULT_TTL: Duration = Duration::from_secs(3600);

fn source(server: &MockServer) -> HttpKeySource {
    HttpKeySource::new(server.url("/keys"), Duration::from_secs(2), DEFAULT_TTL).unwrap()
}

#[tokio::test]
async fn cache_control_sets_key_set_lifetime() {
    bridge_test_support::logging::init();
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/keys");
            then.status(200)
                .header("content-type", "application/json")
                .header("cache-control", "public, max-age=19800, must-revalidate, no-transform")
                .body(jwks_bytes(&[SigningKey::Primary, SigningKey::Rotated]));
        })
        .await;

    let set = source(&server).fetch().await.unwrap();

    mock.assert_async().await;
    assert_eq!(set.lifetime(), Duration::from_secs(19800));
    assert!(set.get(PRIMARY_KID).is_some());
    assert!(set.get(ROTATED_KID).is_some());
}

#[tokio::test]
async fn missing_cache_control_uses_default_lifetime() {
    bridge_test_support::logging::init();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/keys");
            then.status(200).body(jwks_bytes(&[SigningKey::Primary]));
        })
        .await;

    let set = source(&server).fetch().await.unwrap();
    assert_eq!(set.lifetime(), DEFAULT_TTL);
}

#[tokio::test]
async fn server_errors_are_transient() {
    bridge_test_support::logging::init();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/keys");
            then.status(503);
        })
        .await;

    let err = source(&server).fetch().await.unwrap_err();
    assert!(matches!(err, KeyFetchError::Status(503)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn malformed_documents_are_permanent() {
    bridge_test_support::logging::init();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/keys");
            then.status(200).body("<html>maintenance</html>");
        })
        .await;

    let err = source(&server).fetch().await.unwrap_err();
    assert!(matches!(err, KeyFetchError::Malformed(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn store_fetches_once_for_concurrent_lookups() {
    bridge_test_support::logging::init();
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/keys");
            then.status(200)
                .header("cache-control", "max-age=600")
                .delay(Duration::from_millis(50))
                .body(jwks_bytes(&[SigningKey::Primary]));
        })
        .await;

    let store = KeyStore::new(Arc::new(source(&server)), fast_settings(Duration::from_secs(30)));
    let results = join_all((0..8).map(|_| store.key_for(PRIMARY_KID))).await;

    assert!(results.iter().all(Result::is_ok));
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn store_does_not_retry_client_errors() {
    bridge_test_support::logging::init();
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/keys");
            then.status(404);
        })
        .await;

    let store = KeyStore::new(Arc::new(source(&server)), fast_settings(Duration::from_secs(30)));
    assert!(store.key_for(PRIMARY_KID).await.is_err());
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn store_retries_server_errors_up_to_the_bound() {
    bridge_test_support::logging::init();
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/keys");
            then.status(500);
        })
        .await;

    let store = KeyStore::new(Arc::new(source(&server)), fast_settings(Duration::from_secs(30)));
    assert!(store.key_for(PRIMARY_KID).await.is_err());
    mock.assert_hits_async(3).await;
}
