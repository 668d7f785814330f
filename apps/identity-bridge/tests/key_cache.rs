mod support;

use std::sync::Arc;
use std::time::Duration;

use bridge_test_support::idp::{IdTokenBuilder, SigningKey, PRIMARY_KID, ROTATED_KID, TEST_PROJECT_ID};
use futures_util::future::join_all;
use identity_bridge::auth::id_token::{AssertionVerifier, IdTokenVerifier};
use identity_bridge::auth::jwks::{KeyFetchError, KeyLookupError, KeyStore};
use support::app::fast_settings;
use support::key_source::ScriptedKeySource;

const NO_REFRESH: Duration = Duration::from_secs(3600);

fn store(source: &Arc<ScriptedKeySource>, min_refresh: Duration) -> KeyStore {
    KeyStore::new(source.clone(), fast_settings(min_refresh))
}

#[tokio::test]
async fn concurrent_misses_share_one_fetch() {
    bridge_test_support::logging::init();
    let source = Arc::new(
        ScriptedKeySource::publishing(&[SigningKey::Primary])
            .with_latency(Duration::from_millis(50)),
    );
    let store = store(&source, NO_REFRESH);

    let lookups = (0..16).map(|_| store.key_for(PRIMARY_KID));
    let results = join_all(lookups).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(source.fetches(), 1);
}

#[tokio::test]
async fn rotation_is_picked_up_by_one_refresh() {
    bridge_test_support::logging::init();
    let source = Arc::new(ScriptedKeySource::publishing(&[SigningKey::Primary]));
    let store = Arc::new(store(&source, Duration::ZERO));
    store.warm().await.unwrap();

    source.publish(&[SigningKey::Primary, SigningKey::Rotated]);
    let verifier = IdTokenVerifier::new(store.clone(), TEST_PROJECT_ID);

    let token = IdTokenBuilder::new("uid-rotated")
        .signed_with(SigningKey::Rotated)
        .sign();
    let identity = verifier.verify(&token).await.unwrap();
    assert_eq!(identity.uid, "uid-rotated");
    assert_eq!(source.fetches(), 2);

    // Both keys now cached; no further fetches.
    store.key_for(PRIMARY_KID).await.unwrap();
    store.key_for(ROTATED_KID).await.unwrap();
    assert_eq!(source.fetches(), 2);
}

#[tokio::test]
async fn unknown_kid_on_fresh_set_does_not_refetch() {
    bridge_test_support::logging::init();
    let source = Arc::new(ScriptedKeySource::publishing(&[SigningKey::Primary]));
    let store = store(&source, Duration::from_secs(30));

    for _ in 0..5 {
        assert!(matches!(
            store.key_for("forged-kid").await,
            Err(KeyLookupError::UnknownKey)
        ));
    }
    assert_eq!(source.fetches(), 1);
}

#[tokio::test]
async fn unknown_kid_after_refresh_is_still_unknown() {
    bridge_test_support::logging::init();
    let source = Arc::new(ScriptedKeySource::publishing(&[SigningKey::Primary]));
    let store = store(&source, Duration::ZERO);

    assert!(matches!(
        store.key_for("forged-kid").await,
        Err(KeyLookupError::UnknownKey)
    ));
    assert_eq!(source.fetches(), 2);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    bridge_test_support::logging::init();
    let source = Arc::new(ScriptedKeySource::publishing(&[SigningKey::Primary]));
    source.fail_next(KeyFetchError::Status(503));
    source.fail_next(KeyFetchError::Transport("connection reset".into()));
    let store = store(&source, NO_REFRESH);

    store.key_for(PRIMARY_KID).await.unwrap();
    assert_eq!(source.fetches(), 3);
}

#[tokio::test]
async fn retries_stop_at_the_bound() {
    bridge_test_support::logging::init();
    let source = Arc::new(ScriptedKeySource::publishing(&[SigningKey::Primary]));
    for _ in 0..3 {
        source.fail_next(KeyFetchError::Status(502));
    }
    let store = store(&source, NO_REFRESH);

    assert!(matches!(
        store.key_for(PRIMARY_KID).await,
        Err(KeyLookupError::Unavailable(_))
    ));
    assert_eq!(source.fetches(), 3);

    // Failures are not cached; the next lookup fetches again and succeeds.
    store.key_for(PRIMARY_KID).await.unwrap();
    assert_eq!(source.fetches(), 4);
}

#[tokio::test]
async fn failed_refresh_keeps_cached_keys() {
    bridge_test_support::logging::init();
    let source = Arc::new(ScriptedKeySource::publishing(&[SigningKey::Primary]));
    let store = store(&source, Duration::ZERO);
    store.warm().await.unwrap();

    for _ in 0..3 {
        source.fail_next(KeyFetchError::Status(503));
    }
    assert!(matches!(
        store.key_for("forged-kid").await,
        Err(KeyLookupError::Unavailable(_))
    ));
    assert_eq!(source.fetches(), 4);

    // The provider is down but the set cached before the refresh still serves.
    store.key_for(PRIMARY_KID).await.unwrap();
    assert_eq!(source.fetches(), 4);

    // Once the provider recovers, a rotated key is picked up as usual.
    source.publish(&[SigningKey::Primary, SigningKey::Rotated]);
    store.key_for(ROTATED_KID).await.unwrap();
    assert_eq!(source.fetches(), 5);
}

#[tokio::test]
async fn permanent_failures_are_not_retried() {
    bridge_test_support::logging::init();
    let source = Arc::new(ScriptedKeySource::publishing(&[SigningKey::Primary]));
    source.fail_next(KeyFetchError::Status(404));
    let store = store(&source, NO_REFRESH);

    let err = store.key_for(PRIMARY_KID).await.unwrap_err();
    assert!(matches!(err, KeyLookupError::Unavailable(ref e) if !e.is_transient()));
    assert_eq!(source.fetches(), 1);
}

#[tokio::test]
async fn key_set_expires_after_its_lifetime() {
    bridge_test_support::logging::init();
    let source = Arc::new(
        ScriptedKeySource::publishing(&[SigningKey::Primary])
            .with_lifetime(Duration::from_millis(100)),
    );
    let store = store(&source, NO_REFRESH);

    store.warm().await.unwrap();
    store.key_for(PRIMARY_KID).await.unwrap();
    assert_eq!(source.fetches(), 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    store.key_for(PRIMARY_KID).await.unwrap();
    assert_eq!(source.fetches(), 2);
}
