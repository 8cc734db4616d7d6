//! End-to-end tests of the mirror channel over a real WebSocket.

mod common;

use std::time::Duration;

use common::{connected_pair, next_message, stays_quiet, wait_for, MESSAGE_TIMEOUT};
use rsc_cache::{
    Cache, ConnectionState, DeferredValue, InboundCommand, MirrorAction, MirrorConfig,
    MirrorObserver,
};
use serde_json::json;

#[tokio::test]
async fn test_resolved_set_reaches_observer() {
    common::setup_test_logging();
    let (cache, mut session, _observer) = connected_pair().await;
    assert!(wait_for(|| cache.connection_state() == ConnectionState::Open, 2000).await);

    cache.set("A", DeferredValue::resolved("x".to_string()));

    let observed = next_message(&mut session).await;
    assert_eq!(observed.message.action(), Some(MirrorAction::Set));
    assert_eq!(observed.message.payload.updated_key.as_deref(), Some("A"));
    assert_eq!(
        serde_json::to_value(&observed.message.payload.full_cache).unwrap(),
        json!({"A": "x"})
    );

    cache.shutdown();
}

#[tokio::test]
async fn test_pending_entry_published_only_after_resolution() {
    let (cache, mut session, _observer) = connected_pair().await;

    let (resolver, value) = DeferredValue::pending();
    cache.set("/slow", value);
    assert!(stays_quiet(&mut session, Duration::from_millis(200)).await);

    resolver.resolve("<Slow />".to_string());
    let observed = next_message(&mut session).await;
    assert_eq!(observed.message.payload.updated_key.as_deref(), Some("/slow"));
    assert_eq!(observed.message.payload.full_cache["/slow"], json!("<Slow />"));

    cache.shutdown();
}

#[tokio::test]
async fn test_delete_of_missing_key_echoes_snapshot() {
    let (cache, mut session, _observer) = connected_pair().await;
    cache.set("B", DeferredValue::resolved("y".to_string()));
    next_message(&mut session).await;

    session.send_command(&InboundCommand::delete("A")).await.unwrap();

    let observed = next_message(&mut session).await;
    assert_eq!(observed.message.action(), Some(MirrorAction::Update));
    assert!(observed.message.payload.updated_key.is_none());
    assert_eq!(
        serde_json::to_value(&observed.message.payload.full_cache).unwrap(),
        json!({"B": "y"})
    );
    assert_eq!(cache.keys(), vec!["B".to_string()]);
    assert_eq!(cache.diagnostics().missing_keys, 1);

    cache.shutdown();
}

#[tokio::test]
async fn test_remote_delete_and_clear() {
    let (cache, mut session, _observer) = connected_pair().await;
    cache.set("a", DeferredValue::resolved("1".to_string()));
    next_message(&mut session).await;
    cache.set("b", DeferredValue::resolved("2".to_string()));
    next_message(&mut session).await;

    session.send_raw(r#"{"id":"rsc-cache-delete","key":"a"}"#).await.unwrap();
    let observed = next_message(&mut session).await;
    assert_eq!(
        serde_json::to_value(&observed.message.payload.full_cache).unwrap(),
        json!({"b": "2"})
    );
    assert!(cache.get("a").is_none());

    session.send_command(&InboundCommand::Clear).await.unwrap();
    let observed = next_message(&mut session).await;
    assert_eq!(observed.message.action(), Some(MirrorAction::Update));
    assert!(observed.message.payload.full_cache.is_empty());
    assert!(cache.is_empty());

    cache.shutdown();
}

#[tokio::test]
async fn test_disable_then_enable() {
    let (cache, mut session, _observer) = connected_pair().await;
    cache.set("a", DeferredValue::resolved("1".to_string()));
    next_message(&mut session).await;

    session.send_command(&InboundCommand::Disable).await.unwrap();
    assert!(wait_for(|| !cache.mirror_enabled(), 2000).await);
    // Toggling mirroring publishes nothing
    assert!(stays_quiet(&mut session, Duration::from_millis(150)).await);

    cache.set("b", DeferredValue::resolved("2".to_string()));
    assert_eq!(cache.keys(), vec!["b".to_string()]);
    let observed = next_message(&mut session).await;
    assert_eq!(
        serde_json::to_value(&observed.message.payload.full_cache).unwrap(),
        json!({"b": "2"})
    );

    session.send_command(&InboundCommand::Enable).await.unwrap();
    assert!(wait_for(|| cache.mirror_enabled(), 2000).await);
    cache.set("c", DeferredValue::resolved("3".to_string()));
    assert_eq!(cache.len(), 2);

    cache.shutdown();
}

#[tokio::test]
async fn test_malformed_messages_keep_channel_open() {
    let (cache, mut session, _observer) = connected_pair().await;
    cache.set("a", DeferredValue::resolved("1".to_string()));
    next_message(&mut session).await;

    session.send_raw("{not json").await.unwrap();
    session.send_raw(r#"{"id":7}"#).await.unwrap();
    session.send_raw(r#"{"id":"someone-else"}"#).await.unwrap();
    session.send_raw("hello").await.unwrap();

    // A delete without a key removes nothing but echoes the snapshot
    session.send_raw(r#"{"id":"rsc-cache-delete"}"#).await.unwrap();
    let observed = next_message(&mut session).await;
    assert_eq!(observed.message.action(), Some(MirrorAction::Update));
    assert_eq!(
        serde_json::to_value(&observed.message.payload.full_cache).unwrap(),
        json!({"a": "1"})
    );

    // A valid command after the garbage still goes through
    session.send_command(&InboundCommand::Clear).await.unwrap();
    let observed = next_message(&mut session).await;
    assert!(observed.message.payload.full_cache.is_empty());

    let diagnostics = cache.diagnostics();
    assert_eq!(diagnostics.malformed_messages, 1);
    assert_eq!(diagnostics.ignored_messages, 3);
    assert_eq!(diagnostics.missing_keys, 1);
    assert_eq!(cache.connection_state(), ConnectionState::Open);

    cache.shutdown();
}

#[tokio::test]
async fn test_observer_close_moves_link_to_closed() {
    let (cache, session, _observer) = connected_pair().await;
    assert!(wait_for(|| cache.connection_state() == ConnectionState::Open, 2000).await);

    session.close().await.unwrap();
    assert!(wait_for(|| cache.connection_state() == ConnectionState::Closed, 2000).await);

    // Publishing on a closed link is dropped, the cache keeps working
    cache.set("late", DeferredValue::resolved("x".to_string()));
    assert!(wait_for(|| cache.diagnostics().sends_dropped_closed == 1, 2000).await);
    assert!(cache.get("late").is_some());

    cache.shutdown();
}

#[tokio::test]
async fn test_publish_before_handshake_is_retried() {
    let observer = MirrorObserver::bind("127.0.0.1:0").await.unwrap();
    let cache: Cache<String> =
        Cache::connect(&MirrorConfig::with_endpoint(observer.endpoint().unwrap()));

    // The handshake cannot complete until the observer accepts
    cache.set("early", DeferredValue::resolved("x".to_string()));
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(cache.diagnostics().messages_sent, 0);

    let mut session = tokio::time::timeout(MESSAGE_TIMEOUT, observer.accept())
        .await
        .unwrap()
        .unwrap();
    let observed = next_message(&mut session).await;
    assert_eq!(observed.message.payload.updated_key.as_deref(), Some("early"));
    assert_eq!(cache.diagnostics().sends_exhausted, 0);

    cache.shutdown();
}

#[tokio::test]
async fn test_unreachable_observer_never_fails_the_cache() {
    let cache: Cache<String> = Cache::connect(&MirrorConfig::with_endpoint("ws://127.0.0.1:9"));

    let value = cache.get_or_insert_with("/page", || DeferredValue::resolved("x".to_string()));
    assert_eq!(value.wait().await, "x");
    assert!(wait_for(|| cache.connection_state() == ConnectionState::Closed, 2000).await);

    assert!(cache.get("/page").unwrap().ptr_eq(&value));
    cache.shutdown();
}

#[tokio::test]
async fn test_shutdown_closes_observer_session() {
    let (cache, mut session, _observer) = connected_pair().await;
    assert!(wait_for(|| cache.connection_state() == ConnectionState::Open, 2000).await);

    cache.shutdown();

    let next = tokio::time::timeout(MESSAGE_TIMEOUT, session.next_message())
        .await
        .unwrap();
    assert!(matches!(next, Ok(None) | Err(_)));
    assert_eq!(cache.connection_state(), ConnectionState::Closed);
}
