//! Engine scenarios driven end to end through a fake document and a
//! scripted transport.


use crate::engine::{EngineConfig, SseEngine};
use crate::host::Host;
use crate::transport::{reset_transport_factory, set_transport_factory, TransportEvent};
use crate::types::{ConnectionStatus, ElementId, FormValue, SseEvent, Subscription};
use http::Method;
use std::sync::Arc;
use std::time::Duration;
use support::{advance, run_pending, ScriptedTransport, TestHost};
use tokio_test::assert_ok;

fn engine(host: &Arc<TestHost>, transport: &ScriptedTransport) -> SseEngine<TestHost> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    SseEngine::with_transport(
        Arc::clone(host),
        EngineConfig::default(),
        Arc::new(transport.clone()),
    )
}

fn stream_owner(host: &TestHost, events: &str) -> ElementId {
    host.append(host.root(), &[("hx-sse-post", "/updates"), ("hx-sse-events", events)])
}

// ========== Activation ==========

#[tokio::test]
async fn test_activation_posts_form_values() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    host.set_inputs(
        owner,
        vec![
            ("q", FormValue::from("live feed")),
            ("tag", FormValue::from(vec!["a".to_string(), "b".to_string()])),
        ],
    );

    let ids = assert_ok!(engine(&host, &transport).activate(owner));
    assert_eq!(ids.len(), 1);

    let request = transport.handle(0).request();
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.url, "http://app.test/updates");
    assert_eq!(request.payload.as_deref(), Some("q=live+feed&tag=a&tag=b"));
    assert_eq!(
        request.headers.get("content-type").map(String::as_str),
        Some("application/x-www-form-urlencoded")
    );
    assert!(request.with_credentials);
    assert!(transport.handle(0).is_started());
}

#[tokio::test]
async fn test_get_source_sends_values_in_query() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = host.append(host.root(), &[("data-hx-sse-get", "/feed?room=1"), ("hx-sse-events", "tick")]);
    host.set_inputs(owner, vec![("since", FormValue::from("42"))]);

    assert_ok!(engine(&host, &transport).activate(owner));

    let request = transport.handle(0).request();
    assert_eq!(request.method, Method::GET);
    assert_eq!(request.url, "http://app.test/feed?room=1&since=42");
    assert!(request.payload.is_none());
}

#[tokio::test]
async fn test_activation_covers_declaring_descendants() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let panel = host.append(host.root(), &[]);
    let a = host.append(panel, &[("hx-sse-get", "/a"), ("hx-sse-events", "x")]);
    let b = host.append(panel, &[("hx-sse-put", "/b"), ("hx-sse-events", "y")]);
    let engine = engine(&host, &transport);

    let ids = assert_ok!(engine.activate(panel));
    assert_eq!(ids.len(), 2);
    assert_eq!(engine.live_connections(), 2);
    assert!(engine.connection(a).is_some());
    assert_eq!(engine.connection(b).unwrap().request().method, Method::PUT);
    assert!(engine.connection(panel).is_none());
}

#[tokio::test]
async fn test_repeat_activation_reuses_connection() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "a");
    let engine = engine(&host, &transport);

    let first = assert_ok!(engine.activate(owner));
    host.set_attribute(owner, "hx-sse-events", "b, c");
    let second = assert_ok!(engine.activate(owner));

    assert_eq!(first, second);
    assert_eq!(transport.created(), 1);
    let connection = engine.connection(owner).unwrap();
    assert_eq!(connection.subscription(), Subscription::new(["b", "c"]));
}

#[tokio::test]
async fn test_remove_then_activate_keeps_one_live_connection() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    assert!(engine.remove(owner));
    assert!(!engine.remove(owner));
    assert_ok!(engine.activate(owner));

    assert_eq!(transport.created(), 2);
    assert!(transport.handle(0).is_closed());
    assert!(!transport.handle(1).is_closed());
    assert_eq!(engine.live_connections(), 1);
}

#[tokio::test]
async fn test_host_hooks() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    let engine = engine(&host, &transport);

    assert_ok!(engine.on_event("htmx:afterProcessNode", owner));
    assert_eq!(transport.created(), 0);

    assert_ok!(engine.on_event("htmx:trigger", owner));
    assert_eq!(engine.connection_status(owner), Some(ConnectionStatus::Connecting));

    assert_ok!(engine.on_event("htmx:beforeCleanupElement", owner));
    assert!(engine.connection(owner).is_none());
    assert!(transport.handle(0).is_closed());
}

#[tokio::test]
async fn test_invalid_source_url_is_reported() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = host.append(host.root(), &[("hx-sse-post", "http://[broken")]);

    assert!(engine(&host, &transport).activate(owner).is_err());
    assert_eq!(transport.created(), 0);
}

#[tokio::test]
async fn test_invalid_sibling_does_not_block_valid_one() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let panel = host.append(host.root(), &[]);
    let good = host.append(panel, &[("hx-sse-get", "/ok"), ("hx-sse-events", "x")]);
    let bad = host.append(panel, &[("hx-sse-get", "http://[broken")]);
    let engine = engine(&host, &transport);

    let ids = assert_ok!(engine.activate(panel));
    assert_eq!(ids.len(), 1);
    assert_eq!(transport.created(), 1);
    assert_eq!(transport.handle(0).request().url, "http://app.test/ok");
    assert!(engine.connection(good).is_some());
    assert!(engine.connection(bad).is_none());
}

#[tokio::test]
async fn test_global_factory_override() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");

    set_transport_factory(Arc::new(transport.clone()));
    let engine = SseEngine::new(Arc::clone(&host), EngineConfig::default());
    reset_transport_factory();

    assert_ok!(engine.activate(owner));
    assert_eq!(transport.created(), 1);
}

// ========== Messages ==========

#[tokio::test]
async fn test_oob_only_message() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    host.append(host.root(), &[("id", "x")]);
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    let source = transport.last();
    source.open().await;
    source
        .message("update", r#"<div hx-swap-oob="true" id="x">hi</div>"#)
        .await;
    run_pending().await;

    assert_eq!(
        host.oob_placements(),
        vec![("true".to_string(), "x".to_string(), "hi".to_string())]
    );
    assert!(host.swaps().is_empty());

    let messages = host.events_named("htmx:sseMessage");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, owner);
    assert_eq!(messages[0].1["name"], "update");
}

#[tokio::test]
async fn test_oob_and_named_swap_happen_once_each() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    let list = host.append(owner, &[("sse-swap", "update"), ("hx-swap", "beforeend settle:0")]);
    host.append(host.root(), &[("id", "count")]);
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    let source = transport.last();
    source.open().await;
    let payload = r#"<li>row</li><div hx-swap-oob="true" id="count">3</div>"#;
    source.message("update", payload).await;
    run_pending().await;

    assert_eq!(host.oob_placements().len(), 1);
    let swaps = host.swaps();
    assert_eq!(swaps.len(), 1);
    assert_eq!(swaps[0].target, list);
    assert_eq!(swaps[0].content, payload);
    assert_eq!(host.events_named("htmx:sseMessage").len(), 1);
}

#[tokio::test]
async fn test_unsubscribed_events_are_dropped() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    host.append(owner, &[("sse-swap", "other"), ("hx-swap", "settle:0")]);
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    let source = transport.last();
    source.open().await;
    source.message("other", "<p>x</p>").await;
    run_pending().await;

    assert!(host.swaps().is_empty());
    assert!(host.events_named("htmx:sseMessage").is_empty());
    assert_eq!(host.event_names_for(owner), vec!["htmx:sseOpen"]);
}

#[tokio::test]
async fn test_message_carries_last_event_id() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    let mut event = SseEvent::new("update", "payload");
    event.id = Some("17".to_string());
    transport.last().send(TransportEvent::Message(event)).await;
    run_pending().await;

    let messages = host.events_named("htmx:sseMessage");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].1["data"], "payload");
    assert_eq!(messages[0].1["lastEventId"], "17");
}

#[tokio::test(start_paused = true)]
async fn test_every_before_settle_gets_one_after_settle() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    let target = host.append(owner, &[("sse-swap", "update"), ("hx-swap", "innerHTML settle:100ms")]);
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    let source = transport.last();
    source.open().await;
    for n in 0..3 {
        source.message("update", &n.to_string()).await;
    }
    run_pending().await;

    let count = |name: &str| {
        host.event_names_for(target)
            .iter()
            .filter(|n| n.as_str() == name)
            .count()
    };
    assert_eq!(count("htmx:beforeSettle"), 3);
    assert_eq!(count("htmx:afterSettle"), 0);
    assert!(host.has_class(target, "htmx-settling"));

    advance(150).await;
    assert_eq!(count("htmx:beforeSettle"), 3);
    assert_eq!(count("htmx:afterSettle"), 3);
    assert!(!host.has_class(target, "htmx-settling"));
}

// ========== Errors and retries ==========

#[tokio::test(start_paused = true)]
async fn test_terminal_error_schedules_retry() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    transport.handle(0).fail().await;
    run_pending().await;

    assert_eq!(host.events_named("htmx:sseError").len(), 1);
    let retry = engine.pending_retry(owner).unwrap();
    assert!(retry.delay < Duration::from_millis(500));
    assert_eq!(retry.retry_count, 1);
    assert!(engine.connection(owner).is_none());

    advance(500).await;
    assert_eq!(transport.created(), 2);
    assert!(transport.handle(1).is_started());
    assert_eq!(engine.retry_count(owner), Some(1));
    assert!(engine.pending_retry(owner).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_retry_count_is_capped() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    for failure in 1..=10u32 {
        transport.last().fail().await;
        run_pending().await;

        let retry = engine.pending_retry(owner).unwrap();
        assert_eq!(retry.retry_count, failure.min(7));
        assert!(retry.delay < Duration::from_millis(500 << 7));

        advance(64_001).await;
        let count = engine.retry_count(owner).unwrap();
        assert!(count <= 7);
    }
    assert_eq!(engine.retry_count(owner), Some(7));
    assert_eq!(transport.created(), 11);
}

#[tokio::test(start_paused = true)]
async fn test_open_resets_retry_count() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    transport.last().fail().await;
    run_pending().await;
    advance(500).await;
    assert_eq!(engine.retry_count(owner), Some(1));

    transport.last().open().await;
    run_pending().await;
    assert_eq!(engine.retry_count(owner), Some(0));
    assert_eq!(engine.connection_status(owner), Some(ConnectionStatus::Open));

    transport.last().fail().await;
    run_pending().await;
    let retry = engine.pending_retry(owner).unwrap();
    assert_eq!(retry.retry_count, 1);
    assert!(retry.delay < Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_non_terminal_error_only_notifies() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    let source = transport.last();
    source.open().await;
    source.fail_transient().await;
    source.message("update", "still here").await;
    run_pending().await;

    assert_eq!(host.events_named("htmx:sseError").len(), 1);
    assert!(engine.pending_retry(owner).is_none());
    assert_eq!(engine.connection_status(owner), Some(ConnectionStatus::Open));
    assert_eq!(host.events_named("htmx:sseMessage").len(), 1);

    advance(1000).await;
    assert_eq!(transport.created(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_clean_end_is_not_retried() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    transport.last().open().await;
    transport.last().end().await;
    run_pending().await;
    advance(1000).await;

    assert_eq!(engine.connection_status(owner), Some(ConnectionStatus::Closed));
    assert!(engine.pending_retry(owner).is_none());
    assert_eq!(engine.live_connections(), 0);
    assert!(host.events_named("htmx:sseError").is_empty());

    assert_ok!(engine.activate(owner));
    assert_eq!(transport.created(), 2);
    assert_eq!(engine.live_connections(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refused_start_notifies_and_retries() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    transport.refuse_starts(1);
    let owner = stream_owner(&host, "update");
    let engine = engine(&host, &transport);

    let ids = assert_ok!(engine.activate(owner));
    assert_eq!(ids.len(), 1);
    run_pending().await;

    let errors = host.events_named("htmx:sseError");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, owner);
    assert_eq!(errors[0].1["source"], ids[0].to_string());
    assert_eq!(engine.pending_retry(owner).unwrap().retry_count, 1);

    advance(500).await;
    assert_eq!(transport.created(), 2);
    assert!(transport.handle(1).is_started());
    assert_eq!(engine.connection_status(owner), Some(ConnectionStatus::Connecting));
    assert_eq!(engine.retry_count(owner), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_refused_reconnect_keeps_retrying() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    transport.last().fail().await;
    run_pending().await;
    assert_eq!(engine.pending_retry(owner).unwrap().retry_count, 1);

    transport.refuse_starts(1);
    advance(500).await;
    assert_eq!(transport.created(), 2);
    assert!(!transport.handle(1).is_started());
    assert_eq!(host.events_named("htmx:sseError").len(), 2);
    let retry = engine.pending_retry(owner).unwrap();
    assert_eq!(retry.retry_count, 2);
    assert!(retry.delay < Duration::from_millis(1000));

    advance(1000).await;
    assert_eq!(transport.created(), 3);
    assert!(transport.handle(2).is_started());
    assert_eq!(engine.retry_count(owner), Some(2));
    assert!(engine.pending_retry(owner).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_retry_ignores_invalid_descendant() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    host.append(owner, &[("hx-sse-get", "http://[broken")]);
    let engine = engine(&host, &transport);

    assert_eq!(assert_ok!(engine.activate(owner)).len(), 1);
    transport.last().fail().await;
    run_pending().await;
    advance(500).await;

    assert_eq!(transport.created(), 2);
    assert_eq!(transport.handle(1).request().url, "http://app.test/updates");
    assert!(engine.connection(owner).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_retry_uses_current_form_values() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    host.set_inputs(owner, vec![("cursor", FormValue::from("1"))]);
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    transport.last().fail().await;
    run_pending().await;
    host.set_inputs(owner, vec![("cursor", FormValue::from("2"))]);
    advance(500).await;

    assert_eq!(transport.created(), 2);
    assert_eq!(transport.last().request().payload.as_deref(), Some("cursor=2"));
}

// ========== Cancellation ==========

#[tokio::test(start_paused = true)]
async fn test_removal_cancels_pending_retry() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    transport.last().fail().await;
    run_pending().await;
    assert!(engine.pending_retry(owner).is_some());

    assert_ok!(engine.on_event("htmx:beforeCleanupElement", owner));
    host.remove(owner);
    advance(1000).await;

    assert_eq!(transport.created(), 1);
    assert!(engine.connection(owner).is_none());
    assert!(engine.pending_retry(owner).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_retry_for_detached_owner_is_dropped() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    transport.last().fail().await;
    run_pending().await;

    // detached without the cleanup hook
    host.remove(owner);
    advance(1000).await;

    assert_eq!(transport.created(), 1);
    assert!(engine.pending_retry(owner).is_none());
    assert!(engine.connection(owner).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_retry_dropped_when_declaration_removed() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    transport.last().fail().await;
    run_pending().await;
    host.remove_attribute(owner, "hx-sse-post");
    advance(1000).await;

    assert_eq!(transport.created(), 1);
    assert!(engine.pending_retry(owner).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_fresh_activation_replaces_pending_retry() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    transport.last().fail().await;
    run_pending().await;
    assert!(engine.pending_retry(owner).is_some());

    assert_ok!(engine.activate(owner));
    assert!(engine.pending_retry(owner).is_none());
    assert_eq!(engine.retry_count(owner), Some(0));

    advance(1000).await;
    assert_eq!(transport.created(), 2);
    assert_eq!(engine.live_connections(), 1);
}

#[tokio::test]
async fn test_callbacks_after_removal_are_discarded() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    host.append(owner, &[("sse-swap", "update"), ("hx-swap", "settle:0")]);
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    let stale = transport.last();
    engine.remove(owner);

    stale.open().await;
    stale.message("update", "late").await;
    stale.fail().await;
    run_pending().await;

    assert!(host.events().is_empty());
    assert!(host.swaps().is_empty());
    assert!(engine.pending_retry(owner).is_none());
}

#[tokio::test]
async fn test_replaced_connection_callbacks_are_discarded() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    let old = transport.last();
    engine.remove(owner);
    assert_ok!(engine.activate(owner));
    let current = transport.last();

    old.open().await;
    current.open().await;
    run_pending().await;

    let opened = host.events_named("htmx:sseOpen");
    assert_eq!(opened.len(), 1);
    let connection = engine.connection(owner).unwrap();
    assert_eq!(opened[0].1["source"], connection.id().to_string());
}

#[tokio::test]
async fn test_detached_owner_is_torn_down_on_next_event() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let owner = stream_owner(&host, "update");
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(owner));
    host.remove(owner);
    transport.last().message("update", "orphan").await;
    run_pending().await;

    assert!(host.events().is_empty());
    assert!(engine.connection(owner).is_none());
    assert!(transport.handle(0).is_closed());
}

#[tokio::test]
async fn test_ended_stream_of_detached_owner_is_released() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let first = stream_owner(&host, "update");
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(first));
    transport.last().open().await;
    transport.last().end().await;
    run_pending().await;
    assert_eq!(engine.connection_status(first), Some(ConnectionStatus::Closed));

    host.remove(first);
    let second = stream_owner(&host, "update");
    assert_ok!(engine.activate(second));

    assert!(engine.connection(first).is_none());
    assert!(engine.connection(second).is_some());
}

#[tokio::test]
async fn test_shutdown_releases_everything() {
    let host = Arc::new(TestHost::new());
    let transport = ScriptedTransport::new();
    let a = stream_owner(&host, "update");
    let b = stream_owner(&host, "update");
    let engine = engine(&host, &transport);

    assert_ok!(engine.activate(a));
    assert_ok!(engine.activate(b));
    assert_eq!(engine.live_connections(), 2);

    engine.shutdown();
    assert_eq!(engine.live_connections(), 0);
    assert!(transport.handle(0).is_closed());
    assert!(transport.handle(1).is_closed());
    assert!(host.is_live(a));
}
