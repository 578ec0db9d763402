// ABOUTME: End-to-end router tests: event dispatch, RPC reply, middleware short-circuit, validation failure

use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wirelink::envelope::JsonMessageSchema;
use wirelink::server::{InMemoryConnection, Router};

#[tokio::test]
async fn test_event_route_dispatches_and_handler_can_reply() {
    let mut router = Router::new();
    let schema = JsonMessageSchema::new(
        "PING",
        json!({"type": "object", "properties": {}}),
        None,
    )
    .unwrap();

    router
        .on(schema, |ctx| async move {
            ctx.send("PONG", wirelink::envelope::Meta::new(), None::<()>).await
        })
        .unwrap();

    let router = Arc::new(router);
    let conn = InMemoryConnection::new("c1");
    router.handle_open(conn.clone()).await;
    router.handle_message("c1", r#"{"type":"PING","meta":{}}"#).await;

    let frames = conn.sent_frames().await;
    assert_eq!(frames.len(), 1);
    assert!(frames[0].contains("\"type\":\"PONG\""));
}

#[tokio::test]
async fn test_rpc_route_reply_carries_request_correlation_id() {
    let mut router = Router::new();
    let request_schema = JsonMessageSchema::new(
        "GET_TIME",
        json!({"type": "object", "properties": {"correlationId": {"type": "string"}}, "required": ["correlationId"]}),
        None,
    )
    .unwrap();
    let reply_schema = JsonMessageSchema::new(
        "GET_TIME_REPLY",
        json!({"type": "object", "properties": {}}),
        Some(json!({"type": "object", "properties": {"now": {"type": "number"}}, "required": ["now"]})),
    )
    .unwrap();

    router
        .rpc(request_schema, reply_schema, |ctx| async move {
            ctx.reply(json!({"now": 1234}), None).await
        })
        .unwrap();

    let router = Arc::new(router);
    let conn = InMemoryConnection::new("c1");
    router.handle_open(conn.clone()).await;
    router
        .handle_message("c1", r#"{"type":"GET_TIME","meta":{"correlationId":"r1"}}"#)
        .await;

    let frames = conn.sent_frames().await;
    assert_eq!(frames.len(), 1);
    let value: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
    assert_eq!(value["type"], "GET_TIME_REPLY");
    assert_eq!(value["meta"]["correlationId"], "r1");
    assert_eq!(value["payload"]["now"], 1234);
}

#[tokio::test]
async fn test_middleware_short_circuit_prevents_handler_from_running() {
    let mut router = Router::new();
    let schema = JsonMessageSchema::new("PING", json!({"type": "object", "properties": {}}), None).unwrap();
    let handled = Arc::new(AtomicBool::new(false));
    let h = Arc::clone(&handled);

    router
        .on(schema, move |_ctx| {
            let h = Arc::clone(&h);
            async move {
                h.store(true, Ordering::SeqCst);
                Ok(())
            }
        })
        .unwrap();

    router.use_global(Arc::new(|_ctx, _next| {
        Box::pin(async { Ok(()) }) as wirelink::server::middleware::BoxFuture<'static, wirelink::error::Result<()>>
    }));

    let router = Arc::new(router);
    let conn = InMemoryConnection::new("c1");
    router.handle_open(conn.clone()).await;
    router.handle_message("c1", r#"{"type":"PING","meta":{}}"#).await;

    assert!(!handled.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_validation_failure_sends_error_without_invoking_handler() {
    let mut router = Router::new();
    let schema = JsonMessageSchema::new(
        "JOIN",
        json!({"type": "object", "properties": {"room": {"type": "string"}}, "required": ["room"]}),
        None,
    )
    .unwrap();
    let handled = Arc::new(AtomicBool::new(false));
    let h = Arc::clone(&handled);

    router
        .on(schema, move |_ctx| {
            let h = Arc::clone(&h);
            async move {
                h.store(true, Ordering::SeqCst);
                Ok(())
            }
        })
        .unwrap();

    let router = Arc::new(router);
    let conn = InMemoryConnection::new("c1");
    router.handle_open(conn.clone()).await;
    router.handle_message("c1", r#"{"type":"JOIN","meta":{}}"#).await;

    assert!(!handled.load(Ordering::SeqCst));
    let frames = conn.sent_frames().await;
    assert_eq!(frames.len(), 1);
    assert!(frames[0].contains("\"type\":\"ERROR\""));
}
