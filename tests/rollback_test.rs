//! Rollback of failed flows
//!
//! These tests verify that:
//! 1. Completed nodes are reverted in reverse dependency order
//! 2. A failing revert does not stop the rollback
//! 3. Nothing new is scheduled once a node failed
//! 4. The surfaced error resolves its status and message from the store

mod common;

use common::{init_tracing, new_store, recorded, Journal, Step};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use switchyard::codec::{JsonCodec, JsonConstructor, Schema};
use switchyard::executor::{Pass, Tracker};
use switchyard::prelude::*;
use switchyard::store::ERROR_RESOURCE;

struct Panics;

#[async_trait]
impl Call for Panics {
    async fn call(&self, _cancel: &CancellationToken, _store: &dyn Store) -> CallResult {
        panic!("ledger corrupted");
    }
}

#[tokio::test]
async fn test_failure_reverts_completed_nodes_in_reverse_order() {
    init_tracing();
    let journal = Journal::new();

    let flow = Flow::new(
        "chain",
        vec![
            recorded("a", &journal),
            recorded("b", &journal).depends_on(["a"]),
            Node::new("c")
                .depends_on(["b"])
                .with_call(Step::new("c", &journal).failing())
                .with_revert(Step::new("revert:c", &journal)),
        ],
    )
    .unwrap();

    let err = flow.invoke(new_store()).await.unwrap_err();

    assert!(err.is_abort_flow());
    assert_eq!(err.node().map(NodeId::as_str), Some("c"));
    assert_eq!(journal.entries(), vec!["a", "b", "c", "revert:b", "revert:a"]);
}

#[tokio::test]
async fn test_failing_revert_does_not_stop_rollback() {
    init_tracing();
    let journal = Journal::new();

    let flow = Flow::new(
        "best-effort",
        vec![
            recorded("a", &journal),
            Node::new("b")
                .depends_on(["a"])
                .with_call(Step::new("b", &journal))
                .with_revert(Step::new("revert:b", &journal).failing()),
            Node::new("c")
                .depends_on(["b"])
                .with_call(Step::new("c", &journal).failing()),
        ],
    )
    .unwrap();

    flow.invoke(new_store()).await.unwrap_err();

    assert_eq!(journal.count("revert:b"), 1);
    assert_eq!(journal.count("revert:a"), 1);
    journal.assert_order("revert:b", "revert:a");
}

#[tokio::test]
async fn test_nothing_is_scheduled_after_failure() {
    init_tracing();
    let journal = Journal::new();

    let flow = Flow::new(
        "abort",
        vec![
            recorded("a", &journal),
            Node::new("b")
                .depends_on(["a"])
                .with_call(Step::new("b", &journal).failing()),
            Node::new("c")
                .depends_on(["a"])
                .with_call(Step::new("c", &journal).delayed(50))
                .with_revert(Step::new("revert:c", &journal)),
            recorded("d", &journal).depends_on(["c"]),
        ],
    )
    .unwrap();

    flow.invoke(new_store()).await.unwrap_err();

    assert_eq!(journal.count("c"), 1);
    assert_eq!(journal.count("d"), 0);
    assert_eq!(journal.count("revert:d"), 0);
    assert_eq!(journal.count("revert:c"), 1);
    assert_eq!(journal.count("revert:a"), 1);
    journal.assert_order("revert:c", "revert:a");
}

#[tokio::test]
async fn test_diamond_rollback_reverts_root_once() {
    let journal = Journal::new();

    let flow = Flow::new(
        "diamond",
        vec![
            recorded("a", &journal),
            recorded("b", &journal).depends_on(["a"]),
            recorded("c", &journal).depends_on(["a"]),
            Node::new("d")
                .depends_on(["b", "c"])
                .with_call(Step::new("d", &journal).failing()),
        ],
    )
    .unwrap();

    flow.invoke(new_store()).await.unwrap_err();

    assert_eq!(journal.count("revert:a"), 1);
    journal.assert_order("revert:b", "revert:a");
    journal.assert_order("revert:c", "revert:a");
}

struct StopRollback;

#[async_trait]
impl NodeMiddleware for StopRollback {
    async fn before_rollback(&self, _node: &Node, _store: &dyn Store) -> Result<(), BoxError> {
        Err("rollback vetoed".into())
    }
}

#[tokio::test]
async fn test_before_rollback_hook_stops_walk() {
    let journal = Journal::new();

    let flow = Flow::new(
        "veto",
        vec![
            recorded("a", &journal),
            recorded("b", &journal).depends_on(["a"]).with_middleware(StopRollback),
            Node::new("c")
                .depends_on(["b"])
                .with_call(Step::new("c", &journal).failing()),
        ],
    )
    .unwrap();

    let err = flow.invoke(new_store()).await.unwrap_err();

    assert_eq!(err.node().map(NodeId::as_str), Some("c"));
    assert_eq!(journal.count("revert:b"), 0);
    assert_eq!(journal.count("revert:a"), 0);
}

#[tokio::test]
async fn test_manual_rollback_reverts_marked_nodes() {
    let journal = Journal::new();

    let flow = Flow::new(
        "manual",
        vec![
            recorded("a", &journal),
            recorded("b", &journal).depends_on(["a"]),
            recorded("c", &journal).depends_on(["b"]),
        ],
    )
    .unwrap();

    let tracker = Arc::new(Tracker::new(flow.nodes().len()));
    tracker.mark(flow.index_of("a").unwrap(), Pass::Forward);
    tracker.mark(flow.index_of("b").unwrap(), Pass::Forward);

    flow.rollback(Arc::clone(&tracker), new_store()).await.unwrap();

    assert_eq!(journal.entries(), vec!["revert:b", "revert:a"]);
    for node in flow.nodes() {
        assert!(tracker.completed(node.index(), Pass::Rollback));
    }

    let a = tracker.ledger(flow.index_of("a").unwrap(), Pass::Rollback);
    assert_eq!(a.hits, 1);
    assert_eq!(a.scheduled, 1);
}

#[tokio::test]
async fn test_panicking_call_fails_flow_and_reverts() {
    init_tracing();
    let journal = Journal::new();

    let flow = Flow::new(
        "panic",
        vec![
            recorded("a", &journal),
            Node::new("b")
                .depends_on(["a"])
                .with_call(Panics)
                .with_revert(Step::new("revert:b", &journal)),
            recorded("c", &journal).depends_on(["b"]),
        ],
    )
    .unwrap();

    let err = flow.invoke(new_store()).await.unwrap_err();

    let FlowError::Node { node, source, .. } = &err else {
        panic!("expected a node error, got {err}");
    };
    assert_eq!(node.as_str(), "b");
    assert!(matches!(
        source,
        NodeFailure::Panicked { pass: Pass::Forward, message } if message == "ledger corrupted"
    ));
    assert_eq!(journal.entries(), vec!["a", "revert:a"]);
}

#[tokio::test]
async fn test_panicking_revert_does_not_stop_rollback() {
    let journal = Journal::new();

    let flow = Flow::new(
        "panic-revert",
        vec![
            recorded("a", &journal),
            Node::new("b")
                .depends_on(["a"])
                .with_call(Step::new("b", &journal))
                .with_revert(Panics),
            Node::new("c")
                .depends_on(["b"])
                .with_call(Step::new("c", &journal).failing()),
        ],
    )
    .unwrap();

    let err = flow.invoke(new_store()).await.unwrap_err();

    assert_eq!(err.node().map(NodeId::as_str), Some("c"));
    assert_eq!(journal.count("revert:a"), 1);
}

struct Remote {
    status: i32,
    body: &'static [u8],
}

#[async_trait]
impl Transport for Remote {
    async fn send(
        &self,
        _cancel: &CancellationToken,
        writer: &mut ResponseWriter,
        _request: &Request,
        _store: &dyn Store,
    ) -> Result<(), TransportError> {
        writer.header_status(self.status);
        writer.write_all(self.body).map_err(TransportError::failed)
    }
}

fn remote_call(name: &str, status: i32, body: &'static [u8]) -> Caller {
    let options = CallerOptions {
        transport: Some(Arc::new(Remote { status, body })),
        ..Default::default()
    }
    .with_error_codec(&JsonConstructor, Some(Schema::new(["meta"])))
    .unwrap();

    Caller::new(name, options)
}

#[tokio::test]
async fn test_abort_flow_resolves_error_handle() {
    init_tracing();
    let journal = Journal::new();

    let on_error = ErrorHandle::new()
        .with_status(Property::literal(json!(401)))
        .with_message(Property::reference(ERROR_RESOURCE, "meta.message"));

    let flow = Flow::new(
        "unauthorized",
        vec![
            recorded("session", &journal),
            Node::new("account")
                .depends_on(["session"])
                .with_call(remote_call(
                    "account",
                    401,
                    br#"{"meta": {"message": "token expired"}}"#,
                ))
                .with_on_error(on_error),
        ],
    )
    .unwrap();

    let store = new_store();
    let err = flow.invoke(store.clone()).await.unwrap_err();

    assert!(err.is_abort_flow());
    assert_eq!(err.status(store.as_ref()), 401);
    assert_eq!(err.message(store.as_ref()), "token expired");
    assert_eq!(journal.count("revert:session"), 1);
}

#[tokio::test]
async fn test_error_without_handle_reports_internal_error() {
    let remote = Node::new("remote").with_call(remote_call("remote", 503, b""));
    let flow = Flow::new("bare", vec![remote]).unwrap();

    let store = new_store();
    let err = flow.invoke(store.clone()).await.unwrap_err();

    assert_eq!(err.status(store.as_ref()), 500);
    assert!(err.message(store.as_ref()).contains("remote"));
}

#[tokio::test]
async fn test_expected_status_lets_flow_continue() {
    let journal = Journal::new();

    let created = Caller::new(
        "create",
        CallerOptions {
            transport: Some(Arc::new(Remote {
                status: 201,
                body: br#"{"id": "u-1"}"#,
            })),
            response: Payload::new().with_codec(Arc::new(JsonCodec::new("user", None))),
            expected_status: vec![200, 201],
            ..Default::default()
        },
    );

    let flow = Flow::new(
        "create-user",
        vec![
            Node::new("create").with_call(created),
            recorded("welcome", &journal).depends_on(["create"]),
        ],
    )
    .unwrap();

    let store = new_store();
    flow.invoke(store.clone()).await.unwrap();

    assert_eq!(store.load("user", "id").unwrap().value, json!("u-1"));
    assert_eq!(journal.entries(), vec!["welcome"]);
}
