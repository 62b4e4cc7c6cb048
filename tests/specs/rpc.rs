//! RPC surface scenarios: triggers over HTTP, camelCase aliasing on
//! the wire, and the failed-precondition envelope.

use crate::prelude::*;
use axum::http::StatusCode;

#[tokio::test]
async fn trigger_rpc_moves_the_machine() {
    let app = cell_app(cell_builder());

    let (status, body) = post_rpc(app.router.clone(), "Trigger_Start").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "start");
    assert_eq!(body["previousState"], "ready");
    assert_eq!(body["newState"], "operation_picking");

    assert_eq!(app.machine.state(), "operation_picking");
}

#[tokio::test]
async fn disallowed_trigger_returns_failed_precondition_envelope() {
    let app = cell_app(cell_builder());

    // Current state is ready; finished_picking is not available.
    let (status, body) = post_rpc(app.router, "Trigger_FinishedPicking").await;

    // Connect errors ride on HTTP 200 with the JSON envelope.
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"]["code"], "failed_precondition");
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("finished_picking"));
    assert!(message.contains("ready"));
    assert!(message.contains("start"), "names the allowed triggers");
}

#[tokio::test]
async fn get_state_is_camel_cased_on_the_wire() {
    let app = cell_app(cell_builder());
    post_rpc(app.router.clone(), "Trigger_Start").await;

    let (_, body) = post_rpc(app.router, "GetState").await;
    assert_eq!(body["state"], "operation_picking");
    assert_eq!(body["lastState"], "operation_picking");
    assert!(body.get("last_state").is_none());
}

#[tokio::test]
async fn get_history_is_camel_cased_on_the_wire() {
    let app = cell_app(cell_builder());
    post_rpc(app.router.clone(), "Trigger_Start").await;
    post_rpc(app.router.clone(), "Trigger_FinishedPicking").await;

    let (_, body) = post_rpc(app.router, "GetHistory").await;
    assert_eq!(body["bufferSize"], 1000);

    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["state"], "operation_picking");
    assert!(history[0]["durationMs"].is_u64());
    assert!(history[0].get("duration_ms").is_none());
    assert_eq!(history[1]["state"], "operation_placing");
}

#[tokio::test]
async fn get_history_window_over_rpc() {
    let app = cell_app(cell_builder());
    post_rpc(app.router.clone(), "Trigger_Start").await;
    post_rpc(app.router.clone(), "Trigger_FinishedPicking").await;
    post_rpc(app.router.clone(), "Trigger_ToFault").await;

    let (_, body) = post_rpc_json(app.router, "GetHistory", serde_json::json!({"last": 1})).await;
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["state"], "fault");
}

#[tokio::test]
async fn state_diagram_over_rpc() {
    let app = cell_app(cell_builder());
    let (_, body) = post_rpc(app.router, "GetStateDiagram").await;
    let dot = body["dot"].as_str().unwrap();
    assert!(dot.contains("subgraph \"cluster_operation\""));
    assert!(dot.contains("[label=\"to_fault\"];"));
}

#[tokio::test]
async fn reset_after_fault_over_rpc() {
    let app = cell_app(cell_builder());

    post_rpc(app.router.clone(), "Trigger_Start").await;
    let (_, body) = post_rpc(app.router.clone(), "Trigger_ToFault").await;
    assert_eq!(body["newState"], "fault");

    let (_, body) = post_rpc(app.router.clone(), "Trigger_Reset").await;
    assert_eq!(body["newState"], "ready");
    assert_eq!(app.machine.state(), "ready");
}

#[tokio::test]
async fn recovery_trigger_is_exposed_as_an_rpc() {
    let app = cell_app(cell_builder());

    post_rpc(app.router.clone(), "Trigger_Start").await;
    post_rpc(app.router.clone(), "Trigger_FinishedPicking").await;
    post_rpc(app.router.clone(), "Trigger_ToFault").await;
    post_rpc(app.router.clone(), "Trigger_Reset").await;

    let (_, body) = post_rpc(app.router, "Trigger_RecoverOperationPlacing").await;
    assert_eq!(body["newState"], "operation_placing");
    assert_eq!(app.machine.state(), "operation_placing");
}
