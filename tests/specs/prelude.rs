//! Shared fixtures for the behavioral specs.

#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use vapp_broker::{Broker, StreamDescriptor};
use vapp_core::{StateSpec, TransitionSpec};
use vapp_fsm::bundle::{machine_bundle, wire_state_stream, STATE_CHANGE_STREAM};
use vapp_fsm::{Machine, MachineBuilder};
use vapp_server::{App, AppConfig};

/// Service FQN for the fixture app (`AppConfig::named("starter cell")`).
pub const SERVICE_FQN: &str = "vention.app.v1.StarterCellService";

/// The pick/place/homing cell used across scenarios.
pub fn cell_builder() -> MachineBuilder {
    MachineBuilder::new()
        .state(StateSpec::compound(
            "operation",
            [
                StateSpec::leaf("picking"),
                StateSpec::leaf("placing"),
                StateSpec::leaf("homing"),
            ],
        ))
        .transitions([
            TransitionSpec::new("finished_picking", "operation_picking", "operation_placing"),
            TransitionSpec::new("finished_placing", "operation_placing", "operation_homing"),
            TransitionSpec::new("finished_homing", "operation_homing", "operation_picking"),
        ])
        .initial("operation")
}

/// A finalized app around one cell machine with its state stream wired.
pub struct CellApp {
    pub router: axum::Router,
    pub broker: Broker,
    pub machine: Machine,
}

pub fn cell_app(builder: MachineBuilder) -> CellApp {
    let mut app = App::new(AppConfig::named("starter cell"));
    app.broker()
        .register(StreamDescriptor::new(STATE_CHANGE_STREAM))
        .unwrap();
    let publisher = app.broker().publisher(STATE_CHANGE_STREAM).unwrap();
    let machine = wire_state_stream(builder, publisher).build().unwrap();
    app.register_bundle(machine_bundle(&machine)).unwrap();
    let finalized = app.finalize().unwrap();
    CellApp {
        router: finalized.router,
        broker: finalized.broker,
        machine,
    }
}

/// Path of an RPC on the fixture service, mounted prefix included.
pub fn rpc_path(rpc: &str) -> String {
    format!("/rpc/{SERVICE_FQN}/{rpc}")
}

/// POST with an empty body and parse the JSON response.
pub async fn post_rpc(router: axum::Router, rpc: &str) -> (StatusCode, Value) {
    post_rpc_body(router, rpc, Body::empty()).await
}

/// POST an input message and parse the JSON response.
pub async fn post_rpc_json(router: axum::Router, rpc: &str, input: Value) -> (StatusCode, Value) {
    post_rpc_body(router, rpc, Body::from(input.to_string())).await
}

async fn post_rpc_body(router: axum::Router, rpc: &str, body: Body) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(rpc_path(rpc))
        .header("content-type", "application/connect+json")
        .body(body)
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Open a server-stream RPC and return its body for frame reads.
pub async fn open_stream(router: axum::Router, rpc: &str) -> Body {
    let request = Request::builder()
        .method("POST")
        .uri(rpc_path(rpc))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "application/connect+json"
    );
    response.into_body()
}

/// Read the next data frame off a stream body and parse its payload.
pub async fn next_frame(body: &mut Body) -> Value {
    let chunk: Bytes = body
        .frame()
        .await
        .expect("stream ended")
        .unwrap()
        .into_data()
        .expect("expected a data chunk");
    let (frame, consumed) = vapp_server::frame::decode_frame(&chunk).unwrap();
    assert_eq!(consumed, chunk.len(), "one frame per chunk");
    assert!(!frame.is_trailer());
    frame.json().unwrap()
}
