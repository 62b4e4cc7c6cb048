// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ConnectRPC router: unary and server-streaming endpoints.
//!
//! Every RPC is a POST under `/<service_fqn>/<RpcName>`. Unary calls
//! answer JSON; application errors come back as HTTP-200 envelopes,
//! which is how Connect clients expect them. Stream calls answer a
//! chunked body of length-prefixed frames fed from a fresh broker
//! subscription; dropping the response body (client disconnect)
//! drops the subscription.

use crate::frame;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue};
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use indexmap::IndexMap;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use vapp_broker::Broker;
use vapp_rpc::bundle::{ActionHandler, RpcBundle};
use vapp_rpc::schema::{alias_value, dealias_value, MessageSchema};
use vapp_rpc::{ErrorCode, RpcError};

/// Media type for both unary and streaming responses.
pub const CONTENT_TYPE: &str = "application/connect+json";

type Types = Arc<IndexMap<String, MessageSchema>>;

/// Build the axum router for a unified bundle.
///
/// `service_fqn` is the fully-qualified service name
/// (`vention.app.v1.<Name>Service`); the caller nests the result
/// under its mount prefix.
pub fn connect_router(service_fqn: &str, bundle: &RpcBundle, broker: &Broker) -> Router {
    let types: Types = Arc::new(bundle.types.clone());
    let mut router = Router::new();

    for action in &bundle.actions {
        let path = format!("/{}/{}", service_fqn, action.name);
        let handler = action.handler.clone();
        let input_type = action.input_type.clone();
        let output_type = action.output_type.clone();
        let types = Arc::clone(&types);
        tracing::debug!(%path, "mounting unary rpc");
        router = router.route(
            &path,
            post(move |body: Bytes| {
                let handler = handler.clone();
                let input_type = input_type.clone();
                let output_type = output_type.clone();
                let types = Arc::clone(&types);
                async move { unary_response(handler, input_type, output_type, types, body).await }
            }),
        );
    }

    for stream in &bundle.streams {
        let path = format!("/{}/{}", service_fqn, stream.name);
        let name = stream.name.clone();
        let payload_type = stream.payload_type.clone();
        let broker = broker.clone();
        let types = Arc::clone(&types);
        tracing::debug!(%path, "mounting stream rpc");
        router = router.route(
            &path,
            post(move || {
                let name = name.clone();
                let payload_type = payload_type.clone();
                let broker = broker.clone();
                let types = Arc::clone(&types);
                async move { stream_response(broker, name, payload_type, types) }
            }),
        );
    }

    router
}

async fn unary_response(
    handler: ActionHandler,
    input_type: Option<String>,
    output_type: Option<String>,
    types: Types,
    body: Bytes,
) -> Response {
    let input: Option<Value> = if body.is_empty() {
        None
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(mut value) => {
                // Requests may use camelCase aliases or field names;
                // handlers only ever see field names.
                if let Some(type_name) = &input_type {
                    dealias_value(&types, type_name, &mut value);
                }
                Some(value)
            }
            Err(err) => {
                return envelope_response(&RpcError::invalid_argument(format!(
                    "malformed request body: {err}"
                )))
            }
        }
    };

    match handler(input).await {
        Ok(mut output) => {
            if let Some(type_name) = &output_type {
                alias_value(&types, type_name, &mut output);
            }
            json_response(&output)
        }
        Err(err) => {
            if err.code == ErrorCode::Internal {
                tracing::error!(code = %err.code, message = %err.message, "rpc failed");
            }
            envelope_response(&err)
        }
    }
}

fn stream_response(
    broker: Broker,
    name: String,
    payload_type: Option<String>,
    types: Types,
) -> Response {
    let subscription = match broker.subscribe(&name) {
        Ok(subscription) => subscription,
        Err(err) => {
            return envelope_response(&RpcError::new(ErrorCode::NotFound, err.to_string()))
        }
    };

    let stream = async_stream::stream! {
        let mut subscription = subscription;
        while let Some(mut item) = subscription.recv().await {
            if let Some(type_name) = &payload_type {
                alias_value(&types, type_name, &mut item);
            }
            match frame::encode_data_frame(&item) {
                Ok(bytes) => yield Ok::<Bytes, Infallible>(Bytes::from(bytes)),
                Err(err) => {
                    tracing::error!(stream = %name, %err, "failed to frame stream item");
                    let trailer = RpcError::internal(err.to_string());
                    if let Ok(bytes) = frame::encode_trailer_frame(&trailer) {
                        yield Ok(Bytes::from(bytes));
                    }
                    break;
                }
            }
        }
        // Subscription drops here: handler exit implies unsubscribe,
        // on clean close and client disconnect alike.
    };

    let mut response = Response::new(Body::from_stream(stream));
    set_content_type(&mut response);
    response.headers_mut().insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    response
}

fn json_response(value: &Value) -> Response {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    let mut response = Response::new(Body::from(bytes));
    set_content_type(&mut response);
    response
}

/// Error envelope: HTTP 200 with the same media type, per Connect
/// JSON semantics.
fn envelope_response(err: &RpcError) -> Response {
    json_response(&err.envelope())
}

fn set_content_type(response: &mut Response) {
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
