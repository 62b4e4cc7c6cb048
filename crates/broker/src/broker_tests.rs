// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::topic::StreamPolicy;
use serde_json::json;
use std::time::Duration;

fn broker_with(descriptor: StreamDescriptor) -> Broker {
    let broker = Broker::new();
    broker.register(descriptor).unwrap();
    broker
}

#[tokio::test(start_paused = true)]
async fn publish_and_subscribe_round_trip() {
    let broker = broker_with(StreamDescriptor::new("state_change"));
    let mut sub = broker.subscribe("state_change").unwrap();

    broker.publish("state_change", json!({"old": "a", "new": "b"})).unwrap();

    assert_eq!(sub.recv().await, Some(json!({"old": "a", "new": "b"})));
}

#[test]
fn unknown_stream_is_an_error() {
    let broker = Broker::new();
    assert!(matches!(
        broker.subscribe("missing"),
        Err(BrokerError::UnknownStream(_))
    ));
    assert!(matches!(
        broker.publisher("missing"),
        Err(BrokerError::UnknownStream(_))
    ));
}

#[test]
fn re_registration_with_same_descriptor_is_a_noop() {
    let broker = broker_with(StreamDescriptor::new("s"));
    broker.register(StreamDescriptor::new("s")).unwrap();
}

#[test]
fn conflicting_registration_is_rejected() {
    let broker = broker_with(StreamDescriptor::new("s"));
    assert!(matches!(
        broker.register(StreamDescriptor::new("s").queue_maxsize(4)),
        Err(BrokerError::DuplicateStream(_))
    ));
}

#[test]
fn stream_names_are_sorted() {
    let broker = Broker::new();
    broker.register(StreamDescriptor::new("b")).unwrap();
    broker.register(StreamDescriptor::new("a")).unwrap();
    assert_eq!(broker.stream_names(), vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn publisher_handle_outlives_lookup() {
    let broker = broker_with(StreamDescriptor::new("s").replay(true));
    let publisher = broker.publisher("s").unwrap();
    assert_eq!(publisher.stream_name(), "s");

    publisher.publish(7).unwrap();

    // Scalars arrive wrapped; replay seeds the late subscriber.
    let mut sub = broker.subscribe("s").unwrap();
    assert_eq!(sub.recv().await, Some(json!({"value": 7})));
}

#[tokio::test(start_paused = true)]
async fn fan_out_with_replay_scenario() {
    // Publish V1 → A subscribes and reads V1 → publish V2 → A reads V2
    // → B subscribes and reads V2.
    let broker = broker_with(StreamDescriptor::new("state_change").queue_maxsize(1));
    let publisher = broker.publisher("state_change").unwrap();

    publisher.publish("V1").unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let mut a = broker.subscribe("state_change").unwrap();
    assert_eq!(a.recv().await, Some(json!({"value": "V1"})));

    publisher.publish("V2").unwrap();
    assert_eq!(a.recv().await, Some(json!({"value": "V2"})));

    let mut b = broker.subscribe("state_change").unwrap();
    assert_eq!(b.recv().await, Some(json!({"value": "V2"})));
}

#[tokio::test(start_paused = true)]
async fn fifo_backpressure_scenario() {
    let broker = broker_with(
        StreamDescriptor::new("s")
            .policy(StreamPolicy::Fifo)
            .queue_maxsize(1)
            .replay(false),
    );
    let mut sub = broker.subscribe("s").unwrap();

    for i in 0..4 {
        broker.publish("s", i).unwrap();
    }

    // Every item arrives, in order, despite the capacity-1 queue.
    for i in 0..4 {
        assert_eq!(sub.recv().await, Some(json!({"value": i})));
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_distribution() {
    let broker = broker_with(StreamDescriptor::new("s").replay(false));
    let mut sub = broker.subscribe("s").unwrap();

    broker.publish("s", 1).unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(sub.recv().await, Some(json!({"value": 1})));

    broker.shutdown();
    broker.publish("s", 2).unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(sub.queue_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn explicit_unsubscribe_matches_drop() {
    let broker = broker_with(StreamDescriptor::new("s"));
    let sub = broker.subscribe("s").unwrap();
    sub.unsubscribe();

    // Publishing afterwards reaches nobody and does not error.
    broker.publish("s", 1).unwrap();
}
