//! Streaming scenarios: framed fan-out, replay for late subscribers,
//! and machine transitions arriving as state-change frames.

use crate::prelude::*;
use serde_json::json;

#[tokio::test(start_paused = true)]
async fn fan_out_with_replay_over_http() {
    let app = cell_app(cell_builder());
    let publisher = app.broker.publisher("state_change").unwrap();

    // Publish V1, then subscriber A connects: replay hands it V1.
    publisher.publish("V1").unwrap();
    let mut a = open_stream(app.router.clone(), "state_change").await;
    assert_eq!(next_frame(&mut a).await, json!({"value": "V1"}));

    // Publish V2: A sees it live.
    publisher.publish("V2").unwrap();
    assert_eq!(next_frame(&mut a).await, json!({"value": "V2"}));

    // Subscriber B connects late: replay hands it V2, never V1.
    let mut b = open_stream(app.router.clone(), "state_change").await;
    assert_eq!(next_frame(&mut b).await, json!({"value": "V2"}));
}

#[tokio::test(start_paused = true)]
async fn transitions_arrive_as_state_change_frames() {
    let app = cell_app(cell_builder());

    let mut stream = open_stream(app.router.clone(), "state_change").await;

    let (_, body) = post_rpc(app.router.clone(), "Trigger_Start").await;
    assert_eq!(body["newState"], "operation_picking");

    let event = next_frame(&mut stream).await;
    assert_eq!(event["old"], "ready");
    assert_eq!(event["new"], "operation_picking");
    assert_eq!(event["trigger"], "start");
    assert!(event["timestamp"].is_u64());
}

#[tokio::test(start_paused = true)]
async fn slow_subscriber_skips_to_the_latest_state() {
    let app = cell_app(cell_builder());
    let publisher = app.broker.publisher("state_change").unwrap();

    let mut stream = open_stream(app.router.clone(), "state_change").await;

    // Burst of publishes while the subscriber reads nothing: the
    // capacity-1 latest-wins queue keeps only the newest.
    for i in 0..5 {
        publisher.publish(i).unwrap();
    }
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    assert_eq!(next_frame(&mut stream).await, json!({"value": 4}));
}

#[tokio::test(start_paused = true)]
async fn multiple_subscribers_each_get_their_own_queue() {
    let app = cell_app(cell_builder());
    let publisher = app.broker.publisher("state_change").unwrap();

    let mut a = open_stream(app.router.clone(), "state_change").await;
    let mut b = open_stream(app.router.clone(), "state_change").await;

    publisher.publish(json!({"n": 1})).unwrap();

    assert_eq!(next_frame(&mut a).await, json!({"n": 1}));
    assert_eq!(next_frame(&mut b).await, json!({"n": 1}));
}

#[tokio::test(start_paused = true)]
async fn disconnecting_subscriber_is_removed() {
    let app = cell_app(cell_builder());
    let publisher = app.broker.publisher("state_change").unwrap();

    let a = open_stream(app.router.clone(), "state_change").await;
    drop(a);
    tokio::task::yield_now().await;

    // Publishing still works, and a fresh subscriber replays it.
    publisher.publish("after-disconnect").unwrap();
    let mut b = open_stream(app.router, "state_change").await;
    assert_eq!(
        next_frame(&mut b).await,
        json!({"value": "after-disconnect"})
    );
}
