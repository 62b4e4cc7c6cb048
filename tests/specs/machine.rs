//! Machine lifecycle scenarios: the timed cycle, timeout to fault,
//! cancellation on fault, and last-state recovery.

use crate::prelude::*;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn happy_path_cycle_advances_every_three_seconds() {
    let machine = cell_builder()
        .on_enter_with_timeout(
            "operation_picking",
            Duration::from_secs(3),
            "finished_picking",
            |_| Ok(()),
        )
        .on_enter_with_timeout(
            "operation_placing",
            Duration::from_secs(3),
            "finished_placing",
            |_| Ok(()),
        )
        .on_enter_with_timeout(
            "operation_homing",
            Duration::from_secs(3),
            "finished_homing",
            |_| Ok(()),
        )
        .build()
        .unwrap();

    machine.start().await.unwrap();
    assert_eq!(machine.state(), "operation_picking");

    tokio::time::sleep(Duration::from_millis(3200)).await;
    assert_eq!(machine.state(), "operation_placing");

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(machine.state(), "operation_homing");

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(machine.state(), "operation_picking");

    // Initial entry plus three hops.
    assert_eq!(machine.history().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn unanswered_timeout_faults_the_machine() {
    let machine = cell_builder()
        .on_enter_with_timeout(
            "operation_picking",
            Duration::from_secs(5),
            "to_fault",
            |_| Ok(()),
        )
        .build()
        .unwrap();

    machine.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(4900)).await;
    assert_eq!(machine.state(), "operation_picking");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(machine.state(), "fault");
    assert_eq!(
        machine.last_recoverable_state().unwrap(),
        "operation_picking"
    );
}

#[tokio::test(start_paused = true)]
async fn fault_cancels_inflight_delayed_triggers() {
    let machine = cell_builder().build().unwrap();
    machine.start().await.unwrap();

    machine.trigger_after(Duration::from_secs(3), "finished_picking");

    tokio::time::sleep(Duration::from_secs(1)).await;
    machine.trigger("to_fault").await.unwrap();

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(machine.state(), "fault");
    assert_eq!(machine.tracked_tasks(), 0);
    // start + fault only; the delayed trigger never landed.
    assert_eq!(machine.history().len(), 2);
}

#[tokio::test]
async fn recovery_restores_the_last_working_leaf() {
    // First life: reach placing, then fault.
    let first = cell_builder().build().unwrap();
    first.start().await.unwrap();
    first.trigger("finished_picking").await.unwrap();
    first.trigger("to_fault").await.unwrap();

    let persisted = first.last_recoverable_state().unwrap();
    assert_eq!(persisted, "operation_placing");

    // Second life, seeded with the persisted leaf: start() takes the
    // recovery transition, re-running enter hooks and recording
    // history.
    let entered = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let entered2 = std::sync::Arc::clone(&entered);
    let second = cell_builder()
        .last_state(persisted)
        .on_enter("operation_placing", move |_| {
            entered2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        })
        .build()
        .unwrap();

    second.start().await.unwrap();
    assert_eq!(second.state(), "operation_placing");
    assert_eq!(entered.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(second.history().len(), 1);
    assert_eq!(second.history()[0].state, "operation_placing");
}

#[tokio::test]
async fn reset_without_recovery_clears_the_recorded_state() {
    let machine = cell_builder().recovery(false).build().unwrap();
    machine.start().await.unwrap();
    machine.trigger("to_fault").await.unwrap();
    machine.trigger("reset").await.unwrap();

    assert_eq!(machine.state(), "ready");
    assert!(machine.last_recoverable_state().is_none());
}
