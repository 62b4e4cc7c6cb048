// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::base;

fn cell_builder() -> MachineBuilder {
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
            TransitionSpec::new("pick_complete", "operation_picking", "operation_placing"),
            TransitionSpec::new("place_complete", "operation_placing", "operation_homing"),
            TransitionSpec::new("home_complete", "operation_homing", "operation_picking"),
        ])
        .initial("operation")
}

#[test]
fn build_adds_base_states_and_transitions() {
    let machine = cell_builder().build().unwrap();
    let graph = machine.graph();

    assert!(graph.is_leaf(base::READY));
    assert!(graph.is_leaf(base::FAULT));

    let triggers = graph.triggers();
    assert!(triggers.contains(base::START));
    assert!(triggers.contains(base::RESET));
    assert!(triggers.contains(base::TO_FAULT));

    // to_fault is allowed from every state.
    assert!(graph.resolve(base::TO_FAULT, "operation_placing").is_some());
    assert!(graph.resolve(base::TO_FAULT, base::READY).is_some());
    // reset only from fault.
    assert!(graph.resolve(base::RESET, base::FAULT).is_some());
    assert!(graph.resolve(base::RESET, base::READY).is_none());
}

#[test]
fn build_adds_recovery_trigger_per_declared_leaf() {
    let machine = cell_builder().build().unwrap();
    let triggers = machine.graph().triggers();

    for leaf in ["operation_picking", "operation_placing", "operation_homing"] {
        let trigger = TriggerName::recovery(&StateName::new(leaf));
        assert!(triggers.contains(&trigger), "missing {trigger}");
        let t = machine.graph().resolve(trigger.as_str(), base::READY).unwrap();
        assert_eq!(t.dest, leaf);
    }

    // No recovery triggers for the base states themselves.
    assert!(!triggers.contains("recover__ready"));
    assert!(!triggers.contains("recover__fault"));
}

#[test]
fn build_without_initial_or_start_is_rejected() {
    let result = MachineBuilder::new()
        .state(StateSpec::leaf("only"))
        .build();
    assert!(matches!(result, Err(BuildError::MissingInitial)));
}

#[test]
fn explicit_start_transition_replaces_initial() {
    let machine = MachineBuilder::new()
        .state(StateSpec::leaf("only"))
        .transition(TransitionSpec::new(base::START, base::READY, "only"))
        .build()
        .unwrap();
    assert!(machine.graph().resolve(base::START, base::READY).is_some());
}

#[test]
fn explicit_reset_transition_wins() {
    let machine = MachineBuilder::new()
        .states([StateSpec::leaf("only"), StateSpec::leaf("safe")])
        .initial("only")
        .transition(TransitionSpec::new(base::RESET, base::FAULT, "safe"))
        .build()
        .unwrap();
    let t = machine.graph().resolve(base::RESET, base::FAULT).unwrap();
    assert_eq!(t.dest, "safe");
}

#[test]
fn hooks_on_unknown_states_are_rejected() {
    let result = cell_builder().on_enter("nowhere", |_| Ok(())).build();
    assert!(matches!(result, Err(BuildError::UnknownHookState(_))));

    let result = cell_builder().on_exit("nowhere", |_| Ok(())).build();
    assert!(matches!(result, Err(BuildError::UnknownHookState(_))));
}

#[test]
fn guards_on_unknown_triggers_are_rejected() {
    let result = cell_builder().guard("no_such_trigger", |_| Ok(true)).build();
    assert!(matches!(result, Err(BuildError::UnknownHookTrigger(_))));

    let result = cell_builder().before("no_such_trigger", |_| Ok(())).build();
    assert!(matches!(result, Err(BuildError::UnknownHookTrigger(_))));
}

#[test]
fn recovery_seed_must_be_a_declared_leaf() {
    let result = cell_builder().last_state("operation").build();
    assert!(matches!(result, Err(BuildError::InvalidLastState(_))));

    let machine = cell_builder().last_state("operation_placing").build().unwrap();
    assert_eq!(
        machine.last_recoverable_state().unwrap(),
        "operation_placing"
    );
}

#[test]
fn graph_errors_surface_from_build() {
    let result = MachineBuilder::new()
        .state(StateSpec::leaf("a"))
        .initial("a")
        .transition(TransitionSpec::new("go", "a", "missing"))
        .build();
    assert!(matches!(result, Err(BuildError::Graph(_))));
}
