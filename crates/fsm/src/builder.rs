// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Machine construction.
//!
//! Everything a machine is made of (states, transitions, hooks,
//! guards, observers) goes through the builder before `build()`.
//! The built machine is immutable, so reconfiguration after start is
//! not expressible. The builder also wires in the base states and
//! transitions every machine gets: `ready`, `fault`, `start`,
//! `to_fault`, `reset` and the per-leaf `recover__` triggers.

use crate::base;
use crate::machine::{
    EnterHook, GuardFn, HookError, HookFn, Hooks, Machine, ObserverFn, TimeoutSpec,
    TransitionReport, DEFAULT_HISTORY_SIZE,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use vapp_core::{
    Clock, GraphError, StateGraph, StateName, StateSpec, SystemClock, TransitionSpec, TriggerName,
    WILDCARD_SOURCE,
};

/// Machine construction failures.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("no initial state designated and no explicit 'start' transition")]
    MissingInitial,
    #[error("hook references unknown state '{0}'")]
    UnknownHookState(StateName),
    #[error("guard or before-hook references unknown trigger '{0}'")]
    UnknownHookTrigger(TriggerName),
    #[error("recovery seed '{0}' is not a declared leaf")]
    InvalidLastState(StateName),
}

/// Builder for [`Machine`].
pub struct MachineBuilder {
    states: Vec<StateSpec>,
    transitions: Vec<TransitionSpec>,
    initial: Option<String>,
    history_size: usize,
    recovery_enabled: bool,
    last_state: Option<StateName>,
    clock: Arc<dyn Clock>,
    enter_hooks: Vec<(StateName, Option<TimeoutSpec>, HookFn)>,
    exit_hooks: Vec<(StateName, HookFn)>,
    guards: Vec<(TriggerName, GuardFn)>,
    before_hooks: Vec<(TriggerName, HookFn)>,
    observers: Vec<ObserverFn>,
}

impl Default for MachineBuilder {
    fn default() -> Self {
        Self {
            states: Vec::new(),
            transitions: Vec::new(),
            initial: None,
            history_size: DEFAULT_HISTORY_SIZE,
            recovery_enabled: true,
            last_state: None,
            clock: Arc::new(SystemClock),
            enter_hooks: Vec::new(),
            exit_hooks: Vec::new(),
            guards: Vec::new(),
            before_hooks: Vec::new(),
            observers: Vec::new(),
        }
    }
}

impl MachineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare root states.
    pub fn states(mut self, states: impl IntoIterator<Item = StateSpec>) -> Self {
        self.states.extend(states);
        self
    }

    pub fn state(mut self, spec: StateSpec) -> Self {
        self.states.push(spec);
        self
    }

    /// Declare transitions.
    pub fn transitions(mut self, specs: impl IntoIterator<Item = TransitionSpec>) -> Self {
        self.transitions.extend(specs);
        self
    }

    pub fn transition(mut self, spec: TransitionSpec) -> Self {
        self.transitions.push(spec);
        self
    }

    /// Destination of the auto-added `start` transition out of `ready`.
    pub fn initial(mut self, target: impl Into<String>) -> Self {
        self.initial = Some(target.into());
        self
    }

    /// Transition history capacity (default 1000).
    pub fn history_size(mut self, size: usize) -> Self {
        self.history_size = size;
        self
    }

    /// Enable or disable last-state recovery (default enabled).
    pub fn recovery(mut self, enabled: bool) -> Self {
        self.recovery_enabled = enabled;
        self
    }

    /// Seed the recoverable state, e.g. from persisted machine state
    /// on restart.
    pub fn last_state(mut self, leaf: impl Into<StateName>) -> Self {
        self.last_state = Some(leaf.into());
        self
    }

    /// Timestamp source (default [`SystemClock`]).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run `hook` whenever `state` is entered.
    pub fn on_enter<F>(mut self, state: impl Into<StateName>, hook: F) -> Self
    where
        F: Fn(&Machine) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.enter_hooks.push((state.into(), None, Arc::new(hook)));
        self
    }

    /// Run `hook` whenever `state` is entered, arming a timeout first:
    /// if the machine is still in `state` after `after`, fire
    /// `trigger`.
    pub fn on_enter_with_timeout<F>(
        mut self,
        state: impl Into<StateName>,
        after: Duration,
        trigger: impl Into<TriggerName>,
        hook: F,
    ) -> Self
    where
        F: Fn(&Machine) -> Result<(), HookError> + Send + Sync + 'static,
    {
        let trigger = trigger.into();
        let spec = TimeoutSpec {
            after,
            trigger: Arc::new(move || trigger.clone()),
        };
        self.enter_hooks
            .push((state.into(), Some(spec), Arc::new(hook)));
        self
    }

    /// Run `hook` whenever `state` is exited.
    pub fn on_exit<F>(mut self, state: impl Into<StateName>, hook: F) -> Self
    where
        F: Fn(&Machine) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.exit_hooks.push((state.into(), Arc::new(hook)));
        self
    }

    /// Gate `trigger` behind a predicate. Multiple guards on the same
    /// trigger must all pass.
    pub fn guard<F>(mut self, trigger: impl Into<TriggerName>, guard: F) -> Self
    where
        F: Fn(&Machine) -> Result<bool, HookError> + Send + Sync + 'static,
    {
        self.guards.push((trigger.into(), Arc::new(guard)));
        self
    }

    /// Run `hook` before `trigger`'s transition starts (before exit
    /// hooks and the state change).
    pub fn before<F>(mut self, trigger: impl Into<TriggerName>, hook: F) -> Self
    where
        F: Fn(&Machine) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.before_hooks.push((trigger.into(), Arc::new(hook)));
        self
    }

    /// Observe every completed transition (after history and timeout
    /// bookkeeping). This is where state-change publication hooks in.
    pub fn observe<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Machine, &TransitionReport) + Send + Sync + 'static,
    {
        self.observers.push(Arc::new(observer));
        self
    }

    /// Validate and assemble the machine.
    pub fn build(self) -> Result<Machine, BuildError> {
        let MachineBuilder {
            mut states,
            mut transitions,
            initial,
            history_size,
            recovery_enabled,
            last_state,
            clock,
            enter_hooks,
            exit_hooks,
            guards,
            before_hooks,
            observers,
        } = self;

        states.push(StateSpec::leaf(base::READY));
        states.push(StateSpec::leaf(base::FAULT));

        let has_start = transitions.iter().any(|t| t.trigger == base::START);
        match (&initial, has_start) {
            (Some(target), false) => {
                transitions.push(TransitionSpec::new(base::START, base::READY, target));
            }
            (None, false) => return Err(BuildError::MissingInitial),
            _ => {}
        }

        transitions.push(TransitionSpec::new(
            base::TO_FAULT,
            WILDCARD_SOURCE,
            base::FAULT,
        ));
        let has_reset = transitions
            .iter()
            .any(|t| t.trigger == base::RESET && t.source == base::FAULT);
        if !has_reset {
            transitions.push(TransitionSpec::new(base::RESET, base::FAULT, base::READY));
        }

        // Recovery transitions need the flattened leaf set, so probe
        // the state tree first.
        let probe = StateGraph::build(&states, &[])?;
        for leaf in probe.leaves() {
            if leaf.as_str() == base::READY || leaf.as_str() == base::FAULT {
                continue;
            }
            transitions.push(TransitionSpec::new(
                TriggerName::recovery(&leaf).as_str(),
                base::READY,
                leaf.as_str(),
            ));
        }

        let graph = StateGraph::build(&states, &transitions)?;

        for (state, _, _) in &enter_hooks {
            if !graph.contains(state.as_str()) {
                return Err(BuildError::UnknownHookState(state.clone()));
            }
        }
        for (state, _) in &exit_hooks {
            if !graph.contains(state.as_str()) {
                return Err(BuildError::UnknownHookState(state.clone()));
            }
        }
        let triggers = graph.triggers();
        for (trigger, _) in &guards {
            if !triggers.contains(trigger) {
                return Err(BuildError::UnknownHookTrigger(trigger.clone()));
            }
        }
        for (trigger, _) in &before_hooks {
            if !triggers.contains(trigger) {
                return Err(BuildError::UnknownHookTrigger(trigger.clone()));
            }
        }
        if let Some(seed) = &last_state {
            if !graph.is_leaf(seed.as_str()) {
                return Err(BuildError::InvalidLastState(seed.clone()));
            }
        }

        let mut hooks = Hooks::default();
        for (state, timeout, hook) in enter_hooks {
            hooks
                .enter
                .entry(state)
                .or_default()
                .push(EnterHook { hook, timeout });
        }
        for (state, hook) in exit_hooks {
            hooks.exit.entry(state).or_default().push(hook);
        }
        let mut guard_map: HashMap<TriggerName, Vec<GuardFn>> = HashMap::new();
        for (trigger, guard) in guards {
            guard_map.entry(trigger).or_default().push(guard);
        }
        hooks.guards = guard_map;
        for (trigger, hook) in before_hooks {
            hooks.before.entry(trigger).or_default().push(hook);
        }
        hooks.observers = observers;

        Ok(Machine::from_parts(
            graph,
            hooks,
            clock,
            recovery_enabled,
            last_state,
            history_size,
        ))
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
