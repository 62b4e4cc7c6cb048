// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The machine runtime: trigger dispatch, timeouts, recovery, history.
//!
//! All mutation funnels through [`Machine::trigger`], which holds the
//! transition lock for the whole pipeline: resolve → guard → before →
//! exit hooks → state mutation → enter hooks → bookkeeping →
//! observers. Reads (`state()`, `history()`) are lock-free of the
//! transition section and safe from any task.

use crate::base;
use crate::tracker::{self, TaskHandle, TaskTracker};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use vapp_core::{Clock, History, HistoryEntry, StateGraph, StateName, TriggerName};

/// Default transition history capacity.
pub const DEFAULT_HISTORY_SIZE: usize = 1000;

/// Error raised by a hook or guard body.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for HookError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// State enter/exit hook.
pub type HookFn = Arc<dyn Fn(&Machine) -> Result<(), HookError> + Send + Sync>;

/// Transition guard: pure predicate, evaluated exactly once per firing.
pub type GuardFn = Arc<dyn Fn(&Machine) -> Result<bool, HookError> + Send + Sync>;

/// Post-transition observer (state-change publication seam).
pub type ObserverFn = Arc<dyn Fn(&Machine, &TransitionReport) + Send + Sync>;

/// Produces the trigger a timeout fires.
pub type TriggerProducer = Arc<dyn Fn() -> TriggerName + Send + Sync>;

/// Auto-timeout configuration attached to an enter hook.
pub(crate) struct TimeoutSpec {
    pub(crate) after: Duration,
    pub(crate) trigger: TriggerProducer,
}

pub(crate) struct EnterHook {
    pub(crate) hook: HookFn,
    pub(crate) timeout: Option<TimeoutSpec>,
}

#[derive(Default)]
pub(crate) struct Hooks {
    pub(crate) enter: HashMap<StateName, Vec<EnterHook>>,
    pub(crate) exit: HashMap<StateName, Vec<HookFn>>,
    pub(crate) guards: HashMap<TriggerName, Vec<GuardFn>>,
    pub(crate) before: HashMap<TriggerName, Vec<HookFn>>,
    pub(crate) observers: Vec<ObserverFn>,
}

/// What a successful trigger did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionReport {
    pub trigger: TriggerName,
    pub from: StateName,
    pub to: StateName,
    pub timestamp_ms: u64,
}

/// Why a trigger did not (fully) run.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// No transition for this trigger from the current state. The
    /// machine is unchanged.
    #[error("trigger '{trigger}' not allowed from '{state}' (available: {available:?})")]
    NotAllowed {
        trigger: TriggerName,
        state: StateName,
        available: Vec<TriggerName>,
    },
    /// A guard returned false. No hooks ran, no state changed.
    #[error("guard rejected trigger '{trigger}' from '{state}'")]
    GuardRejected {
        trigger: TriggerName,
        state: StateName,
    },
    /// A guard errored: treated as rejection, surfaced as internal.
    #[error("guard for trigger '{trigger}' failed: {source}")]
    GuardFailed {
        trigger: TriggerName,
        #[source]
        source: HookError,
    },
    /// A before-hook errored; the machine is unchanged.
    #[error("before hook for trigger '{trigger}' failed: {source}")]
    BeforeFailed {
        trigger: TriggerName,
        #[source]
        source: HookError,
    },
    /// An exit hook errored; the machine is unchanged.
    #[error("exit hook for state '{state}' failed: {source}")]
    ExitHookFailed {
        state: StateName,
        #[source]
        source: HookError,
    },
    /// An enter hook errored *after* the state mutation: the machine
    /// stays in its new state and the transition is in the history.
    #[error("enter hook for state '{state}' failed: {source}")]
    EnterHookFailed {
        state: StateName,
        #[source]
        source: HookError,
    },
    /// Graph invariant violation; cannot happen on a validated build.
    #[error("state graph inconsistency involving '{state}'")]
    GraphInconsistency { state: StateName },
}

impl TriggerError {
    /// True for the "wrong state / guard said no" family, which maps
    /// to `failed_precondition` at the RPC edge.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            TriggerError::NotAllowed { .. } | TriggerError::GuardRejected { .. }
        )
    }
}

struct Shared {
    current: StateName,
    last_state: Option<StateName>,
    history: History,
}

pub(crate) struct Inner {
    pub(crate) graph: StateGraph,
    pub(crate) hooks: Hooks,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) recovery_enabled: bool,
    transition_lock: tokio::sync::Mutex<()>,
    shared: Mutex<Shared>,
    timeouts: Mutex<HashMap<StateName, TaskHandle>>,
    tasks: TaskTracker,
}

/// Hierarchical state machine instance. Cheap to clone; clones share
/// the same machine.
#[derive(Clone)]
pub struct Machine {
    inner: Arc<Inner>,
}

impl Machine {
    pub(crate) fn from_parts(
        graph: StateGraph,
        hooks: Hooks,
        clock: Arc<dyn Clock>,
        recovery_enabled: bool,
        last_state: Option<StateName>,
        history_size: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                graph,
                hooks,
                clock,
                recovery_enabled,
                transition_lock: tokio::sync::Mutex::new(()),
                shared: Mutex::new(Shared {
                    current: StateName::new(base::READY),
                    last_state,
                    history: History::new(history_size),
                }),
                timeouts: Mutex::new(HashMap::new()),
                tasks: TaskTracker::new(),
            }),
        }
    }

    /// Current leaf state.
    pub fn state(&self) -> StateName {
        self.inner.shared.lock().current.clone()
    }

    /// The leaf to recover into, if one has been recorded.
    pub fn last_recoverable_state(&self) -> Option<StateName> {
        self.inner.shared.lock().last_state.clone()
    }

    /// Whether `start()` takes the recovery path.
    pub fn recovery_enabled(&self) -> bool {
        self.inner.recovery_enabled
    }

    /// Full transition history, oldest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner.shared.lock().history.to_vec()
    }

    /// The newest `n` history entries.
    pub fn last_n(&self, n: usize) -> Vec<HistoryEntry> {
        self.inner.shared.lock().history.last_n(n)
    }

    pub fn history_capacity(&self) -> usize {
        self.inner.shared.lock().history.capacity()
    }

    /// The static state graph.
    pub fn graph(&self) -> &StateGraph {
        &self.inner.graph
    }

    /// Triggers allowed from the current state, sorted.
    pub fn available_triggers(&self) -> Vec<TriggerName> {
        let state = self.state();
        self.inner
            .graph
            .triggers_available_from(state.as_str())
            .into_iter()
            .collect()
    }

    /// Spawn a tracked background task. Cancelled by `to_fault` and
    /// [`Machine::cancel_tasks`].
    pub fn spawn<F>(&self, fut: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.tasks.spawn(fut)
    }

    /// Outstanding tracked tasks (timeouts included).
    pub fn tracked_tasks(&self) -> usize {
        self.inner.tasks.len()
    }

    /// States with a pending timeout.
    pub fn pending_timeouts(&self) -> usize {
        self.inner.timeouts.lock().len()
    }

    /// Enter the machine.
    ///
    /// With recovery enabled and a recorded last state, fires the
    /// matching `recover__<leaf>` trigger so the full hook machinery
    /// (enter hooks, timeouts, history) runs; otherwise fires `start`.
    /// Calling `start()` when the machine is not in `ready` is
    /// rejected with [`TriggerError::NotAllowed`]; this is stable,
    /// documented behavior.
    pub async fn start(&self) -> Result<TransitionReport, TriggerError> {
        let recover = if self.inner.recovery_enabled {
            self.last_recoverable_state()
        } else {
            None
        };
        match recover {
            Some(last) => {
                let trigger = TriggerName::recovery(&last);
                self.trigger(trigger.as_str()).await
            }
            None => self.trigger(base::START).await,
        }
    }

    /// Atomically attempt a transition.
    pub async fn trigger(&self, trigger: &str) -> Result<TransitionReport, TriggerError> {
        let _permit = self.inner.transition_lock.lock().await;
        let from = self.state();

        let transition = match self.inner.graph.resolve(trigger, from.as_str()) {
            Some(t) => t.clone(),
            None => {
                return Err(TriggerError::NotAllowed {
                    trigger: TriggerName::new(trigger),
                    state: from.clone(),
                    available: self
                        .inner
                        .graph
                        .triggers_available_from(from.as_str())
                        .into_iter()
                        .collect(),
                })
            }
        };

        // Guards: evaluated exactly once, before any side effect.
        if let Some(guards) = self.inner.hooks.guards.get(trigger) {
            for guard in guards {
                match guard(self) {
                    Ok(true) => {}
                    Ok(false) => {
                        return Err(TriggerError::GuardRejected {
                            trigger: transition.trigger.clone(),
                            state: from.clone(),
                        })
                    }
                    Err(source) => {
                        return Err(TriggerError::GuardFailed {
                            trigger: transition.trigger.clone(),
                            source,
                        })
                    }
                }
            }
        }

        // Before hooks, then the built-in task teardown on `to_fault`:
        // stale tasks must observe `fault` when they wake, so they are
        // gone before any state changes.
        if let Some(hooks) = self.inner.hooks.before.get(trigger) {
            for hook in hooks {
                hook(self).map_err(|source| TriggerError::BeforeFailed {
                    trigger: transition.trigger.clone(),
                    source,
                })?;
            }
        }
        if trigger == base::TO_FAULT {
            self.cancel_tasks().await;
        }

        let (exits, enters, dest_leaf) = self
            .inner
            .graph
            .exit_enter_paths(from.as_str(), transition.dest.as_str())
            .ok_or_else(|| TriggerError::GraphInconsistency {
                state: transition.dest.clone(),
            })?;

        // Exit hooks, innermost first (outermost last). Failure here
        // leaves the machine in its old state.
        for state in &exits {
            if let Some(hooks) = self.inner.hooks.exit.get(state.as_str()) {
                for hook in hooks {
                    hook(self).map_err(|source| TriggerError::ExitHookFailed {
                        state: state.clone(),
                        source,
                    })?;
                }
            }
        }

        // The mutation point: readers see the new leaf from here on.
        {
            let mut shared = self.inner.shared.lock();
            shared.current = dest_leaf.clone();
        }

        // Enter hooks, outermost first. Auto-timeouts are armed before
        // the hook body runs. A failing enter hook does not roll the
        // state back; bookkeeping below still happens.
        let mut enter_err = None;
        'outer: for state in &enters {
            if let Some(hooks) = self.inner.hooks.enter.get(state.as_str()) {
                for hook in hooks {
                    if let Some(spec) = &hook.timeout {
                        self.set_timeout_producer(
                            state.clone(),
                            spec.after,
                            Arc::clone(&spec.trigger),
                        );
                    }
                    if let Err(source) = (hook.hook)(self) {
                        enter_err = Some(TriggerError::EnterHookFailed {
                            state: state.clone(),
                            source,
                        });
                        break 'outer;
                    }
                }
            }
        }

        // After-callbacks: history, last-state, source-timeout cleanup.
        let now_ms = self.inner.clock.epoch_ms();
        {
            let mut shared = self.inner.shared.lock();
            shared.history.record(dest_leaf.clone(), now_ms);
            if dest_leaf.as_str() == base::READY {
                if !self.inner.recovery_enabled {
                    shared.last_state = None;
                }
            } else if dest_leaf.as_str() != base::FAULT {
                shared.last_state = Some(dest_leaf.clone());
            }
        }
        self.clear_timeout(from.as_str());

        let report = TransitionReport {
            trigger: transition.trigger.clone(),
            from: from.clone(),
            to: dest_leaf.clone(),
            timestamp_ms: now_ms,
        };
        tracing::info!(trigger = %report.trigger, from = %report.from, to = %report.to, "transition");

        for observer in &self.inner.hooks.observers {
            observer(self, &report);
        }

        match enter_err {
            Some(err) => {
                tracing::error!(state = %report.to, %err, "enter hook failed");
                Err(err)
            }
            None => Ok(report),
        }
    }

    /// Fire `trigger` after `delay`, as a tracked task. Unlike a
    /// state timeout this is not keyed on any state: it fires
    /// regardless of where the machine has moved, and the normal
    /// precondition check decides whether it lands. Rejections are
    /// logged, not surfaced.
    pub fn trigger_after(&self, delay: Duration, trigger: impl Into<TriggerName>) -> TaskHandle {
        let machine = self.clone();
        let trigger = trigger.into();
        self.inner.tasks.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = machine.trigger(trigger.as_str()).await {
                tracing::debug!(%trigger, %err, "delayed trigger rejected");
            }
        })
    }

    /// Schedule a timeout: if the machine is still in exactly `state`
    /// after `after`, fire `trigger`. Replaces any pending timeout for
    /// that state.
    pub fn set_timeout(
        &self,
        state: impl Into<StateName>,
        after: Duration,
        trigger: impl Into<TriggerName>,
    ) {
        let trigger = trigger.into();
        self.set_timeout_with(state, after, move || trigger.clone());
    }

    /// Like [`Machine::set_timeout`] but the trigger is produced at
    /// fire time.
    pub fn set_timeout_with(
        &self,
        state: impl Into<StateName>,
        after: Duration,
        producer: impl Fn() -> TriggerName + Send + Sync + 'static,
    ) {
        self.set_timeout_producer(state.into(), after, Arc::new(producer));
    }

    pub(crate) fn set_timeout_producer(
        &self,
        state: StateName,
        after: Duration,
        producer: TriggerProducer,
    ) {
        self.clear_timeout(state.as_str());

        let machine = self.clone();
        let armed_state = state.clone();
        let handle = self.inner.tasks.spawn(async move {
            tokio::time::sleep(after).await;
            // The machine may have moved on while we slept.
            if machine.state() != armed_state {
                return;
            }
            let trigger = producer();
            tracing::debug!(state = %armed_state, %trigger, "state timeout fired");
            if let Err(err) = machine.trigger(trigger.as_str()).await {
                tracing::warn!(state = %armed_state, %trigger, %err, "timeout trigger rejected");
            }
        });
        self.inner.timeouts.lock().insert(state, handle);
    }

    /// Cancel every tracked task and clear all pending timeouts.
    /// Safe to call from inside a hook running on a tracked task.
    pub async fn cancel_tasks(&self) {
        self.clear_all_timeouts();
        self.inner.tasks.cancel_all().await;
    }

    /// Drop the pending timeout for `state`, if any.
    fn clear_timeout(&self, state: &str) {
        let handle = self.inner.timeouts.lock().remove(state);
        if let Some(handle) = handle {
            // A timeout task clearing its own entry must not abort
            // itself mid-transition.
            if tracker::current_task_id() != Some(handle.id()) {
                handle.cancel();
            }
        }
    }

    fn clear_all_timeouts(&self) {
        let drained: Vec<(StateName, TaskHandle)> = {
            let mut timeouts = self.inner.timeouts.lock();
            timeouts.drain().collect()
        };
        let current = tracker::current_task_id();
        for (_, handle) in drained {
            if current != Some(handle.id()) {
                handle.cancel();
            }
        }
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
