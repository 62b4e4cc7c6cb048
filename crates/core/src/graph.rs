// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static hierarchical state/transition model.
//!
//! The graph is built once from declarative specs and never mutated
//! afterwards. Construction rejects dangling references and expands
//! wildcard-source transitions into concrete ones, so `resolve` at run
//! time is a pair of map lookups with no special cases.

use crate::id::{StateName, TriggerName};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Transition source matching every concrete state.
pub const WILDCARD_SOURCE: &str = "*";

/// Declarative description of one state and its children.
///
/// Child names are short; the graph joins them onto the parent with an
/// underscore when it flattens the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSpec {
    pub name: String,
    #[serde(default)]
    pub children: Vec<StateSpec>,
    /// Short name of the child entered when this state is the target
    /// of a transition. Defaults to the first child.
    #[serde(default)]
    pub initial: Option<String>,
}

impl StateSpec {
    /// A state with no children.
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            initial: None,
        }
    }

    /// A compound state; the first child is the initial one unless
    /// [`StateSpec::with_initial`] overrides it.
    pub fn compound(name: impl Into<String>, children: impl IntoIterator<Item = StateSpec>) -> Self {
        Self {
            name: name.into(),
            children: children.into_iter().collect(),
            initial: None,
        }
    }

    /// Override the initial child (short name).
    pub fn with_initial(mut self, initial: impl Into<String>) -> Self {
        self.initial = Some(initial.into());
        self
    }
}

/// Declarative description of one transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub trigger: String,
    /// Fully-qualified source state, or [`WILDCARD_SOURCE`].
    pub source: String,
    /// Fully-qualified destination state.
    pub dest: String,
}

impl TransitionSpec {
    pub fn new(
        trigger: impl Into<String>,
        source: impl Into<String>,
        dest: impl Into<String>,
    ) -> Self {
        Self {
            trigger: trigger.into(),
            source: source.into(),
            dest: dest.into(),
        }
    }
}

/// A resolved transition in the built graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub trigger: TriggerName,
    pub source: StateName,
    pub dest: StateName,
}

/// Construction-time validation failures.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("duplicate state: {0}")]
    DuplicateState(StateName),
    #[error("state '{state}' declares unknown initial child '{initial}'")]
    UnknownInitial { state: StateName, initial: String },
    #[error("transition '{trigger}' references unknown source state '{from_state}'")]
    UnknownSource { trigger: String, from_state: String },
    #[error("transition '{trigger}' references unknown destination state '{dest}'")]
    UnknownDest { trigger: String, dest: String },
    #[error("duplicate transition for trigger '{trigger}' from '{from_state}'")]
    DuplicateTransition { trigger: String, from_state: String },
}

#[derive(Debug)]
struct StateNode {
    parent: Option<StateName>,
    children: Vec<StateName>,
    /// Fully-qualified initial child; set iff the state has children.
    initial: Option<StateName>,
}

/// Immutable hierarchical state graph.
#[derive(Debug)]
pub struct StateGraph {
    states: IndexMap<StateName, StateNode>,
    /// trigger → source state → transition. Wildcards are already
    /// expanded; explicit transitions win over expanded ones.
    transitions: HashMap<TriggerName, HashMap<StateName, Transition>>,
}

impl StateGraph {
    /// Build and validate a graph from declarative specs.
    pub fn build(roots: &[StateSpec], specs: &[TransitionSpec]) -> Result<Self, GraphError> {
        let mut states = IndexMap::new();
        for root in roots {
            add_state(&mut states, root, None)?;
        }

        let mut transitions: HashMap<TriggerName, HashMap<StateName, Transition>> = HashMap::new();

        // Explicit sources first so they take precedence over wildcards.
        for spec in specs.iter().filter(|s| s.source != WILDCARD_SOURCE) {
            if !states.contains_key(spec.source.as_str()) {
                return Err(GraphError::UnknownSource {
                    trigger: spec.trigger.clone(),
                    from_state: spec.source.clone(),
                });
            }
            check_dest(&states, spec)?;

            let by_source = transitions
                .entry(TriggerName::new(&spec.trigger))
                .or_default();
            let source = StateName::new(&spec.source);
            if by_source.contains_key(&source) {
                return Err(GraphError::DuplicateTransition {
                    trigger: spec.trigger.clone(),
                    from_state: spec.source.clone(),
                });
            }
            by_source.insert(
                source.clone(),
                Transition {
                    trigger: TriggerName::new(&spec.trigger),
                    source,
                    dest: StateName::new(&spec.dest),
                },
            );
        }

        // Wildcard expansion: one transition per concrete state, filling
        // only the slots explicit transitions left open.
        for spec in specs.iter().filter(|s| s.source == WILDCARD_SOURCE) {
            check_dest(&states, spec)?;
            let by_source = transitions
                .entry(TriggerName::new(&spec.trigger))
                .or_default();
            for source in states.keys() {
                by_source.entry(source.clone()).or_insert_with(|| Transition {
                    trigger: TriggerName::new(&spec.trigger),
                    source: source.clone(),
                    dest: StateName::new(&spec.dest),
                });
            }
        }

        Ok(Self {
            states,
            transitions,
        })
    }

    /// True if `state` exists in the graph.
    pub fn contains(&self, state: &str) -> bool {
        self.states.contains_key(state)
    }

    /// True if `state` exists and has no children.
    pub fn is_leaf(&self, state: &str) -> bool {
        self.states
            .get(state)
            .map(|node| node.children.is_empty())
            .unwrap_or(false)
    }

    /// All leaf state names.
    pub fn leaves(&self) -> BTreeSet<StateName> {
        self.states
            .iter()
            .filter(|(_, node)| node.children.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// All state names, declaration order.
    pub fn state_names(&self) -> impl Iterator<Item = &StateName> {
        self.states.keys()
    }

    /// Parent of `state`, if any.
    pub fn parent(&self, state: &str) -> Option<&StateName> {
        self.states.get(state).and_then(|node| node.parent.as_ref())
    }

    /// Every trigger name in the graph.
    pub fn triggers(&self) -> BTreeSet<TriggerName> {
        self.transitions.keys().cloned().collect()
    }

    /// Triggers whose transitions have `state` or an ancestor as source.
    pub fn triggers_available_from(&self, state: &str) -> BTreeSet<TriggerName> {
        let chain = match self.chain(state) {
            Some(chain) => chain,
            None => return BTreeSet::new(),
        };
        self.transitions
            .iter()
            .filter(|(_, by_source)| chain.iter().any(|s| by_source.contains_key(s.as_str())))
            .map(|(trigger, _)| trigger.clone())
            .collect()
    }

    /// Select the transition `trigger` takes from `state`, walking up
    /// through ancestors. `None` means the trigger is not allowed here.
    pub fn resolve(&self, trigger: &str, state: &str) -> Option<&Transition> {
        let by_source = self.transitions.get(trigger)?;
        let chain = self.chain(state)?;
        chain.iter().find_map(|s| by_source.get(s.as_str()))
    }

    /// Descend through initial children until a leaf is reached.
    pub fn initial_leaf(&self, state: &str) -> Option<StateName> {
        let mut current = self.states.get_key_value(state)?.0.clone();
        while let Some(initial) = self.states.get(current.as_str())?.initial.clone() {
            current = initial;
        }
        Some(current)
    }

    /// Compute the hook paths for a transition from `from_leaf` to
    /// `dest`.
    ///
    /// Returns `(exits, enters, dest_leaf)`: exited states
    /// innermost-first, entered states outermost-first (including the
    /// initial-child descent below `dest`), and the leaf the machine
    /// ends up in. A transition whose destination is the source leaf
    /// itself re-enters it.
    pub fn exit_enter_paths(
        &self,
        from_leaf: &str,
        dest: &str,
    ) -> Option<(Vec<StateName>, Vec<StateName>, StateName)> {
        let from_chain = self.chain(from_leaf)?;
        let dest_chain = self.chain(dest)?;

        if from_leaf == dest {
            // Explicit self-transition: exit and re-enter the leaf.
            let mut enters = vec![dest_chain[0].clone()];
            self.descend(&mut enters);
            let dest_leaf = enters[enters.len() - 1].clone();
            return Some((vec![from_chain[0].clone()], enters, dest_leaf));
        }

        // Deepest state common to both ancestor chains.
        let lca = dest_chain
            .iter()
            .find(|s| from_chain.iter().any(|f| f == *s))
            .cloned();

        let exits: Vec<StateName> = from_chain
            .iter()
            .take_while(|s| lca.as_ref() != Some(*s))
            .cloned()
            .collect();

        let mut enters: Vec<StateName> = dest_chain
            .iter()
            .take_while(|s| lca.as_ref() != Some(*s))
            .cloned()
            .collect();
        enters.reverse();

        if enters.is_empty() {
            // Destination is an ancestor of the source leaf: nothing
            // above it is entered, only its initial-child chain.
            let mut seed = vec![dest_chain[0].clone()];
            self.descend(&mut seed);
            enters = seed.split_off(1);
        } else {
            self.descend(&mut enters);
        }

        let dest_leaf = enters
            .last()
            .cloned()
            .unwrap_or_else(|| StateName::new(dest));
        Some((exits, enters, dest_leaf))
    }

    /// Render the graph as Graphviz DOT: compound states become
    /// clusters, transitions become labeled edges. Rendering to an
    /// image is the caller's business.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph state_machine {\n  rankdir=LR;\n  node [shape=box, style=rounded];\n");

        for (name, node) in &self.states {
            if node.parent.is_none() {
                self.write_dot_state(&mut out, name, node, 1);
            }
        }

        let mut edges: Vec<&Transition> = self
            .transitions
            .values()
            .flat_map(|by_source| by_source.values())
            .collect();
        edges.sort_by(|a, b| (&a.trigger, &a.source).cmp(&(&b.trigger, &b.source)));
        for transition in edges {
            // Compound endpoints are drawn from/to their initial leaf,
            // since clusters cannot anchor edges.
            let source = self
                .initial_leaf(transition.source.as_str())
                .unwrap_or_else(|| transition.source.clone());
            let dest = self
                .initial_leaf(transition.dest.as_str())
                .unwrap_or_else(|| transition.dest.clone());
            out.push_str(&format!(
                "  \"{}\" -> \"{}\" [label=\"{}\"];\n",
                source, dest, transition.trigger
            ));
        }

        out.push_str("}\n");
        out
    }

    fn write_dot_state(&self, out: &mut String, name: &StateName, node: &StateNode, depth: usize) {
        let indent = "  ".repeat(depth);
        if node.children.is_empty() {
            out.push_str(&format!("{indent}\"{name}\";\n"));
            return;
        }
        out.push_str(&format!(
            "{indent}subgraph \"cluster_{name}\" {{\n{indent}  label=\"{name}\";\n"
        ));
        for child in &node.children {
            if let Some(child_node) = self.states.get(child.as_str()) {
                self.write_dot_state(out, child, child_node, depth + 1);
            }
        }
        out.push_str(&format!("{indent}}}\n"));
    }

    /// Ancestor chain starting at `state` itself, leaf-side first.
    fn chain(&self, state: &str) -> Option<Vec<StateName>> {
        let (name, mut node) = self.states.get_key_value(state)?;
        let mut chain = vec![name.clone()];
        while let Some(parent) = node.parent.as_ref() {
            chain.push(parent.clone());
            node = self.states.get(parent.as_str())?;
        }
        Some(chain)
    }

    /// Extend `enters` with the initial-child descent below its last
    /// element.
    fn descend(&self, enters: &mut Vec<StateName>) {
        while let Some(initial) = enters
            .last()
            .and_then(|s| self.states.get(s.as_str()))
            .and_then(|node| node.initial.clone())
        {
            enters.push(initial);
        }
    }
}

fn check_dest(
    states: &IndexMap<StateName, StateNode>,
    spec: &TransitionSpec,
) -> Result<(), GraphError> {
    if !states.contains_key(spec.dest.as_str()) {
        return Err(GraphError::UnknownDest {
            trigger: spec.trigger.clone(),
            dest: spec.dest.clone(),
        });
    }
    Ok(())
}

/// Recursively register `spec` and its children under `parent`.
fn add_state(
    states: &mut IndexMap<StateName, StateNode>,
    spec: &StateSpec,
    parent: Option<&StateName>,
) -> Result<StateName, GraphError> {
    let full = match parent {
        Some(parent) => parent.child(&spec.name),
        None => StateName::new(&spec.name),
    };
    if states.contains_key(full.as_str()) {
        return Err(GraphError::DuplicateState(full));
    }

    // Insert the node before recursing so children can name it as parent;
    // children and initial are patched in afterwards.
    states.insert(
        full.clone(),
        StateNode {
            parent: parent.cloned(),
            children: Vec::new(),
            initial: None,
        },
    );

    let mut children = Vec::with_capacity(spec.children.len());
    for child in &spec.children {
        children.push(add_state(states, child, Some(&full))?);
    }

    let initial = match (&spec.initial, children.first()) {
        (Some(short), _) => {
            let wanted = full.child(short);
            if !children.iter().any(|c| *c == wanted) {
                return Err(GraphError::UnknownInitial {
                    state: full,
                    initial: short.clone(),
                });
            }
            Some(wanted)
        }
        (None, Some(first)) => Some(first.clone()),
        (None, None) => None,
    };

    if let Some(node) = states.get_mut(full.as_str()) {
        node.children = children;
        node.initial = initial;
    }
    Ok(full)
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
