//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects reactive containers
//! and effects. It owns the dependency graph and dispatches notifications
//! when a container changes.
//!
//! # How It Works
//!
//! 1. When an effect reads a key of a reactive container, the runtime
//!    records the edge `(target, key) -> effect` and remembers the edge on
//!    the effect so it can be cleaned up later.
//!
//! 2. Before an effect re-runs, all of its edges are removed. The run then
//!    records a fresh set, so dependencies from branches no longer taken
//!    disappear.
//!
//! 3. When a container is written, the runtime:
//!    a. Collects the effects subscribed to the affected keys
//!    b. Skips the effect that is currently running
//!    c. Notifies each one (its scheduler if it has one, otherwise a re-run)
//!
//! # Threading
//!
//! The graph is thread-local. Reactive values are `Rc`-based and never leave
//! the thread that created them.

use std::cell::RefCell;

use tracing::trace;

use super::context::ReactiveContext;
use super::effect::Effect;
use super::value::{ContainerKind, TargetId};
use crate::graph::{DepGraph, Key, TriggerOp};

thread_local! {
    static GRAPH: RefCell<DepGraph> = RefCell::new(DepGraph::new());
}

/// The thread-local reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Record that the running effect depends on `(target, key)`.
    ///
    /// No-op outside an effect or while tracking is paused.
    pub fn track(target: TargetId, key: Key) {
        if !ReactiveContext::is_tracking() {
            return;
        }
        let Some(effect) = ReactiveContext::current_effect() else {
            return;
        };

        let added = GRAPH.with(|graph| graph.borrow_mut().subscribe(target, key.clone(), &effect));
        if added {
            trace!(target_id = target.raw(), %key, effect = effect.id().raw(), "track");
            effect.record_dep(target, key);
        }
    }

    /// Notify the effects affected by a write to `(target, key)`.
    pub fn trigger(
        target: TargetId,
        kind: Option<ContainerKind>,
        key: Key,
        op: TriggerOp,
        new_length: Option<usize>,
    ) {
        Self::trigger_batch(target, kind, &[(key, op, new_length)]);
    }

    /// Notify the effects affected by several writes to one target. Each
    /// effect is notified at most once.
    pub fn trigger_batch(
        target: TargetId,
        kind: Option<ContainerKind>,
        changes: &[(Key, TriggerOp, Option<usize>)],
    ) {
        let mut effects: Vec<Effect> = Vec::new();
        GRAPH.with(|graph| {
            let graph = graph.borrow();
            for (key, op, new_length) in changes {
                trace!(target_id = target.raw(), %key, ?op, "trigger");
                for effect in graph.collect(target, kind, key, *op, *new_length) {
                    if !effects.iter().any(|e| e.id() == effect.id()) {
                        effects.push(effect);
                    }
                }
            }
        });
        if effects.is_empty() {
            return;
        }

        let running = ReactiveContext::current_subscriber();
        // The graph borrow is released here; effects may track and trigger.
        for effect in effects {
            if Some(effect.id()) == running {
                continue;
            }
            effect.notify();
        }
    }

    /// Remove every edge recorded by `effect`.
    pub fn cleanup(effect: &Effect) {
        let deps = effect.take_deps();
        if deps.is_empty() {
            return;
        }
        let removed: Vec<Effect> = GRAPH.with(|graph| {
            let mut graph = graph.borrow_mut();
            deps.iter()
                .filter_map(|(target, key)| graph.unsubscribe(*target, key, effect.id()))
                .collect()
        });
        // Handles are dropped after the borrow is released.
        drop(removed);
    }

    /// Forget every edge recorded against a target. Called when the target
    /// is freed.
    pub fn forget_target(target: TargetId) {
        let removed = GRAPH
            .try_with(|graph| {
                graph
                    .try_borrow_mut()
                    .ok()
                    .and_then(|mut graph| graph.forget(target))
            })
            .ok()
            .flatten();
        drop(removed);
    }

    /// Number of effects subscribed to `(target, key)`.
    pub fn subscriber_count(target: TargetId, key: &Key) -> usize {
        GRAPH.with(|graph| graph.borrow().subscriber_count(target, key))
    }

    /// Check if we're inside a tracking effect.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_tracking()
    }
}
