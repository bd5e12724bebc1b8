//! Array Accessors
//!
//! Mutators (`push`, `pop`, `shift`, `unshift`, `splice`) run with tracking
//! paused: a mutating call must not subscribe its caller to the indices and
//! length it rewrites. Each mutator edits the raw vector, then diffs the
//! result against a snapshot and notifies every affected key in one batch.
//!
//! On a readonly array every mutator is a no-op: `push` and `unshift`
//! report the unchanged length, `pop` and `shift` return `Undefined` and
//! `splice` removes nothing.
//!
//! Searches (`includes`, `index_of`, `last_index_of`) look through the
//! wrapped view first and fall back to the raw elements, so a nested object
//! is found whether the caller holds its raw target or its wrapper.

use super::context::PauseTracking;
use super::proxy::Reactive;
use super::runtime::Runtime;
use super::value::{Container, ContainerKind, Value};
use crate::graph::{Key, TriggerOp};

impl Reactive {
    /// Append a value and return the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        let value = value.into().to_raw();
        self.mutate_array("push", |items| {
            items.push(value);
            items.len()
        })
        .unwrap_or_else(|| self.untracked_len())
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Value {
        self.mutate_array("pop", |items| items.pop().unwrap_or_default())
            .map(|v| self.wrap(v))
            .unwrap_or_default()
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Value {
        self.mutate_array("shift", |items| {
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        })
        .map(|v| self.wrap(v))
        .unwrap_or_default()
    }

    /// Prepend a value and return the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> usize {
        let value = value.into().to_raw();
        self.mutate_array("unshift", |items| {
            items.insert(0, value);
            items.len()
        })
        .unwrap_or_else(|| self.untracked_len())
    }

    /// Remove `delete_count` elements at `start`, insert `items` in their
    /// place, and return the removed elements.
    pub fn splice<I, V>(&self, start: usize, delete_count: usize, items: I) -> Vec<Value>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let inserted: Vec<Value> = items.into_iter().map(|v| v.into().to_raw()).collect();
        self.mutate_array("splice", |vec| {
            let start = start.min(vec.len());
            let end = start.saturating_add(delete_count).min(vec.len());
            vec.splice(start..end, inserted).collect::<Vec<_>>()
        })
        .map(|removed| removed.into_iter().map(|v| self.wrap(v)).collect())
        .unwrap_or_default()
    }

    /// SameValueZero membership.
    pub fn includes(&self, value: impl Into<Value>) -> bool {
        self.index_of(value).is_some()
    }

    /// Position of the first element equal to `value`.
    pub fn index_of(&self, value: impl Into<Value>) -> Option<usize> {
        let needle = value.into();
        let (view, raw) = self.search_views("index_of")?;
        view.iter()
            .position(|v| v.same_value_zero(&needle))
            .or_else(|| {
                let needle = needle.to_raw();
                raw.iter().position(|v| v.same_value_zero(&needle))
            })
    }

    /// Position of the last element equal to `value`.
    pub fn last_index_of(&self, value: impl Into<Value>) -> Option<usize> {
        let needle = value.into();
        let (view, raw) = self.search_views("last_index_of")?;
        view.iter()
            .rposition(|v| v.same_value_zero(&needle))
            .or_else(|| {
                let needle = needle.to_raw();
                raw.iter().rposition(|v| v.same_value_zero(&needle))
            })
    }

    /// Tracked, wrapped elements plus the raw elements they came from.
    fn search_views(&self, op: &'static str) -> Option<(Vec<Value>, Vec<Value>)> {
        if self.kind() != ContainerKind::Array {
            self.unsupported(op);
            return None;
        }
        let view = self.values();
        let raw = match &*self.raw().borrow() {
            Container::Array(items) => items.clone(),
            _ => Vec::new(),
        };
        Some((view, raw))
    }

    fn untracked_len(&self) -> usize {
        let target = self.raw();
        let data = target.borrow();
        let len = match &*data {
            Container::Array(items) => items.len(),
            _ => 0,
        };
        len
    }

    fn mutate_array<R>(&self, op: &'static str, f: impl FnOnce(&mut Vec<Value>) -> R) -> Option<R> {
        if self.kind() != ContainerKind::Array {
            self.unsupported(op);
            return None;
        }
        if self.reject_readonly(op) {
            return None;
        }

        let _pause = PauseTracking::new();
        let target = self.raw();
        let (before, result, after) = {
            let mut data = target.borrow_mut();
            let Container::Array(items) = &mut *data else {
                return None;
            };
            let before = items.clone();
            let result = f(items);
            (before, result, items.clone())
        };

        let changes = array_changes(&before, &after);
        if !changes.is_empty() {
            Runtime::trigger_batch(self.target_id(), Some(ContainerKind::Array), &changes);
        }
        Some(result)
    }
}

/// Classify the per-index differences between two versions of an array.
fn array_changes(before: &[Value], after: &[Value]) -> Vec<(Key, TriggerOp, Option<usize>)> {
    let mut changes = Vec::new();
    for i in 0..before.len().max(after.len()) {
        match (before.get(i), after.get(i)) {
            (Some(old), Some(new)) if !old.same_value_zero(new) => {
                changes.push((Key::Index(i), TriggerOp::Set, None));
            }
            (None, Some(_)) => changes.push((Key::Index(i), TriggerOp::Add, None)),
            _ => {}
        }
    }
    if after.len() < before.len() {
        changes.push((Key::Length, TriggerOp::Set, Some(after.len())));
    }
    changes
}
