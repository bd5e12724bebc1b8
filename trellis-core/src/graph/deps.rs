//! Dependency Sets
//!
//! The dependency graph maps `target -> key -> set of effects`. Reads record
//! an edge; writes look up the affected keys and return the effects to
//! re-run.
//!
//! # Which keys a write touches
//!
//! Besides the written key itself, some operations also affect iteration:
//!
//! - `Add`/`Delete` affect [`Key::Iterate`] on every container, and
//!   [`Key::MapKeyIterate`] on maps.
//! - `Set` affects [`Key::Iterate`] on maps only (value iteration changes, key
//!   iteration does not).
//! - `Add` on an array affects [`Key::Length`].
//! - Writing [`Key::Length`] on an array affects every index at or beyond the
//!   new length.
//! - `Clear` affects every key of the target.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::reactive::effect::{Effect, EffectId};
use crate::reactive::value::{ContainerKind, TargetId, Value};

/// A property key on a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A named object field.
    Field(Rc<str>),
    /// An array index.
    Index(usize),
    /// An array's length.
    Length,
    /// A map entry or set member, keyed by its raw value.
    Entry(Value),
    /// Structural iteration (keys, values, entries, size).
    Iterate,
    /// Key-only iteration of a map.
    MapKeyIterate,
    /// The cached value of a computed.
    Computed,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => f.write_str(name),
            Key::Index(i) => write!(f, "[{i}]"),
            Key::Length => f.write_str("length"),
            Key::Entry(value) => write!(f, "entry({value})"),
            Key::Iterate => f.write_str("<iterate>"),
            Key::MapKeyIterate => f.write_str("<map-key-iterate>"),
            Key::Computed => f.write_str("<value>"),
        }
    }
}

/// The kind of write that triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    Add,
    Set,
    Delete,
    Clear,
}

type EffectSet = IndexMap<EffectId, Effect>;

/// The dependency graph.
#[derive(Default)]
pub struct DepGraph {
    targets: HashMap<TargetId, HashMap<Key, EffectSet>>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `effect` depends on `(target, key)`.
    ///
    /// Returns `true` if the edge is new.
    pub fn subscribe(&mut self, target: TargetId, key: Key, effect: &Effect) -> bool {
        let set = self.targets.entry(target).or_default().entry(key).or_default();
        if set.contains_key(&effect.id()) {
            return false;
        }
        set.insert(effect.id(), effect.clone());
        true
    }

    /// Remove one edge. The removed handle is returned so the caller can drop
    /// it outside any borrow of the graph.
    pub fn unsubscribe(&mut self, target: TargetId, key: &Key, effect: EffectId) -> Option<Effect> {
        let keys = self.targets.get_mut(&target)?;
        let set = keys.get_mut(key)?;
        let removed = set.shift_remove(&effect);
        if set.is_empty() {
            keys.remove(key);
            if keys.is_empty() {
                self.targets.remove(&target);
            }
        }
        removed
    }

    /// Drop every edge recorded against a target.
    pub fn forget(&mut self, target: TargetId) -> Option<HashMap<Key, EffectSet>> {
        self.targets.remove(&target)
    }

    /// Number of effects subscribed to `(target, key)`.
    pub fn subscriber_count(&self, target: TargetId, key: &Key) -> usize {
        self.targets
            .get(&target)
            .and_then(|keys| keys.get(key))
            .map_or(0, |set| set.len())
    }

    /// Number of targets with at least one subscriber.
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Collect the effects affected by a write, in subscription order and
    /// without duplicates.
    pub fn collect(
        &self,
        target: TargetId,
        kind: Option<ContainerKind>,
        key: &Key,
        op: TriggerOp,
        new_length: Option<usize>,
    ) -> Vec<Effect> {
        let Some(keys) = self.targets.get(&target) else {
            return Vec::new();
        };

        let mut out = EffectSet::new();
        let mut add = |set: Option<&EffectSet>| {
            if let Some(set) = set {
                for (id, effect) in set {
                    out.entry(*id).or_insert_with(|| effect.clone());
                }
            }
        };

        if op == TriggerOp::Clear {
            for set in keys.values() {
                add(Some(set));
            }
            return out.into_values().collect();
        }

        if let (Key::Length, Some(len)) = (key, new_length) {
            for (k, set) in keys {
                match k {
                    Key::Length => add(Some(set)),
                    Key::Index(i) if *i >= len => add(Some(set)),
                    _ => {}
                }
            }
        } else {
            add(keys.get(key));
        }

        let is_map = kind == Some(ContainerKind::Map);
        match op {
            TriggerOp::Add | TriggerOp::Delete => {
                add(keys.get(&Key::Iterate));
                if is_map {
                    add(keys.get(&Key::MapKeyIterate));
                }
                if op == TriggerOp::Add && kind == Some(ContainerKind::Array) {
                    add(keys.get(&Key::Length));
                }
            }
            TriggerOp::Set if is_map => add(keys.get(&Key::Iterate)),
            _ => {}
        }

        out.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::{effect_with, EffectOptions};

    fn lazy_effect() -> Effect {
        effect_with(|| (), EffectOptions::lazy())
    }

    #[test]
    fn subscribe_is_idempotent() {
        let mut graph = DepGraph::new();
        let target = TargetId::new();
        let e = lazy_effect();

        assert!(graph.subscribe(target, Key::Field("a".into()), &e));
        assert!(!graph.subscribe(target, Key::Field("a".into()), &e));
        assert_eq!(graph.subscriber_count(target, &Key::Field("a".into())), 1);
    }

    #[test]
    fn unsubscribe_prunes_empty_sets() {
        let mut graph = DepGraph::new();
        let target = TargetId::new();
        let e = lazy_effect();

        graph.subscribe(target, Key::Length, &e);
        assert!(graph.unsubscribe(target, &Key::Length, e.id()).is_some());
        assert_eq!(graph.target_count(), 0);
    }

    #[test]
    fn set_on_object_touches_only_the_key() {
        let mut graph = DepGraph::new();
        let target = TargetId::new();
        let field = lazy_effect();
        let iter = lazy_effect();

        graph.subscribe(target, Key::Field("a".into()), &field);
        graph.subscribe(target, Key::Iterate, &iter);

        let hit = graph.collect(
            target,
            Some(ContainerKind::Object),
            &Key::Field("a".into()),
            TriggerOp::Set,
            None,
        );
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].id(), field.id());

        let hit = graph.collect(
            target,
            Some(ContainerKind::Object),
            &Key::Field("b".into()),
            TriggerOp::Add,
            None,
        );
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].id(), iter.id());
    }

    #[test]
    fn map_set_skips_key_iteration() {
        let mut graph = DepGraph::new();
        let target = TargetId::new();
        let keys = lazy_effect();
        let values = lazy_effect();

        graph.subscribe(target, Key::MapKeyIterate, &keys);
        graph.subscribe(target, Key::Iterate, &values);

        let entry = Key::Entry(Value::from("k"));
        let hit = graph.collect(target, Some(ContainerKind::Map), &entry, TriggerOp::Set, None);
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].id(), values.id());

        let hit = graph.collect(target, Some(ContainerKind::Map), &entry, TriggerOp::Add, None);
        assert_eq!(hit.len(), 2);
    }

    #[test]
    fn length_write_hits_truncated_indices() {
        let mut graph = DepGraph::new();
        let target = TargetId::new();
        let low = lazy_effect();
        let high = lazy_effect();

        graph.subscribe(target, Key::Index(0), &low);
        graph.subscribe(target, Key::Index(3), &high);

        let hit = graph.collect(
            target,
            Some(ContainerKind::Array),
            &Key::Length,
            TriggerOp::Set,
            Some(2),
        );
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].id(), high.id());
    }

    #[test]
    fn clear_hits_everything_once() {
        let mut graph = DepGraph::new();
        let target = TargetId::new();
        let e = lazy_effect();

        graph.subscribe(target, Key::Entry(Value::from(1)), &e);
        graph.subscribe(target, Key::Iterate, &e);

        let hit = graph.collect(
            target,
            Some(ContainerKind::Set),
            &Key::Iterate,
            TriggerOp::Clear,
            None,
        );
        assert_eq!(hit.len(), 1);
    }
}
