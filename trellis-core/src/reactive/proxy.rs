//! Reactive Wrappers
//!
//! A [`Reactive`] is a capability over one [`Target`]: every accessor reads
//! or writes the raw container and weaves the matching `track` / `trigger`
//! call around it.
//!
//! # Flavors
//!
//! | Flavor           | Nested containers       | Writes                |
//! |------------------|-------------------------|-----------------------|
//! | reactive         | wrapped reactive        | tracked and triggered |
//! | shallow reactive | returned raw            | tracked and triggered |
//! | readonly         | wrapped readonly        | rejected, no-op       |
//! | shallow readonly | returned raw            | rejected, no-op       |
//!
//! Reads through every flavor track, so a readonly view over a target that
//! is also mutated elsewhere still sees updates.
//!
//! # Identity
//!
//! Wrapping the same target twice with the same flavor returns the same
//! wrapper. The registry holds weak references; a wrapper is freed when its
//! last handle is dropped.
//!
//! # Borrowing
//!
//! No accessor holds a borrow of the raw container while it tracks or
//! triggers, since triggered effects may read or write the same target.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::warn;

use super::runtime::Runtime;
use super::value::{Container, ContainerKind, Target, TargetId, Value};
use crate::graph::{Key, TriggerOp};

/// Which view of a target a wrapper exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    Reactive,
    ShallowReactive,
    Readonly,
    ShallowReadonly,
}

impl Flavor {
    pub fn is_readonly(self) -> bool {
        matches!(self, Flavor::Readonly | Flavor::ShallowReadonly)
    }

    pub fn is_shallow(self) -> bool {
        matches!(self, Flavor::ShallowReactive | Flavor::ShallowReadonly)
    }
}

thread_local! {
    static REGISTRY: RefCell<HashMap<(TargetId, Flavor), Weak<ProxyRecord>>> =
        RefCell::new(HashMap::new());
}

struct ProxyRecord {
    target: Target,
    flavor: Flavor,
}

impl Drop for ProxyRecord {
    fn drop(&mut self) {
        let slot = (self.target.id(), self.flavor);
        let _ = REGISTRY.try_with(|registry| {
            if let Ok(mut registry) = registry.try_borrow_mut() {
                if registry.get(&slot).is_some_and(|weak| weak.strong_count() == 0) {
                    registry.remove(&slot);
                }
            }
        });
    }
}

/// A tracked view over a raw container.
#[derive(Clone)]
pub struct Reactive {
    inner: Rc<ProxyRecord>,
}

fn wrap_target(target: Target, flavor: Flavor) -> Reactive {
    let slot = (target.id(), flavor);
    let existing = REGISTRY.with(|registry| registry.borrow().get(&slot).and_then(Weak::upgrade));
    if let Some(inner) = existing {
        return Reactive { inner };
    }

    let inner = Rc::new(ProxyRecord { target, flavor });
    REGISTRY.with(|registry| {
        registry.borrow_mut().insert(slot, Rc::downgrade(&inner));
    });
    Reactive { inner }
}

/// Deep, mutable reactive wrapper.
pub fn reactive(target: impl Into<Target>) -> Reactive {
    wrap_target(target.into(), Flavor::Reactive)
}

/// Mutable wrapper whose nested containers are returned raw.
pub fn shallow_reactive(target: impl Into<Target>) -> Reactive {
    wrap_target(target.into(), Flavor::ShallowReactive)
}

/// Deep read-only wrapper.
pub fn readonly(target: impl Into<Target>) -> Reactive {
    wrap_target(target.into(), Flavor::Readonly)
}

/// Read-only wrapper whose nested containers are returned raw.
pub fn shallow_readonly(target: impl Into<Target>) -> Reactive {
    wrap_target(target.into(), Flavor::ShallowReadonly)
}

/// Is this value a reactive wrapper (of any flavor)?
pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Proxy(_))
}

/// Is this value a read-only wrapper?
pub fn is_readonly(value: &Value) -> bool {
    matches!(value, Value::Proxy(proxy) if proxy.is_readonly())
}

/// Strip a wrapper, returning the raw target; other values are returned as-is.
pub fn to_raw(value: &Value) -> Value {
    value.clone().to_raw()
}

impl From<Reactive> for Target {
    fn from(proxy: Reactive) -> Self {
        proxy.raw()
    }
}

impl From<&Reactive> for Target {
    fn from(proxy: &Reactive) -> Self {
        proxy.raw()
    }
}

impl From<&Target> for Target {
    fn from(target: &Target) -> Self {
        target.clone()
    }
}

impl Reactive {
    /// The raw target. Accesses through it are untracked.
    pub fn raw(&self) -> Target {
        self.inner.target.clone()
    }

    pub fn target_id(&self) -> TargetId {
        self.inner.target.id()
    }

    pub fn kind(&self) -> ContainerKind {
        self.inner.target.kind()
    }

    pub fn flavor(&self) -> Flavor {
        self.inner.flavor
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.flavor.is_readonly()
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.flavor.is_shallow()
    }

    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    // ---- Reads ----

    /// Read one key.
    ///
    /// Objects take string keys, arrays take indices or `"length"`, maps take
    /// any value. Sets have no keyed read; use [`Reactive::has`].
    pub fn get(&self, key: impl Into<Value>) -> Value {
        if self.kind() == ContainerKind::Set {
            self.unsupported("get");
            return Value::Undefined;
        }
        let Some(key) = self.key_for(key.into(), "get") else {
            return Value::Undefined;
        };
        self.track(key.clone());
        let raw = self.read_slot(&key);
        self.wrap(raw)
    }

    /// Membership test. Tracks the key even when it is absent, so a later
    /// add notifies.
    pub fn has(&self, key: impl Into<Value>) -> bool {
        let Some(key) = self.key_for(key.into(), "has") else {
            return false;
        };
        self.track(key.clone());
        let data = self.inner.target.borrow();
        match (&*data, &key) {
            (Container::Object(map), Key::Field(name)) => map.contains_key(name),
            (Container::Array(items), Key::Index(i)) => *i < items.len(),
            (Container::Array(_), Key::Length) => true,
            (Container::Map(map), Key::Entry(k)) => map.contains_key(k),
            (Container::Set(set), Key::Entry(k)) => set.contains(k),
            _ => false,
        }
    }

    /// Own keys, in insertion order. Map keys track key iteration only.
    pub fn keys(&self) -> Vec<Value> {
        match self.kind() {
            ContainerKind::Object => {
                self.track(Key::Iterate);
                let data = self.inner.target.borrow();
                match &*data {
                    Container::Object(map) => map.keys().map(|k| Value::Str(k.clone())).collect(),
                    _ => Vec::new(),
                }
            }
            ContainerKind::Array => {
                self.track(Key::Length);
                let len = self.inner.target.borrow().len();
                (0..len).map(Value::from).collect()
            }
            ContainerKind::Map => {
                self.track(Key::MapKeyIterate);
                let keys: Vec<Value> = match &*self.inner.target.borrow() {
                    Container::Map(map) => map.keys().cloned().collect(),
                    _ => Vec::new(),
                };
                keys.into_iter().map(|k| self.wrap(k)).collect()
            }
            ContainerKind::Set => self.values(),
        }
    }

    /// Values, in order. Each value is wrapped per the flavor.
    pub fn values(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }

    /// `(key, value)` pairs, in order. Sets yield `(value, value)`.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        let raw: Vec<(Value, Value)> = match self.kind() {
            ContainerKind::Object => {
                self.track(Key::Iterate);
                let pairs: Vec<(Rc<str>, Value)> = match &*self.inner.target.borrow() {
                    Container::Object(map) => {
                        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
                    }
                    _ => Vec::new(),
                };
                pairs
                    .into_iter()
                    .map(|(k, v)| {
                        self.track(Key::Field(k.clone()));
                        (Value::Str(k), v)
                    })
                    .collect()
            }
            ContainerKind::Array => {
                self.track(Key::Length);
                let items: Vec<Value> = match &*self.inner.target.borrow() {
                    Container::Array(items) => items.clone(),
                    _ => Vec::new(),
                };
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| {
                        self.track(Key::Index(i));
                        (Value::from(i), v)
                    })
                    .collect()
            }
            ContainerKind::Map => {
                self.track(Key::Iterate);
                match &*self.inner.target.borrow() {
                    Container::Map(map) => {
                        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
                    }
                    _ => Vec::new(),
                }
            }
            ContainerKind::Set => {
                self.track(Key::Iterate);
                match &*self.inner.target.borrow() {
                    Container::Set(set) => set.iter().map(|v| (v.clone(), v.clone())).collect(),
                    _ => Vec::new(),
                }
            }
        };

        let wrap_keys = matches!(self.kind(), ContainerKind::Map | ContainerKind::Set);
        raw.into_iter()
            .map(|(k, v)| {
                let k = if wrap_keys { self.wrap(k) } else { k };
                (k, self.wrap(v))
            })
            .collect()
    }

    /// Visit every `(value, key)` pair.
    pub fn for_each(&self, mut f: impl FnMut(&Value, &Value)) {
        for (k, v) in self.entries() {
            f(&v, &k);
        }
    }

    /// Entry count (array length for arrays).
    pub fn len(&self) -> usize {
        let key = match self.kind() {
            ContainerKind::Array => Key::Length,
            _ => Key::Iterate,
        };
        self.track(key);
        self.inner.target.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ---- Writes ----

    /// Write one key. Returns whether the write was accepted; writes through
    /// a read-only wrapper report success and do nothing.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> bool {
        if self.reject_readonly("set") {
            return true;
        }
        if self.kind() == ContainerKind::Set {
            self.unsupported("set");
            return false;
        }
        let Some(key) = self.key_for(key.into(), "set") else {
            return false;
        };
        let value = value.into().to_raw();
        if key == Key::Length && !is_valid_length(&value) {
            warn!(value = %value, "invalid array length");
            return false;
        }

        let change = {
            let mut data = self.inner.target.borrow_mut();
            match (&mut *data, key) {
                (Container::Object(map), Key::Field(name)) => {
                    match map.insert(name.clone(), value.clone()) {
                        None => Some((Key::Field(name), TriggerOp::Add, None)),
                        Some(old) if !old.same_value_zero(&value) => {
                            Some((Key::Field(name), TriggerOp::Set, None))
                        }
                        Some(_) => None,
                    }
                }
                (Container::Array(items), Key::Index(i)) => {
                    if i >= items.len() {
                        items.resize(i, Value::Undefined);
                        items.push(value);
                        Some((Key::Index(i), TriggerOp::Add, None))
                    } else {
                        let old = std::mem::replace(&mut items[i], value.clone());
                        (!old.same_value_zero(&value)).then_some((Key::Index(i), TriggerOp::Set, None))
                    }
                }
                (Container::Array(items), Key::Length) => {
                    let new_len = value.as_f64().unwrap_or_default() as usize;
                    let old_len = items.len();
                    items.resize(new_len, Value::Undefined);
                    (new_len != old_len).then_some((Key::Length, TriggerOp::Set, Some(new_len)))
                }
                (Container::Map(map), Key::Entry(k)) => match map.insert(k.clone(), value.clone()) {
                    None => Some((Key::Entry(k), TriggerOp::Add, None)),
                    Some(old) if !old.same_value_zero(&value) => {
                        Some((Key::Entry(k), TriggerOp::Set, None))
                    }
                    Some(_) => None,
                },
                _ => None,
            }
        };

        if let Some((key, op, new_len)) = change {
            self.trigger(key, op, new_len);
        }
        true
    }

    /// Delete one key. Deleting an array index leaves a hole (`Undefined`).
    /// Returns whether the key existed.
    pub fn delete(&self, key: impl Into<Value>) -> bool {
        if self.reject_readonly("delete") {
            return true;
        }
        let Some(key) = self.key_for(key.into(), "delete") else {
            return false;
        };

        let removed = {
            let mut data = self.inner.target.borrow_mut();
            match (&mut *data, &key) {
                (Container::Object(map), Key::Field(name)) => map.shift_remove(name).is_some(),
                (Container::Array(items), Key::Index(i)) => match items.get_mut(*i) {
                    Some(slot) => {
                        *slot = Value::Undefined;
                        true
                    }
                    None => false,
                },
                (Container::Map(map), Key::Entry(k)) => map.shift_remove(k).is_some(),
                (Container::Set(set), Key::Entry(k)) => set.shift_remove(k),
                _ => false,
            }
        };

        if removed {
            self.trigger(key, TriggerOp::Delete, None);
        }
        removed
    }

    // ---- Internals shared with the array and collection accessors ----

    pub(crate) fn track(&self, key: Key) {
        Runtime::track(self.target_id(), key);
    }

    pub(crate) fn trigger(&self, key: Key, op: TriggerOp, new_length: Option<usize>) {
        Runtime::trigger(self.target_id(), Some(self.kind()), key, op, new_length);
    }

    /// Wrap a raw value read out of the container, per this wrapper's flavor.
    pub(crate) fn wrap(&self, value: Value) -> Value {
        if self.is_shallow() {
            return value;
        }
        match value {
            Value::Raw(target) if self.is_readonly() => Value::Proxy(readonly(target)),
            Value::Raw(target) => Value::Proxy(reactive(target)),
            other => other,
        }
    }

    pub(crate) fn reject_readonly(&self, op: &'static str) -> bool {
        if self.is_readonly() {
            warn!(op, target_id = self.target_id().raw(), "write rejected: target is readonly");
            return true;
        }
        false
    }

    pub(crate) fn unsupported(&self, op: &'static str) {
        warn!(op, kind = %self.kind(), "operation not supported on this container kind");
    }

    fn read_slot(&self, key: &Key) -> Value {
        let data = self.inner.target.borrow();
        match (&*data, key) {
            (Container::Object(map), Key::Field(name)) => map.get(name).cloned(),
            (Container::Array(items), Key::Index(i)) => items.get(*i).cloned(),
            (Container::Array(items), Key::Length) => Some(Value::from(items.len())),
            (Container::Map(map), Key::Entry(k)) => map.get(k).cloned(),
            _ => None,
        }
        .unwrap_or_default()
    }

    fn key_for(&self, key: Value, op: &'static str) -> Option<Key> {
        let resolved = match (self.kind(), key) {
            (ContainerKind::Object, Value::Str(name)) => Some(Key::Field(name)),
            (ContainerKind::Object, n @ Value::Number(_)) => Some(Key::Field(n.to_string().into())),
            (ContainerKind::Array, Value::Str(name)) if &*name == "length" => Some(Key::Length),
            (ContainerKind::Array, Value::Str(name)) => name.parse::<usize>().ok().map(Key::Index),
            (ContainerKind::Array, Value::Number(n)) if n >= 0.0 && n.fract() == 0.0 => {
                Some(Key::Index(n as usize))
            }
            (ContainerKind::Map | ContainerKind::Set, k) => Some(Key::Entry(k.to_raw())),
            _ => None,
        };
        if resolved.is_none() {
            warn!(op, kind = %self.kind(), "invalid key for this container kind");
        }
        resolved
    }
}

fn is_valid_length(value: &Value) -> bool {
    value
        .as_f64()
        .is_some_and(|n| n >= 0.0 && n.fract() == 0.0 && n.is_finite())
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Reactive {}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("target", &self.target_id())
            .field("kind", &self.kind())
            .field("flavor", &self.inner.flavor)
            .finish()
    }
}
