//! Refs
//!
//! A [`Ref`] is a single-value reactive cell. It is a view of one field of a
//! reactive object: `Ref::new(v)` wraps a fresh `{ value: v }` object, while
//! [`to_ref`] and [`to_refs`] build views over fields of an existing object,
//! so writes through the ref and through the object are the same write.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::warn;

use super::proxy::{reactive, Reactive};
use super::value::{ContainerKind, Target, Value};

/// A reactive single-value cell.
#[derive(Clone)]
pub struct Ref {
    source: Reactive,
    key: Rc<str>,
}

impl Ref {
    /// A ref holding `value`.
    pub fn new(value: impl Into<Value>) -> Self {
        let source = reactive(Target::object_from([("value", value.into())]));
        Self {
            source,
            key: Rc::from("value"),
        }
    }

    /// Read the current value (tracked).
    pub fn value(&self) -> Value {
        self.source.get(self.key.clone())
    }

    /// Replace the value. Returns whether the write was accepted.
    pub fn set_value(&self, value: impl Into<Value>) -> bool {
        self.source.set(self.key.clone(), value)
    }

    /// The object this ref reads from.
    pub fn source(&self) -> &Reactive {
        &self.source
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("source", &self.source)
            .field("key", &self.key)
            .finish()
    }
}

/// Shorthand for [`Ref::new`].
pub fn ref_value(value: impl Into<Value>) -> Ref {
    Ref::new(value)
}

/// A ref over one field of a reactive object.
pub fn to_ref(source: &Reactive, key: impl Into<Rc<str>>) -> Ref {
    Ref {
        source: source.clone(),
        key: key.into(),
    }
}

/// One ref per current field of a reactive object.
pub fn to_refs(source: &Reactive) -> IndexMap<Rc<str>, Ref> {
    if source.kind() != ContainerKind::Object {
        warn!(kind = %source.kind(), "to_refs expects an object");
        return IndexMap::new();
    }
    source
        .keys()
        .into_iter()
        .filter_map(|key| match key {
            Value::Str(name) => Some((name.clone(), to_ref(source, name))),
            _ => None,
        })
        .collect()
}
