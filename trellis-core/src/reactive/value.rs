//! Values and Targets
//!
//! A [`Target`] is a plain, mutable container (object, array, map or set)
//! that can be made observable. Containers hold [`Value`]s, which are either
//! scalars, raw targets, reactive wrappers, or callbacks.
//!
//! # Equality
//!
//! `Value` equality is SameValueZero: `NaN` equals `NaN`, `+0` equals `-0`,
//! containers compare by identity and a raw target never equals a wrapper of
//! it. `Hash` agrees with this so values can key maps and sets.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::{IndexMap, IndexSet};

use super::proxy::Reactive;
use super::runtime::Runtime;
use crate::error::ReactiveError;

/// Stable identity of a target (or of any other trackable source, such as a
/// computed value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

/// The kind of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Object,
    Array,
    Map,
    Set,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerKind::Object => "object",
            ContainerKind::Array => "array",
            ContainerKind::Map => "map",
            ContainerKind::Set => "set",
        };
        f.write_str(name)
    }
}

/// Raw container storage.
#[derive(Debug, Clone)]
pub enum Container {
    Object(IndexMap<Rc<str>, Value>),
    Array(Vec<Value>),
    Map(IndexMap<Value, Value>),
    Set(IndexSet<Value>),
}

impl Container {
    pub fn kind(&self) -> ContainerKind {
        match self {
            Container::Object(_) => ContainerKind::Object,
            Container::Array(_) => ContainerKind::Array,
            Container::Map(_) => ContainerKind::Map,
            Container::Set(_) => ContainerKind::Set,
        }
    }

    /// Number of own entries.
    pub fn len(&self) -> usize {
        match self {
            Container::Object(map) => map.len(),
            Container::Array(items) => items.len(),
            Container::Map(map) => map.len(),
            Container::Set(set) => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A shared handle to one raw container.
///
/// Cloning a `Target` clones the handle, not the container. Consumers that
/// want change tracking go through a [`Reactive`] wrapper instead of mutating
/// the target directly.
#[derive(Clone)]
pub struct Target {
    inner: Rc<TargetInner>,
}

struct TargetInner {
    id: TargetId,
    kind: ContainerKind,
    data: RefCell<Container>,
}

impl Drop for TargetInner {
    fn drop(&mut self) {
        Runtime::forget_target(self.id);
    }
}

impl Target {
    /// Wrap a container in a new target.
    pub fn new(container: Container) -> Self {
        Self {
            inner: Rc::new(TargetInner {
                id: TargetId::new(),
                kind: container.kind(),
                data: RefCell::new(container),
            }),
        }
    }

    /// An empty object.
    pub fn object() -> Self {
        Self::new(Container::Object(IndexMap::new()))
    }

    /// An empty array.
    pub fn array() -> Self {
        Self::new(Container::Array(Vec::new()))
    }

    /// An empty map.
    pub fn map() -> Self {
        Self::new(Container::Map(IndexMap::new()))
    }

    /// An empty set.
    pub fn set() -> Self {
        Self::new(Container::Set(IndexSet::new()))
    }

    /// Build an object from `(key, value)` pairs.
    pub fn object_from<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into().to_raw()))
            .collect();
        Self::new(Container::Object(map))
    }

    /// Build an array from values.
    pub fn array_from<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items = items.into_iter().map(|v| v.into().to_raw()).collect();
        Self::new(Container::Array(items))
    }

    /// Build a map from `(key, value)` pairs.
    pub fn map_from<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into().to_raw(), v.into().to_raw()))
            .collect();
        Self::new(Container::Map(map))
    }

    /// Build a set from values.
    pub fn set_from<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let set = items.into_iter().map(|v| v.into().to_raw()).collect();
        Self::new(Container::Set(set))
    }

    /// Build a target tree from JSON. Scalars are rejected.
    pub fn from_json(json: serde_json::Value) -> Result<Self, ReactiveError> {
        match Value::from(json) {
            Value::Raw(target) => Ok(target),
            other => Err(ReactiveError::NotAContainer(other.type_name())),
        }
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn kind(&self) -> ContainerKind {
        self.inner.kind
    }

    /// Borrow the raw container. Reads through this borrow are not tracked.
    pub fn borrow(&self) -> Ref<'_, Container> {
        self.inner.data.borrow()
    }

    /// Mutably borrow the raw container. Writes through this borrow do not
    /// notify anyone.
    pub fn borrow_mut(&self) -> RefMut<'_, Container> {
        self.inner.data.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &Target) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .finish()
    }
}

/// A callable value, used for event handlers and emitted events.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&[Value]) -> Value>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        Self(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }

    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:#x})", self.addr())
    }
}

/// A dynamic value stored in, or read out of, a container.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    /// A raw, untracked container.
    Raw(Target),
    /// A reactive wrapper around a container.
    Proxy(Reactive),
    Func(Callback),
}

impl Value {
    /// Short type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Raw(_) => "raw container",
            Value::Proxy(_) => "reactive container",
            Value::Func(_) => "function",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64()
            .filter(|n| n.is_finite() && n.fract() == 0.0)
            .map(|n| n as i64)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The container behind this value, whether raw or wrapped.
    pub fn target(&self) -> Option<Target> {
        match self {
            Value::Raw(target) => Some(target.clone()),
            Value::Proxy(proxy) => Some(proxy.raw()),
            _ => None,
        }
    }

    /// Replace a reactive wrapper by its raw target; other values pass through.
    pub fn to_raw(self) -> Value {
        match self {
            Value::Proxy(proxy) => Value::Raw(proxy.raw()),
            other => other,
        }
    }

    /// Truthiness in the usual scripting sense.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Raw(_) | Value::Proxy(_) | Value::Func(_) => true,
        }
    }

    /// SameValueZero comparison.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Raw(a), Value::Raw(b)) => a.ptr_eq(b),
            (Value::Proxy(a), Value::Proxy(b)) => a == b,
            (Value::Func(a), Value::Func(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Export the value tree as JSON. Cycles, callbacks and `Undefined`
    /// export as `null`; map entries export as `[key, value]` pairs.
    pub fn to_json(&self) -> serde_json::Value {
        let mut visiting = HashSet::new();
        self.to_json_inner(&mut visiting)
    }

    fn to_json_inner(&self, visiting: &mut HashSet<TargetId>) -> serde_json::Value {
        use serde_json::Value as Json;

        let target = match self {
            Value::Undefined | Value::Null | Value::Func(_) => return Json::Null,
            Value::Bool(b) => return Json::Bool(*b),
            Value::Number(n) => {
                return serde_json::Number::from_f64(*n)
                    .map(Json::Number)
                    .unwrap_or(Json::Null)
            }
            Value::Str(s) => return Json::String(s.to_string()),
            Value::Raw(target) => target.clone(),
            Value::Proxy(proxy) => proxy.raw(),
        };

        if !visiting.insert(target.id()) {
            return Json::Null;
        }
        // Snapshot first so no borrow is held while recursing.
        let snapshot = target.borrow().clone();
        let json = match snapshot {
            Container::Object(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.to_string(), v.to_json_inner(visiting)))
                    .collect(),
            ),
            Container::Array(items) => {
                Json::Array(items.iter().map(|v| v.to_json_inner(visiting)).collect())
            }
            Container::Map(map) => Json::Array(
                map.iter()
                    .map(|(k, v)| {
                        Json::Array(vec![k.to_json_inner(visiting), v.to_json_inner(visiting)])
                    })
                    .collect(),
            ),
            Container::Set(set) => {
                Json::Array(set.iter().map(|v| v.to_json_inner(visiting)).collect())
            }
        };
        visiting.remove(&target.id());
        json
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value_zero(other)
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Undefined | Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => {
                let bits = if *n == 0.0 {
                    0.0f64.to_bits()
                } else if n.is_nan() {
                    f64::NAN.to_bits()
                } else {
                    n.to_bits()
                };
                bits.hash(state);
            }
            Value::Str(s) => s.hash(state),
            Value::Raw(target) => target.id().hash(state),
            Value::Proxy(proxy) => proxy.addr().hash(state),
            Value::Func(cb) => cb.addr().hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Raw(target) => write!(f, "Raw({target:?})"),
            Value::Proxy(proxy) => write!(f, "Proxy({proxy:?})"),
            Value::Func(cb) => write!(f, "Func({cb:?})"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::Str(s) => f.write_str(s),
            Value::Raw(target) => write!(f, "[{}]", target.kind()),
            Value::Proxy(proxy) => write!(f, "[{}]", proxy.kind()),
            Value::Func(_) => f.write_str("[function]"),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

value_from_int!(i32, i64, u32, u64, usize);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Raw(target)
    }
}

impl From<Reactive> for Value {
    fn from(proxy: Reactive) -> Self {
        Value::Proxy(proxy)
    }
}

impl From<&Reactive> for Value {
    fn from(proxy: &Reactive) -> Self {
        Value::Proxy(proxy.clone())
    }
}

impl From<Callback> for Value {
    fn from(cb: Callback) -> Self {
        Value::Func(cb)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            Json::String(s) => Value::from(s),
            Json::Array(items) => {
                Value::Raw(Target::array_from(items.into_iter().map(Value::from)))
            }
            Json::Object(map) => Value::Raw(Target::object_from(
                map.into_iter().map(|(k, v)| (k, Value::from(v))),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn target_ids_are_unique() {
        let a = TargetId::new();
        let b = TargetId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn same_value_zero_semantics() {
        assert_eq!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert_eq!(Value::from(0.0), Value::from(-0.0));
        assert_ne!(Value::from(1), Value::from("1"));

        let a = Target::object();
        let b = Target::object();
        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn values_key_sets_consistently() {
        let mut set = IndexSet::new();
        set.insert(Value::from(f64::NAN));
        set.insert(Value::from(f64::NAN));
        set.insert(Value::from(0.0));
        set.insert(Value::from(-0.0));
        set.insert(Value::from("x"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn json_import_export() {
        let target = Target::from_json(json!({ "b": 1.5, "a": [true, null, "s"] })).unwrap();
        assert_eq!(target.kind(), ContainerKind::Object);
        assert_eq!(target.borrow().len(), 2);
        let exported = Value::from(target).to_json();
        assert_eq!(exported, json!({ "a": [true, null, "s"], "b": 1.5 }));
    }

    #[test]
    fn scalar_json_is_not_a_container() {
        let err = Target::from_json(json!(3)).unwrap_err();
        assert_eq!(err, ReactiveError::NotAContainer("number"));
    }

    #[test]
    fn cyclic_export_terminates() {
        let target = Target::object();
        if let Container::Object(map) = &mut *target.borrow_mut() {
            map.insert(Rc::from("me"), Value::Raw(target.clone()));
        }
        let json = Value::Raw(target.clone()).to_json();
        assert_eq!(json, json!({ "me": null }));
        // Break the cycle so the target is freed.
        *target.borrow_mut() = Container::Object(IndexMap::new());
    }

    #[test]
    fn display_formats_integers_without_fraction() {
        assert_eq!(Value::from(3).to_string(), "3");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::Undefined.to_string(), "undefined");
    }
}
