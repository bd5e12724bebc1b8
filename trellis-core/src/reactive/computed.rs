//! Computed Values
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computed Values Work
//!
//! 1. The getter is wrapped in a lazy effect. Nothing runs at creation.
//!
//! 2. On first access the effect runs, caches the result and clears the
//!    dirty flag.
//!
//! 3. When a dependency changes, the effect's scheduler only sets the dirty
//!    flag and notifies whoever read this computed. It does not recompute.
//!
//! 4. The next access sees the flag and recomputes.
//!
//! # Why This Matters
//!
//! A computed that is never read again after its inputs change costs
//! nothing. Effects that depend on a computed are notified once per
//! clean-to-dirty transition, however many inputs changed in between.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::effect::{effect_with, Effect, EffectOptions};
use super::runtime::Runtime;
use super::value::{TargetId, Value};
use crate::graph::{Key, TriggerOp};

struct ComputedInner<T> {
    /// Identity under which readers of this computed are tracked.
    id: TargetId,
    effect: Effect,
    cache: Rc<RefCell<Option<T>>>,
    dirty: Rc<Cell<bool>>,
    getter: Rc<dyn Fn() -> T>,
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.effect.dispose();
        Runtime::forget_target(self.id);
    }
}

/// A lazily recomputed, cached derived value.
///
/// Cloning shares the cache. Dropping the last handle disposes the inner
/// effect.
pub struct Computed<T: Clone + 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: Clone + 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Create a computed value from a getter.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(Target::object_from([("n", 2)]));
/// let doubled = computed({
///     let state = state.clone();
///     move || state.get("n").as_f64().unwrap_or_default() * 2.0
/// });
///
/// assert_eq!(doubled.get(), 4.0);
/// ```
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
{
    Computed::new(getter)
}

impl<T: Clone + 'static> Computed<T> {
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let id = TargetId::new();
        let getter: Rc<dyn Fn() -> T> = Rc::new(getter);
        let cache: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
        let dirty = Rc::new(Cell::new(true));

        let body = {
            let getter = Rc::clone(&getter);
            let cache = Rc::clone(&cache);
            move || {
                let value = getter();
                *cache.borrow_mut() = Some(value);
            }
        };

        let options = EffectOptions::lazy().with_scheduler({
            let dirty = Rc::clone(&dirty);
            move |_| {
                if !dirty.replace(true) {
                    Runtime::trigger(id, None, Key::Computed, TriggerOp::Set, None);
                }
            }
        });

        Self {
            inner: Rc::new(ComputedInner {
                id,
                effect: effect_with(body, options),
                cache,
                dirty,
                getter,
            }),
        }
    }

    /// Read the value, recomputing first if a dependency changed.
    ///
    /// Inside an effect, the read subscribes that effect to this computed.
    pub fn get(&self) -> T {
        let inner = &self.inner;
        if inner.dirty.get() && !inner.effect.is_disposed() {
            inner.effect.run();
            inner.dirty.set(false);
        }
        Runtime::track(inner.id, Key::Computed);

        let cached = inner.cache.borrow().clone();
        // Only empty if the getter re-entered itself or this was disposed
        // before the first read.
        cached.unwrap_or_else(|| (inner.getter)())
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Stop tracking dependencies. The last cached value is kept.
    pub fn dispose(&self) {
        self.inner.effect.dispose();
    }

    pub fn effect(&self) -> &Effect {
        &self.inner.effect
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("dirty", &self.is_dirty())
            .field("cached", &self.inner.cache.borrow())
            .finish()
    }
}

impl From<Computed<Value>> for Value {
    fn from(c: Computed<Value>) -> Self {
        c.get()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
