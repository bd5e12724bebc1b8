//! Effect Implementation
//!
//! An Effect is a computation that re-runs whenever the reactive keys it
//! read last time change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies (unless it is lazy).
//!
//! 2. When any dependency changes, the effect is notified. Without a
//!    scheduler it re-runs synchronously; with one, the scheduler decides.
//!
//! 3. Before re-running, the effect drops its old dependencies and tracks
//!    new ones during execution, so only the branch actually taken keeps
//!    subscribing.
//!
//! # Re-entry
//!
//! An effect that is already running is never re-entered. A write that
//! would trigger the innermost running effect is ignored for that effect,
//! which is what makes `state.count += 1` inside an effect terminate.
//!
//! An effect further up the stack that is notified by a nested effect is
//! marked pending instead, and runs again as soon as its current run
//! returns.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;
use tracing::{trace, warn};

use super::context::ReactiveContext;
use super::runtime::Runtime;
use super::value::{TargetId, Value};
use crate::graph::Key;

/// Unique identifier for an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-runs allowed for one call to [`Effect::run`] before giving up.
pub const MAX_PENDING_RERUNS: usize = 100;

/// Called instead of a re-run when a dependency changes.
pub type SchedulerFn = Rc<dyn Fn(&Effect)>;

/// Options for [`effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Skip the initial run.
    pub lazy: bool,
    /// Invoked on notification instead of re-running.
    pub scheduler: Option<SchedulerFn>,
}

impl EffectOptions {
    pub fn lazy() -> Self {
        Self {
            lazy: true,
            scheduler: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: impl Fn(&Effect) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}

type Body = Box<dyn FnMut() -> Value>;

struct EffectInner {
    id: EffectId,
    body: RefCell<Body>,
    /// Edges recorded during the last run.
    deps: RefCell<SmallVec<[(TargetId, Key); 4]>>,
    scheduler: RefCell<Option<SchedulerFn>>,
    disposed: Cell<bool>,
    running: Cell<bool>,
    /// Notified while running; re-run once the current run returns.
    pending: Cell<bool>,
    run_count: Cell<usize>,
}

/// A handle to a reactive computation.
///
/// Cloning the handle shares the effect.
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

/// Create an effect and run it once.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(Target::object_from([("count", 0)]));
///
/// let _e = effect({
///     let state = state.clone();
///     move || println!("count is {}", state.get("count"))
/// });
///
/// state.set("count", 5);  // Prints: "count is 5"
/// ```
pub fn effect<F, R>(f: F) -> Effect
where
    F: FnMut() -> R + 'static,
    R: Into<Value>,
{
    effect_with(f, EffectOptions::default())
}

/// Create an effect with options.
pub fn effect_with<F, R>(mut f: F, options: EffectOptions) -> Effect
where
    F: FnMut() -> R + 'static,
    R: Into<Value>,
{
    let effect = Effect {
        inner: Rc::new(EffectInner {
            id: EffectId::new(),
            body: RefCell::new(Box::new(move || f().into())),
            deps: RefCell::new(SmallVec::new()),
            scheduler: RefCell::new(options.scheduler),
            disposed: Cell::new(false),
            running: Cell::new(false),
            pending: Cell::new(false),
            run_count: Cell::new(0),
        }),
    };

    if !options.lazy {
        effect.run();
    }
    effect
}

struct RunningGuard<'a>(&'a Cell<bool>);

impl<'a> RunningGuard<'a> {
    fn new(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Effect {
    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// Run the effect body, re-collecting dependencies, and return its value.
    ///
    /// Returns `Undefined` if the effect is disposed or already running.
    pub fn run(&self) -> Value {
        if self.inner.disposed.get() {
            return Value::Undefined;
        }
        if self.inner.running.get() {
            trace!(effect = self.inner.id.raw(), "skipping re-entrant run");
            return Value::Undefined;
        }

        let mut result = self.run_once();
        let mut reruns = 0;
        while self.inner.pending.replace(false) && !self.inner.disposed.get() {
            if reruns == MAX_PENDING_RERUNS {
                warn!(
                    effect = self.inner.id.raw(),
                    "effect kept invalidating itself; dropping further re-runs"
                );
                break;
            }
            reruns += 1;
            result = self.run_once();
        }
        result
    }

    fn run_once(&self) -> Value {
        Runtime::cleanup(self);

        let _running = RunningGuard::new(&self.inner.running);
        let _ctx = ReactiveContext::enter(self);
        self.inner.run_count.set(self.inner.run_count.get() + 1);

        let mut body = self.inner.body.borrow_mut();
        (body)()
    }

    /// React to a dependency change.
    pub fn notify(&self) {
        if self.inner.disposed.get() {
            return;
        }
        let scheduler = self.inner.scheduler.borrow().clone();
        match scheduler {
            Some(scheduler) => scheduler(self),
            None if self.inner.running.get() => {
                trace!(effect = self.inner.id.raw(), "notified while running");
                self.inner.pending.set(true);
            }
            None => {
                self.run();
            }
        }
    }

    /// Stop the effect. It drops its dependencies and never runs again.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        Runtime::cleanup(self);
        let scheduler = self.inner.scheduler.borrow_mut().take();
        drop(scheduler);
        // The body may be on the stack if the effect disposes itself.
        if let Ok(mut body) = self.inner.body.try_borrow_mut() {
            *body = Box::new(|| Value::Undefined);
        }
        trace!(effect = self.inner.id.raw(), "disposed");
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Check if the effect body is on the stack.
    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of dependencies.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    pub(crate) fn record_dep(&self, target: TargetId, key: Key) {
        self.inner.deps.borrow_mut().push((target, key));
    }

    pub(crate) fn take_deps(&self) -> SmallVec<[(TargetId, Key); 4]> {
        std::mem::take(&mut *self.inner.deps.borrow_mut())
    }

    pub fn ptr_eq(&self, other: &Effect) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{reactive, Target};

    fn counter() -> Rc<Cell<i32>> {
        Rc::new(Cell::new(0))
    }

    #[test]
    fn effect_runs_on_creation() {
        let runs = counter();
        let r = runs.clone();
        let e = effect(move || r.set(r.get() + 1));

        assert_eq!(runs.get(), 1);
        assert_eq!(e.run_count(), 1);
    }

    #[test]
    fn lazy_effect_waits_for_run() {
        let runs = counter();
        let r = runs.clone();
        let e = effect_with(
            move || {
                r.set(r.get() + 1);
                42
            },
            EffectOptions::lazy(),
        );

        assert_eq!(runs.get(), 0);
        assert_eq!(e.run(), Value::from(42));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let state = reactive(Target::object_from([("count", 0)]));
        let seen = counter();

        let s = state.clone();
        let out = seen.clone();
        let _e = effect(move || {
            out.set(s.get("count").as_i64().unwrap_or_default() as i32);
        });

        state.set("count", 7);
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn scheduler_replaces_rerun() {
        let state = reactive(Target::object_from([("count", 0)]));
        let runs = counter();
        let scheduled = counter();

        let s = state.clone();
        let r = runs.clone();
        let sc = scheduled.clone();
        let _e = effect_with(
            move || {
                r.set(r.get() + 1);
                s.get("count")
            },
            EffectOptions::default().with_scheduler(move |_| sc.set(sc.get() + 1)),
        );

        state.set("count", 1);
        state.set("count", 2);
        assert_eq!(runs.get(), 1);
        assert_eq!(scheduled.get(), 2);
    }

    #[test]
    fn disposed_effect_stops_running() {
        let state = reactive(Target::object_from([("count", 0)]));
        let runs = counter();

        let s = state.clone();
        let r = runs.clone();
        let e = effect(move || {
            r.set(r.get() + 1);
            s.get("count")
        });

        e.dispose();
        assert!(e.is_disposed());
        assert_eq!(e.dependency_count(), 0);

        state.set("count", 1);
        assert_eq!(runs.get(), 1);
        assert_eq!(e.run(), Value::Undefined);
    }

    #[test]
    fn self_increment_terminates() {
        let state = reactive(Target::object_from([("count", 0)]));
        let s = state.clone();
        let e = effect(move || {
            let next = s.get("count").as_f64().unwrap_or_default() + 1.0;
            s.set("count", next);
        });

        assert_eq!(e.run_count(), 1);
        assert_eq!(state.get("count"), Value::from(1));
    }

    #[test]
    fn outer_effect_reruns_after_nested_write() {
        let state = reactive(Target::object_from([("x", 0), ("y", 0)]));
        let seen = counter();
        let inner = Rc::new(RefCell::new(None));

        let s = state.clone();
        let out = seen.clone();
        let slot = inner.clone();
        let outer = effect(move || {
            out.set(s.get("x").as_i64().unwrap_or_default() as i32);
            if slot.borrow().is_none() {
                let s2 = s.clone();
                let e = effect(move || {
                    let y = s2.get("y").as_i64().unwrap_or_default();
                    s2.set("x", y);
                });
                *slot.borrow_mut() = Some(e);
            }
            s.set("y", 1);
        });

        assert_eq!(state.get("x"), Value::from(1));
        assert_eq!(seen.get(), 1);
        assert_eq!(outer.run_count(), 2);
    }
}
