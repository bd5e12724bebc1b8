//! Watchers
//!
//! A watcher observes a source and calls back with `(old, new)` whenever the
//! source changes.
//!
//! # How Watchers Work
//!
//! 1. The source becomes a getter: either the caller's function, or a deep
//!    traversal of a reactive root that reads every nested key (cycle-safe).
//!
//! 2. The getter runs inside a lazy effect. Its scheduler runs the "job":
//!    re-evaluate the getter, fire the invalidation hook registered by the
//!    previous callback, call the callback, then roll new into old.
//!
//! 3. With [`Flush::Sync`] the job runs on every trigger. With
//!    [`Flush::Post`] it is queued on the scheduler, so a burst of writes
//!    before the flush yields one callback with the oldest old value and
//!    the newest new value.
//!
//! A sync callback that writes to its own source does not re-enter itself:
//! the nested change is delivered as a follow-up callback once the current
//! one returns.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use super::computed::Computed;
use super::effect::{effect_with, Effect, EffectOptions, MAX_PENDING_RERUNS};
use super::proxy::Reactive;
use super::refs::Ref;
use super::value::{TargetId, Value};
use crate::graph::{queue_job, JobId};

/// When a watch callback runs relative to the triggering write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flush {
    /// Run during the write that changed the source.
    #[default]
    Sync,
    /// Run at the next scheduler flush.
    Post,
}

/// Options for [`watch`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    /// Run the callback once right away, with `Undefined` as the old value.
    pub immediate: bool,
    pub flush: Flush,
}

impl WatchOptions {
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn flush(mut self, flush: Flush) -> Self {
        self.flush = flush;
        self
    }
}

/// What a watcher observes.
#[derive(Clone)]
pub enum WatchSource {
    /// A getter; its return value is what the callback receives.
    Getter(Rc<dyn Fn() -> Value>),
    /// A reactive root, observed deeply.
    Deep(Reactive),
}

impl WatchSource {
    pub fn getter(f: impl Fn() -> Value + 'static) -> Self {
        WatchSource::Getter(Rc::new(f))
    }

    fn into_getter(self) -> Rc<dyn Fn() -> Value> {
        match self {
            WatchSource::Getter(getter) => getter,
            WatchSource::Deep(root) => Rc::new(move || {
                let value = Value::Proxy(root.clone());
                traverse(&value, &mut HashSet::new());
                value
            }),
        }
    }
}

impl fmt::Debug for WatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchSource::Getter(_) => f.write_str("WatchSource::Getter"),
            WatchSource::Deep(root) => f.debug_tuple("WatchSource::Deep").field(root).finish(),
        }
    }
}

impl From<Reactive> for WatchSource {
    fn from(root: Reactive) -> Self {
        WatchSource::Deep(root)
    }
}

impl From<&Reactive> for WatchSource {
    fn from(root: &Reactive) -> Self {
        WatchSource::Deep(root.clone())
    }
}

impl From<Ref> for WatchSource {
    fn from(r: Ref) -> Self {
        WatchSource::getter(move || r.value())
    }
}

impl From<Computed<Value>> for WatchSource {
    fn from(c: Computed<Value>) -> Self {
        WatchSource::getter(move || c.get())
    }
}

type Hook = Box<dyn FnOnce()>;

/// Passed to a watch callback to register cleanup for stale async work.
///
/// The registered hook runs once, just before the next callback.
#[derive(Clone, Default)]
pub struct OnInvalidate {
    slot: Rc<RefCell<Option<Hook>>>,
}

impl OnInvalidate {
    /// Register the hook, replacing any hook not yet fired.
    pub fn register(&self, hook: impl FnOnce() + 'static) {
        *self.slot.borrow_mut() = Some(Box::new(hook));
    }

    fn fire(&self) {
        let hook = self.slot.borrow_mut().take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

type Callback = Box<dyn FnMut(&Value, &Value, &OnInvalidate)>;

struct WatchState {
    effect: RefCell<Option<Effect>>,
    callback: RefCell<Callback>,
    old: RefCell<Value>,
    on_invalidate: OnInvalidate,
    job_id: JobId,
    stopped: Cell<bool>,
    /// Triggered while the callback was running.
    pending: Cell<bool>,
}

impl WatchState {
    fn run_job(&self) {
        if self.stopped.get() {
            return;
        }
        let Ok(mut callback) = self.callback.try_borrow_mut() else {
            trace!(job = self.job_id.raw(), "watch callback running; deferring change");
            self.pending.set(true);
            return;
        };

        let mut rounds = 0;
        loop {
            let Some(effect) = self.effect.borrow().clone() else {
                return;
            };
            let new = effect.run();
            self.on_invalidate.fire();
            let old = self.old.borrow().clone();
            callback(&old, &new, &self.on_invalidate);
            *self.old.borrow_mut() = new;

            if !self.pending.replace(false) || self.stopped.get() {
                return;
            }
            rounds += 1;
            if rounds == MAX_PENDING_RERUNS {
                warn!(job = self.job_id.raw(), "watch callback kept changing its source");
                return;
            }
        }
    }
}

/// Handle returned by [`watch`].
pub struct WatchHandle {
    state: Rc<WatchState>,
}

impl WatchHandle {
    /// Stop watching. Pending post-flush runs become no-ops.
    pub fn stop(&self) {
        if self.state.stopped.replace(true) {
            return;
        }
        if let Some(effect) = self.state.effect.borrow_mut().take() {
            effect.dispose();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stopped.get()
    }
}

/// Watch a source and call `callback(old, new, on_invalidate)` when it
/// changes.
///
/// The watcher keeps running after the handle is dropped; call
/// [`WatchHandle::stop`] to end it.
pub fn watch<S, F>(source: S, callback: F, options: WatchOptions) -> WatchHandle
where
    S: Into<WatchSource>,
    F: FnMut(&Value, &Value, &OnInvalidate) + 'static,
{
    let getter = source.into().into_getter();
    let state = Rc::new(WatchState {
        effect: RefCell::new(None),
        callback: RefCell::new(Box::new(callback)),
        old: RefCell::new(Value::Undefined),
        on_invalidate: OnInvalidate::default(),
        job_id: JobId::new(),
        stopped: Cell::new(false),
        pending: Cell::new(false),
    });

    let scheduler = {
        let state = Rc::clone(&state);
        move |_: &Effect| match options.flush {
            Flush::Sync => state.run_job(),
            Flush::Post => {
                let state = Rc::clone(&state);
                queue_job(state.job_id, Rc::new(move || state.run_job()));
            }
        }
    };
    let effect = effect_with(
        move || getter(),
        EffectOptions::lazy().with_scheduler(scheduler),
    );
    *state.effect.borrow_mut() = Some(effect.clone());

    if options.immediate {
        state.run_job();
    } else {
        *state.old.borrow_mut() = effect.run();
    }
    WatchHandle { state }
}

/// Read every key reachable from `value`, so the running effect subscribes
/// to the whole tree.
pub fn traverse(value: &Value, seen: &mut HashSet<TargetId>) {
    let Value::Proxy(proxy) = value else {
        return;
    };
    if !seen.insert(proxy.target_id()) {
        return;
    }
    for (key, item) in proxy.entries() {
        traverse(&key, seen);
        traverse(&item, seen);
    }
}
