//! Reactive Context
//!
//! The reactive context tracks which effect is currently running. This
//! enables automatic dependency tracking: when a reactive container is read,
//! the runtime registers the current effect as a dependent of the key read.
//!
//! # Implementation
//!
//! A thread-local stack holds the running effects. Entering an effect pushes
//! it; the returned guard pops it on drop, so nested effects restore their
//! parent as the active subscriber when they finish.
//!
//! Tracking can also be suspended without leaving the effect, via
//! [`PauseTracking`] or [`untracked`]. Array mutators use this so that the
//! reads they perform internally do not subscribe the caller.

use std::cell::{Cell, RefCell};

use super::effect::{Effect, EffectId};

thread_local! {
    static EFFECT_STACK: RefCell<Vec<Effect>> = const { RefCell::new(Vec::new()) };
    static SHOULD_TRACK: Cell<bool> = const { Cell::new(true) };
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the effect body panics.
pub struct ReactiveContext {
    effect_id: EffectId,
    tracking_before: bool,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given effect.
    ///
    /// While the guard lives, reads register `effect` as a dependent.
    /// Tracking is re-enabled inside the effect even if the caller had
    /// paused it.
    pub fn enter(effect: &Effect) -> Self {
        EFFECT_STACK.with(|stack| stack.borrow_mut().push(effect.clone()));
        let tracking_before = SHOULD_TRACK.with(|t| t.replace(true));
        Self {
            effect_id: effect.id(),
            tracking_before,
        }
    }

    /// Check if an effect is currently running.
    pub fn is_active() -> bool {
        EFFECT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Check if reads should currently be tracked.
    pub fn is_tracking() -> bool {
        SHOULD_TRACK.with(Cell::get) && Self::is_active()
    }

    /// The ID of the running effect, if any.
    pub fn current_subscriber() -> Option<EffectId> {
        EFFECT_STACK.with(|stack| stack.borrow().last().map(Effect::id))
    }

    /// The running effect, if any.
    pub fn current_effect() -> Option<Effect> {
        EFFECT_STACK.with(|stack| stack.borrow().last().cloned())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = EFFECT_STACK.with(|stack| stack.borrow_mut().pop());
        SHOULD_TRACK.with(|t| t.set(self.tracking_before));

        if let Some(effect) = popped {
            debug_assert_eq!(
                effect.id(),
                self.effect_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.effect_id,
                effect.id()
            );
        }
    }
}

/// Guard that suspends dependency tracking until dropped.
pub struct PauseTracking {
    tracking_before: bool,
}

impl PauseTracking {
    pub fn new() -> Self {
        let tracking_before = SHOULD_TRACK.with(|t| t.replace(false));
        Self { tracking_before }
    }
}

impl Default for PauseTracking {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PauseTracking {
    fn drop(&mut self) {
        SHOULD_TRACK.with(|t| t.set(self.tracking_before));
    }
}

/// Run `f` without recording any dependencies.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _pause = PauseTracking::new();
    f()
}
