//! Reactive Primitives
//!
//! This module implements the reactive state engine: tracked containers,
//! effects, computed values and watchers.
//!
//! # Concepts
//!
//! ## Reactive containers
//!
//! A [`Reactive`] wraps a plain container ([`Target`]): an object, array,
//! map or set. Reading a key inside an effect registers the effect as a
//! dependent of that key; writing the key re-runs the dependents. Nested
//! containers are wrapped lazily on read.
//!
//! ## Effects
//!
//! An [`Effect`] is a computation that re-runs whenever what it read last
//! time changes. Effects may carry a scheduler that decides when the re-run
//! happens; component renders and post-flush watchers use one to batch.
//!
//! ## Computed values and watchers
//!
//! A [`Computed`] caches a derived value and recomputes it lazily. A
//! [`watch`] calls back with old and new values when a source changes.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to detect
//! dependencies automatically. When a container is read, the runtime checks
//! for an active effect and, if there is one, records the dependency.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod array;
mod collections;
mod computed;
mod context;
pub(crate) mod effect;
mod proxy;
mod refs;
mod runtime;
pub(crate) mod value;
mod watch;

pub use computed::{computed, Computed};
pub use context::{untracked, PauseTracking, ReactiveContext};
pub use effect::{effect, effect_with, Effect, EffectId, EffectOptions, SchedulerFn};
pub use proxy::{
    is_reactive, is_readonly, reactive, readonly, shallow_reactive, shallow_readonly, to_raw,
    Flavor, Reactive,
};
pub use refs::{ref_value, to_ref, to_refs, Ref};
pub use runtime::Runtime;
pub use value::{Callback, Container, ContainerKind, Target, TargetId, Value};
pub use watch::{traverse, watch, Flush, OnInvalidate, WatchHandle, WatchOptions, WatchSource};
