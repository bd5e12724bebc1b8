//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis UI engine.
//! It implements:
//!
//! - Reactive state (tracked containers, effects, computed values, watchers)
//! - A batching job scheduler
//! - Virtual tree rendering with a keyed, move-minimal children diff
//! - Components with props, slots, lifecycle hooks and instance caching
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Reactive wrappers, effects and dependency tracking
//! - `graph`: The dependency graph and the job scheduler
//! - `render`: Virtual nodes, the renderer and the platform adapter
//! - `error`: Error types
//!
//! Everything is single-threaded: reactive state lives in `Rc`s and the
//! tracking context is thread-local.
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::reactive::{computed, effect, reactive, Target};
//!
//! let state = reactive(Target::object_from([("count", 0)]));
//!
//! // A derived value
//! let doubled = computed({
//!     let state = state.clone();
//!     move || state.get("count").as_f64().unwrap_or(0.0) * 2.0
//! });
//!
//! // An effect
//! let _e = effect(move || {
//!     println!("Doubled: {}", doubled.get());
//! });
//!
//! // Update the state
//! state.set("count", 5);
//! // Effect automatically runs, prints: "Doubled: 10"
//! ```

pub mod error;
pub mod graph;
pub mod reactive;
pub mod render;

pub use error::{ReactiveError, RenderError};
pub use graph::{flush_jobs, next_tick, queue_job};
pub use reactive::{computed, effect, reactive, readonly, watch, Reactive, Target, Value};
pub use render::{Component, HostNode, MemoryHost, Platform, Renderer, VNode};
