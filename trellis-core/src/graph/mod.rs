//! Dependency Graph
//!
//! This module holds the bookkeeping behind reactivity: which effects depend
//! on which keys of which targets, and the queue that batches deferred work.
//!
//! # Overview
//!
//! The graph maps `target -> key -> ordered set of effects`:
//!
//! - A target is any trackable source (a raw container, or a computed value)
//! - A key is a real property key or a synthetic iteration key
//!
//! The graph knows nothing about effect bodies. It only answers "which
//! effects does this write affect", classified by the kind of write.
//!
//! # Design Decisions
//!
//! 1. Edges are stored in one place, indexed by target ID, rather than in
//!    each container. A freed target drops its edges with one removal.
//!
//! 2. Each effect also remembers the edges it recorded, so the edges can be
//!    removed before the effect re-runs.
//!
//! 3. Effect sets are insertion-ordered so notification order is
//!    deterministic.

mod deps;
mod scheduler;

pub use deps::{DepGraph, Key, TriggerOp};
pub use scheduler::{
    clear_flush_requester, flush_jobs, has_pending_jobs, next_tick, queue_job,
    set_flush_requester, Job, JobId, UpdateScheduler, MAX_FLUSH_ROUNDS,
};
