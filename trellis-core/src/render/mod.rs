//! Virtual Tree Renderer
//!
//! Turns vnode trees into host trees and keeps them in sync.
//!
//! # Layers
//!
//! - [`VNode`]: the description produced by render functions
//! - [`Renderer`]: mounting, patching and unmounting
//! - `diff`: the keyed children algorithm with minimal moves
//! - [`Platform`]: the host operations the renderer is allowed to perform
//! - [`MemoryHost`]: a headless platform used by tests and benchmarks
//!
//! Components plug into the reactive core: each instance renders inside an
//! effect, and state changes queue one re-render per instance per flush.

mod component;
mod diff;
mod keep_alive;
mod lis;
mod memory;
mod platform;
mod renderer;
mod vnode;

pub use component::{
    current_instance, has_props_changed, on_mounted, on_unmounted, resolve_props, Component,
    ComponentInstance, Hook, RenderContext, RenderFn, SetupContext, SetupFn,
};
pub use keep_alive::{keep_alive, KeepAliveCtx, KeepAliveMark, KeepAliveOptions};
pub use lis::longest_increasing_subsequence;
pub use memory::{HostOp, MemoryHost};
pub use platform::{HostNode, Platform};
pub use renderer::Renderer;
pub use vnode::{Children, Props, SlotFn, Slots, VKey, VNode, VNodeType};
