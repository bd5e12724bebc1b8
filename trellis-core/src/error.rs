//! Error types.
//!
//! Only structural failures surface as errors. Reactive read/write edge cases
//! (writes through a read-only wrapper, lifecycle registration outside a
//! component, accessors used on the wrong container kind) are reported as
//! `tracing` diagnostics and treated as no-ops.

use thiserror::Error;

use crate::render::VKey;

/// Errors raised while building reactive containers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// The value is a scalar and cannot back a reactive wrapper.
    #[error("cannot make a {0} reactive; expected an object, array, map or set")]
    NotAContainer(&'static str),
}

/// Errors raised by the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// Two sibling vnodes share a key in the same children list.
    #[error("duplicate key `{key}` among sibling vnodes")]
    DuplicateKey { key: VKey },

    /// A teleport vnode was rendered without a target node.
    #[error("teleport vnode has no target node")]
    MissingTeleportTarget,
}
