//! Platform Adapter
//!
//! The renderer never touches a host tree directly. Every host mutation goes
//! through a [`Platform`], so the diff engine and the reactive core stay
//! host-agnostic.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::reactive::Value;

/// Opaque handle to a node in the host tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostNode(pub(crate) u64);

impl HostNode {
    /// Generate a new unique node handle.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw handle value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for HostNode {
    fn default() -> Self {
        Self::new()
    }
}

/// Host tree operations supplied by the embedder.
pub trait Platform {
    fn create_element(&self, tag: &str) -> HostNode;

    fn create_text(&self, text: &str) -> HostNode;

    fn create_comment(&self, text: &str) -> HostNode;

    /// Replace all children of `el` with a single text content.
    fn set_element_text(&self, el: HostNode, text: &str);

    fn set_text(&self, node: HostNode, text: &str);

    fn set_comment(&self, node: HostNode, text: &str);

    /// Insert `node` into `parent` before `anchor`, or at the end when there
    /// is no anchor. A node that already has a parent is moved.
    fn insert(&self, node: HostNode, parent: HostNode, anchor: Option<HostNode>);

    /// Detach `node` from its parent.
    fn remove(&self, node: HostNode);

    /// Apply one property difference. `next` is `Undefined` when the
    /// property was removed. Keys starting with `on` carry event listeners.
    fn patch_prop(&self, el: HostNode, key: &str, prev: &Value, next: &Value);

    fn next_sibling(&self, node: HostNode) -> Option<HostNode>;

    fn parent_node(&self, node: HostNode) -> Option<HostNode>;
}
