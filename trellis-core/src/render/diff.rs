//! Keyed Children Diff
//!
//! # How the Diff Works
//!
//! Given the old and new children of one parent:
//!
//! 1. Patch the common prefix of same vnodes, then the common suffix.
//! 2. If only new nodes remain, mount them before the first node of the
//!    suffix. If only old nodes remain, unmount them.
//! 3. Otherwise map each remaining old node to its new position (by key, or
//!    by type for unkeyed nodes), patch or unmount it, and record a source
//!    map `new position -> old position`.
//! 4. Walk the new middle section from the back. Unmatched positions are
//!    mounted. Matched nodes that are not on the longest increasing
//!    subsequence of the source map are moved.
//!
//! Step 4 keeps the number of host moves minimal: nodes on the subsequence
//! are already in relative order.

use std::collections::HashMap;

use smallvec::SmallVec;
use tracing::trace;

use super::lis::longest_increasing_subsequence;
use super::platform::HostNode;
use super::renderer::RendererCore;
use super::vnode::{VKey, VNode};
use crate::error::RenderError;

impl RendererCore {
    pub(crate) fn patch_keyed_children(
        &self,
        old: &[VNode],
        new: &[VNode],
        container: HostNode,
        parent_anchor: Option<HostNode>,
    ) -> Result<(), RenderError> {
        let mut start = 0;
        let mut old_end = old.len();
        let mut new_end = new.len();

        while start < old_end && start < new_end && old[start].same_vnode(&new[start]) {
            self.patch(Some(&old[start]), &new[start], container, None)?;
            start += 1;
        }

        while start < old_end && start < new_end && old[old_end - 1].same_vnode(&new[new_end - 1]) {
            self.patch(Some(&old[old_end - 1]), &new[new_end - 1], container, None)?;
            old_end -= 1;
            new_end -= 1;
        }

        if start >= old_end {
            let anchor = self.anchor_after(new, new_end, parent_anchor);
            for node in &new[start..new_end] {
                self.patch(None, node, container, anchor)?;
            }
            return Ok(());
        }

        if start >= new_end {
            for node in &old[start..old_end] {
                self.unmount(node, true);
            }
            return Ok(());
        }

        self.patch_unknown_sequence(old, new, start, old_end, new_end, container, parent_anchor)
    }

    #[allow(clippy::too_many_arguments)]
    fn patch_unknown_sequence(
        &self,
        old: &[VNode],
        new: &[VNode],
        start: usize,
        old_end: usize,
        new_end: usize,
        container: HostNode,
        parent_anchor: Option<HostNode>,
    ) -> Result<(), RenderError> {
        let count = new_end - start;

        let mut key_to_new: HashMap<&VKey, usize> = HashMap::new();
        let mut unkeyed_new: SmallVec<[usize; 8]> = SmallVec::new();
        for (i, node) in new.iter().enumerate().take(new_end).skip(start) {
            match &node.key {
                Some(key) => {
                    key_to_new.insert(key, i);
                }
                None => unkeyed_new.push(i),
            }
        }

        let mut source: Vec<Option<usize>> = vec![None; count];
        let mut patched = 0;
        let mut moved = false;
        let mut max_new_so_far = 0;

        for (i, old_node) in old.iter().enumerate().take(old_end).skip(start) {
            if patched >= count {
                self.unmount(old_node, true);
                continue;
            }

            let candidate = match &old_node.key {
                Some(key) => key_to_new.get(key).copied(),
                None => unkeyed_new
                    .iter()
                    .copied()
                    .find(|&j| source[j - start].is_none() && old_node.same_vnode(&new[j])),
            };

            match candidate {
                Some(j) if source[j - start].is_none() && old_node.same_vnode(&new[j]) => {
                    source[j - start] = Some(i);
                    if j < max_new_so_far {
                        moved = true;
                    } else {
                        max_new_so_far = j;
                    }
                    self.patch(Some(old_node), &new[j], container, None)?;
                    patched += 1;
                }
                _ => self.unmount(old_node, true),
            }
        }

        let stable = if moved {
            longest_increasing_subsequence(&source)
        } else {
            SmallVec::new()
        };
        trace!(count, patched, moved, stable = stable.len(), "keyed diff");

        let mut next_stable = stable.len();
        for i in (0..count).rev() {
            let index = start + i;
            let anchor = self.anchor_after(new, index + 1, parent_anchor);
            match source[i] {
                None => self.patch(None, &new[index], container, anchor)?,
                Some(_) if moved => {
                    if next_stable > 0 && stable[next_stable - 1] == i {
                        next_stable -= 1;
                    } else {
                        self.move_vnode(&new[index], container, anchor);
                    }
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Host node to insert before when placing `new[..index]`.
    fn anchor_after(
        &self,
        new: &[VNode],
        index: usize,
        parent_anchor: Option<HostNode>,
    ) -> Option<HostNode> {
        new.get(index)
            .and_then(|node| self.first_host_node(node))
            .or(parent_anchor)
    }
}
