//! In-Memory Host
//!
//! A headless [`Platform`] that keeps the host tree in a map and records
//! every operation it receives. Tests and benchmarks render into it and then
//! inspect the tree (`inner_html`, `children`, `attribute`) or the operation
//! log (`take_ops`).
//!
//! Removed nodes are dropped together with their descendants, so a
//! long-lived host only holds what is attached or still unattached since
//! creation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::platform::{HostNode, Platform};
use crate::reactive::{Callback, Value};

/// One recorded host operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostOp {
    CreateElement { node: HostNode, tag: String },
    CreateText { node: HostNode, text: String },
    CreateComment { node: HostNode, text: String },
    SetElementText { node: HostNode, text: String },
    SetText { node: HostNode, text: String },
    SetComment { node: HostNode, text: String },
    Insert {
        node: HostNode,
        parent: HostNode,
        anchor: Option<HostNode>,
    },
    Remove { node: HostNode },
    PatchProp {
        node: HostNode,
        key: String,
        value: serde_json::Value,
    },
}

impl HostOp {
    /// Whether the operation changes tree structure (create, insert, remove).
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            HostOp::CreateElement { .. }
                | HostOp::CreateText { .. }
                | HostOp::CreateComment { .. }
                | HostOp::Insert { .. }
                | HostOp::Remove { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Element(String),
    Text,
    Comment,
}

#[derive(Debug)]
struct NodeRecord {
    kind: NodeKind,
    text: String,
    attrs: IndexMap<String, Value>,
    listeners: IndexMap<String, Callback>,
    children: Vec<HostNode>,
    parent: Option<HostNode>,
}

impl NodeRecord {
    fn new(kind: NodeKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
            attrs: IndexMap::new(),
            listeners: IndexMap::new(),
            children: Vec::new(),
            parent: None,
        }
    }
}

#[derive(Default)]
struct Tree {
    nodes: HashMap<HostNode, NodeRecord>,
    ops: Vec<HostOp>,
}

impl Tree {
    fn create(&mut self, kind: NodeKind, text: &str) -> HostNode {
        let node = HostNode::new();
        self.nodes.insert(node, NodeRecord::new(kind, text));
        node
    }

    fn detach(&mut self, node: HostNode) {
        let parent = self.nodes.get_mut(&node).and_then(|n| n.parent.take());
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != node);
        }
    }

    /// Forget `node` and everything below it.
    fn purge(&mut self, node: HostNode) {
        let mut stack = vec![node];
        while let Some(next) = stack.pop() {
            if let Some(record) = self.nodes.remove(&next) {
                stack.extend(record.children);
            }
        }
    }
}

/// Headless host tree with an operation log.
#[derive(Default)]
pub struct MemoryHost {
    tree: RefCell<Tree>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached container element. Not recorded in the op log.
    pub fn create_root(&self) -> HostNode {
        self.tree
            .borrow_mut()
            .create(NodeKind::Element("root".to_string()), "")
    }

    /// Copy of the operation log.
    pub fn ops(&self) -> Vec<HostOp> {
        self.tree.borrow().ops.clone()
    }

    /// Drain the operation log.
    pub fn take_ops(&self) -> Vec<HostOp> {
        std::mem::take(&mut self.tree.borrow_mut().ops)
    }

    pub fn children(&self, node: HostNode) -> Vec<HostNode> {
        self.tree
            .borrow()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Number of live node records, roots included.
    pub fn node_count(&self) -> usize {
        self.tree.borrow().nodes.len()
    }

    pub fn parent(&self, node: HostNode) -> Option<HostNode> {
        self.tree.borrow().nodes.get(&node).and_then(|n| n.parent)
    }

    /// Tag name of an element node.
    pub fn tag(&self, node: HostNode) -> Option<String> {
        match &self.tree.borrow().nodes.get(&node)?.kind {
            NodeKind::Element(tag) => Some(tag.clone()),
            _ => None,
        }
    }

    pub fn attribute(&self, node: HostNode, key: &str) -> Option<Value> {
        self.tree.borrow().nodes.get(&node)?.attrs.get(key).cloned()
    }

    /// Concatenated text of a node and its descendants.
    pub fn text_content(&self, node: HostNode) -> String {
        let tree = self.tree.borrow();
        let mut out = String::new();
        collect_text(&tree, node, &mut out);
        out
    }

    /// Markup of a node's children.
    pub fn inner_html(&self, node: HostNode) -> String {
        let tree = self.tree.borrow();
        let mut out = String::new();
        if let Some(record) = tree.nodes.get(&node) {
            out.push_str(&record.text);
            for child in &record.children {
                write_html(&tree, *child, &mut out);
            }
        }
        out
    }

    /// Invoke the listener registered for `event` on `node`. Returns whether
    /// a listener was found.
    pub fn dispatch(&self, node: HostNode, event: &str, args: &[Value]) -> bool {
        let listener = self
            .tree
            .borrow()
            .nodes
            .get(&node)
            .and_then(|n| n.listeners.get(event).cloned());
        match listener {
            Some(cb) => {
                cb.call(args);
                true
            }
            None => false,
        }
    }

    fn record(&self, op: HostOp) {
        self.tree.borrow_mut().ops.push(op);
    }
}

fn collect_text(tree: &Tree, node: HostNode, out: &mut String) {
    let Some(record) = tree.nodes.get(&node) else {
        return;
    };
    match record.kind {
        NodeKind::Comment => {}
        NodeKind::Text => out.push_str(&record.text),
        NodeKind::Element(_) => {
            out.push_str(&record.text);
            for child in &record.children {
                collect_text(tree, *child, out);
            }
        }
    }
}

fn write_html(tree: &Tree, node: HostNode, out: &mut String) {
    let Some(record) = tree.nodes.get(&node) else {
        return;
    };
    match &record.kind {
        NodeKind::Text => out.push_str(&record.text),
        NodeKind::Comment => {
            let _ = write!(out, "<!--{}-->", record.text);
        }
        NodeKind::Element(tag) => {
            let _ = write!(out, "<{tag}");
            for (key, value) in &record.attrs {
                let _ = write!(out, " {key}=\"{value}\"");
            }
            out.push('>');
            out.push_str(&record.text);
            for child in &record.children {
                write_html(tree, *child, out);
            }
            let _ = write!(out, "</{tag}>");
        }
    }
}

fn event_name(key: &str) -> Option<String> {
    let rest = key.strip_prefix("on")?;
    let first = rest.chars().next()?;
    first
        .is_ascii_uppercase()
        .then(|| rest.to_ascii_lowercase())
}

impl Platform for MemoryHost {
    fn create_element(&self, tag: &str) -> HostNode {
        let node = self
            .tree
            .borrow_mut()
            .create(NodeKind::Element(tag.to_string()), "");
        self.record(HostOp::CreateElement {
            node,
            tag: tag.to_string(),
        });
        node
    }

    fn create_text(&self, text: &str) -> HostNode {
        let node = self.tree.borrow_mut().create(NodeKind::Text, text);
        self.record(HostOp::CreateText {
            node,
            text: text.to_string(),
        });
        node
    }

    fn create_comment(&self, text: &str) -> HostNode {
        let node = self.tree.borrow_mut().create(NodeKind::Comment, text);
        self.record(HostOp::CreateComment {
            node,
            text: text.to_string(),
        });
        node
    }

    fn set_element_text(&self, el: HostNode, text: &str) {
        {
            let mut tree = self.tree.borrow_mut();
            let children = tree
                .nodes
                .get_mut(&el)
                .map(|n| {
                    n.text = text.to_string();
                    std::mem::take(&mut n.children)
                })
                .unwrap_or_default();
            for child in children {
                tree.purge(child);
            }
        }
        self.record(HostOp::SetElementText {
            node: el,
            text: text.to_string(),
        });
    }

    fn set_text(&self, node: HostNode, text: &str) {
        if let Some(n) = self.tree.borrow_mut().nodes.get_mut(&node) {
            n.text = text.to_string();
        }
        self.record(HostOp::SetText {
            node,
            text: text.to_string(),
        });
    }

    fn set_comment(&self, node: HostNode, text: &str) {
        if let Some(n) = self.tree.borrow_mut().nodes.get_mut(&node) {
            n.text = text.to_string();
        }
        self.record(HostOp::SetComment {
            node,
            text: text.to_string(),
        });
    }

    fn insert(&self, node: HostNode, parent: HostNode, anchor: Option<HostNode>) {
        {
            let mut tree = self.tree.borrow_mut();
            tree.detach(node);
            if let Some(p) = tree.nodes.get_mut(&parent) {
                let at = anchor
                    .and_then(|a| p.children.iter().position(|c| *c == a))
                    .unwrap_or(p.children.len());
                p.children.insert(at, node);
            }
            if let Some(n) = tree.nodes.get_mut(&node) {
                n.parent = Some(parent);
            }
        }
        self.record(HostOp::Insert {
            node,
            parent,
            anchor,
        });
    }

    fn remove(&self, node: HostNode) {
        {
            let mut tree = self.tree.borrow_mut();
            tree.detach(node);
            tree.purge(node);
        }
        self.record(HostOp::Remove { node });
    }

    fn patch_prop(&self, el: HostNode, key: &str, _prev: &Value, next: &Value) {
        {
            let mut tree = self.tree.borrow_mut();
            let Some(record) = tree.nodes.get_mut(&el) else {
                return;
            };
            match event_name(key) {
                Some(event) => match next {
                    Value::Func(cb) => {
                        record.listeners.insert(event, cb.clone());
                    }
                    _ => {
                        record.listeners.shift_remove(&event);
                    }
                },
                None if next.is_nullish() || *next == Value::Bool(false) => {
                    record.attrs.shift_remove(key);
                }
                None => {
                    record.attrs.insert(key.to_string(), next.clone());
                }
            }
        }
        self.record(HostOp::PatchProp {
            node: el,
            key: key.to_string(),
            value: next.to_json(),
        });
    }

    fn next_sibling(&self, node: HostNode) -> Option<HostNode> {
        let tree = self.tree.borrow();
        let parent = tree.nodes.get(&node)?.parent?;
        let siblings = &tree.nodes.get(&parent)?.children;
        let at = siblings.iter().position(|c| *c == node)?;
        siblings.get(at + 1).copied()
    }

    fn parent_node(&self, node: HostNode) -> Option<HostNode> {
        self.parent(node)
    }
}
