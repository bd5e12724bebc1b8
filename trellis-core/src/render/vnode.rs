//! Virtual Nodes
//!
//! A [`VNode`] describes one node of the desired tree. Render functions
//! build fresh vnodes every time; the renderer diffs them against the
//! previous tree and records the host handles it created back into the new
//! vnodes (`el`, `anchor`, `component`).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::component::{Component, ComponentInstance};
use super::keep_alive::KeepAliveMark;
use super::platform::HostNode;
use crate::reactive::Value;

/// What a vnode renders as.
#[derive(Clone)]
pub enum VNodeType {
    Element(Rc<str>),
    Text,
    Comment,
    /// A list of siblings without a wrapper element.
    Fragment,
    Component(Rc<Component>),
    /// Children rendered into another host container.
    Teleport,
}

impl VNodeType {
    /// Whether two types can be patched into each other.
    pub fn same(&self, other: &VNodeType) -> bool {
        match (self, other) {
            (VNodeType::Element(a), VNodeType::Element(b)) => a == b,
            (VNodeType::Component(a), VNodeType::Component(b)) => Rc::ptr_eq(a, b),
            (VNodeType::Text, VNodeType::Text)
            | (VNodeType::Comment, VNodeType::Comment)
            | (VNodeType::Fragment, VNodeType::Fragment)
            | (VNodeType::Teleport, VNodeType::Teleport) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for VNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeType::Element(tag) => write!(f, "Element({tag})"),
            VNodeType::Text => f.write_str("Text"),
            VNodeType::Comment => f.write_str("Comment"),
            VNodeType::Fragment => f.write_str("Fragment"),
            VNodeType::Component(c) => write!(f, "Component({})", c.name().unwrap_or("anonymous")),
            VNodeType::Teleport => f.write_str("Teleport"),
        }
    }
}

/// Sibling identity used by the keyed diff.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VKey {
    Int(i64),
    Str(Rc<str>),
}

impl fmt::Display for VKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VKey::Int(n) => write!(f, "{n}"),
            VKey::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for VKey {
    fn from(s: &str) -> Self {
        VKey::Str(s.into())
    }
}

impl From<String> for VKey {
    fn from(s: String) -> Self {
        VKey::Str(s.into())
    }
}

impl From<i64> for VKey {
    fn from(n: i64) -> Self {
        VKey::Int(n)
    }
}

impl From<i32> for VKey {
    fn from(n: i32) -> Self {
        VKey::Int(n.into())
    }
}

impl From<usize> for VKey {
    fn from(n: usize) -> Self {
        VKey::Int(n as i64)
    }
}

/// Element attributes, event listeners (`on*` keys) or component props.
pub type Props = IndexMap<Rc<str>, Value>;

/// A slot body: builds the slot content on demand.
pub type SlotFn = Rc<dyn Fn() -> VNode>;

/// Named slot functions passed to a component.
#[derive(Clone, Default)]
pub struct Slots(Rc<IndexMap<Rc<str>, SlotFn>>);

impl Slots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the named slot.
    pub fn render(&self, name: &str) -> Option<VNode> {
        self.0.get(name).map(|f| f())
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn with(&self, name: Rc<str>, f: SlotFn) -> Self {
        let mut map = (*self.0).clone();
        map.insert(name, f);
        Self(Rc::new(map))
    }
}

impl fmt::Debug for Slots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.keys()).finish()
    }
}

/// Children of a vnode.
#[derive(Clone, Debug, Default)]
pub enum Children {
    #[default]
    None,
    Text(Rc<str>),
    Nodes(Vec<VNode>),
    /// Component children.
    Slots(Slots),
}

/// A node of the virtual tree.
#[derive(Clone)]
pub struct VNode {
    pub(crate) node_type: VNodeType,
    pub(crate) key: Option<VKey>,
    pub(crate) props: Props,
    pub(crate) children: Children,
    pub(crate) teleport_to: Option<HostNode>,
    /// Host node for elements, text and comments; the start anchor of a
    /// fragment; the placeholder of a teleport.
    pub(crate) el: Cell<Option<HostNode>>,
    /// End anchor of a fragment.
    pub(crate) anchor: Cell<Option<HostNode>>,
    pub(crate) component: RefCell<Option<Rc<ComponentInstance>>>,
    pub(crate) keep_alive: RefCell<Option<KeepAliveMark>>,
}

impl VNode {
    fn new(node_type: VNodeType, children: Children) -> Self {
        Self {
            node_type,
            key: None,
            props: Props::new(),
            children,
            teleport_to: None,
            el: Cell::new(None),
            anchor: Cell::new(None),
            component: RefCell::new(None),
            keep_alive: RefCell::new(None),
        }
    }

    pub fn element(tag: &str) -> Self {
        Self::new(VNodeType::Element(tag.into()), Children::None)
    }

    pub fn text(text: impl Into<Rc<str>>) -> Self {
        Self::new(VNodeType::Text, Children::Text(text.into()))
    }

    pub fn comment(text: impl Into<Rc<str>>) -> Self {
        Self::new(VNodeType::Comment, Children::Text(text.into()))
    }

    pub fn fragment(children: Vec<VNode>) -> Self {
        Self::new(VNodeType::Fragment, Children::Nodes(children))
    }

    pub fn component(component: &Rc<Component>) -> Self {
        Self::new(VNodeType::Component(component.clone()), Children::None)
    }

    /// Children rendered into the node given with [`VNode::to`].
    pub fn teleport(children: Vec<VNode>) -> Self {
        Self::new(VNodeType::Teleport, Children::Nodes(children))
    }

    pub fn keyed(mut self, key: impl Into<VKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn prop(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Set text content. Fragments and teleports wrap it in a text vnode.
    pub fn with_text(mut self, text: impl Into<Rc<str>>) -> Self {
        self.children = match self.node_type {
            VNodeType::Fragment | VNodeType::Teleport => Children::Nodes(vec![VNode::text(text)]),
            _ => Children::Text(text.into()),
        };
        self
    }

    pub fn with_children(mut self, children: Vec<VNode>) -> Self {
        self.children = Children::Nodes(children);
        self
    }

    pub fn child(mut self, child: VNode) -> Self {
        match &mut self.children {
            Children::Nodes(nodes) => nodes.push(child),
            _ => self.children = Children::Nodes(vec![child]),
        }
        self
    }

    /// Add a named slot to a component vnode.
    pub fn slot(mut self, name: &str, f: impl Fn() -> VNode + 'static) -> Self {
        let slots = match &self.children {
            Children::Slots(slots) => slots.clone(),
            _ => Slots::new(),
        };
        self.children = Children::Slots(slots.with(name.into(), Rc::new(f)));
        self
    }

    /// Teleport target container.
    pub fn to(mut self, target: HostNode) -> Self {
        self.teleport_to = Some(target);
        self
    }

    pub fn node_type(&self) -> &VNodeType {
        &self.node_type
    }

    pub fn key(&self) -> Option<&VKey> {
        self.key.as_ref()
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn children(&self) -> &Children {
        &self.children
    }

    /// Host node backing this vnode, once mounted.
    pub fn el(&self) -> Option<HostNode> {
        self.el.get()
    }

    /// Component instance backing this vnode, once mounted.
    pub fn component_instance(&self) -> Option<Rc<ComponentInstance>> {
        self.component.borrow().clone()
    }

    /// Same type and key: the diff patches instead of replacing.
    pub fn same_vnode(&self, other: &VNode) -> bool {
        self.key == other.key && self.node_type.same(&other.node_type)
    }

    pub(crate) fn child_nodes(&self) -> &[VNode] {
        match &self.children {
            Children::Nodes(nodes) => nodes,
            _ => &[],
        }
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VNode")
            .field("type", &self.node_type)
            .field("key", &self.key)
            .field("props", &self.props)
            .field("children", &self.children)
            .field("el", &self.el.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders() {
        let node = VNode::element("ul")
            .keyed("list")
            .prop("class", "items")
            .child(VNode::element("li").keyed(1).with_text("one"))
            .child(VNode::element("li").keyed(2).with_text("two"));

        assert_eq!(node.key(), Some(&VKey::from("list")));
        assert_eq!(node.props().get("class"), Some(&Value::from("items")));
        assert_eq!(node.child_nodes().len(), 2);
        assert!(matches!(node.child_nodes()[0].children(), Children::Text(t) if &**t == "one"));
    }

    #[test]
    fn same_vnode_needs_type_and_key() {
        let a = VNode::element("li").keyed(1);
        assert!(a.same_vnode(&VNode::element("li").keyed(1)));
        assert!(!a.same_vnode(&VNode::element("li").keyed(2)));
        assert!(!a.same_vnode(&VNode::element("p").keyed(1)));
        assert!(VNode::text("x").same_vnode(&VNode::text("y")));
    }

    #[test]
    fn fragment_text_becomes_a_child() {
        let frag = VNode::fragment(vec![]).with_text("hi");
        assert_eq!(frag.child_nodes().len(), 1);
        assert!(matches!(frag.child_nodes()[0].node_type(), VNodeType::Text));
    }

    #[test]
    fn slots_accumulate() {
        let comp = Component::new("Card").render(|_| VNode::comment("")).build();
        let node = VNode::component(&comp)
            .slot("default", || VNode::text("body"))
            .slot("footer", || VNode::text("end"));
        let Children::Slots(slots) = node.children() else {
            panic!("expected slots");
        };
        assert!(slots.has("default") && slots.has("footer"));
        assert!(matches!(slots.render("footer").map(|n| n.children), Some(Children::Text(t)) if &*t == "end"));
    }

    #[test]
    fn key_display() {
        assert_eq!(VKey::from(3).to_string(), "3");
        assert_eq!(VKey::from("a").to_string(), "a");
    }
}
