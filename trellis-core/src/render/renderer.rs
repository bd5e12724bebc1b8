//! Renderer
//!
//! Mounts, patches and unmounts vnode trees against a [`Platform`].
//!
//! # How Patching Works
//!
//! `patch(old, new)` compares the two vnodes:
//!
//! 1. Different type or key: unmount the old node and mount the new one in
//!    its place (anchored before the old node's next sibling).
//! 2. Same type: the new vnode adopts the old vnode's host handles, then
//!    props and children are diffed.
//!
//! Children lists go through the keyed diff in `diff.rs`. Component vnodes
//! reuse the existing instance and only push new props and slots into it;
//! the instance re-renders through its own scheduled effect.
//!
//! Host nodes are removed only at the top of a removed subtree. Descendants
//! are still visited so their effects and unmount hooks run.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use tracing::{debug, error, trace};

use super::component::{has_props_changed, ComponentInstance, Lifecycle};
use super::keep_alive::KeepAliveCtx;
use super::platform::{HostNode, Platform};
use super::vnode::{Children, Slots, VKey, VNode, VNodeType};
use crate::error::RenderError;
use crate::graph::queue_job;
use crate::reactive::{effect_with, EffectOptions, Value};

pub(crate) struct RendererCore {
    pub(crate) host: Rc<dyn Platform>,
    roots: RefCell<HashMap<HostNode, VNode>>,
    errors: RefCell<Vec<RenderError>>,
    weak_self: Weak<RendererCore>,
}

/// Renders vnode trees into host containers.
///
/// Cloning shares the renderer.
#[derive(Clone)]
pub struct Renderer {
    core: Rc<RendererCore>,
}

impl Renderer {
    pub fn new(host: Rc<dyn Platform>) -> Self {
        let core = Rc::new_cyclic(|weak_self| RendererCore {
            host,
            roots: RefCell::new(HashMap::new()),
            errors: RefCell::new(Vec::new()),
            weak_self: weak_self.clone(),
        });
        Self { core }
    }

    /// Render `vnode` into `container`, diffing against what was rendered
    /// there before. `None` unmounts the previous tree.
    ///
    /// A tree that fails validation leaves the host untouched.
    pub fn render(&self, vnode: Option<VNode>, container: HostNode) -> Result<(), RenderError> {
        self.core.render_root(vnode, container)
    }

    /// Errors raised by scheduled component re-renders since the last call.
    pub fn take_errors(&self) -> Vec<RenderError> {
        std::mem::take(&mut self.core.errors.borrow_mut())
    }

    pub fn host(&self) -> &Rc<dyn Platform> {
        &self.core.host
    }

    /// Whether a tree is currently rendered into `container`.
    pub fn is_mounted(&self, container: HostNode) -> bool {
        self.core.roots.borrow().contains_key(&container)
    }

    /// Run `f` with the root vnode rendered into `container`.
    pub fn with_root<R>(&self, container: HostNode, f: impl FnOnce(&VNode) -> R) -> Option<R> {
        self.core.roots.borrow().get(&container).map(f)
    }
}

impl RendererCore {
    fn render_root(&self, vnode: Option<VNode>, container: HostNode) -> Result<(), RenderError> {
        let old = self.roots.borrow_mut().remove(&container);
        match vnode {
            Some(new) => {
                if let Err(err) = validate(&new) {
                    if let Some(old) = old {
                        self.roots.borrow_mut().insert(container, old);
                    }
                    return Err(err);
                }
                self.patch(old.as_ref(), &new, container, None)?;
                self.roots.borrow_mut().insert(container, new);
            }
            None => {
                if let Some(old) = old {
                    self.unmount(&old, true);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn patch(
        &self,
        old: Option<&VNode>,
        new: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) -> Result<(), RenderError> {
        if let Some(old) = old {
            if !old.same_vnode(new) {
                let anchor = self.next_host_sibling(old).or(anchor);
                self.unmount(old, true);
                return self.patch(None, new, container, anchor);
            }
        }

        match &new.node_type {
            VNodeType::Element(tag) => match old {
                None => self.mount_element(tag, new, container, anchor),
                Some(old) => self.patch_element(old, new),
            },
            VNodeType::Text | VNodeType::Comment => {
                self.process_leaf(old, new, container, anchor);
                Ok(())
            }
            VNodeType::Fragment => self.process_fragment(old, new, container, anchor),
            VNodeType::Component(_) => match old {
                None => self.mount_component(new, container, anchor),
                Some(old) => {
                    self.patch_component(old, new);
                    Ok(())
                }
            },
            VNodeType::Teleport => self.process_teleport(old, new, container, anchor),
        }
    }

    fn mount_element(
        &self,
        tag: &str,
        vnode: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) -> Result<(), RenderError> {
        let el = self.host.create_element(tag);
        vnode.el.set(Some(el));
        for (key, value) in &vnode.props {
            self.host.patch_prop(el, key, &Value::Undefined, value);
        }
        match &vnode.children {
            Children::Text(text) => self.host.set_element_text(el, text),
            Children::Nodes(children) => {
                for child in children {
                    self.patch(None, child, el, None)?;
                }
            }
            Children::None | Children::Slots(_) => {}
        }
        self.host.insert(el, container, anchor);
        Ok(())
    }

    fn patch_element(&self, old: &VNode, new: &VNode) -> Result<(), RenderError> {
        let Some(el) = old.el.get() else {
            return Ok(());
        };
        new.el.set(Some(el));

        for (key, next) in &new.props {
            let prev = old.props.get(key).unwrap_or(&Value::Undefined);
            if prev != next {
                self.host.patch_prop(el, key, prev, next);
            }
        }
        for (key, prev) in &old.props {
            if !new.props.contains_key(key) {
                self.host.patch_prop(el, key, prev, &Value::Undefined);
            }
        }

        self.patch_children(old, new, el, None)
    }

    fn process_leaf(
        &self,
        old: Option<&VNode>,
        new: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let text = match &new.children {
            Children::Text(text) => &**text,
            _ => "",
        };
        let is_comment = matches!(new.node_type, VNodeType::Comment);
        match old.and_then(|o| o.el.get().map(|el| (o, el))) {
            None => {
                let node = if is_comment {
                    self.host.create_comment(text)
                } else {
                    self.host.create_text(text)
                };
                new.el.set(Some(node));
                self.host.insert(node, container, anchor);
            }
            Some((old, el)) => {
                new.el.set(Some(el));
                let changed = match &old.children {
                    Children::Text(prev) => &**prev != text,
                    _ => true,
                };
                if changed {
                    if is_comment {
                        self.host.set_comment(el, text);
                    } else {
                        self.host.set_text(el, text);
                    }
                }
            }
        }
    }

    fn process_fragment(
        &self,
        old: Option<&VNode>,
        new: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) -> Result<(), RenderError> {
        match old {
            None => {
                let start = self.host.create_text("");
                let end = self.host.create_text("");
                new.el.set(Some(start));
                new.anchor.set(Some(end));
                self.host.insert(start, container, anchor);
                self.host.insert(end, container, anchor);
                for child in new.child_nodes() {
                    self.patch(None, child, container, Some(end))?;
                }
                Ok(())
            }
            Some(old) => {
                new.el.set(old.el.get());
                new.anchor.set(old.anchor.get());
                self.patch_children(old, new, container, new.anchor.get())
            }
        }
    }

    fn process_teleport(
        &self,
        old: Option<&VNode>,
        new: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) -> Result<(), RenderError> {
        let target = new.teleport_to.ok_or(RenderError::MissingTeleportTarget)?;
        match old {
            None => {
                let placeholder = self.host.create_comment("teleport");
                new.el.set(Some(placeholder));
                self.host.insert(placeholder, container, anchor);
                for child in new.child_nodes() {
                    self.patch(None, child, target, None)?;
                }
                Ok(())
            }
            Some(old) => {
                new.el.set(old.el.get());
                let old_target = old.teleport_to.unwrap_or(target);
                self.patch_children(old, new, old_target, None)?;
                if old_target != target {
                    debug!(from = old_target.raw(), to = target.raw(), "moving teleported children");
                    for child in new.child_nodes() {
                        self.move_vnode(child, target, None);
                    }
                }
                Ok(())
            }
        }
    }

    /// Diff the children of two same-type vnodes whose children live in
    /// `container` before `parent_anchor`.
    pub(crate) fn patch_children(
        &self,
        old: &VNode,
        new: &VNode,
        container: HostNode,
        parent_anchor: Option<HostNode>,
    ) -> Result<(), RenderError> {
        match (&old.children, &new.children) {
            (Children::Nodes(prev), Children::Nodes(next)) => {
                self.patch_keyed_children(prev, next, container, parent_anchor)
            }
            (prev, Children::Nodes(next)) => {
                if matches!(prev, Children::Text(_)) {
                    self.host.set_element_text(container, "");
                }
                for child in next {
                    self.patch(None, child, container, parent_anchor)?;
                }
                Ok(())
            }
            (prev, Children::Text(text)) => {
                match prev {
                    Children::Nodes(nodes) => {
                        for child in nodes {
                            self.unmount(child, true);
                        }
                        self.host.set_element_text(container, text);
                    }
                    Children::Text(prev) if prev == text => {}
                    _ => self.host.set_element_text(container, text),
                }
                Ok(())
            }
            (prev, Children::None | Children::Slots(_)) => {
                match prev {
                    Children::Nodes(nodes) => {
                        for child in nodes {
                            self.unmount(child, true);
                        }
                    }
                    Children::Text(_) => self.host.set_element_text(container, ""),
                    Children::None | Children::Slots(_) => {}
                }
                Ok(())
            }
        }
    }

    // ---- Components ----

    fn mount_component(
        &self,
        vnode: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) -> Result<(), RenderError> {
        let VNodeType::Component(component) = &vnode.node_type else {
            return Ok(());
        };

        let mark = vnode.keep_alive.borrow().clone();
        if let Some(mark) = &mark {
            if mark.kept_alive {
                if let Some(instance) = vnode.component_instance() {
                    self.activate(&instance, container, anchor);
                    return Ok(());
                }
            }
        }

        let slots = match &vnode.children {
            Children::Slots(slots) => slots.clone(),
            _ => Slots::new(),
        };
        let instance = ComponentInstance::new(component.clone(), &vnode.props, slots);
        if let Some(options) = component.keep_alive() {
            let storage = self.host.create_element("div");
            *instance.keep_alive.borrow_mut() =
                Some(Rc::new(KeepAliveCtx::new(options.clone(), storage)));
        }
        instance.setup();
        *vnode.component.borrow_mut() = Some(instance.clone());
        instance.call_hook(Lifecycle::Created);

        if let Some(mark) = &mark {
            mark.ctx.remember(component, &instance);
        }

        debug!(component = instance.name(), "mounting component");
        self.setup_render_effect(&instance, container, anchor);
        Ok(())
    }

    fn setup_render_effect(
        &self,
        instance: &Rc<ComponentInstance>,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let core = self.weak_self.clone();
        let weak_instance = Rc::downgrade(instance);
        let job_id = instance.job_id;

        let render = move || {
            let (Some(core), Some(instance)) = (core.upgrade(), weak_instance.upgrade()) else {
                return;
            };
            if let Err(err) = core.render_component(&instance, container, anchor) {
                error!(component = instance.name(), %err, "component render failed");
                core.errors.borrow_mut().push(err);
            }
        };
        let options = EffectOptions::default().with_scheduler(move |effect| {
            let effect = effect.clone();
            queue_job(
                job_id,
                Rc::new(move || {
                    effect.run();
                }),
            );
        });

        let effect = effect_with(render, options);
        *instance.effect.borrow_mut() = Some(effect);
    }

    /// Run the render function and patch its output. Runs inside the
    /// instance's render effect, so reads made while rendering are tracked.
    fn render_component(
        &self,
        instance: &Rc<ComponentInstance>,
        container: HostNode,
        anchor: Option<HostNode>,
    ) -> Result<(), RenderError> {
        let Some(render) = instance.render.borrow().clone() else {
            return Ok(());
        };
        let ctx = instance.render_context();

        if !instance.is_mounted() {
            instance.call_hook(Lifecycle::BeforeMount);
            let sub_tree = render(&ctx);
            validate(&sub_tree)?;
            self.patch(None, &sub_tree, container, anchor)?;
            *instance.sub_tree.borrow_mut() = Some(sub_tree);
            instance.set_mounted(true);
            instance.call_hook(Lifecycle::Mounted);
        } else {
            instance.call_hook(Lifecycle::BeforeUpdate);
            let sub_tree = render(&ctx);
            validate(&sub_tree)?;
            let prev = instance.sub_tree.borrow_mut().take();
            let target = prev
                .as_ref()
                .and_then(|p| self.first_host_node(p))
                .and_then(|n| self.host.parent_node(n))
                .unwrap_or(container);
            let result = self.patch(prev.as_ref(), &sub_tree, target, None);
            *instance.sub_tree.borrow_mut() = Some(sub_tree);
            result?;
            instance.call_hook(Lifecycle::Updated);
        }
        Ok(())
    }

    fn patch_component(&self, old: &VNode, new: &VNode) {
        let Some(instance) = old.component.borrow_mut().take() else {
            return;
        };
        *new.component.borrow_mut() = Some(instance.clone());

        if has_props_changed(&old.props, &new.props) {
            instance.update_props(&new.props);
        }
        if let Children::Slots(slots) = &new.children {
            *instance.slots.borrow_mut() = slots.clone();
            let effect = instance.effect.borrow().clone();
            if let Some(effect) = effect {
                queue_job(
                    instance.job_id,
                    Rc::new(move || {
                        effect.run();
                    }),
                );
            }
        }
    }

    fn activate(&self, instance: &Rc<ComponentInstance>, container: HostNode, anchor: Option<HostNode>) {
        trace!(component = instance.name(), "activating cached component");
        if let Some(sub_tree) = instance.sub_tree.borrow().as_ref() {
            self.move_vnode(sub_tree, container, anchor);
        }
    }

    fn deactivate(&self, instance: &Rc<ComponentInstance>, storage: HostNode) {
        trace!(component = instance.name(), "deactivating cached component");
        if let Some(sub_tree) = instance.sub_tree.borrow().as_ref() {
            self.move_vnode(sub_tree, storage, None);
        }
    }

    // ---- Unmounting ----

    /// Tear down `vnode`. With `remove` set, its host nodes are detached.
    pub(crate) fn unmount(&self, vnode: &VNode, remove: bool) {
        match &vnode.node_type {
            VNodeType::Element(_) => {
                for child in vnode.child_nodes() {
                    self.unmount(child, false);
                }
                if remove {
                    if let Some(el) = vnode.el.get() {
                        self.host.remove(el);
                    }
                }
            }
            VNodeType::Text | VNodeType::Comment => {
                if remove {
                    if let Some(el) = vnode.el.get() {
                        self.host.remove(el);
                    }
                }
            }
            VNodeType::Fragment => {
                for child in vnode.child_nodes() {
                    self.unmount(child, remove);
                }
                if remove {
                    for node in [vnode.el.get(), vnode.anchor.get()].into_iter().flatten() {
                        self.host.remove(node);
                    }
                }
            }
            VNodeType::Teleport => {
                for child in vnode.child_nodes() {
                    self.unmount(child, true);
                }
                if remove {
                    if let Some(el) = vnode.el.get() {
                        self.host.remove(el);
                    }
                }
            }
            VNodeType::Component(_) => {
                let Some(instance) = vnode.component_instance() else {
                    return;
                };
                let mark = vnode.keep_alive.borrow().clone();
                match mark {
                    Some(mark) => self.deactivate(&instance, mark.ctx.storage),
                    None => self.destroy_instance(&instance, remove),
                }
            }
        }
    }

    fn destroy_instance(&self, instance: &Rc<ComponentInstance>, remove: bool) {
        debug!(component = instance.name(), "unmounting component");
        let effect = instance.effect.borrow_mut().take();
        if let Some(effect) = effect {
            effect.dispose();
        }

        let sub_tree = instance.sub_tree.borrow_mut().take();
        let keep = instance.keep_alive.borrow_mut().take();
        if let Some(keep) = keep {
            let active = sub_tree.as_ref().and_then(|s| s.component_instance());
            let cached: Vec<_> = keep.cache.borrow_mut().drain(..).map(|(_, i)| i).collect();
            for cached in cached {
                let is_active = active.as_ref().is_some_and(|a| Rc::ptr_eq(a, &cached));
                if !is_active {
                    self.destroy_instance(&cached, true);
                }
            }
            if let Some(sub_tree) = &sub_tree {
                sub_tree.keep_alive.borrow_mut().take();
            }
        }
        if let Some(sub_tree) = &sub_tree {
            self.unmount(sub_tree, remove);
        }

        instance.set_mounted(false);
        instance.call_hook(Lifecycle::Unmounted);
    }

    // ---- Host node helpers ----

    /// Move every host node of `vnode` before `anchor` in `container`.
    pub(crate) fn move_vnode(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) {
        match &vnode.node_type {
            VNodeType::Component(_) => {
                let Some(instance) = vnode.component_instance() else {
                    return;
                };
                let sub_tree = instance.sub_tree.borrow();
                if let Some(sub_tree) = sub_tree.as_ref() {
                    self.move_vnode(sub_tree, container, anchor);
                }
            }
            VNodeType::Fragment => {
                if let Some(start) = vnode.el.get() {
                    self.host.insert(start, container, anchor);
                }
                for child in vnode.child_nodes() {
                    self.move_vnode(child, container, anchor);
                }
                if let Some(end) = vnode.anchor.get() {
                    self.host.insert(end, container, anchor);
                }
            }
            _ => {
                if let Some(el) = vnode.el.get() {
                    self.host.insert(el, container, anchor);
                }
            }
        }
    }

    /// First host node a vnode occupies in its parent container.
    pub(crate) fn first_host_node(&self, vnode: &VNode) -> Option<HostNode> {
        match &vnode.node_type {
            VNodeType::Component(_) => {
                let instance = vnode.component_instance()?;
                let sub_tree = instance.sub_tree.borrow();
                self.first_host_node(sub_tree.as_ref()?)
            }
            _ => vnode.el.get(),
        }
    }

    fn last_host_node(&self, vnode: &VNode) -> Option<HostNode> {
        match &vnode.node_type {
            VNodeType::Component(_) => {
                let instance = vnode.component_instance()?;
                let sub_tree = instance.sub_tree.borrow();
                self.last_host_node(sub_tree.as_ref()?)
            }
            VNodeType::Fragment => vnode.anchor.get(),
            _ => vnode.el.get(),
        }
    }

    fn next_host_sibling(&self, vnode: &VNode) -> Option<HostNode> {
        self.last_host_node(vnode)
            .and_then(|node| self.host.next_sibling(node))
    }
}

/// Check a tree before any host mutation: sibling keys must be unique and
/// every teleport needs a target. Component sub-trees are checked when they
/// render.
pub(crate) fn validate(vnode: &VNode) -> Result<(), RenderError> {
    if matches!(vnode.node_type, VNodeType::Teleport) && vnode.teleport_to.is_none() {
        return Err(RenderError::MissingTeleportTarget);
    }
    if let Children::Nodes(children) = &vnode.children {
        let mut seen: HashSet<&VKey> = HashSet::new();
        for child in children {
            if let Some(key) = &child.key {
                if !seen.insert(key) {
                    return Err(RenderError::DuplicateKey { key: key.clone() });
                }
            }
            validate(child)?;
        }
    }
    Ok(())
}

// ---- Tests ----

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::flush_jobs;
    use crate::reactive::{Callback, Target};
    use crate::render::component::{on_mounted, on_unmounted, Component, RenderContext};
    use crate::render::keep_alive::{keep_alive, KeepAliveOptions};
    use crate::render::memory::{HostOp, MemoryHost};
    use std::cell::Cell;

    fn setup() -> (Rc<MemoryHost>, Renderer, HostNode) {
        let host = Rc::new(MemoryHost::new());
        let renderer = Renderer::new(host.clone());
        let root = host.create_root();
        (host, renderer, root)
    }

    fn child_instance(instance: &Rc<ComponentInstance>) -> Option<Rc<ComponentInstance>> {
        let sub_tree = instance.sub_tree.borrow();
        sub_tree.as_ref().and_then(|s| s.component_instance())
    }

    fn list(keys: &[&str]) -> VNode {
        VNode::element("ul").with_children(
            keys.iter()
                .map(|k| VNode::element("li").keyed(*k).with_text(*k))
                .collect(),
        )
    }

    #[test]
    fn mounts_elements_and_text() {
        let (host, renderer, root) = setup();
        let tree = VNode::element("div")
            .prop("id", "app")
            .child(VNode::text("hello "))
            .child(VNode::element("b").with_text("world"));
        renderer.render(Some(tree), root).unwrap();

        assert_eq!(host.inner_html(root), r#"<div id="app">hello <b>world</b></div>"#);
        assert!(renderer.is_mounted(root));
    }

    #[test]
    fn patches_props_and_text_in_place() {
        let (host, renderer, root) = setup();
        renderer
            .render(Some(VNode::element("p").prop("class", "a").with_text("x")), root)
            .unwrap();
        host.take_ops();

        renderer
            .render(Some(VNode::element("p").prop("title", "t").with_text("y")), root)
            .unwrap();
        assert_eq!(host.inner_html(root), r#"<p title="t">y</p>"#);
        assert!(host.take_ops().iter().all(|op| !op.is_structural()));
    }

    #[test]
    fn type_change_replaces_in_position() {
        let (host, renderer, root) = setup();
        let tree = |middle: VNode| {
            VNode::element("div").with_children(vec![
                VNode::element("a").keyed("a"),
                middle.keyed("m"),
                VNode::element("c").keyed("c"),
            ])
        };
        renderer.render(Some(tree(VNode::element("span"))), root).unwrap();
        renderer.render(Some(tree(VNode::element("em"))), root).unwrap();

        assert_eq!(host.inner_html(root), "<div><a></a><em></em><c></c></div>");
    }

    #[test]
    fn render_none_unmounts() {
        let (host, renderer, root) = setup();
        renderer.render(Some(list(&["a", "b"])), root).unwrap();
        renderer.render(None, root).unwrap();
        assert_eq!(host.inner_html(root), "");
        assert!(!renderer.is_mounted(root));
    }

    #[test]
    fn duplicate_keys_leave_host_untouched() {
        let (host, renderer, root) = setup();
        renderer.render(Some(list(&["a", "b"])), root).unwrap();
        host.take_ops();

        let err = renderer.render(Some(list(&["a", "a"])), root).unwrap_err();
        assert_eq!(err, RenderError::DuplicateKey { key: VKey::from("a") });
        assert!(host.take_ops().is_empty());

        renderer.render(Some(list(&["b", "a"])), root).unwrap();
        assert_eq!(host.inner_html(root), "<ul><li>b</li><li>a</li></ul>");
    }

    #[test]
    fn fragments_keep_their_place() {
        let (host, renderer, root) = setup();
        let tree = |items: &[&str]| {
            VNode::element("div").with_children(vec![
                VNode::text("["),
                VNode::fragment(items.iter().map(|i| VNode::text(*i).keyed(*i)).collect()),
                VNode::text("]"),
            ])
        };
        renderer.render(Some(tree(&["a", "b"])), root).unwrap();
        assert_eq!(host.text_content(root), "[ab]");

        renderer.render(Some(tree(&["b", "c", "a"])), root).unwrap();
        assert_eq!(host.text_content(root), "[bca]");

        renderer.render(Some(tree(&[])), root).unwrap();
        assert_eq!(host.text_content(root), "[]");
    }

    #[test]
    fn teleport_renders_elsewhere() {
        let (host, renderer, root) = setup();
        let modal = host.create_root();
        let other = host.create_root();

        let tree = |to: HostNode, text: &str| {
            VNode::element("div")
                .child(VNode::teleport(vec![VNode::element("dialog").with_text(text)]).to(to))
        };
        renderer.render(Some(tree(modal, "hi")), root).unwrap();
        assert_eq!(host.inner_html(modal), "<dialog>hi</dialog>");
        assert_eq!(host.inner_html(root), "<div><!--teleport--></div>");

        renderer.render(Some(tree(other, "moved")), root).unwrap();
        assert_eq!(host.inner_html(modal), "");
        assert_eq!(host.inner_html(other), "<dialog>moved</dialog>");

        renderer.render(None, root).unwrap();
        assert_eq!(host.inner_html(other), "");
    }

    #[test]
    fn teleport_without_target_is_rejected() {
        let (host, renderer, root) = setup();
        let tree = VNode::element("div").child(VNode::teleport(vec![VNode::text("x")]));
        assert_eq!(
            renderer.render(Some(tree), root),
            Err(RenderError::MissingTeleportTarget)
        );
        assert!(host.ops().is_empty());
    }

    #[test]
    fn component_state_change_rerenders_on_flush() {
        let (host, renderer, root) = setup();
        let counter = Component::new("Counter")
            .data(|| Target::object_from([("count", 0)]))
            .render(|ctx| {
                let state = ctx.state().cloned();
                VNode::element("button")
                    .prop(
                        "onClick",
                        Callback::new(move |_| {
                            if let Some(state) = &state {
                                let n = state.get("count").as_i64().unwrap_or(0);
                                state.set("count", n + 1);
                            }
                            Value::Undefined
                        }),
                    )
                    .with_text(ctx.get("count").to_string())
            })
            .build();

        renderer.render(Some(VNode::component(&counter)), root).unwrap();
        assert_eq!(host.inner_html(root), "<button>0</button>");

        let button = host.children(root)[0];
        host.dispatch(button, "click", &[]);
        host.dispatch(button, "click", &[]);
        assert_eq!(host.inner_html(root), "<button>0</button>");

        assert_eq!(flush_jobs(), 1);
        assert_eq!(host.inner_html(root), "<button>2</button>");
    }

    #[test]
    fn parent_props_flow_into_child() {
        let (host, renderer, root) = setup();
        let label = Component::new("Label")
            .props(["text"])
            .render(|ctx| VNode::element("span").with_text(ctx.get("text").to_string()))
            .build();

        let tree = |text: &str| VNode::component(&label).prop("text", text).prop("class", "x");
        renderer.render(Some(tree("one")), root).unwrap();
        assert_eq!(host.inner_html(root), "<span>one</span>");

        renderer.render(Some(tree("two")), root).unwrap();
        flush_jobs();
        assert_eq!(host.inner_html(root), "<span>two</span>");
    }

    #[test]
    fn lifecycle_hooks_run_in_order() {
        let (_host, renderer, root) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        let comp = Component::new("Hooks")
            .data(|| Target::object_from([("n", 0)]))
            .setup(move |_props, _ctx| {
                let l1 = l.clone();
                let l2 = l.clone();
                on_mounted(move || l1.borrow_mut().push("mounted"));
                on_unmounted(move || l2.borrow_mut().push("unmounted"));
                |ctx: &RenderContext| VNode::text(ctx.get("n").to_string())
            })
            .build();

        renderer.render(Some(VNode::component(&comp)), root).unwrap();
        renderer.render(None, root).unwrap();
        assert_eq!(*log.borrow(), vec!["mounted", "unmounted"]);
    }

    #[test]
    fn unmounted_component_stops_rendering() {
        let (host, renderer, root) = setup();
        let renders = Rc::new(Cell::new(0));
        let r = renders.clone();
        let state = crate::reactive::reactive(Target::object_from([("v", 1)]));
        let s = state.clone();
        let comp = Component::new("Watcher")
            .render(move |_| {
                r.set(r.get() + 1);
                VNode::text(s.get("v").to_string())
            })
            .build();

        renderer.render(Some(VNode::component(&comp)), root).unwrap();
        renderer.render(None, root).unwrap();
        state.set("v", 2);
        flush_jobs();
        assert_eq!(renders.get(), 1);
        assert_eq!(host.inner_html(root), "");
    }

    #[test]
    fn keep_alive_preserves_state() {
        let (host, renderer, root) = setup();
        let make = |name: &'static str| {
            Component::new(name)
                .data(|| Target::object_from([("n", 0)]))
                .render(move |ctx| VNode::element("p").with_text(format!("{name}{}", ctx.get("n"))))
                .build()
        };
        let a = make("A");
        let b = make("B");
        let cache = keep_alive(KeepAliveOptions::default());

        let view = |child: &Rc<Component>| {
            let child = child.clone();
            VNode::component(&cache).slot("default", move || VNode::component(&child))
        };

        renderer.render(Some(view(&a)), root).unwrap();
        let a_state = renderer
            .with_root(root, |v| v.component_instance())
            .flatten()
            .and_then(|ka| child_instance(&ka))
            .and_then(|i| i.state().cloned());
        if let Some(state) = &a_state {
            state.set("n", 5);
        }
        flush_jobs();
        assert_eq!(host.inner_html(root), "<p>A5</p>");

        renderer.render(Some(view(&b)), root).unwrap();
        flush_jobs();
        assert_eq!(host.inner_html(root), "<p>B0</p>");

        renderer.render(Some(view(&a)), root).unwrap();
        flush_jobs();
        assert_eq!(host.inner_html(root), "<p>A5</p>");
        assert!(host
            .ops()
            .iter()
            .filter(|op| matches!(op, HostOp::CreateElement { tag, .. } if tag == "p"))
            .count()
            == 2);

        renderer.render(None, root).unwrap();
        assert_eq!(host.inner_html(root), "");
    }
}
