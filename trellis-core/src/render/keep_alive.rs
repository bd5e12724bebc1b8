//! KeepAlive
//!
//! A built-in component that caches the instance of its default-slot child
//! per component definition. When the child is switched out, its host nodes
//! move into a detached storage container instead of being destroyed; when
//! it comes back, the cached instance is re-inserted with its state intact.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::component::{current_instance, Component, ComponentInstance, RenderContext};
use super::platform::HostNode;
use super::vnode::{VNode, VNodeType};

/// Name filters for what gets cached. Unnamed components are always cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepAliveOptions {
    pub include: Option<Vec<Rc<str>>>,
    pub exclude: Option<Vec<Rc<str>>>,
}

impl KeepAliveOptions {
    pub fn include<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.include = Some(names.into_iter().map(|s| s.as_ref().into()).collect());
        self
    }

    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclude = Some(names.into_iter().map(|s| s.as_ref().into()).collect());
        self
    }

    /// Whether a component with this name should be cached.
    pub fn matches(&self, name: Option<&str>) -> bool {
        let Some(name) = name else {
            return true;
        };
        if let Some(include) = &self.include {
            if !include.iter().any(|n| &**n == name) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.iter().any(|n| &**n == name) {
                return false;
            }
        }
        true
    }
}

/// Cache state owned by one KeepAlive instance.
pub struct KeepAliveCtx {
    pub(crate) options: KeepAliveOptions,
    /// Detached container holding deactivated sub-trees.
    pub(crate) storage: HostNode,
    pub(crate) cache: RefCell<IndexMap<usize, Rc<ComponentInstance>>>,
}

impl KeepAliveCtx {
    pub(crate) fn new(options: KeepAliveOptions, storage: HostNode) -> Self {
        Self {
            options,
            storage,
            cache: RefCell::new(IndexMap::new()),
        }
    }

    pub fn cached_count(&self) -> usize {
        self.cache.borrow().len()
    }

    pub(crate) fn remember(&self, component: &Rc<Component>, instance: &Rc<ComponentInstance>) {
        self.cache
            .borrow_mut()
            .insert(cache_key(component), instance.clone());
    }
}

impl fmt::Debug for KeepAliveCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeepAliveCtx")
            .field("options", &self.options)
            .field("storage", &self.storage)
            .field("cached", &self.cached_count())
            .finish()
    }
}

/// Attached to a component vnode rendered by a KeepAlive.
#[derive(Clone)]
pub struct KeepAliveMark {
    pub(crate) ctx: Rc<KeepAliveCtx>,
    /// The vnode already carries a cached instance to re-activate.
    pub(crate) kept_alive: bool,
}

fn cache_key(component: &Rc<Component>) -> usize {
    Rc::as_ptr(component) as usize
}

/// Build a KeepAlive component. Render it with the child in the default slot.
///
/// # Example
///
/// ```rust,ignore
/// let cache = keep_alive(KeepAliveOptions::default().exclude(["Heavy"]));
/// let view = VNode::component(&cache).slot("default", move || VNode::component(&current));
/// ```
pub fn keep_alive(options: KeepAliveOptions) -> Rc<Component> {
    Component::new("KeepAlive")
        .keep_alive_options(options)
        .setup(|_props, _ctx| {
            let keep = current_instance().and_then(|instance| {
                let ctx = instance.keep_alive.borrow().clone();
                ctx
            });
            move |ctx: &RenderContext| {
                let Some(child) = ctx.slot("default") else {
                    return VNode::comment("");
                };
                let Some(keep) = &keep else {
                    return child;
                };
                let VNodeType::Component(component) = child.node_type() else {
                    return child;
                };
                if !keep.options.matches(component.name()) {
                    return child;
                }
                let cached = keep.cache.borrow().get(&cache_key(component)).cloned();
                let kept_alive = cached.is_some();
                if let Some(instance) = cached {
                    *child.component.borrow_mut() = Some(instance);
                }
                *child.keep_alive.borrow_mut() = Some(KeepAliveMark {
                    ctx: keep.clone(),
                    kept_alive,
                });
                child
            }
        })
        .build()
}
