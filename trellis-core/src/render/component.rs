//! Components
//!
//! A [`Component`] is a reusable definition: declared props, optional local
//! state, a setup function or render function, and lifecycle hooks. Each
//! mount creates a [`ComponentInstance`] that owns the instance state, the
//! last rendered sub-tree and the render effect.
//!
//! # How Components Update
//!
//! The renderer runs each instance's render function inside an effect whose
//! scheduler queues a job keyed by the instance. Any number of state writes
//! before the next flush cost one re-render. Props passed by the parent are
//! held in a shallow reactive object; patching the parent writes the new
//! values into it, which queues the child the same way.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{error, warn};

use super::keep_alive::{KeepAliveCtx, KeepAliveOptions};
use super::vnode::{Props, Slots, VNode};
use crate::graph::JobId;
use crate::reactive::{
    reactive, shallow_reactive, shallow_readonly, untracked, Effect, Reactive, Target, Value,
};

/// Produces a component's sub-tree.
pub type RenderFn = Rc<dyn Fn(&RenderContext) -> VNode>;

/// Runs once per instance and returns the render function.
pub type SetupFn = Rc<dyn Fn(&Reactive, &SetupContext) -> RenderFn>;

/// Lifecycle hook receiving the instance's render context.
pub type Hook = Rc<dyn Fn(&RenderContext)>;

#[derive(Clone, Default)]
struct LifecycleHooks {
    before_create: Option<Rc<dyn Fn()>>,
    created: Option<Hook>,
    before_mount: Option<Hook>,
    mounted: Option<Hook>,
    before_update: Option<Hook>,
    updated: Option<Hook>,
}

/// Which lifecycle point the renderer reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Created,
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    Unmounted,
}

/// A component definition.
///
/// # Example
///
/// ```rust,ignore
/// let counter = Component::new("Counter")
///     .props(["label"])
///     .data(|| Target::object_from([("count", 0)]))
///     .render(|ctx| {
///         VNode::element("span").with_text(format!("{}: {}", ctx.get("label"), ctx.get("count")))
///     })
///     .build();
/// ```
#[derive(Clone, Default)]
pub struct Component {
    name: Option<Rc<str>>,
    props: Vec<Rc<str>>,
    data: Option<Rc<dyn Fn() -> Target>>,
    setup: Option<SetupFn>,
    render: Option<RenderFn>,
    hooks: LifecycleHooks,
    keep_alive: Option<KeepAliveOptions>,
}

impl Component {
    pub fn new(name: &str) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// A component with no name, state or hooks that renders from its props.
    pub fn functional(f: impl Fn(&Reactive) -> VNode + 'static) -> Self {
        Self {
            render: Some(Rc::new(move |ctx: &RenderContext| f(ctx.props()))),
            ..Self::default()
        }
    }

    /// Declare prop names. Undeclared incoming props land in `attrs`.
    pub fn props<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.props = names.into_iter().map(|s| s.as_ref().into()).collect();
        self
    }

    /// Factory for the instance's local state.
    pub fn data(mut self, f: impl Fn() -> Target + 'static) -> Self {
        self.data = Some(Rc::new(f));
        self
    }

    pub fn setup<F, R>(mut self, f: F) -> Self
    where
        F: Fn(&Reactive, &SetupContext) -> R + 'static,
        R: Fn(&RenderContext) -> VNode + 'static,
    {
        self.setup = Some(Rc::new(move |props: &Reactive, ctx: &SetupContext| {
            Rc::new(f(props, ctx)) as RenderFn
        }));
        self
    }

    pub fn render(mut self, f: impl Fn(&RenderContext) -> VNode + 'static) -> Self {
        self.render = Some(Rc::new(f));
        self
    }

    pub fn before_create(mut self, f: impl Fn() + 'static) -> Self {
        self.hooks.before_create = Some(Rc::new(f));
        self
    }

    pub fn created(mut self, f: impl Fn(&RenderContext) + 'static) -> Self {
        self.hooks.created = Some(Rc::new(f));
        self
    }

    pub fn before_mount(mut self, f: impl Fn(&RenderContext) + 'static) -> Self {
        self.hooks.before_mount = Some(Rc::new(f));
        self
    }

    pub fn mounted(mut self, f: impl Fn(&RenderContext) + 'static) -> Self {
        self.hooks.mounted = Some(Rc::new(f));
        self
    }

    pub fn before_update(mut self, f: impl Fn(&RenderContext) + 'static) -> Self {
        self.hooks.before_update = Some(Rc::new(f));
        self
    }

    pub fn updated(mut self, f: impl Fn(&RenderContext) + 'static) -> Self {
        self.hooks.updated = Some(Rc::new(f));
        self
    }

    pub(crate) fn keep_alive_options(mut self, options: KeepAliveOptions) -> Self {
        self.keep_alive = Some(options);
        self
    }

    pub fn build(self) -> Rc<Component> {
        Rc::new(self)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn keep_alive(&self) -> Option<&KeepAliveOptions> {
        self.keep_alive.as_ref()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("props", &self.props)
            .field("setup", &self.setup.is_some())
            .field("render", &self.render.is_some())
            .finish()
    }
}

/// Split incoming props into declared props and fallthrough attrs.
///
/// Keys starting with `on` are event handlers and always count as props.
pub fn resolve_props(declared: &[Rc<str>], raw: &Props) -> (Props, Props) {
    let mut props = Props::new();
    let mut attrs = Props::new();
    for (key, value) in raw {
        if key.starts_with("on") || declared.iter().any(|d| d == key) {
            props.insert(key.clone(), value.clone());
        } else {
            attrs.insert(key.clone(), value.clone());
        }
    }
    (props, attrs)
}

/// Whether a parent re-render passed different props.
pub fn has_props_changed(prev: &Props, next: &Props) -> bool {
    prev.len() != next.len() || next.iter().any(|(key, value)| prev.get(key) != Some(value))
}

fn handler_name(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
        None => "on".to_string(),
    }
}

#[derive(Clone)]
struct Emitter {
    props: Reactive,
    component: Option<Rc<str>>,
}

impl Emitter {
    fn emit(&self, event: &str, args: &[Value]) -> bool {
        let name = handler_name(event);
        match untracked(|| self.props.get(name.as_str())) {
            Value::Func(handler) => {
                handler.call(args);
                true
            }
            _ => {
                error!(
                    event,
                    component = self.component.as_deref().unwrap_or("anonymous"),
                    "emitted event has no handler"
                );
                false
            }
        }
    }
}

/// Context passed to `setup`.
#[derive(Clone)]
pub struct SetupContext {
    attrs: Reactive,
    slots: Slots,
    emitter: Emitter,
}

impl SetupContext {
    pub fn attrs(&self) -> &Reactive {
        &self.attrs
    }

    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    /// Call the parent's `on<Event>` handler. Returns whether one existed.
    pub fn emit(&self, event: &str, args: &[Value]) -> bool {
        self.emitter.emit(event, args)
    }
}

/// Context passed to render functions and lifecycle hooks.
///
/// `get` and `set` resolve a name against local state first, then props.
#[derive(Clone)]
pub struct RenderContext {
    state: Option<Reactive>,
    props: Reactive,
    attrs: Reactive,
    slots: Slots,
    emitter: Emitter,
}

impl RenderContext {
    pub fn state(&self) -> Option<&Reactive> {
        self.state.as_ref()
    }

    /// Read-only view of the declared props.
    pub fn props(&self) -> &Reactive {
        &self.props
    }

    pub fn attrs(&self) -> &Reactive {
        &self.attrs
    }

    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<VNode> {
        self.slots.render(name)
    }

    pub fn get(&self, key: &str) -> Value {
        match &self.state {
            Some(state) if state.has(key) => state.get(key),
            _ => self.props.get(key),
        }
    }

    /// Write local state. Props cannot be written from the child.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        match &self.state {
            Some(state) if state.has(key) || !self.props.has(key) => state.set(key, value),
            _ => {
                warn!(key, "props are read-only inside a component");
                false
            }
        }
    }

    pub fn emit(&self, event: &str, args: &[Value]) -> bool {
        self.emitter.emit(event, args)
    }
}

/// A mounted component.
pub struct ComponentInstance {
    pub(crate) component: Rc<Component>,
    pub(crate) job_id: JobId,
    pub(crate) state: Option<Reactive>,
    pub(crate) props: Reactive,
    pub(crate) attrs: Reactive,
    pub(crate) slots: RefCell<Slots>,
    pub(crate) render: RefCell<Option<RenderFn>>,
    pub(crate) sub_tree: RefCell<Option<VNode>>,
    pub(crate) effect: RefCell<Option<Effect>>,
    pub(crate) keep_alive: RefCell<Option<Rc<KeepAliveCtx>>>,
    mounted: Cell<bool>,
    mounted_hooks: RefCell<Vec<Rc<dyn Fn()>>>,
    unmounted_hooks: RefCell<Vec<Rc<dyn Fn()>>>,
}

impl ComponentInstance {
    /// Create the instance: run `before_create`, build state and props.
    /// Setup runs separately so it can see the instance as current.
    pub(crate) fn new(component: Rc<Component>, raw_props: &Props, slots: Slots) -> Rc<Self> {
        if let Some(hook) = &component.hooks.before_create {
            untracked(|| hook());
        }
        let state = component
            .data
            .as_ref()
            .map(|data| reactive(untracked(|| data())));
        let (props, attrs) = resolve_props(&component.props, raw_props);
        Rc::new(Self {
            component,
            job_id: JobId::new(),
            state,
            props: shallow_reactive(Target::object_from(props)),
            attrs: shallow_reactive(Target::object_from(attrs)),
            slots: RefCell::new(slots),
            render: RefCell::new(None),
            sub_tree: RefCell::new(None),
            effect: RefCell::new(None),
            keep_alive: RefCell::new(None),
            mounted: Cell::new(false),
            mounted_hooks: RefCell::new(Vec::new()),
            unmounted_hooks: RefCell::new(Vec::new()),
        })
    }

    /// Resolve the render function, running `setup` with this instance
    /// current.
    pub(crate) fn setup(self: &Rc<Self>) {
        let render = match &self.component.setup {
            Some(setup) => {
                let _scope = InstanceScope::enter(self);
                let ctx = SetupContext {
                    attrs: shallow_readonly(self.attrs.raw()),
                    slots: self.slots.borrow().clone(),
                    emitter: self.emitter(),
                };
                let props = shallow_readonly(self.props.raw());
                let render = untracked(|| setup(&props, &ctx));
                if self.component.render.is_some() {
                    warn!(
                        component = self.name(),
                        "setup returned a render function; the render option is ignored"
                    );
                }
                Some(render)
            }
            None => self.component.render.clone(),
        };
        let render = render.unwrap_or_else(|| {
            error!(component = self.name(), "component has neither setup nor render");
            Rc::new(|_: &RenderContext| VNode::comment(""))
        });
        *self.render.borrow_mut() = Some(render);
    }

    pub fn name(&self) -> &str {
        self.component.name().unwrap_or("anonymous")
    }

    pub fn component(&self) -> &Rc<Component> {
        &self.component
    }

    pub fn state(&self) -> Option<&Reactive> {
        self.state.as_ref()
    }

    /// Read-only view of the current props.
    pub fn props(&self) -> Reactive {
        shallow_readonly(self.props.raw())
    }

    pub fn attrs(&self) -> Reactive {
        shallow_readonly(self.attrs.raw())
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    pub(crate) fn set_mounted(&self, mounted: bool) {
        self.mounted.set(mounted);
    }

    pub fn render_context(&self) -> RenderContext {
        RenderContext {
            state: self.state.clone(),
            props: shallow_readonly(self.props.raw()),
            attrs: shallow_readonly(self.attrs.raw()),
            slots: self.slots.borrow().clone(),
            emitter: self.emitter(),
        }
    }

    pub fn emit(&self, event: &str, args: &[Value]) -> bool {
        self.emitter().emit(event, args)
    }

    fn emitter(&self) -> Emitter {
        Emitter {
            props: self.props.clone(),
            component: self.component.name.clone(),
        }
    }

    /// Write new parent props into the reactive props and attrs.
    pub(crate) fn update_props(&self, raw: &Props) {
        let (props, attrs) = resolve_props(&self.component.props, raw);
        untracked(|| {
            sync_object(&self.props, &props);
            sync_object(&self.attrs, &attrs);
        });
    }

    pub(crate) fn call_hook(&self, point: Lifecycle) {
        let hooks = &self.component.hooks;
        let hook = match point {
            Lifecycle::Created => hooks.created.as_ref(),
            Lifecycle::BeforeMount => hooks.before_mount.as_ref(),
            Lifecycle::Mounted => hooks.mounted.as_ref(),
            Lifecycle::BeforeUpdate => hooks.before_update.as_ref(),
            Lifecycle::Updated => hooks.updated.as_ref(),
            Lifecycle::Unmounted => None,
        };
        let registered = match point {
            Lifecycle::Mounted => self.mounted_hooks.borrow().clone(),
            Lifecycle::Unmounted => self.unmounted_hooks.borrow().clone(),
            _ => Vec::new(),
        };
        if hook.is_none() && registered.is_empty() {
            return;
        }
        let ctx = self.render_context();
        untracked(|| {
            if let Some(hook) = hook {
                hook(&ctx);
            }
            for hook in &registered {
                hook();
            }
        });
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("name", &self.name())
            .field("mounted", &self.mounted.get())
            .finish()
    }
}

fn sync_object(target: &Reactive, next: &Props) {
    for key in target.keys() {
        if let Some(name) = key.as_str() {
            if !next.contains_key(name) {
                target.delete(key.clone());
            }
        }
    }
    for (key, value) in next {
        target.set(&**key, value.clone());
    }
}

thread_local! {
    static CURRENT_INSTANCE: RefCell<Option<Rc<ComponentInstance>>> = const { RefCell::new(None) };
}

/// RAII guard marking the instance whose setup is running.
pub(crate) struct InstanceScope {
    prev: Option<Rc<ComponentInstance>>,
}

impl InstanceScope {
    pub(crate) fn enter(instance: &Rc<ComponentInstance>) -> Self {
        let prev = CURRENT_INSTANCE.with(|c| c.borrow_mut().replace(instance.clone()));
        Self { prev }
    }
}

impl Drop for InstanceScope {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT_INSTANCE.with(|c| *c.borrow_mut() = prev);
    }
}

/// The instance whose setup is currently running.
pub fn current_instance() -> Option<Rc<ComponentInstance>> {
    CURRENT_INSTANCE.with(|c| c.borrow().clone())
}

/// Register a callback for after the current instance mounts.
///
/// Only valid during `setup`; elsewhere it logs an error and does nothing.
pub fn on_mounted(f: impl Fn() + 'static) {
    match current_instance() {
        Some(instance) => instance.mounted_hooks.borrow_mut().push(Rc::new(f)),
        None => error!("on_mounted called outside of component setup"),
    }
}

/// Register a callback for after the current instance unmounts.
pub fn on_unmounted(f: impl Fn() + 'static) {
    match current_instance() {
        Some(instance) => instance.unmounted_hooks.borrow_mut().push(Rc::new(f)),
        None => error!("on_unmounted called outside of component setup"),
    }
}

// ---- Tests ----
