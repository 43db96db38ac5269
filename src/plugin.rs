// src/plugin.rs
//! Plugin descriptors.
//!
//! A plugin is a unit of shader-source injection (`compile`), per-draw-call uniform
//! work (`render`) and once-per-frame computation (`frame`). It comes in two shapes:
//!
//! - [`PluginShape::Callable`]: a bare compile function
//! - [`PluginShape::Object`]: any subset of the three hooks
//!
//! Plugins are shared between materials as `Arc<Plugin>`; identity is pointer identity
//! of that `Arc`. The descriptor tracks how many materials currently hold it.
//!
//! ```ignore
//! let fade = Plugin::builder("fade")
//!     .priority(5)
//!     .compile(|shader, _plugin, _object| {
//!         shader.declare_uniform("fade", 1.0f32);
//!         Ok(())
//!     })
//!     .render(|_object, uniforms, ctx| {
//!         if let Some(slot) = uniforms.get("fade") {
//!             ctx.set(slot, 0.5f32);
//!         }
//!         Ok(())
//!     })
//!     .build();
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Error, PluginStage, Result};
use crate::host::ObjectId;
use crate::render_context::RenderContext;
use crate::shader::ShaderSource;
use crate::uniform::UniformMap;

/// Injects code into the shader being built: `(shader, self, current object)`.
pub type CompileFn = dyn Fn(&mut ShaderSource, &Plugin, Option<ObjectId>) -> Result<()> + Send + Sync;

/// Per-draw-call uniform update: `(object, uniform table, context)`.
pub type RenderFn = dyn Fn(ObjectId, &UniformMap, &mut RenderContext) -> Result<()> + Send + Sync;

/// Once-per-frame computation over the shared context.
pub type FrameFn = dyn Fn(&mut RenderContext) -> Result<()> + Send + Sync;

static NEXT_PLUGIN_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity token stamped on every plugin at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginId(pub u64);

impl PluginId {
    fn next() -> Self {
        Self(NEXT_PLUGIN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Optional hooks of an object-shaped plugin.
#[derive(Default)]
pub struct PluginHooks {
    pub compile: Option<Box<CompileFn>>,
    pub render: Option<Box<RenderFn>>,
    pub frame: Option<Box<FrameFn>>,
}

impl PluginHooks {
    pub fn is_empty(&self) -> bool {
        self.compile.is_none() && self.render.is_none() && self.frame.is_none()
    }
}

pub enum PluginShape {
    Callable(Box<CompileFn>),
    Object(PluginHooks),
}

pub struct Plugin {
    id: PluginId,
    name: String,
    priority: i32,
    requires: Vec<Arc<Plugin>>,
    shape: PluginShape,
    compile_key: String,
    usage: AtomicUsize,
}

impl Plugin {
    pub fn builder(name: impl Into<String>) -> PluginBuilder {
        PluginBuilder::new(name)
    }

    /// Compile-only plugin from a bare function, priority 0, no dependencies.
    pub fn callable<F>(name: impl Into<String>, f: F) -> Arc<Plugin>
    where
        F: Fn(&mut ShaderSource, &Plugin, Option<ObjectId>) -> Result<()> + Send + Sync + 'static,
    {
        PluginBuilder::new(name).callable(f)
    }

    #[inline]
    pub fn id(&self) -> PluginId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Higher runs earlier.
    #[inline]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Dependencies attached before this plugin.
    pub fn requires(&self) -> &[Arc<Plugin>] {
        &self.requires
    }

    pub fn shape(&self) -> &PluginShape {
        &self.shape
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.shape, PluginShape::Callable(_))
    }

    /// Identity of the compile logic, concatenated into a material's signature.
    pub fn compile_key(&self) -> &str {
        &self.compile_key
    }

    /// Number of materials currently holding this plugin.
    #[inline]
    pub fn usage_count(&self) -> usize {
        self.usage.load(Ordering::Acquire)
    }

    pub fn has_compile(&self) -> bool {
        self.compile_fn().is_some()
    }

    pub fn has_render(&self) -> bool {
        matches!(&self.shape, PluginShape::Object(hooks) if hooks.render.is_some())
    }

    pub fn has_frame(&self) -> bool {
        matches!(&self.shape, PluginShape::Object(hooks) if hooks.frame.is_some())
    }

    /// Structural check performed at the attach boundary.
    pub fn validate(&self) -> Result<()> {
        match &self.shape {
            PluginShape::Callable(_) => Ok(()),
            PluginShape::Object(hooks) if hooks.is_empty() => Err(Error::configuration(format!(
                "plugin '{}' exposes no compile, render or frame hook",
                self.name
            ))),
            PluginShape::Object(_) => Ok(()),
        }
    }

    fn compile_fn(&self) -> Option<&CompileFn> {
        match &self.shape {
            PluginShape::Callable(f) => Some(f.as_ref()),
            PluginShape::Object(hooks) => hooks.compile.as_deref(),
        }
    }

    /// Run the compile hook, if any.
    pub fn compile(&self, shader: &mut ShaderSource, object: Option<ObjectId>) -> Result<()> {
        match self.compile_fn() {
            Some(f) => f(shader, self, object).map_err(|e| Error::plugin(&self.name, PluginStage::Compile, e)),
            None => Ok(()),
        }
    }

    /// Run the render hook, if any.
    pub fn render(&self, object: ObjectId, uniforms: &UniformMap, ctx: &mut RenderContext) -> Result<()> {
        match &self.shape {
            PluginShape::Object(PluginHooks { render: Some(f), .. }) => {
                f(object, uniforms, ctx).map_err(|e| Error::plugin(&self.name, PluginStage::Render, e))
            }
            _ => Ok(()),
        }
    }

    /// Run the frame hook, if any.
    pub fn frame(&self, ctx: &mut RenderContext) -> Result<()> {
        match &self.shape {
            PluginShape::Object(PluginHooks { frame: Some(f), .. }) => {
                f(ctx).map_err(|e| Error::plugin(&self.name, PluginStage::Frame, e))
            }
            _ => Ok(()),
        }
    }

    /// Returns the count after incrementing.
    pub(crate) fn acquire(&self) -> usize {
        self.usage.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Returns the count after decrementing, or `None` if it already was zero.
    pub(crate) fn release(&self) -> Option<usize> {
        self.usage
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .ok()
            .map(|prev| prev - 1)
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("callable", &self.is_callable())
            .field("compile", &self.has_compile())
            .field("render", &self.has_render())
            .field("frame", &self.has_frame())
            .field("requires", &self.requires.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("usage", &self.usage_count())
            .finish()
    }
}

pub struct PluginBuilder {
    name: String,
    priority: i32,
    requires: Vec<Arc<Plugin>>,
    hooks: PluginHooks,
    compile_key: Option<String>,
}

impl PluginBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            requires: Vec::new(),
            hooks: PluginHooks::default(),
            compile_key: None,
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn requires(mut self, plugin: &Arc<Plugin>) -> Self {
        self.requires.push(Arc::clone(plugin));
        self
    }

    pub fn requires_all<'a>(mut self, plugins: impl IntoIterator<Item = &'a Arc<Plugin>>) -> Self {
        self.requires.extend(plugins.into_iter().cloned());
        self
    }

    /// Share the signature of plugins whose compile logic is identical. Defaults to a
    /// per-plugin key (`name#id`).
    pub fn compile_key(mut self, key: impl Into<String>) -> Self {
        self.compile_key = Some(key.into());
        self
    }

    pub fn compile<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ShaderSource, &Plugin, Option<ObjectId>) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.compile = Some(Box::new(f));
        self
    }

    pub fn render<F>(mut self, f: F) -> Self
    where
        F: Fn(ObjectId, &UniformMap, &mut RenderContext) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.render = Some(Box::new(f));
        self
    }

    pub fn frame<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut RenderContext) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.frame = Some(Box::new(f));
        self
    }

    /// Object-shaped plugin with the hooks set so far.
    pub fn build(self) -> Arc<Plugin> {
        let hooks = PluginHooks {
            compile: self.hooks.compile,
            render: self.hooks.render,
            frame: self.hooks.frame,
        };
        Self::finish(self.name, self.priority, self.requires, self.compile_key, PluginShape::Object(hooks))
    }

    /// Bare-callable plugin. Hooks set on the builder are discarded.
    pub fn callable<F>(self, f: F) -> Arc<Plugin>
    where
        F: Fn(&mut ShaderSource, &Plugin, Option<ObjectId>) -> Result<()> + Send + Sync + 'static,
    {
        Self::finish(self.name, self.priority, self.requires, self.compile_key, PluginShape::Callable(Box::new(f)))
    }

    fn finish(
        name: String,
        priority: i32,
        requires: Vec<Arc<Plugin>>,
        compile_key: Option<String>,
        shape: PluginShape,
    ) -> Arc<Plugin> {
        let id = PluginId::next();
        let compile_key = compile_key.unwrap_or_else(|| format!("{}#{}", name, id.0));
        Arc::new(Plugin {
            id,
            name,
            priority,
            requires,
            shape,
            compile_key,
            usage: AtomicUsize::new(0),
        })
    }
}
