// src/registry.rs
//! Per-material plugin registry.
//!
//! Holds the material's plugins sorted by descending priority (equal priorities:
//! most recently attached first) and, in attachment order, the subset with a render
//! hook. Usage counts on the shared descriptors drive registration of frame plugins
//! with the [`FrameScheduler`]: the first material to attach a frame plugin registers
//! it, the last one to detach it deregisters it.

use std::sync::{Arc, OnceLock};

use crate::compile;
use crate::error::{Error, Result};
use crate::host::ObjectId;
use crate::plugin::Plugin;
use crate::scheduler::FrameScheduler;
use crate::shader::ShaderSource;

#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<Plugin>>,
    render_callbacks: Vec<Arc<Plugin>>,
    /// Lazily computed signature, reset whenever the plugin set changes.
    signature: OnceLock<(String, u64)>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `plugin` and, first, its dependencies (depth-first).
    ///
    /// Attaching a plugin that is already present is a no-op. The whole dependency tree
    /// is validated before anything is attached: on error the registry is unchanged.
    pub fn attach(&mut self, plugin: &Arc<Plugin>, scheduler: &mut FrameScheduler) -> Result<()> {
        if self.has(plugin) {
            return Ok(());
        }

        if let Err(err) = self.validate_tree(plugin) {
            log::error!("rejected plugin '{}': {}", plugin.name(), err);
            return Err(err);
        }

        self.attach_validated(plugin, scheduler);
        Ok(())
    }

    /// Attach each plugin in order. Stops at the first invalid plugin; the plugins
    /// before it stay attached.
    pub fn attach_all<'a>(
        &mut self,
        plugins: impl IntoIterator<Item = &'a Arc<Plugin>>,
        scheduler: &mut FrameScheduler,
    ) -> Result<()> {
        for plugin in plugins {
            self.attach(plugin, scheduler)?;
        }
        Ok(())
    }

    fn validate_tree(&self, plugin: &Arc<Plugin>) -> Result<()> {
        plugin.validate()?;
        for dep in plugin.requires() {
            if !self.has(dep) {
                self.validate_tree(dep).map_err(|err| {
                    Error::configuration(format!("dependency of '{}': {}", plugin.name(), err))
                })?;
            }
        }
        Ok(())
    }

    fn attach_validated(&mut self, plugin: &Arc<Plugin>, scheduler: &mut FrameScheduler) {
        // A dependency may have pulled this plugin in already (diamond).
        if self.has(plugin) {
            return;
        }

        for dep in plugin.requires() {
            self.attach_validated(dep, scheduler);
        }

        self.plugins.insert(0, Arc::clone(plugin));
        // Stable: equal priorities keep the front-inserted plugin first.
        self.plugins.sort_by(|a, b| b.priority().cmp(&a.priority()));

        let usage = plugin.acquire();
        if usage == 1 && plugin.has_frame() {
            scheduler.register_frame_plugin(plugin);
        }

        if plugin.has_render() {
            self.render_callbacks.push(Arc::clone(plugin));
        }

        self.signature = OnceLock::new();
        log::debug!(
            "attached plugin '{}' (priority {}, usage {})",
            plugin.name(),
            plugin.priority(),
            usage
        );
    }

    /// Detach `plugin`. Returns `false` (and changes nothing) if it is not attached.
    ///
    /// Dependencies that were attached along with it stay attached.
    pub fn detach(&mut self, plugin: &Arc<Plugin>, scheduler: &mut FrameScheduler) -> bool {
        let Some(index) = self.position(plugin) else {
            return false;
        };
        self.plugins.remove(index);

        if let Some(index) = self.render_callbacks.iter().position(|p| Arc::ptr_eq(p, plugin)) {
            self.render_callbacks.remove(index);
        }

        if plugin.release() == Some(0) && plugin.has_frame() {
            scheduler.deregister_frame_plugin(plugin);
        }

        self.signature = OnceLock::new();
        log::debug!("detached plugin '{}' (usage {})", plugin.name(), plugin.usage_count());
        true
    }

    /// Detach every plugin, front first.
    pub fn clear(&mut self, scheduler: &mut FrameScheduler) {
        while let Some(first) = self.plugins.first().cloned() {
            self.detach(&first, scheduler);
        }
        self.render_callbacks.clear();
    }

    #[inline]
    pub fn has(&self, plugin: &Arc<Plugin>) -> bool {
        self.position(plugin).is_some()
    }

    fn position(&self, plugin: &Arc<Plugin>) -> Option<usize> {
        self.plugins.iter().position(|p| Arc::ptr_eq(p, plugin))
    }

    /// All attached plugins, descending priority.
    pub fn plugins(&self) -> &[Arc<Plugin>] {
        &self.plugins
    }

    /// Plugins with a render hook, in attachment order.
    pub fn render_callbacks(&self) -> &[Arc<Plugin>] {
        &self.render_callbacks
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn has_render_callbacks(&self) -> bool {
        !self.render_callbacks.is_empty()
    }

    /// Compile hook: run the attached compile plugins over `shader` in priority order.
    pub fn on_before_compile(&self, shader: &mut ShaderSource, object: Option<ObjectId>) -> Result<()> {
        compile::apply(&self.plugins, shader, object)
    }

    /// Concatenated compile keys of the current plugin set. Cached until it changes.
    pub fn compiled_signature(&self) -> &str {
        &self.cached_signature().0
    }

    /// Hash of [`compiled_signature`](Self::compiled_signature), usable as a program cache key.
    pub fn signature_hash(&self) -> u64 {
        self.cached_signature().1
    }

    fn cached_signature(&self) -> &(String, u64) {
        self.signature.get_or_init(|| {
            let signature = compile::signature(&self.plugins);
            let hash = compile::signature_hash(&signature);
            (signature, hash)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_plugin(name: &str, priority: i32) -> Arc<Plugin> {
        Plugin::builder(name)
            .priority(priority)
            .compile_key(name)
            .compile(|_, _, _| Ok(()))
            .build()
    }

    fn names(registry: &PluginRegistry) -> Vec<&str> {
        registry.plugins().iter().map(|p| p.name()).collect()
    }

    #[test]
    fn test_priority_order_with_recent_first_ties() {
        let mut scheduler = FrameScheduler::default();
        let mut registry = PluginRegistry::new();
        let p1 = compile_plugin("p1", 5);
        let p2 = compile_plugin("p2", 1);
        let p3 = compile_plugin("p3", 5);
        let p4 = compile_plugin("p4", 0);

        registry
            .attach_all([&p1, &p2, &p3, &p4], &mut scheduler)
            .unwrap();

        assert_eq!(names(&registry), vec!["p3", "p1", "p2", "p4"]);
    }

    #[test]
    fn test_double_attach_is_idempotent() {
        let mut scheduler = FrameScheduler::default();
        let mut registry = PluginRegistry::new();
        let p = compile_plugin("p", 0);

        registry.attach(&p, &mut scheduler).unwrap();
        registry.attach(&p, &mut scheduler).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(p.usage_count(), 1);
    }

    #[test]
    fn test_detach_missing_is_noop() {
        let mut scheduler = FrameScheduler::default();
        let mut registry = PluginRegistry::new();
        let attached = compile_plugin("attached", 0);
        let stranger = compile_plugin("stranger", 0);
        registry.attach(&attached, &mut scheduler).unwrap();

        assert!(!registry.detach(&stranger, &mut scheduler));
        assert_eq!(stranger.usage_count(), 0);
        assert_eq!(attached.usage_count(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_usage_count_tracks_materials() {
        let mut scheduler = FrameScheduler::default();
        let mut a = PluginRegistry::new();
        let mut b = PluginRegistry::new();
        let p = compile_plugin("shared", 0);
        assert_eq!(p.usage_count(), 0);

        a.attach(&p, &mut scheduler).unwrap();
        b.attach(&p, &mut scheduler).unwrap();
        assert_eq!(p.usage_count(), 2);

        a.detach(&p, &mut scheduler);
        assert_eq!(p.usage_count(), 1);
        a.detach(&p, &mut scheduler);
        assert_eq!(p.usage_count(), 1);

        b.clear(&mut scheduler);
        assert_eq!(p.usage_count(), 0);
        assert!(b.is_empty());
    }

    /// Dependencies are attached before their dependent, but list order is decided by
    /// the priority sort alone: `base` and `a` (lower priority) end up after `dependent`.
    #[test]
    fn test_dependencies_attach_first() {
        let mut scheduler = FrameScheduler::default();
        let mut registry = PluginRegistry::new();
        let a = Plugin::builder("a").priority(-10).frame(|_| Ok(())).build();
        let b = Plugin::builder("b").priority(20).frame(|_| Ok(())).build();
        let base = Plugin::builder("base").requires(&a).compile(|_, _, _| Ok(())).build();
        let dependent = Plugin::builder("dependent")
            .priority(5)
            .requires_all([&base, &b])
            .compile(|_, _, _| Ok(()))
            .build();

        registry.attach(&dependent, &mut scheduler).unwrap();

        assert!(registry.has(&a) && registry.has(&b) && registry.has(&base));
        assert_eq!(names(&registry), vec!["b", "dependent", "base", "a"]);
        let registered: Vec<&str> = scheduler.frame_plugins().iter().map(|p| p.name()).collect();
        assert_eq!(registered, vec!["b", "a"]);
        for p in [&a, &b, &base, &dependent] {
            assert_eq!(p.usage_count(), 1);
        }
    }

    #[test]
    fn test_shared_dependency_counted_once() {
        let mut scheduler = FrameScheduler::default();
        let mut registry = PluginRegistry::new();
        let common = compile_plugin("common", 0);
        let left = Plugin::builder("left").requires(&common).compile(|_, _, _| Ok(())).build();
        let right = Plugin::builder("right").requires(&common).compile(|_, _, _| Ok(())).build();
        let top = Plugin::builder("top").requires_all([&left, &right]).compile(|_, _, _| Ok(())).build();

        registry.attach(&top, &mut scheduler).unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(common.usage_count(), 1);
    }

    #[test]
    fn test_invalid_dependency_leaves_registry_unchanged() {
        let mut scheduler = FrameScheduler::default();
        let mut registry = PluginRegistry::new();
        let good = compile_plugin("good", 0);
        let empty = Plugin::builder("empty").build();
        let outer = Plugin::builder("outer")
            .requires_all([&good, &empty])
            .compile(|_, _, _| Ok(()))
            .build();

        let err = registry.attach(&outer, &mut scheduler).unwrap_err();
        assert!(err.is_configuration());
        assert!(registry.is_empty());
        assert_eq!(good.usage_count(), 0);
        assert_eq!(outer.usage_count(), 0);
    }

    #[test]
    fn test_render_callbacks_in_attachment_order() {
        let mut scheduler = FrameScheduler::default();
        let mut registry = PluginRegistry::new();
        let low = Plugin::builder("low").priority(-1).render(|_, _, _| Ok(())).build();
        let high = Plugin::builder("high").priority(9).render(|_, _, _| Ok(())).build();
        let compile_only = compile_plugin("compile_only", 3);

        registry.attach_all([&low, &compile_only, &high], &mut scheduler).unwrap();
        let render: Vec<&str> = registry.render_callbacks().iter().map(|p| p.name()).collect();
        assert_eq!(render, vec!["low", "high"]);

        registry.detach(&low, &mut scheduler);
        assert_eq!(registry.render_callbacks().len(), 1);
        assert!(!registry.has(&low));
    }

    #[test]
    fn test_bare_callable_detach_matches_object_detach() {
        let mut scheduler = FrameScheduler::default();
        let mut registry = PluginRegistry::new();
        let bare = Plugin::callable("bare", |_, _, _| Ok(()));
        let object = compile_plugin("object", 0);

        registry.attach_all([&bare, &object], &mut scheduler).unwrap();
        assert!(registry.detach(&bare, &mut scheduler));
        assert!(registry.detach(&object, &mut scheduler));

        assert!(registry.is_empty());
        assert_eq!(bare.usage_count(), 0);
        assert_eq!(object.usage_count(), 0);
    }

    #[test]
    fn test_signature_is_cached_until_set_changes() {
        let mut scheduler = FrameScheduler::default();
        let mut registry = PluginRegistry::new();
        assert_eq!(registry.compiled_signature(), "");

        let a = compile_plugin("a", 1);
        let b = compile_plugin("b", 2);

        registry.attach(&a, &mut scheduler).unwrap();
        assert_eq!(registry.compiled_signature(), "a;");
        let first_hash = registry.signature_hash();

        registry.attach(&b, &mut scheduler).unwrap();
        assert_eq!(registry.compiled_signature(), "b;a;");
        assert_ne!(registry.signature_hash(), first_hash);

        registry.detach(&b, &mut scheduler);
        assert_eq!(registry.compiled_signature(), "a;");
        assert_eq!(registry.signature_hash(), first_hash);
    }
}
