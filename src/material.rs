// src/material.rs
//! Materials that carry plugins.
//!
//! [`PluginHost`] is implemented by any material type that owns a [`PluginRegistry`]
//! and a [`ShaderState`]; the attach/detach/invalidate API comes with it. [`Material`] is
//! the plain implementation used when a host has no material type of its own.

use std::sync::Arc;

use crate::config::PluginConfig;
use crate::error::Result;
use crate::host::{MaterialId, ObjectId};
use crate::plugin::Plugin;
use crate::registry::PluginRegistry;
use crate::scheduler::FrameScheduler;
use crate::shader::{ShaderSource, ShaderState};

pub trait PluginHost {
    fn material_id(&self) -> MaterialId;

    fn registry(&self) -> &PluginRegistry;

    fn registry_mut(&mut self) -> &mut PluginRegistry;

    fn shader_state(&self) -> &ShaderState;

    fn shader_state_mut(&mut self) -> &mut ShaderState;

    /// Attach `plugin` and its dependencies. Attaching twice is a no-op.
    fn add_plugin(&mut self, plugin: &Arc<Plugin>, scheduler: &mut FrameScheduler) -> Result<()> {
        self.registry_mut().attach(plugin, scheduler)
    }

    fn add_plugins(&mut self, plugins: &[Arc<Plugin>], scheduler: &mut FrameScheduler) -> Result<()> {
        self.registry_mut().attach_all(plugins, scheduler)
    }

    /// Returns `false` if `plugin` was not attached.
    fn remove_plugin(&mut self, plugin: &Arc<Plugin>, scheduler: &mut FrameScheduler) -> bool {
        self.registry_mut().detach(plugin, scheduler)
    }

    fn has_plugin(&self, plugin: &Arc<Plugin>) -> bool {
        self.registry().has(plugin)
    }

    fn clear_plugins(&mut self, scheduler: &mut FrameScheduler) {
        self.registry_mut().clear(scheduler);
    }

    /// Mark the program stale. Returns the new shader version.
    fn invalidate(&mut self) -> Result<u32> {
        self.shader_state_mut().invalidate()
    }

    /// Release hook: detaches every plugin.
    fn dispose(&mut self, scheduler: &mut FrameScheduler) {
        let count = self.registry().len();
        self.clear_plugins(scheduler);
        log::debug!("disposed material {:?} ({} plugins detached)", self.material_id(), count);
    }

    fn compiled_signature(&self) -> &str {
        self.registry().compiled_signature()
    }

    /// Called by the renderer while building the program: applies the material's defines,
    /// then every compile plugin in priority order.
    fn on_before_compile(&self, shader: &mut ShaderSource, object: Option<ObjectId>) -> Result<()> {
        for (name, value) in self.shader_state().defines() {
            shader.define(name.clone(), value);
        }
        self.registry().on_before_compile(shader, object)
    }
}

#[derive(Debug)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    pub shader: ShaderState,
    pub plugins: PluginRegistry,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, &PluginConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: &PluginConfig) -> Self {
        Self {
            id: MaterialId::next(),
            name: name.into(),
            shader: ShaderState::with_config(config),
            plugins: PluginRegistry::new(),
        }
    }
}

impl PluginHost for Material {
    #[inline]
    fn material_id(&self) -> MaterialId {
        self.id
    }

    fn registry(&self) -> &PluginRegistry {
        &self.plugins
    }

    fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.plugins
    }

    fn shader_state(&self) -> &ShaderState {
        &self.shader
    }

    fn shader_state_mut(&mut self) -> &mut ShaderState {
        &mut self.shader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::ShaderStage;

    #[test]
    fn test_materials_get_unique_ids() {
        let a = Material::new("a");
        let b = Material::new("b");
        assert_ne!(a.material_id(), b.material_id());
        assert_eq!(a.shader_state().version(), 1);
    }

    #[test]
    fn test_dispose_releases_plugins() {
        let mut scheduler = FrameScheduler::default();
        let shared = Plugin::builder("shared").frame(|_| Ok(())).build();
        let mut a = Material::new("a");
        let mut b = Material::new("b");

        a.add_plugin(&shared, &mut scheduler).unwrap();
        b.add_plugin(&shared, &mut scheduler).unwrap();
        assert_eq!(shared.usage_count(), 2);

        a.dispose(&mut scheduler);
        assert!(a.registry().is_empty());
        assert_eq!(shared.usage_count(), 1);
        assert_eq!(scheduler.frame_plugins().len(), 1);

        b.dispose(&mut scheduler);
        assert_eq!(shared.usage_count(), 0);
        assert!(scheduler.frame_plugins().is_empty());
    }

    #[test]
    fn test_invalidate_through_host() {
        let config = PluginConfig {
            version_define: "FOG_VERSION".into(),
            initial_version: 4,
            ..PluginConfig::default()
        };
        let mut material = Material::with_config("fog", &config);
        assert_eq!(material.invalidate().unwrap(), 5);
        assert!(material.shader_state().needs_update());
        assert_eq!(
            material.shader_state().defines().get("FOG_VERSION").map(String::as_str),
            Some("4")
        );
    }

    #[test]
    fn test_on_before_compile_applies_defines_then_plugins() {
        let mut scheduler = FrameScheduler::default();
        let mut material = Material::new("tinted");
        let tint = Plugin::builder("tint")
            .compile_key("tint")
            .compile(|shader, _, _| {
                shader.declare_uniform("tint", 0.5f32);
                shader.insert_after(ShaderStage::Fragment, "void main() {", "  color *= tint;");
                Ok(())
            })
            .build();
        material.add_plugin(&tint, &mut scheduler).unwrap();
        material.shader_state_mut().set_define("TINT_STEPS", 4);
        material.invalidate().unwrap();

        let mut shader = ShaderSource::new("tinted", "void main() {}", "void main() {}");
        material.on_before_compile(&mut shader, None).unwrap();

        assert_eq!(shader.defines.get("VERSION").map(String::as_str), Some("1"));
        assert_eq!(shader.defines.get("TINT_STEPS").map(String::as_str), Some("4"));
        assert!(shader.uniforms.contains("tint"));
        assert!(shader.fragment.contains("color *= tint;"));
        assert_eq!(material.compiled_signature(), "tint;");
    }

    #[test]
    fn test_has_and_remove() {
        let mut scheduler = FrameScheduler::default();
        let mut material = Material::new("m");
        let p = Plugin::callable("p", |_, _, _| Ok(()));

        assert!(!material.has_plugin(&p));
        material.add_plugins(&[Arc::clone(&p)], &mut scheduler).unwrap();
        assert!(material.has_plugin(&p));
        assert!(material.remove_plugin(&p, &mut scheduler));
        assert!(!material.remove_plugin(&p, &mut scheduler));
        assert!(!material.has_plugin(&p));
    }
}
