// src/shader.rs
//! Shader source handed to compile plugins, and per-material shader versioning.

use std::collections::BTreeMap;

use crate::config::PluginConfig;
use crate::error::{Error, Result};
use crate::uniform::{UniformCache, UniformValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Shader build request: the template the renderer is about to compile.
///
/// Compile plugins mutate it in place (inject code, add uniforms and defines).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderSource {
    pub name: String,
    pub vertex: String,
    pub fragment: String,
    pub defines: BTreeMap<String, String>,
    /// Uniforms declared by the template and plugins, with their initial values.
    pub uniforms: UniformCache,
}

impl ShaderSource {
    pub fn new(name: impl Into<String>, vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertex: vertex.into(),
            fragment: fragment.into(),
            ..Default::default()
        }
    }

    pub fn stage(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }

    pub fn stage_mut(&mut self, stage: ShaderStage) -> &mut String {
        match stage {
            ShaderStage::Vertex => &mut self.vertex,
            ShaderStage::Fragment => &mut self.fragment,
        }
    }

    /// Insert `snippet` on a new line right after the first occurrence of `marker`.
    /// Returns `false` when the marker is absent.
    pub fn insert_after(&mut self, stage: ShaderStage, marker: &str, snippet: &str) -> bool {
        let src = self.stage_mut(stage);
        match src.find(marker) {
            Some(pos) => {
                let at = pos + marker.len();
                src.insert_str(at, &format!("\n{snippet}"));
                true
            }
            None => false,
        }
    }

    /// Replace every occurrence of `from`. Returns the number of replacements.
    pub fn replace(&mut self, stage: ShaderStage, from: &str, to: &str) -> usize {
        let src = self.stage_mut(stage);
        let count = src.matches(from).count();
        if count > 0 {
            *src = src.replace(from, to);
        }
        count
    }

    pub fn prepend(&mut self, stage: ShaderStage, snippet: &str) {
        let src = self.stage_mut(stage);
        src.insert_str(0, &format!("{snippet}\n"));
    }

    /// Declare a uniform with its initial value. Existing declarations are kept.
    pub fn declare_uniform(&mut self, name: impl Into<String>, value: impl Into<UniformValue>) {
        let name = name.into();
        if !self.uniforms.contains(&name) {
            self.uniforms.insert(name, value);
        }
    }

    pub fn define(&mut self, name: impl Into<String>, value: impl ToString) {
        self.defines.insert(name.into(), value.to_string());
    }
}

/// Version counter and dirty flag of a material's program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderState {
    version: u32,
    needs_update: bool,
    version_define: String,
    defines: BTreeMap<String, String>,
}

impl Default for ShaderState {
    fn default() -> Self {
        Self::with_config(&PluginConfig::default())
    }
}

impl ShaderState {
    pub fn with_config(config: &PluginConfig) -> Self {
        Self {
            version: config.initial_version,
            needs_update: false,
            version_define: config.version_define.clone(),
            defines: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[inline]
    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Build-time defines of the material (copied into every shader build).
    pub fn defines(&self) -> &BTreeMap<String, String> {
        &self.defines
    }

    pub fn set_define(&mut self, name: impl Into<String>, value: impl ToString) {
        self.defines.insert(name.into(), value.to_string());
    }

    /// Stamp the current version into the version define, bump the counter and
    /// mark the program stale. Returns the new version.
    ///
    /// Fails with [`Error::VersionOverflow`] at `u32::MAX`, leaving the state untouched.
    pub fn invalidate(&mut self) -> Result<u32> {
        let next = self
            .version
            .checked_add(1)
            .ok_or(Error::VersionOverflow(self.version))?;
        self.defines
            .insert(self.version_define.clone(), self.version.to_string());
        self.version = next;
        self.needs_update = true;
        log::debug!("shader invalidated, version now {}", self.version);
        Ok(self.version)
    }

    /// Called by the renderer once the program was rebuilt.
    pub fn mark_updated(&mut self) {
        self.needs_update = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_bumps_version_and_marks_dirty() {
        let mut state = ShaderState::default();
        assert_eq!(state.version(), 1);
        assert!(!state.needs_update());

        assert_eq!(state.invalidate().unwrap(), 2);
        assert!(state.needs_update());
        assert_eq!(state.defines().get("VERSION").map(String::as_str), Some("1"));

        state.mark_updated();
        assert_eq!(state.invalidate().unwrap(), 3);
        assert!(state.needs_update());
        assert_eq!(state.defines().get("VERSION").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_custom_version_define() {
        let config = PluginConfig {
            version_define: "PLUGIN_REV".into(),
            initial_version: 10,
            ..PluginConfig::default()
        };
        let mut state = ShaderState::with_config(&config);
        state.invalidate().unwrap();
        assert_eq!(state.version(), 11);
        assert_eq!(state.defines().get("PLUGIN_REV").map(String::as_str), Some("10"));
    }

    #[test]
    fn test_invalidate_at_max_version_fails_without_change() {
        let config = PluginConfig {
            initial_version: u32::MAX - 1,
            ..PluginConfig::default()
        };
        let mut state = ShaderState::with_config(&config);
        assert_eq!(state.invalidate().unwrap(), u32::MAX);
        state.mark_updated();

        let err = state.invalidate().unwrap_err();
        assert!(matches!(err, Error::VersionOverflow(v) if v == u32::MAX));
        assert_eq!(state.version(), u32::MAX);
        assert!(!state.needs_update());
        let stamped = (u32::MAX - 1).to_string();
        assert_eq!(state.defines().get("VERSION"), Some(&stamped));
    }

    #[test]
    fn test_material_defines() {
        let mut state = ShaderState::default();
        state.set_define("USE_FOG", 1);
        state.set_define("USE_FOG", 0);
        state.invalidate().unwrap();
        assert_eq!(state.defines().get("USE_FOG").map(String::as_str), Some("0"));
        assert_eq!(state.defines().len(), 2);
    }

    #[test]
    fn test_source_editing() {
        let mut src = ShaderSource::new("basic", "void main() {\n}", "void main() {\n  gl_FragColor = color;\n}");
        assert!(src.insert_after(ShaderStage::Fragment, "gl_FragColor = color;", "  gl_FragColor.rgb *= fade;"));
        assert!(!src.insert_after(ShaderStage::Vertex, "#include <missing>", "x"));
        assert_eq!(src.replace(ShaderStage::Fragment, "color", "tint"), 1);
        src.prepend(ShaderStage::Fragment, "uniform float fade;");
        assert!(src.fragment.starts_with("uniform float fade;\n"));
        assert!(src.fragment.contains("gl_FragColor = tint;\n  gl_FragColor.rgb *= fade;"));

        src.declare_uniform("fade", 1.0f32);
        src.declare_uniform("fade", 0.0f32);
        assert_eq!(src.uniforms.get("fade"), Some(&UniformValue::Float(1.0)));
    }
}
