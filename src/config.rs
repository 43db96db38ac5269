// src/config.rs
//! Runtime configuration for the plugin core.
//!
//! Every field has a default, so an empty JSON object (`{}`) is a valid config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::camera::OrthoBounds;
use crate::context::Context;
use crate::error::{Error, Result};

/// Environment variable overriding [`PluginConfig::auto_frame`].
pub const AUTO_FRAME_ENV: &str = "MATERIAL_PLUGINS_AUTO_FRAME";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Run frame plugins lazily on the first draw call of each frame.
    /// When `false` the host drives [`FrameScheduler::run_frame`](crate::FrameScheduler::run_frame).
    pub auto_frame: bool,
    /// Define that receives the shader version on invalidation.
    pub version_define: String,
    /// Shader version of a freshly created material.
    pub initial_version: u32,
    /// Frustum of the camera used when a program is compiled on demand.
    pub neutral_camera: OrthoBounds,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            auto_frame: true,
            version_define: "VERSION".to_string(),
            initial_version: 1,
            neutral_camera: OrthoBounds::default(),
        }
    }
}

impl PluginConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading plugin config {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("parsing plugin config {}", path.display()))
    }

    /// Defaults, overridden by `MATERIAL_PLUGINS_AUTO_FRAME` when set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(AUTO_FRAME_ENV) {
            let Some(flag) = parse_flag(&raw) else {
                crate::bail!(Error::Config(format!("{AUTO_FRAME_ENV}={raw:?} is not a boolean")));
            };
            config.auto_frame = flag;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        crate::ensure!(
            !self.version_define.trim().is_empty(),
            Error::Config("version_define must not be empty".into())
        );
        crate::ensure!(
            !self.version_define.chars().any(char::is_whitespace),
            Error::Config(format!("version_define {:?} must be a single identifier", self.version_define))
        );
        Ok(())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
