// src/lib.rs
//! Composable shader plugins for materials.
//!
//! A [`Plugin`] contributes any mix of shader-source injection (compile), per-draw-call
//! uniform updates (render) and once-per-frame computation (frame). Plugins are
//! attached to materials through [`PluginHost`]; a single [`FrameScheduler`] created at
//! renderer startup runs frame work once per frame and feeds the shared
//! [`RenderContext`] to render plugins from the [`before_render`] draw-call hook.
//!
//! ```ignore
//! let config = PluginConfig::from_env()?;
//! let mut scheduler = FrameScheduler::init(&config);
//! let mut material = Material::with_config("water", &config);
//! material.add_plugin(&ripples, &mut scheduler)?;
//!
//! // per draw call, from the renderer:
//! scheduler.before_render(&mut renderer, &call, &mut material)?;
//! ```

pub mod camera;
pub mod compile;
pub mod config;
pub mod context;
pub mod error;
pub mod headless;
pub mod hook;
pub mod host;
pub mod logging;
pub mod material;
pub mod plugin;
pub mod registry;
pub mod render_context;
pub mod scheduler;
pub mod shader;
pub mod uniform;

pub use camera::{Camera, OrthoBounds, Projection};
pub use config::PluginConfig;
pub use context::Context;
pub use error::{Error, PluginStage, Result};
pub use headless::{HeadlessRenderer, RecordingContext};
pub use hook::before_render;
pub use host::{
    CameraId, DrawCall, DrawGroup, GeometryId, GraphicsContext, MaterialId, ObjectId, ProgramId, Renderer, SceneId,
    ShaderProgram,
};
pub use logging::{init_logging, LoggingConfig};
pub use material::{Material, PluginHost};
pub use plugin::{Plugin, PluginBuilder, PluginId, PluginShape};
pub use registry::PluginRegistry;
pub use render_context::{RenderContext, RendererInfo};
pub use scheduler::FrameScheduler;
pub use shader::{ShaderSource, ShaderStage, ShaderState};
pub use uniform::{Uniform, UniformCache, UniformLocation, UniformMap, UniformValue};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging with defaults and report the crate version.
pub fn init() {
    init_logging(LoggingConfig::default());
    log::info!("material_plugins v{} initialized", VERSION);
}
