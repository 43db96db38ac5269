// src/host.rs
//! Boundary with the host rendering engine.
//!
//! The scene graph, draw submission, program linking and uniform binding belong to the
//! host. This module names the handful of capabilities the plugin core needs from it:
//!
//! - a frame token and a graphics context ([`Renderer::info`], [`Renderer::graphics`])
//! - a way to look up or synchronously build a material's program
//!   ([`Renderer::program`], [`Renderer::compile`])
//! - "activate program" and "set uniform" primitives ([`GraphicsContext`])

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::camera::Camera;
use crate::error::Result;
use crate::material::PluginHost;
use crate::render_context::RendererInfo;
use crate::uniform::{UniformCache, UniformLocation, UniformMap, UniformValue};

/// Global monotonic counter for material ids.
static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u64);

impl MaterialId {
    pub fn next() -> Self {
        Self(NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraId(pub u64);

impl CameraId {
    /// Reserved id of [`Camera::neutral`].
    pub const NEUTRAL: CameraId = CameraId(u64::MAX);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// Sub-range of a geometry drawn with one material of a multi-material mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawGroup {
    pub start: u32,
    pub count: u32,
    pub material_index: u32,
}

/// Everything the host knows about one draw call, handed to the draw-call hook.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub object: ObjectId,
    pub scene: SceneId,
    pub camera: &'a Camera,
    pub geometry: GeometryId,
    pub group: Option<DrawGroup>,
}

/// A linked program as exposed by the host.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    pub id: ProgramId,
    /// Uniform-name → location table.
    pub uniform_map: UniformMap,
    /// CPU-side copy of the latest uniform values.
    pub uniforms: UniformCache,
    /// Shader version of the material when this program was built.
    pub version: u32,
    /// Plugin signature hash the program was built with (cache key).
    pub signature: u64,
}

/// Graphics-context primitives. Implementations use interior mutability, the same
/// handle is shared by the renderer and the render context.
pub trait GraphicsContext: Send + Sync {
    fn use_program(&self, program: ProgramId);

    fn set_uniform(&self, location: UniformLocation, value: &UniformValue);
}

/// Capabilities the core consumes from the host renderer.
pub trait Renderer {
    /// Snapshot of renderer state, including the current frame token.
    fn info(&self) -> RendererInfo;

    /// Current frame token. Changes exactly when a new frame starts.
    fn frame(&self) -> u64 {
        self.info().frame
    }

    fn graphics(&self) -> Arc<dyn GraphicsContext>;

    /// The up-to-date program for `material`, or `None` when it is missing or stale.
    fn program(&mut self, material: &dyn PluginHost) -> Option<&mut ShaderProgram>;

    /// Build and link the program for `material` as drawn on `object` from `camera`.
    ///
    /// Implementations run [`PluginHost::on_before_compile`] on the shader source.
    fn compile(&mut self, object: ObjectId, camera: &Camera, material: &mut dyn PluginHost) -> Result<()>;
}
