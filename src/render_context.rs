// src/render_context.rs
//! Shared state handed to frame and render plugins.
//!
//! The frame-level fields (renderer, scene, camera, graphics context) are refreshed once
//! per frame; the draw-level fields (material, geometry, group) on every draw call.
//! There is one context per [`FrameScheduler`](crate::FrameScheduler) and no
//! synchronization: draw calls must be dispatched sequentially.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::camera::Camera;
use crate::host::{DrawGroup, GeometryId, GraphicsContext, MaterialId, SceneId};
use crate::plugin::PluginId;
use crate::uniform::{Uniform, UniformCache, UniformValue};

/// Snapshot of renderer state taken at a frame boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererInfo {
    /// Frame token, changes once per frame.
    pub frame: u64,
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    /// Seconds since the renderer started.
    pub elapsed: f64,
}

#[derive(Default)]
pub struct RenderContext {
    frame_id: Option<u64>,
    renderer: Option<RendererInfo>,
    scene: Option<SceneId>,
    camera: Option<Camera>,
    graphics: Option<Arc<dyn GraphicsContext>>,

    material: Option<MaterialId>,
    geometry: Option<GeometryId>,
    group: Option<DrawGroup>,

    /// Values computed by frame plugins for render plugins, keyed by name and tagged
    /// with the frame plugin that wrote them.
    shared: HashMap<String, (Option<PluginId>, UniformValue)>,
    /// Frame plugin currently running, if any.
    writer: Option<PluginId>,
    /// Uniform cache of the program being drawn; bound only while render plugins run.
    uniforms: Option<UniformCache>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn frame_id(&self) -> Option<u64> {
        self.frame_id
    }

    #[inline]
    pub fn renderer(&self) -> Option<&RendererInfo> {
        self.renderer.as_ref()
    }

    /// Renderer clock at the start of the current frame, 0 before the first frame.
    pub fn elapsed(&self) -> f64 {
        self.renderer.map_or(0.0, |info| info.elapsed)
    }

    #[inline]
    pub fn scene(&self) -> Option<SceneId> {
        self.scene
    }

    #[inline]
    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn graphics(&self) -> Option<&Arc<dyn GraphicsContext>> {
        self.graphics.as_ref()
    }

    #[inline]
    pub fn material(&self) -> Option<MaterialId> {
        self.material
    }

    #[inline]
    pub fn geometry(&self) -> Option<GeometryId> {
        self.geometry
    }

    #[inline]
    pub fn group(&self) -> Option<DrawGroup> {
        self.group
    }

    /// Publish a frame-level result. Values written from a frame plugin are dropped
    /// once that plugin is no longer registered.
    pub fn insert_shared(&mut self, name: impl Into<String>, value: impl Into<UniformValue>) {
        self.shared.insert(name.into(), (self.writer, value.into()));
    }

    pub fn shared(&self, name: &str) -> Option<&UniformValue> {
        self.shared.get(name).map(|(_, value)| value)
    }

    /// Uniform cache of the program currently being drawn.
    pub fn uniforms(&self) -> Option<&UniformCache> {
        self.uniforms.as_ref()
    }

    /// Push `value` to the uniform slot on the graphics context and record it in the
    /// program's CPU-side uniform cache.
    pub fn set(&mut self, uniform: &Uniform, value: impl Into<UniformValue>) {
        let value = value.into();

        if let Some(gl) = &self.graphics {
            gl.set_uniform(uniform.location, &value);
        }

        match &mut self.uniforms {
            Some(cache) => cache.insert(uniform.name.clone(), value),
            None => log::warn!(
                "uniform '{}' set outside of a draw call, CPU cache not updated",
                uniform.name
            ),
        }
    }

    pub(crate) fn begin_frame(
        &mut self,
        info: RendererInfo,
        scene: SceneId,
        camera: &Camera,
        graphics: Arc<dyn GraphicsContext>,
    ) {
        self.frame_id = Some(info.frame);
        self.renderer = Some(info);
        self.scene = Some(scene);
        self.camera = Some(*camera);
        self.graphics = Some(graphics);
    }

    pub(crate) fn set_writer(&mut self, writer: Option<PluginId>) {
        self.writer = writer;
    }

    /// Drop every shared value written by `plugin`. Returns how many were removed.
    pub(crate) fn remove_shared_from(&mut self, plugin: PluginId) -> usize {
        let before = self.shared.len();
        self.shared.retain(|_, (writer, _)| *writer != Some(plugin));
        before - self.shared.len()
    }

    pub(crate) fn set_draw(&mut self, material: MaterialId, geometry: GeometryId, group: Option<DrawGroup>) {
        self.material = Some(material);
        self.geometry = Some(geometry);
        self.group = group;
    }

    pub(crate) fn bind_uniforms(&mut self, cache: UniformCache) {
        self.uniforms = Some(cache);
    }

    pub(crate) fn unbind_uniforms(&mut self) -> UniformCache {
        self.uniforms.take().unwrap_or_default()
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("frame_id", &self.frame_id)
            .field("renderer", &self.renderer)
            .field("scene", &self.scene)
            .field("camera", &self.camera.map(|c| c.id))
            .field("material", &self.material)
            .field("geometry", &self.geometry)
            .field("group", &self.group)
            .field("shared", &self.shared)
            .finish_non_exhaustive()
    }
}
