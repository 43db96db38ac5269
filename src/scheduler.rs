// src/scheduler.rs
//! Frame scheduler.
//!
//! Tracks the renderer's current frame token and the process-wide set of frame plugins.
//! The frame step runs at most once per frame no matter how many draw calls happen in
//! it: either lazily on the first draw call of the frame (auto mode) or when the host
//! calls [`FrameScheduler::begin_frame`] / [`FrameScheduler::run_frame`] (manual mode).
//!
//! One scheduler is created at renderer startup and passed by reference into every
//! attach, detach and draw-call hook. It is not synchronized.

use std::sync::Arc;

use crate::camera::Camera;
use crate::config::PluginConfig;
use crate::error::Result;
use crate::host::{DrawCall, MaterialId, ObjectId, Renderer, SceneId};
use crate::plugin::Plugin;
use crate::render_context::RenderContext;

#[derive(Debug)]
pub struct FrameScheduler {
    config: PluginConfig,
    context: RenderContext,
    /// Frame plugins of all materials, descending priority, registration order on ties.
    frame_plugins: Vec<Arc<Plugin>>,
    current_frame: Option<u64>,
    current_object: Option<ObjectId>,
    auto_frame: bool,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(PluginConfig::default())
    }
}

impl FrameScheduler {
    pub fn new(config: PluginConfig) -> Self {
        Self {
            auto_frame: config.auto_frame,
            config,
            context: RenderContext::new(),
            frame_plugins: Vec::new(),
            current_frame: None,
            current_object: None,
        }
    }

    /// Create the scheduler at renderer startup.
    pub fn init(config: &PluginConfig) -> Self {
        log::info!(
            "frame scheduler initialized (auto_frame: {}, version define: {})",
            config.auto_frame,
            config.version_define
        );
        Self::new(config.clone())
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    #[inline]
    pub fn auto_frame(&self) -> bool {
        self.auto_frame
    }

    /// Disable to drive the frame step yourself with [`begin_frame`](Self::begin_frame)
    /// or [`run_frame`](Self::run_frame).
    pub fn set_auto_frame(&mut self, auto_frame: bool) {
        self.auto_frame = auto_frame;
    }

    #[inline]
    pub fn current_frame(&self) -> Option<u64> {
        self.current_frame
    }

    /// Object of the draw call in progress (or of the last one).
    #[inline]
    pub fn current_object(&self) -> Option<ObjectId> {
        self.current_object
    }

    pub(crate) fn set_current_object(&mut self, object: ObjectId) {
        self.current_object = Some(object);
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.context
    }

    pub fn frame_plugins(&self) -> &[Arc<Plugin>] {
        &self.frame_plugins
    }

    /// Camera used for programs compiled on demand outside of the active camera.
    pub fn neutral_camera(&self) -> Camera {
        Camera::neutral_with(self.config.neutral_camera)
    }

    pub(crate) fn register_frame_plugin(&mut self, plugin: &Arc<Plugin>) {
        if self.frame_plugins.iter().any(|p| Arc::ptr_eq(p, plugin)) {
            return;
        }
        self.frame_plugins.push(Arc::clone(plugin));
        self.frame_plugins.sort_by(|a, b| b.priority().cmp(&a.priority()));
        log::debug!("registered frame plugin '{}'", plugin.name());
    }

    pub(crate) fn deregister_frame_plugin(&mut self, plugin: &Arc<Plugin>) {
        let before = self.frame_plugins.len();
        self.frame_plugins.retain(|p| !Arc::ptr_eq(p, plugin));
        if self.frame_plugins.len() != before {
            let dropped = self.context.remove_shared_from(plugin.id());
            log::debug!(
                "deregistered frame plugin '{}' ({} shared values dropped)",
                plugin.name(),
                dropped
            );
        }
    }

    /// Called once per draw call of a material with render plugins.
    ///
    /// On the first draw call of a new frame, refreshes the frame-level context and, in
    /// auto mode, runs the frame step. Always refreshes the draw-level fields. Returns
    /// whether a new frame started.
    pub fn enter_draw_call<R>(&mut self, renderer: &R, call: &DrawCall<'_>, material: MaterialId) -> Result<bool>
    where
        R: Renderer + ?Sized,
    {
        let frame = renderer.frame();
        let new_frame = self.current_frame != Some(frame);

        if new_frame {
            self.start_frame(renderer, call.scene, call.camera);
            if self.auto_frame {
                self.run_frame()?;
            }
        }

        self.context.set_draw(material, call.geometry, call.group);
        log::trace!(
            "draw call: frame {} object {:?} material {:?}",
            frame,
            call.object,
            material
        );
        Ok(new_frame)
    }

    /// Manual mode: start the renderer's current frame and run the frame step before
    /// any draw call. Draw calls of the same frame will not run it again.
    pub fn begin_frame<R>(&mut self, renderer: &R, scene: SceneId, camera: &Camera) -> Result<()>
    where
        R: Renderer + ?Sized,
    {
        self.start_frame(renderer, scene, camera);
        self.run_frame()
    }

    fn start_frame<R>(&mut self, renderer: &R, scene: SceneId, camera: &Camera)
    where
        R: Renderer + ?Sized,
    {
        let info = renderer.info();
        self.current_frame = Some(info.frame);
        self.context.begin_frame(info, scene, camera, renderer.graphics());
    }

    /// Run every registered frame plugin once, in priority order.
    ///
    /// Stops at the first failing plugin.
    pub fn run_frame(&mut self) -> Result<()> {
        let _span = tracing::debug_span!(
            "frame_plugins",
            frame = ?self.current_frame,
            count = self.frame_plugins.len()
        )
        .entered();

        let mut result = Ok(());
        for plugin in &self.frame_plugins {
            self.context.set_writer(Some(plugin.id()));
            result = plugin.frame(&mut self.context);
            if result.is_err() {
                break;
            }
        }
        self.context.set_writer(None);
        result
    }
}
