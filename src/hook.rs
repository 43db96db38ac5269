// src/hook.rs
//! Draw-call hook.
//!
//! The renderer calls [`before_render`] right before submitting an object whose
//! material may carry render plugins. Materials without render plugins return
//! immediately.

use crate::error::{Error, Result};
use crate::host::{DrawCall, Renderer, ShaderProgram};
use crate::material::PluginHost;
use crate::render_context::RenderContext;
use crate::scheduler::FrameScheduler;
use crate::uniform::UniformMap;

/// Run the frame step if this is the first draw call of the frame, make sure the
/// material's program exists, activate it and run the material's render plugins.
///
/// A missing or stale program is compiled on the spot against the scheduler's neutral
/// camera. Render plugin errors are returned as-is; the program's uniform cache is
/// restored either way.
pub fn before_render<R>(
    scheduler: &mut FrameScheduler,
    renderer: &mut R,
    call: &DrawCall<'_>,
    material: &mut dyn PluginHost,
) -> Result<()>
where
    R: Renderer + ?Sized,
{
    if !material.registry().has_render_callbacks() {
        return Ok(());
    }

    let material_id = material.material_id();
    scheduler.set_current_object(call.object);
    scheduler.enter_draw_call(&*renderer, call, material_id)?;

    if renderer.program(&*material).is_none() {
        let camera = scheduler.neutral_camera();
        log::trace!("compiling material {:?} on demand", material_id);
        renderer.compile(call.object, &camera, material)?;
    }

    let gl = renderer.graphics();
    let ShaderProgram {
        id,
        uniform_map,
        uniforms,
        ..
    } = renderer
        .program(&*material)
        .ok_or(Error::MissingProgram(material_id))?;

    gl.use_program(*id);

    let ctx = scheduler.context_mut();
    ctx.bind_uniforms(std::mem::take(uniforms));
    let result = run_render_plugins(&*material, call, uniform_map, ctx);
    *uniforms = ctx.unbind_uniforms();
    result
}

fn run_render_plugins(
    material: &dyn PluginHost,
    call: &DrawCall<'_>,
    uniform_map: &UniformMap,
    ctx: &mut RenderContext,
) -> Result<()> {
    for plugin in material.registry().render_callbacks() {
        plugin.render(call.object, uniform_map, ctx)?;
    }
    Ok(())
}

impl FrameScheduler {
    /// See [`before_render`].
    pub fn before_render<R>(&mut self, renderer: &mut R, call: &DrawCall<'_>, material: &mut dyn PluginHost) -> Result<()>
    where
        R: Renderer + ?Sized,
    {
        before_render(self, renderer, call, material)
    }
}
