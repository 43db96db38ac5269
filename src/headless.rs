// src/headless.rs
//! Headless renderer for tests and tools.
//!
//! Does no GPU work: "compiling" a program runs the material's compile hook over a
//! template and assigns uniform locations by name; graphics calls are recorded in memory.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Mat4;
use parking_lot::Mutex;

use crate::camera::Camera;
use crate::error::Result;
use crate::host::{GraphicsContext, MaterialId, ObjectId, ProgramId, Renderer, ShaderProgram};
use crate::material::PluginHost;
use crate::render_context::RendererInfo;
use crate::shader::{ShaderSource, ShaderStage};
use crate::uniform::{UniformLocation, UniformMap, UniformValue};

const DEFAULT_VERTEX: &str = "uniform mat4 projectionMatrix;
void main() {
  gl_Position = projectionMatrix * vec4(position, 1.0);
}";

const DEFAULT_FRAGMENT: &str = "void main() {
  gl_FragColor = vec4(1.0);
}";

/// A recorded graphics-context call.
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    UseProgram(ProgramId),
    /// Value written plus the raw bytes a GL upload would send.
    SetUniform {
        location: UniformLocation,
        value: UniformValue,
        bytes: Vec<u8>,
    },
}

/// Graphics context that records every call.
#[derive(Debug, Default)]
pub struct RecordingContext {
    calls: Mutex<Vec<GlCall>>,
}

impl RecordingContext {
    pub fn calls(&self) -> Vec<GlCall> {
        self.calls.lock().clone()
    }

    pub fn uniform_writes(&self) -> Vec<(UniformLocation, UniformValue)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                GlCall::SetUniform { location, value, .. } => Some((*location, *value)),
                GlCall::UseProgram(_) => None,
            })
            .collect()
    }

    /// Bytes uploaded to `location`, most recent write last.
    pub fn uploaded_bytes(&self, location: UniformLocation) -> Vec<Vec<u8>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                GlCall::SetUniform { location: at, bytes, .. } if *at == location => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn programs_used(&self) -> Vec<ProgramId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                GlCall::UseProgram(id) => Some(*id),
                GlCall::SetUniform { .. } => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl GraphicsContext for RecordingContext {
    fn use_program(&self, program: ProgramId) {
        self.calls.lock().push(GlCall::UseProgram(program));
    }

    fn set_uniform(&self, location: UniformLocation, value: &UniformValue) {
        self.calls.lock().push(GlCall::SetUniform {
            location,
            value: *value,
            bytes: value.to_bytes(),
        });
    }
}

pub struct HeadlessRenderer {
    info: RendererInfo,
    graphics: Arc<RecordingContext>,
    template: ShaderSource,
    programs: HashMap<MaterialId, ShaderProgram>,
    sources: HashMap<MaterialId, ShaderSource>,
    next_program: u32,
    compile_count: usize,
    last_compile_camera: Option<Camera>,
}

impl HeadlessRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        let mut template = ShaderSource::new("headless", DEFAULT_VERTEX, DEFAULT_FRAGMENT);
        template.declare_uniform("projectionMatrix", Mat4::IDENTITY);

        Self {
            info: RendererInfo {
                frame: 0,
                width,
                height,
                pixel_ratio: 1.0,
                elapsed: 0.0,
            },
            graphics: Arc::new(RecordingContext::default()),
            template,
            programs: HashMap::new(),
            sources: HashMap::new(),
            next_program: 1,
            compile_count: 0,
            last_compile_camera: None,
        }
    }

    /// Replace the shader template used for every compile.
    pub fn with_template(mut self, template: ShaderSource) -> Self {
        self.template = template;
        self
    }

    /// Start the next frame, advancing the clock by `dt` seconds.
    pub fn advance_frame(&mut self, dt: f64) {
        self.info.frame += 1;
        self.info.elapsed += dt;
    }

    pub fn recording(&self) -> &Arc<RecordingContext> {
        &self.graphics
    }

    /// Number of programs built so far.
    pub fn compile_count(&self) -> usize {
        self.compile_count
    }

    pub fn last_compile_camera(&self) -> Option<&Camera> {
        self.last_compile_camera.as_ref()
    }

    /// Source of the last program built for `material`, after the compile hook ran.
    pub fn compiled_source(&self, material: MaterialId) -> Option<&ShaderSource> {
        self.sources.get(&material)
    }

    /// Cached program for `material`, stale or not.
    pub fn cached_program(&self, material: MaterialId) -> Option<&ShaderProgram> {
        self.programs.get(&material)
    }
}

impl Renderer for HeadlessRenderer {
    fn info(&self) -> RendererInfo {
        self.info
    }

    fn graphics(&self) -> Arc<dyn GraphicsContext> {
        self.graphics.clone()
    }

    fn program(&mut self, material: &dyn PluginHost) -> Option<&mut ShaderProgram> {
        let state = material.shader_state();
        let signature = material.registry().signature_hash();
        let program = self.programs.get_mut(&material.material_id())?;

        if state.needs_update() || program.version != state.version() || program.signature != signature {
            return None;
        }
        Some(program)
    }

    fn compile(&mut self, object: ObjectId, camera: &Camera, material: &mut dyn PluginHost) -> Result<()> {
        let id = material.material_id();
        let mut source = self.template.clone();
        source.name = format!("{}#{}", self.template.name, id.0);
        source.uniforms.insert("projectionMatrix", camera.proj_matrix());

        material.on_before_compile(&mut source, Some(object))?;
        declare_missing_uniforms(&mut source);

        let program = ShaderProgram {
            id: ProgramId(self.next_program),
            uniform_map: UniformMap::from_names(source.uniforms.names()),
            uniforms: source.uniforms.clone(),
            version: material.shader_state().version(),
            signature: material.registry().signature_hash(),
        };
        self.next_program += 1;
        self.compile_count += 1;
        self.last_compile_camera = Some(*camera);
        material.shader_state_mut().mark_updated();

        log::debug!(
            "compiled program {:?} for material {:?} ({} uniforms, version {})",
            program.id,
            id,
            program.uniform_map.len(),
            program.version
        );
        self.programs.insert(id, program);
        self.sources.insert(id, source);
        Ok(())
    }
}

/// Prepend a `uniform <type> <name>;` line to each stage for every declared uniform
/// the stage does not already declare.
fn declare_missing_uniforms(source: &mut ShaderSource) {
    for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
        let missing: Vec<String> = source
            .uniforms
            .iter()
            .map(|(name, value)| format!("uniform {} {};", value.glsl_type(), name))
            .filter(|decl| !source.stage(stage).contains(decl.as_str()))
            .collect();
        if !missing.is_empty() {
            source.prepend(stage, &missing.join("\n"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use crate::plugin::Plugin;
    use crate::scheduler::FrameScheduler;

    #[test]
    fn test_compile_builds_uniform_map() {
        let mut scheduler = FrameScheduler::default();
        let mut renderer = HeadlessRenderer::new(64, 64);
        let mut material = Material::new("m");
        let time = Plugin::builder("time")
            .compile(|shader, _, _| {
                shader.declare_uniform("time", 0.0f32);
                Ok(())
            })
            .build();
        material.add_plugin(&time, &mut scheduler).unwrap();

        assert!(renderer.program(&material).is_none());
        renderer
            .compile(ObjectId(1), &Camera::neutral(), &mut material)
            .unwrap();

        let program = renderer.program(&material).unwrap();
        assert_eq!(program.id, ProgramId(1));
        assert!(program.uniform_map.contains("time"));
        assert!(program.uniform_map.contains("projectionMatrix"));
        assert_eq!(renderer.compile_count(), 1);
        assert!(renderer.last_compile_camera().unwrap().is_neutral());
    }

    #[test]
    fn test_program_goes_stale() {
        let mut scheduler = FrameScheduler::default();
        let mut renderer = HeadlessRenderer::new(64, 64);
        let mut material = Material::new("m");
        renderer
            .compile(ObjectId(1), &Camera::neutral(), &mut material)
            .unwrap();
        assert!(renderer.program(&material).is_some());

        material.invalidate().unwrap();
        assert!(renderer.program(&material).is_none());
        renderer
            .compile(ObjectId(1), &Camera::neutral(), &mut material)
            .unwrap();
        assert!(renderer.program(&material).is_some());

        let extra = Plugin::callable("extra", |_, _, _| Ok(()));
        material.add_plugin(&extra, &mut scheduler).unwrap();
        assert!(renderer.program(&material).is_none());
    }

    #[test]
    fn test_recording_context() {
        let gl = RecordingContext::default();
        gl.use_program(ProgramId(3));
        gl.set_uniform(UniformLocation(0), &UniformValue::Int(7));

        gl.set_uniform(UniformLocation(0), &UniformValue::Float(0.5));
        gl.set_uniform(UniformLocation(1), &UniformValue::Bool(true));

        assert_eq!(gl.programs_used(), vec![ProgramId(3)]);
        assert_eq!(gl.uniform_writes()[0], (UniformLocation(0), UniformValue::Int(7)));
        assert_eq!(
            gl.uploaded_bytes(UniformLocation(0)),
            vec![7i32.to_le_bytes().to_vec(), 0.5f32.to_le_bytes().to_vec()]
        );
        assert_eq!(gl.uploaded_bytes(UniformLocation(1)), vec![1u32.to_le_bytes().to_vec()]);
        assert!(gl.uploaded_bytes(UniformLocation(2)).is_empty());
        gl.clear();
        assert!(gl.calls().is_empty());
    }

    #[test]
    fn test_compile_declares_plugin_uniforms_once() {
        let mut scheduler = FrameScheduler::default();
        let template = ShaderSource::new("flat", "void main() {}", "uniform float time;\nvoid main() {}");
        let mut renderer = HeadlessRenderer::new(64, 64).with_template(template);
        let mut material = Material::new("m");
        let tint = Plugin::builder("tint")
            .compile(|shader, _, _| {
                shader.declare_uniform("time", 0.0f32);
                shader.declare_uniform("tint", glam::Vec3::ONE);
                Ok(())
            })
            .build();
        material.add_plugin(&tint, &mut scheduler).unwrap();
        renderer
            .compile(ObjectId(1), &Camera::neutral(), &mut material)
            .unwrap();

        let source = renderer.compiled_source(material.id).unwrap();
        assert!(source.name.starts_with("flat#"));
        assert!(source
            .vertex
            .starts_with("uniform mat4 projectionMatrix;\nuniform float time;\nuniform vec3 tint;\n"));
        assert!(source
            .fragment
            .starts_with("uniform mat4 projectionMatrix;\nuniform vec3 tint;\nuniform float time;\n"));
        assert_eq!(source.fragment.matches("uniform float time;").count(), 1);
    }

    #[test]
    fn test_default_template_keeps_its_declaration() {
        let mut renderer = HeadlessRenderer::new(64, 64);
        let mut material = Material::new("m");
        renderer
            .compile(ObjectId(1), &Camera::neutral(), &mut material)
            .unwrap();

        let source = renderer.compiled_source(material.id).unwrap();
        assert_eq!(source.vertex.matches("uniform mat4 projectionMatrix;").count(), 1);
        assert!(source.fragment.starts_with("uniform mat4 projectionMatrix;\n"));
    }

    #[test]
    fn test_frames_advance() {
        let mut renderer = HeadlessRenderer::new(64, 64);
        assert_eq!(renderer.frame(), 0);
        renderer.advance_frame(0.25);
        renderer.advance_frame(0.25);
        assert_eq!(renderer.frame(), 2);
        assert_eq!(renderer.info().elapsed, 0.5);
    }
}
