#![cfg(not(target_arch = "wasm32"))]

//! Headless demo: a few materials sharing animated plugins, drawn over several frames.
//!
//! Usage: `material_plugins_demo [config.json]`. Without a path the config comes from
//! the environment (`MATERIAL_PLUGINS_AUTO_FRAME`).

use std::backtrace::Backtrace;
use std::fs::File;
use std::io::Write;
use std::panic;
use std::sync::Arc;

use anyhow::Context;
use log::info;

use material_plugins::{
    init_logging, Camera, CameraId, DrawCall, FrameScheduler, GeometryId, HeadlessRenderer, LoggingConfig, Material,
    ObjectId, Plugin, PluginConfig, PluginHost, Renderer, SceneId, ShaderStage, UniformValue,
};

const FRAMES: u64 = 5;
const OBJECTS_PER_MATERIAL: u64 = 50;

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());
    setup_panic_hook();

    let config = match std::env::args().nth(1) {
        Some(path) => PluginConfig::from_path(&path).with_context(|| format!("loading {path}"))?,
        None => PluginConfig::from_env().context("reading config from environment")?,
    };

    info!("Starting material_plugins demo v{}", material_plugins::VERSION);
    run(&config)
}

fn run(config: &PluginConfig) -> anyhow::Result<()> {
    let mut scheduler = FrameScheduler::init(config);
    let mut renderer = HeadlessRenderer::new(1280, 720);

    let (time, pulse, tint) = demo_plugins();

    let mut water = Material::with_config("water", config);
    let mut grass = Material::with_config("grass", config);
    let mut rock = Material::with_config("rock", config);
    water.add_plugins(&[Arc::clone(&pulse), Arc::clone(&tint)], &mut scheduler)?;
    grass.add_plugin(&time, &mut scheduler)?;
    rock.add_plugin(&tint, &mut scheduler)?;

    info!(
        "signatures: water={:?} grass={:?} rock={:?}",
        water.compiled_signature(),
        grass.compiled_signature(),
        rock.compiled_signature()
    );

    let camera = Camera::perspective(
        CameraId(1),
        60f32.to_radians(),
        16.0 / 9.0,
        0.1,
        500.0,
    );

    for frame in 0..FRAMES {
        renderer.advance_frame(1.0 / 60.0);
        if !scheduler.auto_frame() {
            scheduler.begin_frame(&renderer, SceneId(1), &camera)?;
        }

        // Halfway through, the tint plugin's output changes and the materials using it rebuild.
        if frame == FRAMES / 2 {
            water.invalidate()?;
            rock.shader_state_mut().set_define("TINT_STRENGTH", "0.9");
            rock.invalidate()?;
        }

        for object in 0..OBJECTS_PER_MATERIAL {
            for material in [&mut water, &mut grass, &mut rock] {
                let call = DrawCall {
                    object: ObjectId(object),
                    scene: SceneId(1),
                    camera: &camera,
                    geometry: GeometryId(object % 4),
                    group: None,
                };
                scheduler
                    .before_render(&mut renderer, &call, &mut *material)
                    .with_context(|| format!("drawing object {object} with material '{}'", material.name))?;
            }
        }

        let time_value = scheduler.context().shared("time").and_then(UniformValue::as_float);
        info!("frame {} done (time = {:?})", renderer.frame(), time_value);
    }

    info!(
        "{} programs compiled, {} uniform writes, {} frame plugins registered",
        renderer.compile_count(),
        renderer.recording().uniform_writes().len(),
        scheduler.frame_plugins().len()
    );

    for material in [&mut water, &mut grass, &mut rock] {
        material.dispose(&mut scheduler);
    }
    info!(
        "after dispose: time used by {}, pulse by {}, tint by {}",
        time.usage_count(),
        pulse.usage_count(),
        tint.usage_count()
    );
    Ok(())
}

/// `time` publishes the frame clock and writes it per draw call; `pulse` builds on it;
/// `tint` is a bare compile function.
fn demo_plugins() -> (Arc<Plugin>, Arc<Plugin>, Arc<Plugin>) {
    let time = Plugin::builder("time")
        .priority(10)
        .compile_key("time-v1")
        .compile(|shader, _, _| {
            shader.declare_uniform("time", 0.0f32);
            shader.prepend(ShaderStage::Fragment, "uniform float time;");
            Ok(())
        })
        .frame(|ctx| {
            let elapsed = ctx.elapsed() as f32;
            ctx.insert_shared("time", elapsed);
            Ok(())
        })
        .render(|_, uniforms, ctx| {
            if let (Some(slot), Some(value)) = (uniforms.get("time"), ctx.shared("time").copied()) {
                ctx.set(slot, value);
            }
            Ok(())
        })
        .build();

    let pulse = Plugin::builder("pulse")
        .requires(&time)
        .compile_key("pulse-v1")
        .compile(|shader, _, _| {
            shader.declare_uniform("pulse", 0.0f32);
            shader.insert_after(ShaderStage::Fragment, "void main() {", "  gl_FragColor.rgb *= pulse;");
            Ok(())
        })
        .render(|object, uniforms, ctx| {
            let time = ctx.shared("time").and_then(UniformValue::as_float).unwrap_or(0.0);
            if let Some(slot) = uniforms.get("pulse") {
                let phase = object.0 as f32 * 0.1;
                ctx.set(slot, 0.5 + 0.5 * (time * 4.0 + phase).sin());
            }
            Ok(())
        })
        .build();

    let tint = Plugin::builder("tint").compile_key("tint-v1").callable(|shader, _, _| {
        shader.insert_after(ShaderStage::Fragment, "void main() {", "  gl_FragColor.rgb *= vec3(0.9, 1.0, 0.9);");
        Ok(())
    });

    (time, pulse, tint)
}

/// Print panics with a backtrace and keep a copy on disk.
fn setup_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        let backtrace = Backtrace::force_capture();

        let msg = match panic_info.payload().downcast_ref::<&'static str>() {
            Some(s) => *s,
            None => match panic_info.payload().downcast_ref::<String>() {
                Some(s) => &s[..],
                None => "Box<dyn Any>",
            },
        };

        let location = panic_info
            .location()
            .map_or("Unknown location".to_string(), |loc| format!("{}:{}", loc.file(), loc.line()));

        let crash_msg = format!(
            "=== material_plugins demo panicked ===\nReason: {}\nLocation: {}\n\nStack Trace:\n{}",
            msg, location, backtrace
        );

        eprintln!("\x1b[31;1m{}\x1b[0m", crash_msg);

        if let Ok(mut file) = File::create("material_plugins_crash.log") {
            let _ = file.write_all(crash_msg.as_bytes());
            eprintln!("Crash report saved to material_plugins_crash.log");
        }
    }));
}
