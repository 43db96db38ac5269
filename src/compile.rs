// src/compile.rs
//! Shader compile hook.
//!
//! When the renderer (re)builds a program it hands the shader template to the material,
//! which runs every compile-capable plugin over it in priority order. The signature of
//! the plugin set (the concatenated compile keys) lets the renderer share programs
//! between materials carrying the same plugins.

use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_64;

use crate::error::Result;
use crate::host::ObjectId;
use crate::plugin::Plugin;
use crate::shader::ShaderSource;

/// Run each plugin's compile contribution over `shader`, in slice order.
///
/// Plugins without a compile hook are skipped. The first failing plugin aborts the build
/// and its error is returned to the renderer.
pub fn apply(plugins: &[Arc<Plugin>], shader: &mut ShaderSource, object: Option<ObjectId>) -> Result<()> {
    if plugins.is_empty() {
        return Ok(());
    }

    let _span = tracing::debug_span!("compile_plugins", shader = %shader.name, count = plugins.len()).entered();

    for plugin in plugins.iter().filter(|p| p.has_compile()) {
        log::trace!("compile plugin '{}' on shader '{}'", plugin.name(), shader.name);
        plugin.compile(shader, object)?;
    }
    Ok(())
}

/// Concatenated compile keys of the compile-capable plugins, in slice order.
pub fn signature(plugins: &[Arc<Plugin>]) -> String {
    let mut code = String::new();
    for plugin in plugins.iter().filter(|p| p.has_compile()) {
        code.push_str(plugin.compile_key());
        code.push(';');
    }
    code
}

#[inline]
pub fn signature_hash(signature: &str) -> u64 {
    xxh3_64(signature.as_bytes())
}
