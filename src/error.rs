// src/error.rs
//! Error handling for the plugin registry, scheduler and draw-call hook.
//!
//! - **Taxonomy**: structural problems (bad plugin shape) are `Configuration` and are
//!   raised at the attach boundary; plugin callback failures are wrapped in `Plugin`
//!   and propagated to the host draw loop untouched in meaning.
//! - **Context chaining**: `.context()` / `.with_context()` from [`crate::context`].

use std::fmt;
use thiserror::Error;

use crate::host::MaterialId;

/// Which plugin callback produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginStage {
    Compile,
    Render,
    Frame,
}

impl fmt::Display for PluginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PluginStage::Compile => "compile",
            PluginStage::Render => "render",
            PluginStage::Frame => "frame",
        })
    }
}

/// Main error type. Send + Sync + 'static so hosts can ship it across threads.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// An invalid plugin was handed to a material. The material is left unchanged.
    #[error("invalid plugin configuration: {0}")]
    Configuration(String),

    /// The renderer did not produce a program even after a synchronous compile.
    #[error("no shader program available for material {0:?} after compile")]
    MissingProgram(MaterialId),

    /// A plugin callback returned an error.
    #[error("plugin '{plugin}' failed during {stage}: {source}")]
    Plugin {
        plugin: String,
        stage: PluginStage,
        #[source]
        source: Box<Error>,
    },

    /// The shader version counter is exhausted; the material was not invalidated.
    #[error("shader version {0} cannot be incremented")]
    VersionOverflow(u32),

    /// Malformed configuration values.
    #[error("config error: {0}")]
    Config(String),

    /// I/O errors (config files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization of configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Simple custom message, mostly raised by plugin callbacks.
    #[error("{0}")]
    Custom(String),

    /// Context chaining.
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a custom error message.
    #[inline]
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Self::Custom(msg.into())
    }

    /// Create a formatted custom error (like `format!` but returns `Error`).
    #[inline]
    pub fn format(args: fmt::Arguments) -> Self {
        Self::Custom(fmt::format(args))
    }

    /// Quick static message.
    #[inline]
    pub fn msg(msg: &'static str) -> Self {
        Self::Custom(msg.into())
    }

    #[inline]
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Add context to any error.
    #[inline]
    pub fn context<C: Into<String>>(self, context: C) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    /// Wrap a callback failure with the plugin name and stage that raised it.
    #[inline]
    pub fn plugin(plugin: impl Into<String>, stage: PluginStage, source: Error) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            stage,
            source: Box::new(source),
        }
    }

    #[inline]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    #[inline]
    pub fn is_plugin(&self) -> bool {
        matches!(self, Error::Plugin { .. })
    }

    /// Stage of the failing plugin callback, looking through context layers.
    pub fn plugin_stage(&self) -> Option<PluginStage> {
        match self {
            Error::Plugin { stage, .. } => Some(*stage),
            Error::WithContext { source, .. } => source.plugin_stage(),
            _ => None,
        }
    }
}

/// Convenient `Result` alias, use `crate::Result<T>` everywhere.
pub type Result<T> = std::result::Result<T, Error>;
