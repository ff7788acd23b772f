//! Renderer boundary
//!
//! The scheduler renders files through the [`Renderer`] trait: a path plus
//! a [`RenderContext`] in, rendered text out. The context carries the
//! merged macro bindings for the file and the shared value cache that the
//! renderer's channel tags call back into. [`TagRenderer`] is the built-in
//! implementation.

mod tags;
mod template;

pub use tags::TagCall;
pub use template::TagRenderer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::ValueCache;
use crate::macros::MacroContext;

/// Failure to render one file. Logged by the scheduler and isolated to
/// that file; the rest of the pass continues.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read template {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unknown template tag '{name}'")]
    UnknownTag { name: String },
}

/// Per-file rendering inputs.
#[derive(Clone)]
pub struct RenderContext {
    /// Merged global + inline macro bindings for this file
    pub macros: MacroContext,
    /// Shared live-value cache for the channel tags
    pub cache: Arc<ValueCache>,
}

impl RenderContext {
    pub fn new(macros: MacroContext, cache: Arc<ValueCache>) -> RenderContext {
        RenderContext { macros, cache }
    }
}

/// Renders one template file against a context.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, path: &Path, context: &RenderContext) -> Result<String, RenderError>;
}
