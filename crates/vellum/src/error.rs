//! Engine error types.

use thiserror::Error;
use vellum_compiler::CompileError;

/// A failure while executing a compiled template.
///
/// Rendering degrades on almost every fault (bad expressions become null,
/// missing components render a placeholder); only cancellation and
/// timeouts abort a render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The render was cancelled through its [`crate::CancelToken`].
    #[error("render cancelled")]
    Cancelled,
    /// The render ran past its deadline.
    #[error("render deadline exceeded")]
    Timeout,
}

/// Any failure surfaced by the engine entry points.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Template compilation failed; nothing was registered.
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    /// Rendering aborted.
    #[error("render error: {0}")]
    Render(#[from] RenderError),
}
