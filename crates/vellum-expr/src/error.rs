//! Error types for the expression sub-language.

use thiserror::Error;

/// A parse error in an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset} in `{source_text}`")]
pub struct ExprError {
    /// What went wrong.
    pub message: String,
    /// Byte offset into the expression source.
    pub offset: usize,
    /// The expression source text.
    pub source_text: String,
}

impl ExprError {
    /// Create a new parse error.
    pub fn new(message: impl Into<String>, offset: usize, source_text: &str) -> Self {
        Self {
            message: message.into(),
            offset,
            source_text: source_text.to_string(),
        }
    }
}

/// A non-fatal evaluation failure. Callers substitute null and log it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EvalError {
    /// What went wrong.
    pub message: String,
}

impl EvalError {
    /// Create a new evaluation error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
