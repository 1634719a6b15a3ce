//! Error types for template compilation.

use vellum_expr::ExprError;
use vellum_span::{LineIndex, Span};
use std::fmt;

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;

/// An error that occurred during template compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// The error message.
    pub message: String,
    /// The span where the error occurred.
    pub span: Span,
    /// The error code.
    pub code: CompileErrorCode,
}

impl CompileError {
    /// Create a new compile error.
    pub fn new(message: impl Into<String>, span: Span, code: CompileErrorCode) -> Self {
        Self {
            message: message.into(),
            span,
            code,
        }
    }

    /// Create an invalid v-for error.
    pub fn invalid_v_for(detail: &str, span: Span) -> Self {
        Self::new(
            format!("invalid v-for expression: {}", detail),
            span,
            CompileErrorCode::InvalidVFor,
        )
    }

    /// Create an orphan else-branch error.
    pub fn orphan_else(directive: &str, span: Span) -> Self {
        Self::new(
            format!("{} must follow an element with v-if", directive),
            span,
            CompileErrorCode::OrphanElse,
        )
    }

    /// Wrap an expression parse error.
    pub fn from_expr(err: ExprError, span: Span) -> Self {
        Self::new(err.to_string(), span, CompileErrorCode::InvalidExpression)
    }

    /// Describe the error with a 1-indexed line/column computed against
    /// the template source.
    pub fn display_with_position(&self, index: &LineIndex) -> String {
        let position = index.line_col(self.span.start);
        format!("{} ({}:{})", self.message, self.code, position)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CompileError {}

/// Error codes for template compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileErrorCode {
    /// Invalid expression syntax.
    InvalidExpression,
    /// Invalid v-for syntax.
    InvalidVFor,
    /// v-else / v-else-if without a preceding v-if.
    OrphanElse,
    /// Invalid slot declaration.
    InvalidSlot,
    /// Unexpected token in the markup.
    UnexpectedToken,
    /// Reserved for future semantic analyses.
    Semantic,
}

impl CompileErrorCode {
    /// Get the error code as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidExpression => "invalid-expression",
            Self::InvalidVFor => "invalid-v-for",
            Self::OrphanElse => "orphan-else",
            Self::InvalidSlot => "invalid-slot",
            Self::UnexpectedToken => "unexpected-token",
            Self::Semantic => "semantic",
        }
    }
}

impl fmt::Display for CompileErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
