//! The vellum expression sub-language.
//!
//! A small JavaScript-expression dialect used in attribute bindings,
//! directive values, conditions, iterables and mustache interpolations.
//! Expressions parse once at template-compile time and evaluate against a
//! lexically-scoped environment at render time.

pub mod ast;
pub mod error;
pub mod eval;
pub mod parser;
pub mod scope;
pub mod store;
pub mod value;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use error::{EvalError, ExprError};
pub use eval::{eval, FnCtx};
pub use parser::parse_expr;
pub use scope::Scope;
pub use store::{MapStore, Store};
pub use value::{Function, MapValue, PropAccess, Value};
