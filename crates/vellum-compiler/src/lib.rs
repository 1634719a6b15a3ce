//! The vellum template compiler.
//!
//! Takes template text through the markup parser, the directive-aware
//! semantic pass and IR lowering, producing an immutable statement tree
//! that the renderer executes.

pub mod ast;
pub mod attrs;
pub mod error;
pub mod ir;
pub mod lower;
pub mod semantics;

pub use ast::{DirectiveIR, ForSpec, PropertyExpr, PropertyForm, SlotDecl, VBind};
pub use error::{CompileError, CompileErrorCode, CompileResult};
pub use ir::{ForStatement, GroupBuilder, IfCase, NodeDesc, SlotC, SlotsC, Statement};
pub use lower::{compile, CompileOptions, CompiledTemplate, DEFAULT_HTML_TAGS};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_simple_template() {
        let compiled = compile(
            "<div>Hello {{ name }}</div><hr>",
            &CompileOptions::default(),
        )
        .unwrap();
        match &*compiled.root {
            Statement::Group(items) => assert_eq!(items.len(), 3),
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_compile_error_reports_position() {
        let src = "<div>\n  <p :id=\"a +\">x</p>\n</div>";
        let err = compile(src, &CompileOptions::default()).unwrap_err();
        let index = vellum_span::LineIndex::new(src);
        let described = err.display_with_position(&index);
        assert!(described.contains("invalid-expression"));
        assert!(described.contains("2:"));
    }

    #[test]
    fn test_custom_tag_set() {
        // With a set that does not know `div`, it compiles as a component.
        let mut tags = rustc_hash::FxHashSet::default();
        tags.insert(smol_str::SmolStr::new("span"));
        let options = CompileOptions {
            html_tags: std::sync::Arc::new(tags),
        };
        let compiled = compile("<div>x</div>", &options).unwrap();
        assert!(matches!(&*compiled.root, Statement::Component { .. }));
    }
}
