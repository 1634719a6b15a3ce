//! Tolerant HTML parsing for vellum templates.
//!
//! This crate tokenises template text and builds a forgiving node tree:
//! mismatched close tags are ignored, void elements self-close, and
//! whitespace-only text disappears before the tree is handed to the
//! compiler.

pub mod lexer;
pub mod node;

pub use lexer::{Lexer, Token};
pub use node::{is_void_element, parse_markup, MarkupAttr, MarkupNode, NodeKind};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_markup_roundtrip_shape() {
        let root = parse_markup("<ul><li about=a>Start</li><li>End</li></ul>");
        assert_eq!(root.children.len(), 1);
        let ul = &root.children[0];
        assert_eq!(ul.children.len(), 2);
        assert_eq!(
            ul.children[0].attr("about").unwrap().value.as_deref(),
            Some("a")
        );
    }
}
