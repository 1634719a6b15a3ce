//! Node tree construction from the token stream.
//!
//! The builder is tolerant in the same way browsers are: close tags that
//! match nothing are dropped with a warning, void elements never take
//! children, and an unterminated tree is unwound at EOF.

use crate::lexer::{Lexer, Token};
use smol_str::SmolStr;
use vellum_span::Span;

/// The kind of a [`MarkupNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Synthetic root holding the top-level nodes.
    Root,
    /// An element (tag) node.
    Element,
    /// A text run (trimmed, never empty).
    Text,
    /// A comment, raw.
    Comment,
    /// A doctype declaration, raw.
    Doctype,
}

/// An attribute as written in the markup, quotes stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupAttr {
    /// Attribute name, exactly as written (`:id`, `v-if`, `#title`, …).
    pub name: SmolStr,
    /// Attribute value; `None` when written without `=`.
    pub value: Option<String>,
    /// Span of the value text in the source.
    pub value_span: Span,
}

/// A node in the markup tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupNode {
    /// Node kind.
    pub kind: NodeKind,
    /// Tag name for elements, empty otherwise.
    pub tag: SmolStr,
    /// Text content for text/comment/doctype nodes.
    pub text: String,
    /// Attributes for elements.
    pub attrs: Vec<MarkupAttr>,
    /// Child nodes.
    pub children: Vec<MarkupNode>,
    /// Span of the opening tag (or the text run) in the source.
    pub span: Span,
}

impl MarkupNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            tag: SmolStr::default(),
            text: String::new(),
            attrs: Vec::new(),
            children: Vec::new(),
            span: Span::default(),
        }
    }

    /// Find an attribute by exact name.
    pub fn attr(&self, name: &str) -> Option<&MarkupAttr> {
        self.attrs.iter().find(|a| a.name == name)
    }
}

/// Tags that never have children and never emit a closing tag.
pub fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "keygen"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

/// HTML whitespace, the set text nodes are trimmed with.
const WHITESPACE: &[char] = &[' ', '\t', '\r', '\n', '\u{c}'];

/// Parse template text into a node tree rooted at a synthetic root node.
///
/// Never fails: malformed markup is recovered from, not rejected.
pub fn parse_markup(source: &str) -> MarkupNode {
    let mut lexer = Lexer::new(source);

    // Stack of open elements; index 0 is the root.
    let mut stack = vec![MarkupNode::new(NodeKind::Root)];

    loop {
        let token_start = lexer.pos() as u32;
        let Some(token) = lexer.next_token() else {
            break;
        };
        match token {
            Token::StartTag(name) => {
                let mut node = MarkupNode::new(NodeKind::Element);
                node.tag = SmolStr::new(name);

                // Collect the attributes belonging to this tag.
                let mut self_closing = false;
                while let Some(t) = lexer.next_token() {
                    match t {
                        Token::Attr {
                            name,
                            value,
                            value_span,
                        } => node.attrs.push(MarkupAttr {
                            name: SmolStr::new(name),
                            value,
                            value_span,
                        }),
                        Token::StartTagClose {
                            self_closing: closed,
                        } => {
                            self_closing = closed;
                            break;
                        }
                        // The lexer only yields Attr/StartTagClose here.
                        _ => break,
                    }
                }
                node.span = Span::new(token_start, lexer.pos() as u32);

                if self_closing || is_void_element(&node.tag) {
                    append(&mut stack, node);
                } else {
                    stack.push(node);
                }
            }
            Token::EndTag(name) => {
                let top = stack.last().expect("root never popped");
                if top.kind == NodeKind::Element && top.tag.eq_ignore_ascii_case(name) {
                    let node = stack.pop().expect("checked non-root");
                    append(&mut stack, node);
                } else {
                    // Closing tag matches nothing: ignore, no re-balancing.
                    tracing::warn!(tag = name, open = %top.tag, "ignoring mismatched close tag");
                }
            }
            Token::Text(raw) => {
                let trimmed = raw.trim_matches(WHITESPACE);
                if trimmed.is_empty() {
                    continue;
                }
                let mut node = MarkupNode::new(NodeKind::Text);
                node.text = trimmed.to_string();
                node.span = Span::new(token_start, lexer.pos() as u32);
                append(&mut stack, node);
            }
            Token::Comment(raw) => {
                let mut node = MarkupNode::new(NodeKind::Comment);
                node.text = raw.to_string();
                node.span = Span::new(token_start, lexer.pos() as u32);
                append(&mut stack, node);
            }
            Token::Doctype(raw) => {
                let mut node = MarkupNode::new(NodeKind::Doctype);
                node.text = raw.to_string();
                node.span = Span::new(token_start, lexer.pos() as u32);
                append(&mut stack, node);
            }
            Token::Attr { .. } | Token::StartTagClose { .. } => {
                // Stray tag-internal token outside a tag; skip.
            }
        }
    }

    // Unterminated elements at EOF are attached where they stand.
    while stack.len() > 1 {
        let node = stack.pop().expect("len checked");
        append(&mut stack, node);
    }

    stack.pop().expect("root")
}

fn append(stack: &mut [MarkupNode], node: MarkupNode) {
    stack
        .last_mut()
        .expect("root never popped")
        .children
        .push(node);
}
