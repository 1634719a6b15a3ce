//! Semantic template AST.
//!
//! The markup tree re-read through the directive dialect: every attribute
//! classified, if-chains grouped, loop and slot declarations parsed.
//! Lowering consumes this tree to produce the statement IR.

use smol_str::SmolStr;
use vellum_expr::{Expr, Value};
use vellum_markup::NodeKind;
use vellum_span::Span;

/// A compiled attribute on an element.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyExpr {
    /// The prop key (`id`, `class`, `data-x`, …).
    pub key: SmolStr,
    /// Compile-time attribute-eligibility hint. Attributes written in the
    /// template are eligible; the engine policy only governs keys that
    /// arrive through `v-bind` mappings at render time.
    pub can_be_attr: bool,
    /// The value form.
    pub form: PropertyForm,
}

/// The value form of a [`PropertyExpr`].
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyForm {
    /// A static value known at compile time. Static `class` holds a token
    /// sequence, static `style` a string mapping; pre-serialised props
    /// hold the finished attribute string.
    Static(Value),
    /// A dynamic binding evaluated each render.
    Dynamic(Expr),
    /// An attribute written without a value.
    Empty,
}

impl PropertyExpr {
    /// Whether this prop needs no evaluation at render time.
    pub fn is_static(&self) -> bool {
        !matches!(self.form, PropertyForm::Dynamic(_))
    }
}

/// A `v-bind` source: an expression, or the marker that re-binds the
/// enclosing component's inbound props (fragment distribution and
/// `v-bind="$props"`).
#[derive(Debug, Clone, PartialEq)]
pub enum VBind {
    /// `v-bind="expr"`.
    Expr(Expr),
    /// Mix in the surrounding `$props`.
    UseParentProps,
}

/// A user directive attached to an element.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveIR {
    /// Directive name with the `v-` prefix stripped.
    pub name: SmolStr,
    /// Optional argument (`v-name:arg`).
    pub arg: Option<SmolStr>,
    /// The bound expression; a bare directive reads as null.
    pub value: Expr,
}

/// A parsed `v-for` specification.
#[derive(Debug, Clone, PartialEq)]
pub struct ForSpec {
    /// Binding name for the item.
    pub item: SmolStr,
    /// Binding name for the index; `$index` when not written.
    pub index: SmolStr,
    /// The iterable expression.
    pub iter: Expr,
}

/// A `v-if` with its attached else-branches.
#[derive(Debug, Clone, PartialEq)]
pub struct VIf {
    /// The `v-if` condition.
    pub condition: Expr,
    /// Chained `v-else-if` / `v-else` siblings, in source order.
    pub else_branches: Vec<ElseBranch>,
}

/// One `v-else-if` / `v-else` branch.
#[derive(Debug, Clone, PartialEq)]
pub struct ElseBranch {
    /// The branch condition; `None` for `v-else`.
    pub condition: Option<Expr>,
    /// The branch element.
    pub element: TemplateElement,
}

/// A `v-slot` declaration on an element.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotDecl {
    /// The slot name.
    pub name: SmolStr,
    /// The binding key the slot props are exposed under.
    pub props_key: SmolStr,
}

/// An element after the semantic pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateElement {
    /// The underlying node kind (root, element, text, comment, doctype).
    pub kind: NodeKind,
    /// Tag name for elements.
    pub tag: SmolStr,
    /// Text for text/comment/doctype nodes.
    pub text: String,
    /// Classified props in source order, including static class/style.
    pub props: Vec<PropertyExpr>,
    /// `v-bind` spread, if present.
    pub vbind: Option<VBind>,
    /// User directives in source order.
    pub directives: Vec<DirectiveIR>,
    /// Child elements.
    pub children: Vec<TemplateElement>,
    /// `v-if` chain rooted at this element.
    pub v_if: Option<VIf>,
    /// `v-for` specification.
    pub v_for: Option<ForSpec>,
    /// `v-slot` declaration.
    pub v_slot: Option<SlotDecl>,
    /// `v-html` override for the children.
    pub v_html: Option<Expr>,
    /// `v-text` override for the children.
    pub v_text: Option<Expr>,
    /// Set on the single element child of a template root: at render time
    /// the element re-binds the component's inbound props onto itself.
    pub distribution_attr: bool,
    /// Source span of the node.
    pub span: Span,
}

impl TemplateElement {
    /// Create an empty element of the given kind.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            tag: SmolStr::default(),
            text: String::new(),
            props: Vec::new(),
            vbind: None,
            directives: Vec::new(),
            children: Vec::new(),
            v_if: None,
            v_for: None,
            v_slot: None,
            v_html: None,
            v_text: None,
            distribution_attr: false,
            span: Span::default(),
        }
    }

    /// Whether every prop is static and nothing on the element needs
    /// render-time evaluation.
    pub fn is_fully_static(&self) -> bool {
        self.props.iter().all(PropertyExpr::is_static)
            && self.vbind.is_none()
            && self.v_html.is_none()
            && self.v_text.is_none()
            && self.directives.is_empty()
            && !self.distribution_attr
    }
}
