//! The statement IR.
//!
//! A compiled template is one [`Statement`] tree. The IR is immutable
//! after lowering and shared between renders through `Arc`; rendering
//! never mutates it.

use crate::ast::{DirectiveIR, PropertyExpr, VBind};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::sync::Arc;
use vellum_expr::Expr;

/// An executable IR node.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Precomputed HTML, written through verbatim.
    Literal(String),
    /// An interpolation: `{{expr}}` / `v-text` (escaped) or `v-html` (raw).
    Interp {
        /// The expression to evaluate.
        expr: Expr,
        /// Whether the rendered text is HTML-escaped.
        escape: bool,
    },
    /// A built-in HTML element.
    Element {
        /// The tag name.
        tag: SmolStr,
        /// Props, v-bind, directives and slots.
        desc: NodeDesc,
    },
    /// A component invocation, resolved by name at render time.
    Component {
        /// The component name as written.
        name: SmolStr,
        /// Props, v-bind, directives and slots.
        desc: NodeDesc,
    },
    /// A `v-if` chain. The final case may carry no condition (`v-else`).
    If {
        /// Cases in source order.
        cases: Vec<IfCase>,
    },
    /// A `v-for` loop.
    For(ForStatement),
    /// Sequential statements. Construction guarantees no adjacent
    /// literals and at least two entries.
    Group(Vec<Statement>),
    /// Nothing.
    Empty,
}

/// One case of an [`Statement::If`].
#[derive(Debug, Clone, PartialEq)]
pub struct IfCase {
    /// The case condition; `None` for `v-else`.
    pub condition: Option<Expr>,
    /// The case body.
    pub body: Statement,
}

/// A lowered `v-for`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    /// Binding name for the item.
    pub item: SmolStr,
    /// Binding name for the index.
    pub index: SmolStr,
    /// The iterable expression.
    pub iter: Expr,
    /// The loop body.
    pub body: Box<Statement>,
}

/// Everything attached to an element or component invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeDesc {
    /// Props in source order.
    pub props: Vec<PropertyExpr>,
    /// `v-bind` spread, if any.
    pub vbind: Option<VBind>,
    /// User directives.
    pub directives: Vec<DirectiveIR>,
    /// Slots passed to this node; the default slot carries the children.
    pub slots: SlotsC,
}

/// A compiled slot body.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotC {
    /// The slot name.
    pub name: SmolStr,
    /// The binding key slot props are exposed under when invoked.
    pub props_key: SmolStr,
    /// The slot body.
    pub body: Statement,
}

/// The compile-time slot set of a node: the default slot plus named slots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SlotsC {
    /// The default slot.
    pub default: Option<Arc<SlotC>>,
    /// Named slots declared with `v-slot:name`.
    pub named: FxHashMap<SmolStr, Arc<SlotC>>,
}

impl SlotsC {
    /// Whether no slots are present.
    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.named.is_empty()
    }

    /// Fold another slot set into this one; later declarations win.
    pub fn merge(&mut self, other: SlotsC) {
        if other.default.is_some() {
            self.default = other.default;
        }
        for (name, slot) in other.named {
            self.named.insert(name, slot);
        }
    }

    /// Look up a slot by name; `"default"` resolves the default slot.
    pub fn get(&self, name: &str) -> Option<&Arc<SlotC>> {
        if name == "default" {
            self.default.as_ref()
        } else {
            self.named.get(name)
        }
    }
}

impl Statement {
    /// Multi-line debug printout of a statement tree.
    pub fn pretty(&self) -> String {
        let mut out = String::new();
        self.pretty_into(&mut out, 0);
        out
    }

    fn pretty_into(&self, out: &mut String, level: usize) {
        use std::fmt::Write;

        let pad = "  ".repeat(level);
        match self {
            Statement::Literal(s) => {
                let _ = writeln!(out, "{}Literal({:?})", pad, s);
            }
            Statement::Interp { expr, escape } => {
                let _ = writeln!(out, "{}Interp({:?}, escape={})", pad, expr, escape);
            }
            Statement::Element { tag, desc } => {
                let _ = writeln!(out, "{}Element(<{}>, props={})", pad, tag, desc.props.len());
                if let Some(slot) = &desc.slots.default {
                    slot.body.pretty_into(out, level + 1);
                }
            }
            Statement::Component { name, desc } => {
                let _ = writeln!(out, "{}Component(<{}>, props={})", pad, name, desc.props.len());
                if let Some(slot) = &desc.slots.default {
                    slot.body.pretty_into(out, level + 1);
                }
                for (slot_name, slot) in &desc.slots.named {
                    let _ = writeln!(out, "{}  Slot({})", pad, slot_name);
                    slot.body.pretty_into(out, level + 2);
                }
            }
            Statement::If { cases } => {
                for (i, case) in cases.iter().enumerate() {
                    match (&case.condition, i) {
                        (Some(cond), 0) => {
                            let _ = writeln!(out, "{}If({:?})", pad, cond);
                        }
                        (Some(cond), _) => {
                            let _ = writeln!(out, "{}ElseIf({:?})", pad, cond);
                        }
                        (None, _) => {
                            let _ = writeln!(out, "{}Else", pad);
                        }
                    }
                    case.body.pretty_into(out, level + 1);
                }
            }
            Statement::For(spec) => {
                let _ = writeln!(
                    out,
                    "{}For(({}, {}) in {:?})",
                    pad, spec.item, spec.index, spec.iter
                );
                spec.body.pretty_into(out, level + 1);
            }
            Statement::Group(items) => {
                for item in items {
                    item.pretty_into(out, level);
                }
            }
            Statement::Empty => {
                let _ = writeln!(out, "{}Empty", pad);
            }
        }
    }
}

/// Builds a [`Statement`] sequence, coalescing adjacent literals,
/// flattening nested groups and dropping empties.
#[derive(Debug, Default)]
pub struct GroupBuilder {
    items: Vec<Statement>,
    buffer: String,
}

impl GroupBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a statement.
    pub fn push(&mut self, statement: Statement) {
        match statement {
            Statement::Empty => {}
            Statement::Literal(s) => self.buffer.push_str(&s),
            Statement::Group(items) => {
                for item in items {
                    self.push(item);
                }
            }
            other => {
                self.flush();
                self.items.push(other);
            }
        }
    }

    /// Append a literal string.
    pub fn push_str(&mut self, s: &str) {
        self.buffer.push_str(s);
    }

    fn flush(&mut self) {
        if !self.buffer.is_empty() {
            self.items
                .push(Statement::Literal(std::mem::take(&mut self.buffer)));
        }
    }

    /// Finish the sequence into a single statement.
    pub fn finish(mut self) -> Statement {
        self.flush();
        match self.items.len() {
            0 => Statement::Empty,
            1 => self.items.pop().expect("len checked"),
            _ => Statement::Group(self.items),
        }
    }
}
