//! IR lowering.
//!
//! Turns the semantic tree into the statement IR. Fully-static subtrees
//! collapse into pre-serialised literals, static class/style props become
//! finished strings when no merge can ever be needed, `v-slot` elements
//! hoist to their enclosing component, and `v-if`/`v-for` wrap whatever
//! their element lowered to.

use crate::ast::*;
use crate::attrs;
use crate::error::CompileResult;
use crate::ir::*;
use crate::semantics::analyze;
use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use std::sync::Arc;
use vellum_expr::Value;
use vellum_markup::{is_void_element, parse_markup, NodeKind};

/// Tags rendered as plain HTML elements. Anything else (except the
/// built-ins `template`, `slot` and `parallel`) is a component lookup.
pub static DEFAULT_HTML_TAGS: Lazy<Arc<FxHashSet<SmolStr>>> = Lazy::new(|| {
    let tags = [
        "html", "head", "header", "footer", "body", "meta", "title", "div", "input", "p", "h1",
        "h2", "h3", "h4", "h5", "h6", "hr", "blockquote", "ul", "ol", "li", "span", "script",
        "link", "a", "object", "button", "img", "i", "b", "em", "strong", "center", "table",
        "tbody", "thead", "th", "tr", "td", "form", "label", "select", "option", "textarea",
        "nav", "section", "article", "pre", "code", "br",
    ];
    Arc::new(tags.into_iter().map(SmolStr::new_static).collect())
});

/// Compilation options.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// The known-HTML-tag set deciding element vs component.
    pub html_tags: Arc<FxHashSet<SmolStr>>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            html_tags: DEFAULT_HTML_TAGS.clone(),
        }
    }
}

/// A compiled template: the root statement plus the slots declared at the
/// template's top level (attachable to a component invocation by the
/// embedding API).
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    /// The executable statement tree.
    pub root: Arc<Statement>,
    /// Slots declared at the root.
    pub slots: SlotsC,
}

/// Compile template text into IR.
pub fn compile(source: &str, options: &CompileOptions) -> CompileResult<CompiledTemplate> {
    let markup = parse_markup(source);
    let template = analyze(&markup)?;
    let (statement, slots) = lower_element(&template, options)?;
    Ok(CompiledTemplate {
        root: Arc::new(statement),
        slots,
    })
}

/// Lower one semantic element to a statement, returning the slots it
/// declares for its enclosing component.
fn lower_element(
    el: &TemplateElement,
    options: &CompileOptions,
) -> CompileResult<(Statement, SlotsC)> {
    let mut slots = SlotsC::default();

    let mut statement = match el.kind {
        NodeKind::Root => {
            let mut group = GroupBuilder::new();
            for child in &el.children {
                let (s, child_slots) = lower_element(child, options)?;
                slots.merge(child_slots);
                group.push(s);
            }
            return Ok((group.finish(), slots));
        }
        NodeKind::Doctype | NodeKind::Comment => {
            return Ok((Statement::Literal(el.text.clone()), slots));
        }
        NodeKind::Text => {
            return Ok((lower_text(&el.text)?, slots));
        }
        NodeKind::Element => {
            if options.html_tags.contains(&el.tag) {
                self::lower_html_tag(el, options, &mut slots)?
            } else {
                self::lower_component(el, options, &mut slots)?
            }
        }
    };

    if let Some(v_if) = &el.v_if {
        let mut cases = vec![IfCase {
            condition: Some(v_if.condition.clone()),
            body: statement,
        }];
        for branch in &v_if.else_branches {
            let (body, branch_slots) = lower_element(&branch.element, options)?;
            slots.merge(branch_slots);
            cases.push(IfCase {
                condition: branch.condition.clone(),
                body,
            });
        }
        statement = Statement::If { cases };
    }

    if let Some(v_for) = &el.v_for {
        statement = Statement::For(ForStatement {
            item: v_for.item.clone(),
            index: v_for.index.clone(),
            iter: v_for.iter.clone(),
            body: Box::new(statement),
        });
    }

    if let Some(decl) = &el.v_slot {
        // The element is not emitted in place; it becomes a slot of the
        // enclosing component invocation.
        let slot = Arc::new(SlotC {
            name: decl.name.clone(),
            props_key: decl.props_key.clone(),
            body: statement,
        });
        if decl.name == "default" {
            slots.default = Some(slot);
        } else {
            slots.named.insert(decl.name.clone(), slot);
        }
        statement = Statement::Empty;
    }

    Ok((statement, slots))
}

fn lower_html_tag(
    el: &TemplateElement,
    options: &CompileOptions,
    slots: &mut SlotsC,
) -> CompileResult<Statement> {
    if el.is_fully_static() {
        return lower_static_tag(el, options, slots);
    }

    // Static class/style can pre-serialise only when nothing can ever be
    // merged into them.
    let static_ok = !el.distribution_attr && el.vbind.is_none() && el.directives.is_empty();
    let props = optimize_props(&el.props, static_ok);

    let vbind = if el.distribution_attr {
        Some(VBind::UseParentProps)
    } else {
        el.vbind.clone()
    };

    let children = lower_children(el, options, slots)?;
    let own_slots = default_slot_of(children);

    Ok(Statement::Element {
        tag: el.tag.clone(),
        desc: NodeDesc {
            props,
            vbind,
            directives: el.directives.clone(),
            slots: own_slots,
        },
    })
}

fn lower_component(
    el: &TemplateElement,
    options: &CompileOptions,
    slots: &mut SlotsC,
) -> CompileResult<Statement> {
    let children = lower_children(el, options, slots)?;

    // `<template>` without directives is transparent; its children render
    // in place and any hoisted slots keep bubbling upward.
    if el.tag == "template" && el.directives.is_empty() {
        return Ok(children);
    }

    let mut component_slots = std::mem::take(slots);
    if let Some(slot) = default_slot_of(children).default {
        component_slots.default = Some(slot);
    }

    let static_ok = !el.distribution_attr && el.vbind.is_none();
    Ok(Statement::Component {
        name: el.tag.clone(),
        desc: NodeDesc {
            props: optimize_props(&el.props, static_ok),
            vbind: el.vbind.clone(),
            directives: el.directives.clone(),
            slots: component_slots,
        },
    })
}

/// Lower the children of an element: `v-html` / `v-text` replace them
/// entirely, otherwise they group in order while their hoisted slots
/// accumulate into `slots`.
fn lower_children(
    el: &TemplateElement,
    options: &CompileOptions,
    slots: &mut SlotsC,
) -> CompileResult<Statement> {
    if let Some(expr) = &el.v_html {
        return Ok(Statement::Interp {
            expr: expr.clone(),
            escape: false,
        });
    }
    if let Some(expr) = &el.v_text {
        return Ok(Statement::Interp {
            expr: expr.clone(),
            escape: true,
        });
    }
    let mut group = GroupBuilder::new();
    for child in &el.children {
        let (s, child_slots) = lower_element(child, options)?;
        slots.merge(child_slots);
        group.push(s);
    }
    Ok(group.finish())
}

fn default_slot_of(children: Statement) -> SlotsC {
    let mut slots = SlotsC::default();
    if children != Statement::Empty {
        slots.default = Some(Arc::new(SlotC {
            name: SmolStr::new_static("default"),
            props_key: SmolStr::default(),
            body: children,
        }));
    }
    slots
}

/// Pre-serialise static class/style props where no merge is possible.
fn optimize_props(props: &[PropertyExpr], static_ok: bool) -> Vec<PropertyExpr> {
    let has_dynamic_class = props
        .iter()
        .any(|p| p.key == "class" && !p.is_static());
    let has_dynamic_style = props
        .iter()
        .any(|p| p.key == "style" && !p.is_static());

    props
        .iter()
        .map(|p| {
            if !static_ok || !p.is_static() {
                return p.clone();
            }
            let serialised = match (&p.form, p.key.as_str()) {
                (PropertyForm::Static(v), "class") if !has_dynamic_class => {
                    Some(attrs::class_attr(v))
                }
                (PropertyForm::Static(Value::Map(map)), "style") if !has_dynamic_style => {
                    Some(attrs::style_attr(
                        map.iter().map(|(k, v)| (k.as_str(), v)),
                    ))
                }
                _ => None,
            };
            match serialised {
                Some(text) => PropertyExpr {
                    key: p.key.clone(),
                    can_be_attr: p.can_be_attr,
                    form: PropertyForm::Static(Value::Str(text)),
                },
                None => p.clone(),
            }
        })
        .collect()
}

/// Fold a fully-static element into literals around its children.
fn lower_static_tag(
    el: &TemplateElement,
    options: &CompileOptions,
    slots: &mut SlotsC,
) -> CompileResult<Statement> {
    let mut group = GroupBuilder::new();

    let mut open = String::new();
    open.push('<');
    open.push_str(&el.tag);
    for prop in &el.props {
        open.push(' ');
        match &prop.form {
            PropertyForm::Empty => open.push_str(&prop.key),
            PropertyForm::Static(value) => {
                let text = match (prop.key.as_str(), value) {
                    ("class", v) => attrs::class_attr(v),
                    ("style", Value::Map(map)) => {
                        attrs::style_attr(map.iter().map(|(k, v)| (k.as_str(), v)))
                    }
                    (_, Value::Str(s)) => s.clone(),
                    (_, other) => other.render_string(),
                };
                if text.is_empty() {
                    open.push_str(&prop.key);
                } else {
                    open.push_str(&prop.key);
                    open.push_str("=\"");
                    open.push_str(&text);
                    open.push('"');
                }
            }
            PropertyForm::Dynamic(_) => unreachable!("fully-static element"),
        }
    }
    open.push('>');
    group.push_str(&open);

    for child in &el.children {
        let (s, child_slots) = lower_element(child, options)?;
        slots.merge(child_slots);
        group.push(s);
    }

    if !is_void_element(&el.tag) {
        group.push_str(&format!("</{}>", el.tag));
    }

    Ok(group.finish())
}

/// Split a text run on mustache interpolations.
fn lower_text(text: &str) -> CompileResult<Statement> {
    let mut group = GroupBuilder::new();

    if !text.contains("{{") {
        group.push_str(text);
        return Ok(group.finish());
    }

    for (index, chunk) in text.split("{{").enumerate() {
        if chunk.is_empty() {
            continue;
        }
        if index == 0 {
            group.push_str(chunk);
            continue;
        }
        match chunk.split_once("}}") {
            Some((code, rest)) if !rest.contains("}}") => {
                if !code.is_empty() {
                    let expr = vellum_expr::parse_expr(code)
                        .map_err(|e| crate::error::CompileError::from_expr(e, Default::default()))?;
                    group.push(Statement::Interp { expr, escape: true });
                }
                if !rest.is_empty() {
                    group.push_str(rest);
                }
            }
            // Unbalanced braces degrade to literal text.
            _ => group.push_str(chunk),
        }
    }

    Ok(group.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_expr::Expr;

    fn compile_src(src: &str) -> CompiledTemplate {
        compile(src, &CompileOptions::default()).unwrap()
    }

    // Most folding tests carry an `<hr>` sibling: a lone root element is
    // the distribution root and stays dynamic by design.

    #[test]
    fn test_fully_static_folds_to_literal() {
        let compiled = compile_src(r#"<div class="c"><span>Text</span></div><hr>"#);
        assert_eq!(
            *compiled.root,
            Statement::Literal(r#"<div class="c"><span>Text</span></div><hr>"#.into())
        );
    }

    #[test]
    fn test_void_element_has_no_close_tag() {
        let compiled = compile_src(r#"<head><meta charset="UTF-8"><br></head><hr>"#);
        assert_eq!(
            *compiled.root,
            Statement::Literal(r#"<head><meta charset="UTF-8"><br></head><hr>"#.into())
        );
    }

    #[test]
    fn test_static_style_sorted_in_fold() {
        let compiled = compile_src(r#"<div style="top: 1px; color: red">x</div><hr>"#);
        assert_eq!(
            *compiled.root,
            Statement::Literal(r#"<div style="color: red; top: 1px;">x</div><hr>"#.into())
        );
    }

    #[test]
    fn test_bare_attribute_folds_bare() {
        let compiled = compile_src(r#"<input disabled><hr>"#);
        assert_eq!(
            *compiled.root,
            Statement::Literal(r#"<input disabled><hr>"#.into())
        );
    }

    #[test]
    fn test_mustache_splits_text() {
        let compiled = compile_src(r#"<p>{{a}}:{{b.c}}</p><hr>"#);
        match &*compiled.root {
            Statement::Group(items) => {
                assert_eq!(items.len(), 5);
                assert_eq!(items[0], Statement::Literal("<p>".into()));
                assert!(matches!(items[1], Statement::Interp { escape: true, .. }));
                assert_eq!(items[2], Statement::Literal(":".into()));
                assert_eq!(items[4], Statement::Literal("</p><hr>".into()));
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_unbalanced_mustache_degrades_to_text() {
        let compiled = compile_src("<p>{{a</p><hr>");
        assert_eq!(*compiled.root, Statement::Literal("<p>a</p><hr>".into()));
    }

    #[test]
    fn test_dynamic_prop_prevents_fold() {
        let compiled = compile_src(r#"<div :id="id">x</div>"#);
        match &*compiled.root {
            Statement::Element { tag, desc } => {
                assert_eq!(tag, "div");
                assert_eq!(desc.props.len(), 1);
                assert!(desc.slots.default.is_some());
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_static_class_preserialises_without_dynamic_peer() {
        let compiled = compile_src(r#"<div class="a b" :id="id">x</div><hr>"#);
        let Statement::Group(items) = &*compiled.root else {
            panic!("expected group, got {:?}", compiled.root);
        };
        match &items[0] {
            Statement::Element { desc, .. } => match &desc.props[0].form {
                PropertyForm::Static(Value::Str(s)) => assert_eq!(s, "a b"),
                other => panic!("expected pre-serialised class, got {:?}", other),
            },
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_static_class_stays_structured_next_to_dynamic_class() {
        let compiled = compile_src(r#"<div class="a" :class="cls">x</div>"#);
        match &*compiled.root {
            Statement::Element { desc, .. } => {
                assert!(matches!(
                    desc.props[0].form,
                    PropertyForm::Static(Value::List(_))
                ));
                assert!(matches!(desc.props[1].form, PropertyForm::Dynamic(_)));
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_if_chain_lowers_to_single_if() {
        let compiled = compile_src(
            r#"<hr><ul><li v-if="a">A</li><li v-else-if="b">B</li><li v-else>C</li></ul>"#,
        );
        match &*compiled.root {
            Statement::Group(items) => {
                assert_eq!(items[0], Statement::Literal("<hr><ul>".into()));
                match &items[1] {
                    Statement::If { cases } => {
                        assert_eq!(cases.len(), 3);
                        assert!(cases[0].condition.is_some());
                        assert!(cases[2].condition.is_none());
                        assert_eq!(cases[0].body, Statement::Literal("<li>A</li>".into()));
                    }
                    other => panic!("expected if, got {:?}", other),
                }
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_for_wraps_if_on_same_element() {
        let compiled =
            compile_src(r#"<hr><ul><li v-for="(x, i) in xs" v-if="x.show">{{i}}</li></ul>"#);
        match &*compiled.root {
            Statement::Group(items) => match &items[1] {
                Statement::For(spec) => {
                    assert_eq!(spec.item, "x");
                    assert_eq!(spec.index, "i");
                    assert!(matches!(*spec.body, Statement::If { .. }));
                }
                other => panic!("expected for, got {:?}", other),
            },
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_tag_becomes_component() {
        let compiled = compile_src(r#"<Infos :infos="infos"></Infos>"#);
        match &*compiled.root {
            Statement::Component { name, desc } => {
                assert_eq!(name, "Infos");
                assert_eq!(desc.props.len(), 1);
            }
            other => panic!("expected component, got {:?}", other),
        }
    }

    #[test]
    fn test_template_without_directives_is_transparent() {
        let compiled = compile_src(r#"<div :id="i"><template v-for="x in xs">{{x}}</template></div>"#);
        match &*compiled.root {
            Statement::Element { desc, .. } => {
                let body = &desc.slots.default.as_ref().unwrap().body;
                assert!(matches!(body, Statement::For(_)));
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_v_slot_hoists_to_component() {
        let compiled =
            compile_src(r#"<Comp><h1 v-slot:title="p">{{p.title}}</h1>fallback</Comp>"#);
        match &*compiled.root {
            Statement::Component { desc, .. } => {
                assert!(desc.slots.named.contains_key("title"));
                let title = &desc.slots.named["title"];
                assert_eq!(title.props_key, "p");
                // The hoisted element left nothing behind; the default slot
                // holds only the remaining text.
                let default = desc.slots.default.as_ref().unwrap();
                assert_eq!(default.body, Statement::Literal("fallback".into()));
            }
            other => panic!("expected component, got {:?}", other),
        }
    }

    #[test]
    fn test_v_slot_hoists_through_html_tags() {
        let compiled = compile_src(
            r#"<Comp><div :id="i"><h1 v-slot:deep>x</h1></div></Comp>"#,
        );
        match &*compiled.root {
            Statement::Component { desc, .. } => {
                assert!(desc.slots.named.contains_key("deep"));
            }
            other => panic!("expected component, got {:?}", other),
        }
    }

    #[test]
    fn test_distribution_root_gets_use_parent_props() {
        let compiled = compile_src(r#"<div class="a">x</div>"#);
        match &*compiled.root {
            Statement::Element { desc, .. } => {
                assert_eq!(desc.vbind, Some(VBind::UseParentProps));
                // Distribution disables class pre-serialisation.
                assert!(matches!(
                    desc.props[0].form,
                    PropertyForm::Static(Value::List(_))
                ));
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_v_html_replaces_children() {
        let compiled = compile_src(r#"<div v-html="html">ignored {{x}}</div>"#);
        match &*compiled.root {
            Statement::Element { desc, .. } => {
                let body = &desc.slots.default.as_ref().unwrap().body;
                assert_eq!(
                    *body,
                    Statement::Interp {
                        expr: Expr::Ident("html".into()),
                        escape: false
                    }
                );
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_root_slots_surface_in_compiled_template() {
        let compiled = compile_src(r#"<h1 v-slot:title>T</h1>"#);
        assert_eq!(*compiled.root, Statement::Empty);
        assert!(compiled.slots.named.contains_key("title"));
    }

    #[test]
    fn test_pretty_printout_shape() {
        let compiled = compile_src(
            r#"<div :id="id"><ul><li v-for="x in xs" v-if="x.ok">{{x.v}}</li></ul></div><hr>"#,
        );
        let pretty = compiled.root.pretty();
        assert!(pretty.contains("Element(<div>"));
        assert!(pretty.contains("For((x, $index)"));
        assert!(pretty.contains("If("));
        assert!(pretty.contains("Interp("));
    }

    #[test]
    fn test_doctype_and_comment_lower_to_literals() {
        let compiled = compile_src("<!DOCTYPE html><!-- keep -->");
        assert_eq!(
            *compiled.root,
            Statement::Literal("<!DOCTYPE html><!-- keep -->".into())
        );
    }
}
