//! Semantic pass: attributes become directives.
//!
//! Reclassifies every attribute on every markup node into static props,
//! dynamic props, `v-bind` spreads, structural directives and user
//! directives, groups `v-if` chains across siblings, and marks the
//! distribution root.

use crate::ast::*;
use crate::error::{CompileError, CompileErrorCode, CompileResult};
use smol_str::SmolStr;
use vellum_expr::{parse_expr, Expr, Value};
use vellum_markup::{MarkupAttr, MarkupNode, NodeKind};
use vellum_span::Span;

/// Analyze a markup tree into the semantic template AST.
pub fn analyze(root: &MarkupNode) -> CompileResult<TemplateElement> {
    let mut element = TemplateElement::new(root.kind);
    element.children = analyze_siblings(&root.children)?;
    element.span = root.span;

    // Root-arity rule: a lone element child re-binds the component's
    // inbound props onto itself at render time.
    if root.kind == NodeKind::Root {
        let non_comment: Vec<usize> = element
            .children
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind != NodeKind::Comment)
            .map(|(i, _)| i)
            .collect();
        if let [only] = non_comment[..] {
            if element.children[only].kind == NodeKind::Element {
                element.children[only].distribution_attr = true;
            }
        }
    }

    Ok(element)
}

/// The else-chain role an element plays among its siblings.
enum ChainRole {
    None,
    If,
    ElseIf(Expr),
    Else,
}

fn analyze_siblings(nodes: &[MarkupNode]) -> CompileResult<Vec<TemplateElement>> {
    let mut out: Vec<TemplateElement> = Vec::with_capacity(nodes.len());
    // Index into `out` of the open v-if, when the chain is still live.
    let mut open_if: Option<usize> = None;

    for node in nodes {
        let (element, role) = analyze_node(node)?;

        match role {
            ChainRole::ElseIf(condition) => {
                let Some(anchor) = open_if else {
                    return Err(CompileError::orphan_else("v-else-if", node.span));
                };
                let v_if = out[anchor].v_if.as_mut().expect("anchor has v-if");
                v_if.else_branches.push(ElseBranch {
                    condition: Some(condition),
                    element,
                });
            }
            ChainRole::Else => {
                let Some(anchor) = open_if.take() else {
                    return Err(CompileError::orphan_else("v-else", node.span));
                };
                let v_if = out[anchor].v_if.as_mut().expect("anchor has v-if");
                v_if.else_branches.push(ElseBranch {
                    condition: None,
                    element,
                });
            }
            ChainRole::If => {
                out.push(element);
                open_if = Some(out.len() - 1);
            }
            ChainRole::None => {
                // Comments pass through a chain; anything else breaks it.
                if element.kind != NodeKind::Comment {
                    open_if = None;
                }
                out.push(element);
            }
        }
    }

    Ok(out)
}

fn analyze_node(node: &MarkupNode) -> CompileResult<(TemplateElement, ChainRole)> {
    let mut element = TemplateElement::new(node.kind);
    element.span = node.span;

    match node.kind {
        NodeKind::Text | NodeKind::Comment | NodeKind::Doctype => {
            element.text = node.text.clone();
            return Ok((element, ChainRole::None));
        }
        NodeKind::Root | NodeKind::Element => {}
    }

    element.tag = node.tag.clone();
    let mut role = ChainRole::None;

    for attr in &node.attrs {
        role = classify_attr(attr, &mut element, role)?;
    }

    element.children = analyze_siblings(&node.children)?;
    Ok((element, role))
}

fn classify_attr(
    attr: &MarkupAttr,
    element: &mut TemplateElement,
    role: ChainRole,
) -> CompileResult<ChainRole> {
    let name = attr.name.as_str();
    let value = attr.value.as_deref();
    let span = attr.value_span;

    // `v-bind:x` / `:x` — dynamic prop.
    if let Some(key) = name
        .strip_prefix("v-bind:")
        .or_else(|| name.strip_prefix(':'))
    {
        element.props.push(PropertyExpr {
            key: SmolStr::new(key),
            can_be_attr: true,
            form: match value {
                Some(code) if !code.trim().is_empty() => {
                    PropertyForm::Dynamic(parse_value_expr(code, span)?)
                }
                _ => PropertyForm::Empty,
            },
        });
        return Ok(role);
    }

    match name {
        "v-bind" => {
            if let Some(code) = value {
                if !code.trim().is_empty() {
                    element.vbind = Some(VBind::Expr(parse_value_expr(code, span)?));
                }
            }
            return Ok(role);
        }
        "v-if" => {
            let condition = parse_value_expr(value.unwrap_or_default(), span)?;
            element.v_if = Some(VIf {
                condition,
                else_branches: Vec::new(),
            });
            return Ok(ChainRole::If);
        }
        "v-else-if" => {
            let condition = parse_value_expr(value.unwrap_or_default(), span)?;
            return Ok(ChainRole::ElseIf(condition));
        }
        "v-else" => {
            return Ok(ChainRole::Else);
        }
        "v-for" => {
            element.v_for = Some(parse_v_for(value.unwrap_or_default(), span)?);
            return Ok(role);
        }
        "v-html" => {
            element.v_html = Some(parse_value_expr(value.unwrap_or_default(), span)?);
            return Ok(role);
        }
        "v-text" => {
            element.v_text = Some(parse_value_expr(value.unwrap_or_default(), span)?);
            return Ok(role);
        }
        "v-slot" => {
            element.v_slot = Some(slot_decl("default", value));
            return Ok(role);
        }
        _ => {}
    }

    // `v-slot:name` and the `#name` shorthand.
    if let Some(slot_name) = name
        .strip_prefix("v-slot:")
        .or_else(|| name.strip_prefix('#'))
    {
        if slot_name.is_empty() {
            return Err(CompileError::new(
                "slot declaration is missing a name",
                span,
                CompileErrorCode::InvalidSlot,
            ));
        }
        element.v_slot = Some(slot_decl(slot_name, value));
        return Ok(role);
    }

    // Remaining `v-…` names are user directives, `v-name` or `v-name:arg`.
    if let Some(rest) = name.strip_prefix("v-") {
        let (dir_name, arg) = match rest.split_once(':') {
            Some((n, a)) => (n, Some(SmolStr::new(a))),
            None => (rest, None),
        };
        let value_expr = match value {
            Some(code) if !code.trim().is_empty() => parse_value_expr(code, span)?,
            _ => Expr::Null,
        };
        element.directives.push(DirectiveIR {
            name: SmolStr::new(dir_name),
            arg,
            value: value_expr,
        });
        return Ok(role);
    }

    // Static class/style get structured values so merging stays possible.
    if name == "class" {
        let tokens: Vec<Value> = value
            .unwrap_or_default()
            .split(' ')
            .filter(|t| !t.is_empty())
            .map(Value::from)
            .collect();
        element.props.push(PropertyExpr {
            key: SmolStr::new_static("class"),
            can_be_attr: true,
            form: PropertyForm::Static(Value::list(tokens)),
        });
        return Ok(role);
    }
    if name == "style" {
        let mut entries: Vec<(String, Value)> = Vec::new();
        for declaration in value.unwrap_or_default().split(';') {
            let declaration = declaration.trim();
            let Some((key, val)) = declaration.split_once(':') else {
                continue;
            };
            entries.push((key.trim().to_string(), Value::from(val.trim())));
        }
        element.props.push(PropertyExpr {
            key: SmolStr::new_static("style"),
            can_be_attr: true,
            form: PropertyForm::Static(Value::map(entries)),
        });
        return Ok(role);
    }

    // Plain static attribute.
    element.props.push(PropertyExpr {
        key: attr.name.clone(),
        can_be_attr: true,
        form: match value {
            Some(v) if !v.is_empty() => PropertyForm::Static(Value::from(v)),
            _ => PropertyForm::Empty,
        },
    });
    Ok(role)
}

fn slot_decl(name: &str, props_key: Option<&str>) -> SlotDecl {
    let key = match props_key {
        Some(k) if !k.is_empty() => k,
        // The slot body can always reach its props somewhere.
        _ => "slotProps",
    };
    SlotDecl {
        name: SmolStr::new(name),
        props_key: SmolStr::new(key),
    }
}

fn parse_value_expr(code: &str, span: Span) -> CompileResult<Expr> {
    parse_expr(code).map_err(|e| CompileError::from_expr(e, span))
}

/// Parse a `v-for` value: `item in arr`, `(item) in arr` or
/// `(item, index) in arr`.
fn parse_v_for(code: &str, span: Span) -> CompileResult<ForSpec> {
    let Some((left, right)) = code.split_once(" in ") else {
        return Err(CompileError::invalid_v_for("missing ` in `", span));
    };

    let iter = parse_value_expr(right.trim(), span)?;

    let left = left.trim().trim_matches(['(', ')']).trim();
    let (item, index) = match left.split_once(',') {
        Some((item, index)) => (item.trim(), index.trim()),
        None => (left, "$index"),
    };
    if item.is_empty() || index.is_empty() {
        return Err(CompileError::invalid_v_for("empty binding name", span));
    }

    Ok(ForSpec {
        item: SmolStr::new(item),
        index: SmolStr::new(index),
        iter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_markup::parse_markup;

    fn analyze_src(src: &str) -> TemplateElement {
        analyze(&parse_markup(src)).unwrap()
    }

    #[test]
    fn test_static_and_dynamic_props() {
        let root = analyze_src(r#"<div id="abc" :data-id="id"></div>"#);
        let div = &root.children[0];
        assert_eq!(div.props.len(), 2);
        assert!(matches!(div.props[0].form, PropertyForm::Static(_)));
        assert!(matches!(div.props[1].form, PropertyForm::Dynamic(_)));
        assert_eq!(div.props[1].key, "data-id");
    }

    #[test]
    fn test_static_class_tokens() {
        let root = analyze_src(r#"<div class="a  b"></div>"#);
        let div = &root.children[0];
        match &div.props[0].form {
            PropertyForm::Static(Value::List(tokens)) => {
                assert_eq!(tokens.len(), 2);
                assert_eq!(tokens[0], Value::Str("a".into()));
            }
            other => panic!("expected static class list, got {:?}", other),
        }
    }

    #[test]
    fn test_static_style_mapping() {
        let root = analyze_src(r#"<div style="top: 10px; color: red"></div>"#);
        let div = &root.children[0];
        match &div.props[0].form {
            PropertyForm::Static(value) => {
                assert_eq!(value.get_key("top"), Some(Value::Str("10px".into())));
                assert_eq!(value.get_key("color"), Some(Value::Str("red".into())));
            }
            other => panic!("expected static style map, got {:?}", other),
        }
    }

    #[test]
    fn test_v_for_forms() {
        let root = analyze_src(r#"<li v-for="item in items"></li>"#);
        let spec = root.children[0].v_for.as_ref().unwrap();
        assert_eq!(spec.item, "item");
        assert_eq!(spec.index, "$index");

        let root = analyze_src(r#"<li v-for="(item, i) in items"></li>"#);
        let spec = root.children[0].v_for.as_ref().unwrap();
        assert_eq!(spec.item, "item");
        assert_eq!(spec.index, "i");
    }

    #[test]
    fn test_v_for_requires_in() {
        let result = analyze(&parse_markup(r#"<li v-for="items"></li>"#));
        let err = result.unwrap_err();
        assert_eq!(err.code, CompileErrorCode::InvalidVFor);
    }

    #[test]
    fn test_if_chain_groups_siblings() {
        let root = analyze_src(
            r#"<ul>
                <li v-if="a">A</li>
                <li v-else-if="b">B</li>
                <li v-else>C</li>
            </ul>"#,
        );
        let ul = &root.children[0];
        assert_eq!(ul.children.len(), 1);
        let v_if = ul.children[0].v_if.as_ref().unwrap();
        assert_eq!(v_if.else_branches.len(), 2);
        assert!(v_if.else_branches[0].condition.is_some());
        assert!(v_if.else_branches[1].condition.is_none());
    }

    #[test]
    fn test_comment_does_not_break_chain() {
        let root = analyze_src(r#"<div><p v-if="a">A</p><!-- note --><p v-else>B</p></div>"#);
        let div = &root.children[0];
        // The if-element and the comment survive; the else is folded in.
        assert_eq!(div.children.len(), 2);
        let v_if = div.children[0].v_if.as_ref().unwrap();
        assert_eq!(v_if.else_branches.len(), 1);
    }

    #[test]
    fn test_orphan_else_is_an_error() {
        let err = analyze(&parse_markup(r#"<div><p v-else>B</p></div>"#)).unwrap_err();
        assert_eq!(err.code, CompileErrorCode::OrphanElse);

        let err = analyze(&parse_markup(
            r#"<div><p v-if="a">A</p><p>break</p><p v-else>B</p></div>"#,
        ))
        .unwrap_err();
        assert_eq!(err.code, CompileErrorCode::OrphanElse);
    }

    #[test]
    fn test_slot_declarations() {
        let root = analyze_src(r#"<h1 v-slot:title="p">x</h1>"#);
        let slot = root.children[0].v_slot.as_ref().unwrap();
        assert_eq!(slot.name, "title");
        assert_eq!(slot.props_key, "p");

        let root = analyze_src(r#"<h1 #title>x</h1>"#);
        let slot = root.children[0].v_slot.as_ref().unwrap();
        assert_eq!(slot.name, "title");
        assert_eq!(slot.props_key, "slotProps");
    }

    #[test]
    fn test_user_directives_strip_prefix() {
        let root = analyze_src(r#"<div v-animate="{iteration: 20}" v-set:key="1"></div>"#);
        let div = &root.children[0];
        assert_eq!(div.directives.len(), 2);
        assert_eq!(div.directives[0].name, "animate");
        assert_eq!(div.directives[0].arg, None);
        assert_eq!(div.directives[1].name, "set");
        assert_eq!(div.directives[1].arg.as_deref(), Some("key"));
    }

    #[test]
    fn test_v_bind_spread() {
        let root = analyze_src(r#"<div v-bind="$props"></div>"#);
        assert!(matches!(
            root.children[0].vbind,
            Some(VBind::Expr(Expr::Ident(_)))
        ));
    }

    #[test]
    fn test_distribution_root_marking() {
        let root = analyze_src(r#"<div class="a"></div>"#);
        assert!(root.children[0].distribution_attr);

        let root = analyze_src(r#"<div></div><div></div>"#);
        assert!(!root.children[0].distribution_attr);
        assert!(!root.children[1].distribution_attr);

        // A comment does not break the arity rule.
        let root = analyze_src(r#"<!-- c --><div></div>"#);
        assert!(root.children[1].distribution_attr);
    }

    #[test]
    fn test_bad_expression_surfaces_span() {
        let src = r#"<div :id="a +"></div>"#;
        let err = analyze(&parse_markup(src)).unwrap_err();
        assert_eq!(err.code, CompileErrorCode::InvalidExpression);
        assert_eq!(&src[err.span.to_range()], "a +");
    }
}
