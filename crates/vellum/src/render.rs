//! The renderer.
//!
//! Walks the statement IR against a frame chain and streams HTML into a
//! writer. Elements without directives take a fast path that never
//! materialises a props container; everything else builds `Props`, lets
//! directives rewrite the node, and emits from the merged result.

use crate::error::RenderError;
use crate::props::{AttrWay, Props};
use crate::slots::{wrap_slots, Frame, Slot, Slots};
use crate::writer::{ListWriter, OutputSpan, Writer};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::sync::Arc;
use tokio::sync::oneshot;
use vellum_compiler::attrs;
use vellum_compiler::{DirectiveIR, NodeDesc, PropertyExpr, PropertyForm, Statement, VBind};
use vellum_expr::{eval, Expr, FnCtx, Scope, Store, Value};
use vellum_markup::is_void_element;

use crate::cancel::CancelToken;

/// A registered directive callback.
pub type DirectiveFn =
    Arc<dyn Fn(&FnCtx<'_>, &mut NodeData, &DirectiveBinding) + Send + Sync>;

/// The engine policy deciding `MayBe` attribute emission.
pub type AttrPolicy = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// The binding a directive receives.
#[derive(Debug, Clone)]
pub struct DirectiveBinding {
    /// The evaluated directive expression.
    pub value: Value,
    /// The directive argument (`v-name:arg`).
    pub arg: Option<SmolStr>,
    /// The directive name.
    pub name: SmolStr,
}

/// The mutable node view handed to directives: a directive may rewrite
/// the props and replace the slots.
#[derive(Debug)]
pub struct NodeData {
    /// The node's props, already merged from v-bind and the template.
    pub props: Option<Props>,
    /// The node's slots.
    pub slots: Option<Arc<Slots>>,
}

/// Everything a render shares across its statements. Cheap to clone into
/// parallel tasks; registry tables are engine-owned and immutable.
pub struct RenderState {
    /// Registered components.
    pub components: Arc<FxHashMap<SmolStr, Arc<Statement>>>,
    /// Registered directives.
    pub directives: Arc<FxHashMap<SmolStr, DirectiveFn>>,
    /// The `MayBe` attribute policy.
    pub can_be_attr: AttrPolicy,
    /// The per-render global scope (prototype plus render globals).
    pub global: Arc<Scope>,
    /// The per-render shared store.
    pub store: Arc<dyn Store>,
    /// The cancellation handle.
    pub cancel: CancelToken,
    /// The runtime `<parallel>` tasks spawn onto.
    pub runtime: tokio::runtime::Handle,
}

type RenderResult<T> = Result<T, RenderError>;

/// The shared runtime backing `<parallel>` regions across all engines.
static PARALLEL_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .max(2);
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .thread_name("vellum-parallel")
        .enable_all()
        .build()
        .expect("failed to build the parallel render runtime")
});

/// Handle to the shared parallel runtime.
pub(crate) fn runtime_handle() -> tokio::runtime::Handle {
    PARALLEL_RUNTIME.handle().clone()
}

fn eval_or_null(expr: &Expr, scope: &Arc<Scope>, store: &dyn Store) -> Value {
    let ctx = FnCtx::new(scope, store);
    match eval(expr, &ctx) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "expression evaluation failed");
            Value::Null
        }
    }
}

/// Execute a statement against the writer.
pub fn render_statement(
    statement: &Statement,
    ctx: &Arc<RenderState>,
    w: &mut ListWriter,
    frame: &Arc<Frame>,
) -> RenderResult<()> {
    match statement {
        Statement::Empty => Ok(()),
        Statement::Literal(s) => {
            w.write_str(s);
            Ok(())
        }
        Statement::Interp { expr, escape } => {
            let value = eval_or_null(expr, &frame.scope, ctx.store.as_ref());
            let text = value.render_string();
            if *escape {
                w.write_str(&attrs::escape_html(&text));
            } else {
                w.write_str(&text);
            }
            Ok(())
        }
        Statement::Group(items) => {
            for item in items {
                ctx.cancel.check()?;
                render_statement(item, ctx, w, frame)?;
            }
            Ok(())
        }
        Statement::If { cases } => {
            for case in cases {
                let taken = match &case.condition {
                    Some(cond) => {
                        eval_or_null(cond, &frame.scope, ctx.store.as_ref()).truthy()
                    }
                    None => true,
                };
                if taken {
                    return render_statement(&case.body, ctx, w, frame);
                }
            }
            Ok(())
        }
        Statement::For(spec) => {
            let iterable = eval_or_null(&spec.iter, &frame.scope, ctx.store.as_ref());
            let Value::List(items) = iterable else {
                // Anything not a sequence iterates zero times.
                return Ok(());
            };
            for (index, item) in items.iter().enumerate() {
                ctx.cancel.check()?;
                let scope = frame.scope.extend([
                    (spec.item.to_string(), item.clone()),
                    (spec.index.to_string(), Value::Int(index as i64)),
                ]);
                let loop_frame = Arc::new(Frame {
                    slots: frame.slots.clone(),
                    props: frame.props.clone(),
                    scope,
                    parent: frame.parent.clone(),
                });
                render_statement(&spec.body, ctx, w, &loop_frame)?;
            }
            Ok(())
        }
        Statement::Element { tag, desc } => render_tag(tag, desc, ctx, w, frame),
        Statement::Component { name, desc } => {
            let mut props = Props::new();
            apply_vbind(desc.vbind.as_ref(), &mut props, ctx, frame);
            exec_props(&desc.props, &mut props, ctx, frame);
            let slots = wrap_slots(&desc.slots, frame);
            invoke_component(name, props, slots, &desc.directives, ctx, w, frame)
        }
    }
}

/// Render a slot body against its declarer's environment, optionally
/// exposing invoker-supplied slot props under the slot's binding key.
pub fn render_slot(
    slot: &Slot,
    ctx: &Arc<RenderState>,
    w: &mut ListWriter,
    slot_props: Option<&Arc<Props>>,
) -> RenderResult<()> {
    let declarer = &slot.declarer;
    let scope = match (slot_props, slot.def.props_key.as_str()) {
        (Some(props), key) if !key.is_empty() => declarer.scope.extend([(
            key.to_string(),
            Value::Map(Arc::new(props.to_map_value(false))),
        )]),
        _ => declarer.scope.clone(),
    };
    let frame = Arc::new(Frame {
        slots: declarer.slots.clone(),
        props: None,
        scope,
        parent: None,
    });
    render_statement(&slot.def.body, ctx, w, &frame)
}

// ---------------------------------------------------------------------------
// HTML elements

fn render_tag(
    tag: &SmolStr,
    desc: &NodeDesc,
    ctx: &Arc<RenderState>,
    w: &mut ListWriter,
    frame: &Arc<Frame>,
) -> RenderResult<()> {
    w.write_str("<");
    w.write_str(tag);

    if desc.directives.is_empty() {
        render_attrs_streaming(desc, ctx, w, frame);
        w.write_str(">");
        // Children execute directly in the current frame.
        if let Some(slot) = &desc.slots.default {
            render_statement(&slot.body, ctx, w, frame)?;
        }
    } else {
        let mut props = Props::new();
        apply_vbind(desc.vbind.as_ref(), &mut props, ctx, frame);
        exec_props(&desc.props, &mut props, ctx, frame);
        let slots = wrap_slots(&desc.slots, frame);
        let mut data = NodeData {
            props: Some(props),
            slots,
        };
        run_directives(&desc.directives, ctx, frame, &mut data);

        if let Some(props) = &data.props {
            emit_props(props, ctx, w);
        }
        w.write_str(">");
        if let Some(slots) = &data.slots {
            if let Some(slot) = &slots.default {
                render_slot(slot, ctx, w, None)?;
            }
        }
    }

    if !is_void_element(tag) {
        w.write_str("</");
        w.write_str(tag);
        w.write_str(">");
    }
    Ok(())
}

fn apply_vbind(
    vbind: Option<&VBind>,
    props: &mut Props,
    ctx: &Arc<RenderState>,
    frame: &Arc<Frame>,
) {
    let Some(vbind) = vbind else {
        return;
    };
    let value = match vbind {
        VBind::UseParentProps => frame.scope.get("$props"),
        VBind::Expr(expr) => eval_or_null(expr, &frame.scope, ctx.store.as_ref()),
    };
    match value {
        Value::Null => {}
        Value::Map(map) => props.append_map(&map),
        other => {
            tracing::warn!(value = ?other, "v-bind expects a mapping, ignoring");
        }
    }
}

fn exec_props(
    compiled: &[PropertyExpr],
    props: &mut Props,
    ctx: &Arc<RenderState>,
    frame: &Arc<Frame>,
) {
    for p in compiled {
        let way = if p.can_be_attr {
            AttrWay::CanBe
        } else {
            AttrWay::CanNotBe
        };
        let value = match &p.form {
            PropertyForm::Static(v) => v.clone(),
            PropertyForm::Dynamic(expr) => {
                eval_or_null(expr, &frame.scope, ctx.store.as_ref())
            }
            PropertyForm::Empty => Value::Null,
        };
        props.append_with_way(p.key.clone(), way, value);
    }
}

fn run_directives(
    directives: &[DirectiveIR],
    ctx: &Arc<RenderState>,
    frame: &Arc<Frame>,
    data: &mut NodeData,
) {
    for directive in directives {
        let value = eval_or_null(&directive.value, &frame.scope, ctx.store.as_ref());
        let Some(callback) = ctx.directives.get(&directive.name) else {
            tracing::debug!(directive = %directive.name, "directive not registered, skipped");
            continue;
        };
        let fn_ctx = FnCtx::new(&frame.scope, ctx.store.as_ref());
        callback(
            &fn_ctx,
            data,
            &DirectiveBinding {
                value,
                arg: directive.arg.clone(),
                name: directive.name.clone(),
            },
        );
    }
}

/// What an attribute key resolved to while streaming.
enum AttrAcc {
    /// Finished text; `None` renders the bare key.
    Text(Option<String>),
    /// Class tokens accumulate separately.
    Class,
    /// Style declarations accumulate separately.
    Style,
}

fn attr_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Str(s) => Some(s.clone()),
        other => Some(attrs::escape_html(&other.render_string())),
    }
}

/// The no-directive fast path: attributes stream without a props
/// container. Class and style buffer until every source has run because
/// they merge; everything else keeps its first-arrival position.
fn render_attrs_streaming(
    desc: &NodeDesc,
    ctx: &Arc<RenderState>,
    w: &mut ListWriter,
    frame: &Arc<Frame>,
) {
    let mut order: IndexMap<SmolStr, AttrAcc> = IndexMap::new();
    let mut class_tokens: Vec<String> = Vec::new();
    let mut style: IndexMap<String, Value> = IndexMap::new();

    // v-bind output lands first, then the element's own props.
    if let Some(vbind) = &desc.vbind {
        let value = match vbind {
            VBind::UseParentProps => frame.scope.get("$props"),
            VBind::Expr(expr) => eval_or_null(expr, &frame.scope, ctx.store.as_ref()),
        };
        match value {
            Value::Null => {}
            Value::Map(map) => {
                for (key, v) in map.iter() {
                    match key.as_str() {
                        "class" => {
                            attrs::push_class_tokens(v, &mut class_tokens);
                            order
                                .entry(SmolStr::new_static("class"))
                                .or_insert(AttrAcc::Class);
                        }
                        "style" => {
                            if let Value::Map(incoming) = v {
                                for (sk, sv) in incoming.iter() {
                                    style.insert(sk.clone(), sv.clone());
                                }
                            }
                            order
                                .entry(SmolStr::new_static("style"))
                                .or_insert(AttrAcc::Style);
                        }
                        _ => {
                            if (ctx.can_be_attr)(key.as_str()) {
                                let text = attr_text(v);
                                set_attr(&mut order, SmolStr::new(key), text);
                            }
                        }
                    }
                }
            }
            other => {
                tracing::warn!(value = ?other, "v-bind expects a mapping, ignoring");
            }
        }
    }

    for p in &desc.props {
        match p.key.as_str() {
            "class" => match &p.form {
                // Pre-serialised by the compiler; nothing can merge in.
                PropertyForm::Static(Value::Str(pre)) => {
                    set_attr(&mut order, p.key.clone(), Some(pre.clone()));
                }
                form => {
                    let value = eval_prop_form(form, ctx, frame);
                    attrs::push_class_tokens(&value, &mut class_tokens);
                    order.entry(p.key.clone()).or_insert(AttrAcc::Class);
                }
            },
            "style" => match &p.form {
                PropertyForm::Static(Value::Str(pre)) => {
                    set_attr(&mut order, p.key.clone(), Some(pre.clone()));
                }
                form => {
                    let value = eval_prop_form(form, ctx, frame);
                    if let Value::Map(incoming) = value {
                        for (sk, sv) in incoming.iter() {
                            style.insert(sk.clone(), sv.clone());
                        }
                    }
                    order.entry(p.key.clone()).or_insert(AttrAcc::Style);
                }
            },
            _ => {
                let value = eval_prop_form(&p.form, ctx, frame);
                set_attr(&mut order, p.key.clone(), attr_text(&value));
            }
        }
    }

    for (key, acc) in &order {
        match acc {
            AttrAcc::Text(text) => {
                w.write_str(" ");
                w.write_str(key);
                match text {
                    Some(v) if !v.is_empty() => {
                        w.write_str("=\"");
                        w.write_str(v);
                        w.write_str("\"");
                    }
                    _ => {}
                }
            }
            AttrAcc::Class => {
                w.write_str(" class=\"");
                w.write_str(&class_tokens.join(" "));
                w.write_str("\"");
            }
            AttrAcc::Style => {
                w.write_str(" style=\"");
                w.write_str(&attrs::style_attr(
                    style.iter().map(|(k, v)| (k.as_str(), v)),
                ));
                w.write_str("\"");
            }
        }
    }
}

fn eval_prop_form(form: &PropertyForm, ctx: &Arc<RenderState>, frame: &Arc<Frame>) -> Value {
    match form {
        PropertyForm::Static(v) => v.clone(),
        PropertyForm::Dynamic(expr) => eval_or_null(expr, &frame.scope, ctx.store.as_ref()),
        PropertyForm::Empty => Value::Null,
    }
}

fn set_attr(order: &mut IndexMap<SmolStr, AttrAcc>, key: SmolStr, text: Option<String>) {
    // Overwrite keeps the first-insertion position.
    if let Some(slot) = order.get_mut(&key) {
        *slot = AttrAcc::Text(text);
    } else {
        order.insert(key, AttrAcc::Text(text));
    }
}

/// Emit attributes from a merged props container (the directive path).
fn emit_props(props: &Props, ctx: &Arc<RenderState>, w: &mut ListWriter) {
    for (key, slot) in props.iter() {
        match slot.attr_way {
            AttrWay::CanNotBe => continue,
            AttrWay::MayBe => {
                // class and style always emit; other ambiguous keys ask
                // the engine policy.
                let key = key.as_str();
                if key != "class" && key != "style" && !(ctx.can_be_attr)(key) {
                    continue;
                }
            }
            AttrWay::CanBe => {}
        }

        if key.as_str() == "class" {
            if !slot.value.is_null() {
                w.write_str(" class=\"");
                w.write_str(&attrs::class_attr(&slot.value));
                w.write_str("\"");
            }
        } else if key.as_str() == "style" {
            if !slot.value.is_null() {
                w.write_str(" style=\"");
                match &slot.value {
                    Value::Map(map) => w.write_str(&attrs::style_attr(
                        map.iter().map(|(k, v)| (k.as_str(), v)),
                    )),
                    Value::Str(s) => w.write_str(s),
                    _ => {}
                }
                w.write_str("\"");
            }
        } else {
            w.write_str(" ");
            w.write_str(key);
            let text = attr_text(&slot.value);
            if let Some(v) = text {
                if !v.is_empty() {
                    w.write_str("=\"");
                    w.write_str(&v);
                    w.write_str("\"");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Components

enum Target {
    Template,
    SlotOutlet,
    Parallel,
    User(Arc<Statement>),
}

/// Invoke a component by name with already-computed props and slots.
///
/// Built-ins resolve before the user table; an unknown name renders an
/// inline placeholder element instead of failing.
pub fn invoke_component(
    name: &str,
    props: Props,
    slots: Option<Arc<Slots>>,
    directives: &[DirectiveIR],
    ctx: &Arc<RenderState>,
    w: &mut ListWriter,
    frame: &Arc<Frame>,
) -> RenderResult<()> {
    let target = match name {
        "template" => Target::Template,
        "slot" => Target::SlotOutlet,
        "parallel" => Target::Parallel,
        _ => match ctx.components.get(name) {
            Some(statement) => Target::User(statement.clone()),
            None => {
                w.write_str("<");
                w.write_str(name);
                w.write_str(" data-err=\"not found component\">");
                if let Some(slots) = &slots {
                    if let Some(slot) = &slots.default {
                        render_slot(slot, ctx, w, None)?;
                    }
                }
                w.write_str("</");
                w.write_str(name);
                w.write_str(">");
                return Ok(());
            }
        },
    };

    let mut data = NodeData {
        props: Some(props),
        slots,
    };
    run_directives(directives, ctx, frame, &mut data);

    match target {
        Target::User(statement) => {
            let invocation = component_frame(data, ctx, frame);
            render_statement(&statement, ctx, w, &invocation)
        }
        Target::Template => {
            if let Some(slots) = &data.slots {
                if let Some(slot) = &slots.default {
                    render_slot(slot, ctx, w, None)?;
                }
            }
            Ok(())
        }
        Target::SlotOutlet => render_slot_outlet(data, ctx, w, frame),
        Target::Parallel => {
            render_parallel(data, ctx, w);
            Ok(())
        }
    }
}

/// Build the fresh frame a component body runs in: a new scope off the
/// render global holding the resolved props, with `$props` bound to the
/// same mapping marked non-serialisable.
fn component_frame(data: NodeData, ctx: &Arc<RenderState>, caller: &Arc<Frame>) -> Arc<Frame> {
    let props = data.props.unwrap_or_default();
    let map = props.to_map_value(false);
    let scope = ctx
        .global
        .extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
    scope.set("$props", Value::Map(Arc::new(props.to_map_value(true))));
    Arc::new(Frame {
        slots: data.slots,
        props: Some(Arc::new(props)),
        scope,
        parent: Some(caller.clone()),
    })
}

/// `<slot name="…" :k="v">`: invoke the matching slot passed to the
/// enclosing component, or fall back to the outlet's own children.
fn render_slot_outlet(
    data: NodeData,
    ctx: &Arc<RenderState>,
    w: &mut ListWriter,
    frame: &Arc<Frame>,
) -> RenderResult<()> {
    let slot_name = data
        .props
        .as_ref()
        .and_then(|p| p.get("name"))
        .and_then(|v| match v {
            Value::Str(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_else(|| "default".to_string());

    let found = frame
        .slots
        .as_ref()
        .and_then(|slots| slots.get(&slot_name))
        .cloned();

    match found {
        Some(slot) => {
            let slot_props = Arc::new(data.props.unwrap_or_default());
            render_slot(&slot, ctx, w, Some(&slot_props))
        }
        None => {
            // Fallback content.
            if let Some(slots) = &data.slots {
                if let Some(fallback) = &slots.default {
                    render_slot(fallback, ctx, w, None)?;
                }
            }
            Ok(())
        }
    }
}

/// `<parallel>`: render the body on the shared runtime and splice the
/// result in through a deferred span. Sibling regions overlap; output
/// order stays the source order.
fn render_parallel(data: NodeData, ctx: &Arc<RenderState>, w: &mut ListWriter) {
    let Some(slot) = data.slots.as_ref().and_then(|s| s.default.clone()) else {
        return;
    };
    let (tx, rx) = oneshot::channel();
    let state = ctx.clone();
    ctx.runtime.spawn(async move {
        let mut task_writer = ListWriter::new();
        let out = match render_slot(&slot, &state, &mut task_writer, None) {
            // Awaiting nested spans here keeps runtime workers unblocked.
            Ok(()) => task_writer.result_async().await,
            Err(e) => format!("err: {}", e),
        };
        let _ = tx.send(out);
    });
    w.write_span(OutputSpan::Pending(rx));
}
