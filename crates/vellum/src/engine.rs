//! The engine façade.
//!
//! One [`Engine`] holds the compiled component registry, the directive
//! table, the prototype scope of globals and functions, and the
//! attribute policy. It is set up once and then shared freely: all
//! registries sit behind `Arc` and renders never mutate them.

use crate::cancel::CancelToken;
use crate::error::Error;
use crate::props::Props;
use crate::render::{
    invoke_component, render_statement, runtime_handle, AttrPolicy, DirectiveBinding,
    DirectiveFn, NodeData, RenderState,
};
use crate::slots::{wrap_slots, Frame};
use crate::writer::ListWriter;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use std::sync::Arc;
use vellum_compiler::{CompileOptions, CompiledTemplate, SlotsC, Statement};
use vellum_expr::{FnCtx, MapStore, Scope, Store, Value};

/// The template engine. One long-lived instance per application;
/// registration happens at setup, rendering is side-effect free and safe
/// to run concurrently.
pub struct Engine {
    components: Arc<FxHashMap<SmolStr, Arc<Statement>>>,
    directives: Arc<FxHashMap<SmolStr, DirectiveFn>>,
    prototype: Arc<Scope>,
    can_be_attr: AttrPolicy,
    compile_options: CompileOptions,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an engine with the default known-HTML-tag set and the
    /// default attribute policy (`id` and `data-*`).
    pub fn new() -> Self {
        Self {
            components: Arc::new(FxHashMap::default()),
            directives: Arc::new(FxHashMap::default()),
            prototype: Scope::new(),
            can_be_attr: Arc::new(default_attr_policy),
            compile_options: CompileOptions::default(),
        }
    }

    /// Replace the known-HTML-tag set deciding element vs component.
    pub fn set_html_tags(&mut self, tags: FxHashSet<SmolStr>) {
        self.compile_options.html_tags = Arc::new(tags);
    }

    /// Compile template text without registering it.
    pub fn compile(&self, source: &str) -> Result<CompiledTemplate, Error> {
        Ok(vellum_compiler::compile(source, &self.compile_options)?)
    }

    /// Compile and register a component. On error nothing is registered.
    pub fn register_component(&mut self, name: &str, source: &str) -> Result<(), Error> {
        let compiled = self.compile(source)?;
        self.register_component_statement(name, compiled.root);
        Ok(())
    }

    /// Register a precompiled component statement.
    pub fn register_component_statement(&mut self, name: &str, statement: Arc<Statement>) {
        Arc::make_mut(&mut self.components).insert(SmolStr::new(name), statement);
    }

    /// Register a directive callback.
    pub fn register_directive<F>(&mut self, name: &str, callback: F)
    where
        F: Fn(&FnCtx<'_>, &mut NodeData, &DirectiveBinding) + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.directives).insert(SmolStr::new(name), Arc::new(callback));
    }

    /// Set a global value, visible in every component.
    pub fn set_global(&mut self, key: &str, value: Value) {
        self.prototype.set(key, value);
    }

    /// Register a global function callable from expressions.
    pub fn set_function<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&FnCtx<'_>, &[Value]) -> Value + Send + Sync + 'static,
    {
        self.prototype.set(name, Value::func(f));
    }

    /// Configure which ambiguous prop keys become attributes.
    pub fn set_can_be_attr<F>(&mut self, policy: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.can_be_attr = Arc::new(policy);
    }

    fn render_state(&self, options: &RenderOptions) -> Arc<RenderState> {
        let global = if options.global.is_empty() {
            Scope::with_parent(self.prototype.clone())
        } else {
            self.prototype.extend(
                options
                    .global
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            )
        };
        Arc::new(RenderState {
            components: self.components.clone(),
            directives: self.directives.clone(),
            can_be_attr: self.can_be_attr.clone(),
            global,
            store: options
                .store
                .clone()
                .unwrap_or_else(|| Arc::new(MapStore::new())),
            cancel: options.cancel.clone(),
            runtime: runtime_handle(),
        })
    }

    /// Render a registered component. All props flow into the component
    /// (the `v-bind="$props"` semantics); an unregistered name renders
    /// the inline placeholder element.
    pub fn render_component(&self, name: &str, options: &RenderOptions) -> Result<String, Error> {
        let state = self.render_state(options);
        let mut writer = ListWriter::new();
        let root = Frame::with_scope(state.global.clone());
        let slots = options
            .slots
            .as_ref()
            .and_then(|slots| wrap_slots(slots, &root));
        invoke_component(
            name,
            options.props.clone(),
            slots,
            &[],
            &state,
            &mut writer,
            &root,
        )?;
        Ok(writer.result(&state.cancel)?)
    }

    /// Compile a template ad hoc and render it. Props are bound into the
    /// root scope and exposed as `$props`.
    pub fn render_template(&self, source: &str, options: &RenderOptions) -> Result<String, Error> {
        let compiled = self.compile(source)?;
        let state = self.render_state(options);
        let mut writer = ListWriter::new();

        let props = options.props.clone();
        let map = props.to_map_value(false);
        let scope = state
            .global
            .extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
        scope.set("$props", Value::Map(Arc::new(props.to_map_value(true))));

        let declarer = Frame::with_scope(state.global.clone());
        let frame = Arc::new(Frame {
            slots: options
                .slots
                .as_ref()
                .and_then(|slots| wrap_slots(slots, &declarer)),
            props: Some(Arc::new(props)),
            scope,
            parent: None,
        });

        render_statement(&compiled.root, &state, &mut writer, &frame)?;
        Ok(writer.result(&state.cancel)?)
    }
}

/// The default `MayBe` policy: `id` and `data-*` keys become attributes.
fn default_attr_policy(key: &str) -> bool {
    key == "id" || key.starts_with("data-")
}

/// Per-render parameters.
#[derive(Default)]
pub struct RenderOptions {
    /// Props handed to the component or template.
    pub props: Props,
    /// Render-scoped globals layered over the engine prototype.
    pub global: Vec<(String, Value)>,
    /// The shared store; defaults to a fresh [`MapStore`].
    pub store: Option<Arc<dyn Store>>,
    /// Cancellation handle.
    pub cancel: CancelToken,
    /// Externally-compiled slots attached to the invocation.
    pub slots: Option<SlotsC>,
}

impl RenderOptions {
    /// Options with the given props.
    pub fn with_props(props: Props) -> Self {
        Self {
            props,
            ..Default::default()
        }
    }
}
