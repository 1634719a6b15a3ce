//! vellum — server-side rendering for a Vue-like template dialect.
//!
//! Templates compile once into an immutable statement IR; renders walk
//! the IR against caller-supplied props, globals and a shared store, and
//! stream HTML into a span-aware writer. `<parallel>` regions render
//! concurrently while output order stays the source order.
//!
//! ```
//! use vellum::{Engine, Props, RenderOptions, Value};
//!
//! let mut engine = Engine::new();
//! engine
//!     .register_component("app", r#"<html :lang="lang"><body>{{title}}</body></html>"#)
//!     .unwrap();
//!
//! let mut props = Props::new();
//! props.append("lang", Value::from("en"));
//! props.append("title", Value::from("hi"));
//!
//! let html = engine
//!     .render_component("app", &RenderOptions::with_props(props))
//!     .unwrap();
//! assert_eq!(html, r#"<html lang="en"><body>hi</body></html>"#);
//! ```

pub mod cancel;
pub mod engine;
pub mod error;
pub mod props;
pub mod render;
pub mod slots;
pub mod writer;

pub use cancel::CancelToken;
pub use engine::{Engine, RenderOptions};
pub use error::{Error, RenderError};
pub use props::{AttrWay, PropSlot, Props};
pub use render::{DirectiveBinding, DirectiveFn, NodeData, RenderState};
pub use slots::{Frame, Slot, Slots};
pub use writer::{ListWriter, OutputSpan, Writer};

pub use vellum_compiler::{
    CompileError, CompileErrorCode, CompileOptions, CompiledTemplate, SlotC, SlotsC, Statement,
};
pub use vellum_expr::{FnCtx, Function, MapStore, MapValue, PropAccess, Scope, Store, Value};
