//! Runtime slots and statement frames.
//!
//! A [`Frame`] is the per-statement execution context: the slots passed
//! in, the inbound props, the active scope and the caller's frame. A
//! [`Slot`] pairs a compiled slot body with the frame it was declared in;
//! slot bodies always evaluate against their declarer's scope, never the
//! invoker's.

use crate::props::Props;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::sync::Arc;
use vellum_compiler::{SlotC, SlotsC};
use vellum_expr::Scope;

/// The execution context of one statement.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Slots available to this statement (a component's inbound slots).
    pub slots: Option<Arc<Slots>>,
    /// Inbound props of the enclosing component invocation.
    pub props: Option<Arc<Props>>,
    /// The active scope.
    pub scope: Arc<Scope>,
    /// The caller's frame; only component invocations link one.
    pub parent: Option<Arc<Frame>>,
}

impl Frame {
    /// Create a bare frame over a scope.
    pub fn with_scope(scope: Arc<Scope>) -> Arc<Frame> {
        Arc::new(Frame {
            slots: None,
            props: None,
            scope,
            parent: None,
        })
    }
}

/// A compiled slot bound to its declaration frame.
#[derive(Debug, Clone)]
pub struct Slot {
    /// The compiled slot.
    pub def: Arc<SlotC>,
    /// The frame active where the slot template was written.
    pub declarer: Arc<Frame>,
}

/// The runtime slot set of a node.
#[derive(Debug, Clone, Default)]
pub struct Slots {
    /// The default slot.
    pub default: Option<Slot>,
    /// Named slots.
    pub named: FxHashMap<SmolStr, Slot>,
}

impl Slots {
    /// Look up a slot by name; `"default"` resolves the default slot.
    pub fn get(&self, name: &str) -> Option<&Slot> {
        if name == "default" {
            self.default.as_ref()
        } else {
            self.named.get(name)
        }
    }
}

/// Bind a compile-time slot set to the frame declaring it. Returns `None`
/// when there are no slots at all.
pub fn wrap_slots(slots: &SlotsC, declarer: &Arc<Frame>) -> Option<Arc<Slots>> {
    if slots.is_empty() {
        return None;
    }
    let wrap = |def: &Arc<SlotC>| Slot {
        def: def.clone(),
        declarer: declarer.clone(),
    };
    Some(Arc::new(Slots {
        default: slots.default.as_ref().map(wrap),
        named: slots
            .named
            .iter()
            .map(|(name, def)| (name.clone(), wrap(def)))
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_compiler::Statement;

    #[test]
    fn test_wrap_slots_binds_declarer() {
        let mut slots_c = SlotsC::default();
        slots_c.default = Some(Arc::new(SlotC {
            name: "default".into(),
            props_key: SmolStr::default(),
            body: Statement::Literal("x".into()),
        }));
        let frame = Frame::with_scope(Scope::new());
        let slots = wrap_slots(&slots_c, &frame).unwrap();
        let slot = slots.get("default").unwrap();
        assert!(Arc::ptr_eq(&slot.declarer, &frame));
        assert!(slots.get("missing").is_none());
    }

    #[test]
    fn test_empty_slots_wrap_to_none() {
        let frame = Frame::with_scope(Scope::new());
        assert!(wrap_slots(&SlotsC::default(), &frame).is_none());
    }
}
