//! Runtime props.
//!
//! An ordered key→value collection destined to become HTML attributes or
//! component inputs. First insertion fixes a key's position; re-inserting
//! `class` accumulates, re-inserting `style` merges per CSS key, and any
//! other key overwrites in place.

use indexmap::IndexMap;
use smol_str::SmolStr;
use vellum_expr::{MapValue, Value};

/// Whether a prop may be written out as an HTML attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrWay {
    /// Known at compile time to be an attribute.
    CanBe,
    /// Never an attribute.
    CanNotBe,
    /// Undecidable at compile time; the engine policy rules at render time.
    MayBe,
}

/// One prop entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PropSlot {
    /// Attribute eligibility.
    pub attr_way: AttrWay,
    /// The value.
    pub value: Value,
}

/// The ordered prop collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    entries: IndexMap<SmolStr, PropSlot>,
}

impl Props {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no props are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of props.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Look up a prop value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(|slot| &slot.value)
    }

    /// Iterate entries in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &PropSlot)> {
        self.entries.iter()
    }

    /// Append a prop with an explicit attribute way.
    ///
    /// A repeated `class` accumulates both values, a repeated `style`
    /// merges mappings with the newcomer winning per CSS key, and any
    /// other repeat overwrites the value while keeping the original
    /// position and way.
    pub fn append_with_way(&mut self, key: impl Into<SmolStr>, way: AttrWay, value: Value) {
        let key = key.into();
        match self.entries.get_mut(&key) {
            None => {
                self.entries.insert(key, PropSlot {
                    attr_way: way,
                    value,
                });
            }
            Some(slot) => {
                slot.value = match key.as_str() {
                    "class" => merge_class(std::mem::take(&mut slot.value), value),
                    "style" => merge_style(&slot.value, &value),
                    _ => value,
                };
            }
        }
    }

    /// Append a prop whose attribute eligibility the engine policy decides.
    pub fn append(&mut self, key: impl Into<SmolStr>, value: Value) {
        self.append_with_way(key, AttrWay::MayBe, value);
    }

    /// Append a definite attribute.
    pub fn append_attr(&mut self, key: impl Into<SmolStr>, value: impl Into<String>) {
        self.append_with_way(key, AttrWay::CanBe, Value::Str(value.into()));
    }

    /// Append class tokens.
    pub fn append_class<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let value = Value::list(tokens.into_iter().map(|t| Value::Str(t.into())).collect());
        self.append_with_way("class", AttrWay::CanBe, value);
    }

    /// Append style declarations.
    pub fn append_style<I, K, V>(&mut self, declarations: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let value = Value::map(
            declarations
                .into_iter()
                .map(|(k, v)| (k.into(), Value::Str(v.into()))),
        );
        self.append_with_way("style", AttrWay::CanBe, value);
    }

    /// Append every entry of a mapping, in its insertion order, with the
    /// policy-decided way.
    pub fn append_map(&mut self, map: &MapValue) {
        for (key, value) in map.iter() {
            self.append_with_way(SmolStr::new(key), AttrWay::MayBe, value.clone());
        }
    }

    /// Append every entry of another prop collection, keeping the
    /// recorded ways.
    pub fn append_props(&mut self, other: &Props) {
        for (key, slot) in other.iter() {
            self.append_with_way(key.clone(), slot.attr_way, slot.value.clone());
        }
    }

    /// Snapshot the entries as a mapping value.
    pub fn to_map_value(&self, detached: bool) -> MapValue {
        let entries: IndexMap<String, Value> = self
            .entries
            .iter()
            .map(|(k, slot)| (k.to_string(), slot.value.clone()))
            .collect();
        if detached {
            MapValue::new_detached(entries)
        } else {
            MapValue::new(entries)
        }
    }
}

fn merge_class(existing: Value, incoming: Value) -> Value {
    // Nesting is fine: class serialisation flattens recursively.
    Value::list(vec![existing, incoming])
}

fn merge_style(existing: &Value, incoming: &Value) -> Value {
    let mut merged: IndexMap<String, Value> = IndexMap::new();
    if let Value::Map(map) = existing {
        for (k, v) in map.iter() {
            merged.insert(k.clone(), v.clone());
        }
    }
    if let Value::Map(map) = incoming {
        for (k, v) in map.iter() {
            merged.insert(k.clone(), v.clone());
        }
    }
    Value::map(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_compiler::attrs::{class_attr, style_attr};

    #[test]
    fn test_insertion_order_preserved() {
        let mut props = Props::new();
        props.append("b", Value::Int(1));
        props.append("a", Value::Int(2));
        props.append("b", Value::Int(3));
        let keys: Vec<&str> = props.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(props.get("b"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_class_accumulates() {
        let mut props = Props::new();
        props.append_class(["a"]);
        props.append_with_way("class", AttrWay::CanBe, Value::Str("b".into()));
        assert_eq!(class_attr(props.get("class").unwrap()), "a b");
    }

    #[test]
    fn test_style_merges_last_write_wins() {
        let mut props = Props::new();
        props.append_style([("top", "1px"), ("color", "blue")]);
        props.append_style([("color", "red")]);
        let style = props.get("style").unwrap();
        match style {
            Value::Map(map) => {
                let rendered = style_attr(map.iter().map(|(k, v)| (k.as_str(), v)));
                assert_eq!(rendered, "color: red; top: 1px;");
            }
            other => panic!("expected style map, got {:?}", other),
        }
    }

    #[test]
    fn test_overwrite_keeps_first_way() {
        let mut props = Props::new();
        props.append_attr("id", "a");
        props.append("id", Value::Str("b".into()));
        let (_, slot) = props.iter().next().unwrap();
        assert_eq!(slot.attr_way, AttrWay::CanBe);
        assert_eq!(slot.value, Value::Str("b".into()));
    }

    #[test]
    fn test_append_map_is_may_be() {
        let mut props = Props::new();
        let map = MapValue::new(
            [("data-x".to_string(), Value::Int(1))].into_iter().collect(),
        );
        props.append_map(&map);
        let (_, slot) = props.iter().next().unwrap();
        assert_eq!(slot.attr_way, AttrWay::MayBe);
    }
}
