//! Attribute serialisation.
//!
//! Class and style values follow fixed output rules: class tokens are
//! escaped individually and space-joined without dedupe; style keys are
//! sorted alphabetically and emitted as `k: v;` declarations. Both the
//! static-folding pass and the renderer go through these functions so the
//! two paths cannot drift apart.

use vellum_expr::Value;

/// HTML-escape text and general attribute content (`& < > " '`).
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a style declaration value. Single quotes stay as written; they
/// are valid CSS (`font-family: 'Lato'`).
pub fn escape_style(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            _ => out.push(c),
        }
    }
    out
}

/// Collect class tokens from a value, HTML-escaped, in arrival order.
///
/// Strings contribute one token, sequences flatten recursively, mappings
/// contribute their truthy keys sorted alphabetically. Anything else is
/// ignored.
pub fn push_class_tokens(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Str(s) => out.push(escape_html(s)),
        Value::List(items) => {
            for item in items.iter() {
                push_class_tokens(item, out);
            }
        }
        Value::Map(map) => {
            let mut keys: Vec<&String> = map
                .iter()
                .filter(|(_, v)| v.truthy())
                .map(|(k, _)| k)
                .collect();
            keys.sort();
            for key in keys {
                out.push(escape_html(key));
            }
        }
        _ => {}
    }
}

/// Serialise a class value to the attribute text.
pub fn class_attr(value: &Value) -> String {
    let mut tokens = Vec::new();
    push_class_tokens(value, &mut tokens);
    tokens.join(" ")
}

/// The text of one style declaration value.
pub fn style_value_text(value: &Value) -> String {
    match value {
        Value::Str(s) => escape_style(s),
        other => escape_style(
            &serde_json::to_string(&other.to_json()).unwrap_or_default(),
        ),
    }
}

/// Serialise style declarations, keys sorted alphabetically, as
/// `k: v; k2: v2;`.
pub fn style_attr<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a Value)>,
{
    let mut pairs: Vec<(&str, &Value)> = entries.into_iter().collect();
    pairs.sort_by_key(|(k, _)| *k);
    let mut out = String::new();
    for (key, value) in pairs {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(key);
        out.push_str(": ");
        out.push_str(&style_value_text(value));
        out.push(';');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&#34;x&#34;&gt;&amp;&#39;");
    }

    #[test]
    fn test_escape_style_keeps_single_quotes() {
        assert_eq!(escape_style("'Lato', Helvetica"), "'Lato', Helvetica");
        assert_eq!(escape_style("a\"b"), "a&#34;b");
    }

    #[test]
    fn test_class_tokens_from_forms() {
        // String: one token, not split.
        assert_eq!(class_attr(&Value::Str("a b".into())), "a b");
        // List flattens recursively; map keys come truthy-only and sorted.
        let value = Value::list(vec![
            Value::map(vec![
                ("t", Value::Bool(true)),
                ("f", Value::Bool(false)),
            ]),
            Value::Str("d".into()),
            Value::Str("cuuu".into()),
        ]);
        assert_eq!(class_attr(&value), "t d cuuu");
    }

    #[test]
    fn test_class_tokens_no_dedupe() {
        let value = Value::list(vec![Value::Str("a".into()), Value::Str("a".into())]);
        assert_eq!(class_attr(&value), "a a");
    }

    #[test]
    fn test_style_attr_sorted() {
        let top = Value::Str("1px".into());
        let color = Value::Str("red".into());
        let entries = vec![("top", &top), ("color", &color)];
        assert_eq!(style_attr(entries), "color: red; top: 1px;");
    }

    #[test]
    fn test_style_non_string_value_serialises_as_json() {
        let n = Value::Int(3);
        assert_eq!(style_attr(vec![("z-index", &n)]), "z-index: 3;");
    }
}
