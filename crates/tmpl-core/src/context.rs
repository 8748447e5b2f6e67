//! Render-context helpers: dotted-path lookup, string coercion and
//! `{{path}}` placeholder substitution.

use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\{\{([^{}]+)\}\}").unwrap())
}

/// Resolve `a.b.0.c` against the context. Numeric segments index arrays.
pub fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    path.split('.').try_fold(context, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// String form of a context value as it appears in rendered output.
///
/// Strings are taken verbatim, whole floats drop their fraction, `null` is
/// empty, arrays are comma-joined and objects are compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Replace every `{{path}}` with the value found at `path`. Placeholders whose
/// path does not resolve are left untouched. Substitution is single-pass:
/// inserted values are never rescanned.
pub fn substitute(template: &str, context: &Value) -> String {
    placeholder_re()
        .replace_all(template, |caps: &Captures| {
            match lookup(context, &caps[1]) {
                Some(value) => display_value(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_walks_objects_and_arrays() {
        let ctx = json!({"project": {"name": "Atlas", "owners": ["ana", "bo"]}});
        assert_eq!(lookup(&ctx, "project.name"), Some(&json!("Atlas")));
        assert_eq!(lookup(&ctx, "project.owners.1"), Some(&json!("bo")));
        assert_eq!(lookup(&ctx, "project.missing"), None);
        assert_eq!(lookup(&ctx, "project.name.deeper"), None);
        assert_eq!(lookup(&ctx, ""), None);
    }

    #[test]
    fn display_value_coercions() {
        assert_eq!(display_value(&json!("x")), "x");
        assert_eq!(display_value(&json!(3)), "3");
        assert_eq!(display_value(&json!(2.0)), "2");
        assert_eq!(display_value(&json!(2.5)), "2.5");
        assert_eq!(display_value(&json!(true)), "true");
        assert_eq!(display_value(&Value::Null), "");
        assert_eq!(display_value(&json!(["a", 1])), "a,1");
        assert_eq!(display_value(&json!({"k": 1})), r#"{"k":1}"#);
    }

    #[test]
    fn substitute_leaves_unresolved_placeholders() {
        let ctx = json!({"user": {"name": "Ana"}, "count": 2});
        let out = substitute("Hi {{user.name}}, {{count}} new, {{ missing.path }}", &ctx);
        assert_eq!(out, "Hi Ana, 2 new, {{ missing.path }}");
    }

    #[test]
    fn substitute_is_single_pass() {
        let ctx = json!({"a": "{{b}}", "b": "boom"});
        assert_eq!(substitute("{{a}}", &ctx), "{{b}}");
    }

    #[test]
    fn substitute_trims_inner_whitespace() {
        let ctx = json!({"name": "Atlas"});
        assert_eq!(substitute("{{ name }}", &ctx), "Atlas");
    }
}
