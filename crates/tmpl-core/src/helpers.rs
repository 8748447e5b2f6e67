//! Free-form templates with helper functions, rendered by handlebars.
//!
//! Output is never HTML-escaped; documents are markdown or plain text.

use crate::context::display_value;
use crate::error::{Result, TemplateError};
use chrono::{DateTime, NaiveDate, Utc};
use handlebars::{
    handlebars_helper, Context, Handlebars, Helper, HelperResult, JsonRender, Output,
    RenderContext, RenderError, RenderErrorReason,
};
use serde_json::Value;

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

pub struct HelperRenderer {
    handlebars: Handlebars<'static>,
}

impl HelperRenderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars.register_helper("date", Box::new(date_helper));
        handlebars.register_helper("capitalize", Box::new(capitalize_helper));
        handlebars.register_helper("upper", Box::new(upper_helper));
        handlebars.register_helper("lower", Box::new(lower_helper));
        handlebars.register_helper("join", Box::new(join_helper));
        handlebars.register_helper("equals", Box::new(equals_helper));
        handlebars.register_helper("default", Box::new(default_helper));
        handlebars.register_helper("json", Box::new(json_helper));

        Self { handlebars }
    }

    pub fn render_str(&self, template: &str, context: &Value) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .map_err(|e| TemplateError::Helper(e.to_string()))
    }
}

impl Default for HelperRenderer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn param_str<'a>(h: &'a Helper, idx: usize) -> &'a str {
    h.param(idx).and_then(|v| v.value().as_str()).unwrap_or("")
}

/// `{{date value "fmt"}}`: `value` is RFC 3339, `YYYY-MM-DD` or `"now"`.
fn date_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let raw = param_str(h, 0);
    let fmt = h
        .param(1)
        .and_then(|v| v.value().as_str())
        .unwrap_or(DEFAULT_DATE_FORMAT);

    let rendered = if raw.is_empty() || raw == "now" {
        Utc::now().format(fmt).to_string()
    } else if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        dt.format(fmt).to_string()
    } else if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        d.format(fmt).to_string()
    } else {
        return Err(RenderError::from(RenderErrorReason::Other(format!(
            "date: cannot parse '{raw}'"
        ))));
    };
    out.write(&rendered)?;
    Ok(())
}

fn capitalize_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let mut chars = param_str(h, 0).chars();
    if let Some(first) = chars.next() {
        let capitalized: String = first.to_uppercase().chain(chars).collect();
        out.write(&capitalized)?;
    }
    Ok(())
}

fn upper_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&param_str(h, 0).to_uppercase())?;
    Ok(())
}

fn lower_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&param_str(h, 0).to_lowercase())?;
    Ok(())
}

/// `{{join items ", "}}`; the separator defaults to `", "`.
fn join_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let sep = h.param(1).and_then(|v| v.value().as_str()).unwrap_or(", ");
    if let Some(items) = h.param(0).and_then(|v| v.value().as_array()) {
        let joined = items.iter().map(display_value).collect::<Vec<_>>().join(sep);
        out.write(&joined)?;
    }
    Ok(())
}

// Returns a boolean, so it works as a subexpression: `{{#if (equals a b)}}`.
handlebars_helper!(equals_helper: |a: Json, b: Json| a == b);

fn default_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let value = h.param(0).map(|v| v.value()).filter(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    });
    match value {
        Some(v) => out.write(&v.render())?,
        None => {
            if let Some(fallback) = h.param(1) {
                out.write(&fallback.value().render())?;
            }
        }
    }
    Ok(())
}

fn json_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    if let Some(v) = h.param(0) {
        let json = serde_json::to_string(v.value())
            .map_err(|e| RenderErrorReason::Other(format!("json: {e}")))?;
        out.write(&json)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
