//! Built-in tag renderer
//!
//! Passes template text through while substituting `{{ NAME }}` macro
//! references and evaluating `{% chan %}` / `{% chanspan %}` value tags
//! against the shared cache. Deliberately not a general templating
//! language: no control flow, just substitution and value hooks.
//!
//! Tag semantics:
//!
//! - `{% chan "CHANNEL" opt=val ... %}` renders the channel's current
//!   value inline. Values at normal severity render bare; anything else
//!   renders as `Severity: text`, so a dead channel shows
//!   `Disconnected: no value` instead of blanking the page.
//! - `{% chanspan "CHANNEL" ... %}` renders an HTML
//!   `<span class="sevr...">` for status-colored pages and defaults
//!   `dtype=STRING` so the backend controls formatting.
//!
//! The channel argument is macro-expanded before the fetch, so a prefix
//! macro can assemble channel names: `{% chan "{{P}}TEMP" %}`.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::macros::MacroContext;
use crate::render::tags::{parse_tag, TagCall};
use crate::render::{RenderContext, RenderError, Renderer};
use crate::channel::ChannelValue;

/// The built-in [`Renderer`].
#[derive(Debug, Default)]
pub struct TagRenderer;

impl TagRenderer {
    pub fn new() -> TagRenderer {
        TagRenderer
    }

    /// Expand template text against a context.
    pub async fn expand(
        &self,
        source: &str,
        context: &RenderContext,
    ) -> Result<String, RenderError> {
        let mut out = String::with_capacity(source.len());
        let mut at = 0usize;

        while at < source.len() {
            let rest = &source[at..];
            let next_var = rest.find("{{");
            let next_tag = rest.find("{%");
            let (pos, is_tag) = match (next_var, next_tag) {
                (None, None) => {
                    out.push_str(rest);
                    break;
                }
                (Some(v), None) => (v, false),
                (None, Some(t)) => (t, true),
                (Some(v), Some(t)) => {
                    if t < v {
                        (t, true)
                    } else {
                        (v, false)
                    }
                }
            };

            out.push_str(&rest[..pos]);
            let open = at + pos;

            if is_tag {
                let close = source[open + 2..].find("%}").ok_or(RenderError::Syntax {
                    offset: open,
                    message: "unterminated '{%' tag".to_string(),
                })?;
                let body = &source[open + 2..open + 2 + close];
                let call = parse_tag(body).map_err(|err| RenderError::Syntax {
                    offset: open + 2 + err.offset,
                    message: err.message,
                })?;
                out.push_str(&self.evaluate(&call, context).await?);
                at = open + 2 + close + 2;
            } else {
                let close = source[open + 2..].find("}}").ok_or(RenderError::Syntax {
                    offset: open,
                    message: "unterminated '{{' reference".to_string(),
                })?;
                let name = source[open + 2..open + 2 + close].trim();
                match context.macros.get(name) {
                    Some(value) => out.push_str(value),
                    None => debug!(macro_name = name, "undefined macro renders empty"),
                }
                at = open + 2 + close + 2;
            }
        }

        Ok(out)
    }

    async fn evaluate(
        &self,
        call: &TagCall,
        context: &RenderContext,
    ) -> Result<String, RenderError> {
        let channel = substitute(&call.channel, &context.macros);
        match call.name.as_str() {
            "chan" => {
                let value = match context.cache.fetch(&channel, &call.options).await {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(channel = %channel, error = %err, "channel tag failed");
                        return Ok(format!("Invalid: {err}"));
                    }
                };
                Ok(render_inline(&value))
            }
            "chanspan" => {
                let mut options = call.options.clone();
                if !options.iter().any(|(k, _)| k.eq_ignore_ascii_case("dtype")) {
                    options.push(("dtype".to_string(), "STRING".to_string()));
                }
                let value = match context.cache.fetch(&channel, &options).await {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(channel = %channel, error = %err, "channel span tag failed");
                        return Ok(format!(
                            "<span class=\"sevrInvalid\">{}</span>",
                            escape_html(&err.to_string())
                        ));
                    }
                };
                Ok(render_span(&value))
            }
            other => Err(RenderError::UnknownTag {
                name: other.to_string(),
            }),
        }
    }
}

#[async_trait]
impl Renderer for TagRenderer {
    async fn render(&self, path: &Path, context: &RenderContext) -> Result<String, RenderError> {
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| RenderError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), bytes = source.len(), "expanding template");
        self.expand(&source, context).await
    }
}

/// Replace `{{ NAME }}` references in a tag argument. Unlike the main
/// template scan this is lenient: malformed references pass through
/// untouched.
fn substitute(text: &str, macros: &MacroContext) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at = 0usize;
    while let Some(pos) = text[at..].find("{{") {
        let open = at + pos;
        let Some(close) = text[open + 2..].find("}}") else {
            break;
        };
        out.push_str(&text[at..open]);
        let name = text[open + 2..open + 2 + close].trim();
        if let Some(value) = macros.get(name) {
            out.push_str(value);
        }
        at = open + 2 + close + 2;
    }
    out.push_str(&text[at..]);
    out
}

fn render_inline(value: &ChannelValue) -> String {
    match value {
        ChannelValue::Sample(sample) if sample.severity.label().is_empty() => sample.text.clone(),
        other => format!("{}: {}", other.severity_label(), other.value_text()),
    }
}

fn render_span(value: &ChannelValue) -> String {
    format!(
        "<span class=\"sevr{}\">{}</span>",
        value.severity_label(),
        escape_html(value.value_text())
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
