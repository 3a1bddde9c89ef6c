//! Highlight Renderer
//!
//! Replaces one text node with a fragment where every diagnostic group is
//! wrapped in an annotation marker:
//!
//! ```html
//! <span class="grs-highlight" style="background-color: #FFFF00;" title="MDA, MAC">…</span>
//! ```
//!
//! Markup is built by the splicer and handed to the document in a single
//! `replace_with_markup` call, so a node is either untouched or fully annotated.

use std::borrow::Cow;

use crate::config::Color;
use crate::diagnostic::{group_diagnostics, join_kinds, Diagnostic};
use crate::dom::{Document, DomError};
use crate::rules::RuleCode;
use crate::splice::{splice, Wrapper};

/// Reserved marker class. Nothing else may create elements with it.
pub const SPAN_CLASS: &str = "grs-highlight";

/// Escape text for use inside element content or a quoted attribute
///
/// Carriage returns become character references since both HTML and XML
/// parsers fold raw `\r` and `\r\n` into `\n`.
pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'', '\r']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Wrapper emitting annotation markers in one color
pub struct MarkerWrapper<'a> {
    color: &'a Color,
}

impl<'a> MarkerWrapper<'a> {
    pub fn new(color: &'a Color) -> Self {
        Self { color }
    }
}

impl Wrapper for MarkerWrapper<'_> {
    fn wrap(&mut self, slice: &str, kinds: &[RuleCode]) -> String {
        format!(
            r#"<span class="{}" style="background-color: {};" title="{}">{}</span>"#,
            SPAN_CLASS,
            escape_html(self.color.as_str()),
            escape_html(&join_kinds(kinds)),
            escape_html(slice),
        )
    }

    fn plain<'t>(&self, text: &'t str) -> Cow<'t, str> {
        escape_html(text)
    }
}

/// What one render call did to its node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Markers inserted
    pub markers: usize,
    /// Groups dropped as malformed or overlapping
    pub dropped: usize,
}

/// Annotate `node` with `diagnostics` in `color`
///
/// Leaves the node untouched when no group survives validation.
pub fn render_diagnostics<D: Document>(
    doc: &mut D,
    node: &D::Node,
    color: &Color,
    diagnostics: &[Diagnostic],
) -> Result<RenderReport, DomError> {
    let text = doc.text_content(node);
    let groups = group_diagnostics(diagnostics);
    let spliced = splice(&text, &groups, &mut MarkerWrapper::new(color));

    let report = RenderReport {
        markers: spliced.applied,
        dropped: spliced.rejected.len(),
    };
    if !spliced.is_unchanged() {
        doc.replace_with_markup(node, &spliced.markup)?;
    }
    Ok(report)
}
