//! DOM Text Walker
//!
//! Visits every text leaf under a root in document order. The leaf list is
//! taken before any visit, so structure created by a visitor (a highlighted
//! fragment, for instance) is never revisited within the same traversal.
//!
//! Each visit is split in two: an async `analyze` step that only sees the
//! node's text (engine work), and a synchronous `apply` step that mutates the
//! document. A failure in either step is logged with the node's text and the
//! walk moves on to the next leaf.

use std::fmt;
use std::future::Future;

use crate::dom::{Document, DomError, NodeKind};
use crate::engine::AnalysisError;
use crate::render::SPAN_CLASS;

/// Per-node failure, contained at the walker boundary
#[derive(Debug, Clone, PartialEq)]
pub enum NodeError {
    Analysis(AnalysisError),
    Dom(DomError),
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::Analysis(e) => write!(f, "{}", e),
            NodeError::Dom(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<AnalysisError> for NodeError {
    fn from(e: AnalysisError) -> Self {
        NodeError::Analysis(e)
    }
}

impl From<DomError> for NodeError {
    fn from(e: DomError) -> Self {
        NodeError::Dom(e)
    }
}

/// Outcome counters for one traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkReport {
    pub visited: usize,
    pub failed: usize,
}

/// Elements whose text is raw or escapable-raw data, never rendered prose.
/// Markup spliced into them would stay literal text.
const RAW_TEXT_TAGS: &[&str] = &[
    "script", "style", "textarea", "noscript", "template", "title", "iframe",
];

fn is_skipped<D: Document>(doc: &D, node: &D::Node) -> bool {
    if doc.has_class(node, SPAN_CLASS) {
        return true;
    }
    doc.local_name(node)
        .map(|name| RAW_TEXT_TAGS.contains(&name.as_str()))
        .unwrap_or(false)
}

/// Every text leaf under `root` in document order
///
/// Annotation markers and raw-text elements (`<script>`, `<textarea>`...)
/// are not descended into.
pub fn text_leaves<D: Document>(doc: &D, root: &D::Node) -> Vec<D::Node> {
    let mut leaves = Vec::new();
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        match doc.kind(&node) {
            NodeKind::Text => leaves.push(node),
            NodeKind::Element if node != *root && is_skipped(doc, &node) => {}
            _ => stack.extend(doc.children(&node).into_iter().rev()),
        }
    }
    leaves
}

/// Analyze then apply every text leaf under `root`
pub async fn walk<D, T, A, Fut, P>(doc: &mut D, root: &D::Node, mut analyze: A, mut apply: P) -> WalkReport
where
    D: Document,
    A: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, AnalysisError>>,
    P: FnMut(&mut D, &D::Node, T) -> Result<(), NodeError>,
{
    let mut report = WalkReport::default();
    for node in text_leaves(&*doc, root) {
        report.visited += 1;
        let text = doc.text_content(&node);
        let outcome = match analyze(text.clone()).await {
            Ok(value) => apply(&mut *doc, &node, value),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = outcome {
            report.failed += 1;
            log::warn!("[walker] Node failed: {}", e);
            log::warn!("[walker] Failed with text {:?}", text);
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDocument;

    #[test]
    fn test_leaves_in_document_order() {
        let doc = MemoryDocument::from_html("a<p>b<i>c</i></p><!--skip-->d").unwrap();
        let texts: Vec<String> = text_leaves(&doc, &doc.body())
            .iter()
            .map(|n| doc.text_content(n))
            .collect();
        assert_eq!(texts, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_markers_not_descended() {
        let doc =
            MemoryDocument::from_html(r#"x<span class="grs-highlight">y</span>z"#).unwrap();
        assert_eq!(text_leaves(&doc, &doc.body()).len(), 2);
    }

    #[test]
    fn test_raw_text_elements_not_visited() {
        let doc = MemoryDocument::from_html(
            "<p>a</p><textarea>b</textarea><style>p { color: red }</style><script>var c;</script><TITLE>d</TITLE>e",
        )
        .unwrap();
        let texts: Vec<String> = text_leaves(&doc, &doc.body())
            .iter()
            .map(|n| doc.text_content(n))
            .collect();
        assert_eq!(texts, vec!["a", "e"]);
    }

    #[test]
    fn test_failure_does_not_stop_walk() {
        let mut doc = MemoryDocument::from_html("<p>ok</p><p>bad</p><p>fine</p>").unwrap();
        let body = doc.body();
        let mut applied = Vec::new();

        let report = pollster::block_on(walk(
            &mut doc,
            &body,
            |text: String| async move {
                if text == "bad" {
                    Err(AnalysisError::Engine("boom".to_string()))
                } else {
                    Ok(text.to_uppercase())
                }
            },
            |doc: &mut MemoryDocument, node: &crate::dom::NodeId, upper: String| {
                applied.push(upper.clone());
                doc.set_text_content(node, &upper)?;
                Ok(())
            },
        ));

        assert_eq!(report, WalkReport { visited: 3, failed: 1 });
        assert_eq!(applied, vec!["OK", "FINE"]);
        assert_eq!(doc.inner_html(body), "<p>OK</p><p>bad</p><p>FINE</p>");
    }

    #[test]
    fn test_replaced_nodes_not_revisited() {
        let mut doc = MemoryDocument::from_html("<p>one</p><p>two</p>").unwrap();
        let body = doc.body();

        let report = pollster::block_on(walk(
            &mut doc,
            &body,
            |text: String| async move { Ok::<_, AnalysisError>(text) },
            |doc: &mut MemoryDocument, node: &crate::dom::NodeId, text: String| {
                doc.replace_with_markup(node, &format!("<b>{}</b><b>{}</b>", text, text))?;
                Ok(())
            },
        ));

        assert_eq!(report.visited, 2);
        assert_eq!(doc.inner_html(body), "<p><b>one</b><b>one</b></p><p><b>two</b><b>two</b></p>");
    }
}
