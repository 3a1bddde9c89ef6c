//! Highlight Remover
//!
//! Unwraps every annotation marker under a root back into plain text.
//! Idempotent: a second pass finds no markers and does nothing.

use crate::dom::{Document, DomError};
use crate::render::SPAN_CLASS;

/// Unwrap all markers under `root`, returning how many were removed
pub fn remove_highlights<D: Document>(doc: &mut D, root: &D::Node) -> Result<usize, DomError> {
    let markers = doc.elements_by_class(root, SPAN_CLASS);
    let mut removed = 0;

    for marker in markers {
        // A marker nested in an already unwrapped marker has a new parent by now
        let parent = doc.parent(&marker).ok_or(DomError::Detached)?;
        for child in doc.children(&marker) {
            doc.insert_before(&parent, &child, &marker)?;
        }
        doc.remove_child(&parent, &marker)?;
        doc.normalize(&parent)?;
        removed += 1;
    }

    if removed > 0 {
        log::debug!("[remove] Unwrapped {} markers", removed);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Color;
    use crate::diagnostic::Diagnostic;
    use crate::dom::MemoryDocument;
    use crate::render::render_diagnostics;
    use crate::rules::RuleCode::*;
    use crate::walker::text_leaves;

    const PAGE: &str = "<h1>Τίτλος</h1><p>abcdef <em>ghij</em> klm</p><p>nop</p>";

    fn annotate(doc: &mut MemoryDocument) {
        let body = doc.body();
        for leaf in text_leaves(&*doc, &body) {
            let len = doc.text_content(&leaf).chars().count();
            let diagnostics = vec![
                Diagnostic::new(DuplicatedWord, 0, 1, ""),
                Diagnostic::new(MixedScripts, len - 1, len, ""),
            ];
            render_diagnostics(doc, &leaf, &Color::default(), &diagnostics).unwrap();
        }
    }

    #[test]
    fn test_removal_restores_original() {
        let mut doc = MemoryDocument::from_html(PAGE).unwrap();
        let body = doc.body();
        let original_html = doc.inner_html(body);
        let original_text = doc.text_content(&body);

        annotate(&mut doc);
        assert!(!doc.elements_by_class(&body, SPAN_CLASS).is_empty());
        assert_eq!(doc.text_content(&body), original_text);

        let removed = remove_highlights(&mut doc, &body).unwrap();
        assert_eq!(removed, 10);
        assert!(doc.elements_by_class(&body, SPAN_CLASS).is_empty());
        assert_eq!(doc.text_content(&body), original_text);
        assert_eq!(doc.inner_html(body), original_html);
    }

    #[test]
    fn test_removal_is_idempotent() {
        let mut doc = MemoryDocument::from_html(PAGE).unwrap();
        let body = doc.body();
        annotate(&mut doc);

        remove_highlights(&mut doc, &body).unwrap();
        let once = doc.inner_html(body);
        assert_eq!(remove_highlights(&mut doc, &body).unwrap(), 0);
        assert_eq!(doc.inner_html(body), once);
    }

    #[test]
    fn test_no_markers_is_noop() {
        let mut doc = MemoryDocument::from_html("<p>a</p>").unwrap();
        let body = doc.body();
        assert_eq!(remove_highlights(&mut doc, &body).unwrap(), 0);
        assert_eq!(doc.inner_html(body), "<p>a</p>");
    }

    #[test]
    fn test_nested_markers_unwrapped() {
        let mut doc = MemoryDocument::from_html(
            r#"<p>a<span class="grs-highlight">b<span class="grs-highlight">c</span>d</span>e</p>"#,
        )
        .unwrap();
        let body = doc.body();

        assert_eq!(remove_highlights(&mut doc, &body).unwrap(), 2);
        assert_eq!(doc.inner_html(body), "<p>abcde</p>");
    }

    #[test]
    fn test_repeated_render_remove_cycles_stable() {
        let mut doc = MemoryDocument::from_html(PAGE).unwrap();
        let body = doc.body();
        let original_html = doc.inner_html(body);

        for _ in 0..3 {
            remove_highlights(&mut doc, &body).unwrap();
            annotate(&mut doc);
        }
        remove_highlights(&mut doc, &body).unwrap();
        assert_eq!(doc.inner_html(body), original_html);
    }
}
