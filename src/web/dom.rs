//! WebDocument: the live page DOM behind the `Document` trait

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Element, Node, NodeList};

use crate::dom::{Document, DomError, NodeKind};

fn host(e: JsValue) -> DomError {
    DomError::Host(e.as_string().unwrap_or_else(|| format!("{:?}", e)))
}

fn collect(list: NodeList) -> Vec<Node> {
    (0..list.length()).filter_map(|i| list.item(i)).collect()
}

/// The current window's document
pub struct WebDocument {
    document: web_sys::Document,
}

impl WebDocument {
    pub fn new(document: web_sys::Document) -> Self {
        Self { document }
    }

    pub fn current() -> Result<Self, DomError> {
        web_sys::window()
            .and_then(|window| window.document())
            .map(Self::new)
            .ok_or_else(|| DomError::Host("no document in this context".to_string()))
    }

    /// `<body>`, the root every pipeline scans
    pub fn body(&self) -> Result<Node, DomError> {
        self.document
            .body()
            .map(Node::from)
            .ok_or_else(|| DomError::Host("document has no body".to_string()))
    }
}

impl Document for WebDocument {
    type Node = Node;

    fn kind(&self, node: &Node) -> NodeKind {
        match node.node_type() {
            Node::TEXT_NODE => NodeKind::Text,
            Node::ELEMENT_NODE => NodeKind::Element,
            _ => NodeKind::Other,
        }
    }

    fn children(&self, node: &Node) -> Vec<Node> {
        collect(node.child_nodes())
    }

    fn parent(&self, node: &Node) -> Option<Node> {
        node.parent_node()
    }

    fn text_content(&self, node: &Node) -> String {
        node.text_content().unwrap_or_default()
    }

    fn set_text_content(&mut self, node: &Node, text: &str) -> Result<(), DomError> {
        node.set_text_content(Some(text));
        Ok(())
    }

    fn has_class(&self, node: &Node, class: &str) -> bool {
        node.dyn_ref::<Element>()
            .map(|element| element.class_list().contains(class))
            .unwrap_or(false)
    }

    fn local_name(&self, node: &Node) -> Option<String> {
        node.dyn_ref::<Element>().map(|element| element.local_name())
    }

    fn replace_with_markup(&mut self, node: &Node, markup: &str) -> Result<(), DomError> {
        let parent = node.parent_node().ok_or(DomError::Detached)?;
        let range = self.document.create_range().map_err(host)?;
        range.select_node(node).map_err(host)?;
        let fragment = range.create_contextual_fragment(markup).map_err(host)?;
        parent.replace_child(&fragment, node).map_err(host)?;
        Ok(())
    }

    fn insert_before(&mut self, parent: &Node, child: &Node, reference: &Node) -> Result<(), DomError> {
        parent.insert_before(child, Some(reference)).map_err(host)?;
        Ok(())
    }

    fn remove_child(&mut self, parent: &Node, child: &Node) -> Result<(), DomError> {
        parent.remove_child(child).map_err(host)?;
        Ok(())
    }

    fn normalize(&mut self, node: &Node) -> Result<(), DomError> {
        node.normalize();
        Ok(())
    }

    fn elements_by_class(&self, root: &Node, class: &str) -> Vec<Node> {
        let selector = format!(".{}", class);
        let found = if let Some(element) = root.dyn_ref::<Element>() {
            element.query_selector_all(&selector)
        } else if let Some(document) = root.dyn_ref::<web_sys::Document>() {
            document.query_selector_all(&selector)
        } else {
            return Vec::new();
        };
        match found {
            Ok(list) => collect(list),
            Err(e) => {
                log::warn!("[dom] Selector {} failed: {:?}", selector, e);
                Vec::new()
            }
        }
    }
}
