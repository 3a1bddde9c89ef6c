//! Document abstraction
//!
//! The highlighting pipeline only needs a handful of tree primitives. They
//! are expressed as the [`Document`] trait so the same walker, renderer and
//! remover drive both the live page (`WebDocument`, wasm32) and the in-memory
//! arena tree used natively (`MemoryDocument`).

pub mod memory;

pub use memory::{MemoryDocument, NodeId};

use std::fmt;

/// Coarse node classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Text,
    Element,
    /// Comments, processing instructions, doctypes...
    Other,
}

/// DOM operation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// Node has no parent to be replaced or unwrapped in
    Detached,
    /// Markup could not be parsed into a fragment
    Markup(String),
    /// Error reported by the host DOM
    Host(String),
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomError::Detached => write!(f, "Node is detached from the document"),
            DomError::Markup(msg) => write!(f, "Markup error: {}", msg),
            DomError::Host(msg) => write!(f, "DOM error: {}", msg),
        }
    }
}

impl std::error::Error for DomError {}

/// Tree primitives needed for highlighting
pub trait Document {
    type Node: Clone + PartialEq + fmt::Debug;

    fn kind(&self, node: &Self::Node) -> NodeKind;

    /// Children at call time, in document order
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Concatenated text of the node and its descendants
    fn text_content(&self, node: &Self::Node) -> String;

    fn set_text_content(&mut self, node: &Self::Node, text: &str) -> Result<(), DomError>;

    fn has_class(&self, node: &Self::Node, class: &str) -> bool;

    /// Lowercase tag name of an element, `None` for other nodes
    fn local_name(&self, node: &Self::Node) -> Option<String>;

    /// Replace `node` with the fragment parsed from `markup`, in one step
    fn replace_with_markup(&mut self, node: &Self::Node, markup: &str) -> Result<(), DomError>;

    /// Move `child` into `parent`, right before `reference`
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        child: &Self::Node,
        reference: &Self::Node,
    ) -> Result<(), DomError>;

    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), DomError>;

    /// Merge adjacent text nodes and drop empty ones under `node`
    fn normalize(&mut self, node: &Self::Node) -> Result<(), DomError>;

    /// Elements under `root` (excluding `root`) carrying `class`, document order
    fn elements_by_class(&self, root: &Self::Node, class: &str) -> Vec<Self::Node> {
        let mut found = Vec::new();
        let mut stack: Vec<Self::Node> = self.children(root).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            if self.kind(&node) != NodeKind::Element {
                continue;
            }
            if self.has_class(&node, class) {
                found.push(node.clone());
            }
            stack.extend(self.children(&node).into_iter().rev());
        }
        found
    }
}
