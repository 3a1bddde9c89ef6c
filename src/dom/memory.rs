//! MemoryDocument: arena-backed document tree
//!
//! Native stand-in for the page DOM. Nodes live in a flat arena addressed by
//! [`NodeId`]; detached nodes simply stay in the arena unreferenced.
//! Markup fragments are parsed with `roxmltree`, so fragments must be
//! well-formed (the renderer escapes everything it emits).

use crate::dom::{Document, DomError, NodeKind};
use crate::render::escape_html;

/// Handle to a node in a [`MemoryDocument`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// In-memory document rooted at a `<body>` element
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    slots: Vec<Slot>,
    body: NodeId,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// Empty document with a bare `<body>`
    pub fn new() -> Self {
        let body = Slot {
            data: NodeData::Element {
                tag: "body".to_string(),
                attrs: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            slots: vec![body],
            body: NodeId(0),
        }
    }

    /// Document whose body holds the parsed `html` fragment
    pub fn from_html(html: &str) -> Result<Self, DomError> {
        let mut doc = Self::new();
        let body = doc.body;
        for node in doc.parse_fragment(html)? {
            doc.attach(body, node, None);
        }
        Ok(doc)
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.alloc(NodeData::Text(text.to_string()));
        self.attach(parent, id, None);
        id
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.alloc(NodeData::Element {
            tag: tag.to_string(),
            attrs: attrs
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        });
        self.attach(parent, id, None);
        id
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.slot(node).data {
            NodeData::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.slot(node).data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(attr, _)| attr == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    /// Serialized children of `node`
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for &child in &self.slot(node).children {
            self.serialize_into(child, &mut out);
        }
        out
    }

    fn serialize_into(&self, node: NodeId, out: &mut String) {
        let slot = self.slot(node);
        match &slot.data {
            NodeData::Text(text) => out.push_str(&escape_html(text)),
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push_str(&format!(" {}=\"{}\"", name, escape_html(value)));
                }
                out.push('>');
                for &child in &slot.children {
                    self.serialize_into(child, out);
                }
                out.push_str(&format!("</{}>", tag));
            }
        }
    }

    fn slot(&self, node: NodeId) -> &Slot {
        &self.slots[node.0]
    }

    fn slot_mut(&mut self, node: NodeId) -> &mut Slot {
        &mut self.slots[node.0]
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        self.slots.push(Slot {
            data,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.slots.len() - 1)
    }

    /// Insert `child` under `parent` at `index` (or last)
    fn attach(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) {
        self.detach(child);
        let children = &mut self.slot_mut(parent).children;
        match index {
            Some(i) => children.insert(i, child),
            None => children.push(child),
        }
        self.slot_mut(child).parent = Some(parent);
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.slot_mut(node).parent.take() {
            self.slot_mut(parent).children.retain(|&c| c != node);
        }
    }

    fn index_in_parent(&self, parent: NodeId, child: NodeId) -> Result<usize, DomError> {
        self.slot(parent)
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or_else(|| DomError::Host(format!("{:?} is not a child of {:?}", child, parent)))
    }

    /// Parse `markup` into detached top-level nodes
    fn parse_fragment(&mut self, markup: &str) -> Result<Vec<NodeId>, DomError> {
        let wrapped = format!("<fragment>{}</fragment>", markup);
        let parsed =
            roxmltree::Document::parse(&wrapped).map_err(|e| DomError::Markup(e.to_string()))?;

        let mut nodes = Vec::new();
        for child in parsed.root_element().children() {
            if let Some(id) = self.import(child) {
                nodes.push(id);
            }
        }
        Ok(nodes)
    }

    fn import(&mut self, node: roxmltree::Node) -> Option<NodeId> {
        if node.is_element() {
            let id = self.alloc(NodeData::Element {
                tag: node.tag_name().name().to_string(),
                attrs: node
                    .attributes()
                    .map(|attr| (attr.name().to_string(), attr.value().to_string()))
                    .collect(),
            });
            for child in node.children() {
                if let Some(child_id) = self.import(child) {
                    self.attach(id, child_id, None);
                }
            }
            Some(id)
        } else if node.is_text() {
            node.text().map(|text| self.alloc(NodeData::Text(text.to_string())))
        } else if node.is_comment() {
            Some(self.alloc(NodeData::Comment(node.text().unwrap_or_default().to_string())))
        } else {
            None
        }
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let slot = self.slot(node);
        match &slot.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Comment(_) => {}
            NodeData::Element { .. } => {
                for &child in &slot.children {
                    self.collect_text(child, out);
                }
            }
        }
    }
}

impl Document for MemoryDocument {
    type Node = NodeId;

    fn kind(&self, node: &NodeId) -> NodeKind {
        match self.slot(*node).data {
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Comment(_) => NodeKind::Other,
        }
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.slot(*node).children.clone()
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.slot(*node).parent
    }

    fn text_content(&self, node: &NodeId) -> String {
        match &self.slot(*node).data {
            NodeData::Comment(text) => text.clone(),
            _ => {
                let mut out = String::new();
                self.collect_text(*node, &mut out);
                out
            }
        }
    }

    fn set_text_content(&mut self, node: &NodeId, text: &str) -> Result<(), DomError> {
        match &mut self.slot_mut(*node).data {
            NodeData::Text(current) | NodeData::Comment(current) => {
                *current = text.to_string();
                return Ok(());
            }
            NodeData::Element { .. } => {}
        }
        for child in self.children(node) {
            self.detach(child);
        }
        if !text.is_empty() {
            self.append_text(*node, text);
        }
        Ok(())
    }

    fn has_class(&self, node: &NodeId, class: &str) -> bool {
        self.attribute(*node, "class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    fn local_name(&self, node: &NodeId) -> Option<String> {
        self.tag_name(*node).map(str::to_ascii_lowercase)
    }

    fn replace_with_markup(&mut self, node: &NodeId, markup: &str) -> Result<(), DomError> {
        let parent = self.parent(node).ok_or(DomError::Detached)?;
        // Parse before touching the tree so a bad fragment leaves it intact
        let fragment = self.parse_fragment(markup)?;
        let index = self.index_in_parent(parent, *node)?;

        self.detach(*node);
        for (offset, new_node) in fragment.into_iter().enumerate() {
            self.attach(parent, new_node, Some(index + offset));
        }
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: &NodeId,
        child: &NodeId,
        reference: &NodeId,
    ) -> Result<(), DomError> {
        self.detach(*child);
        let index = self.index_in_parent(*parent, *reference)?;
        self.attach(*parent, *child, Some(index));
        Ok(())
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) -> Result<(), DomError> {
        self.index_in_parent(*parent, *child)?;
        self.detach(*child);
        Ok(())
    }

    fn normalize(&mut self, node: &NodeId) -> Result<(), DomError> {
        let mut kept: Vec<NodeId> = Vec::new();
        for child in self.children(node) {
            let text = match &self.slot(child).data {
                NodeData::Text(text) => Some(text.clone()),
                _ => None,
            };
            match text {
                Some(text) if text.is_empty() => {
                    self.slot_mut(child).parent = None;
                }
                Some(text) => {
                    let previous = kept.last().copied();
                    match previous.map(|p| &mut self.slot_mut(p).data) {
                        Some(NodeData::Text(previous_text)) => {
                            previous_text.push_str(&text);
                            self.slot_mut(child).parent = None;
                        }
                        _ => kept.push(child),
                    }
                }
                None => {
                    self.normalize(&child)?;
                    kept.push(child);
                }
            }
        }
        self.slot_mut(*node).children = kept;
        Ok(())
    }
}
