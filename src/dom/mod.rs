//! Minimal element tree consumed by the shim
//!
//! The shim never owns page semantics: it only needs element identity, the
//! parent link, ordered element children and the tag name. Nodes live in an
//! arena and are addressed by [`NodeId`], so identity comparison is index
//! comparison.

mod html;
pub mod path;

pub use path::{DomTree, PathResolver};

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A document shared between the page and style views created from it
pub type SharedDocument = Rc<RefCell<Document>>;

/// Identity of an element in a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Arena index of this node
    pub fn index(self) -> usize {
        self.0
    }
}

/// Data for element nodes
#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    /// Tag name as supplied (e.g., "div", "BODY")
    pub tag_name: String,
    /// Element attributes
    pub attributes: HashMap<String, String>,
}

impl ElementData {
    /// Create a new element
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            attributes: HashMap::new(),
        }
    }

    /// Get an attribute value
    pub fn get_attribute(&self, name: &str) -> Option<&String> {
        self.attributes.get(name)
    }

    /// Set an attribute value
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Get the ID attribute
    pub fn id(&self) -> Option<&String> {
        self.attributes.get("id")
    }
}

#[derive(Debug, Clone)]
struct Slot {
    data: ElementData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// The element tree of a page
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<Slot>,
    document_element: Option<NodeId>,
}

impl Document {
    /// Create a new empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse markup into a document (element nodes only)
    pub fn parse_html(markup: &str) -> Self {
        html::parse(markup)
    }

    /// Wrap into a shared handle
    pub fn into_shared(self) -> SharedDocument {
        Rc::new(RefCell::new(self))
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag_name: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Slot {
            data: ElementData::new(tag_name),
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// The `<html>` element, if one was set
    pub fn document_element(&self) -> Option<NodeId> {
        self.document_element
    }

    /// Make `node` the document element
    pub fn set_document_element(&mut self, node: NodeId) {
        if self.slot(node).is_some() {
            self.document_element = Some(node);
        }
    }

    /// First `<body>` below the document element
    pub fn body(&self) -> Option<NodeId> {
        let root = self.document_element?;
        self.first_by_tag(root, "body")
    }

    /// Node stored at arena `index`, if there is one
    pub fn node(&self, index: usize) -> Option<NodeId> {
        (index < self.nodes.len()).then_some(NodeId(index))
    }

    /// Element data for a node
    pub fn element(&self, node: NodeId) -> Option<&ElementData> {
        self.slot(node).map(|s| &s.data)
    }

    /// Mutable element data for a node
    pub fn element_mut(&mut self, node: NodeId) -> Option<&mut ElementData> {
        self.nodes.get_mut(node.0).map(|s| &mut s.data)
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    ///
    /// Returns false when either node is unknown or the move would make an
    /// element its own ancestor.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let len = self.children(parent).len();
        self.insert_at(parent, child, len)
    }

    /// Insert `child` before `reference` under `parent`; appends when
    /// `reference` is `None`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> bool {
        let Some(reference) = reference else {
            return self.append_child(parent, child);
        };
        if reference == child {
            return self.slot(parent).is_some() && self.parent_of(child) == Some(parent);
        }
        if self.parent_of(reference) != Some(parent) || !self.can_adopt(parent, child) {
            return false;
        }
        self.detach(child);
        match self.children(parent).iter().position(|c| *c == reference) {
            Some(index) => self.insert_at(parent, child, index),
            None => false,
        }
    }

    /// Remove `child` from `parent`; the child stays alive as a detached node
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.parent_of(child) != Some(parent) {
            return false;
        }
        self.detach(child);
        true
    }

    /// Parent element of `node`
    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.slot(node)?.parent
    }

    /// Ordered element children of `node`
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.slot(node).map(|s| s.children.as_slice()).unwrap_or(&[])
    }

    /// All elements with the given tag name, in tree order
    pub fn get_elements_by_tag_name(&self, tag_name: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        if let Some(root) = self.document_element {
            self.collect_by_tag(root, tag_name, &mut found);
        }
        found
    }

    fn slot(&self, node: NodeId) -> Option<&Slot> {
        self.nodes.get(node.0)
    }

    fn can_adopt(&self, parent: NodeId, child: NodeId) -> bool {
        if self.slot(parent).is_none() || self.slot(child).is_none() {
            return false;
        }
        let mut cursor = Some(parent);
        while let Some(node) = cursor {
            if node == child {
                return false;
            }
            cursor = self.parent_of(node);
        }
        true
    }

    fn insert_at(&mut self, parent: NodeId, child: NodeId, index: usize) -> bool {
        if !self.can_adopt(parent, child) {
            return false;
        }
        self.detach(child);
        let siblings = &mut self.nodes[parent.0].children;
        let index = index.min(siblings.len());
        siblings.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        true
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(old_parent) = self.nodes[child.0].parent.take() {
            self.nodes[old_parent.0].children.retain(|c| *c != child);
        }
    }

    fn first_by_tag(&self, node: NodeId, tag_name: &str) -> Option<NodeId> {
        if self.tag_name_of(node).eq_ignore_ascii_case(tag_name) {
            return Some(node);
        }
        self.children(node)
            .iter()
            .find_map(|child| self.first_by_tag(*child, tag_name))
    }

    fn collect_by_tag(&self, node: NodeId, tag_name: &str, found: &mut Vec<NodeId>) {
        if self.tag_name_of(node).eq_ignore_ascii_case(tag_name) {
            found.push(node);
        }
        for child in self.children(node) {
            self.collect_by_tag(*child, tag_name, found);
        }
    }

    fn tag_name_of(&self, node: NodeId) -> &str {
        self.slot(node).map(|s| s.data.tag_name.as_str()).unwrap_or("")
    }
}

impl DomTree for Document {
    type Node = NodeId;

    fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.parent_of(node)
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        Document::children(self, node)
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.slot(node).map(|s| s.data.tag_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_document() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let html = doc.create_element("html");
        let body = doc.create_element("body");
        let div = doc.create_element("div");
        doc.set_document_element(html);
        doc.append_child(html, body);
        doc.append_child(body, div);
        (doc, html, body, div)
    }

    #[test]
    fn test_append_child_links_parent() {
        let (doc, html, body, div) = create_test_document();
        assert_eq!(doc.parent_of(div), Some(body));
        assert_eq!(doc.parent_of(html), None);
        assert_eq!(doc.children(body), &[div]);
        assert_eq!(doc.body(), Some(body));
    }

    #[test]
    fn test_node_by_index() {
        let (doc, html, _, div) = create_test_document();
        assert_eq!(doc.node(html.index()), Some(html));
        assert_eq!(doc.node(div.index()), Some(div));
        assert_eq!(doc.node(3), None);
    }

    #[test]
    fn test_append_moves_between_parents() {
        let (mut doc, _, body, div) = create_test_document();
        let section = doc.create_element("section");
        doc.append_child(body, section);
        assert!(doc.append_child(section, div));
        assert_eq!(doc.children(body), &[section]);
        assert_eq!(doc.parent_of(div), Some(section));
    }

    #[test]
    fn test_append_rejects_cycles() {
        let (mut doc, html, body, div) = create_test_document();
        assert!(!doc.append_child(div, body));
        assert!(!doc.append_child(div, div));
        assert_eq!(doc.parent_of(body), Some(html));
    }

    #[test]
    fn test_insert_before() {
        let (mut doc, _, body, div) = create_test_document();
        let first = doc.create_element("p");
        assert!(doc.insert_before(body, first, Some(div)));
        assert_eq!(doc.children(body), &[first, div]);
        let last = doc.create_element("p");
        assert!(doc.insert_before(body, last, None));
        assert_eq!(doc.children(body), &[first, div, last]);
    }

    #[test]
    fn test_remove_child_detaches() {
        let (mut doc, _, body, div) = create_test_document();
        assert!(doc.remove_child(body, div));
        assert!(!doc.remove_child(body, div));
        assert_eq!(doc.parent_of(div), None);
        assert!(doc.children(body).is_empty());
    }

    #[test]
    fn test_get_elements_by_tag_name() {
        let (mut doc, _, body, _) = create_test_document();
        let extra = doc.create_element("DIV");
        doc.append_child(body, extra);
        assert_eq!(doc.get_elements_by_tag_name("div").len(), 2);
    }

    #[test]
    fn test_element_attributes() {
        let (mut doc, _, _, div) = create_test_document();
        doc.element_mut(div).unwrap().set_attribute("id", "main");
        assert_eq!(doc.element(div).unwrap().id(), Some(&"main".to_string()));
    }
}
