use std::collections::BTreeMap;

use indextree::{Arena, NodeError};
pub use indextree::NodeId;

use super::style::{StyleSheet, parse_style_declarations, serialize_style_declarations};
use crate::error::{DomError, DomResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag_name: String,
    attrs: BTreeMap<String, String>,
}

impl Element {
    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }
}

impl From<NodeError> for DomError {
    fn from(error: NodeError) -> Self {
        if matches!(error, NodeError::Removed) {
            DomError::NotFound(error.to_string())
        } else {
            DomError::HierarchyRequest(error.to_string())
        }
    }
}

/// A page document: `#document > html > (head, body)` plus every node ever created
/// for it. Nodes are only ever detached, never freed, so a `NodeId` stays valid for
/// the life of the document.
#[derive(Debug, Clone)]
pub struct Document {
    arena: Arena<NodeKind>,
    root: NodeId,
    html: NodeId,
    head: NodeId,
    body: NodeId,
    stylesheet: StyleSheet,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeKind::Document);
        let mut doc = Self {
            arena,
            root,
            html: root,
            head: root,
            body: root,
            stylesheet: StyleSheet::default(),
        };
        doc.html = doc.attach_new(doc.root, "html");
        doc.head = doc.attach_new(doc.html, "head");
        doc.body = doc.attach_new(doc.html, "body");
        doc
    }

    fn attach_new(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.create_element(tag);
        parent.append(id, &mut self.arena);
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn html(&self) -> NodeId {
        self.html
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn stylesheet(&self) -> &StyleSheet {
        &self.stylesheet
    }

    pub fn stylesheet_mut(&mut self) -> &mut StyleSheet {
        &mut self.stylesheet
    }

    /// How many nodes were ever created for this document. Grows with every
    /// `create_*` call and never shrinks.
    pub fn node_count(&self) -> usize {
        self.arena.count()
    }

    /// Creates a detached element. Tag names are stored lowercase.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.arena.new_node(NodeKind::Element(Element {
            tag_name: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
        }))
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.arena.new_node(NodeKind::Text(text.to_owned()))
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> DomResult<NodeId> {
        let id = self.create_element(tag);
        self.append_child(parent, id)?;
        Ok(id)
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> DomResult<NodeId> {
        let id = self.create_text(text);
        self.append_child(parent, id)?;
        Ok(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.get(id).is_some_and(|node| !node.is_removed())
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        self.arena[id].get()
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Element(_))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Text(_))
    }

    fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id) {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.arena[id].get_mut() {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag_name.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].parent()
    }

    /// The parent when it is an element (never the document node).
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.is_element(*p))
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        id.children(&self.arena).collect()
    }

    pub fn iter_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].first_child()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].last_child()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        self.parent(id)?;
        Some(id.preceding_siblings(&self.arena).skip(1).count())
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].previous_sibling()
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// DOM node length: characters for text nodes, child count otherwise.
    pub fn length(&self, id: NodeId) -> usize {
        match self.kind(id) {
            NodeKind::Text(text) => text.chars().count(),
            _ => id.children(&self.arena).count(),
        }
    }

    pub fn text_content(&self, id: NodeId) -> String {
        id.descendants(&self.arena)
            .filter_map(|node| self.text(node))
            .collect()
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|e| e.attrs.get(&name.to_ascii_lowercase()))
            .map(String::as_str)
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> DomResult<()> {
        let element = self
            .element_mut(id)
            .ok_or_else(|| DomError::InvalidState("attribute target is not an element".into()))?;
        element
            .attrs
            .insert(name.to_ascii_lowercase(), value.to_owned());
        Ok(())
    }

    pub fn has_class(&self, id: NodeId, class_name: &str) -> bool {
        self.attr(id, "class")
            .map(|classes| classes.split_ascii_whitespace().any(|c| c == class_name))
            .unwrap_or(false)
    }

    pub fn classes(&self, id: NodeId) -> Vec<&str> {
        self.attr(id, "class")
            .map(|classes| classes.split_ascii_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn class_add(&mut self, id: NodeId, class_name: &str) -> DomResult<()> {
        if self.has_class(id, class_name) {
            return Ok(());
        }
        let mut classes: Vec<String> = self.classes(id).into_iter().map(str::to_owned).collect();
        classes.push(class_name.to_owned());
        self.set_attr(id, "class", &classes.join(" "))
    }

    /// Reads one declaration from the inline `style` attribute.
    pub fn style_property(&self, id: NodeId, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        parse_style_declarations(self.attr(id, "style"))
            .into_iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    pub fn set_style_property(&mut self, id: NodeId, name: &str, value: &str) -> DomResult<()> {
        let name = name.to_ascii_lowercase();
        let mut decls = parse_style_declarations(self.attr(id, "style"));
        match decls.iter_mut().find(|(key, _)| *key == name) {
            Some(existing) => existing.1 = value.to_owned(),
            None => decls.push((name, value.to_owned())),
        }
        let serialized = serialize_style_declarations(&decls);
        self.set_attr(id, "style", &serialized)
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        if !self.contains(parent) || !self.contains(child) {
            return Err(DomError::NotFound("node is not part of this document".into()));
        }
        if self.is_text(parent) {
            return Err(DomError::HierarchyRequest(
                "text nodes cannot have children".into(),
            ));
        }
        if child == self.root {
            return Err(DomError::HierarchyRequest(
                "the document node cannot be inserted".into(),
            ));
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest(
                "insertion would create a cycle".into(),
            ));
        }
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.check_insertable(parent, child)?;
        parent.checked_append(child, &mut self.arena)?;
        Ok(())
    }

    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) -> DomResult<()> {
        self.check_insertable(parent, child)?;
        if self.parent(reference) != Some(parent) {
            return Err(DomError::NotFound(
                "insertBefore reference is not a child of parent".into(),
            ));
        }
        if child == reference {
            return Ok(());
        }
        reference.checked_insert_before(child, &mut self.arena)?;
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        if self.parent(child) != Some(parent) {
            return Err(DomError::NotFound(
                "removeChild target is not a child of parent".into(),
            ));
        }
        child.detach(&mut self.arena);
        Ok(())
    }

    /// Detaches `id` from its parent, keeping its subtree intact.
    pub fn detach(&mut self, id: NodeId) {
        id.detach(&mut self.arena);
    }

    /// DOM `Text.splitText`: keeps `[0, offset)` in `id`, moves the tail into a new
    /// text node inserted right after it, and returns the new node.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> DomResult<NodeId> {
        let text = self
            .text(id)
            .ok_or_else(|| DomError::InvalidState("splitText target is not a text node".into()))?;
        let length = text.chars().count();
        if offset > length {
            return Err(DomError::IndexSize { offset, length });
        }
        let byte_offset = char_to_byte(text, offset);
        let tail = text[byte_offset..].to_owned();
        if let NodeKind::Text(value) = self.arena[id].get_mut() {
            value.truncate(byte_offset);
        }

        let new_node = self.create_text(&tail);
        if self.parent(id).is_some() {
            id.checked_insert_after(new_node, &mut self.arena)?;
        }
        Ok(new_node)
    }

    /// Inclusive ancestor chain, starting at `id`.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        id.ancestors(&self.arena).collect()
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        node.ancestors(&self.arena).any(|current| current == ancestor)
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root, id)
    }

    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let b_chain = self.ancestors(b);
        a.ancestors(&self.arena).find(|node| b_chain.contains(node))
    }

    /// Whether `a` comes strictly before `b` in tree order.
    pub fn precedes(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return false;
        }
        if self.is_inclusive_ancestor(a, b) {
            return true;
        }
        if self.is_inclusive_ancestor(b, a) {
            return false;
        }
        let Some(common) = self.common_ancestor(a, b) else {
            return false;
        };
        let child_towards = |node: NodeId| {
            node.ancestors(&self.arena)
                .find(|n| self.parent(*n) == Some(common))
        };
        match (child_towards(a), child_towards(b)) {
            (Some(ca), Some(cb)) => ca.following_siblings(&self.arena).any(|n| n == cb),
            _ => false,
        }
    }
}

pub(crate) fn char_to_byte(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}
