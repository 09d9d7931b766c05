//! Arena-based document tree.
//!
//! Nodes live in one contiguous vector and link to each other by index. On
//! top of the usual parent/child/sibling links every node can carry an
//! attached shadow root, a box geometry and a resolved image source, which is
//! what a rendered chat page exposes beyond plain markup.

use std::collections::HashMap;

use html5ever::{LocalName, Namespace, QualName, ns};

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sentinel value for no node.
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check if this is a valid node ID.
    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    /// Check if this is the sentinel value.
    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Node payload.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root.
    Document,
    /// Element with name and attributes.
    Element {
        name: QualName,
        attrs: Vec<Attribute>,
        /// Pre-extracted id for fast matching.
        id: Option<String>,
        /// Pre-extracted classes for fast matching.
        classes: Vec<String>,
    },
    /// Text content.
    Text(String),
    /// Comment (kept for serialization, never rendered).
    Comment(String),
    /// Document type declaration.
    Doctype { name: String },
    /// Encapsulated subtree owned by `host`.
    ShadowRoot { host: NodeId },
}

/// HTML attribute.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

/// Layout box of a rendered element, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Geometry {
    pub width: f32,
    pub height: f32,
    /// Full scrollable height of the content; equals `height` when the
    /// element does not scroll.
    pub scroll_height: f32,
}

impl Geometry {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            scroll_height: height,
        }
    }

    pub fn with_scroll_height(mut self, scroll_height: f32) -> Self {
        self.scroll_height = scroll_height;
        self
    }
}

/// A node in the arena.
#[derive(Debug)]
pub struct Node {
    pub data: NodeData,
    pub parent: NodeId,
    pub first_child: NodeId,
    pub last_child: NodeId,
    pub prev_sibling: NodeId,
    pub next_sibling: NodeId,
    /// Attached shadow root, `NONE` when the element is not a host.
    pub shadow_root: NodeId,
    pub geometry: Option<Geometry>,
    /// The image source the page actually resolved (`currentSrc`).
    pub current_src: Option<String>,
    /// Explicit hidden flag set by the producer of the tree.
    pub hidden: bool,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
            shadow_root: NodeId::NONE,
            geometry: None,
            current_src: None,
            hidden: false,
        }
    }
}

/// Arena-based document tree.
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    /// Map from id attribute to node ID for fast lookup.
    id_map: HashMap<String, NodeId>,
    /// Explicit slot assignments, keyed by slot element.
    pub(super) slot_assignments: HashMap<NodeId, Vec<NodeId>>,
}

/// Build an HTML-namespace qualified name.
pub fn html_name(local: &str) -> QualName {
    QualName::new(None, ns!(html), LocalName::from(local))
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            root: NodeId::NONE,
            id_map: HashMap::new(),
            slot_assignments: HashMap::new(),
        };
        dom.root = dom.alloc(Node::new(NodeData::Document));
        dom
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    /// Create a detached element node.
    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> NodeId {
        let mut id = None;
        let mut classes = Vec::new();

        for attr in &attrs {
            if attr.name.local.as_ref() == "id" {
                id = Some(attr.value.clone());
            } else if attr.name.local.as_ref() == "class" {
                classes = attr
                    .value
                    .split_whitespace()
                    .map(|s| s.to_string())
                    .collect();
            }
        }

        let node_id = self.alloc(Node::new(NodeData::Element {
            name,
            attrs,
            id: id.clone(),
            classes,
        }));

        if let Some(id_str) = id {
            self.id_map.entry(id_str).or_insert(node_id);
        }

        node_id
    }

    /// Create a detached HTML element from a tag and attribute pairs.
    pub fn element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let attrs = attrs
            .iter()
            .map(|(k, v)| Attribute {
                name: QualName::new(None, ns!(), LocalName::from(*k)),
                value: v.to_string(),
            })
            .collect();
        self.create_element(html_name(tag), attrs)
    }

    /// Create an element and append it to `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let el = self.element(tag, attrs);
        self.append(parent, el);
        el
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(Node::new(NodeData::Text(text.into())))
    }

    /// Allocate a detached node with arbitrary payload.
    pub(super) fn create_node(&mut self, data: NodeData) -> NodeId {
        self.alloc(Node::new(data))
    }

    pub fn create_comment(&mut self, text: String) -> NodeId {
        self.alloc(Node::new(NodeData::Comment(text)))
    }

    pub fn create_doctype(&mut self, name: String) -> NodeId {
        self.alloc(Node::new(NodeData::Doctype { name }))
    }

    /// Append a child to a parent node.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(NodeId::NONE);

        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = parent;
            child_node.prev_sibling = last_child;
            child_node.next_sibling = NodeId::NONE;
        }

        if let Some(last_node) = self.get_mut(last_child) {
            last_node.next_sibling = child;
        }

        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    /// Insert a node before a sibling.
    pub fn insert_before(&mut self, sibling: NodeId, new_node: NodeId) {
        let (parent, prev) = match self.get(sibling) {
            Some(n) => (n.parent, n.prev_sibling),
            None => return,
        };

        if let Some(new) = self.get_mut(new_node) {
            new.parent = parent;
            new.prev_sibling = prev;
            new.next_sibling = sibling;
        }

        if let Some(sib) = self.get_mut(sibling) {
            sib.prev_sibling = new_node;
        }

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = new_node;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = new_node;
        }
    }

    /// Append text, merging into the last child when it is already text.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(NodeId::NONE);

        if let Some(last) = self.get_mut(last_child)
            && let NodeData::Text(ref mut existing) = last.data
        {
            existing.push_str(text);
            return;
        }

        let text_node = self.create_text(text);
        self.append(parent, text_node);
    }

    /// Unlink a node from its parent and siblings.
    pub fn detach(&mut self, target: NodeId) {
        let (parent, prev, next) = match self.get(target) {
            Some(n) => (n.parent, n.prev_sibling, n.next_sibling),
            None => return,
        };

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = next;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.first_child = next;
        }

        if next.is_some() {
            if let Some(n) = self.get_mut(next) {
                n.prev_sibling = prev;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.last_child = prev;
        }

        if let Some(node) = self.get_mut(target) {
            node.parent = NodeId::NONE;
            node.prev_sibling = NodeId::NONE;
            node.next_sibling = NodeId::NONE;
        }
    }

    /// Record the rendered box of an element.
    pub fn set_geometry(&mut self, id: NodeId, geometry: Geometry) {
        if let Some(node) = self.get_mut(id) {
            node.geometry = Some(geometry);
        }
    }

    /// Record the source an image element actually resolved to.
    pub fn set_current_src(&mut self, id: NodeId, src: impl Into<String>) {
        if let Some(node) = self.get_mut(id) {
            node.current_src = Some(src.into());
        }
    }

    pub fn set_hidden(&mut self, id: NodeId, hidden: bool) {
        if let Some(node) = self.get_mut(id) {
            node.hidden = hidden;
        }
    }

    /// Get node by id attribute.
    pub fn get_by_id(&self, id: &str) -> Option<NodeId> {
        self.id_map.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the document only has its root node.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Iterate over children of a node.
    pub fn children(&self, parent: NodeId) -> ChildrenIter<'_> {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(NodeId::NONE);
        ChildrenIter {
            dom: self,
            current: first,
        }
    }

    /// Iterate over element children of a node.
    pub fn element_children(&self, parent: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(parent).filter(|&c| self.is_element(c))
    }

    /// Light-tree descendants of `scope` in tree order, excluding `scope`.
    ///
    /// Shadow roots are never entered.
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).collect();
        stack.reverse();
        while let Some(id) = stack.pop() {
            out.push(id);
            let mut children: Vec<_> = self.children(id).collect();
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Find the first light-tree element with the given tag.
    pub fn find_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|&id| self.tag(id) == Some(tag))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over children of a node.
pub struct ChildrenIter<'a> {
    dom: &'a Document,
    current: NodeId,
}

impl Iterator for ChildrenIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self
            .dom
            .get(id)
            .map(|n| n.next_sibling)
            .unwrap_or(NodeId::NONE);
        Some(id)
    }
}

/// Element accessors.
impl Document {
    /// Element's local name (tag).
    pub fn element_name(&self, id: NodeId) -> Option<&LocalName> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(&name.local),
            _ => None,
        })
    }

    /// Element's lower-case tag name as a string slice.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element_name(id).map(|n| n.as_ref())
    }

    pub fn element_namespace(&self, id: NodeId) -> Option<&Namespace> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(&name.ns),
            _ => None,
        })
    }

    pub fn attrs(&self, id: NodeId) -> &[Attribute] {
        self.get(id)
            .and_then(|n| match &n.data {
                NodeData::Element { attrs, .. } => Some(attrs.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Get an attribute value.
    pub fn get_attr(&self, id: NodeId, attr_name: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|a| a.name.local.as_ref() == attr_name)
            .map(|a| a.value.as_str())
    }

    /// Attribute value, or `""` when missing.
    pub fn attr_or_empty(&self, id: NodeId, attr_name: &str) -> &str {
        self.get_attr(id, attr_name).unwrap_or("")
    }

    pub fn has_attr(&self, id: NodeId, attr_name: &str) -> bool {
        self.get_attr(id, attr_name).is_some()
    }

    pub fn element_id(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { id, .. } => id.as_deref(),
            _ => None,
        })
    }

    pub fn element_classes(&self, id: NodeId) -> &[String] {
        static EMPTY: &[String] = &[];
        self.get(id)
            .and_then(|n| match &n.data {
                NodeData::Element { classes, .. } => Some(classes.as_slice()),
                _ => None,
            })
            .unwrap_or(EMPTY)
    }

    /// Raw `class` attribute (the DOM's `className`).
    pub fn class_name(&self, id: NodeId) -> &str {
        self.attr_or_empty(id, "class")
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element_classes(id).iter().any(|c| c == class)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, NodeData::Element { .. }))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| matches!(n.data, NodeData::Text(_)))
    }

    /// Text of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn geometry(&self, id: NodeId) -> Option<Geometry> {
        self.get(id).and_then(|n| n.geometry)
    }

    pub fn current_src(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| n.current_src.as_deref())
    }

    /// The `hidden` flag: explicit, or the `hidden` attribute.
    pub fn is_hidden_flag(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| n.hidden) || self.has_attr(id, "hidden")
    }

    /// Parent, if it is an element.
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.get(id)?.parent;
        self.is_element(parent).then_some(parent)
    }

    pub fn previous_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.get(id)?.prev_sibling;
        while current.is_some() {
            if self.is_element(current) {
                return Some(current);
            }
            current = self.get(current)?.prev_sibling;
        }
        None
    }

    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.get(id)?.next_sibling;
        while current.is_some() {
            if self.is_element(current) {
                return Some(current);
            }
            current = self.get(current)?.next_sibling;
        }
        None
    }

    /// Concatenated light-tree text of a node (the DOM's `textContent`).
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(text) = self.text(id) {
            out.push_str(text);
            return out;
        }
        for child in self.descendants(id) {
            if let Some(text) = self.text(child) {
                out.push_str(text);
            }
        }
        out
    }

    /// Trimmed text content, `None` when blank.
    pub fn trimmed_text(&self, id: NodeId) -> Option<String> {
        let text = self.text_content(id);
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_elements() {
        let mut dom = Document::new();
        let div = dom.element("div", &[("id", "main"), ("class", "a b")]);
        dom.append(dom.root(), div);

        assert_eq!(dom.tag(div), Some("div"));
        assert_eq!(dom.element_id(div), Some("main"));
        assert_eq!(dom.get_by_id("main"), Some(div));
        assert!(dom.has_class(div, "b"));
        assert_eq!(dom.class_name(div), "a b");
    }

    #[test]
    fn test_append_children() {
        let mut dom = Document::new();
        let parent = dom.append_element(dom.root(), "div", &[]);
        let child1 = dom.append_element(parent, "p", &[]);
        let child2 = dom.append_element(parent, "p", &[]);

        let children: Vec<_> = dom.children(parent).collect();
        assert_eq!(children, vec![child1, child2]);
        assert_eq!(dom.next_element_sibling(child1), Some(child2));
        assert_eq!(dom.previous_element_sibling(child2), Some(child1));
        assert_eq!(dom.parent_element(child1), Some(parent));
    }

    #[test]
    fn test_text_merging() {
        let mut dom = Document::new();
        let p = dom.append_element(dom.root(), "p", &[]);
        dom.append_text(p, "Hello, ");
        dom.append_text(p, "World!");

        let children: Vec<_> = dom.children(p).collect();
        assert_eq!(children.len(), 1);
        assert_eq!(dom.text(children[0]), Some("Hello, World!"));
        assert_eq!(dom.text_content(p), "Hello, World!");
    }

    #[test]
    fn test_detach_and_insert_before() {
        let mut dom = Document::new();
        let ul = dom.append_element(dom.root(), "ul", &[]);
        let a = dom.append_element(ul, "li", &[]);
        let b = dom.append_element(ul, "li", &[]);
        let c = dom.element("li", &[]);

        dom.insert_before(b, c);
        assert_eq!(dom.children(ul).collect::<Vec<_>>(), vec![a, c, b]);

        dom.detach(a);
        assert_eq!(dom.children(ul).collect::<Vec<_>>(), vec![c, b]);
        assert!(dom.parent_element(a).is_none());
    }

    #[test]
    fn test_hidden_flag() {
        let mut dom = Document::new();
        let a = dom.append_element(dom.root(), "div", &[("hidden", "")]);
        let b = dom.append_element(dom.root(), "div", &[]);
        assert!(dom.is_hidden_flag(a));
        assert!(!dom.is_hidden_flag(b));
        dom.set_hidden(b, true);
        assert!(dom.is_hidden_flag(b));
    }
}
