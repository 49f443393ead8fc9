//! Host document model: an arena tree standing in for the live page
//!
//! The engine never mutates a `Document`; hosts (and tests) build and mutate
//! it, then feed the drained `MutationRecord`s to the engine. Text offsets are
//! UTF-8 byte offsets.
//!
//! Shadow roots hang off their host element (`Element::shadow_root`) and keep
//! a parent link to it, but never appear in the host's child list. Same-origin
//! frames own a complete nested `Document`.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_DOCUMENT_ID: AtomicU32 = AtomicU32::new(1);

// =============================================================================
// Identifiers & geometry
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub u32);

/// Axis-aligned layout box
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// True when `other` lies entirely inside `self`
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// Embedded document carried by a frame element
#[derive(Debug)]
pub enum Frame {
    /// Same-origin: the nested document can be introspected
    SameOrigin(Box<Document>),
    /// Cross-origin or sandboxed: opaque to the engine
    Isolated,
}

#[derive(Debug)]
pub struct Element {
    pub tag: String,
    pub role: Option<String>,
    pub class_name: String,
    pub shadow_root: Option<NodeId>,
    pub frame: Option<Frame>,
    pub scrollable: bool,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            role: None,
            class_name: String::new(),
            shadow_root: None,
            frame: None,
            scrollable: false,
        }
    }
}

#[derive(Debug)]
pub enum NodeData {
    Document,
    Element(Element),
    Text(String),
    ShadowRoot,
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
    rect: Option<Rect>,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data,
            rect: None,
        }
    }
}

// =============================================================================
// Mutation log
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    ChildList,
    CharacterData,
}

/// One observed change, as a mutation observer would report it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

// =============================================================================
// Document
// =============================================================================

#[derive(Debug)]
pub struct Document {
    id: DocumentId,
    nodes: Vec<Node>,
    root: NodeId,
    viewport: Rect,
    mutations: Vec<MutationRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let id = DocumentId(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed));
        Self {
            id,
            nodes: vec![Node::new(NodeData::Document)],
            root: NodeId(0),
            viewport: Rect::new(0.0, 0.0, 1280.0, 800.0),
            mutations: Vec::new(),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(data));
        id
    }

    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(Element::new(tag)))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    /// Attach `child` as the last child of `parent`, recording a mutation.
    /// Returns false when either id is unknown, `child` is already attached,
    /// or `parent` lies inside `child`'s subtree.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let attachable = self.node(parent).is_some()
            && self.node(child).is_some_and(|n| n.parent.is_none())
            && child != self.root
            && !self.is_inclusive_ancestor(child, parent);
        if !attachable {
            return false;
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        self.mutations.push(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList,
            added: vec![child],
            removed: Vec::new(),
        });
        true
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.create_element(tag);
        self.append_child(parent, id);
        id
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.create_text(text);
        self.append_child(parent, id);
        id
    }

    /// Attach (or return the existing) shadow root of an element
    pub fn attach_shadow(&mut self, host: NodeId) -> Option<NodeId> {
        if let Some(existing) = self.element(host)?.shadow_root {
            return Some(existing);
        }
        let shadow = self.push(NodeData::ShadowRoot);
        if let Some(node) = self.node_mut(shadow) {
            node.parent = Some(host);
        }
        if let Some(element) = self.element_mut(host) {
            element.shadow_root = Some(shadow);
        }
        Some(shadow)
    }

    /// Append an `iframe` element carrying `frame`
    pub fn embed_frame(&mut self, parent: NodeId, frame: Frame) -> NodeId {
        let id = self.create_element("iframe");
        if let Some(element) = self.element_mut(id) {
            element.frame = Some(frame);
        }
        self.append_child(parent, id);
        id
    }

    pub fn set_role(&mut self, id: NodeId, role: &str) {
        if let Some(element) = self.element_mut(id) {
            element.role = Some(role.to_string());
        }
    }

    pub fn set_class(&mut self, id: NodeId, class_name: &str) {
        if let Some(element) = self.element_mut(id) {
            element.class_name = class_name.to_string();
        }
    }

    pub fn set_scrollable(&mut self, id: NodeId, scrollable: bool) {
        if let Some(element) = self.element_mut(id) {
            element.scrollable = scrollable;
        }
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Detach a node (and its subtree) from its parent
    pub fn remove(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.node(id).and_then(|n| n.parent) else {
            return false;
        };
        // Shadow roots are not children; they cannot be removed this way
        if matches!(self.node(id).map(|n| &n.data), Some(NodeData::ShadowRoot)) {
            return false;
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|c| *c != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
        self.mutations.push(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList,
            added: Vec::new(),
            removed: vec![id],
        });
        true
    }

    /// Replace the content of a text node
    pub fn set_text(&mut self, id: NodeId, text: &str) -> bool {
        let Some(Node { data: NodeData::Text(content), .. }) = self.node_mut(id) else {
            return false;
        };
        *content = text.to_string();
        self.mutations.push(MutationRecord {
            target: id,
            kind: MutationKind::CharacterData,
            added: Vec::new(),
            removed: Vec::new(),
        });
        true
    }

    /// Drain the mutation log
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    /// Nested document of a same-origin frame element
    pub fn frame_document(&self, id: NodeId) -> Option<&Document> {
        match self.element(id)?.frame.as_ref()? {
            Frame::SameOrigin(doc) => Some(doc),
            Frame::Isolated => None,
        }
    }

    pub fn frame_document_mut(&mut self, id: NodeId) -> Option<&mut Document> {
        match self.element_mut(id)?.frame.as_mut()? {
            Frame::SameOrigin(doc) => Some(doc),
            Frame::Isolated => None,
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.node(id).map(|n| &n.data)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.data(id)? {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.node_mut(id)?.data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.data(id)? {
            NodeData::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Nearest ancestor element, stopping at shadow roots and the document
    pub fn parent_element(&self, id: NodeId) -> Option<&Element> {
        self.element(self.parent(id)?)
    }

    /// True when the node reaches the document root through parent links
    /// (crossing shadow roots into their hosts)
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = id;
        // Bounded by node count; guards against a corrupted parent cycle
        for _ in 0..=self.nodes.len() {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    /// True when `ancestor` is `node` or reachable from it through parent links
    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Pre-order position of every node in the light tree. Detached nodes and
    /// shadow content are `None`.
    pub fn tree_order(&self) -> Vec<Option<usize>> {
        let mut order = vec![None; self.nodes.len()];
        let mut stack = vec![self.root];
        let mut next = 0;
        while let Some(id) = stack.pop() {
            if let Some(slot) = order.get_mut(id.index()) {
                *slot = Some(next);
                next += 1;
            }
            stack.extend(self.children(id).iter().rev());
        }
        order
    }

    // -------------------------------------------------------------------------
    // Geometry
    // -------------------------------------------------------------------------

    pub fn set_rect(&mut self, id: NodeId, rect: Rect) {
        if let Some(node) = self.node_mut(id) {
            node.rect = Some(rect);
        }
    }

    pub fn rect(&self, id: NodeId) -> Option<Rect> {
        self.node(id)?.rect
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    pub fn set_viewport(&mut self, rect: Rect) {
        self.viewport = rect;
    }

    /// Visible bounds of the nearest scrollable ancestor, or the viewport
    pub fn scroll_bounds(&self, id: NodeId) -> Rect {
        let mut current = self.parent(id);
        while let Some(ancestor) = current {
            if let (Some(element), Some(rect)) = (self.element(ancestor), self.rect(ancestor)) {
                if element.scrollable {
                    return rect;
                }
            }
            current = self.parent(ancestor);
        }
        self.viewport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_records_mutation() {
        let mut doc = Document::new();
        let body = doc.append_element(doc.root(), "body");
        let text = doc.append_text(body, "hello");

        let records = doc.take_mutations();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].target, body);
        assert_eq!(records[1].added, vec![text]);
        assert!(doc.take_mutations().is_empty());
    }

    #[test]
    fn test_append_under_own_descendant_is_rejected() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.append_element(outer, "span");
        doc.take_mutations();

        assert!(!doc.append_child(inner, outer));
        assert!(!doc.append_child(outer, outer));
        assert_eq!(doc.parent(outer), None);
        assert!(doc.take_mutations().is_empty());

        // Tree walks above the rejected link still terminate
        assert_eq!(doc.scroll_bounds(inner), doc.viewport());
    }

    #[test]
    fn test_remove_disconnects_subtree() {
        let mut doc = Document::new();
        let div = doc.append_element(doc.root(), "div");
        let text = doc.append_text(div, "gone soon");
        assert!(doc.is_connected(text));

        doc.remove(div);
        assert!(!doc.is_connected(text));
        assert!(doc.children(doc.root()).is_empty());
    }

    #[test]
    fn test_shadow_content_is_connected_through_host() {
        let mut doc = Document::new();
        let host = doc.append_element(doc.root(), "my-widget");
        let shadow = doc.attach_shadow(host).unwrap();
        let text = doc.append_text(shadow, "inside");

        assert!(doc.is_connected(text));
        assert!(doc.children(host).is_empty());
        assert_eq!(doc.attach_shadow(host), Some(shadow));
    }

    #[test]
    fn test_tree_order_is_preorder() {
        let mut doc = Document::new();
        let a = doc.append_element(doc.root(), "div");
        let a1 = doc.append_text(a, "a1");
        let b = doc.append_element(doc.root(), "div");
        let orphan = doc.create_text("orphan");

        let order = doc.tree_order();
        assert!(order[a.0 as usize] < order[a1.0 as usize]);
        assert!(order[a1.0 as usize] < order[b.0 as usize]);
        assert_eq!(order[orphan.0 as usize], None);
    }

    #[test]
    fn test_scroll_bounds_prefers_scrollable_ancestor() {
        let mut doc = Document::new();
        let pane = doc.append_element(doc.root(), "div");
        doc.set_scrollable(pane, true);
        doc.set_rect(pane, Rect::new(0.0, 100.0, 300.0, 200.0));
        let text = doc.append_text(pane, "scrolling");

        assert_eq!(doc.scroll_bounds(text), Rect::new(0.0, 100.0, 300.0, 200.0));
        assert_eq!(doc.scroll_bounds(pane), doc.viewport());
    }

    #[test]
    fn test_rect_containment() {
        let outer = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(outer.contains(&Rect::new(10.0, 10.0, 20.0, 20.0)));
        assert!(!outer.contains(&Rect::new(90.0, 90.0, 20.0, 20.0)));
    }

    #[test]
    fn test_isolated_frame_has_no_document() {
        let mut doc = Document::new();
        let open = doc.embed_frame(doc.root(), Frame::SameOrigin(Box::new(Document::new())));
        let closed = doc.embed_frame(doc.root(), Frame::Isolated);

        assert!(doc.frame_document(open).is_some());
        assert!(doc.frame_document(closed).is_none());
    }
}
