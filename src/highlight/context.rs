//! Rendering contexts: the primary page, same-origin frame documents and
//! shadow trees.
//!
//! Each context owns its own overlay buckets and style binding. A walk over a
//! context yields its text segments in tree order and reports the contexts
//! nested inside it (shadow roots, accessible frames) without descending into
//! them. Isolated frames are counted and skipped.

use serde::{Deserialize, Serialize};

use crate::error::RegionError;
use crate::highlight::dom::{Document, DocumentId, Frame, NodeData, NodeId};
use crate::highlight::matcher::MatchSpan;
use crate::highlight::overlay::{OverlayRegion, OverlaySink, RegionId};
use crate::highlight::palette::PaintRule;

/// Parent tags whose text is never scanned
pub const NON_CONTENT_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "textarea", "input", "select", "option",
];

// =============================================================================
// Identity
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContextRef {
    Document(DocumentId),
    Shadow(DocumentId, NodeId),
}

impl ContextRef {
    pub fn document_id(&self) -> DocumentId {
        match self {
            ContextRef::Document(doc) | ContextRef::Shadow(doc, _) => *doc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextKind {
    Primary,
    Embedded,
    Shadow,
}

/// A text node inside a specific rendering context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentRef {
    pub context: ContextRef,
    pub node: NodeId,
}

/// A scannable text segment borrowed from the live document
#[derive(Debug, Clone, Copy)]
pub struct Segment<'a> {
    pub segment: SegmentRef,
    pub text: &'a str,
}

// =============================================================================
// Walker
// =============================================================================

/// Result of walking one context
#[derive(Debug, Default)]
pub struct Walk<'a> {
    pub segments: Vec<Segment<'a>>,
    pub shadow_roots: Vec<NodeId>,
    pub frames: Vec<NodeId>,
    pub isolated_frames: usize,
}

/// Collect text segments under `root` in pre-order.
///
/// Whitespace-only text and text whose parent element is non-content are
/// skipped. Shadow roots and frames are reported, not entered.
pub fn walk<'a>(doc: &'a Document, root: NodeId, context: ContextRef) -> Walk<'a> {
    let mut out = Walk::default();
    let mut stack = vec![root];

    while let Some(id) = stack.pop() {
        match doc.data(id) {
            Some(NodeData::Text(text)) => {
                if is_candidate_text(doc, id, text) {
                    out.segments.push(Segment {
                        segment: SegmentRef { context, node: id },
                        text,
                    });
                }
            }
            Some(NodeData::Element(element)) => {
                if let Some(shadow) = element.shadow_root {
                    out.shadow_roots.push(shadow);
                }
                match &element.frame {
                    Some(Frame::SameOrigin(_)) => out.frames.push(id),
                    Some(Frame::Isolated) => out.isolated_frames += 1,
                    None => {}
                }
                stack.extend(doc.children(id).iter().rev());
            }
            Some(NodeData::Document) | Some(NodeData::ShadowRoot) => {
                stack.extend(doc.children(id).iter().rev());
            }
            None => {}
        }
    }

    out
}

fn is_candidate_text(doc: &Document, id: NodeId, text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    match doc.parent_element(id) {
        Some(parent) => !NON_CONTENT_TAGS.contains(&parent.tag.as_str()),
        None => true,
    }
}

/// Context a node belongs to inside `doc`: the innermost enclosing shadow
/// root, or the document itself.
pub fn context_of(doc: &Document, node: NodeId) -> ContextRef {
    let mut current = Some(node);
    while let Some(id) = current {
        if matches!(doc.data(id), Some(NodeData::ShadowRoot)) {
            return ContextRef::Shadow(doc.id(), id);
        }
        current = doc.parent(id);
    }
    ContextRef::Document(doc.id())
}

/// Validate `start..end` against the live text of `node`, returning the slice
pub fn live_text(doc: &Document, node: NodeId, start: usize, end: usize) -> Result<&str, RegionError> {
    if !doc.is_connected(node) {
        return Err(RegionError::Detached(node));
    }
    let text = doc.text(node).ok_or(RegionError::NotText(node))?;
    if end > text.len() {
        return Err(RegionError::OutOfRange { start, end, len: text.len() });
    }
    if start >= end {
        return Err(RegionError::Empty { start, end });
    }
    text.get(start..end)
        .ok_or(RegionError::NotCharBoundary { start, end })
}

// =============================================================================
// Capability trait
// =============================================================================

/// A rendering context borrowing its document for `'a`
pub trait RenderingContext<'a> {
    fn context_ref(&self) -> ContextRef;

    fn kind(&self) -> ContextKind;

    fn document(&self) -> &'a Document;

    /// Node the walk starts from
    fn scan_root(&self) -> NodeId;

    fn walk(&self) -> Walk<'a> {
        walk(self.document(), self.scan_root(), self.context_ref())
    }

    /// Contexts reported by `walk`, ready to be projected in turn
    fn nested(&self, walk: &Walk<'a>) -> Vec<Box<dyn RenderingContext<'a> + 'a>> {
        let doc = self.document();
        let shadows = walk.shadow_roots.iter().map(|&root| {
            Box::new(ShadowContext::new(doc, root)) as Box<dyn RenderingContext<'a> + 'a>
        });
        let frames = walk.frames.iter().filter_map(|&frame| {
            doc.frame_document(frame)
                .map(|inner| Box::new(EmbeddedContext::new(inner)) as Box<dyn RenderingContext<'a> + 'a>)
        });
        shadows.chain(frames).collect()
    }

    /// Bind a span to the live tree as an overlay region
    fn create_region(&self, span: &MatchSpan, id: RegionId) -> Result<OverlayRegion, RegionError> {
        live_text(self.document(), span.segment.node, span.start, span.end)?;
        Ok(OverlayRegion {
            id,
            segment: span.segment,
            start: span.start,
            end: span.end,
            color_id: span.color_id.clone(),
        })
    }

    fn bind_style(&self, sink: &mut dyn OverlaySink, rules: &[PaintRule]) {
        for rule in rules {
            sink.bind_style(self.context_ref(), rule);
        }
    }
}

// =============================================================================
// Variants
// =============================================================================

/// The top-level page
pub struct PrimaryContext<'a> {
    doc: &'a Document,
    root: NodeId,
}

impl<'a> PrimaryContext<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self { doc, root: doc.root() }
    }

    /// Restrict the walk to the subtree under `root`
    pub fn rooted_at(doc: &'a Document, root: NodeId) -> Self {
        Self { doc, root }
    }
}

impl<'a> RenderingContext<'a> for PrimaryContext<'a> {
    fn context_ref(&self) -> ContextRef {
        ContextRef::Document(self.doc.id())
    }

    fn kind(&self) -> ContextKind {
        ContextKind::Primary
    }

    fn document(&self) -> &'a Document {
        self.doc
    }

    fn scan_root(&self) -> NodeId {
        self.root
    }
}

/// A same-origin frame's document
pub struct EmbeddedContext<'a> {
    doc: &'a Document,
}

impl<'a> EmbeddedContext<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self { doc }
    }
}

impl<'a> RenderingContext<'a> for EmbeddedContext<'a> {
    fn context_ref(&self) -> ContextRef {
        ContextRef::Document(self.doc.id())
    }

    fn kind(&self) -> ContextKind {
        ContextKind::Embedded
    }

    fn document(&self) -> &'a Document {
        self.doc
    }

    fn scan_root(&self) -> NodeId {
        self.doc.root()
    }
}

/// A shadow tree hosted inside some document
pub struct ShadowContext<'a> {
    doc: &'a Document,
    shadow_root: NodeId,
    root: NodeId,
}

impl<'a> ShadowContext<'a> {
    pub fn new(doc: &'a Document, shadow_root: NodeId) -> Self {
        Self { doc, shadow_root, root: shadow_root }
    }

    pub fn rooted_at(doc: &'a Document, shadow_root: NodeId, root: NodeId) -> Self {
        Self { doc, shadow_root, root }
    }
}

impl<'a> RenderingContext<'a> for ShadowContext<'a> {
    fn context_ref(&self) -> ContextRef {
        ContextRef::Shadow(self.doc.id(), self.shadow_root)
    }

    fn kind(&self) -> ContextKind {
        ContextKind::Shadow
    }

    fn document(&self) -> &'a Document {
        self.doc
    }

    fn scan_root(&self) -> NodeId {
        self.root
    }
}

/// Context for a subtree of the primary document, honoring shadow scoping
pub fn subtree_context<'a>(doc: &'a Document, node: NodeId) -> Box<dyn RenderingContext<'a> + 'a> {
    match context_of(doc, node) {
        ContextRef::Shadow(_, shadow_root) => Box::new(ShadowContext::rooted_at(doc, shadow_root, node)),
        ContextRef::Document(_) => Box::new(PrimaryContext::rooted_at(doc, node)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts<'a>(walk: &Walk<'a>) -> Vec<&'a str> {
        walk.segments.iter().map(|s| s.text).collect()
    }

    #[test]
    fn test_walk_skips_non_content_and_blank_text() {
        let mut doc = Document::new();
        let body = doc.append_element(doc.root(), "body");
        doc.append_text(body, "visible");
        let script = doc.append_element(body, "script");
        doc.append_text(script, "var hidden = 1;");
        let area = doc.append_element(body, "textarea");
        doc.append_text(area, "typed");
        doc.append_text(body, "   \n  ");

        let walk = PrimaryContext::new(&doc).walk();
        assert_eq!(texts(&walk), vec!["visible"]);
    }

    #[test]
    fn test_walk_is_tree_ordered() {
        let mut doc = Document::new();
        let a = doc.append_element(doc.root(), "p");
        doc.append_text(a, "one");
        let b = doc.append_element(a, "em");
        doc.append_text(b, "two");
        doc.append_text(a, "three");

        let walk = PrimaryContext::new(&doc).walk();
        assert_eq!(texts(&walk), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_walk_reports_nested_contexts() {
        let mut doc = Document::new();
        let host = doc.append_element(doc.root(), "x-card");
        let shadow = doc.attach_shadow(host).unwrap();
        doc.append_text(shadow, "shadow text");

        let mut inner = Document::new();
        inner.append_text(inner.root(), "frame text");
        doc.embed_frame(doc.root(), Frame::SameOrigin(Box::new(inner)));
        doc.embed_frame(doc.root(), Frame::Isolated);

        let primary = PrimaryContext::new(&doc);
        let walk = primary.walk();
        assert!(walk.segments.is_empty());
        assert_eq!(walk.shadow_roots, vec![shadow]);
        assert_eq!(walk.frames.len(), 1);
        assert_eq!(walk.isolated_frames, 1);

        let nested = primary.nested(&walk);
        let kinds: Vec<ContextKind> = nested.iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, vec![ContextKind::Shadow, ContextKind::Embedded]);

        let shadow_walk = nested[0].walk();
        assert_eq!(texts(&shadow_walk), vec!["shadow text"]);
        assert_eq!(
            shadow_walk.segments[0].segment.context,
            ContextRef::Shadow(doc.id(), shadow)
        );
        assert_eq!(texts(&nested[1].walk()), vec!["frame text"]);
    }

    #[test]
    fn test_segments_borrow_the_document_not_the_context() {
        let mut doc = Document::new();
        let host = doc.append_element(doc.root(), "x-card");
        let shadow = doc.attach_shadow(host).unwrap();
        doc.append_text(shadow, "inside");

        let outer = PrimaryContext::new(&doc).walk();
        let inner = {
            let nested = PrimaryContext::new(&doc).nested(&outer);
            nested[0].walk()
        };

        assert_eq!(texts(&inner), vec!["inside"]);
    }

    #[test]
    fn test_context_of_finds_enclosing_shadow() {
        let mut doc = Document::new();
        let host = doc.append_element(doc.root(), "x-menu");
        let shadow = doc.attach_shadow(host).unwrap();
        let item = doc.append_element(shadow, "li");
        let plain = doc.append_element(doc.root(), "div");

        assert_eq!(context_of(&doc, item), ContextRef::Shadow(doc.id(), shadow));
        assert_eq!(context_of(&doc, plain), ContextRef::Document(doc.id()));
    }

    #[test]
    fn test_live_text_rejects_bad_ranges() {
        let mut doc = Document::new();
        let text = doc.append_text(doc.root(), "héllo");

        assert_eq!(live_text(&doc, text, 0, 1), Ok("h"));
        assert!(matches!(live_text(&doc, text, 1, 2), Err(RegionError::NotCharBoundary { .. })));
        assert!(matches!(live_text(&doc, text, 0, 99), Err(RegionError::OutOfRange { .. })));
        assert!(matches!(live_text(&doc, text, 2, 2), Err(RegionError::Empty { .. })));

        doc.remove(text);
        assert_eq!(live_text(&doc, text, 0, 1), Err(RegionError::Detached(text)));
    }
}
