//! Overlay Projector: turns match spans into overlay regions
//!
//! Regions are registered twice: with the host's overlay primitive (an
//! `OverlaySink`, bucketed per context and color) and in the engine-owned
//! `RegionCache` keyed by color. A full projection always starts from a clear;
//! regions are never diffed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::highlight::context::{subtree_context, ContextRef, PrimaryContext, RenderingContext, SegmentRef};
use crate::highlight::dom::{Document, NodeId};
use crate::highlight::matcher::RuleSet;
use crate::highlight::palette::{Palette, PaintRule};

// =============================================================================
// Regions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub u64);

/// A non-destructive annotation bound to one text range at creation time.
///
/// Staleness is lazy: a region whose segment was detached or shortened is
/// only discovered when it is next validated against the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayRegion {
    pub id: RegionId,
    pub segment: SegmentRef,
    pub start: usize,
    pub end: usize,
    pub color_id: String,
}

impl OverlayRegion {
    pub fn context(&self) -> ContextRef {
        self.segment.context
    }

    pub fn node(&self) -> NodeId {
        self.segment.node
    }
}

// =============================================================================
// Region cache
// =============================================================================

/// color id -> regions, in registration order
#[derive(Debug, Default, Clone)]
pub struct RegionCache {
    buckets: BTreeMap<String, Vec<OverlayRegion>>,
}

impl RegionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, region: OverlayRegion) {
        self.buckets.entry(region.color_id.clone()).or_default().push(region);
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Total regions across all colors
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }

    pub fn count(&self, color_id: &str) -> usize {
        self.buckets.get(color_id).map_or(0, Vec::len)
    }

    pub fn colors(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OverlayRegion> {
        self.buckets.values().flatten()
    }

    /// Keep regions for which `keep` returns true; returns how many were pruned
    pub fn retain(&mut self, mut keep: impl FnMut(&OverlayRegion) -> bool) -> usize {
        let before = self.len();
        for regions in self.buckets.values_mut() {
            regions.retain(|r| keep(r));
        }
        self.buckets.retain(|_, regions| !regions.is_empty());
        before - self.len()
    }
}

// =============================================================================
// Overlay primitive
// =============================================================================

/// The host's overlay primitive. Buckets are per context and color; the
/// active region is painted with the reserved active rule and is never part
/// of any bucket.
pub trait OverlaySink {
    /// False when the host cannot paint overlays at all
    fn is_supported(&self) -> bool {
        true
    }

    fn bind_style(&mut self, context: ContextRef, rule: &PaintRule);

    /// Add a region to its context's color bucket, creating the bucket on
    /// first use
    fn add_region(&mut self, region: &OverlayRegion);

    /// Drop every bucket in every context
    fn clear(&mut self);

    fn set_active(&mut self, region: Option<&OverlayRegion>);

    fn scroll_into_view(&mut self, region: &OverlayRegion);
}

/// In-memory overlay primitive
#[derive(Debug, Clone)]
pub struct OverlayCanvas {
    supported: bool,
    buckets: BTreeMap<ContextRef, BTreeMap<String, Vec<RegionId>>>,
    styles: BTreeMap<ContextRef, Vec<PaintRule>>,
    active: Option<OverlayRegion>,
    scroll_requests: Vec<RegionId>,
}

impl Default for OverlayCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayCanvas {
    pub fn new() -> Self {
        Self {
            supported: true,
            buckets: BTreeMap::new(),
            styles: BTreeMap::new(),
            active: None,
            scroll_requests: Vec::new(),
        }
    }

    /// A host without an overlay primitive
    pub fn unsupported() -> Self {
        Self { supported: false, ..Self::new() }
    }

    pub fn bucket(&self, context: ContextRef, color_id: &str) -> &[RegionId] {
        self.buckets
            .get(&context)
            .and_then(|b| b.get(color_id))
            .map_or(&[], Vec::as_slice)
    }

    /// Number of color buckets created in a context
    pub fn bucket_count(&self, context: ContextRef) -> usize {
        self.buckets.get(&context).map_or(0, BTreeMap::len)
    }

    pub fn contexts(&self) -> impl Iterator<Item = &ContextRef> {
        self.buckets.keys()
    }

    pub fn styles(&self, context: ContextRef) -> &[PaintRule] {
        self.styles.get(&context).map_or(&[], Vec::as_slice)
    }

    pub fn active(&self) -> Option<&OverlayRegion> {
        self.active.as_ref()
    }

    pub fn scroll_requests(&self) -> &[RegionId] {
        &self.scroll_requests
    }
}

impl OverlaySink for OverlayCanvas {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn bind_style(&mut self, context: ContextRef, rule: &PaintRule) {
        let rules = self.styles.entry(context).or_default();
        if !rules.iter().any(|r| r.name == rule.name) {
            rules.push(rule.clone());
        }
    }

    fn add_region(&mut self, region: &OverlayRegion) {
        self.buckets
            .entry(region.context())
            .or_default()
            .entry(region.color_id.clone())
            .or_default()
            .push(region.id);
    }

    fn clear(&mut self) {
        self.buckets.clear();
    }

    fn set_active(&mut self, region: Option<&OverlayRegion>) {
        self.active = region.cloned();
    }

    fn scroll_into_view(&mut self, region: &OverlayRegion) {
        self.scroll_requests.push(region.id);
    }
}

// =============================================================================
// Projector
// =============================================================================

/// Counters from one projection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionStats {
    pub contexts: usize,
    pub segments: usize,
    pub regions: usize,
    pub dropped: usize,
    pub isolated_frames: usize,
}

impl ProjectionStats {
    fn absorb(&mut self, other: ProjectionStats) {
        self.contexts += other.contexts;
        self.segments += other.segments;
        self.regions += other.regions;
        self.dropped += other.dropped;
        self.isolated_frames += other.isolated_frames;
    }
}

pub struct Projector {
    paint_rules: Vec<PaintRule>,
    bound: BTreeSet<ContextRef>,
    next_id: u64,
}

impl Projector {
    pub fn new(palette: &Palette) -> Self {
        Self {
            paint_rules: palette.paint_rules(),
            bound: BTreeSet::new(),
            next_id: 0,
        }
    }

    /// Drop every cached region and every overlay bucket
    pub fn clear(&mut self, cache: &mut RegionCache, sink: &mut dyn OverlaySink) {
        cache.clear();
        sink.clear();
    }

    /// Forget which contexts have styles bound (host reloaded)
    pub fn reset(&mut self) {
        self.bound.clear();
    }

    pub fn project_page(
        &mut self,
        doc: &Document,
        rules: &RuleSet,
        cache: &mut RegionCache,
        sink: &mut dyn OverlaySink,
    ) -> ProjectionStats {
        self.project_context(&PrimaryContext::new(doc), rules, cache, sink)
    }

    /// Project only the subtree under `node` (used for transient surfaces)
    pub fn project_subtree(
        &mut self,
        doc: &Document,
        node: NodeId,
        rules: &RuleSet,
        cache: &mut RegionCache,
        sink: &mut dyn OverlaySink,
    ) -> ProjectionStats {
        if !doc.is_connected(node) {
            return ProjectionStats::default();
        }
        self.project_context(subtree_context(doc, node).as_ref(), rules, cache, sink)
    }

    /// Project one context and, recursively, every context nested inside it
    pub fn project_context(
        &mut self,
        ctx: &dyn RenderingContext<'_>,
        rules: &RuleSet,
        cache: &mut RegionCache,
        sink: &mut dyn OverlaySink,
    ) -> ProjectionStats {
        let mut stats = ProjectionStats { contexts: 1, ..Default::default() };

        if self.bound.insert(ctx.context_ref()) {
            ctx.bind_style(sink, &self.paint_rules);
        }

        let walk = ctx.walk();
        stats.segments = walk.segments.len();
        stats.isolated_frames = walk.isolated_frames;

        for segment in &walk.segments {
            for span in rules.scan_segment(segment) {
                let id = RegionId(self.next_id);
                match ctx.create_region(&span, id) {
                    Ok(region) => {
                        self.next_id += 1;
                        sink.add_region(&region);
                        cache.insert(region);
                        stats.regions += 1;
                    }
                    Err(err) => {
                        tracing::trace!(error = %err, "dropped match");
                        stats.dropped += 1;
                    }
                }
            }
        }

        for nested in ctx.nested(&walk) {
            stats.absorb(self.project_context(nested.as_ref(), rules, cache, sink));
        }

        stats
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::dom::Frame;
    use crate::highlight::rules::Rule;

    fn rule(pattern: &str, color: &str) -> Rule {
        Rule {
            pattern: pattern.to_string(),
            is_pattern_expression: false,
            color_id: color.to_string(),
            case_sensitive: false,
            whole_word_only: false,
            priority: 0,
        }
    }

    fn project(doc: &Document, rules: &[Rule]) -> (RegionCache, OverlayCanvas, ProjectionStats) {
        let mut projector = Projector::new(&Palette::default());
        let mut cache = RegionCache::new();
        let mut canvas = OverlayCanvas::new();
        let stats = projector.project_page(doc, &RuleSet::compile(rules), &mut cache, &mut canvas);
        (cache, canvas, stats)
    }

    #[test]
    fn test_regions_bucketed_by_color() {
        let mut doc = Document::new();
        doc.append_text(doc.root(), "red apple, green apple, red car");

        let (cache, canvas, stats) = project(&doc, &[rule("red", "red"), rule("green", "green")]);
        let primary = ContextRef::Document(doc.id());

        assert_eq!(stats.regions, 3);
        assert_eq!(cache.count("red"), 2);
        assert_eq!(cache.count("green"), 1);
        assert_eq!(canvas.bucket(primary, "red").len(), 2);
        assert_eq!(canvas.bucket_count(primary), 2);
    }

    #[test]
    fn test_styles_bound_once_per_context() {
        let mut doc = Document::new();
        doc.append_text(doc.root(), "alpha");
        let palette = Palette::default();
        let mut projector = Projector::new(&palette);
        let mut cache = RegionCache::new();
        let mut canvas = OverlayCanvas::new();
        let rules = RuleSet::compile(&[rule("alpha", "yellow")]);

        projector.project_page(&doc, &rules, &mut cache, &mut canvas);
        projector.clear(&mut cache, &mut canvas);
        projector.project_page(&doc, &rules, &mut cache, &mut canvas);

        let styles = canvas.styles(ContextRef::Document(doc.id()));
        assert_eq!(styles.len(), palette.colors.len() + 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_frames_and_shadows_project_independently() {
        let mut doc = Document::new();
        doc.append_text(doc.root(), "needle in page");
        let host = doc.append_element(doc.root(), "x-panel");
        let shadow = doc.attach_shadow(host).unwrap();
        doc.append_text(shadow, "needle in shadow");

        let mut inner = Document::new();
        inner.append_text(inner.root(), "needle in frame");
        let inner_id = inner.id();
        doc.embed_frame(doc.root(), Frame::SameOrigin(Box::new(inner)));
        doc.embed_frame(doc.root(), Frame::Isolated);

        let (cache, canvas, stats) = project(&doc, &[rule("needle", "blue")]);

        assert_eq!(cache.count("blue"), 3);
        assert_eq!(stats.contexts, 3);
        assert_eq!(stats.isolated_frames, 1);
        assert_eq!(canvas.bucket(ContextRef::Document(doc.id()), "blue").len(), 1);
        assert_eq!(canvas.bucket(ContextRef::Shadow(doc.id(), shadow), "blue").len(), 1);
        assert_eq!(canvas.bucket(ContextRef::Document(inner_id), "blue").len(), 1);
        assert!(!canvas.styles(ContextRef::Document(inner_id)).is_empty());
    }

    #[test]
    fn test_clear_empties_cache_and_buckets() {
        let mut doc = Document::new();
        doc.append_text(doc.root(), "word word");
        let (mut cache, mut canvas, _) = project(&doc, &[rule("word", "pink")]);

        Projector::new(&Palette::default()).clear(&mut cache, &mut canvas);

        assert!(cache.is_empty());
        assert_eq!(canvas.bucket_count(ContextRef::Document(doc.id())), 0);
    }

    #[test]
    fn test_subtree_projection_ignores_detached_root() {
        let mut doc = Document::new();
        let div = doc.append_element(doc.root(), "div");
        doc.append_text(div, "token");
        doc.remove(div);

        let mut projector = Projector::new(&Palette::default());
        let mut cache = RegionCache::new();
        let mut canvas = OverlayCanvas::new();
        let stats = projector.project_subtree(
            &doc,
            div,
            &RuleSet::compile(&[rule("token", "teal")]),
            &mut cache,
            &mut canvas,
        );

        assert_eq!(stats, ProjectionStats::default());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_retain_reports_pruned() {
        let mut doc = Document::new();
        doc.append_text(doc.root(), "a b a");
        let (mut cache, _, _) = project(&doc, &[rule("a", "yellow"), rule("b", "green")]);

        let pruned = cache.retain(|r| r.color_id != "yellow");
        assert_eq!(pruned, 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.colors().collect::<Vec<_>>(), vec!["green"]);
    }
}
