//! Navigation Index: ordered next/previous traversal over current matches
//!
//! Built lazily from the region cache, restricted to the primary context and
//! sorted by document position. Building prunes detached or emptied regions
//! from the cache and resets the cursor to "not positioned".

use serde::{Deserialize, Serialize};

use crate::highlight::context::{live_text, ContextRef};
use crate::highlight::dom::Document;
use crate::highlight::overlay::{OverlayRegion, OverlaySink, RegionCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Next,
    Previous,
}

/// 1-based position; `index == 0` means not positioned
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavPosition {
    pub index: usize,
    pub total: usize,
    pub matched_text: Option<String>,
}

/// Outcome of one navigation step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavStep {
    pub position: NavPosition,
    /// A programmatic scroll was requested
    pub scrolled: bool,
}

#[derive(Debug)]
pub struct NavigationIndex {
    ordered: Vec<OverlayRegion>,
    cursor: Option<usize>,
    dirty: bool,
}

impl Default for NavigationIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationIndex {
    pub fn new() -> Self {
        Self {
            ordered: Vec::new(),
            cursor: None,
            dirty: true,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Forget all entries (overlay state was cleared)
    pub fn reset(&mut self) {
        self.ordered.clear();
        self.cursor = None;
        self.dirty = true;
    }

    pub fn is_positioned(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Rebuild from the cache. Returns the number of regions pruned.
    pub fn build(&mut self, doc: &Document, cache: &mut RegionCache) -> usize {
        let primary = ContextRef::Document(doc.id());
        let order = doc.tree_order();
        let mut live: Vec<(usize, OverlayRegion)> = Vec::new();

        let pruned = cache.retain(|region| {
            if region.context() != primary {
                // Cross-context positions do not compare; keep them painted
                return true;
            }
            let position = order.get(region.node().0 as usize).copied().flatten();
            match (live_text(doc, region.node(), region.start, region.end), position) {
                (Ok(_), Some(position)) => {
                    live.push((position, region.clone()));
                    true
                }
                _ => false,
            }
        });

        live.sort_by(|(pa, a), (pb, b)| {
            pa.cmp(pb)
                .then(a.start.cmp(&b.start))
                .then(a.end.cmp(&b.end))
                .then(a.id.cmp(&b.id))
        });

        self.ordered = live.into_iter().map(|(_, region)| region).collect();
        self.cursor = None;
        self.dirty = false;

        if pruned > 0 {
            tracing::debug!(pruned, "pruned stale regions");
        }
        pruned
    }

    fn ensure_built(&mut self, doc: &Document, cache: &mut RegionCache) {
        if self.dirty || self.ordered.is_empty() {
            self.build(doc, cache);
        }
    }

    /// Move the cursor one step with wraparound and paint the active region
    pub fn advance(
        &mut self,
        doc: &Document,
        cache: &mut RegionCache,
        sink: &mut dyn OverlaySink,
        direction: Direction,
    ) -> NavStep {
        self.ensure_built(doc, cache);

        // A region may have gone stale since the build; one rebuild settles it
        for _ in 0..2 {
            let n = self.ordered.len();
            if n == 0 {
                sink.set_active(None);
                return NavStep { position: NavPosition::default(), scrolled: false };
            }

            let next = match (self.cursor, direction) {
                (None, Direction::Next) => 0,
                (None, Direction::Previous) => n - 1,
                (Some(c), Direction::Next) => (c + 1) % n,
                (Some(c), Direction::Previous) => (c + n - 1) % n,
            };

            let region = &self.ordered[next];
            let Ok(text) = live_text(doc, region.node(), region.start, region.end) else {
                self.build(doc, cache);
                continue;
            };

            let matched_text = text.to_string();
            self.cursor = Some(next);
            sink.set_active(Some(region));

            let scrolled = !is_in_view(doc, region);
            if scrolled {
                sink.scroll_into_view(region);
            }

            return NavStep {
                position: NavPosition {
                    index: next + 1,
                    total: n,
                    matched_text: Some(matched_text),
                },
                scrolled,
            };
        }

        NavStep { position: self.position(doc), scrolled: false }
    }

    /// Current position without moving or rebuilding
    pub fn position(&self, doc: &Document) -> NavPosition {
        let total = self.ordered.len();
        match self.cursor.and_then(|c| self.ordered.get(c).map(|r| (c, r))) {
            Some((c, region)) => NavPosition {
                index: c + 1,
                total,
                matched_text: live_text(doc, region.node(), region.start, region.end)
                    .ok()
                    .map(str::to_string),
            },
            None => NavPosition { index: 0, total, matched_text: None },
        }
    }
}

/// Fully contained within the visible bounds of the nearest scrollable
/// ancestor. Unlaid-out regions count as out of view.
fn is_in_view(doc: &Document, region: &OverlayRegion) -> bool {
    match doc.rect(region.node()) {
        Some(rect) => doc.scroll_bounds(region.node()).contains(&rect),
        None => false,
    }
}
