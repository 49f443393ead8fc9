//! HighlightEngine: owns the rules, region cache, navigation index and watcher
//!
//! # Lifecycle
//! `new` → `start` → (`on_mutations` | `on_scroll` | `poll` | `on_idle` |
//! `advance` | `reconfigure`)* → `dispose`
//!
//! The host owns the document and the overlay primitive's rendering; the
//! engine only reads the tree and talks to the sink. Every full re-scan clears
//! all overlay state first and rebuilds it from scratch.

use serde::{Deserialize, Serialize};

use crate::highlight::config::EngineConfig;
use crate::highlight::dom::{Document, MutationRecord, NodeId};
use crate::highlight::matcher::RuleSet;
use crate::highlight::navigator::{Direction, NavPosition, NavigationIndex};
use crate::highlight::overlay::{OverlaySink, ProjectionStats, Projector, RegionCache};
use crate::highlight::rules::{compile_rules, GroupConfig, Rule};
use crate::highlight::watcher::{
    looks_like_transient_surface, ChangeWatcher, Clock, ScanReason, TransientPredicate, WatcherState,
};

/// A configuration-change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigChange {
    Groups(Vec<GroupConfig>),
    Enabled(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Not started, disposed, or the host has no overlay primitive
    Disabled,
    Idle,
    ScanScheduled,
    ScanRunning,
}

pub struct HighlightEngine<S: OverlaySink, C: Clock> {
    config: EngineConfig,
    sink: S,
    clock: C,
    rules: Vec<Rule>,
    enabled: bool,
    started: bool,
    unsupported: bool,
    cache: RegionCache,
    projector: Projector,
    navigator: NavigationIndex,
    watcher: ChangeWatcher,
    is_transient: TransientPredicate,
    scan_count: u64,
}

impl<S: OverlaySink, C: Clock> HighlightEngine<S, C> {
    pub fn new(config: EngineConfig, sink: S, clock: C) -> Self {
        Self {
            projector: Projector::new(&config.palette),
            watcher: ChangeWatcher::new(config.watcher.clone()),
            config,
            sink,
            clock,
            rules: Vec::new(),
            enabled: true,
            started: false,
            unsupported: false,
            cache: RegionCache::new(),
            navigator: NavigationIndex::new(),
            is_transient: Box::new(looks_like_transient_surface),
            scan_count: 0,
        }
    }

    /// Replace the transient-surface heuristic
    pub fn with_transient_predicate(mut self, predicate: TransientPredicate) -> Self {
        self.is_transient = predicate;
        self
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Compile `groups`, run the initial scan and arm opportunistic re-scans
    pub fn start(&mut self, doc: &Document, groups: &[GroupConfig], enabled: bool) {
        if !self.sink.is_supported() {
            if !self.unsupported {
                tracing::warn!("overlay primitive unavailable; highlighting disabled");
            }
            self.unsupported = true;
            return;
        }

        self.rules = compile_rules(groups);
        self.enabled = enabled;
        self.started = true;
        self.watcher.reset();
        self.full_rescan(doc, None);
        self.watcher.arm_opportunistic(self.clock.now_ms());
    }

    pub fn reconfigure(&mut self, doc: &Document, change: ConfigChange) {
        if !self.is_live() {
            return;
        }
        match change {
            ConfigChange::Groups(groups) => {
                self.rules = compile_rules(&groups);
                if self.enabled {
                    self.full_rescan(doc, None);
                }
            }
            ConfigChange::Enabled(false) => {
                self.enabled = false;
                self.clear_overlays();
            }
            ConfigChange::Enabled(true) => {
                self.enabled = true;
                self.full_rescan(doc, None);
            }
        }
    }

    /// Drop all overlay state and stop scheduling
    pub fn dispose(&mut self) {
        if self.started {
            self.clear_overlays();
        }
        self.watcher.reset();
        self.projector.reset();
        self.started = false;
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    pub fn on_mutations(&mut self, doc: &Document, records: &[MutationRecord]) {
        if !self.is_live() || records.is_empty() {
            return;
        }
        self.navigator.mark_dirty();
        self.watcher.on_mutation(self.clock.now_ms());

        if !self.enabled {
            return;
        }
        let mut transient: Vec<NodeId> = records
            .iter()
            .flat_map(|r| r.added.iter().copied())
            .filter(|&node| (self.is_transient)(doc, node))
            .collect();
        transient.sort();
        transient.dedup();
        // A surface nested in another candidate is covered by the outer scan
        let roots: Vec<NodeId> = transient
            .iter()
            .copied()
            .filter(|&node| !has_ancestor_in(doc, node, &transient))
            .collect();
        if !roots.is_empty() {
            self.scan_transient(doc, &roots);
        }
    }

    pub fn on_scroll(&mut self) {
        if !self.is_live() {
            return;
        }
        let armed = self.watcher.on_scroll(self.clock.now_ms(), self.navigator.is_positioned());
        tracing::trace!(armed, "scroll observed");
    }

    /// The host has an idle opportunity
    pub fn on_idle(&mut self, doc: &Document) {
        if !self.is_live() {
            return;
        }
        if let Some(reason) = self.watcher.on_idle() {
            self.run_scheduled_scan(doc, reason);
        }
    }

    /// Fire every timer due by now
    pub fn poll(&mut self, doc: &Document) {
        if !self.is_live() {
            return;
        }
        let now = self.clock.now_ms();
        if let Some(reason) = self.watcher.poll(now, self.navigator.is_positioned()) {
            self.run_scheduled_scan(doc, reason);
        }
    }

    /// Earliest pending timer deadline, for the host to arm a real timer
    pub fn next_deadline(&self) -> Option<u64> {
        if self.is_live() {
            self.watcher.next_deadline()
        } else {
            None
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Number of painted matches (the active overlay is not counted)
    pub fn match_count(&self) -> usize {
        self.cache.len()
    }

    pub fn position(&mut self, doc: &Document) -> NavPosition {
        if !self.is_live() || !self.enabled {
            return NavPosition::default();
        }
        if !self.navigator.is_positioned() && self.navigator.is_dirty() {
            self.navigator.build(doc, &mut self.cache);
        }
        self.navigator.position(doc)
    }

    pub fn advance(&mut self, doc: &Document, direction: Direction) -> NavPosition {
        if !self.is_live() || !self.enabled {
            return NavPosition::default();
        }
        let step = self.navigator.advance(doc, &mut self.cache, &mut self.sink, direction);
        if step.scrolled {
            self.watcher.begin_programmatic_scroll(self.clock.now_ms());
        }
        step.position
    }

    pub fn state(&self) -> EngineState {
        if !self.is_live() {
            return EngineState::Disabled;
        }
        match self.watcher.state() {
            WatcherState::Idle => EngineState::Idle,
            WatcherState::ScanScheduled => EngineState::ScanScheduled,
            WatcherState::ScanRunning => EngineState::ScanRunning,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Full scans executed so far
    pub fn scan_count(&self) -> u64 {
        self.scan_count
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn cache(&self) -> &RegionCache {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn is_live(&self) -> bool {
        self.started && !self.unsupported
    }

    fn run_scheduled_scan(&mut self, doc: &Document, reason: ScanReason) {
        self.watcher.begin_scan();
        if self.enabled {
            self.full_rescan(doc, Some(reason));
        }
        self.watcher.finish_scan(self.clock.now_ms());
    }

    fn clear_overlays(&mut self) {
        self.projector.clear(&mut self.cache, &mut self.sink);
        self.navigator.reset();
        self.sink.set_active(None);
    }

    fn full_rescan(&mut self, doc: &Document, reason: Option<ScanReason>) -> ProjectionStats {
        self.clear_overlays();
        if !self.enabled || self.rules.is_empty() {
            return ProjectionStats::default();
        }

        let rules = RuleSet::compile(&self.rules);
        let stats = self.projector.project_page(doc, &rules, &mut self.cache, &mut self.sink);
        if stats.regions > 0 {
            self.navigator.mark_dirty();
        }
        self.scan_count += 1;

        tracing::debug!(
            ?reason,
            regions = stats.regions,
            dropped = stats.dropped,
            contexts = stats.contexts,
            invalid_patterns = rules.invalid_patterns().len(),
            "full scan"
        );
        stats
    }

    fn scan_transient(&mut self, doc: &Document, nodes: &[NodeId]) {
        if self.rules.is_empty() {
            return;
        }
        let rules = RuleSet::compile(&self.rules);
        for &node in nodes {
            let stats = self.projector.project_subtree(doc, node, &rules, &mut self.cache, &mut self.sink);
            if stats.regions > 0 {
                self.navigator.mark_dirty();
            }
            tracing::debug!(?node, regions = stats.regions, "transient surface scanned");
        }
    }
}

/// True when a proper ancestor of `node` is in the sorted `candidates`
fn has_ancestor_in(doc: &Document, node: NodeId, candidates: &[NodeId]) -> bool {
    let mut current = doc.parent(node);
    while let Some(id) = current {
        if candidates.binary_search(&id).is_ok() {
            return true;
        }
        current = doc.parent(id);
    }
    false
}
