//! Change Watcher: debounced re-scan scheduling
//!
//! # States
//! Idle → ScanScheduled → ScanRunning → Idle
//!
//! - Mutations (re)arm the mutation debounce timer; a burst collapses into one
//!   scan. Mutations observed while a scan runs re-arm it right after.
//! - Scrolling arms a shorter debounce unless navigation is active or a
//!   programmatic scroll is still suppressing scroll events.
//! - A due scan may wait for an idle opportunity, but never longer than the
//!   idle timeout.
//! - Start arms opportunistic re-scans, skipped while navigation is active.
//!
//! Time is injected through `Clock`; timers are plain deadlines polled by the
//! engine, so every transition is deterministic under test.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::highlight::config::WatcherConfig;
use crate::highlight::dom::{Document, NodeId};

// =============================================================================
// Clock
// =============================================================================

pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin
    fn now_ms(&self) -> u64;
}

/// Wall clock (wasm-safe via `instant`)
pub struct SystemClock {
    origin: instant::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: instant::Instant::now() }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

// =============================================================================
// Timers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    MutationDebounce,
    ScrollDebounce,
    IdleDeadline,
    Opportunistic(usize),
    ScrollSuppression,
}

/// At most one deadline per kind; arming replaces (cancels) the previous one
#[derive(Debug, Default)]
pub struct TimerSet {
    deadlines: BTreeMap<TimerKind, u64>,
}

impl TimerSet {
    pub fn arm(&mut self, kind: TimerKind, at: u64) {
        self.deadlines.insert(kind, at);
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.deadlines.remove(&kind);
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.deadlines.contains_key(&kind)
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<u64> {
        self.deadlines.get(&kind).copied()
    }

    /// Remove and return every timer due at `now`, earliest first
    pub fn take_due(&mut self, now: u64) -> Vec<TimerKind> {
        let mut due: Vec<(u64, TimerKind)> = self
            .deadlines
            .iter()
            .filter(|(_, &at)| at <= now)
            .map(|(&kind, &at)| (at, kind))
            .collect();
        due.sort();
        for (_, kind) in &due {
            self.deadlines.remove(kind);
        }
        due.into_iter().map(|(_, kind)| kind).collect()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.deadlines.values().min().copied()
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
    }
}

// =============================================================================
// Transient surfaces
// =============================================================================

/// Decides whether a newly added node is a transient overlay-like surface
/// (menu, tooltip, dialog) that deserves an immediate scan.
pub type TransientPredicate = Box<dyn Fn(&Document, NodeId) -> bool>;

const TRANSIENT_ROLES: &[&str] = &[
    "menu", "menubar", "listbox", "tooltip", "dialog", "alertdialog",
];

const TRANSIENT_CLASS_HINTS: &[&str] = &[
    "menu", "dropdown", "popover", "popup", "tooltip", "modal", "dialog",
];

/// Default heuristic: ARIA role, else a class-name hint
pub fn looks_like_transient_surface(doc: &Document, node: NodeId) -> bool {
    let Some(element) = doc.element(node) else {
        return false;
    };
    if let Some(role) = &element.role {
        if TRANSIENT_ROLES.contains(&role.to_ascii_lowercase().as_str()) {
            return true;
        }
    }
    let class_name = element.class_name.to_ascii_lowercase();
    TRANSIENT_CLASS_HINTS.iter().any(|hint| class_name.contains(hint))
}

// =============================================================================
// State machine
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    ScanScheduled,
    ScanRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanReason {
    Mutation,
    Scroll,
    Opportunistic,
}

#[derive(Debug)]
pub struct ChangeWatcher {
    config: WatcherConfig,
    timers: TimerSet,
    running: bool,
    /// Debounce elapsed; waiting for an idle opportunity
    awaiting_idle: Option<ScanReason>,
    mutated_while_running: bool,
}

impl ChangeWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            timers: TimerSet::default(),
            running: false,
            awaiting_idle: None,
            mutated_while_running: false,
        }
    }

    pub fn state(&self) -> WatcherState {
        if self.running {
            WatcherState::ScanRunning
        } else if self.awaiting_idle.is_some()
            || self.timers.is_armed(TimerKind::MutationDebounce)
            || self.timers.is_armed(TimerKind::ScrollDebounce)
        {
            WatcherState::ScanScheduled
        } else {
            WatcherState::Idle
        }
    }

    pub fn on_mutation(&mut self, now: u64) {
        if self.running {
            self.mutated_while_running = true;
            return;
        }
        // A scan already waiting for idle reads the live tree; its deadline
        // stays fixed
        if self.awaiting_idle.is_some() {
            return;
        }
        self.timers.arm(TimerKind::MutationDebounce, now + self.config.mutation_debounce_ms);
    }

    /// Returns true when a scroll re-scan was armed
    pub fn on_scroll(&mut self, now: u64, navigation_active: bool) -> bool {
        if navigation_active || self.is_scroll_suppressed(now) {
            return false;
        }
        if self.running {
            self.mutated_while_running = true;
            return true;
        }
        self.timers.arm(TimerKind::ScrollDebounce, now + self.config.scroll_debounce_ms);
        true
    }

    /// A programmatic scroll began; ignore scroll events for a while
    pub fn begin_programmatic_scroll(&mut self, now: u64) {
        self.timers.cancel(TimerKind::ScrollDebounce);
        self.timers.arm(TimerKind::ScrollSuppression, now + self.config.scroll_suppression_ms);
    }

    pub fn is_scroll_suppressed(&self, now: u64) -> bool {
        self.timers
            .deadline(TimerKind::ScrollSuppression)
            .is_some_and(|until| now < until)
    }

    /// Arm the post-initialization re-scans
    pub fn arm_opportunistic(&mut self, now: u64) {
        for (i, delay) in self.config.opportunistic_delays_ms.iter().enumerate() {
            self.timers.arm(TimerKind::Opportunistic(i), now + delay);
        }
    }

    /// Fire due timers. Returns the reason a full scan must run now, if any.
    pub fn poll(&mut self, now: u64, navigation_active: bool) -> Option<ScanReason> {
        let mut run = None;

        for kind in self.timers.take_due(now) {
            match kind {
                TimerKind::MutationDebounce | TimerKind::ScrollDebounce => {
                    let reason = if kind == TimerKind::MutationDebounce {
                        ScanReason::Mutation
                    } else {
                        ScanReason::Scroll
                    };
                    if self.config.use_idle_scheduling {
                        if self.awaiting_idle.is_none() {
                            self.awaiting_idle = Some(reason);
                            self.timers.arm(TimerKind::IdleDeadline, now + self.config.idle_timeout_ms);
                        }
                    } else {
                        run = run.or(Some(reason));
                    }
                }
                TimerKind::IdleDeadline => {
                    if let Some(reason) = self.awaiting_idle.take() {
                        tracing::debug!(?reason, "idle wait exhausted, forcing scan");
                        run = run.or(Some(reason));
                    }
                }
                TimerKind::Opportunistic(n) => {
                    if navigation_active {
                        tracing::debug!(n, "opportunistic re-scan skipped during navigation");
                    } else {
                        run = run.or(Some(ScanReason::Opportunistic));
                    }
                }
                TimerKind::ScrollSuppression => {}
            }
        }

        run
    }

    /// The host reports an idle opportunity
    pub fn on_idle(&mut self) -> Option<ScanReason> {
        let reason = self.awaiting_idle.take()?;
        self.timers.cancel(TimerKind::IdleDeadline);
        Some(reason)
    }

    pub fn begin_scan(&mut self) {
        self.running = true;
        self.awaiting_idle = None;
        self.mutated_while_running = false;
        self.timers.cancel(TimerKind::MutationDebounce);
        self.timers.cancel(TimerKind::ScrollDebounce);
        self.timers.cancel(TimerKind::IdleDeadline);
    }

    pub fn finish_scan(&mut self, now: u64) {
        self.running = false;
        if std::mem::take(&mut self.mutated_while_running) {
            self.timers.arm(TimerKind::MutationDebounce, now + self.config.mutation_debounce_ms);
        }
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    pub fn reset(&mut self) {
        self.timers.clear();
        self.running = false;
        self.awaiting_idle = None;
        self.mutated_while_running = false;
    }
}

// =============================================================================
// Tests
// =============================================================================
