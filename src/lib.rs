//! LumenCore: live pattern highlighting for rendered documents
//!
//! A Rust/WASM engine that finds user-configured words and patterns in the
//! visible text of a page and projects them as non-invasive overlay regions.
//! The document itself is never modified.
//!
//! # Architecture
//!
//! ## Highlight Components
//! - `rules.rs` - Rule Compiler: groups → flat, priority-ordered rules
//! - `matcher.rs` - Segment Scanner: non-overlapping matches per text segment
//! - `context.rs` - Rendering contexts (primary, embedded frame, shadow tree)
//! - `overlay.rs` - Overlay Projector: region cache and sink buckets
//! - `navigator.rs` - Navigation Index: ordered next/previous with wraparound
//! - `watcher.rs` - Change Watcher: debounced, idle-aware re-scan scheduling
//! - `engine.rs` - HighlightEngine: lifecycle and event wiring
//! - `wasm.rs` - HighlightCortex: per-segment matching for JS hosts
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { HighlightCortex } from 'lumencore';
//!
//! await init();
//!
//! const cortex = new HighlightCortex();
//! cortex.hydrateGroups([
//!   { id: 'g1', name: 'Errors', colorId: 'red', words: ['error', 'fatal'] },
//!   { id: 'g2', name: 'Ids', colorId: 'blue', words: ['[A-Z]{3}-\\d+'], isPatternExpression: true },
//! ]);
//!
//! // Offsets are UTF-16, ready for Range.setStart / setEnd
//! for (const span of cortex.scanText(node.nodeValue)) {
//!   console.log(span.start, span.end, span.colorId, span.matchedText);
//! }
//! ```

pub mod error;
pub mod highlight;

pub use error::*;
pub use highlight::*;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("lumencore v{}", env!("CARGO_PKG_VERSION"))
}
