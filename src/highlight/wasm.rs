//! WASM bindings: per-segment matching for a JavaScript-driven host
//!
//! The JS side walks the live DOM and paints overlays; this facade compiles
//! the group configuration once per hydration and scans individual text
//! segments, returning UTF-16 offsets ready for DOM ranges.
//!
//! # Usage (JavaScript)
//! ```javascript,ignore
//! import init, { HighlightCortex } from 'lumencore';
//!
//! await init();
//! const cortex = new HighlightCortex();
//! cortex.hydrateGroups([{ id: 'g1', colorId: 'yellow', words: ['error'] }]);
//! const spans = cortex.scanText(textNode.nodeValue);
//! ```

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::highlight::matcher::RuleSet;
use crate::highlight::rules::{compile_rules, GroupConfig, Rule};

/// A match with UTF-16 offsets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
    pub color_id: String,
    pub matched_text: String,
}

#[wasm_bindgen]
pub struct HighlightCortex {
    rules: Vec<Rule>,
    compiled: RuleSet,
}

impl Default for HighlightCortex {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl HighlightCortex {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            compiled: RuleSet::compile(&[]),
        }
    }

    /// Replace the rule set from an array of group objects
    #[wasm_bindgen(js_name = hydrateGroups)]
    pub fn js_hydrate_groups(&mut self, groups: JsValue) -> Result<(), JsValue> {
        let groups: Vec<GroupConfig> = serde_wasm_bindgen::from_value(groups).map_err(|e| {
            let message = format!("Invalid groups: {}", e);
            #[cfg(target_arch = "wasm32")]
            web_sys::console::error_1(&JsValue::from_str(&message));
            JsValue::from(js_sys::Error::new(&message))
        })?;
        self.hydrate(&groups);
        Ok(())
    }

    #[wasm_bindgen(js_name = ruleCount)]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Number of pattern expressions that failed to compile
    #[wasm_bindgen(js_name = invalidPatternCount)]
    pub fn invalid_pattern_count(&self) -> usize {
        self.compiled.invalid_patterns().len()
    }

    /// Scan one text segment
    #[wasm_bindgen(js_name = scanText)]
    pub fn js_scan_text(&self, text: &str) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.scan_text(text))
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    #[wasm_bindgen]
    pub fn clear(&mut self) {
        self.hydrate(&[]);
    }
}

impl HighlightCortex {
    pub fn hydrate(&mut self, groups: &[GroupConfig]) {
        self.rules = compile_rules(groups);
        self.compiled = RuleSet::compile(&self.rules);
    }

    pub fn scan_text(&self, text: &str) -> Vec<TextSpan> {
        let mut spans = Vec::new();
        // Offsets ascend, so UTF-16 positions accumulate in one pass
        let mut byte_cursor = 0;
        let mut utf16_cursor = 0;
        for m in self.compiled.find_matches(text) {
            let start = utf16_cursor + utf16_len(&text[byte_cursor..m.start]);
            let end = start + utf16_len(&text[m.start..m.end]);
            byte_cursor = m.end;
            utf16_cursor = end;
            spans.push(TextSpan {
                start,
                end,
                color_id: m.color_id.to_string(),
                matched_text: text[m.start..m.end].to_string(),
            });
        }
        spans
    }
}

fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}
