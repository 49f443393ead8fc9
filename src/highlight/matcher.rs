//! Segment Scanner: per-segment match search with priority overlap resolution
//!
//! A `RuleSet` is compiled once per scan pass from the priority-ordered rule
//! list. Literal rules search with Aho-Corasick (ASCII case folding) or, for
//! case-insensitive non-ASCII needles, an escaped Unicode-aware regex.
//! Pattern-expression rules compile with `regex`; a compile failure leaves the
//! rule inert for the whole pass.
//!
//! Overlap policy: rules run in priority order and an occurrence is accepted
//! only if it touches no byte of an already accepted span. Rejected
//! occurrences are dropped whole; nothing is split or trimmed.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, Input, MatchKind};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::PatternError;
use crate::highlight::context::{Segment, SegmentRef};
use crate::highlight::rules::Rule;

// =============================================================================
// Types
// =============================================================================

/// An accepted match inside one segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchSpan {
    pub segment: SegmentRef,
    pub start: usize,
    pub end: usize,
    pub color_id: String,
}

/// An accepted match in a bare string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextMatch<'r> {
    pub start: usize,
    pub end: usize,
    pub color_id: &'r str,
}

enum Searcher {
    Literal(AhoCorasick),
    Expression(Regex),
    /// Empty literal, or an expression that failed to compile
    Inert,
}

struct CompiledRule {
    searcher: Searcher,
    color_id: String,
    whole_word_only: bool,
}

// =============================================================================
// RuleSet
// =============================================================================

/// Rules compiled for one scan pass
pub struct RuleSet {
    rules: Vec<CompiledRule>,
    invalid: Vec<PatternError>,
}

impl RuleSet {
    /// Compile rules in the given (priority) order
    pub fn compile(rules: &[Rule]) -> Self {
        let mut invalid = Vec::new();
        let compiled = rules
            .iter()
            .map(|rule| {
                let searcher = match build_searcher(rule) {
                    Ok(searcher) => searcher,
                    Err(err) => {
                        tracing::trace!(error = %err, "pattern skipped for this pass");
                        invalid.push(err);
                        Searcher::Inert
                    }
                };
                CompiledRule {
                    searcher,
                    color_id: rule.color_id.clone(),
                    whole_word_only: rule.whole_word_only,
                }
            })
            .collect();

        Self { rules: compiled, invalid }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Patterns that failed to compile this pass
    pub fn invalid_patterns(&self) -> &[PatternError] {
        &self.invalid
    }

    /// Maximal non-overlapping, priority-respecting matches, sorted by start
    pub fn find_matches(&self, text: &str) -> Vec<TextMatch<'_>> {
        let mut accepted: Vec<TextMatch<'_>> = Vec::new();

        for rule in &self.rules {
            let mut accept = |start: usize, end: usize| {
                let overlaps = accepted.iter().any(|m| start < m.end && m.start < end);
                if !overlaps {
                    accepted.push(TextMatch { start, end, color_id: &rule.color_id });
                }
            };
            match &rule.searcher {
                Searcher::Literal(ac) => search_literal(ac, text, rule.whole_word_only, &mut accept),
                Searcher::Expression(re) => search_expression(re, text, rule.whole_word_only, &mut accept),
                Searcher::Inert => {}
            }
        }

        accepted.sort_by_key(|m| m.start);
        accepted
    }

    /// Match spans for one live segment; empty when nothing was accepted
    pub fn scan_segment(&self, segment: &Segment<'_>) -> Vec<MatchSpan> {
        self.find_matches(segment.text)
            .into_iter()
            .map(|m| MatchSpan {
                segment: segment.segment,
                start: m.start,
                end: m.end,
                color_id: m.color_id.to_string(),
            })
            .collect()
    }
}

fn build_searcher(rule: &Rule) -> Result<Searcher, PatternError> {
    let to_error = |source| PatternError { pattern: rule.pattern.clone(), source };

    if rule.is_pattern_expression {
        let re = RegexBuilder::new(&rule.pattern)
            .case_insensitive(!rule.case_sensitive)
            .build()
            .map_err(to_error)?;
        return Ok(Searcher::Expression(re));
    }

    if rule.pattern.is_empty() {
        return Ok(Searcher::Inert);
    }

    if !rule.case_sensitive && !rule.pattern.is_ascii() {
        let re = RegexBuilder::new(&regex::escape(&rule.pattern))
            .case_insensitive(true)
            .build()
            .map_err(to_error)?;
        return Ok(Searcher::Expression(re));
    }

    let ac = AhoCorasickBuilder::new()
        .match_kind(MatchKind::LeftmostFirst)
        .ascii_case_insensitive(!rule.case_sensitive)
        .build([rule.pattern.as_str()]);
    match ac {
        Ok(ac) => Ok(Searcher::Literal(ac)),
        Err(err) => {
            tracing::trace!(pattern = %rule.pattern, error = %err, "literal automaton failed");
            Ok(Searcher::Inert)
        }
    }
}

// =============================================================================
// Search loops
// =============================================================================

fn search_literal(ac: &AhoCorasick, text: &str, whole_word: bool, accept: &mut impl FnMut(usize, usize)) {
    let mut pos = 0;
    while pos <= text.len() {
        let Some(m) = ac.find(Input::new(text).range(pos..)) else {
            break;
        };
        if whole_word && !is_whole_word(text, m.start(), m.end()) {
            pos = next_char_boundary(text, m.start());
            continue;
        }
        accept(m.start(), m.end());
        pos = m.end();
    }
}

fn search_expression(re: &Regex, text: &str, whole_word: bool, accept: &mut impl FnMut(usize, usize)) {
    let mut pos = 0;
    while pos <= text.len() {
        let Some(m) = re.find_at(text, pos) else {
            break;
        };
        if m.start() == m.end() {
            // Zero-length: step one character past it
            pos = next_char_boundary(text, m.end());
            continue;
        }
        if whole_word && !is_whole_word(text, m.start(), m.end()) {
            pos = next_char_boundary(text, m.start());
            continue;
        }
        accept(m.start(), m.end());
        pos = m.end();
    }
}

/// Byte index of the character after `pos`; past the end when `pos` is at it
fn next_char_boundary(text: &str, pos: usize) -> usize {
    text[pos..]
        .chars()
        .next()
        .map_or(pos + 1, |c| pos + c.len_utf8())
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Both edges sit on a string end or a non-word character
pub fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

// =============================================================================
// Tests
// =============================================================================
