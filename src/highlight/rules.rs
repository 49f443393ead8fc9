//! Rule Compiler: flattens highlight groups into a priority-ordered rule list
//!
//! Each word of an enabled group becomes one `Rule` that inherits the group's
//! color and match options. Priority is the group's explicit `priority` when
//! supplied, otherwise its position in the group list; lower wins. Ties keep
//! declaration order (the sort is stable).
//!
//! Nothing is validated here: a malformed pattern expression compiles into a
//! rule and is only rejected by the matcher at scan time.

use serde::{Deserialize, Serialize};

// =============================================================================
// Types
// =============================================================================

/// A highlight group as supplied by the configuration collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub color_id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub words: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub whole_word_only: bool,
    #[serde(default)]
    pub is_pattern_expression: bool,
    /// Explicit priority; defaults to the group's list position
    #[serde(default)]
    pub priority: Option<i64>,
}

fn default_true() -> bool {
    true
}

/// One compiled matching rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub pattern: String,
    pub is_pattern_expression: bool,
    pub color_id: String,
    pub case_sensitive: bool,
    pub whole_word_only: bool,
    pub priority: i64,
}

// =============================================================================
// Compiler
// =============================================================================

/// Flatten enabled groups into a priority-ordered rule list
pub fn compile_rules(groups: &[GroupConfig]) -> Vec<Rule> {
    let mut rules: Vec<Rule> = groups
        .iter()
        .enumerate()
        .filter(|(_, group)| group.enabled)
        .flat_map(|(position, group)| {
            let priority = group.priority.unwrap_or(position as i64);
            group.words.iter().map(move |word| Rule {
                pattern: word.clone(),
                is_pattern_expression: group.is_pattern_expression,
                color_id: group.color_id.clone(),
                case_sensitive: group.case_sensitive,
                whole_word_only: group.whole_word_only,
                priority,
            })
        })
        .collect();

    // Stable: equal priorities keep insertion order
    rules.sort_by_key(|rule| rule.priority);

    tracing::debug!(groups = groups.len(), rules = rules.len(), "compiled rules");
    rules
}

// =============================================================================
// Tests
// =============================================================================
