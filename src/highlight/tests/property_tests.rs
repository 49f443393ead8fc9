use proptest::prelude::*;

use crate::highlight::matcher::{is_whole_word, RuleSet};
use crate::highlight::rules::Rule;

fn literal(pattern: &str, color: String, whole_word_only: bool) -> Rule {
    Rule {
        pattern: pattern.to_string(),
        is_pattern_expression: false,
        color_id: color,
        case_sensitive: false,
        whole_word_only,
        priority: 0,
    }
}

/// One rule per pattern, each with its own color so matches stay attributable
fn rules_for(patterns: &[String], whole_word_only: bool) -> Vec<Rule> {
    patterns
        .iter()
        .enumerate()
        .map(|(i, p)| literal(p, format!("c{}", i), whole_word_only))
        .collect()
}

proptest! {
    #[test]
    fn prop_matches_never_overlap(
        text in "[abAB _]{0,48}",
        patterns in prop::collection::vec("[ab]{1,3}", 1..5),
    ) {
        let set = RuleSet::compile(&rules_for(&patterns, false));
        let matches = set.find_matches(&text);

        for pair in matches.windows(2) {
            prop_assert!(pair[0].end <= pair[1].start);
        }
        for m in &matches {
            prop_assert!(m.start < m.end && m.end <= text.len());
        }
    }

    #[test]
    fn prop_highest_priority_rule_is_never_displaced(
        text in "[ab ]{0,48}",
        patterns in prop::collection::vec("[ab]{1,3}", 1..5),
    ) {
        let rules = rules_for(&patterns, false);
        let combined = RuleSet::compile(&rules);
        let alone = RuleSet::compile(&rules[..1]);

        let kept: Vec<(usize, usize)> = combined
            .find_matches(&text)
            .iter()
            .filter(|m| m.color_id == "c0")
            .map(|m| (m.start, m.end))
            .collect();
        let expected: Vec<(usize, usize)> = alone
            .find_matches(&text)
            .iter()
            .map(|m| (m.start, m.end))
            .collect();

        prop_assert_eq!(kept, expected);
    }

    #[test]
    fn prop_accepted_matches_are_real_occurrences(
        text in "[abAB ]{0,48}",
        patterns in prop::collection::vec("[ab]{1,3}", 1..4),
    ) {
        let set = RuleSet::compile(&rules_for(&patterns, false));

        for m in set.find_matches(&text) {
            let index: usize = m.color_id[1..].parse().unwrap();
            prop_assert!(text[m.start..m.end].eq_ignore_ascii_case(&patterns[index]));
        }
    }

    #[test]
    fn prop_whole_word_matches_have_word_boundaries(
        text in "[ab _.]{0,48}",
        patterns in prop::collection::vec("[ab]{1,3}", 1..4),
    ) {
        let set = RuleSet::compile(&rules_for(&patterns, true));

        for m in set.find_matches(&text) {
            prop_assert!(is_whole_word(&text, m.start, m.end));
        }
    }
}
