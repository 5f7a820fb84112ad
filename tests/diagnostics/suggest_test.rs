//! New-pattern and modification suggestions.

use std::collections::BTreeMap;

use parlance::diagnostics::suggest::{suggest_patterns, PatternModification};
use parlance::patterns::{PatternStore, PriorityEntry, PriorityOrder};
use parlance::{Category, FailureReason};

#[test]
fn emergency_keyword_and_command_shape_both_suggested() {
    let suggestions = suggest_patterns("call for help", &PriorityOrder::default(), 5);
    let groups: Vec<&str> = suggestions.iter().map(|s| s.group.as_str()).collect();
    assert_eq!(groups, vec!["emergency", "action"]);
    assert_eq!(suggestions[0].pattern, r"^.*\bhelp\b");
    assert_eq!(suggestions[1].pattern, r"^call (.+ )?help\b");
}

#[test]
fn suggestions_respect_the_limit() {
    let suggestions = suggest_patterns("call for help", &PriorityOrder::default(), 1);
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].group, "emergency");
}

#[test]
fn question_shape_suggests_query_pattern() {
    let suggestions = suggest_patterns(
        "where did i leave my keys?",
        &PriorityOrder::default(),
        5,
    );
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].group, "query");
    assert_eq!(suggestions[0].pattern, r"^where did\b");
}

#[test]
fn groups_outside_the_priority_order_are_never_suggested() {
    let order = PriorityOrder::new(vec![PriorityEntry {
        group: "action".to_owned(),
        category: Category::Action,
        base_confidence: 0.9,
    }])
    .expect("order");
    assert!(suggest_patterns("where did i leave my keys?", &order, 5).is_empty());
}

#[test]
fn empty_input_has_no_suggestions() {
    assert!(suggest_patterns("   ", &PriorityOrder::default(), 5).is_empty());
}

#[test]
fn typo_modification_merges_with_existing_variants() {
    let store = PatternStore::with_defaults().expect("builtin");
    let mut current = store.get("action", "switch").expect("switch");
    current
        .typo_variants
        .insert("tunr".to_owned(), "turn".to_owned());

    let mut typos = BTreeMap::new();
    typos.insert("trun".to_owned(), "turn".to_owned());
    let modification = PatternModification {
        group: "action".to_owned(),
        name: "switch".to_owned(),
        reason: FailureReason::Typo,
        note: "Add typo variant \"trun\" for \"turn\"".to_owned(),
        pattern: None,
        typo_variants: typos,
    };

    let update = modification.to_update(&current);
    assert!(update.pattern.is_none());
    let merged = update.typo_variants.expect("typo variants");
    assert_eq!(merged.len(), 2);
    assert_eq!(merged.get("tunr").map(String::as_str), Some("turn"));
    assert_eq!(merged.get("trun").map(String::as_str), Some("turn"));
}
