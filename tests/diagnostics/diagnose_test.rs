//! Failure explanation over the built-in pattern set.

use parlance::diagnostics::{DiagnosticsConfig, DiagnosticsEngine, DiagnosticsReport};
use parlance::patterns::{PatternStore, PatternUpdate};
use parlance::FailureReason;

fn diagnose_with(engine: &DiagnosticsEngine, store: &PatternStore, text: &str) -> DiagnosticsReport {
    engine.diagnose(text, &store.groups(), store.priority())
}

fn store() -> PatternStore {
    PatternStore::with_defaults().expect("builtin")
}

#[test]
fn misspelled_verb_is_reported_as_typo() {
    let store = store();
    let report = diagnose_with(
        &DiagnosticsEngine::default(),
        &store,
        "trun off the kitchen light",
    );

    assert_eq!(report.matched, None);
    let switch = report.result("action", "switch").expect("switch result");
    assert!(!switch.matched);
    assert_eq!(switch.failure_reason, Some(FailureReason::Typo));
    assert_eq!(switch.typos.len(), 1);
    assert_eq!(switch.typos[0].found, "trun");
    assert_eq!(switch.typos[0].expected, "turn");
    assert!(switch.missing_tokens.contains(&"turn".to_owned()));
    assert!(switch.partial_tokens.contains(&"light".to_owned()));
    assert!(switch.similarity > 0.7 && switch.similarity < 0.75);
    assert!(switch
        .suggestions
        .iter()
        .any(|s| s.contains("Add typo variant \"trun\"")));

    assert!(!report.near_misses.is_empty());
    assert_eq!(report.near_misses[0].name, "switch");
    let fix = report
        .suggested_modifications
        .iter()
        .find(|m| m.name == "switch")
        .expect("modification");
    assert_eq!(fix.typo_variants.get("trun").map(String::as_str), Some("turn"));
}

#[test]
fn dropped_letter_in_a_short_word_is_a_typo() {
    let store = store();
    let report = diagnose_with(&DiagnosticsEngine::default(), &store, "turn of the lights");

    let switch = report.result("action", "switch").expect("switch result");
    assert_eq!(switch.failure_reason, Some(FailureReason::Typo));
    assert_eq!(switch.missing_tokens, ["off"]);
    assert_eq!(switch.typos.len(), 1);
    assert_eq!(switch.typos[0].found, "of");
    assert_eq!(switch.typos[0].expected, "off");
}

#[test]
fn unrelated_input_is_missing_keywords_not_no_match() {
    let store = store();
    let report = diagnose_with(&DiagnosticsEngine::default(), &store, "what a lovely day");

    let switch = report.result("action", "switch").expect("switch result");
    assert!(switch.partial_tokens.is_empty());
    assert_eq!(switch.failure_reason, Some(FailureReason::MissingKeyword));
}

#[test]
fn accepting_the_typo_suggestion_fixes_the_fast_path() {
    let store = store();
    let report = diagnose_with(
        &DiagnosticsEngine::default(),
        &store,
        "trun off the kitchen light",
    );
    let fix = report
        .suggested_modifications
        .iter()
        .find(|m| m.name == "switch")
        .expect("modification");
    let current = store.get("action", "switch").expect("switch");
    store
        .update("action", "switch", &fix.to_update(&current), "ops", &fix.note)
        .expect("update");

    let after = diagnose_with(
        &DiagnosticsEngine::default(),
        &store,
        "trun off the kitchen light",
    );
    assert_eq!(after.matched.as_deref(), Some("action.switch"));
    assert!(after.suggested_patterns.is_empty());
}

#[test]
fn anchor_failure_suggests_a_verified_rewrite() {
    let store = store();
    let report = diagnose_with(
        &DiagnosticsEngine::default(),
        &store,
        "turn off the hallway lights please",
    );
    let switch = report.result("action", "switch").expect("switch");
    assert_eq!(switch.failure_reason, Some(FailureReason::AnchorFailure));

    let fix = report
        .suggested_modifications
        .iter()
        .find(|m| m.name == "switch")
        .expect("modification");
    let rewritten = fix.pattern.clone().expect("rewrite");
    store
        .update(
            "action",
            "switch",
            &PatternUpdate {
                pattern: Some(rewritten),
                ..PatternUpdate::default()
            },
            "ops",
            "relax anchors",
        )
        .expect("update");
    assert!(store
        .match_first("action", "turn off the hallway lights please")
        .is_some());
}

#[test]
fn diagnose_is_deterministic() {
    let store = store();
    let engine = DiagnosticsEngine::default();
    for text in [
        "trun off the kitchen light",
        "lights turn on",
        "what's the wether like",
        "",
        "hello",
    ] {
        let first = diagnose_with(&engine, &store, text);
        let second = diagnose_with(&engine, &store, text);
        assert_eq!(first, second, "{text:?}");
    }
}

#[test]
fn near_misses_are_sorted_and_above_the_floor() {
    let store = store();
    for floor in [0.3, 0.5, 0.6] {
        let engine = DiagnosticsEngine::new(DiagnosticsConfig {
            similarity_floor: floor,
            ..DiagnosticsConfig::default()
        });
        let report = diagnose_with(&engine, &store, "what's the wether like tomorow");
        assert!(report.near_misses.iter().all(|m| m.similarity >= floor));
        assert!(report
            .near_misses
            .windows(2)
            .all(|w| w[0].similarity >= w[1].similarity));
        let failures_above = report
            .results
            .iter()
            .filter(|r| !r.matched && r.similarity >= floor)
            .count();
        assert_eq!(report.near_misses.len(), failures_above);
    }
}

#[test]
fn one_result_per_enabled_pattern_in_tier_order() {
    let store = store();
    let report = diagnose_with(&DiagnosticsEngine::default(), &store, "hello");
    let enabled: usize = store.stats().iter().map(|s| s.enabled).sum();
    assert_eq!(report.results.len(), enabled);
    assert_eq!(report.results[0].group, "emergency");
    assert_eq!(report.results.last().map(|r| r.group.as_str()), Some("query"));
    assert_eq!(report.matched.as_deref(), Some("gesture.greeting"));
    assert!(report.suggested_patterns.is_empty());
}

#[test]
fn disabled_patterns_are_not_evaluated() {
    let store = store();
    store
        .update(
            "gesture",
            "greeting",
            &PatternUpdate {
                enabled: Some(false),
                ..PatternUpdate::default()
            },
            "ops",
            "",
        )
        .expect("update");
    let report = diagnose_with(&DiagnosticsEngine::default(), &store, "hello");
    assert!(report.result("gesture", "greeting").is_none());
    assert_eq!(report.matched, None);
}

#[test]
fn unmatched_command_gets_new_pattern_suggestions() {
    let store = store();
    let report = diagnose_with(&DiagnosticsEngine::default(), &store, "open the garage door");
    assert_eq!(report.matched, None);
    let action = report
        .suggested_patterns
        .iter()
        .find(|s| s.group == "action")
        .expect("action suggestion");
    assert_eq!(action.pattern, r"^open (.+ )?door\b");
}

#[test]
fn summary_names_the_near_miss_and_fix() {
    let store = store();
    let report = diagnose_with(
        &DiagnosticsEngine::default(),
        &store,
        "trun off the kitchen light",
    );
    let summary = report.summary();
    assert!(summary.contains("no pattern matched"));
    assert!(summary.contains("action.switch"));
    assert!(summary.contains("TYPO"));
    assert!(report.headline().starts_with("closest pattern action.switch"));
}

#[test]
fn report_serializes_reasons_in_wire_form() {
    let store = store();
    let report = diagnose_with(
        &DiagnosticsEngine::default(),
        &store,
        "trun off the kitchen light",
    );
    let json = serde_json::to_value(&report).expect("json");
    assert_eq!(json["near_misses"][0]["failure_reason"], "TYPO");
}
