//! Pattern store: loading, matching, mutation, and snapshots.

use std::collections::BTreeMap;
use std::sync::Arc;

use parlance::patterns::{PatternDocument, PatternError, PatternStore, PatternUpdate};

fn store() -> PatternStore {
    match PatternStore::with_defaults() {
        Ok(store) => store,
        Err(e) => panic!("builtin patterns should load: {e}"),
    }
}

#[test]
fn builtin_document_loads_every_tier_group() {
    let store = store();
    assert_eq!(
        store.list(),
        vec![
            "action",
            "emergency",
            "gesture",
            "instant",
            "memory",
            "query",
            "self_improvement"
        ]
    );
    for entry in store.priority().entries() {
        assert!(store.get_group(&entry.group).is_some(), "{}", entry.group);
    }
}

#[test]
fn builtin_examples_match_their_patterns() {
    assert!(store().verify_examples().is_empty());
}

#[test]
fn match_first_matches_from_the_start_only() {
    let store = store();
    let found = store
        .match_first("action", "turn on the living room lights")
        .expect("switch should match");
    assert_eq!(found.pattern_id(), "action.switch");
    assert_eq!(found.sub_category.as_str(), "switch");
    assert_eq!(found.span.0, 0);
    assert!(!found.typo_corrected);

    assert!(store
        .match_first("action", "please turn on the living room lights")
        .is_none());
    assert!(store.match_first("action", "TURN OFF THE LIGHT").is_some());
}

#[test]
fn match_first_on_unknown_group_is_none() {
    assert!(store().match_first("weather", "anything").is_none());
}

#[test]
fn disabled_pattern_is_skipped_but_visible() {
    let store = store();
    store
        .update(
            "instant",
            "time_query",
            &PatternUpdate {
                enabled: Some(false),
                ..PatternUpdate::default()
            },
            "ops",
            "noisy",
        )
        .expect("update");

    assert!(store.match_first("instant", "what time is it").is_none());
    let group = store.get_group("instant").expect("group");
    let definition = group.get("time_query").expect("still listed");
    assert!(!definition.enabled);
    assert_eq!(group.len(), 2);
    assert_eq!(group.enabled().count(), 1);
}

#[test]
fn update_recompiles_lazily_with_new_pattern() {
    let store = store();
    store
        .update(
            "action",
            "switch",
            &PatternUpdate {
                pattern: Some("^(?:turn|switch) (on|off) (the )?(.+ )?lights?$".to_owned()),
                ..PatternUpdate::default()
            },
            "ops",
            "accept switch verb",
        )
        .expect("update");
    assert!(store
        .match_first("action", "switch off the kitchen light")
        .is_some());
}

#[test]
fn invalid_update_is_rejected_and_leaves_pattern_untouched() {
    let store = store();
    let before = store.get("action", "switch").expect("switch");

    let bad_regex = store.update(
        "action",
        "switch",
        &PatternUpdate {
            pattern: Some("^turn (on".to_owned()),
            ..PatternUpdate::default()
        },
        "ops",
        "typo",
    );
    assert!(matches!(bad_regex, Err(PatternError::Compile { .. })));

    let bad_confidence = store.update(
        "action",
        "switch",
        &PatternUpdate {
            confidence: Some(1.5),
            ..PatternUpdate::default()
        },
        "ops",
        "typo",
    );
    assert!(matches!(
        bad_confidence,
        Err(PatternError::InvalidConfidence { .. })
    ));

    assert_eq!(store.get("action", "switch"), Some(before));
    assert!(store.history(None).is_empty());
}

#[test]
fn update_of_unknown_target_fails() {
    let store = store();
    let update = PatternUpdate::default();
    assert!(matches!(
        store.update("weather", "x", &update, "ops", ""),
        Err(PatternError::UnknownGroup(_))
    ));
    assert!(matches!(
        store.update("action", "x", &update, "ops", ""),
        Err(PatternError::UnknownPattern { .. })
    ));
}

#[test]
fn load_is_all_or_nothing_per_group() {
    let store = store();
    let document = PatternDocument::from_toml(
        r#"
[[patterns.action]]
name = "only"
pattern = "^do it$"
sub_category = "command"

[[patterns.query]]
name = "good"
pattern = "^what is"
sub_category = "lookup"

[[patterns.query]]
name = "broken"
pattern = "^what (is"
sub_category = "lookup"
"#,
    )
    .expect("parse");

    let err = store.load(&document).expect_err("query group should be rejected");
    match err {
        PatternError::Load {
            rejected,
            loaded,
            errors,
        } => {
            assert_eq!(rejected, vec!["query"]);
            assert_eq!(loaded, vec!["action"]);
            assert_eq!(errors.len(), 1);
            assert!(matches!(
                &errors[0],
                PatternError::Compile { group, name, .. } if group == "query" && name == "broken"
            ));
        }
        other => panic!("unexpected error: {other}"),
    }

    // action was replaced, query kept its previous contents, others untouched.
    assert_eq!(store.get_group("action").map(|g| g.len()), Some(1));
    assert!(store.get("query", "weather").is_some());
    assert!(store.get("query", "good").is_none());
    assert!(store.get("instant", "time_query").is_some());
}

#[test]
fn duplicate_names_reject_the_group() {
    let store = PatternStore::new();
    let document = PatternDocument::from_toml(
        r#"
[[patterns.gesture]]
name = "hi"
pattern = "^hi"
sub_category = "greeting"

[[patterns.gesture]]
name = "hi"
pattern = "^hello"
sub_category = "greeting"
"#,
    )
    .expect("parse");
    assert!(store.load(&document).is_err());
    assert!(store.get_group("gesture").is_none());
}

#[test]
fn typo_variants_give_a_second_chance() {
    let store = store();
    assert!(store
        .match_first("action", "trun off the kitchen light")
        .is_none());

    let mut typos = BTreeMap::new();
    typos.insert("trun".to_owned(), "turn".to_owned());
    store
        .update(
            "action",
            "switch",
            &PatternUpdate {
                typo_variants: Some(typos),
                ..PatternUpdate::default()
            },
            "ops",
            "common misspelling",
        )
        .expect("update");

    let found = store
        .match_first("action", "trun off the kitchen light")
        .expect("typo-corrected match");
    assert!(found.typo_corrected);
    assert_eq!(found.pattern_id(), "action.switch");
}

#[test]
fn snapshot_and_stats_reflect_current_state() {
    let store = store();
    let builtin = PatternDocument::builtin().expect("builtin");
    assert_eq!(store.snapshot(), builtin);

    store
        .update(
            "memory",
            "forget",
            &PatternUpdate {
                enabled: Some(false),
                ..PatternUpdate::default()
            },
            "ops",
            "",
        )
        .expect("update");
    let memory = store
        .stats()
        .into_iter()
        .find(|s| s.group == "memory")
        .expect("memory stats");
    assert_eq!(memory.total, 3);
    assert_eq!(memory.enabled, 2);
    assert_ne!(store.snapshot(), builtin);
}

#[test]
fn readers_see_whole_groups_during_reload() {
    let store = Arc::new(store());
    let two = PatternDocument::from_toml(
        r#"
[[patterns.gesture]]
name = "a"
pattern = "^a$"
sub_category = "greeting"

[[patterns.gesture]]
name = "b"
pattern = "^b$"
sub_category = "greeting"
"#,
    )
    .expect("parse");
    let original_len = store.get_group("gesture").map(|g| g.len()).unwrap_or(0);

    let writer = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || {
            for _ in 0..200 {
                store.load(&two).expect("load");
                store
                    .reload_group(
                        "gesture",
                        &PatternDocument::builtin().expect("builtin").patterns["gesture"],
                    )
                    .expect("reload");
            }
        })
    };
    for _ in 0..2000 {
        let len = store.get_group("gesture").map(|g| g.len()).unwrap_or(0);
        assert!(len == 2 || len == original_len, "saw partial group of {len}");
    }
    writer.join().expect("writer thread");
}
