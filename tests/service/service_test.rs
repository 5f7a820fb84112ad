//! End-to-end flows through the service facade.

use std::io::Write;

use parlance::classifier::ContextError;
use parlance::config::ParlanceConfig;
use parlance::health::input_hash;
use parlance::{Category, ClassificationContext, FailureReason, IntentService, Method};

fn builtin_service() -> IntentService {
    IntentService::from_config(&ParlanceConfig::default()).expect("service")
}

#[tokio::test]
async fn pattern_hits_are_recorded_without_diagnosis() {
    let service = builtin_service();
    let result = service
        .classify("hello", ClassificationContext::default())
        .await
        .expect("classify");

    assert_eq!(result.method, Method::Pattern);
    assert_eq!(result.category, Category::Gesture);
    assert!(result.notes.is_empty());

    let records = service.monitor().records_for(&input_hash("hello"));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].matched_pattern.as_deref(), Some("gesture.greeting"));
    assert!(records[0].near_misses.is_empty());
}

#[tokio::test]
async fn misses_carry_the_closest_pattern() {
    let service = builtin_service();
    let text = "trun off the kitchen light";
    let result = service
        .classify(text, ClassificationContext::default())
        .await
        .expect("classify");

    assert_ne!(result.method, Method::Pattern);
    assert!(result
        .notes
        .iter()
        .any(|n| n.starts_with("closest pattern action.switch")));

    let records = service.monitor().records_for(&input_hash(text));
    assert_eq!(records[0].near_misses[0].pattern, "action.switch");
    assert_eq!(records[0].failure_reason, Some(FailureReason::Typo));
}

#[tokio::test]
async fn applying_a_suggestion_moves_the_input_onto_the_fast_path() {
    let service = builtin_service();
    let text = "trun off the kitchen light";

    let report = service.diagnose(text);
    let fix = report
        .suggested_modifications
        .iter()
        .find(|m| m.name == "switch")
        .expect("switch modification");
    let change = service.apply_modification(fix, "ops").expect("apply");
    assert_eq!(change.fields, vec!["typo_variants".to_owned()]);
    assert!(change.reason.contains("TYPO"));

    let result = service
        .classify(text, ClassificationContext::default())
        .await
        .expect("classify");
    assert_eq!(result.method, Method::Pattern);
    assert_eq!(result.category, Category::Action);
    assert_eq!(result.matched_pattern.as_deref(), Some("action.switch"));

    assert_eq!(service.history(Some(("action", "switch"))).len(), 1);
    let stored = service.get_pattern("action", "switch").expect("switch");
    assert_eq!(
        stored.typo_variants.get("trun").map(String::as_str),
        Some("turn")
    );
}

#[tokio::test]
async fn blank_entity_names_are_rejected_before_classifying() {
    let service = builtin_service();
    let context = ClassificationContext {
        entity_names: vec!["  ".to_owned()],
        ..ClassificationContext::default()
    };
    let err = service.classify("hello", context).await.expect_err("blank");
    assert_eq!(err, ContextError::EmptyEntityName);
    assert_eq!(service.monitor().stats().records, 0);
}

#[tokio::test]
async fn custom_pattern_document_replaces_the_builtin_set() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(
        file,
        r#"
[[patterns.action]]
name = "pod_bay"
pattern = "^open the pod bay doors$"
sub_category = "door"
confidence = 0.9
examples = ["open the pod bay doors"]
"#
    )
    .expect("write");

    let config = ParlanceConfig {
        patterns_path: Some(file.path().to_path_buf()),
        ..ParlanceConfig::default()
    };
    let service = IntentService::from_config(&config).expect("service");
    assert_eq!(service.list_groups(), vec!["action".to_owned()]);

    let result = service
        .classify("open the pod bay doors", ClassificationContext::default())
        .await
        .expect("classify");
    assert_eq!(result.method, Method::Pattern);
    assert_eq!(result.sub_category.as_str(), "door");

    let greeting = service
        .classify("hello", ClassificationContext::default())
        .await
        .expect("classify");
    assert_ne!(greeting.method, Method::Pattern);
}

#[test]
fn invalid_pattern_document_fails_startup() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(
        file,
        r#"
[[patterns.action]]
name = "broken"
pattern = "^open (the"
sub_category = "door"
confidence = 0.9
"#
    )
    .expect("write");

    let config = ParlanceConfig {
        patterns_path: Some(file.path().to_path_buf()),
        ..ParlanceConfig::default()
    };
    assert!(IntentService::from_config(&config).is_err());
}

#[tokio::test]
async fn health_report_reflects_recorded_traffic() {
    let service = builtin_service();
    for text in ["hello", "what time is it", "purple monkey dishwasher"] {
        service
            .classify(text, ClassificationContext::default())
            .await
            .expect("classify");
    }
    let report = service.health_report();
    assert_eq!(report.total_records, 3);
    assert_eq!(report.unique_inputs, 3);
    assert!((report.method_rates[&Method::Pattern] - 2.0 / 3.0).abs() < 1e-9);
}
