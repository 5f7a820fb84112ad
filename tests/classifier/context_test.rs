//! Context evaluation as seen on classification results.

use std::sync::Arc;

use parlance::classifier::{
    ClassificationContext, Classifier, ClassifierConfig, EmotionalTone, UrgencyLevel,
};
use parlance::patterns::PatternStore;
use parlance::{Category, Method};

fn classifier() -> Classifier {
    Classifier::new(
        Arc::new(PatternStore::with_defaults().expect("builtin")),
        ClassifierConfig::default(),
    )
}

#[tokio::test]
async fn evaluation_is_attached_whichever_tier_answers() {
    let ctx = ClassificationContext {
        speaker: Some("sam".to_owned()),
        room: Some("kitchen".to_owned()),
        ..ClassificationContext::default()
    };
    let result = classifier()
        .classify("turn off the light right now", &ctx)
        .await;
    assert_eq!(result.method, Method::Heuristic);
    assert_eq!(result.context.urgency, UrgencyLevel::High);
    assert_eq!(result.context.speaker.as_deref(), Some("sam"));
    assert_eq!(result.context.room.as_deref(), Some("kitchen"));
    assert!(result
        .context
        .signals
        .iter()
        .any(|s| s == "urgency:right now"));
}

#[tokio::test]
async fn known_entities_drive_heuristics() {
    let ctx = ClassificationContext {
        entity_names: vec!["hallway heater".to_owned()],
        ..ClassificationContext::default()
    };
    let command = classifier()
        .classify("could you switch the hallway heater off", &ctx)
        .await;
    assert_eq!(command.method, Method::Heuristic);
    assert_eq!(command.category, Category::Action);
    assert_eq!(command.context.entities, vec!["hallway heater".to_owned()]);

    let mention = classifier().classify("hallway heater", &ctx).await;
    assert_eq!(mention.category, Category::Query);
    assert_eq!(mention.sub_category.as_str(), "entity_status");
}

#[tokio::test]
async fn prior_turn_keeps_the_conversation_going() {
    let ctx = ClassificationContext {
        prior_turn: true,
        ..ClassificationContext::default()
    };
    let result = classifier().classify("and the one after that", &ctx).await;
    assert_eq!(result.method, Method::Heuristic);
    assert_eq!(result.category, Category::Conversation);
    assert_eq!(result.sub_category.as_str(), "follow_up");
}

#[tokio::test]
async fn tone_is_reported_without_changing_the_match() {
    let result = classifier()
        .classify("thanks", &ClassificationContext::default())
        .await;
    assert_eq!(result.method, Method::Pattern);
    assert_eq!(result.category, Category::Gesture);
    assert_eq!(result.context.tone, EmotionalTone::Positive);
}
