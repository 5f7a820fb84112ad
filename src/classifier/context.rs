//! Context and mood evaluation.
//!
//! Runs once per classification regardless of which tier answers. The
//! result is attached to the classification and drives the scheduling
//! priority score; it never changes which pattern matched.

use serde::{Deserialize, Serialize};

use crate::patterns::matcher::tokenize;
use crate::types::Category;

/// Lowest and highest scheduling priority.
pub const PRIORITY_RANGE: (u8, u8) = (1, 10);

const CRITICAL_TERMS: &[&str] = &[
    "emergency",
    "help me",
    "fire",
    "smoke",
    "gas leak",
    "intruder",
    "can't breathe",
    "cannot breathe",
    "heart attack",
    "bleeding",
    "unconscious",
    "911",
];
const HIGH_TERMS: &[&str] = &[
    "urgent",
    "urgently",
    "immediately",
    "right now",
    "asap",
    "hurry",
    "quickly",
];
const MEDIUM_TERMS: &[&str] = &["soon", "now", "today"];
const LOW_TERMS: &[&str] = &["no rush", "whenever", "when you can", "later"];

const ANXIOUS_TERMS: &[&str] = &["worried", "scared", "afraid", "nervous", "panic", "panicking"];
const FRUSTRATED_TERMS: &[&str] = &[
    "again",
    "still not",
    "why won't",
    "doesn't work",
    "not working",
    "useless",
    "stupid",
    "annoying",
];
const NEGATIVE_TERMS: &[&str] = &["sad", "bad", "terrible", "hate", "awful", "upset", "tired"];
const POSITIVE_TERMS: &[&str] = &[
    "thanks",
    "thank you",
    "great",
    "love",
    "awesome",
    "nice",
    "wonderful",
    "perfect",
];

/// Errors from validating caller-supplied context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// An entity name was empty after trimming.
    #[error("entity names must not be empty")]
    EmptyEntityName,
    /// A metadata field was present but blank.
    #[error("context field {0} must not be blank when set")]
    BlankField(&'static str),
}

/// How time-critical an utterance is.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    /// No urgency signal.
    #[default]
    None,
    /// Explicitly relaxed ("no rush").
    Low,
    /// Mild time pressure.
    Medium,
    /// Explicit urgency.
    High,
    /// Life-safety language.
    Critical,
}

impl UrgencyLevel {
    /// Points added to the category's base priority.
    pub fn boost(self) -> u8 {
        match self {
            Self::None | Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 4,
        }
    }
}

/// Dominant emotional tone of an utterance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionalTone {
    /// No strong signal.
    #[default]
    Neutral,
    /// Appreciation or satisfaction.
    Positive,
    /// Sadness or dislike.
    Negative,
    /// Repetition, complaints, shouting.
    Frustrated,
    /// Worry or fear.
    Anxious,
}

/// Caller-supplied context for one classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationContext {
    /// Whether this utterance continues an ongoing conversation.
    pub prior_turn: bool,
    /// Device, room, or person names the caller knows about.
    pub entity_names: Vec<String>,
    /// Who is speaking, if known.
    pub speaker: Option<String>,
    /// Where the utterance was heard, if known.
    pub room: Option<String>,
    /// Urgency asserted by the caller, combined with detected urgency.
    pub urgency_hint: Option<UrgencyLevel>,
}

impl ClassificationContext {
    /// Validate and normalize at the boundary: entity names are trimmed and
    /// must be non-empty; speaker and room, when set, must not be blank.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] for empty entity names or blank metadata.
    pub fn validated(mut self) -> Result<Self, ContextError> {
        for name in &mut self.entity_names {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(ContextError::EmptyEntityName);
            }
            *name = trimmed.to_owned();
        }
        if self.speaker.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(ContextError::BlankField("speaker"));
        }
        if self.room.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(ContextError::BlankField("room"));
        }
        Ok(self)
    }

    /// Entity names that occur in `text` as whole words (case-insensitive).
    pub fn entities_in(&self, text: &str) -> Vec<String> {
        let haystack = padded(&tokenize(text));
        self.entity_names
            .iter()
            .filter(|name| contains_term(&haystack, &tokenize(name).join(" ")))
            .cloned()
            .collect()
    }
}

/// Result of context evaluation, attached to every classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEvaluation {
    /// Urgency found in the utterance itself.
    pub detected_urgency: UrgencyLevel,
    /// Combined detected and hinted urgency; drives priority only.
    pub urgency: UrgencyLevel,
    /// Detected emotional tone.
    pub tone: EmotionalTone,
    /// Speaker passed through from the caller.
    pub speaker: Option<String>,
    /// Room passed through from the caller.
    pub room: Option<String>,
    /// Known entities mentioned in the utterance.
    pub entities: Vec<String>,
    /// Terms that triggered the urgency and tone decisions.
    pub signals: Vec<String>,
}

/// Evaluate urgency and tone for `text`.
pub fn evaluate(text: &str, context: &ClassificationContext) -> ContextEvaluation {
    let tokens = tokenize(text);
    let haystack = padded(&tokens);
    let mut signals = Vec::new();

    let detected = [
        (UrgencyLevel::Critical, CRITICAL_TERMS),
        (UrgencyLevel::High, HIGH_TERMS),
        (UrgencyLevel::Medium, MEDIUM_TERMS),
        (UrgencyLevel::Low, LOW_TERMS),
    ]
    .into_iter()
    .find_map(|(level, terms)| {
        let hit = first_hit(&haystack, terms)?;
        signals.push(format!("urgency:{hit}"));
        Some(level)
    })
    .unwrap_or_default();
    let urgency = detected.max(context.urgency_hint.unwrap_or_default());

    let tone = if is_shouting(text) {
        signals.push("tone:shouting".to_owned());
        EmotionalTone::Frustrated
    } else {
        [
            (EmotionalTone::Anxious, ANXIOUS_TERMS),
            (EmotionalTone::Frustrated, FRUSTRATED_TERMS),
            (EmotionalTone::Negative, NEGATIVE_TERMS),
            (EmotionalTone::Positive, POSITIVE_TERMS),
        ]
        .into_iter()
        .find_map(|(tone, terms)| {
            let hit = first_hit(&haystack, terms)?;
            signals.push(format!("tone:{hit}"));
            Some(tone)
        })
        .unwrap_or_default()
    };

    ContextEvaluation {
        detected_urgency: detected,
        urgency,
        tone,
        speaker: context.speaker.clone(),
        room: context.room.clone(),
        entities: context.entities_in(text),
        signals,
    }
}

/// Scheduling priority: category base priority plus urgency boost, clamped
/// to [`PRIORITY_RANGE`].
pub fn priority_score(category: Category, urgency: UrgencyLevel) -> u8 {
    let (low, high) = PRIORITY_RANGE;
    category
        .base_priority()
        .saturating_add(urgency.boost())
        .clamp(low, high)
}

fn padded(tokens: &[String]) -> String {
    format!(" {} ", tokens.join(" "))
}

fn contains_term(haystack: &str, term: &str) -> bool {
    !term.is_empty() && haystack.contains(&format!(" {term} "))
}

fn first_hit<'a>(haystack: &str, terms: &[&'a str]) -> Option<&'a str> {
    terms.iter().copied().find(|t| contains_term(haystack, t))
}

fn is_shouting(text: &str) -> bool {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 4 && letters.iter().all(|c| c.is_uppercase())
}
