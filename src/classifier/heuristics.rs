//! Structural heuristic rules, evaluated in order, first satisfied wins.

use serde::Serialize;

use super::context::{ClassificationContext, ContextEvaluation, UrgencyLevel};
use crate::patterns::matcher::tokenize;
use crate::types::{Category, SubCategory};

/// Verbs that open an imperative command.
pub const COMMAND_VERBS: &[&str] = &[
    "turn", "switch", "set", "dim", "brighten", "play", "pause", "resume", "stop", "start",
    "open", "close", "lock", "unlock", "increase", "decrease", "raise", "lower", "activate",
    "deactivate", "enable", "disable", "show", "call", "send", "add", "remove", "cancel", "mute",
    "unmute", "skip",
];

/// Words that open a question.
pub const QUESTION_WORDS: &[&str] = &[
    "what", "who", "whom", "whose", "where", "when", "why", "how", "which", "is", "are", "was",
    "were", "do", "does", "did", "can", "could", "will", "would", "should",
];

/// Everything a rule may look at.
pub struct HeuristicInput<'a> {
    /// Trimmed utterance.
    pub text: &'a str,
    /// Lowercase word tokens.
    pub tokens: Vec<String>,
    /// Caller context.
    pub context: &'a ClassificationContext,
    /// Context evaluation for this call.
    pub evaluation: &'a ContextEvaluation,
}

impl<'a> HeuristicInput<'a> {
    /// Tokenize `text` and bundle it with its context.
    pub fn new(
        text: &'a str,
        context: &'a ClassificationContext,
        evaluation: &'a ContextEvaluation,
    ) -> Self {
        Self {
            text,
            tokens: tokenize(text),
            context,
            evaluation,
        }
    }

    fn first_token(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    fn has_command_verb(&self) -> bool {
        self.tokens.iter().any(|t| COMMAND_VERBS.contains(&t.as_str()))
    }
}

/// A structural rule with a fixed outcome.
pub struct HeuristicRule {
    /// Rule identifier, reported on the result.
    pub name: &'static str,
    /// Category the rule yields.
    pub category: Category,
    /// Sub-category the rule yields.
    pub sub_category: &'static str,
    /// Fixed confidence.
    pub confidence: f64,
    test: fn(&HeuristicInput<'_>) -> bool,
}

/// Rules in evaluation order. The last one always fires.
pub const RULES: &[HeuristicRule] = &[
    HeuristicRule {
        name: "prior_turn",
        category: Category::Conversation,
        sub_category: "follow_up",
        confidence: 0.75,
        test: continues_conversation,
    },
    HeuristicRule {
        name: "urgent_language",
        category: Category::Emergency,
        sub_category: "urgent",
        confidence: 0.85,
        test: is_critical,
    },
    HeuristicRule {
        name: "entity_command",
        category: Category::Action,
        sub_category: "entity_command",
        confidence: 0.8,
        test: commands_entity,
    },
    HeuristicRule {
        name: "entity_mention",
        category: Category::Query,
        sub_category: "entity_status",
        confidence: 0.65,
        test: mentions_entity,
    },
    HeuristicRule {
        name: "question_form",
        category: Category::Query,
        sub_category: "question",
        confidence: 0.7,
        test: is_question,
    },
    HeuristicRule {
        name: "command_verb",
        category: Category::Action,
        sub_category: "command",
        confidence: 0.7,
        test: starts_with_command,
    },
    FALLBACK,
];

const FALLBACK: HeuristicRule = HeuristicRule {
    name: "fallback",
    category: Category::Conversation,
    sub_category: "general",
    confidence: 0.3,
    test: always,
};

fn continues_conversation(input: &HeuristicInput<'_>) -> bool {
    input.context.prior_turn
}

fn is_critical(input: &HeuristicInput<'_>) -> bool {
    input.evaluation.detected_urgency >= UrgencyLevel::Critical
}

fn commands_entity(input: &HeuristicInput<'_>) -> bool {
    mentions_entity(input) && input.has_command_verb()
}

fn mentions_entity(input: &HeuristicInput<'_>) -> bool {
    !input.evaluation.entities.is_empty()
}

fn is_question(input: &HeuristicInput<'_>) -> bool {
    input.text.trim_end().ends_with('?')
        || input
            .first_token()
            .is_some_and(|t| QUESTION_WORDS.contains(&t))
}

fn starts_with_command(input: &HeuristicInput<'_>) -> bool {
    input
        .first_token()
        .is_some_and(|t| COMMAND_VERBS.contains(&t))
}

fn always(_: &HeuristicInput<'_>) -> bool {
    true
}

/// Outcome of the heuristic tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeuristicVerdict {
    /// Rule that fired.
    pub rule: &'static str,
    /// Category from the rule.
    pub category: Category,
    /// Sub-category from the rule.
    pub sub_category: SubCategory,
    /// Fixed rule confidence.
    pub confidence: f64,
}

/// Evaluate [`RULES`] in order and return the first that fires.
pub fn evaluate(input: &HeuristicInput<'_>) -> HeuristicVerdict {
    let rule = RULES
        .iter()
        .find(|rule| (rule.test)(input))
        .unwrap_or(&FALLBACK);
    HeuristicVerdict {
        rule: rule.name,
        category: rule.category,
        sub_category: SubCategory::fixed(rule.sub_category),
        confidence: rule.confidence,
    }
}
