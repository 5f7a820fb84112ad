//! Pattern suggestions: new patterns from the shape of an unmatched input,
//! and modifications to near-miss patterns from their failure reason.
//!
//! Every suggested regex is checked against the input before it is offered,
//! so an operator accepting one is guaranteed to fix the example at hand.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{FailureReason, MatchResult};
use crate::classifier::heuristics::{COMMAND_VERBS, QUESTION_WORDS};
use crate::patterns::matcher::{strip_anchors, tokenize, Matcher};
use crate::patterns::{PatternDefinition, PatternUpdate, PriorityOrder};

const EMERGENCY_TRIGGERS: &[&str] = &[
    "help",
    "emergency",
    "fire",
    "smoke",
    "intruder",
    "flood",
    "ambulance",
];
const MEMORY_TRIGGERS: &[&str] = &["remember", "forget", "remind"];

/// A new pattern an operator could add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestedPattern {
    /// Group the pattern would join.
    pub group: String,
    /// Raw regex, already verified against the input.
    pub pattern: String,
    /// Why this shape was chosen.
    pub rationale: String,
}

/// A change to an existing pattern that would make it match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternModification {
    /// Group holding the pattern.
    pub group: String,
    /// Pattern name.
    pub name: String,
    /// Failure reason this addresses.
    pub reason: FailureReason,
    /// Operator-facing explanation.
    pub note: String,
    /// Replacement regex, if the fix is a rewrite.
    pub pattern: Option<String>,
    /// Misspelling → canonical word entries to add.
    pub typo_variants: BTreeMap<String, String>,
}

impl PatternModification {
    /// The store update that applies this modification to `current`.
    ///
    /// Typo variants are merged into the existing dictionary.
    pub fn to_update(&self, current: &PatternDefinition) -> PatternUpdate {
        let typo_variants = (!self.typo_variants.is_empty()).then(|| {
            let mut merged = current.typo_variants.clone();
            merged.extend(self.typo_variants.clone());
            merged
        });
        PatternUpdate {
            pattern: self.pattern.clone(),
            typo_variants,
            ..PatternUpdate::default()
        }
    }
}

/// Patterns suggested by the shape of `text`, limited to groups in
/// `priority` and to `max` entries.
pub fn suggest_patterns(text: &str, priority: &PriorityOrder, max: usize) -> Vec<SuggestedPattern> {
    let tokens = tokenize(text);
    let Some(first) = tokens.first() else {
        return Vec::new();
    };
    let mut candidates = Vec::new();

    if let Some(trigger) = tokens
        .iter()
        .find(|t| EMERGENCY_TRIGGERS.contains(&t.as_str()))
    {
        candidates.push(SuggestedPattern {
            group: "emergency".to_owned(),
            pattern: format!(r"^.*\b{}\b", regex::escape(trigger)),
            rationale: format!("mentions emergency keyword \"{trigger}\""),
        });
    }

    if MEMORY_TRIGGERS.contains(&first.as_str()) {
        candidates.push(SuggestedPattern {
            group: "memory".to_owned(),
            pattern: format!(r"^{}\b", regex::escape(first)),
            rationale: format!("opens with memory verb \"{first}\""),
        });
    }

    if COMMAND_VERBS.contains(&first.as_str()) {
        let pattern = match tokens.last().filter(|_| tokens.len() > 1) {
            Some(object) => format!(
                r"^{} (.+ )?{}\b",
                regex::escape(first),
                regex::escape(object)
            ),
            None => format!(r"^{}\b", regex::escape(first)),
        };
        candidates.push(SuggestedPattern {
            group: "action".to_owned(),
            pattern,
            rationale: format!("imperative opening with \"{first}\""),
        });
    }

    if QUESTION_WORDS.contains(&first.as_str()) || text.trim_end().ends_with('?') {
        let pattern = match tokens.get(1) {
            Some(second) => format!(r"^{} {}\b", regex::escape(first), regex::escape(second)),
            None => format!(r"^{}\b", regex::escape(first)),
        };
        candidates.push(SuggestedPattern {
            group: "query".to_owned(),
            pattern,
            rationale: format!("question opening with \"{first}\""),
        });
    }

    candidates
        .into_iter()
        .filter(|c| priority.position(&c.group).is_some() && verified(&c.pattern, text))
        .take(max)
        .collect()
}

/// A modification for a failed pattern, derived from its failure reason.
pub fn suggest_modification(result: &MatchResult, text: &str) -> Option<PatternModification> {
    let reason = result.failure_reason?;
    let modification = |note: String, pattern: Option<String>, typos: BTreeMap<String, String>| {
        PatternModification {
            group: result.group.clone(),
            name: result.name.clone(),
            reason,
            note,
            pattern,
            typo_variants: typos,
        }
    };

    match reason {
        FailureReason::AnchorFailure => {
            let pattern = relax_anchors(&result.pattern, text)?;
            Some(modification(
                format!("Relax anchors: {pattern}"),
                Some(pattern),
                BTreeMap::new(),
            ))
        }
        FailureReason::PartialMatch => {
            let body = result.pattern.strip_prefix('^').unwrap_or(&result.pattern);
            let pattern = format!("^.*?(?:{body})");
            verified(&pattern, text).then(|| {
                modification(
                    format!("Allow leading words: {pattern}"),
                    Some(pattern),
                    BTreeMap::new(),
                )
            })
        }
        FailureReason::Typo => {
            let typos: BTreeMap<String, String> = result
                .typos
                .iter()
                .map(|t| (t.found.clone(), t.expected.clone()))
                .collect();
            let note = result
                .typos
                .iter()
                .map(|t| format!("Add typo variant \"{}\" for \"{}\"", t.found, t.expected))
                .collect::<Vec<_>>()
                .join("; ");
            Some(modification(note, None, typos))
        }
        FailureReason::MissingKeyword => Some(modification(
            format!(
                "Input lacks keyword(s) {}; add an alternation if the input is a valid phrasing",
                result.missing_tokens.join(", ")
            ),
            None,
            BTreeMap::new(),
        )),
        FailureReason::WordOrder => Some(modification(
            "Input has every keyword in a different order; add an alternative word order"
                .to_owned(),
            None,
            BTreeMap::new(),
        )),
        FailureReason::NoMatch => None,
    }
}

/// Cheapest anchor relaxation that makes `raw` match `text`.
fn relax_anchors(raw: &str, text: &str) -> Option<String> {
    let mut candidates = Vec::new();
    if let Some(body) = strip_trailing_anchor(raw) {
        candidates.push(body);
    }
    if let Some(body) = raw.strip_prefix('^') {
        candidates.push(format!("^.*?(?:{body})"));
    }
    if let Some(stripped) = strip_anchors(raw) {
        candidates.push(format!("^.*?(?:{stripped})"));
    }
    candidates.into_iter().find(|c| verified(c, text))
}

fn strip_trailing_anchor(raw: &str) -> Option<String> {
    let rest = raw.strip_suffix('$')?;
    let backslashes = rest.chars().rev().take_while(|c| *c == '\\').count();
    (backslashes % 2 == 0).then(|| rest.to_owned())
}

fn verified(pattern: &str, text: &str) -> bool {
    Matcher::compile(pattern).is_ok_and(|m| m.is_match(text.trim()))
}
