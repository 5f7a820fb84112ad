//! Explains why an utterance did not match.
//!
//! The engine evaluates every enabled pattern against the input, assigns
//! each failure a reason from a fixed taxonomy, scores how close it came,
//! and ranks the near misses. It never touches the store or the monitor and
//! is not on the classification hot path.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::patterns::matcher::{
    apply_typo_variants, keyword_tokens, literal_tokens, search, strip_anchors, tokenize, Matcher,
};
use crate::patterns::{PatternDefinition, PatternGroup, PriorityOrder};

pub mod similarity;
pub mod suggest;

pub use suggest::{PatternModification, SuggestedPattern};

/// Tunables for [`DiagnosticsEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Minimum similarity for a failure to count as a near miss.
    pub similarity_floor: f64,
    /// Largest edit distance treated as a typo.
    pub max_edit_distance: usize,
    /// Cap on suggested patterns and on suggested modifications.
    pub max_suggestions: usize,
    /// Canonical word → known misspellings, applied to every pattern.
    pub typos: BTreeMap<String, Vec<String>>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            similarity_floor: 0.6,
            max_edit_distance: 2,
            max_suggestions: 5,
            typos: BTreeMap::new(),
        }
    }
}

/// Why a pattern did not match, checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// Matches once its `^` / `$` anchors are removed.
    AnchorFailure,
    /// Matches somewhere in the input, just not from the start.
    PartialMatch,
    /// A missing keyword is close to a word that is present.
    Typo,
    /// A keyword is absent and no present word looks like it.
    MissingKeyword,
    /// Every keyword is present but the pattern still fails.
    WordOrder,
    /// The pattern has no literal keywords to compare against.
    NoMatch,
}

impl FailureReason {
    /// Stable wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AnchorFailure => "ANCHOR_FAILURE",
            Self::PartialMatch => "PARTIAL_MATCH",
            Self::Typo => "TYPO",
            Self::MissingKeyword => "MISSING_KEYWORD",
            Self::WordOrder => "WORD_ORDER",
            Self::NoMatch => "NO_MATCH",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A present input word that looks like a misspelled keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypoHint {
    /// Word found in the input.
    pub found: String,
    /// Keyword it most likely stands for.
    pub expected: String,
}

/// Outcome of testing one pattern against the input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Group holding the pattern.
    pub group: String,
    /// Pattern name.
    pub name: String,
    /// Raw regex.
    pub pattern: String,
    /// Whether the pattern matches from the start.
    pub matched: bool,
    /// Reason for a failure; `None` on a match.
    pub failure_reason: Option<FailureReason>,
    /// Similarity between the input and the pattern's literal words.
    pub similarity: f64,
    /// Pattern keywords present in the input.
    pub partial_tokens: Vec<String>,
    /// Pattern keywords absent from the input.
    pub missing_tokens: Vec<String>,
    /// Likely misspellings, for [`FailureReason::Typo`].
    pub typos: Vec<TypoHint>,
    /// Operator-facing fixes.
    pub suggestions: Vec<String>,
    /// Byte span of a match.
    pub span: Option<(usize, usize)>,
    #[serde(skip)]
    confidence: f64,
}

impl MatchResult {
    /// `group.name` identifier.
    pub fn pattern_id(&self) -> String {
        format!("{}.{}", self.group, self.name)
    }
}

/// A failure close enough to be worth an operator's attention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearMiss {
    /// Group holding the pattern.
    pub group: String,
    /// Pattern name.
    pub name: String,
    /// Similarity score, at or above the floor.
    pub similarity: f64,
    /// Why it failed.
    pub failure_reason: FailureReason,
}

/// Full diagnosis of one input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticsReport {
    /// Input as given.
    pub input: String,
    /// First matching pattern in tier order, if any.
    pub matched: Option<String>,
    /// One result per enabled pattern, in tier then insertion order.
    pub results: Vec<MatchResult>,
    /// Failures at or above the similarity floor, most similar first.
    pub near_misses: Vec<NearMiss>,
    /// New patterns suggested by the input's shape.
    pub suggested_patterns: Vec<SuggestedPattern>,
    /// Fixes for near-miss patterns.
    pub suggested_modifications: Vec<PatternModification>,
}

impl DiagnosticsReport {
    /// Result for one pattern.
    pub fn result(&self, group: &str, name: &str) -> Option<&MatchResult> {
        self.results
            .iter()
            .find(|r| r.group == group && r.name == name)
    }

    /// Compact operator-facing explanation.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "input: {:?}", self.input);
        match &self.matched {
            Some(id) => {
                let _ = writeln!(out, "matched: {id}");
            }
            None => {
                let _ = writeln!(
                    out,
                    "no pattern matched ({} evaluated, {} near misses)",
                    self.results.len(),
                    self.near_misses.len()
                );
            }
        }
        for miss in &self.near_misses {
            let _ = write!(
                out,
                "  {}.{} {:.2} {}",
                miss.group, miss.name, miss.similarity, miss.failure_reason
            );
            if let Some(m) = self
                .suggested_modifications
                .iter()
                .find(|m| m.group == miss.group && m.name == miss.name)
            {
                let _ = write!(out, ": {}", m.note);
            }
            out.push('\n');
        }
        for suggestion in &self.suggested_patterns {
            let _ = writeln!(
                out,
                "  suggest {} {} ({})",
                suggestion.group, suggestion.pattern, suggestion.rationale
            );
        }
        out
    }

    /// One-line digest attached to degraded classifications.
    pub fn headline(&self) -> String {
        match (&self.matched, self.near_misses.first()) {
            (Some(id), _) => format!("matched {id}"),
            (None, Some(top)) => format!(
                "closest pattern {}.{} ({:.2}, {})",
                top.group, top.name, top.similarity, top.failure_reason
            ),
            (None, None) => format!("no near misses among {} patterns", self.results.len()),
        }
    }
}

/// Pure, deterministic failure analysis.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsEngine {
    config: DiagnosticsConfig,
}

impl DiagnosticsEngine {
    /// Engine with the given tunables.
    pub fn new(config: DiagnosticsConfig) -> Self {
        Self { config }
    }

    /// Current tunables.
    pub fn config(&self) -> &DiagnosticsConfig {
        &self.config
    }

    /// Evaluate every enabled pattern in `groups` against `text`.
    ///
    /// Groups are visited in `priority` order, then any remaining groups by
    /// name.
    pub fn diagnose(
        &self,
        text: &str,
        groups: &[Arc<PatternGroup>],
        priority: &PriorityOrder,
    ) -> DiagnosticsReport {
        let mut ordered: Vec<&Arc<PatternGroup>> = groups.iter().collect();
        ordered.sort_by_key(|g| {
            (
                priority.position(g.name()).unwrap_or(usize::MAX),
                g.name().to_owned(),
            )
        });

        let results: Vec<MatchResult> = ordered
            .iter()
            .flat_map(|group| {
                group.enabled().map(move |(definition, matcher)| {
                    self.diagnose_pattern(text, group.name(), definition, matcher)
                })
            })
            .collect();

        let matched = results.iter().find(|r| r.matched).map(MatchResult::pattern_id);

        let mut misses: Vec<&MatchResult> = results
            .iter()
            .filter(|r| !r.matched && r.similarity >= self.config.similarity_floor)
            .collect();
        misses.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
        });

        let near_misses = misses
            .iter()
            .filter_map(|r| {
                Some(NearMiss {
                    group: r.group.clone(),
                    name: r.name.clone(),
                    similarity: r.similarity,
                    failure_reason: r.failure_reason?,
                })
            })
            .collect();

        let suggested_modifications = misses
            .iter()
            .filter_map(|r| suggest::suggest_modification(r, text))
            .take(self.config.max_suggestions)
            .collect();

        let suggested_patterns = if matched.is_some() {
            Vec::new()
        } else {
            suggest::suggest_patterns(text, priority, self.config.max_suggestions)
        };

        DiagnosticsReport {
            input: text.to_owned(),
            matched,
            results,
            near_misses,
            suggested_patterns,
            suggested_modifications,
        }
    }

    /// Evaluate a single pattern.
    pub fn diagnose_pattern(
        &self,
        text: &str,
        group: &str,
        definition: &PatternDefinition,
        matcher: Option<&Matcher>,
    ) -> MatchResult {
        let input = text.trim();
        let raw = definition.pattern.as_str();
        let tokens = tokenize(input);
        let keywords = keyword_tokens(raw);
        let (partial_tokens, missing_tokens): (Vec<String>, Vec<String>) =
            keywords.iter().cloned().partition(|k| has_keyword(&tokens, k));
        let similarity = similarity::ratio(&input.to_lowercase(), &literal_tokens(raw).join(" "));

        let mut result = MatchResult {
            group: group.to_owned(),
            name: definition.name.clone(),
            pattern: raw.to_owned(),
            matched: false,
            failure_reason: None,
            similarity,
            partial_tokens,
            missing_tokens,
            typos: Vec::new(),
            suggestions: Vec::new(),
            span: None,
            confidence: definition.confidence,
        };

        if let Some(span) = matcher.and_then(|m| match_with_variants(m, input, definition)) {
            result.matched = true;
            result.span = Some(span);
            return result;
        }

        let reason = if strip_anchors(raw).is_some_and(|s| matches_anywhere(&s, input)) {
            FailureReason::AnchorFailure
        } else if matches_anywhere(raw, input) {
            FailureReason::PartialMatch
        } else if !result.missing_tokens.is_empty() {
            result.typos = self.typo_hints(&tokens, &keywords, &result.missing_tokens, definition);
            if result.typos.is_empty() {
                FailureReason::MissingKeyword
            } else {
                FailureReason::Typo
            }
        } else if !keywords.is_empty() {
            FailureReason::WordOrder
        } else {
            FailureReason::NoMatch
        };
        result.failure_reason = Some(reason);

        if let Some(modification) = suggest::suggest_modification(&result, input) {
            result.suggestions.push(modification.note);
        }
        result
    }

    /// Present, non-keyword input words that look like a missing keyword.
    fn typo_hints(
        &self,
        tokens: &[String],
        keywords: &[String],
        missing: &[String],
        definition: &PatternDefinition,
    ) -> Vec<TypoHint> {
        let mut hints = Vec::new();
        for expected in missing {
            let found = tokens.iter().find(|t| {
                !keywords.iter().any(|k| is_keyword(t, k))
                    && t.chars().count() >= 2
                    && !hints.iter().any(|h: &TypoHint| h.found == **t)
                    && self.looks_like(t, expected, definition)
            });
            if let Some(found) = found {
                hints.push(TypoHint {
                    found: found.clone(),
                    expected: expected.clone(),
                });
            }
        }
        hints
    }

    fn looks_like(&self, found: &str, expected: &str, definition: &PatternDefinition) -> bool {
        let known = definition
            .typo_variants
            .get(found)
            .is_some_and(|canonical| canonical == expected)
            || self
                .config
                .typos
                .get(expected)
                .is_some_and(|variants| variants.iter().any(|v| v == found));
        if known {
            return true;
        }
        let distance = strsim::levenshtein(found, expected);
        (1..=self.config.max_edit_distance).contains(&distance) && distance < found.chars().count()
    }
}

fn match_with_variants(
    matcher: &Matcher,
    input: &str,
    definition: &PatternDefinition,
) -> Option<(usize, usize)> {
    matcher.find_at_start(input).or_else(|| {
        let corrected = apply_typo_variants(input, &definition.typo_variants)?;
        matcher.find_at_start(&corrected)
    })
}

/// `token` is `keyword` or its plural.
fn is_keyword(token: &str, keyword: &str) -> bool {
    token == keyword || token.strip_suffix('s') == Some(keyword)
}

fn has_keyword(tokens: &[String], keyword: &str) -> bool {
    tokens.iter().any(|t| is_keyword(t, keyword))
}

fn matches_anywhere(raw: &str, input: &str) -> bool {
    matches!(search(raw, input), Ok(Some(_)))
}
